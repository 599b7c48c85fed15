//! Abstract and publication-year back-fill from downloaded PDFs.

use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::models::{date_from_parts, Paper};
use crate::utils::{
    extract_abstract, first_year_match, latest_plausible_year, plausible_years, TextExtractor,
};

/// Knobs for scanning PDFs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfScan {
    /// Pages read when looking for an abstract
    pub abstract_pages: usize,
    /// Characters allowed between "DVCon" and a year
    pub dvcon_window: usize,
    /// Latest year accepted as a publication year
    pub max_year: i32,
}

impl PdfScan {
    pub fn from_config(config: &Config) -> Self {
        Self {
            abstract_pages: config.assets.abstract_pages,
            dvcon_window: config.heuristics.dvcon_window,
            max_year: latest_plausible_year(),
        }
    }
}

impl Default for PdfScan {
    fn default() -> Self {
        Self {
            abstract_pages: 2,
            dvcon_window: 40,
            max_year: latest_plausible_year(),
        }
    }
}

/// Lower-cased file stem to path for every `*.pdf` in `dir`.
///
/// A missing directory is an empty index.
pub fn pdf_index(dir: &Path) -> BTreeMap<String, PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return BTreeMap::new();
    };

    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_pdf(path))
        .filter_map(|path| {
            let stem = path.file_stem()?.to_string_lossy().to_lowercase();
            Some((stem, path))
        })
        .collect()
}

pub(crate) fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Lower-cased last path segment of a URL or local path, extension removed.
pub fn link_stem(link: &str) -> String {
    let path = match url::Url::parse(link) {
        Ok(url) => url.path().to_string(),
        Err(_) => link.to_string(),
    };
    let last = path
        .trim_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_lowercase();

    match Path::new(&last).file_stem() {
        Some(stem) => stem.to_string_lossy().into_owned(),
        None => last,
    }
}

/// Exact stem match first, then containment in either direction.
pub fn match_pdf<'a>(stem: &str, index: &'a BTreeMap<String, PathBuf>) -> Option<&'a PathBuf> {
    if stem.is_empty() {
        return None;
    }
    index.get(stem).or_else(|| {
        index
            .iter()
            .find(|(candidate, _)| candidate.contains(stem) || stem.contains(candidate.as_str()))
            .map(|(_, path)| path)
    })
}

/// Year embedded in a file name.
///
/// Only the first year-like number counts; a stem whose first match is out
/// of range yields nothing.
pub fn year_from_file_name(stem: &str, max_year: i32) -> Option<i32> {
    first_year_match(stem).filter(|year| (1990..=max_year).contains(year))
}

/// Publication year guessed from first-page text.
///
/// Years appearing within `window` non-digit characters of "DVCon" win,
/// latest first; otherwise the latest plausible year on the page.
pub fn year_from_text(text: &str, window: usize, max_year: i32) -> Option<i32> {
    let mut candidates = plausible_years(text, max_year);
    candidates.sort_unstable_by(|a, b| b.cmp(a));
    candidates.dedup();
    let latest = *candidates.first()?;

    let lowered = text.to_lowercase();
    let near_dvcon = candidates.iter().copied().find(|year| {
        let pattern = format!(
            r"dvcon[^0-9]{{0,{w}}}{y}|{y}[^0-9]{{0,{w}}}dvcon",
            w = window,
            y = year
        );
        Regex::new(&pattern).is_ok_and(|re| re.is_match(&lowered))
    });

    Some(near_dvcon.unwrap_or(latest))
}

/// Year of a PDF: from its file name, else from its first page.
pub fn infer_pdf_year(pdf: &Path, extractor: &dyn TextExtractor, scan: &PdfScan) -> Option<i32> {
    let stem = pdf.file_stem()?.to_string_lossy();
    if let Some(year) = year_from_file_name(&stem, scan.max_year) {
        return Some(year);
    }

    match extractor.extract(pdf, 1) {
        Ok(text) => year_from_text(&text, scan.dvcon_window, scan.max_year),
        Err(e) => {
            tracing::debug!("Failed to infer year from DVCon PDF {}: {}", pdf.display(), e);
            None
        }
    }
}

/// Abstract of a PDF, if its first pages contain one.
pub fn pdf_abstract(pdf: &Path, extractor: &dyn TextExtractor, pages: usize) -> Option<String> {
    match extractor.extract(pdf, pages) {
        Ok(text) => extract_abstract(&text),
        Err(e) => {
            tracing::warn!("Failed to extract text from {}: {}", pdf.display(), e);
            None
        }
    }
}

/// Fill abstracts and placeholder dates of entries from matching PDFs.
///
/// Entries without a matching PDF, or whose PDF yields nothing, keep their
/// values. A specific date is never overwritten.
pub fn extract_abstracts(
    mut papers: Vec<Paper>,
    pdf_dir: &Path,
    extractor: &dyn TextExtractor,
    scan: &PdfScan,
) -> Vec<Paper> {
    let index = pdf_index(pdf_dir);
    if index.is_empty() {
        tracing::info!(
            "No PDF files found in {}; skipping abstract extraction",
            pdf_dir.display()
        );
        return papers;
    }
    tracing::info!("Extracting abstracts from {} downloaded DVCon PDFs", index.len());

    for paper in papers.iter_mut() {
        let stem = link_stem(&paper.link);
        let Some(pdf) = match_pdf(&stem, &index) else {
            tracing::debug!("No matching PDF found for {}", paper.link);
            continue;
        };

        tracing::info!(
            "Extracting abstract from PDF {} for entry: {}",
            pdf.display(),
            paper.title
        );
        match pdf_abstract(pdf, extractor, scan.abstract_pages) {
            Some(text) => paper.r#abstract = text,
            None => tracing::debug!("No abstract found in PDF: {}", pdf.display()),
        }

        if paper.has_placeholder_date() {
            if let Some(year) = infer_pdf_year(pdf, extractor, scan) {
                tracing::debug!("Inferred DVCon year {} for entry: {}", year, paper.title);
                paper.date = date_from_parts(i64::from(year), 1, 1);
            }
        }
    }

    let with_abstract = papers.iter().filter(|p| !p.r#abstract.is_empty()).count();
    tracing::info!(
        "Abstract extraction complete: {}/{} entries now have abstracts",
        with_abstract,
        papers.len()
    );
    papers
}
