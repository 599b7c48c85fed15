//! Rewrites placeholder dates in an already rendered digest.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::abstracts::{infer_pdf_year, is_pdf, PdfScan};
use super::AssetError;
use crate::utils::TextExtractor;

/// Date cell written for entries without a known date
const PLACEHOLDER_CELL: &str = "| 1970-01-01 |";

static TITLE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*\[.*?\]\(([^()\s]+)\)\*\*").expect("valid title link regex")
});

fn local_pdf(link: &str, base_dir: &Path) -> Option<PathBuf> {
    if link.contains("://") {
        return None;
    }
    let path = base_dir.join(link);
    (is_pdf(&path) && path.is_file()).then_some(path)
}

/// Replace placeholder dates of rows linking a local PDF with the PDF's year.
///
/// Relative links are resolved against `base_dir`. Returns the patched
/// document and the number of rows changed.
pub fn patch_markdown_years(
    markdown: &str,
    base_dir: &Path,
    extractor: &dyn TextExtractor,
    scan: &PdfScan,
) -> (String, usize) {
    let mut patched = 0;
    let lines: Vec<String> = markdown
        .split('\n')
        .map(|line| {
            if !line.contains(PLACEHOLDER_CELL) {
                return line.to_string();
            }
            let year = TITLE_LINK
                .captures(line)
                .and_then(|caps| local_pdf(&caps[1], base_dir))
                .and_then(|pdf| infer_pdf_year(&pdf, extractor, scan));
            match year {
                Some(year) => {
                    patched += 1;
                    line.replacen(PLACEHOLDER_CELL, &format!("| {}-01-01 |", year), 1)
                }
                None => line.to_string(),
            }
        })
        .collect();

    (lines.join("\n"), patched)
}

/// Patch the Markdown file at `path` in place.
///
/// The file is only rewritten when at least one row changed.
pub fn patch_placeholder_years(
    path: &Path,
    extractor: &dyn TextExtractor,
    scan: &PdfScan,
) -> Result<usize, AssetError> {
    let markdown = std::fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));

    let (patched_markdown, patched) = patch_markdown_years(&markdown, base_dir, extractor, scan);
    if patched > 0 {
        std::fs::write(path, patched_markdown)?;
        tracing::info!(
            "Patched {} placeholder dates in {} from local PDFs",
            patched,
            path.display()
        );
    }
    Ok(patched)
}
