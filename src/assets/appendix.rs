//! Standalone Markdown appendix of per-PDF abstracts.

use std::path::{Path, PathBuf};

use super::abstracts::{is_pdf, pdf_abstract, year_from_file_name, PdfScan};
use super::AssetError;
use crate::utils::TextExtractor;

const PREAMBLE: &str = "# DVCon PDF Abstracts

This file is generated from downloaded DVCon PDFs. Text is read from the PDF
text layer, and scanned documents are OCR'd when the optional `pdftoppm`
(Poppler) and `tesseract` executables are installed.

The project abstract and search-friendly description are maintained in the
main `README.md`. This file is a supporting appendix listing per-paper
abstracts extracted from DVCon PDFs.
";

/// Display title of a PDF: its stem with `_` and `-` turned into spaces
fn display_title(stem: &str) -> String {
    stem.replace(['_', '-'], " ")
}

/// PDFs in `dir`, latest filename year first, then by name descending.
fn sorted_pdfs(dir: &Path, max_year: i32) -> Result<Vec<PathBuf>, AssetError> {
    let mut pdfs: Vec<(i32, String, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_pdf(path))
        .map(|path| {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let year = year_from_file_name(&stem, max_year).unwrap_or(0);
            (year, stem.to_lowercase(), path)
        })
        .collect();

    pdfs.sort_by(|a, b| (b.0, &b.1).cmp(&(a.0, &a.1)));
    Ok(pdfs.into_iter().map(|(_, _, path)| path).collect())
}

/// Render the appendix for the PDFs in `pdf_dir`
pub fn render_abstracts_appendix(
    pdf_dir: &Path,
    extractor: &dyn TextExtractor,
    scan: &PdfScan,
) -> Result<String, AssetError> {
    let pdfs = if pdf_dir.is_dir() {
        sorted_pdfs(pdf_dir, scan.max_year)?
    } else {
        Vec::new()
    };
    if pdfs.is_empty() {
        tracing::warn!("No PDF files found in {}; appendix has no rows", pdf_dir.display());
    }

    let mut lines = vec![
        PREAMBLE.to_string(),
        "| Paper | Abstract |".to_string(),
        "| --- | --- |".to_string(),
    ];
    for pdf in &pdfs {
        tracing::info!("Extracting abstract from DVCon PDF: {}", pdf.display());
        let stem = pdf
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let abstract_text = pdf_abstract(pdf, extractor, scan.abstract_pages)
            .unwrap_or_else(|| "N/A".to_string())
            .replace('|', "\\|");
        lines.push(format!("| {} | {} |", display_title(&stem), abstract_text));
    }

    Ok(lines.join("\n") + "\n")
}

/// Write the appendix for the PDFs in `pdf_dir` to `output`.
///
/// Returns the number of PDFs listed.
pub fn write_abstracts_appendix(
    pdf_dir: &Path,
    output: &Path,
    extractor: &dyn TextExtractor,
    scan: &PdfScan,
) -> Result<usize, AssetError> {
    let content = render_abstracts_appendix(pdf_dir, extractor, scan)?;
    let rows = content
        .lines()
        .filter(|l| l.starts_with("| "))
        .count()
        .saturating_sub(2);

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, content)?;
    tracing::info!("Wrote DVCon abstracts appendix to {}", output.display());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::abstracts::tests::CannedText;

    fn scan() -> PdfScan {
        PdfScan {
            abstract_pages: 2,
            dvcon_window: 40,
            max_year: 2026,
        }
    }

    #[test]
    fn test_appendix_rows_sorted_and_escaped() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["alpha-check.pdf", "DVCon_2023_uvm.pdf", "DVCon_2025_formal.pdf", "readme.txt"] {
            std::fs::write(dir.path().join(name), b"%PDF").unwrap();
        }
        let extractor = CannedText::default()
            .with("DVCon_2025_formal.pdf", "Abstract\nProperties a | b hold.\nIntroduction")
            .with("DVCon_2023_uvm.pdf", "no heading");

        let content = render_abstracts_appendix(dir.path(), &extractor, &scan()).unwrap();

        assert!(content.starts_with("# DVCon PDF Abstracts\n"));
        let rows: Vec<&str> = content.lines().filter(|l| l.starts_with("| ")).collect();
        assert_eq!(
            rows,
            vec![
                "| Paper | Abstract |",
                "| --- | --- |",
                "| DVCon 2025 formal | Properties a \\| b hold. |",
                "| DVCon 2023 uvm | N/A |",
                "| alpha check | N/A |",
            ]
        );
    }

    #[test]
    fn test_write_appendix_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let pdf_dir = dir.path().join("pdfs");
        std::fs::create_dir(&pdf_dir).unwrap();
        std::fs::write(pdf_dir.join("x_2024.pdf"), b"%PDF").unwrap();
        let output = dir.path().join("docs").join("DVCON_README.md");

        let rows = write_abstracts_appendix(&pdf_dir, &output, &CannedText::default(), &scan()).unwrap();

        assert_eq!(rows, 1);
        let written = std::fs::read_to_string(&output).unwrap();
        assert!(written.contains("| x 2024 | N/A |"));
        assert!(written.ends_with("|\n"));
    }

    #[test]
    fn test_missing_directory_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("appendix.md");
        let rows = write_abstracts_appendix(
            &dir.path().join("missing"),
            &output,
            &CannedText::default(),
            &scan(),
        )
        .unwrap();
        assert_eq!(rows, 0);
        assert!(std::fs::read_to_string(&output).unwrap().contains("| --- | --- |"));
    }
}
