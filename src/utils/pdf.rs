//! PDF text extraction utilities.
//!
//! Text is read from the PDF text layer first ([`DirectExtractor`]). When that
//! yields too little text the document is treated as a scan and its pages are
//! rendered and OCR'd ([`OcrExtractor`]), which needs the `pdftoppm` and
//! `tesseract` executables. Missing OCR tools only disable the fallback.

use regex::Regex;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;
use thiserror::Error;

/// Errors that can occur during PDF extraction
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("File not found or not a valid PDF: {0}")]
    InvalidFile(String),

    #[error("Failed to extract text from PDF: {0}")]
    ExtractionFailed(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that can pull text out of the first pages of a PDF
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path, max_pages: usize) -> Result<String, ExtractError>;
}

/// Reads the embedded text layer
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectExtractor;

impl DirectExtractor {
    fn extract_with_lopdf(path: &Path, max_pages: usize) -> Result<String, ExtractError> {
        let document = lopdf::Document::load(path)
            .map_err(|e| ExtractError::ExtractionFailed(e.to_string()))?;

        let pages: Vec<u32> = document.get_pages().keys().copied().take(max_pages).collect();
        let mut chunks = Vec::with_capacity(pages.len());
        for page in pages {
            let text = document
                .extract_text(&[page])
                .map_err(|e| ExtractError::ExtractionFailed(e.to_string()))?;
            chunks.push(text);
        }
        Ok(chunks.join("\n"))
    }
}

impl TextExtractor for DirectExtractor {
    fn extract(&self, path: &Path, max_pages: usize) -> Result<String, ExtractError> {
        if !path.is_file() {
            return Err(ExtractError::InvalidFile(path.display().to_string()));
        }

        let text = match contain_panic("lopdf", || Self::extract_with_lopdf(path, max_pages)) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(
                    "lopdf could not read {}: {}; trying pdf-extract",
                    path.display(),
                    e
                );
                contain_panic("pdf-extract", || {
                    pdf_extract::extract_text(path)
                        .map_err(|e| ExtractError::ExtractionFailed(e.to_string()))
                })?
            }
        };

        tracing::debug!(
            "Extracted {} characters from {}",
            text.chars().count(),
            path.display()
        );
        Ok(text)
    }
}

/// Run a PDF library call, turning a panic on malformed input into an error.
fn contain_panic<F>(library: &str, extract: F) -> Result<String, ExtractError>
where
    F: FnOnce() -> Result<String, ExtractError>,
{
    std::panic::catch_unwind(AssertUnwindSafe(extract)).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(ExtractError::ExtractionFailed(format!(
            "{} panicked: {}",
            library, reason
        )))
    })
}

/// Renders pages with `pdftoppm` and reads them with `tesseract`
#[derive(Debug, Clone)]
pub struct OcrExtractor {
    pdftoppm: PathBuf,
    tesseract: PathBuf,
    dpi: u32,
}

impl OcrExtractor {
    /// Probe for the OCR toolchain; `None` when either tool is missing.
    pub fn detect() -> Option<Self> {
        let candidate = Self {
            pdftoppm: PathBuf::from("pdftoppm"),
            tesseract: PathBuf::from("tesseract"),
            dpi: 300,
        };

        let has_pdftoppm = Command::new(&candidate.pdftoppm).arg("-v").output().is_ok();
        let has_tesseract = Command::new(&candidate.tesseract)
            .arg("--version")
            .output()
            .is_ok();

        if has_pdftoppm && has_tesseract {
            Some(candidate)
        } else {
            tracing::warn!(
                "OCR fallback disabled: pdftoppm found: {}, tesseract found: {}",
                has_pdftoppm,
                has_tesseract
            );
            None
        }
    }

    fn render_pages(&self, path: &Path, max_pages: usize, dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
        let prefix = dir.join("page");
        let output = Command::new(&self.pdftoppm)
            .arg("-f")
            .arg("1")
            .arg("-l")
            .arg(max_pages.max(1).to_string())
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .arg(path)
            .arg(&prefix)
            .output()?;

        if !output.status.success() {
            return Err(ExtractError::Ocr(format!(
                "pdftoppm exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let mut images: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
            .collect();
        images.sort();
        Ok(images)
    }
}

impl TextExtractor for OcrExtractor {
    fn extract(&self, path: &Path, max_pages: usize) -> Result<String, ExtractError> {
        let scratch = tempfile::TempDir::new()?;
        let images = self.render_pages(path, max_pages, scratch.path())?;

        let mut chunks = Vec::with_capacity(images.len());
        for (idx, image) in images.iter().enumerate() {
            let output = match Command::new(&self.tesseract).arg(image).arg("stdout").output() {
                Ok(output) if output.status.success() => output,
                Ok(output) => {
                    tracing::warn!(
                        "OCR failed on page {} of {}: {}",
                        idx + 1,
                        path.display(),
                        String::from_utf8_lossy(&output.stderr).trim()
                    );
                    continue;
                }
                Err(e) => {
                    tracing::warn!("OCR failed on page {} of {}: {}", idx + 1, path.display(), e);
                    continue;
                }
            };
            let text = String::from_utf8_lossy(&output.stdout).into_owned();
            tracing::debug!(
                "OCR page {} of {} produced {} characters",
                idx + 1,
                path.display(),
                text.chars().count()
            );
            chunks.push(text);
        }

        Ok(chunks.join("\n"))
    }
}

/// Direct extraction with an OCR fallback for scanned documents
pub struct FallbackExtractor {
    direct: Box<dyn TextExtractor>,
    ocr: Option<Box<dyn TextExtractor>>,
    min_direct_chars: usize,
}

impl FallbackExtractor {
    /// Direct text layer plus OCR when the toolchain is installed
    pub fn detect(min_direct_chars: usize) -> Self {
        Self {
            direct: Box::new(DirectExtractor),
            ocr: OcrExtractor::detect().map(|ocr| Box::new(ocr) as Box<dyn TextExtractor>),
            min_direct_chars,
        }
    }

    pub fn new(
        direct: Box<dyn TextExtractor>,
        ocr: Option<Box<dyn TextExtractor>>,
        min_direct_chars: usize,
    ) -> Self {
        Self {
            direct,
            ocr,
            min_direct_chars,
        }
    }

    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some()
    }
}

impl std::fmt::Debug for FallbackExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackExtractor")
            .field("ocr", &self.ocr.is_some())
            .field("min_direct_chars", &self.min_direct_chars)
            .finish()
    }
}

impl TextExtractor for FallbackExtractor {
    fn extract(&self, path: &Path, max_pages: usize) -> Result<String, ExtractError> {
        let direct = self.direct.extract(path, max_pages);
        let direct_len = direct.as_ref().map(|t| t.chars().count()).unwrap_or(0);
        if direct_len >= self.min_direct_chars {
            return direct;
        }

        let Some(ocr) = &self.ocr else {
            return direct;
        };

        tracing::info!(
            "Direct extraction from {} produced only {} characters; attempting OCR",
            path.display(),
            direct_len
        );
        match ocr.extract(path, max_pages) {
            Ok(text) if !text.trim().is_empty() => Ok(text),
            Ok(_) => direct,
            Err(e) => {
                tracing::warn!("OCR fallback failed for {}: {}", path.display(), e);
                direct
            }
        }
    }
}

static ABSTRACT_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\babstract\b").expect("valid abstract regex"));

static STOP_HEADINGS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b1\.\s*introduction\b",
        r"(?i)\b1\s+introduction\b",
        r"(?i)\bintroduction\b",
        r"(?i)\bkeywords\b",
        r"(?i)\bindex\s+terms\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid stop heading regex"))
    .collect()
});

/// Locate the abstract section of a paper's text.
///
/// Captures everything after the first "Abstract" heading up to the nearest
/// stop heading, joined into a single line.
pub fn extract_abstract(text: &str) -> Option<String> {
    let heading = ABSTRACT_HEADING.find(text)?;
    let rest = &text[heading.end()..];

    let stop = STOP_HEADINGS
        .iter()
        .filter_map(|re| re.find(rest).map(|m| m.start()))
        .min()
        .unwrap_or(rest.len());

    let abstract_text = rest[..stop]
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if abstract_text.is_empty() {
        None
    } else {
        Some(abstract_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedText(String);

    impl FixedText {
        fn boxed(text: &str) -> Box<dyn TextExtractor> {
            Box::new(FixedText(text.to_string()))
        }
    }

    impl TextExtractor for FixedText {
        fn extract(&self, _path: &Path, _max_pages: usize) -> Result<String, ExtractError> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    impl TextExtractor for Failing {
        fn extract(&self, _path: &Path, _max_pages: usize) -> Result<String, ExtractError> {
            Err(ExtractError::Ocr("tesseract crashed".to_string()))
        }
    }

    #[test]
    fn test_extract_abstract_stops_at_introduction() {
        let text = "Title\nAbstract\nWe present a UVM\nmethodology.\n\n1. Introduction\nBody";
        assert_eq!(
            extract_abstract(text).as_deref(),
            Some("We present a UVM methodology.")
        );
    }

    #[test]
    fn test_extract_abstract_stops_at_keywords() {
        let text = "ABSTRACT- Coverage driven flow. Keywords: UVM, coverage";
        assert_eq!(
            extract_abstract(text).as_deref(),
            Some("- Coverage driven flow.")
        );
    }

    #[test]
    fn test_extract_abstract_index_terms_and_end_of_text() {
        assert_eq!(
            extract_abstract("abstract text here Index  Terms x").as_deref(),
            Some("text here")
        );
        assert_eq!(
            extract_abstract("Abstract\n runs to the end ").as_deref(),
            Some("runs to the end")
        );
    }

    #[test]
    fn test_extract_abstract_missing_or_empty() {
        assert_eq!(extract_abstract("no heading here"), None);
        assert_eq!(extract_abstract("Abstract\n\nIntroduction"), None);
        assert_eq!(extract_abstract(""), None);
        assert_eq!(extract_abstract("abstraction layers"), None);
    }

    #[test]
    fn test_fallback_keeps_long_direct_text() {
        let long = "x".repeat(300);
        let extractor =
            FallbackExtractor::new(FixedText::boxed(&long), Some(FixedText::boxed("ocr text")), 200);
        let text = extractor.extract(Path::new("unused.pdf"), 2).unwrap();
        assert_eq!(text.len(), 300);
    }

    #[test]
    fn test_fallback_uses_ocr_for_short_text() {
        let extractor =
            FallbackExtractor::new(FixedText::boxed("short"), Some(FixedText::boxed("ocr text")), 200);
        assert_eq!(extractor.extract(Path::new("unused.pdf"), 2).unwrap(), "ocr text");
    }

    #[test]
    fn test_fallback_without_ocr_or_with_failing_ocr() {
        let without = FallbackExtractor::new(FixedText::boxed("short"), None, 200);
        assert!(!without.has_ocr());
        assert_eq!(without.extract(Path::new("unused.pdf"), 2).unwrap(), "short");

        let failing = FallbackExtractor::new(FixedText::boxed("short"), Some(Box::new(Failing)), 200);
        assert_eq!(failing.extract(Path::new("unused.pdf"), 2).unwrap(), "short");
    }

    #[test]
    fn test_direct_extract_missing_file() {
        let result = DirectExtractor.extract(Path::new("/nonexistent/file.pdf"), 2);
        assert!(matches!(result, Err(ExtractError::InvalidFile(_))));
    }

    #[test]
    fn test_library_panic_becomes_error() {
        let result = contain_panic("pdf-extract", || panic!("unexpected end of xref"));
        match result {
            Err(ExtractError::ExtractionFailed(message)) => {
                assert!(message.contains("pdf-extract panicked"));
                assert!(message.contains("unexpected end of xref"));
            }
            other => panic!("expected an extraction error, got {:?}", other),
        }

        assert_eq!(contain_panic("lopdf", || Ok("text".to_string())).unwrap(), "text");
    }
}
