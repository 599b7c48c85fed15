//! DVCon asset pipeline.
//!
//! Scraped DVCon entries point at detail pages. The pipeline resolves each
//! page's downloadable file, stores it under the download directory and
//! rewrites the entry link to the local copy. Downloaded PDFs are then read
//! (text layer first, OCR as a fallback) to back-fill abstracts and replace
//! placeholder dates. Every step is best effort: a failing entry keeps its
//! original values and the run continues.

mod abstracts;
mod appendix;
mod download;
mod years;

use thiserror::Error;

use crate::sources::SourceError;

pub use abstracts::{
    extract_abstracts, infer_pdf_year, link_stem, match_pdf, pdf_index, year_from_file_name,
    year_from_text, PdfScan,
};
pub use appendix::{render_abstracts_appendix, write_abstracts_appendix};
pub use download::{
    asset_file_name, find_asset_link, link_relative_to, AssetDownloader, DownloadSummary,
    DVCON_REFERER,
};
pub use years::{patch_markdown_years, patch_placeholder_years};

/// Errors raised while handling assets
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("No downloadable asset found on {0}")]
    NoAsset(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
