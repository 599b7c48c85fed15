//! Utility modules shared by the sources and the pipeline.
//!
//! - [`HttpClient`]: reqwest client constructed once and injected into adapters
//! - [`with_retry`] / [`fetch_with_retry`]: bounded retry with fixed backoff
//! - [`FallbackExtractor`]: PDF text extraction with an OCR fallback
//! - [`extract_abstract`]: locate the abstract section in extracted text
//! - text helpers for whitespace, HTML markup and year detection

mod http;
mod pdf;
mod retry;
mod text;

pub use http::{browser_headers, check_status, HttpClient, BROWSER_USER_AGENT};
pub use pdf::{
    extract_abstract, DirectExtractor, ExtractError, FallbackExtractor, OcrExtractor,
    TextExtractor,
};
pub use retry::{fetch_with_retry, with_retry, RetryError, RetryPolicy};
pub use text::{
    collapse_whitespace, first_year_match, latest_plausible_year, plausible_years, strip_html_tags,
};
