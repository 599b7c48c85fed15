//! # Daily Papers
//!
//! Aggregates research-paper metadata from arXiv, CrossRef, OpenAlex,
//! Semantic Scholar, IEEE Xplore, the ACM Digital Library and the DVCon
//! proceedings archive, and publishes it as a Markdown digest.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: The normalized [`Paper`] schema and its column projection
//! - [`sources`]: Provider adapters behind the [`Source`] trait
//! - [`filter`]: Topic filters applied to each provider batch
//! - [`assets`]: DVCon asset download and PDF abstract/year back-fill
//! - [`render`]: Markdown tables and the output documents
//! - [`pipeline`]: The update run (selection, backups, archive)
//! - [`utils`]: HTTP client, retry wrapper, PDF text extraction
//! - [`config`]: Configuration management

pub mod assets;
pub mod config;
pub mod filter;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use models::{Paper, PaperBuilder, SourceKind};
pub use pipeline::{Pipeline, Profile, RunOptions, RunOutcome};
pub use sources::{Source, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
