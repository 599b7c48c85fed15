//! Provider adapters with an extensible trait-based architecture.
//!
//! Each provider implements [`Source`]: one keyword query in, normalized
//! [`Paper`]s out. Adapters receive their [`HttpClient`](crate::utils::HttpClient)
//! and base URL at construction, so tests can point them at a local server.
//!
//! # Feature Flags
//!
//! arXiv is the mandatory source and is always compiled in. The optional
//! providers can be left out at compile time:
//!
//! - `crossref` - CrossRef works search
//! - `openalex` - OpenAlex works search
//! - `semantic` - Semantic Scholar graph search
//! - `acm` - ACM Digital Library metadata API (needs `ACM_ACCESS_TOKEN`)
//! - `ieee` - IEEE Xplore internal search endpoint
//! - `dvcon` - DVCon proceedings archive scraper
//!
//! # Feature Groups
//!
//! - `aggregators` - crossref, openalex, semantic
//! - `hardware` - ieee, acm, dvcon
//! - `full` - everything (default)
//!
//! # Error handling
//!
//! Transport failures are returned as [`SourceError`] and classified by the
//! retry wrapper. A single malformed record never fails a batch: items are
//! decoded one by one with [`decode_items`] and bad ones are logged and
//! skipped.

#[cfg(feature = "source-acm")]
mod acm;
mod arxiv;
#[cfg(feature = "source-crossref")]
mod crossref;
#[cfg(feature = "source-dvcon")]
mod dvcon;
#[cfg(feature = "source-ieee")]
mod ieee;
#[cfg(feature = "source-openalex")]
mod openalex;
mod registry;
#[cfg(feature = "source-semantic")]
mod semantic;

pub mod mock;

pub use mock::{MockOutcome, MockSource};
pub use registry::{SourceCapabilities, SourceRegistry};

#[cfg(feature = "source-acm")]
pub use acm::AcmSource;
pub use arxiv::{build_arxiv_query, ArxivSource, Operator};
#[cfg(feature = "source-crossref")]
pub use crossref::CrossRefSource;
#[cfg(feature = "source-dvcon")]
pub use dvcon::{extract_candidates, CandidateLink, DvconSource};
#[cfg(feature = "source-ieee")]
pub use ieee::IeeeSource;
#[cfg(feature = "source-openalex")]
pub use openalex::OpenAlexSource;
#[cfg(feature = "source-semantic")]
pub use semantic::SemanticScholarSource;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::filter::TopicFilter;
use crate::models::{Paper, SourceKind};

/// The Source trait defines the interface for all provider adapters.
///
/// # Implementing a New Source
///
/// 1. Add a [`SourceKind`] variant for the provider
/// 2. Create a struct holding an injected client and base URL
/// 3. Implement `kind` and `fetch`; override `topic_filter`,
///    `capabilities` or `check_config` where the provider needs it
/// 4. Register it in [`SourceRegistry::from_config`]
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Which provider this adapter talks to
    fn kind(&self) -> SourceKind;

    /// Unique identifier for this source (e.g. "arxiv", "crossref")
    fn id(&self) -> &str {
        self.kind().id()
    }

    /// Human-readable name of this source
    fn name(&self) -> &str {
        self.kind().name()
    }

    /// Describe the capabilities of this source
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    /// Whether a failed fetch must abort the run
    fn is_mandatory(&self) -> bool {
        false
    }

    /// Post-filter applied to every fetched batch
    fn topic_filter(&self) -> TopicFilter {
        TopicFilter::None
    }

    /// Fail fast on missing configuration before any request is made
    fn check_config(&self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Whether fetched entries link to downloadable assets
    fn supports_assets(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::ASSETS)
    }

    /// Run one keyword query and normalize the response
    async fn fetch(&self, keyword: &str, max_results: usize) -> Result<Vec<Paper>, SourceError>;
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Network or transport error
    #[error("Network error: {0}")]
    Network(String),

    /// The provider answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Parsing error (Atom, JSON, HTML)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Missing or invalid configuration such as an access token
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file system)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl SourceError {
    /// HTTP 4xx: the request itself is wrong, retrying will not help
    pub fn is_client_error(&self) -> bool {
        matches!(self, SourceError::Http { status, .. } if (400..500).contains(status))
    }

    pub fn is_config_error(&self) -> bool {
        matches!(self, SourceError::Config(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => SourceError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => SourceError::Network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

/// Decode provider items one at a time, skipping the ones that do not fit.
pub fn decode_items<T: DeserializeOwned>(items: Vec<serde_json::Value>, provider: &str) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(idx, item)| match serde_json::from_value::<T>(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!("Skipping malformed {} record #{}: {}", provider, idx, e);
                None
            }
        })
        .collect()
}

/// Join a path onto a base URL that may or may not end with a slash.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Item {
        title: String,
    }

    #[test]
    fn test_source_capabilities() {
        let caps = SourceCapabilities::SEARCH | SourceCapabilities::ASSETS;

        assert!(caps.contains(SourceCapabilities::SEARCH));
        assert!(caps.contains(SourceCapabilities::ASSETS));
        assert!(!caps.contains(SourceCapabilities::PAGINATED));
    }

    #[test]
    fn test_error_classification() {
        let not_found = SourceError::Http {
            status: 404,
            message: "missing".into(),
        };
        let server = SourceError::Http {
            status: 503,
            message: "busy".into(),
        };

        assert!(not_found.is_client_error());
        assert!(!server.is_client_error());
        assert!(!SourceError::Network("reset".into()).is_client_error());
        assert!(SourceError::Config("token".into()).is_config_error());
    }

    #[test]
    fn test_decode_items_skips_malformed() {
        let items = vec![
            serde_json::json!({"title": "ok"}),
            serde_json::json!({"title": 42}),
            serde_json::json!({"title": "also ok"}),
        ];

        let decoded: Vec<Item> = decode_items(items, "Test");
        let titles: Vec<&str> = decoded.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["ok", "also ok"]);
    }

    #[test]
    fn test_endpoint_join() {
        assert_eq!(endpoint("https://a.org/", "/works"), "https://a.org/works");
        assert_eq!(endpoint("https://a.org", "works"), "https://a.org/works");
    }
}
