//! Registry for managing provider adapters.

use std::sync::Arc;

use super::{arxiv::ArxivSource, Source};
use crate::config::Config;
use crate::models::SourceKind;
use crate::utils::HttpClient;

#[cfg(feature = "source-acm")]
use super::acm::AcmSource;
#[cfg(feature = "source-crossref")]
use super::crossref::CrossRefSource;
#[cfg(feature = "source-dvcon")]
use super::dvcon::DvconSource;
#[cfg(feature = "source-ieee")]
use super::ieee::IeeeSource;
#[cfg(feature = "source-openalex")]
use super::openalex::OpenAlexSource;
#[cfg(feature = "source-semantic")]
use super::semantic::SemanticScholarSource;

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const SEARCH = 1 << 0;
        /// Entries link to detail pages with downloadable assets
        const ASSETS = 1 << 1;
        /// Results are walked page by page
        const PAGINATED = 1 << 2;
        /// Results come from scraped HTML rather than an API
        const SCRAPED = 1 << 3;
        /// Requests need a credential
        const AUTHENTICATED = 1 << 4;
    }
}

/// Ordered registry of provider adapters
///
/// Iteration follows [`SourceKind::QUERY_ORDER`] regardless of the order in
/// which sources were registered.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn Source>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every compiled-in provider, sharing the injected clients.
    ///
    /// `api` is used for the documented JSON/Atom APIs, `browser` for the
    /// endpoints that reject non-browser clients (IEEE, DVCon).
    #[cfg_attr(
        not(any(feature = "source-ieee", feature = "source-dvcon")),
        allow(unused_variables)
    )]
    pub fn from_config(config: &Config, api: Arc<HttpClient>, browser: Arc<HttpClient>) -> Self {
        let providers = &config.providers;
        let mut registry = Self::new();

        registry.register(Arc::new(
            ArxivSource::new(Arc::clone(&api)).with_base_url(&providers.arxiv_url),
        ));

        #[cfg(feature = "source-crossref")]
        registry.register(Arc::new(
            CrossRefSource::new(Arc::clone(&api), &providers.crossref_mailto)
                .with_base_url(&providers.crossref_url),
        ));

        #[cfg(feature = "source-openalex")]
        registry.register(Arc::new(
            OpenAlexSource::new(Arc::clone(&api)).with_base_url(&providers.openalex_url),
        ));

        #[cfg(feature = "source-semantic")]
        registry.register(Arc::new(
            SemanticScholarSource::new(Arc::clone(&api))
                .with_base_url(&providers.semantic_scholar_url),
        ));

        #[cfg(feature = "source-acm")]
        registry.register(Arc::new(
            AcmSource::new(Arc::clone(&api), providers.acm_access_token.clone())
                .with_base_url(&providers.acm_base_url),
        ));

        #[cfg(feature = "source-ieee")]
        registry.register(Arc::new(
            IeeeSource::new(Arc::clone(&browser))
                .with_base_url(&providers.ieee_url)
                .with_page_attempts(config.retry.page_attempts),
        ));

        #[cfg(feature = "source-dvcon")]
        registry.register(Arc::new(
            DvconSource::new(Arc::clone(&browser)).with_base_url(&providers.dvcon_url),
        ));

        registry
    }

    /// Register a source, replacing any source of the same kind
    pub fn register(&mut self, source: Arc<dyn Source>) {
        self.sources.retain(|s| s.kind() != source.kind());
        self.sources.push(source);
        self.sources.sort_by_key(|s| query_rank(s.kind()));
    }

    /// Get a source by kind
    pub fn get(&self, kind: SourceKind) -> Option<&Arc<dyn Source>> {
        self.sources.iter().find(|s| s.kind() == kind)
    }

    /// Get a source by its identifier
    pub fn get_by_id(&self, id: &str) -> Option<&Arc<dyn Source>> {
        self.sources.iter().find(|s| s.id() == id)
    }

    /// All registered sources in query order
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Source>> {
        self.sources.iter()
    }

    /// Registered kinds in query order
    pub fn kinds(&self) -> impl Iterator<Item = SourceKind> + '_ {
        self.sources.iter().map(|s| s.kind())
    }

    /// Get sources that support a specific capability
    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<&Arc<dyn Source>> {
        self.all()
            .filter(|s| s.capabilities().contains(capability))
            .collect()
    }

    /// Check if a source exists
    pub fn has(&self, kind: SourceKind) -> bool {
        self.get(kind).is_some()
    }

    /// Get the number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

fn query_rank(kind: SourceKind) -> usize {
    SourceKind::QUERY_ORDER
        .iter()
        .position(|k| *k == kind)
        .unwrap_or(SourceKind::QUERY_ORDER.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockSource;

    fn registry() -> SourceRegistry {
        let api = Arc::new(HttpClient::new().unwrap());
        let browser = Arc::new(HttpClient::browser().unwrap());
        SourceRegistry::from_config(&Config::default(), api, browser)
    }

    #[test]
    fn test_registry_basic() {
        let registry = registry();

        assert_eq!(registry.len(), 7);
        assert!(!registry.is_empty());
        assert!(registry.has(SourceKind::Arxiv));
    }

    #[test]
    fn test_query_order() {
        let kinds: Vec<SourceKind> = registry().kinds().collect();
        assert_eq!(kinds, SourceKind::QUERY_ORDER.to_vec());
    }

    #[test]
    fn test_get_source() {
        let registry = registry();

        let arxiv = registry.get_by_id("arxiv");
        assert!(arxiv.is_some());
        assert!(arxiv.unwrap().is_mandatory());
        assert!(registry.get_by_id("nonexistent").is_none());
    }

    #[test]
    fn test_capabilities() {
        let registry = registry();

        let with_assets = registry.with_capability(SourceCapabilities::ASSETS);
        assert_eq!(with_assets.len(), 1);
        assert_eq!(with_assets[0].kind(), SourceKind::Dvcon);

        let ieee = registry.get(SourceKind::Ieee).unwrap();
        assert!(ieee.capabilities().contains(SourceCapabilities::PAGINATED));
        assert!(!ieee.supports_assets());
    }

    #[test]
    fn test_register_replaces_same_kind() {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(MockSource::new(SourceKind::Arxiv)));
        registry.register(Arc::new(MockSource::new(SourceKind::Dvcon)));
        registry.register(Arc::new(MockSource::new(SourceKind::Arxiv)));

        let kinds: Vec<SourceKind> = registry.kinds().collect();
        assert_eq!(kinds, vec![SourceKind::Dvcon, SourceKind::Arxiv]);
    }
}
