//! OpenAlex research source implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::filter::TopicFilter;
use crate::models::{resolve_date, Paper, PaperBuilder, SourceKind};
use crate::sources::{decode_items, endpoint, Source, SourceError};
use crate::utils::{check_status, HttpClient};

const OPENALEX_API_BASE: &str = "https://api.openalex.org";

/// OpenAlex caps `per-page` at 200
const MAX_PER_PAGE: usize = 200;

/// OpenAlex research source
#[derive(Debug, Clone)]
pub struct OpenAlexSource {
    client: Arc<HttpClient>,
    base_url: String,
}

impl OpenAlexSource {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            base_url: OPENALEX_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    fn search_url(&self, keyword: &str, max_results: usize) -> String {
        format!(
            "{}?search={}&per-page={}&sort=publication_date:desc",
            endpoint(&self.base_url, "works"),
            urlencoding::encode(keyword),
            max_results.clamp(1, MAX_PER_PAGE)
        )
    }

    /// Decode a `works` response body
    pub fn parse_response(body: &str) -> Result<Vec<Paper>, SourceError> {
        let data: OAResponse = serde_json::from_str(body)?;
        let works: Vec<OAWork> = decode_items(data.results, "OpenAlex");
        Ok(works.into_iter().map(OAWork::into_paper).collect())
    }
}

/// Rebuild abstract text from OpenAlex's `{word: [positions]}` index.
///
/// Each word is placed at every position it was recorded at and the words
/// are joined in position order.
pub fn rebuild_abstract(index: &HashMap<String, Vec<usize>>) -> String {
    let positions: BTreeMap<usize, &str> = index
        .iter()
        .flat_map(|(word, idxs)| idxs.iter().map(move |idx| (*idx, word.as_str())))
        .collect();
    positions.into_values().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl Source for OpenAlexSource {
    fn kind(&self) -> SourceKind {
        SourceKind::OpenAlex
    }

    fn topic_filter(&self) -> TopicFilter {
        TopicFilter::Verification
    }

    async fn fetch(&self, keyword: &str, max_results: usize) -> Result<Vec<Paper>, SourceError> {
        let url = self.search_url(keyword, max_results);
        tracing::info!("Requesting papers from OpenAlex for keyword: {}", keyword);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to search OpenAlex: {}", e)))?;
        let response = check_status(response, "OpenAlex").await?;

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read OpenAlex response: {}", e)))?;

        let papers = Self::parse_response(&body)?;
        tracing::info!("Retrieved {} papers from OpenAlex", papers.len());
        Ok(papers)
    }
}

// ===== OpenAlex API Types =====

#[derive(Debug, Deserialize)]
struct OAResponse {
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OAWork {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
    #[serde(default)]
    authorships: Vec<OAAuthorship>,
    #[serde(default)]
    primary_location: Option<OALocation>,
    #[serde(default)]
    publication_date: Option<String>,
    #[serde(default)]
    host_venue: Option<OANamed>,
}

#[derive(Debug, Deserialize)]
struct OAAuthorship {
    #[serde(default)]
    author: Option<OANamed>,
}

#[derive(Debug, Deserialize)]
struct OALocation {
    #[serde(default)]
    landing_page_url: Option<String>,
    #[serde(default)]
    source: Option<OANamed>,
}

#[derive(Debug, Deserialize)]
struct OANamed {
    #[serde(default)]
    display_name: Option<String>,
}

impl OAWork {
    fn into_paper(self) -> Paper {
        let abstract_text = self
            .abstract_inverted_index
            .as_ref()
            .map(rebuild_abstract)
            .unwrap_or_default();

        let authors: Vec<String> = self
            .authorships
            .into_iter()
            .filter_map(|a| a.author?.display_name)
            .collect();

        let link = self
            .primary_location
            .as_ref()
            .and_then(|loc| loc.landing_page_url.clone())
            .or(self.id)
            .unwrap_or_default();

        let venue = self
            .host_venue
            .and_then(|v| v.display_name)
            .or_else(|| {
                self.primary_location
                    .and_then(|loc| loc.source)
                    .and_then(|s| s.display_name)
            })
            .unwrap_or_default();

        PaperBuilder::new(self.title.unwrap_or_default(), link)
            .abstract_text(abstract_text)
            .authors(authors)
            .tag(SourceKind::OpenAlex.tag())
            .comment(venue)
            .date(resolve_date(self.publication_date.as_deref(), None))
            .build()
    }
}
