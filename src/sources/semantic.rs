//! Semantic Scholar research source implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::filter::TopicFilter;
use crate::models::{date_from_year, Paper, PaperBuilder, SourceKind};
use crate::sources::{decode_items, endpoint, Source, SourceError};
use crate::utils::{check_status, HttpClient};

const SEMANTIC_SCHOLAR_API_BASE: &str = "https://api.semanticscholar.org";

/// Fields requested from the graph search endpoint
const SEARCH_FIELDS: &str = "title,abstract,authors,venue,year,url";

/// Largest `limit` accepted by the search endpoint
const MAX_LIMIT: usize = 100;

/// Semantic Scholar research source
///
/// Only the publication year is exposed, so dates are always January 1st.
#[derive(Debug, Clone)]
pub struct SemanticScholarSource {
    client: Arc<HttpClient>,
    base_url: String,
}

impl SemanticScholarSource {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            base_url: SEMANTIC_SCHOLAR_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    fn search_url(&self, keyword: &str, max_results: usize) -> String {
        format!(
            "{}?query={}&limit={}&offset=0&fields={}",
            endpoint(&self.base_url, "graph/v1/paper/search"),
            urlencoding::encode(keyword),
            max_results.clamp(1, MAX_LIMIT),
            SEARCH_FIELDS
        )
    }

    /// Decode a graph search response body
    pub fn parse_response(body: &str) -> Result<Vec<Paper>, SourceError> {
        let data: SSResponse = serde_json::from_str(body)?;
        let items: Vec<SSPaper> = decode_items(data.data, "Semantic Scholar");
        Ok(items.into_iter().map(SSPaper::into_paper).collect())
    }
}

#[async_trait]
impl Source for SemanticScholarSource {
    fn kind(&self) -> SourceKind {
        SourceKind::SemanticScholar
    }

    fn topic_filter(&self) -> TopicFilter {
        TopicFilter::Verification
    }

    async fn fetch(&self, keyword: &str, max_results: usize) -> Result<Vec<Paper>, SourceError> {
        let url = self.search_url(keyword, max_results);
        tracing::info!(
            "Requesting papers from Semantic Scholar for keyword: {}",
            keyword
        );

        let response = self.client.get(&url).send().await.map_err(|e| {
            SourceError::Network(format!("Failed to search Semantic Scholar: {}", e))
        })?;
        let response = check_status(response, "Semantic Scholar").await?;

        let body = response.text().await.map_err(|e| {
            SourceError::Network(format!("Failed to read Semantic Scholar response: {}", e))
        })?;

        let papers = Self::parse_response(&body)?;
        tracing::info!("Retrieved {} papers from Semantic Scholar", papers.len());
        Ok(papers)
    }
}

// ===== Semantic Scholar API Types =====

#[derive(Debug, Deserialize)]
struct SSResponse {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SSPaper {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    r#abstract: Option<String>,
    #[serde(default)]
    authors: Vec<SSAuthor>,
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    year: Option<i64>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SSAuthor {
    #[serde(default)]
    name: Option<String>,
}

impl SSPaper {
    fn into_paper(self) -> Paper {
        PaperBuilder::new(self.title.unwrap_or_default(), self.url.unwrap_or_default())
            .abstract_text(self.r#abstract.unwrap_or_default())
            .authors(self.authors.into_iter().filter_map(|a| a.name))
            .tag(SourceKind::SemanticScholar.tag())
            .comment(self.venue.unwrap_or_default())
            .date(date_from_year(self.year))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "total": 2,
        "offset": 0,
        "data": [
            {
                "paperId": "abc",
                "title": "Assertion mining for SoC designs",
                "abstract": null,
                "authors": [{"authorId": "1", "name": "Barbara Liskov"}],
                "venue": "DAC",
                "year": 2022,
                "url": "https://www.semanticscholar.org/paper/abc"
            },
            {
                "paperId": "def",
                "title": "No year here",
                "authors": [],
                "year": null
            }
        ]
    }"#;

    #[test]
    fn test_parse_response() {
        let papers = SemanticScholarSource::parse_response(BODY).unwrap();
        assert_eq!(papers.len(), 2);

        assert_eq!(papers[0].date, "2022-01-01T00:00:00Z");
        assert_eq!(papers[0].authors, vec!["Barbara Liskov"]);
        assert_eq!(papers[0].comment, "DAC");
        assert_eq!(papers[0].tags, vec!["SemanticScholar"]);
        assert_eq!(papers[0].r#abstract, "");

        assert_eq!(papers[1].date, "1970-01-01T00:00:00Z");
        assert_eq!(papers[1].authors, vec!["Unknown"]);
    }

    #[tokio::test]
    async fn test_fetch_requests_explicit_fields() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/graph/v1/paper/search")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("query".into(), "UVM".into()),
                mockito::Matcher::UrlEncoded("limit".into(), "100".into()),
                mockito::Matcher::UrlEncoded("fields".into(), SEARCH_FIELDS.into()),
            ]))
            .with_status(200)
            .with_body(BODY)
            .create_async()
            .await;

        let source = SemanticScholarSource::new(Arc::new(HttpClient::new().unwrap()))
            .with_base_url(&server.url());
        let papers = source.fetch("UVM", 250).await.unwrap();

        mock.assert_async().await;
        assert_eq!(papers.len(), 2);
    }

    #[tokio::test]
    async fn test_server_error_is_retriable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let source = SemanticScholarSource::new(Arc::new(HttpClient::new().unwrap()))
            .with_base_url(&server.url());
        let err = source.fetch("UVM", 5).await.unwrap_err();
        assert!(!err.is_client_error());
    }
}
