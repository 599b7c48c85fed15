//! CrossRef research source implementation.

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use std::sync::Arc;

use crate::filter::TopicFilter;
use crate::models::{date_from_parts, Paper, PaperBuilder, SourceKind, PLACEHOLDER_DATE};
use crate::sources::{decode_items, endpoint, Source, SourceError};
use crate::utils::{check_status, strip_html_tags, HttpClient};

const CROSSREF_API_BASE: &str = "https://api.crossref.org";

/// Largest `rows` value CrossRef accepts
const MAX_ROWS: usize = 1000;

/// CrossRef research source
///
/// Uses the CrossRef REST `works` search. Requests identify themselves with a
/// contact address so they land in the polite pool.
#[derive(Debug, Clone)]
pub struct CrossRefSource {
    client: Arc<HttpClient>,
    base_url: String,
    user_agent: String,
}

impl CrossRefSource {
    pub fn new(client: Arc<HttpClient>, mailto: &str) -> Self {
        let user_agent = format!(
            "{}/{} (mailto:{})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            mailto
        );
        Self {
            client,
            base_url: CROSSREF_API_BASE.to_string(),
            user_agent,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    fn search_url(&self, keyword: &str, max_results: usize) -> String {
        format!(
            "{}?query={}&rows={}&sort=published&order=desc",
            endpoint(&self.base_url, "works"),
            urlencoding::encode(keyword),
            max_results.min(MAX_ROWS)
        )
    }

    /// Decode a `works` response body
    pub fn parse_response(body: &str) -> Result<Vec<Paper>, SourceError> {
        let data: CRResponse = serde_json::from_str(body)?;
        let items: Vec<CRItem> = decode_items(data.message.items, "CrossRef");
        Ok(items.into_iter().map(CRItem::into_paper).collect())
    }
}

#[async_trait]
impl Source for CrossRefSource {
    fn kind(&self) -> SourceKind {
        SourceKind::CrossRef
    }

    fn topic_filter(&self) -> TopicFilter {
        TopicFilter::Verification
    }

    async fn fetch(&self, keyword: &str, max_results: usize) -> Result<Vec<Paper>, SourceError> {
        let url = self.search_url(keyword, max_results);
        tracing::info!("Requesting papers from CrossRef for keyword: {}", keyword);

        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to search CrossRef: {}", e)))?;
        let response = check_status(response, "CrossRef").await?;

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read CrossRef response: {}", e)))?;

        let papers = Self::parse_response(&body)?;
        tracing::info!("Retrieved {} papers from CrossRef", papers.len());
        Ok(papers)
    }
}

// ===== CrossRef API Types =====

#[derive(Debug, Deserialize)]
struct CRResponse {
    message: CRMessage,
}

#[derive(Debug, Deserialize)]
struct CRMessage {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CRItem {
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    r#abstract: Option<String>,
    #[serde(default)]
    author: Vec<CRAuthor>,
    #[serde(rename = "URL", default)]
    url: Option<String>,
    #[serde(default)]
    issued: Option<CRDate>,
    #[serde(rename = "published-print", default)]
    published_print: Option<CRDate>,
    #[serde(rename = "published-online", default)]
    published_online: Option<CRDate>,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CRAuthor {
    #[serde(default)]
    given: Option<String>,
    #[serde(default)]
    family: Option<String>,
}

impl CRAuthor {
    fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.given.as_deref().unwrap_or(""),
            self.family.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }
}

#[derive(Debug, Deserialize)]
struct CRDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i64>>>,
}

impl CRDate {
    /// `YYYY-MM-DDT00:00:00Z` when at least the year is known
    fn to_iso(&self) -> Option<String> {
        let parts = self.date_parts.first()?;
        let year = (*parts.first()?)?;
        let month = parts.get(1).copied().flatten().unwrap_or(1);
        let day = parts.get(2).copied().flatten().unwrap_or(1);
        Some(date_from_parts(year, month, day))
    }
}

impl CRItem {
    fn into_paper(self) -> Paper {
        let date = [&self.issued, &self.published_print, &self.published_online]
            .into_iter()
            .flatten()
            .find_map(CRDate::to_iso)
            .unwrap_or_else(|| PLACEHOLDER_DATE.to_string());

        let title = self.title.into_iter().next().unwrap_or_default();
        let abstract_text = self
            .r#abstract
            .as_deref()
            .map(strip_html_tags)
            .unwrap_or_default();

        PaperBuilder::new(title, self.url.unwrap_or_default())
            .abstract_text(abstract_text)
            .authors(self.author.iter().map(CRAuthor::display_name))
            .tag(SourceKind::CrossRef.tag())
            .comment(self.container_title.into_iter().next().unwrap_or_default())
            .date(date)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "status": "ok",
        "message": {
            "items": [
                {
                    "title": ["Coverage closure with\n UVM"],
                    "abstract": "<jats:p>Closing <jats:italic>coverage</jats:italic> faster.</jats:p>",
                    "author": [{"given": "Grace", "family": "Hopper"}, {"family": "Knuth"}],
                    "URL": "https://doi.org/10.1000/uvm",
                    "issued": {"date-parts": [[2023, 7]]},
                    "container-title": ["DVCon US"]
                },
                {
                    "title": [],
                    "URL": "https://doi.org/10.1000/empty",
                    "issued": {"date-parts": [[null]]},
                    "published-online": {"date-parts": [[2021, 2, 3]]}
                },
                {
                    "title": "not a list"
                }
            ]
        }
    }"#;

    #[test]
    fn test_parse_response() {
        let papers = CrossRefSource::parse_response(BODY).unwrap();
        assert_eq!(papers.len(), 2);

        let first = &papers[0];
        assert_eq!(first.title, "Coverage closure with UVM");
        assert_eq!(first.r#abstract, "Closing coverage faster.");
        assert_eq!(first.authors, vec!["Grace Hopper", "Knuth"]);
        assert_eq!(first.tags, vec!["CrossRef"]);
        assert_eq!(first.comment, "DVCon US");
        assert_eq!(first.date, "2023-07-01T00:00:00Z");

        let second = &papers[1];
        assert_eq!(second.title, "Untitled");
        assert_eq!(second.authors, vec!["Unknown"]);
        assert_eq!(second.date, "2021-02-03T00:00:00Z");
    }

    #[test]
    fn test_search_url_clamps_rows() {
        let source = CrossRefSource::new(Arc::new(HttpClient::new().unwrap()), "a@b.org");
        let url = source.search_url("formal methods", 5000);
        assert_eq!(
            url,
            "https://api.crossref.org/works?query=formal%20methods&rows=1000&sort=published&order=desc"
        );
    }

    #[tokio::test]
    async fn test_fetch_sends_polite_user_agent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/works")
            .match_query(mockito::Matcher::UrlEncoded("query".into(), "UVM".into()))
            .match_header(
                "user-agent",
                mockito::Matcher::Regex(r"\(mailto:ops@example\.org\)$".into()),
            )
            .with_status(200)
            .with_body(BODY)
            .create_async()
            .await;

        let source = CrossRefSource::new(Arc::new(HttpClient::new().unwrap()), "ops@example.org")
            .with_base_url(&server.url());
        let papers = source.fetch("UVM", 10).await.unwrap();

        mock.assert_async().await;
        assert_eq!(papers.len(), 2);
    }
}
