//! IEEE Xplore research source implementation.
//!
//! Talks to the JSON endpoint behind the Xplore search page rather than the
//! key-gated public API, so it needs the browser client.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, REFERER};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{resolve_date, Paper, PaperBuilder, SourceKind};
use crate::sources::{decode_items, endpoint, Source, SourceCapabilities, SourceError};
use crate::utils::{check_status, HttpClient};

const IEEE_XPLORE_BASE: &str = "https://ieeexplore.ieee.org";

/// Document pages always live on the public site
const IEEE_DOCUMENT_BASE: &str = "https://ieeexplore.ieee.org/document/";

const ROWS_PER_PAGE: usize = 100;

/// IEEE Xplore research source
///
/// Searches in two phases: the first page reports `totalPages`, then pages
/// are walked in order until enough records are collected. Each page gets a
/// few immediate retries of its own; a page that keeps failing is skipped.
#[derive(Debug, Clone)]
pub struct IeeeSource {
    client: Arc<HttpClient>,
    base_url: String,
    page_attempts: u32,
}

impl IeeeSource {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            base_url: IEEE_XPLORE_BASE.to_string(),
            page_attempts: 5,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Immediate attempts per result page (at least one)
    pub fn with_page_attempts(mut self, attempts: u32) -> Self {
        self.page_attempts = attempts.max(1);
        self
    }

    async fn search_page(&self, keyword: &str, page: usize) -> Result<IEEEPage, SourceError> {
        let body = IEEESearchRequest::new(keyword, page);
        let referer = endpoint(&self.base_url, "search/searchresult.jsp?newsearch=true");

        let response = self
            .client
            .post(&endpoint(&self.base_url, "rest/search"))
            .header(ACCEPT, "application/json,text/plain,*/*")
            .header(REFERER, referer)
            .json(&body)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to search IEEE Xplore: {}", e)))?;
        let response = check_status(response, "IEEE Xplore").await?;

        let text = response.text().await.map_err(|e| {
            SourceError::Network(format!("Failed to read IEEE Xplore response: {}", e))
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn search_page_with_retries(
        &self,
        keyword: &str,
        page: usize,
    ) -> Result<IEEEPage, SourceError> {
        let mut attempt = 1;
        loop {
            match self.search_page(keyword, page).await {
                Ok(result) => {
                    tracing::info!(
                        "IEEE page {} returned {} records",
                        page,
                        result.records.len()
                    );
                    return Ok(result);
                }
                Err(e) if e.is_client_error() || attempt >= self.page_attempts => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        "IEEE request error on page {}, attempt {} of {}: {}",
                        page,
                        attempt,
                        self.page_attempts,
                        e
                    );
                    attempt += 1;
                }
            }
        }
    }

    /// Decode collected search records
    pub fn parse_records(records: Vec<serde_json::Value>) -> Vec<Paper> {
        decode_items::<IEEERecord>(records, "IEEE")
            .into_iter()
            .map(IEEERecord::into_paper)
            .collect()
    }
}

#[async_trait]
impl Source for IeeeSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Ieee
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::PAGINATED
    }

    async fn fetch(&self, keyword: &str, max_results: usize) -> Result<Vec<Paper>, SourceError> {
        tracing::info!("Requesting IEEE papers for keyword: {}", keyword);

        let first = self.search_page_with_retries(keyword, 1).await?;
        let total_pages = first.total_pages();
        tracing::info!("IEEE keyword search totalPages={}", total_pages);
        if total_pages == 0 {
            tracing::warn!("IEEE keyword search returned no pages for '{}'", keyword);
            return Ok(Vec::new());
        }

        let mut records: Vec<serde_json::Value> = first.records;
        records.truncate(max_results);

        for page in 2..=total_pages {
            if records.len() >= max_results {
                break;
            }
            match self.search_page_with_retries(keyword, page).await {
                Ok(result) => {
                    let remaining = max_results - records.len();
                    records.extend(result.records.into_iter().take(remaining));
                }
                Err(e) => {
                    tracing::error!("Skipping IEEE page {} for '{}': {}", page, keyword, e);
                }
            }
        }

        let papers = Self::parse_records(records);
        tracing::info!("Retrieved {} papers from IEEE", papers.len());
        Ok(papers)
    }
}

// ===== IEEE Xplore API Types =====

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IEEESearchRequest<'a> {
    newsearch: &'static str,
    highlight: &'static str,
    match_boolean: &'static str,
    match_pubs: &'static str,
    action: &'static str,
    query_text: &'a str,
    page_number: String,
    rows_per_page: usize,
}

impl<'a> IEEESearchRequest<'a> {
    fn new(query_text: &'a str, page: usize) -> Self {
        Self {
            newsearch: "true",
            highlight: "true",
            match_boolean: "true",
            match_pubs: "true",
            action: "search",
            query_text,
            page_number: page.to_string(),
            rows_per_page: ROWS_PER_PAGE,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IEEEPage {
    #[serde(default)]
    total_pages: Option<serde_json::Value>,
    #[serde(default)]
    records: Vec<serde_json::Value>,
}

impl IEEEPage {
    fn total_pages(&self) -> usize {
        scalar_string(self.total_pages.as_ref())
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IEEERecord {
    #[serde(default)]
    article_title: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    r#abstract: Option<String>,
    #[serde(default)]
    authors: Vec<IEEEAuthor>,
    #[serde(default)]
    article_number: Option<serde_json::Value>,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    publication_date: Option<String>,
    #[serde(default)]
    publication_year: Option<serde_json::Value>,
    #[serde(default)]
    publication_title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IEEEAuthor {
    #[serde(default)]
    preferred_name: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

impl IEEEAuthor {
    fn display_name(self) -> String {
        self.preferred_name
            .filter(|n| !n.trim().is_empty())
            .or(self.full_name.filter(|n| !n.trim().is_empty()))
            .unwrap_or_else(|| {
                format!(
                    "{} {}",
                    self.first_name.unwrap_or_default(),
                    self.last_name.unwrap_or_default()
                )
            })
            .trim()
            .to_string()
    }
}

/// Numbers and strings both show up for numeric IEEE fields
fn scalar_string(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl IEEERecord {
    fn into_paper(self) -> Paper {
        let link = match (scalar_string(self.article_number.as_ref()), self.doi) {
            (Some(number), _) => format!("{}{}", IEEE_DOCUMENT_BASE, number),
            (None, Some(doi)) if !doi.trim().is_empty() => format!("https://doi.org/{}", doi),
            _ => String::new(),
        };

        let year = scalar_string(self.publication_year.as_ref()).and_then(|y| y.parse().ok());
        let date = resolve_date(self.publication_date.as_deref(), year);

        let title = self
            .article_title
            .filter(|t| !t.trim().is_empty())
            .or(self.title)
            .unwrap_or_default();

        PaperBuilder::new(title, link)
            .abstract_text(self.r#abstract.unwrap_or_default())
            .authors(self.authors.into_iter().map(IEEEAuthor::display_name))
            .tag(SourceKind::Ieee.tag())
            .comment(self.publication_title.unwrap_or_default())
            .date(date)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(server: &mockito::Server) -> IeeeSource {
        IeeeSource::new(Arc::new(HttpClient::browser().unwrap()))
            .with_base_url(&server.url())
            .with_page_attempts(2)
    }

    fn page_matcher(page: usize) -> mockito::Matcher {
        mockito::Matcher::PartialJson(json!({"pageNumber": page.to_string(), "queryText": "UVM"}))
    }

    fn records(titles: &[&str]) -> Vec<serde_json::Value> {
        titles
            .iter()
            .map(|t| json!({"articleTitle": t, "articleNumber": "1000"}))
            .collect()
    }

    #[test]
    fn test_record_mapping() {
        let papers = IeeeSource::parse_records(vec![
            json!({
                "articleTitle": "UVM register models",
                "authors": [{"preferredName": "Alan Kay"}, {"firstName": "Ken", "lastName": "Thompson"}],
                "articleNumber": "10234567",
                "doi": "10.1109/x",
                "publicationDate": "12-14 Oct. 2023",
                "publicationYear": "2023",
                "publicationTitle": "2023 IEEE ITC"
            }),
            json!({
                "title": "By DOI",
                "doi": "10.1109/y",
                "publicationDate": "2020-03-04"
            }),
            json!({
                "title": "Nothing",
                "publicationYear": 2019
            }),
        ]);

        assert_eq!(papers.len(), 3);
        assert_eq!(papers[0].link, "https://ieeexplore.ieee.org/document/10234567");
        assert_eq!(papers[0].authors, vec!["Alan Kay", "Ken Thompson"]);
        assert_eq!(papers[0].date, "2023-01-01T00:00:00Z");
        assert_eq!(papers[0].comment, "2023 IEEE ITC");
        assert_eq!(papers[0].tags, vec!["IEEE"]);

        assert_eq!(papers[1].link, "https://doi.org/10.1109/y");
        assert_eq!(papers[1].date, "2020-03-04T00:00:00Z");

        assert_eq!(papers[2].link, "");
        assert_eq!(papers[2].date, "2019-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_walks_pages_until_enough() {
        let mut server = mockito::Server::new_async().await;
        let page1 = server
            .mock("POST", "/rest/search")
            .match_body(page_matcher(1))
            .with_status(200)
            .with_body(json!({"totalPages": 3, "records": records(&["a", "b"])}).to_string())
            .expect(1)
            .create_async()
            .await;
        let page2 = server
            .mock("POST", "/rest/search")
            .match_body(page_matcher(2))
            .with_status(200)
            .with_body(json!({"totalPages": 3, "records": records(&["c", "d"])}).to_string())
            .expect(1)
            .create_async()
            .await;
        let page3 = server
            .mock("POST", "/rest/search")
            .match_body(page_matcher(3))
            .expect(0)
            .create_async()
            .await;

        let papers = source(&server).fetch("UVM", 3).await.unwrap();

        page1.assert_async().await;
        page2.assert_async().await;
        page3.assert_async().await;
        let titles: Vec<&str> = papers.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_failing_page_is_skipped() {
        let mut server = mockito::Server::new_async().await;
        let _page1 = server
            .mock("POST", "/rest/search")
            .match_body(page_matcher(1))
            .with_status(200)
            .with_body(json!({"totalPages": "3", "records": records(&["a"])}).to_string())
            .create_async()
            .await;
        let page2 = server
            .mock("POST", "/rest/search")
            .match_body(page_matcher(2))
            .with_status(502)
            .expect(2)
            .create_async()
            .await;
        let _page3 = server
            .mock("POST", "/rest/search")
            .match_body(page_matcher(3))
            .with_status(200)
            .with_body(json!({"records": records(&["c"])}).to_string())
            .create_async()
            .await;

        let papers = source(&server).fetch("UVM", 100).await.unwrap();

        page2.assert_async().await;
        let titles: Vec<&str> = papers.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_no_pages_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/rest/search")
            .with_status(200)
            .with_body(json!({"totalPages": 0, "records": []}).to_string())
            .create_async()
            .await;

        assert!(source(&server).fetch("UVM", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_page_count_failure_is_returned() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/search")
            .with_status(403)
            .expect(1)
            .create_async()
            .await;

        let err = source(&server).fetch("UVM", 10).await.unwrap_err();

        mock.assert_async().await;
        assert!(err.is_client_error());
    }
}
