//! ACM research source implementation.
//!
//! Uses the ACM Digital Library metadata API. Requests need a bearer token,
//! supplied through `providers.acm_access_token` or `ACM_ACCESS_TOKEN`.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use std::sync::Arc;

use crate::filter::TopicFilter;
use crate::models::{resolve_date, Paper, PaperBuilder, SourceKind};
use crate::sources::{decode_items, endpoint, Source, SourceCapabilities, SourceError};
use crate::utils::{check_status, HttpClient};

const ACM_API_BASE: &str = "https://dl.acm.org/v/";

/// Largest page requested from the metadata endpoint
const MAX_PAGE_SIZE: usize = 100;

/// ACM research source
#[derive(Debug, Clone)]
pub struct AcmSource {
    client: Arc<HttpClient>,
    base_url: String,
    access_token: Option<String>,
}

impl AcmSource {
    pub fn new(client: Arc<HttpClient>, access_token: Option<String>) -> Self {
        Self {
            client,
            base_url: ACM_API_BASE.to_string(),
            access_token: access_token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    fn token(&self) -> Result<&str, SourceError> {
        self.access_token.as_deref().ok_or_else(|| {
            SourceError::Config(
                "ACM_ACCESS_TOKEN is not set; configure an ACM API access token \
                 before enabling the ACM source"
                    .to_string(),
            )
        })
    }

    async fn fetch_page(
        &self,
        token: &str,
        keyword: &str,
        page: usize,
        size: usize,
    ) -> Result<Vec<serde_json::Value>, SourceError> {
        tracing::info!(
            "Requesting ACM metadata page={} size={} keyword={}",
            page,
            size,
            keyword
        );
        let url = format!(
            "{}?q={}&page={}&size={}",
            endpoint(&self.base_url, "api/metadata"),
            urlencoding::encode(keyword),
            page,
            size
        );

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to query ACM: {}", e)))?;
        let response = check_status(response, "ACM").await?;

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read ACM response: {}", e)))?;
        let envelope: ACMEnvelope = serde_json::from_str(&body)?;
        Ok(envelope.into_items())
    }

    /// Decode collected metadata items
    pub fn parse_items(items: Vec<serde_json::Value>) -> Vec<Paper> {
        decode_items::<ACMItem>(items, "ACM")
            .into_iter()
            .map(ACMItem::into_paper)
            .collect()
    }
}

#[async_trait]
impl Source for AcmSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Acm
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::PAGINATED
            | SourceCapabilities::AUTHENTICATED
    }

    fn topic_filter(&self) -> TopicFilter {
        TopicFilter::Verification
    }

    fn check_config(&self) -> Result<(), SourceError> {
        self.token().map(|_| ())
    }

    async fn fetch(&self, keyword: &str, max_results: usize) -> Result<Vec<Paper>, SourceError> {
        let token = self.token()?;
        let size = max_results.clamp(1, MAX_PAGE_SIZE);
        let mut collected: Vec<serde_json::Value> = Vec::new();
        let mut page = 0;

        while collected.len() < max_results {
            let items = match self.fetch_page(token, keyword, page, size).await {
                Ok(items) => items,
                // the first page decides whether the query failed at all
                Err(e) if page == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!("Stopping ACM pagination at page {}: {}", page, e);
                    break;
                }
            };
            if items.is_empty() {
                tracing::info!("ACM metadata query returned no more items");
                break;
            }

            let remaining = max_results - collected.len();
            collected.extend(items.into_iter().take(remaining));
            page += 1;
        }

        let papers = Self::parse_items(collected);
        tracing::info!("Retrieved {} papers from ACM", papers.len());
        Ok(papers)
    }
}

// ===== ACM API Types =====

#[derive(Debug, Default, Deserialize)]
struct ACMEnvelope {
    #[serde(default)]
    items: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    data: Option<Vec<serde_json::Value>>,
}

impl ACMEnvelope {
    fn into_items(self) -> Vec<serde_json::Value> {
        self.items
            .filter(|items| !items.is_empty())
            .or(self.data)
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ACMItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    article_title: Option<String>,
    #[serde(default)]
    full_title: Option<String>,
    #[serde(default)]
    r#abstract: Option<String>,
    #[serde(default)]
    authors: Option<Vec<ACMAuthor>>,
    #[serde(default)]
    creators: Option<Vec<ACMAuthor>>,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    publication_date: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    published: Option<String>,
    #[serde(default)]
    year: Option<serde_json::Value>,
    #[serde(default)]
    publication_title: Option<String>,
    #[serde(default)]
    journal: Option<String>,
    #[serde(default)]
    conference: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ACMAuthor {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    preferred_name: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

impl ACMAuthor {
    fn display_name(self) -> String {
        first_present([self.name, self.preferred_name, self.full_name]).unwrap_or_else(|| {
            format!(
                "{} {}",
                self.first_name.unwrap_or_default(),
                self.last_name.unwrap_or_default()
            )
            .trim()
            .to_string()
        })
    }
}

/// First value that is present and not blank
fn first_present<const N: usize>(values: [Option<String>; N]) -> Option<String> {
    values
        .into_iter()
        .flatten()
        .find(|v| !v.trim().is_empty())
}

/// Years arrive as numbers or numeric strings
fn year_value(value: Option<&serde_json::Value>) -> Option<i64> {
    match value? {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl ACMItem {
    fn into_paper(self) -> Paper {
        let title = first_present([self.title, self.article_title, self.full_title]);

        let authors: Vec<String> = self
            .authors
            .filter(|a| !a.is_empty())
            .or(self.creators)
            .unwrap_or_default()
            .into_iter()
            .map(ACMAuthor::display_name)
            .collect();

        let link = match (self.url.filter(|u| !u.trim().is_empty()), self.doi) {
            (Some(url), _) => url,
            (None, Some(doi)) if !doi.trim().is_empty() => format!("https://doi.org/{}", doi),
            _ => String::new(),
        };

        let pub_date = first_present([self.publication_date, self.date, self.published]);
        let date = resolve_date(pub_date.as_deref(), year_value(self.year.as_ref()));

        PaperBuilder::new(title.unwrap_or_default(), link)
            .abstract_text(self.r#abstract.unwrap_or_default())
            .authors(authors)
            .tag(SourceKind::Acm.tag())
            .comment(
                first_present([self.publication_title, self.journal, self.conference])
                    .unwrap_or_default(),
            )
            .date(date)
            .build()
    }
}
