//! arXiv research source implementation.

use async_trait::async_trait;
use feed_rs::parser;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use crate::filter::TopicFilter;
use crate::models::{Paper, PaperBuilder, SourceKind, PLACEHOLDER_DATE};
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::{check_status, HttpClient};

/// Base URL for arXiv API
const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";

static ENTRY_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<entry\b.*?</entry>").expect("valid entry regex"));
static ENTRY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<id>\s*(.*?)\s*</id>").expect("valid id regex"));
static ENTRY_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<arxiv:comment[^>]*>(.*?)</arxiv:comment>").expect("valid comment regex")
});

/// Boolean operator joining the title and abstract clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
}

impl Operator {
    /// `AND` for a single word, `OR` for a phrase
    pub fn for_keyword(keyword: &str) -> Self {
        if keyword.split_whitespace().count() <= 1 {
            Operator::And
        } else {
            Operator::Or
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::And => "AND",
            Operator::Or => "OR",
        }
    }
}

/// Build the arXiv `search_query` matching `keyword` in title and abstract.
pub fn build_arxiv_query(keyword: &str) -> String {
    let keyword = keyword.trim();
    format!(
        "ti:\"{0}\" {1} abs:\"{0}\"",
        keyword,
        Operator::for_keyword(keyword).as_str()
    )
}

/// arXiv research source
///
/// The only mandatory provider: its results are filtered to CS/statistics
/// subjects and a failed fetch aborts the run.
#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: Arc<HttpClient>,
    base_url: String,
}

impl ArxivSource {
    /// Create a new arXiv source
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            base_url: ARXIV_API_URL.to_string(),
        }
    }

    /// Point the source at another endpoint (for testing)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    fn search_url(&self, keyword: &str, max_results: usize) -> String {
        format!(
            "{}?search_query={}&max_results={}&sortBy=lastUpdatedDate",
            self.base_url,
            urlencoding::encode(&build_arxiv_query(keyword)),
            max_results
        )
    }

    /// Parse an Atom feed body into papers
    pub fn parse_feed(body: &str) -> Result<Vec<Paper>, SourceError> {
        let feed = parser::parse(body.as_bytes())
            .map_err(|e| SourceError::Parse(format!("Failed to parse arXiv feed: {}", e)))?;
        let comments = Self::comments_by_id(body);

        let papers = feed
            .entries
            .iter()
            .filter_map(|entry| match Self::parse_entry(entry, &comments) {
                Ok(paper) => Some(paper),
                Err(e) => {
                    tracing::warn!("Failed to process arXiv entry {}: {}", entry.id, e);
                    None
                }
            })
            .collect();
        Ok(papers)
    }

    /// `arxiv:comment` elements keyed by entry id
    fn comments_by_id(body: &str) -> HashMap<String, String> {
        ENTRY_BLOCK
            .find_iter(body)
            .filter_map(|block| {
                let block = block.as_str();
                let id = ENTRY_ID.captures(block)?.get(1)?.as_str().to_string();
                let comment = ENTRY_COMMENT.captures(block)?.get(1)?.as_str().to_string();
                Some((id, comment))
            })
            .collect()
    }

    /// Parse arXiv Atom feed entry into Paper
    fn parse_entry(
        entry: &feed_rs::model::Entry,
        comments: &HashMap<String, String>,
    ) -> Result<Paper, SourceError> {
        let title = entry
            .title
            .as_ref()
            .map(|t| t.content.as_str())
            .ok_or_else(|| SourceError::Parse("Missing title".to_string()))?;

        let abstract_text = entry
            .summary
            .as_ref()
            .map(|s| s.content.as_str())
            .unwrap_or("");

        let link = entry
            .links
            .iter()
            .find(|l| l.rel.as_deref() == Some("alternate"))
            .or_else(|| entry.links.first())
            .map(|l| l.href.clone())
            .unwrap_or_else(|| entry.id.clone());

        let date = entry
            .updated
            .or(entry.published)
            .map(|d| d.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .unwrap_or_else(|| PLACEHOLDER_DATE.to_string());

        Ok(PaperBuilder::new(title, link)
            .abstract_text(abstract_text)
            .authors(entry.authors.iter().map(|a| a.name.as_str()))
            .tags(entry.categories.iter().map(|c| c.term.as_str()))
            .comment(comments.get(&entry.id).map(String::as_str).unwrap_or(""))
            .date(date)
            .build())
    }
}

#[async_trait]
impl Source for ArxivSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Arxiv
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    fn is_mandatory(&self) -> bool {
        true
    }

    fn topic_filter(&self) -> TopicFilter {
        TopicFilter::SubjectPrefix
    }

    async fn fetch(&self, keyword: &str, max_results: usize) -> Result<Vec<Paper>, SourceError> {
        let url = self.search_url(keyword, max_results);
        tracing::info!("Requesting papers from arXiv for keyword: {}", keyword);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to search arXiv: {}", e)))?;
        let response = check_status(response, "arXiv").await?;

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read arXiv response: {}", e)))?;

        let papers = Self::parse_feed(&body)?;
        tracing::info!("Retrieved {} papers from arXiv", papers.len());
        Ok(papers)
    }
}
