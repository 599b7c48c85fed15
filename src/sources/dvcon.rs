//! DVCon proceedings archive scraper.
//!
//! The archive has no API. A keyword search is run through the site's `?s=`
//! parameter and result links are picked out of the HTML. Selector drift is
//! expected: a page with nothing recognisable simply yields no candidates.

use async_trait::async_trait;
use reqwest::header::REFERER;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

use crate::models::{date_from_year, Paper, PaperBuilder, SourceKind};
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::{check_status, latest_plausible_year, plausible_years, HttpClient};

const DVCON_BASE: &str = "https://dvcon-proceedings.org/";

/// Comment attached to every scraped entry
const ENTRY_COMMENT: &str = "DVCon proceedings entry";

/// Href fragments of WordPress navigation, tag and category pages
const EXCLUDED_HREF_PARTS: [&str; 3] = ["wp-", "tag/", "category/"];

/// A proceedings entry found on a search result page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLink {
    pub title: String,
    pub url: String,
    /// First plausible year in the title or URL path
    pub year: Option<i32>,
}

impl CandidateLink {
    pub fn into_paper(self) -> Paper {
        PaperBuilder::new(self.title, self.url)
            .tag(SourceKind::Dvcon.tag())
            .comment(ENTRY_COMMENT)
            .date(date_from_year(self.year.map(i64::from)))
            .build()
    }
}

/// Pick proceedings entries out of a search result page.
///
/// Anchors under `.entry-title` are preferred; when the theme has none, every
/// anchor is considered. An anchor qualifies when its text contains `keyword`
/// (case-insensitive) and its href is a site-internal content link.
/// Results are deduplicated by absolute URL.
pub fn extract_candidates(html: &str, keyword: &str, base_url: &str) -> Vec<CandidateLink> {
    let Ok(base) = Url::parse(base_url) else {
        tracing::warn!("Invalid DVCon base URL: {}", base_url);
        return Vec::new();
    };
    let host = base.host_str().unwrap_or_default().to_lowercase();
    let keyword = keyword.trim().to_lowercase();
    let max_year = latest_plausible_year();

    let document = Html::parse_document(html);
    let (Some(titled), Some(any_link)) = (
        Selector::parse(".entry-title a[href]").ok(),
        Selector::parse("a[href]").ok(),
    ) else {
        return Vec::new();
    };

    let mut anchors: Vec<_> = document.select(&titled).collect();
    if anchors.is_empty() {
        anchors = document.select(&any_link).collect();
    }

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for anchor in anchors {
        let href = anchor.value().attr("href").unwrap_or_default().trim();
        let title = anchor.text().collect::<Vec<_>>().join(" ");
        let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
        if href.is_empty() || title.is_empty() {
            continue;
        }

        let href_lower = href.to_lowercase();
        let internal = href_lower.starts_with('/') || (!host.is_empty() && href_lower.contains(&host));
        if !internal || EXCLUDED_HREF_PARTS.iter().any(|p| href_lower.contains(p)) {
            continue;
        }
        if !title.to_lowercase().contains(&keyword) {
            continue;
        }

        let Ok(mut url) = base.join(href) else {
            tracing::debug!("Skipping unparseable DVCon link: {}", href);
            continue;
        };
        url.set_fragment(None);
        if !seen.insert(url.to_string()) {
            continue;
        }

        let year = plausible_years(&format!("{} {}", title, url.path()), max_year)
            .into_iter()
            .next();
        candidates.push(CandidateLink {
            title,
            url: url.to_string(),
            year,
        });
    }

    candidates
}

/// DVCon proceedings source
#[derive(Debug, Clone)]
pub struct DvconSource {
    client: Arc<HttpClient>,
    base_url: String,
}

impl DvconSource {
    /// `client` should be the browser client; the site blocks generic agents.
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            base_url: DVCON_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Run the site search and return the matching entry links
    pub async fn search(&self, keyword: &str) -> Result<Vec<CandidateLink>, SourceError> {
        let url = format!("{}?s={}", self.base_url, urlencoding::encode(keyword));

        let response = self
            .client
            .get(&url)
            .header(REFERER, &self.base_url)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to search DVCon: {}", e)))?;
        let response = check_status(response, "DVCon").await?;

        let html = response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read DVCon page: {}", e)))?;
        Ok(extract_candidates(&html, keyword, &self.base_url))
    }
}

#[async_trait]
impl Source for DvconSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Dvcon
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::ASSETS | SourceCapabilities::SCRAPED
    }

    async fn fetch(&self, keyword: &str, max_results: usize) -> Result<Vec<Paper>, SourceError> {
        tracing::info!("Getting DVCon papers for keyword: {}", keyword);

        let papers: Vec<Paper> = self
            .search(keyword)
            .await?
            .into_iter()
            .take(max_results)
            .map(CandidateLink::into_paper)
            .collect();

        tracing::info!("Retrieved {} DVCon proceedings entries", papers.len());
        Ok(papers)
    }
}
