//! Paper model shared by every provider adapter.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::utils::collapse_whitespace;

/// Sentinel date used when a provider gives no usable date.
pub const PLACEHOLDER_DATE: &str = "1970-01-01T00:00:00Z";

/// The provider a paper was fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Arxiv,
    CrossRef,
    OpenAlex,
    SemanticScholar,
    Ieee,
    Acm,
    Dvcon,
}

impl SourceKind {
    /// Every provider, in the order they are queried for a keyword.
    pub const QUERY_ORDER: [SourceKind; 7] = [
        SourceKind::Dvcon,
        SourceKind::Ieee,
        SourceKind::Acm,
        SourceKind::CrossRef,
        SourceKind::OpenAlex,
        SourceKind::SemanticScholar,
        SourceKind::Arxiv,
    ];

    /// Returns the display name of the provider
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Arxiv => "arXiv",
            SourceKind::CrossRef => "CrossRef",
            SourceKind::OpenAlex => "OpenAlex",
            SourceKind::SemanticScholar => "Semantic Scholar",
            SourceKind::Ieee => "IEEE",
            SourceKind::Acm => "ACM",
            SourceKind::Dvcon => "DVCon",
        }
    }

    /// Returns the identifier used on the command line and in config files
    pub fn id(&self) -> &'static str {
        match self {
            SourceKind::Arxiv => "arxiv",
            SourceKind::CrossRef => "crossref",
            SourceKind::OpenAlex => "openalex",
            SourceKind::SemanticScholar => "semanticscholar",
            SourceKind::Ieee => "ieee",
            SourceKind::Acm => "acm",
            SourceKind::Dvcon => "dvcon",
        }
    }

    /// Label stored in `Tags` for providers without subject classifications
    pub fn tag(&self) -> &'static str {
        match self {
            SourceKind::Arxiv => "arXiv",
            SourceKind::CrossRef => "CrossRef",
            SourceKind::OpenAlex => "OpenAlex",
            SourceKind::SemanticScholar => "SemanticScholar",
            SourceKind::Ieee => "IEEE",
            SourceKind::Acm => "ACM",
            SourceKind::Dvcon => "DVConProceedings",
        }
    }

    /// Heading used for this provider's section in the digest
    pub fn section_title(&self) -> &'static str {
        match self {
            SourceKind::Arxiv => "arXiv",
            SourceKind::CrossRef => "CrossRef",
            SourceKind::OpenAlex => "OpenAlex",
            SourceKind::SemanticScholar => "Semantic Scholar",
            SourceKind::Ieee => "IEEE (Xplore)",
            SourceKind::Acm => "ACM (Digital Library API)",
            SourceKind::Dvcon => "DVCon (proceedings archive)",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::QUERY_ORDER
            .iter()
            .copied()
            .find(|kind| kind.id() == wanted)
            .ok_or_else(|| format!("unknown source '{}'", s))
    }
}

/// A research paper normalized to the common schema
///
/// Every adapter produces this shape; `title`, `authors` and `date` are
/// always populated once built through [`PaperBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    pub r#abstract: String,
    pub authors: Vec<String>,
    pub link: String,
    pub tags: Vec<String>,
    pub comment: String,
    pub date: String,
}

impl Paper {
    /// Whether the date is still the epoch placeholder (or missing)
    pub fn has_placeholder_date(&self) -> bool {
        self.date.is_empty() || self.date.starts_with("1970-01-01")
    }

    /// First listed author, if any
    pub fn first_author(&self) -> Option<&str> {
        self.authors.first().map(|s| s.as_str())
    }
}

/// Builder for constructing Paper objects
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    paper: Paper,
}

impl PaperBuilder {
    /// Create a new builder with required fields
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            paper: Paper {
                title: title.into(),
                r#abstract: String::new(),
                authors: Vec::new(),
                link: link.into(),
                tags: Vec::new(),
                comment: String::new(),
                date: String::new(),
            },
        }
    }

    /// Set abstract
    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        self.paper.r#abstract = abstract_text.into();
        self
    }

    /// Set authors
    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paper.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    /// Set tags
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paper.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set a single provider tag
    pub fn tag(self, tag: impl Into<String>) -> Self {
        self.tags([tag.into()])
    }

    /// Set the venue/journal comment
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.paper.comment = comment.into();
        self
    }

    /// Set the ISO-8601 date
    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.paper.date = date.into();
        self
    }

    /// Build the Paper, collapsing whitespace and filling the schema defaults
    pub fn build(self) -> Paper {
        let mut paper = self.paper;

        paper.title = collapse_whitespace(&paper.title);
        if paper.title.is_empty() {
            paper.title = "Untitled".to_string();
        }
        paper.r#abstract = collapse_whitespace(&paper.r#abstract);
        paper.comment = collapse_whitespace(&paper.comment);
        paper.link = paper.link.trim().to_string();

        paper.authors = paper
            .authors
            .iter()
            .map(|a| collapse_whitespace(a))
            .filter(|a| !a.is_empty())
            .collect();
        if paper.authors.is_empty() {
            paper.authors = vec!["Unknown".to_string()];
        }

        paper.tags = paper
            .tags
            .iter()
            .map(|t| collapse_whitespace(t))
            .filter(|t| !t.is_empty())
            .collect();

        paper.date = paper.date.trim().to_string();
        if paper.date.is_empty() {
            paper.date = PLACEHOLDER_DATE.to_string();
        }

        paper
    }
}

/// Format a calendar date as a midnight UTC timestamp.
pub fn date_from_parts(year: i64, month: i64, day: i64) -> String {
    format!("{:04}-{:02}-{:02}T00:00:00Z", year, month, day)
}

/// January 1st of `year`, or the placeholder when there is no year.
pub fn date_from_year(year: Option<i64>) -> String {
    match year {
        Some(year) if year > 0 => date_from_parts(year, 1, 1),
        _ => PLACEHOLDER_DATE.to_string(),
    }
}

/// Resolve a provider date string with a bare-year fallback.
///
/// Tries a full ISO timestamp, then a `YYYY-MM-DD` prefix, then `year`,
/// and finally the placeholder.
pub fn resolve_date(date: Option<&str>, year: Option<i64>) -> String {
    if let Some(date) = date.map(str::trim).filter(|d| !d.is_empty()) {
        if date.contains('T') {
            return date.to_string();
        }
        if looks_like_iso_day(date) {
            return format!("{}T00:00:00Z", date);
        }
    }
    date_from_year(year)
}

fn looks_like_iso_day(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 10
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit)
}

/// Parse a paper date for ordering; anything unparseable sorts as the epoch.
pub fn parse_sort_date(date: &str) -> NaiveDateTime {
    let trimmed = date.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt.naive_utc();
    }

    let clean = trimmed.trim_end_matches('Z');
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(clean, format) {
            return dt;
        }
    }
    if let Ok(day) = NaiveDate::parse_from_str(clean, "%Y-%m-%d") {
        return day.and_hms_opt(0, 0, 0).unwrap_or_default();
    }

    tracing::debug!("Failed to parse date '{}', sorting as epoch", date);
    NaiveDateTime::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paper_builder_defaults() {
        let paper = PaperBuilder::new("  A   Paper\nTitle ", "https://example.com").build();

        assert_eq!(paper.title, "A Paper Title");
        assert_eq!(paper.authors, vec!["Unknown"]);
        assert_eq!(paper.date, PLACEHOLDER_DATE);
        assert!(paper.has_placeholder_date());
        assert!(paper.tags.is_empty());
    }

    #[test]
    fn test_paper_builder_empty_title() {
        let paper = PaperBuilder::new("   ", "").build();
        assert_eq!(paper.title, "Untitled");
    }

    #[test]
    fn test_paper_builder_fields() {
        let paper = PaperBuilder::new("UVM Sequences", "https://example.com/1")
            .abstract_text("An  abstract\nspanning lines")
            .authors(["Jane Doe", " ", "John\nSmith"])
            .tag("CrossRef")
            .comment("DVCon US")
            .date("2024-03-01T00:00:00Z")
            .build();

        assert_eq!(paper.r#abstract, "An abstract spanning lines");
        assert_eq!(paper.authors, vec!["Jane Doe", "John Smith"]);
        assert_eq!(paper.first_author(), Some("Jane Doe"));
        assert_eq!(paper.tags, vec!["CrossRef"]);
        assert!(!paper.has_placeholder_date());
    }

    #[test]
    fn test_resolve_date_cascade() {
        assert_eq!(
            resolve_date(Some("2023-05-01T12:00:00Z"), None),
            "2023-05-01T12:00:00Z"
        );
        assert_eq!(resolve_date(Some("2023-05-01"), Some(1999)), "2023-05-01T00:00:00Z");
        assert_eq!(resolve_date(Some("01 May 2023"), Some(2023)), "2023-01-01T00:00:00Z");
        assert_eq!(resolve_date(Some("01 May 2023"), None), PLACEHOLDER_DATE);
        assert_eq!(resolve_date(None, Some(2021)), "2021-01-01T00:00:00Z");
        assert_eq!(resolve_date(None, None), PLACEHOLDER_DATE);
    }

    #[test]
    fn test_parse_sort_date() {
        let full = parse_sort_date("2024-06-01T10:20:30Z");
        assert_eq!(full.to_string(), "2024-06-01 10:20:30");

        let day = parse_sort_date("2023-01-01");
        assert_eq!(day.to_string(), "2023-01-01 00:00:00");

        let offset = parse_sort_date("2022-02-02T00:00:00+02:00");
        assert_eq!(offset.to_string(), "2022-02-01 22:00:00");

        assert_eq!(parse_sort_date("not a date"), NaiveDateTime::default());
        assert_eq!(parse_sort_date(""), NaiveDateTime::default());
    }

    #[test]
    fn test_source_kind_round_trip_ids() {
        for kind in SourceKind::QUERY_ORDER {
            assert_eq!(kind.id().parse::<SourceKind>().unwrap(), kind);
        }
        assert!("nature".parse::<SourceKind>().is_err());
        assert_eq!(SourceKind::QUERY_ORDER.last(), Some(&SourceKind::Arxiv));
    }
}
