//! Small text helpers shared by the adapters and the asset pipeline.

use chrono::{Datelike, Utc};
use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:19|20)\d{2}").expect("valid year regex"));

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Remove HTML/JATS markup, leaving only text content.
pub fn strip_html_tags(text: &str) -> String {
    collapse_whitespace(&HTML_TAG.replace_all(text, " "))
}

/// Upper bound for inferred publication years: next calendar year.
pub fn latest_plausible_year() -> i32 {
    Utc::now().year() + 1
}

/// The first four-digit year-like number in `text`, plausible or not.
pub fn first_year_match(text: &str) -> Option<i32> {
    YEAR.find(text).and_then(|m| m.as_str().parse().ok())
}

/// Every four-digit year in `text` within `1990..=max_year`, in order of appearance.
pub fn plausible_years(text: &str, max_year: i32) -> Vec<i32> {
    YEAR.find_iter(text)
        .filter_map(|m| m.as_str().parse::<i32>().ok())
        .filter(|year| (1990..=max_year).contains(year))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[test]
    fn test_strip_html_tags() {
        assert_eq!(
            strip_html_tags("<jats:p>Coverage <i>closure</i> made easy</jats:p>"),
            "Coverage closure made easy"
        );
    }

    #[test]
    fn test_plausible_years() {
        assert_eq!(plausible_years("dvcon-2019-paper_2031.pdf", 2026), vec![2019]);
        assert_eq!(plausible_years("1989 and 2024", 2026), vec![2024]);
        assert!(plausible_years("no digits", 2026).is_empty());
    }

    #[test]
    fn test_first_year_match() {
        assert_eq!(first_year_match("scan_2099_dvcon_2024"), Some(2099));
        assert_eq!(first_year_match("paper_132"), None);
    }
}
