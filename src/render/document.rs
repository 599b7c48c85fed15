//! The README digest and issue template written by a run.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// Offset of the calendar the digest is dated in (UTC+8)
const DIGEST_OFFSET_SECS: i32 = 8 * 3600;

const README_INTRO: &str = "# Daily Papers

## Abstract
Daily Papers is an automated literature aggregation pipeline that collects, \
normalizes, and publishes up-to-date research digests for configurable topics. \
It queries arXiv and, optionally, CrossRef, OpenAlex, Semantic Scholar, IEEE \
Xplore, DVCon proceedings, and the ACM Digital Library, then consolidates the \
latest results into a single Markdown feed that is easy to browse and index by \
search engines.

## Overview
The project automatically fetches the latest papers from arXiv and optionally \
from CrossRef, OpenAlex, Semantic Scholar, IEEE, DVCon proceedings, and ACM \
Digital Library based on configurable keywords (for example, digital/UVM \
verification or other topics).

The subheadings in the README file represent the search keywords (topics).

Only the most recent articles for each keyword are retained.

You can click the 'Watch' button to receive daily email notifications.

";

const LAST_UPDATE: &str = "Last update:";

/// Current calendar day in UTC+8
pub fn digest_today() -> NaiveDate {
    digest_day(Utc::now())
}

/// Calendar day of `now` in UTC+8
pub fn digest_day(now: DateTime<Utc>) -> NaiveDate {
    match FixedOffset::east_opt(DIGEST_OFFSET_SECS) {
        Some(offset) => now.with_timezone(&offset).date_naive(),
        None => now.date_naive(),
    }
}

/// `YYYY-MM-DD`, used for the update stamp and archive name
pub fn iso_day(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// `Month DD, YYYY`, used in the issue title
pub fn long_day(day: NaiveDate) -> String {
    day.format("%B %d, %Y").to_string()
}

/// Fixed README heading, project description and update stamp
pub fn readme_preamble(day: NaiveDate) -> String {
    format!("{}{} {}\n\n", README_INTRO, LAST_UPDATE, iso_day(day))
}

/// YAML front matter and reading hint of the issue template
pub fn issue_preamble(issues_results: usize, day: NaiveDate) -> String {
    format!(
        "---\ntitle: Latest {} Papers - {}\nlabels: documentation\n---\n\
         **Please check the project's GitHub page for a better reading experience \
         and more papers.**\n\n",
        issues_results,
        long_day(day)
    )
}

/// Date recorded on the first `Last update:` line of a README
pub fn last_update(readme: &str) -> Option<&str> {
    readme
        .lines()
        .find(|line| line.contains(LAST_UPDATE))
        .and_then(|line| line.split_once(": "))
        .map(|(_, date)| date.trim())
}

/// `## <keyword>` heading
pub fn keyword_heading(keyword: &str) -> String {
    format!("## {}\n", keyword)
}

/// `### <source>` heading followed by `table` and a blank line
pub fn source_section(title: &str, table: &str) -> String {
    format!("### {}\n{}\n\n", title, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    #[test]
    fn test_digest_day_is_utc_plus_eight() {
        let late = Utc.with_ymd_and_hms(2025, 2, 28, 17, 30, 0).unwrap();
        assert_eq!(digest_day(late), day());

        let early = Utc.with_ymd_and_hms(2025, 2, 28, 15, 59, 0).unwrap();
        assert_eq!(iso_day(digest_day(early)), "2025-02-28");
    }

    #[test]
    fn test_readme_preamble_round_trips_update_date() {
        let preamble = readme_preamble(day());
        assert!(preamble.starts_with("# Daily Papers\n\n## Abstract\n"));
        assert!(preamble.ends_with("Last update: 2025-03-01\n\n"));
        assert_eq!(last_update(&preamble), Some("2025-03-01"));
        assert_eq!(last_update("# nothing here"), None);
    }

    #[test]
    fn test_issue_preamble() {
        let preamble = issue_preamble(200, day());
        assert!(preamble.starts_with("---\ntitle: Latest 200 Papers - March 01, 2025\nlabels: documentation\n---\n"));
        assert!(preamble.ends_with("and more papers.**\n\n"));
    }

    #[test]
    fn test_sections() {
        assert_eq!(keyword_heading("UVM"), "## UVM\n");
        assert_eq!(source_section("arXiv", "| t |"), "### arXiv\n| t |\n\n");
    }
}
