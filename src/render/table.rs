//! Markdown table rendering of normalized papers.

use thiserror::Error;

use crate::config::{Config, HeuristicsConfig};
use crate::models::{parse_sort_date, Column, FieldValue, Paper, Record};

/// Errors raised while formatting a single row
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("Paper '{0}' has no authors")]
    NoAuthors(String),
}

/// Renders papers as a pipe-delimited Markdown table.
///
/// `Title` (linked to `Link`) and `Date` always lead; the remaining
/// configured columns follow in their configured order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRenderer {
    columns: Vec<Column>,
    tags_disclosure_len: usize,
    comment_disclosure_len: usize,
    teaser_len: usize,
}

impl Default for TableRenderer {
    fn default() -> Self {
        Self::new(Column::DEFAULT.to_vec())
    }
}

impl TableRenderer {
    pub fn new(columns: Vec<Column>) -> Self {
        let heuristics = HeuristicsConfig::default();
        Self {
            columns,
            tags_disclosure_len: heuristics.tags_disclosure_len,
            comment_disclosure_len: heuristics.comment_disclosure_len,
            teaser_len: heuristics.teaser_len,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            columns: config.run.column_names.clone(),
            tags_disclosure_len: config.heuristics.tags_disclosure_len,
            comment_disclosure_len: config.heuristics.comment_disclosure_len,
            teaser_len: config.heuristics.teaser_len,
        }
    }

    /// Header order for a table that ignores `ignore`
    pub fn layout(&self, ignore: &[Column]) -> Vec<Column> {
        let mut layout = vec![Column::Title, Column::Date];
        for column in &self.columns {
            if matches!(column, Column::Title | Column::Link | Column::Date)
                || ignore.contains(column)
                || layout.contains(column)
            {
                continue;
            }
            layout.push(*column);
        }
        layout
    }

    /// Render `papers`, newest first, leaving out the `ignore` columns.
    ///
    /// Empty input, or input where every row fails to format, renders as an
    /// empty string. A failing row is dropped with a warning.
    pub fn render(&self, papers: &[Paper], ignore: &[Column]) -> String {
        tracing::info!("Generating table for {} papers", papers.len());
        if papers.is_empty() {
            tracing::warn!("No papers provided, returning empty table");
            return String::new();
        }

        let layout = self.layout(ignore);
        let rows: Vec<Vec<String>> = sort_papers(papers)
            .into_iter()
            .filter_map(|paper| match self.format_row(paper, &layout) {
                Ok(row) => Some(row),
                Err(e) => {
                    tracing::warn!("Failed to format paper: {}", e);
                    None
                }
            })
            .collect();

        if rows.is_empty() {
            tracing::warn!("No papers were successfully formatted, returning empty table");
            return String::new();
        }

        let header: Vec<String> = layout.iter().map(|c| format!("**{}**", c)).collect();
        let mut table = format!(
            "| {} |\n| {} |",
            header.join(" | "),
            vec!["---"; layout.len()].join(" | ")
        );
        for row in rows {
            table.push_str("\n| ");
            table.push_str(&row.join(" | "));
            table.push_str(" |");
        }
        table
    }

    fn format_row(&self, paper: &Paper, layout: &[Column]) -> Result<Vec<String>, RenderError> {
        let mut projection = layout.to_vec();
        if !projection.contains(&Column::Link) {
            projection.push(Column::Link);
        }
        let record = paper.select(&projection);
        layout
            .iter()
            .map(|column| self.format_cell(&record, *column))
            .collect()
    }

    /// Format one cell of a projected row; absent fields render as empty text.
    fn format_cell(&self, record: &Record, column: Column) -> Result<String, RenderError> {
        let text = |column: Column| record.text(column).unwrap_or_default();
        let list = |column: Column| {
            record
                .get(column)
                .and_then(FieldValue::as_list)
                .unwrap_or_default()
        };

        let cell = match column {
            Column::Title => format!("**[{}]({})**", text(Column::Title), text(Column::Link)),
            Column::Date => text(Column::Date)
                .split('T')
                .next()
                .unwrap_or_default()
                .to_string(),
            Column::Abstract => format!(
                "<details><summary>Show</summary><p>{}</p></details>",
                text(Column::Abstract)
            ),
            Column::Authors => {
                let first = list(Column::Authors)
                    .first()
                    .ok_or_else(|| RenderError::NoAuthors(text(Column::Title).to_string()))?;
                format!("{} et al.", first)
            }
            Column::Tags => self.disclose(&list(Column::Tags).join(", "), self.tags_disclosure_len),
            Column::Comment => self.disclose(text(Column::Comment), self.comment_disclosure_len),
            Column::Link => text(Column::Link).to_string(),
        };
        Ok(cell)
    }

    /// Collapse text longer than `limit` characters behind a short teaser
    fn disclose(&self, text: &str, limit: usize) -> String {
        if text.chars().count() <= limit {
            return text.to_string();
        }
        let teaser: String = text.chars().take(self.teaser_len).collect();
        format!("<details><summary>{}...</summary><p>{}</p></details>", teaser, text)
    }
}

/// Newest first; equal dates order by case-insensitive title, descending.
pub fn sort_papers(papers: &[Paper]) -> Vec<&Paper> {
    let mut keyed: Vec<_> = papers
        .iter()
        .map(|p| ((parse_sort_date(&p.date), p.title.to_lowercase()), p))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| b.cmp(a));
    keyed.into_iter().map(|(_, p)| p).collect()
}

/// Render with the default column set and thresholds
pub fn render_table(papers: &[Paper], ignore: &[Column]) -> String {
    TableRenderer::default().render(papers, ignore)
}
