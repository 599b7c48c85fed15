//! Markdown output: paper tables and the documents that hold them.

mod document;
mod table;

pub use document::{
    digest_day, digest_today, iso_day, issue_preamble, keyword_heading, last_update, long_day,
    readme_preamble, source_section,
};
pub use table::{render_table, sort_papers, RenderError, TableRenderer};
