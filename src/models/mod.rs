//! Core data models for normalized papers and their rendered projection.

mod paper;
mod record;

pub use paper::{
    date_from_parts, date_from_year, parse_sort_date, resolve_date, Paper, PaperBuilder,
    SourceKind, PLACEHOLDER_DATE,
};
pub use record::{Column, FieldValue, Record};
