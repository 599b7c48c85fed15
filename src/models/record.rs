//! Column projection of a [`Paper`] used by the table renderer.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::Paper;

/// A named field of the normalized schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    Title,
    Link,
    Abstract,
    Authors,
    Tags,
    Comment,
    Date,
}

impl Column {
    /// Columns projected into the digest tables unless configured otherwise.
    pub const DEFAULT: [Column; 5] = [
        Column::Title,
        Column::Link,
        Column::Abstract,
        Column::Date,
        Column::Comment,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Title => "Title",
            Column::Link => "Link",
            Column::Abstract => "Abstract",
            Column::Authors => "Authors",
            Column::Tags => "Tags",
            Column::Comment => "Comment",
            Column::Date => "Date",
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "title" => Ok(Column::Title),
            "link" => Ok(Column::Link),
            "abstract" => Ok(Column::Abstract),
            "authors" => Ok(Column::Authors),
            "tags" => Ok(Column::Tags),
            "comment" => Ok(Column::Comment),
            "date" => Ok(Column::Date),
            other => Err(format!("unknown column '{}'", other)),
        }
    }
}

/// Value held by a record field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            FieldValue::Text(_) => None,
        }
    }
}

/// An ordered set of (column, value) pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(Column, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field, keeping first-insertion order
    pub fn insert(&mut self, column: Column, value: FieldValue) {
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn with(mut self, column: Column, value: FieldValue) -> Self {
        self.insert(column, value);
        self
    }

    pub fn get(&self, column: Column) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v)
    }

    /// Text value of a field; list fields and missing fields yield `None`
    pub fn text(&self, column: Column) -> Option<&str> {
        self.get(column).and_then(FieldValue::as_text)
    }

    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.fields.iter().map(|(c, _)| *c)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Paper {
    /// The value of a single column
    pub fn field(&self, column: Column) -> FieldValue {
        match column {
            Column::Title => FieldValue::Text(self.title.clone()),
            Column::Link => FieldValue::Text(self.link.clone()),
            Column::Abstract => FieldValue::Text(self.r#abstract.clone()),
            Column::Authors => FieldValue::List(self.authors.clone()),
            Column::Tags => FieldValue::List(self.tags.clone()),
            Column::Comment => FieldValue::Text(self.comment.clone()),
            Column::Date => FieldValue::Text(self.date.clone()),
        }
    }

    /// Project the paper onto `columns`, in that order
    pub fn select(&self, columns: &[Column]) -> Record {
        let mut record = Record::new();
        for column in columns {
            record.insert(*column, self.field(*column));
        }
        record
    }
}
