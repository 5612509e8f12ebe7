//! In-memory record table shared by every pipeline stage

use crate::error::{Error, Result};
use std::fmt;

/// Kind of values a column holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Categorical text, cells may be missing
    Text,
    /// Integer category code produced by the normalizer
    Code,
    /// Numeric measurement
    Numeric,
    /// Derived integer label (e.g. cluster assignment)
    Label,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Text => "text",
            ColumnKind::Code => "code",
            ColumnKind::Numeric => "numeric",
            ColumnKind::Label => "label",
        };
        f.write_str(name)
    }
}

/// A typed column of values
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Text(Vec<Option<String>>),
    Code(Vec<u32>),
    Numeric(Vec<f64>),
    Label(Vec<usize>),
}

impl Column {
    /// Build a text column from optional string slices
    pub fn text<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        Column::Text(values.into_iter().map(|v| v.map(str::to_owned)).collect())
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Text(v) => v.len(),
            Column::Code(v) => v.len(),
            Column::Numeric(v) => v.len(),
            Column::Label(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::Text(_) => ColumnKind::Text,
            Column::Code(_) => ColumnKind::Code,
            Column::Numeric(_) => ColumnKind::Numeric,
            Column::Label(_) => ColumnKind::Label,
        }
    }

    /// Values as `f64` for numeric and code columns
    pub fn as_f64(&self) -> Option<Vec<f64>> {
        match self {
            Column::Numeric(v) => Some(v.clone()),
            Column::Code(v) => Some(v.iter().map(|&c| c as f64).collect()),
            _ => None,
        }
    }
}

/// Ordered collection of equally long, named columns.
///
/// Stages never mutate a table in place: [`RecordTable::with_column`]
/// consumes the table and hands back the enriched one, and every stage that
/// produces a new table starts from a clone of its input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordTable {
    columns: Vec<(String, Column)>,
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.columns.first().map_or(0, |(_, c)| c.len())
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(name, col)| (name.as_str(), col))
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, col)| col)
    }

    /// Look up a column, failing with a schema error if it is absent
    pub fn require(&self, name: &str) -> Result<&Column> {
        self.column(name).ok_or_else(|| Error::missing_column(name))
    }

    /// Look up a numeric column
    pub fn numeric(&self, name: &str) -> Result<&[f64]> {
        match self.require(name)? {
            Column::Numeric(values) => Ok(values),
            other => Err(Error::schema(
                name,
                format!("expected numeric column, found {}", other.kind()),
            )),
        }
    }

    /// Add a column, or replace the column of the same name in place.
    ///
    /// The row count of a non-empty table is fixed: a column of a different
    /// length is rejected.
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Self> {
        let name = name.into();
        if !self.columns.is_empty() && column.len() != self.height() {
            return Err(Error::schema(
                name,
                format!(
                    "column has {} rows but table has {}",
                    column.len(),
                    self.height()
                ),
            ));
        }

        match self.columns.iter().position(|(n, _)| *n == name) {
            Some(idx) => self.columns[idx].1 = column,
            None => self.columns.push((name, column)),
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> RecordTable {
        RecordTable::new()
            .with_column("Age", Column::Numeric(vec![25.0, 52.0]))
            .unwrap()
            .with_column("Housing", Column::text([Some("own"), None]))
            .unwrap()
    }

    #[test]
    fn test_height_and_width() {
        let table = sample_table();
        assert_eq!(table.height(), 2);
        assert_eq!(table.width(), 2);
        assert_eq!(table.column_names().collect::<Vec<_>>(), vec!["Age", "Housing"]);
        assert_eq!(RecordTable::new().height(), 0);
    }

    #[test]
    fn test_with_column_rejects_length_mismatch() {
        let result = sample_table().with_column("Duration", Column::Numeric(vec![6.0]));
        assert!(matches!(result, Err(Error::Schema { .. })));
    }

    #[test]
    fn test_with_column_replaces_in_place() {
        let table = sample_table()
            .with_column("Age", Column::Numeric(vec![1.0, 2.0]))
            .unwrap();
        assert_eq!(table.width(), 2);
        assert_eq!(table.column_names().next(), Some("Age"));
        assert_eq!(table.numeric("Age").unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn test_numeric_wrong_kind() {
        let table = sample_table();
        let err = table.numeric("Housing").unwrap_err();
        assert!(err.to_string().contains("found text"));
        assert!(matches!(table.numeric("Missing"), Err(Error::Schema { .. })));
    }
}
