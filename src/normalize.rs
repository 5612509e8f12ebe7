//! Field normalization: missing-value imputation and categorical encoding

use crate::error::{Error, Result};
use crate::table::{Column, RecordTable};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Label substituted for missing categorical cells
pub const UNKNOWN_LABEL: &str = "unknown";

/// Bijection between the labels of one categorical column and `[0, k)`.
///
/// Labels are kept in ascending byte order and a label's code is its
/// position, so the same input always yields the same codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCodeMap {
    labels: Vec<String>,
}

impl CategoryCodeMap {
    /// Build a map from any collection of labels; duplicates collapse
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let distinct: BTreeSet<String> = labels.into_iter().map(Into::into).collect();
        Self {
            labels: distinct.into_iter().collect(),
        }
    }

    pub fn encode(&self, label: &str) -> Option<u32> {
        self.labels
            .binary_search_by(|candidate| candidate.as_str().cmp(label))
            .ok()
            .map(|idx| idx as u32)
    }

    pub fn decode(&self, code: u32) -> Option<&str> {
        self.labels.get(code as usize).map(String::as_str)
    }

    /// Labels in code order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Code maps of every normalized column, keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeMaps {
    maps: BTreeMap<String, CategoryCodeMap>,
}

impl CodeMaps {
    pub fn get(&self, column: &str) -> Option<&CategoryCodeMap> {
        self.maps.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CategoryCodeMap)> {
        self.maps.iter().map(|(name, map)| (name.as_str(), map))
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Return a copy of `table` with the coded `column` restored to its text
    /// labels.
    pub fn decode_column(&self, table: &RecordTable, column: &str) -> Result<RecordTable> {
        let map = self
            .get(column)
            .ok_or_else(|| Error::schema(column, "no category code map for column"))?;
        let codes = match table.require(column)? {
            Column::Code(codes) => codes,
            other => {
                return Err(Error::schema(
                    column,
                    format!("expected code column, found {}", other.kind()),
                ))
            }
        };

        let labels = codes
            .iter()
            .map(|&code| {
                map.decode(code)
                    .map(|label| Some(label.to_owned()))
                    .ok_or_else(|| {
                        Error::schema(column, format!("code {code} outside [0, {})", map.len()))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        table.clone().with_column(column, Column::Text(labels))
    }
}

/// Output of [`normalize`]: the encoded table and the maps to undo it
#[derive(Debug, Clone)]
pub struct Normalized {
    pub table: RecordTable,
    pub code_maps: CodeMaps,
    /// Missing cells replaced by [`UNKNOWN_LABEL`], per normalized column
    pub imputed: BTreeMap<String, usize>,
}

/// Impute and encode the given categorical columns.
///
/// Missing cells become [`UNKNOWN_LABEL`], then each column is replaced by
/// its integer codes. Columns not listed pass through untouched. All declared
/// columns are checked before anything is encoded.
pub fn normalize<S: AsRef<str>>(table: &RecordTable, categorical: &[S]) -> Result<Normalized> {
    let mut sources = Vec::with_capacity(categorical.len());
    for name in categorical {
        let name = name.as_ref();
        match table.require(name)? {
            Column::Text(cells) => sources.push((name, cells)),
            other => {
                return Err(Error::schema(
                    name,
                    format!("expected categorical text column, found {}", other.kind()),
                ))
            }
        }
    }

    let mut encoded = table.clone();
    let mut maps = BTreeMap::new();
    let mut imputed = BTreeMap::new();

    for (name, cells) in sources {
        let filled: Vec<&str> = cells
            .iter()
            .map(|cell| cell.as_deref().unwrap_or(UNKNOWN_LABEL))
            .collect();
        let missing = cells.iter().filter(|cell| cell.is_none()).count();

        let map = CategoryCodeMap::from_labels(filled.iter().copied());
        let codes = filled
            .iter()
            .map(|label| {
                map.encode(label)
                    .ok_or_else(|| Error::schema(name, format!("label '{label}' not in code map")))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            column = name,
            categories = map.len(),
            imputed = missing,
            "encoded categorical column"
        );

        encoded = encoded.with_column(name, Column::Code(codes))?;
        maps.insert(name.to_owned(), map);
        imputed.insert(name.to_owned(), missing);
    }

    Ok(Normalized {
        table: encoded,
        code_maps: CodeMaps { maps },
        imputed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn savings_table() -> RecordTable {
        RecordTable::new()
            .with_column("Age", Column::Numeric(vec![25.0, 52.0, 23.0, 46.0]))
            .unwrap()
            .with_column(
                "Saving accounts",
                Column::text([None, Some("little"), None, Some("rich")]),
            )
            .unwrap()
    }

    fn codes(table: &RecordTable, name: &str) -> Vec<u32> {
        match table.column(name) {
            Some(Column::Code(codes)) => codes.clone(),
            other => panic!("expected code column, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_values_share_unknown_code() {
        let normalized = normalize(&savings_table(), &["Saving accounts"]).unwrap();
        let codes = codes(&normalized.table, "Saving accounts");
        let map = normalized.code_maps.get("Saving accounts").unwrap();

        assert_eq!(codes[0], codes[2]);
        assert_eq!(Some(codes[0]), map.encode(UNKNOWN_LABEL));
        assert_ne!(codes[1], codes[0]);
        assert_eq!(map.labels(), &["little", "rich", "unknown"]);
    }

    #[test]
    fn test_imputed_counts_per_column() {
        let table = savings_table()
            .with_column("Housing", Column::text([Some("own"); 4]))
            .unwrap();
        let normalized = normalize(&table, &["Saving accounts", "Housing"]).unwrap();

        assert_eq!(normalized.imputed.get("Saving accounts"), Some(&2));
        assert_eq!(normalized.imputed.get("Housing"), Some(&0));
        assert_eq!(normalized.imputed.get("Age"), None);
    }

    #[test]
    fn test_codes_in_range_and_round_trip() {
        let normalized = normalize(&savings_table(), &["Saving accounts"]).unwrap();
        let map = normalized.code_maps.get("Saving accounts").unwrap();

        for code in codes(&normalized.table, "Saving accounts") {
            assert!((code as usize) < map.len());
            let label = map.decode(code).unwrap();
            assert_eq!(map.encode(label), Some(code));
        }
    }

    #[test]
    fn test_numeric_columns_pass_through() {
        let table = savings_table();
        let normalized = normalize(&table, &["Saving accounts"]).unwrap();
        assert_eq!(
            normalized.table.numeric("Age").unwrap(),
            table.numeric("Age").unwrap()
        );
        assert_eq!(normalized.table.height(), table.height());
    }

    #[test]
    fn test_encoding_is_stable_across_orderings() {
        let a = CategoryCodeMap::from_labels(["rich", "little", "moderate"]);
        let b = CategoryCodeMap::from_labels(["moderate", "rich", "little", "rich"]);
        assert_eq!(a, b);
        assert_eq!(a.encode("little"), Some(0));
        assert_eq!(a.encode("missing"), None);
        assert_eq!(a.decode(3), None);
    }

    #[test]
    fn test_absent_column_is_schema_error() {
        let result = normalize(&savings_table(), &["Saving accounts", "Purpose"]);
        assert!(matches!(result, Err(Error::Schema { ref column, .. }) if column == "Purpose"));
    }

    #[test]
    fn test_numeric_column_declared_categorical_is_rejected() {
        let result = normalize(&savings_table(), &["Age"]);
        assert!(matches!(result, Err(Error::Schema { .. })));
    }

    #[test]
    fn test_decode_column_restores_labels() {
        let normalized = normalize(&savings_table(), &["Saving accounts"]).unwrap();
        let decoded = normalized
            .code_maps
            .decode_column(&normalized.table, "Saving accounts")
            .unwrap();

        assert_eq!(
            decoded.column("Saving accounts"),
            Some(&Column::text([
                Some("unknown"),
                Some("little"),
                Some("unknown"),
                Some("rich")
            ]))
        );
        // the coded table itself is left as is
        assert_eq!(
            normalized.table.column("Saving accounts").map(Column::kind),
            Some(crate::table::ColumnKind::Code)
        );
    }

    #[test]
    fn test_decode_column_without_map() {
        let normalized = normalize(&savings_table(), &["Saving accounts"]).unwrap();
        let result = normalized.code_maps.decode_column(&normalized.table, "Age");
        assert!(matches!(result, Err(Error::Schema { .. })));
    }
}
