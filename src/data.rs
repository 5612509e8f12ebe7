//! Loading applicant records from CSV using Polars

use crate::table::{Column, RecordTable};
use anyhow::{bail, Context};
use polars::prelude::*;
use std::path::Path;
use tracing::info;

/// Options for reading the applicant CSV
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// The first column is a row index and not part of the data
    pub index_column: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { index_column: true }
    }
}

/// Load a CSV file into a record table
///
/// # Arguments
/// * `file_path` - Path to the CSV file
/// * `options` - Whether the first column is an index to drop
///
/// # Returns
/// * `RecordTable` with text columns for strings and numeric columns for
///   every integer or float column. `NA` and empty cells are missing values.
pub fn load_credit_table(
    file_path: impl AsRef<Path>,
    options: LoadOptions,
) -> anyhow::Result<RecordTable> {
    let file_path = file_path.as_ref();

    let df = LazyCsvReader::new(file_path)
        .with_has_header(true)
        .with_null_values(Some(NullValues::AllColumnsSingle("NA".into())))
        .finish()
        .with_context(|| format!("failed to scan {}", file_path.display()))?
        .collect()
        .with_context(|| format!("failed to read {}", file_path.display()))?;

    if df.height() == 0 {
        bail!("no records found in {}", file_path.display());
    }

    let table = table_from_dataframe(&df, usize::from(options.index_column))?;
    info!(
        rows = table.height(),
        columns = table.width(),
        path = %file_path.display(),
        "loaded applicant records"
    );
    Ok(table)
}

/// Convert a DataFrame into a record table, skipping the first `skip`
/// columns.
pub fn table_from_dataframe(df: &DataFrame, skip: usize) -> anyhow::Result<RecordTable> {
    let mut table = RecordTable::new();

    for series in df.get_columns().iter().skip(skip) {
        let name = series.name().to_string();
        let column = match series.dtype() {
            DataType::String => Column::Text(
                series
                    .str()?
                    .into_iter()
                    .map(|cell| cell.map(str::to_owned))
                    .collect(),
            ),
            DataType::Null => Column::Text(vec![None; series.len()]),
            dtype if dtype.is_numeric() => {
                let values = series.cast(&DataType::Float64)?;
                let values = values.f64()?;
                if values.null_count() > 0 {
                    bail!(
                        "numeric column '{}' has {} missing values",
                        name,
                        values.null_count()
                    );
                }
                Column::Numeric(values.into_no_null_iter().collect())
            }
            other => bail!("unsupported type {} for column '{}'", other, name),
        };
        table = table.with_column(name, column)?;
    }

    Ok(table)
}
