//! Descriptive statistics over a record table

use crate::error::{Error, Result};
use crate::normalize::UNKNOWN_LABEL;
use crate::table::{Column, RecordTable};
use ndarray::Array2;
use polars::prelude::*;
use std::collections::BTreeMap;

/// Per-column statistics, as reported by `describe`
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1)
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// Mean of a value column within one group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMean {
    pub label: String,
    pub count: usize,
    pub mean: f64,
}

/// Five-number summary of a value column within one group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupQuartiles {
    pub label: String,
    pub count: usize,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// Pairwise Pearson correlations between numeric columns
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        Some(self.values[[i, j]])
    }
}

/// One equal-width histogram bin, `[lower, upper)` except the last
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Summarize every numeric and code column of the table
pub fn describe(table: &RecordTable) -> Vec<ColumnSummary> {
    table
        .columns()
        .filter_map(|(name, column)| column.as_f64().map(|values| summarize(name, &values)))
        .collect()
}

fn summarize(name: &str, values: &[f64]) -> ColumnSummary {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let count = values.len();
    let mean = mean(values);
    let std = if count > 1 {
        let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (count - 1) as f64).sqrt()
    } else {
        f64::NAN
    };

    ColumnSummary {
        name: name.to_owned(),
        count,
        mean,
        std,
        min: sorted.first().copied().unwrap_or(f64::NAN),
        q25: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q75: quantile(&sorted, 0.75),
        max: sorted.last().copied().unwrap_or(f64::NAN),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Quantile of sorted data, interpolating linearly between closest ranks
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Textual group key of every row.
///
/// Only text and derived-label columns can be grouped: integer codes must be
/// decoded through their code map first.
fn group_keys(table: &RecordTable, group: &str) -> Result<Vec<String>> {
    match table.require(group)? {
        Column::Text(cells) => Ok(cells
            .iter()
            .map(|cell| cell.clone().unwrap_or_else(|| UNKNOWN_LABEL.to_owned()))
            .collect()),
        Column::Label(labels) => Ok(labels.iter().map(ToString::to_string).collect()),
        Column::Code(_) => Err(Error::schema(
            group,
            "grouping needs text labels; decode the code column first",
        )),
        Column::Numeric(_) => Err(Error::schema(
            group,
            "cannot group by a numeric column",
        )),
    }
}

// column names of the two-column frame handed to polars
const KEY: &str = "key";
const VALUE: &str = "value";

/// Group `value` by the labels of `group` and aggregate each group
fn aggregate(
    table: &RecordTable,
    group: &str,
    value: &str,
    aggs: Vec<Expr>,
) -> Result<DataFrame> {
    let keys = group_keys(table, group)?;
    let values = table.numeric(value)?;

    grouped_frame(keys, values, aggs).map_err(|err| group_by_error(group, err))
}

fn grouped_frame(keys: Vec<String>, values: &[f64], aggs: Vec<Expr>) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![Series::new(KEY, keys), Series::new(VALUE, values)])?
        .lazy()
        .group_by([col(KEY)])
        .agg(aggs)
        .collect()
}

fn group_by_error(group: &str, err: PolarsError) -> Error {
    Error::schema(group, format!("group-by failed: {err}"))
}

fn aggregated_labels(frame: &DataFrame) -> PolarsResult<Vec<String>> {
    Ok(frame
        .column(KEY)?
        .str()?
        .into_iter()
        .map(|label| label.unwrap_or(UNKNOWN_LABEL).to_owned())
        .collect())
}

fn aggregated_values(frame: &DataFrame, name: &str) -> PolarsResult<Vec<f64>> {
    let values = frame.column(name)?.cast(&DataType::Float64)?;
    let values = values.f64()?;
    Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

fn quartile_expr(q: f64, name: &str) -> Expr {
    col(VALUE)
        .quantile(lit(q), QuantileInterpolOptions::Linear)
        .alias(name)
}

/// Mean of `value` per label of `group`, highest mean first.
///
/// Equal means are ordered by label. Missing text cells are counted under
/// `unknown`.
pub fn group_mean(table: &RecordTable, group: &str, value: &str) -> Result<Vec<GroupMean>> {
    let frame = aggregate(
        table,
        group,
        value,
        vec![
            col(VALUE).count().alias("count"),
            col(VALUE).mean().alias("mean"),
        ],
    )?;

    let columns = || -> PolarsResult<_> {
        Ok((
            aggregated_labels(&frame)?,
            aggregated_values(&frame, "count")?,
            aggregated_values(&frame, "mean")?,
        ))
    };
    let (labels, counts, group_means) =
        columns().map_err(|err| group_by_error(group, err))?;

    let mut means: Vec<GroupMean> = labels
        .into_iter()
        .zip(counts)
        .zip(group_means)
        .map(|((label, count), mean)| GroupMean {
            label,
            count: count as usize,
            mean,
        })
        .collect();

    means.sort_by(|a, b| {
        b.mean
            .total_cmp(&a.mean)
            .then_with(|| a.label.cmp(&b.label))
    });
    Ok(means)
}

/// Five-number summary of `value` per label of `group`.
///
/// Groups come out in `order`; labels in `order` that have no rows are
/// skipped and groups not listed follow in label order.
pub fn group_quartiles<S: AsRef<str>>(
    table: &RecordTable,
    group: &str,
    value: &str,
    order: &[S],
) -> Result<Vec<GroupQuartiles>> {
    let frame = aggregate(
        table,
        group,
        value,
        vec![
            col(VALUE).count().alias("count"),
            col(VALUE).min().alias("min"),
            quartile_expr(0.25, "q25"),
            quartile_expr(0.5, "median"),
            quartile_expr(0.75, "q75"),
            col(VALUE).max().alias("max"),
        ],
    )?;

    let rows = || -> PolarsResult<BTreeMap<String, GroupQuartiles>> {
        let labels = aggregated_labels(&frame)?;
        let stats = ["count", "min", "q25", "median", "q75", "max"]
            .iter()
            .map(|name| aggregated_values(&frame, name))
            .collect::<PolarsResult<Vec<_>>>()?;

        Ok(labels
            .into_iter()
            .enumerate()
            .map(|(i, label)| {
                let quartiles = GroupQuartiles {
                    label: label.clone(),
                    count: stats[0][i] as usize,
                    min: stats[1][i],
                    q25: stats[2][i],
                    median: stats[3][i],
                    q75: stats[4][i],
                    max: stats[5][i],
                };
                (label, quartiles)
            })
            .collect())
    };
    let mut groups =
        rows().map_err(|err| group_by_error(group, err))?;

    let mut ordered = Vec::with_capacity(groups.len());
    for label in order {
        if let Some(quartiles) = groups.remove(label.as_ref()) {
            ordered.push(quartiles);
        }
    }
    ordered.extend(groups.into_values());
    Ok(ordered)
}

/// Pearson correlation between every pair of numeric and code columns
pub fn correlation_matrix(table: &RecordTable) -> CorrelationMatrix {
    let (columns, series): (Vec<String>, Vec<Vec<f64>>) = table
        .columns()
        .filter_map(|(name, column)| column.as_f64().map(|values| (name.to_owned(), values)))
        .unzip();

    let n = columns.len();
    let mut values = Array2::from_elem((n, n), f64::NAN);
    for i in 0..n {
        for j in i..n {
            let r = pearson(&series[i], &series[j]);
            values[[i, j]] = r;
            values[[j, i]] = r;
        }
    }

    CorrelationMatrix { columns, values }
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let (mx, my) = (mean(x), mean(y));
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (a, b) in x.iter().zip(y) {
        cov += (a - mx) * (b - my);
        vx += (a - mx).powi(2);
        vy += (b - my).powi(2);
    }
    if vx == 0.0 || vy == 0.0 {
        return f64::NAN;
    }
    cov / (vx.sqrt() * vy.sqrt())
}

/// Equal-width histogram of `values` over their range
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }

    let mut min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        min -= 0.5;
        max += 0.5;
    }
    let width = (max - min) / bins as f64;

    let mut counts = vec![0usize; bins];
    for &v in values {
        let idx = (((v - min) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: min + width * i as f64,
            upper: min + width * (i + 1) as f64,
            count,
        })
        .collect()
}
