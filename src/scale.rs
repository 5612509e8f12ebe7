//! Standardization of the features used for clustering

use crate::error::{Error, Result};
use crate::table::RecordTable;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use tracing::{debug, warn};

/// What to do with a feature whose standard deviation is zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroVariancePolicy {
    /// Scale the feature to 0 for every row
    #[default]
    ZeroFill,
    /// Fail with [`Error::DegenerateFeature`]
    Reject,
}

/// Per-column standardization `(x - mean) / std` using the population
/// standard deviation (ddof = 0).
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    feature_names: Vec<String>,
    means: Array1<f64>,
    stds: Array1<f64>,
}

impl StandardScaler {
    /// Fit the scaler on `features`, one named column per feature
    pub fn fit<S: AsRef<str>>(
        features: &Array2<f64>,
        names: &[S],
        policy: ZeroVariancePolicy,
    ) -> Result<Self> {
        if names.len() != features.ncols() {
            return Err(Error::schema(
                names.first().map_or("", |n| n.as_ref()),
                format!(
                    "{} feature names for {} columns",
                    names.len(),
                    features.ncols()
                ),
            ));
        }

        let mut means = Array1::zeros(features.ncols());
        let mut stds = Array1::zeros(features.ncols());
        for (j, column) in features.axis_iter(Axis(1)).enumerate() {
            means[j] = column.mean().unwrap_or(f64::NAN);
            if is_constant(column) {
                let name = names[j].as_ref();
                match policy {
                    ZeroVariancePolicy::Reject => {
                        return Err(Error::DegenerateFeature {
                            column: name.to_owned(),
                        })
                    }
                    ZeroVariancePolicy::ZeroFill => {
                        warn!(feature = name, "zero-variance feature scaled to 0");
                    }
                }
            } else {
                stds[j] = column.std(0.0);
            }
        }

        Ok(Self {
            feature_names: names.iter().map(|n| n.as_ref().to_owned()).collect(),
            means,
            stds,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }

    pub fn stds(&self) -> &Array1<f64> {
        &self.stds
    }

    /// Scale a matrix with the fitted statistics
    pub fn transform(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(features.ncols())?;
        let mut scaled = features.clone();
        for mut row in scaled.axis_iter_mut(Axis(0)) {
            let standardized = self.scale_row(row.view());
            row.assign(&standardized);
        }
        Ok(scaled)
    }

    /// Scale one raw observation with the fitted statistics
    pub fn transform_row(&self, row: &[f64]) -> Result<Array1<f64>> {
        self.check_width(row.len())?;
        Ok(self.scale_row(ArrayView1::from(row)))
    }

    /// Map scaled values (e.g. centroids) back to the original units
    pub fn inverse_transform(&self, scaled: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(scaled.ncols())?;
        let mut raw = scaled.clone();
        for mut row in raw.axis_iter_mut(Axis(0)) {
            for (j, value) in row.iter_mut().enumerate() {
                *value = *value * self.stds[j] + self.means[j];
            }
        }
        Ok(raw)
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.feature_names.len() {
            return Err(Error::schema(
                self.feature_names.join(","),
                format!(
                    "expected {} values, got {}",
                    self.feature_names.len(),
                    width
                ),
            ));
        }
        Ok(())
    }

    // constant features have std 0 and scale to 0
    fn scale_row(&self, row: ArrayView1<f64>) -> Array1<f64> {
        row.iter()
            .zip(self.means.iter().zip(self.stds.iter()))
            .map(|(&x, (&mean, &std))| if std == 0.0 { 0.0 } else { (x - mean) / std })
            .collect()
    }
}

// all values equal, whatever their magnitude
fn is_constant(column: ArrayView1<f64>) -> bool {
    let min = column.iter().copied().fold(f64::INFINITY, f64::min);
    let max = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    !(max > min)
}

/// A scaled feature matrix together with the scaler that produced it
#[derive(Debug, Clone)]
pub struct ScaledFeatures {
    pub names: Vec<String>,
    pub matrix: Array2<f64>,
    pub scaler: StandardScaler,
}

/// Collect numeric `features` of the table into a row-major matrix
pub fn feature_matrix<S: AsRef<str>>(table: &RecordTable, features: &[S]) -> Result<Array2<f64>> {
    let columns = features
        .iter()
        .map(|name| table.numeric(name.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    Ok(Array2::from_shape_fn(
        (table.height(), columns.len()),
        |(i, j)| columns[j][i],
    ))
}

/// Standardize the selected features of `table`.
///
/// Statistics come from this table only and are recomputed on every call.
pub fn scale_features<S: AsRef<str>>(
    table: &RecordTable,
    features: &[S],
    policy: ZeroVariancePolicy,
) -> Result<ScaledFeatures> {
    let raw = feature_matrix(table, features)?;
    let scaler = StandardScaler::fit(&raw, features, policy)?;
    let matrix = scaler.transform(&raw)?;

    debug!(
        rows = matrix.nrows(),
        features = matrix.ncols(),
        "scaled feature matrix"
    );

    Ok(ScaledFeatures {
        names: scaler.feature_names().to_vec(),
        matrix,
        scaler,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn loans_table() -> RecordTable {
        RecordTable::new()
            .with_column("Age", Column::Numeric(vec![25.0, 52.0, 23.0, 46.0]))
            .unwrap()
            .with_column(
                "Credit amount",
                Column::Numeric(vec![1000.0, 20000.0, 900.0, 18000.0]),
            )
            .unwrap()
            .with_column("Duration", Column::Numeric(vec![6.0, 48.0, 4.0, 42.0]))
            .unwrap()
            .with_column("Job", Column::Numeric(vec![2.0, 2.0, 2.0, 2.0]))
            .unwrap()
            .with_column("Sex", Column::text([Some("male"); 4]))
            .unwrap()
    }

    #[test]
    fn test_scaled_columns_have_zero_mean_unit_std() {
        let scaled = scale_features(
            &loans_table(),
            &["Age", "Credit amount", "Duration"],
            ZeroVariancePolicy::ZeroFill,
        )
        .unwrap();

        assert_eq!(scaled.matrix.shape(), &[4, 3]);
        for column in scaled.matrix.axis_iter(Axis(1)) {
            assert!(column.mean().unwrap().abs() < 1e-12);
            assert!((column.std(0.0) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_variance_feature_is_zero_filled() {
        let scaled = scale_features(&loans_table(), &["Age", "Job"], ZeroVariancePolicy::ZeroFill)
            .unwrap();
        assert!(scaled.matrix.column(1).iter().all(|&v| v == 0.0));
        assert!(scaled.matrix.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_zero_variance_feature_rejected() {
        let result = scale_features(&loans_table(), &["Age", "Job"], ZeroVariancePolicy::Reject);
        assert_eq!(
            result.unwrap_err(),
            Error::DegenerateFeature {
                column: "Job".to_string()
            }
        );
    }

    #[test]
    fn test_non_numeric_feature_is_schema_error() {
        let table = loans_table();
        assert!(matches!(
            scale_features(&table, &["Sex"], ZeroVariancePolicy::ZeroFill),
            Err(Error::Schema { .. })
        ));
        assert!(matches!(
            scale_features(&table, &["Income"], ZeroVariancePolicy::ZeroFill),
            Err(Error::Schema { .. })
        ));
    }

    #[test]
    fn test_transform_row_and_inverse() {
        let scaled = scale_features(
            &loans_table(),
            &["Age", "Credit amount", "Duration"],
            ZeroVariancePolicy::ZeroFill,
        )
        .unwrap();

        let row = scaled.scaler.transform_row(&[25.0, 1000.0, 6.0]).unwrap();
        for (a, b) in row.iter().zip(scaled.matrix.row(0).iter()) {
            assert!((a - b).abs() < 1e-12);
        }

        let restored = scaled.scaler.inverse_transform(&scaled.matrix).unwrap();
        assert!((restored[[1, 1]] - 20000.0).abs() < 1e-6);

        assert!(scaled.scaler.transform_row(&[1.0]).is_err());
    }

    #[test]
    fn test_small_scale_feature_is_standardized() {
        let table = RecordTable::new()
            .with_column("Tiny", Column::Numeric(vec![1e-17, 2e-17, 3e-17, 4e-17]))
            .unwrap();

        for policy in [ZeroVariancePolicy::ZeroFill, ZeroVariancePolicy::Reject] {
            let scaled = scale_features(&table, &["Tiny"], policy).unwrap();
            let column = scaled.matrix.column(0);
            assert!(column.mean().unwrap().abs() < 1e-9);
            assert!((column.std(0.0) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_constant_fraction_is_degenerate() {
        let table = RecordTable::new()
            .with_column("Rate", Column::Numeric(vec![0.1; 7]))
            .unwrap();
        let scaled = scale_features(&table, &["Rate"], ZeroVariancePolicy::ZeroFill).unwrap();
        assert!(scaled.matrix.iter().all(|&v| v == 0.0));
        assert_eq!(scaled.scaler.stds()[0], 0.0);
        assert!(matches!(
            scale_features(&table, &["Rate"], ZeroVariancePolicy::Reject),
            Err(Error::DegenerateFeature { .. })
        ));
    }

    #[test]
    fn test_matrix_width_is_checked() {
        let table = RecordTable::new()
            .with_column("Age", Column::Numeric(vec![25.0, 52.0]))
            .unwrap();
        let scaled = scale_features(&table, &["Age"], ZeroVariancePolicy::ZeroFill).unwrap();

        let too_wide = Array2::from_elem((1, 2), 30.0);
        assert!(matches!(
            scaled.scaler.transform(&too_wide),
            Err(Error::Schema { .. })
        ));
        assert!(matches!(
            scaled.scaler.inverse_transform(&too_wide),
            Err(Error::Schema { .. })
        ));
        let raw = feature_matrix(&table, &["Age"]).unwrap();
        assert_eq!(scaled.scaler.transform(&raw).unwrap(), scaled.matrix);
    }
}
