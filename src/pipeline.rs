//! End-to-end preparation and segmentation pipeline
//!
//! Every stage takes the previous stage's output by reference and returns a
//! new value, so the order `normalize -> describe -> scale -> segment` is
//! visible in the types and each stage can be tested on its own.

use crate::error::{Error, Result};
use crate::model::{KMeansParams, SegmentationModel, DEFAULT_MAX_ITERATIONS};
use crate::normalize::{normalize, CodeMaps};
use crate::scale::{scale_features, ScaledFeatures, ZeroVariancePolicy};
use crate::summary::{
    correlation_matrix, describe, group_mean, group_quartiles, ColumnSummary, CorrelationMatrix,
    GroupMean, GroupQuartiles,
};
use crate::table::{Column, RecordTable};
use ndarray::Array2;
use std::collections::BTreeMap;
use tracing::info;

/// Name of the derived cluster label column
pub const CLUSTER_COLUMN: &str = "Cluster";

pub const AGE: &str = "Age";
pub const CREDIT_AMOUNT: &str = "Credit amount";
pub const DURATION: &str = "Duration";
pub const SEX: &str = "Sex";
pub const HOUSING: &str = "Housing";
pub const SAVING_ACCOUNTS: &str = "Saving accounts";
pub const CHECKING_ACCOUNT: &str = "Checking account";
pub const PURPOSE: &str = "Purpose";

/// Pipeline settings. `Default` describes the German credit data layout.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Columns to impute and encode
    pub categorical: Vec<String>,
    /// Categorical columns allowed to contain missing cells
    pub nullable: Vec<String>,
    /// Numeric columns fed to the scaler and the clustering, in order
    pub features: Vec<String>,
    pub n_clusters: usize,
    pub seed: u64,
    pub max_iterations: usize,
    pub zero_variance: ZeroVariancePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            categorical: [SEX, HOUSING, SAVING_ACCOUNTS, CHECKING_ACCOUNT, PURPOSE]
                .map(String::from)
                .to_vec(),
            nullable: [SAVING_ACCOUNTS, CHECKING_ACCOUNT].map(String::from).to_vec(),
            features: [AGE, CREDIT_AMOUNT, DURATION].map(String::from).to_vec(),
            n_clusters: 3,
            seed: 42,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            zero_variance: ZeroVariancePolicy::ZeroFill,
        }
    }
}

impl PipelineConfig {
    pub fn with_clusters(mut self, n_clusters: usize) -> Self {
        self.n_clusters = n_clusters;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_features<S: Into<String>>(mut self, features: impl IntoIterator<Item = S>) -> Self {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_categorical<S: Into<String>>(
        mut self,
        categorical: impl IntoIterator<Item = S>,
    ) -> Self {
        self.categorical = categorical.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_zero_variance(mut self, policy: ZeroVariancePolicy) -> Self {
        self.zero_variance = policy;
        self
    }

    fn kmeans(&self) -> KMeansParams {
        KMeansParams::new(self.n_clusters, self.seed).max_iterations(self.max_iterations)
    }
}

/// Check the input contract before any stage runs: features are numeric,
/// categorical columns are text, and only nullable columns have gaps.
pub fn validate_input(table: &RecordTable, config: &PipelineConfig) -> Result<()> {
    for feature in &config.features {
        table.numeric(feature)?;
    }

    for name in &config.categorical {
        match table.require(name)? {
            Column::Text(cells) => {
                let missing = cells.iter().filter(|c| c.is_none()).count();
                if missing > 0 && !config.nullable.contains(name) {
                    return Err(Error::schema(
                        name.as_str(),
                        format!("{missing} missing values in a required column"),
                    ));
                }
            }
            other => {
                return Err(Error::schema(
                    name.as_str(),
                    format!("expected categorical text column, found {}", other.kind()),
                ))
            }
        }
    }
    Ok(())
}

/// Everything the pipeline produced
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Input table with coded categoricals and the cluster column
    pub table: RecordTable,
    pub code_maps: CodeMaps,
    /// Missing cells filled per categorical column
    pub imputed: BTreeMap<String, usize>,
    /// Statistics of the encoded table, before clustering
    pub summary: Vec<ColumnSummary>,
    pub correlations: CorrelationMatrix,
    pub scaled: ScaledFeatures,
    pub model: SegmentationModel,
}

impl PipelineOutput {
    /// The output table with one coded column restored to its labels
    pub fn decoded(&self, column: &str) -> Result<RecordTable> {
        self.code_maps.decode_column(&self.table, column)
    }

    fn grouping_view(&self, group: &str) -> Result<RecordTable> {
        match self.table.require(group)? {
            Column::Code(_) => self.decoded(group),
            _ => Ok(self.table.clone()),
        }
    }

    /// Mean of `value` per original label of `group`, highest first
    pub fn group_mean(&self, group: &str, value: &str) -> Result<Vec<GroupMean>> {
        group_mean(&self.grouping_view(group)?, group, value)
    }

    /// Quartiles of `value` per original label of `group`
    pub fn group_quartiles<S: AsRef<str>>(
        &self,
        group: &str,
        value: &str,
        order: &[S],
    ) -> Result<Vec<GroupQuartiles>> {
        group_quartiles(&self.grouping_view(group)?, group, value, order)
    }

    pub fn silhouette(&self) -> Option<f64> {
        self.model.silhouette(&self.scaled.matrix)
    }

    /// Cluster centroids in the original feature units
    pub fn raw_centroids(&self) -> Result<Array2<f64>> {
        self.scaled.scaler.inverse_transform(&self.model.centroids)
    }

    /// Cluster of a new applicant given raw feature values
    pub fn predict(&self, raw: &[f64]) -> Result<usize> {
        let scaled = self.scaled.scaler.transform_row(raw)?;
        self.model.predict(scaled.view())
    }
}

/// Run normalization, summary statistics, scaling and segmentation
pub fn run(table: &RecordTable, config: &PipelineConfig) -> Result<PipelineOutput> {
    validate_input(table, config)?;
    let rows = table.height();

    let normalized = normalize(table, &config.categorical)?;
    let summary = describe(&normalized.table);
    let correlations = correlation_matrix(&normalized.table);

    let scaled = scale_features(&normalized.table, &config.features, config.zero_variance)?;
    let model = config.kmeans().fit(&scaled.matrix)?;

    let table = normalized
        .table
        .with_column(CLUSTER_COLUMN, Column::Label(model.labels.to_vec()))?;
    debug_assert_eq!(table.height(), rows);

    info!(
        rows,
        clusters = config.n_clusters,
        encoded = normalized.code_maps.len(),
        "pipeline complete"
    );

    Ok(PipelineOutput {
        table,
        code_maps: normalized.code_maps,
        imputed: normalized.imputed,
        summary,
        correlations,
        scaled,
        model,
    })
}
