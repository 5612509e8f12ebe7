//! Command-line interface definitions and argument parsing

use crate::data::LoadOptions;
use crate::pipeline::PipelineConfig;
use crate::scale::ZeroVariancePolicy;
use clap::builder::RangedU64ValueParser;
use clap::Parser;

/// Credit applicant profiling and K-Means segmentation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file
    #[arg(short, long, default_value = "data/german_credit_data.csv")]
    pub input: String,

    /// Number of clusters for K-Means
    #[arg(short = 'k', long, default_value = "3")]
    pub clusters: usize,

    /// Seed for centroid initialization
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Maximum iterations for K-Means algorithm
    #[arg(long, default_value = "300", value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub max_iters: usize,

    /// Numeric columns used for clustering, comma-separated
    #[arg(long, value_delimiter = ',', default_values = ["Age", "Credit amount", "Duration"])]
    pub features: Vec<String>,

    /// Directory for the rendered charts
    #[arg(short, long, default_value = "images")]
    pub output_dir: String,

    /// Fail on zero-variance features instead of scaling them to 0
    #[arg(long)]
    pub strict_scaling: bool,

    /// The first CSV column is data, not a row index
    #[arg(long)]
    pub no_index: bool,

    /// Skip chart rendering
    #[arg(long)]
    pub no_charts: bool,

    /// Prediction mode: feature values of a new applicant, comma-separated
    /// Example: --predict "35,4000,24" for Age=35, Credit amount=4000, Duration=24
    #[arg(short, long)]
    pub predict: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl Args {
    /// Parse the feature values given to `--predict`, one per feature
    pub fn parse_applicant_values(&self) -> anyhow::Result<Option<Vec<f64>>> {
        let Some(ref predict_str) = self.predict else {
            return Ok(None);
        };

        let parts: Vec<&str> = predict_str.split(',').collect();
        if parts.len() != self.features.len() {
            anyhow::bail!(
                "Predict values must be in format '{}'",
                self.features.join(",")
            );
        }

        let values = parts
            .iter()
            .zip(&self.features)
            .map(|(part, feature)| {
                part.trim()
                    .parse::<f64>()
                    .map_err(|_| anyhow::anyhow!("Invalid {} value: {}", feature, part))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Some(values))
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let policy = if self.strict_scaling {
            ZeroVariancePolicy::Reject
        } else {
            ZeroVariancePolicy::ZeroFill
        };

        PipelineConfig::default()
            .with_clusters(self.clusters)
            .with_seed(self.seed)
            .with_max_iterations(self.max_iters)
            .with_features(self.features.iter().map(|f| f.trim().to_string()))
            .with_zero_variance(policy)
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            index_column: !self.no_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["creditlens"]);
        assert_eq!(args.clusters, 3);
        assert_eq!(args.seed, 42);
        assert_eq!(args.features, vec!["Age", "Credit amount", "Duration"]);

        let config = args.pipeline_config();
        assert_eq!(config, PipelineConfig::default());
        assert!(args.load_options().index_column);
    }

    #[test]
    fn test_parse_applicant_values() {
        let mut args = Args::parse_from(["creditlens", "--predict", "35,4000.5,24"]);

        let result = args.parse_applicant_values().unwrap();
        assert_eq!(result, Some(vec![35.0, 4000.5, 24.0]));

        args.predict = None;
        assert_eq!(args.parse_applicant_values().unwrap(), None);

        args.predict = Some("invalid".to_string());
        assert!(args.parse_applicant_values().is_err());

        args.predict = Some("35,abc,24".to_string());
        assert!(args.parse_applicant_values().is_err());
    }

    #[test]
    fn test_flags_map_onto_config() {
        let args = Args::parse_from([
            "creditlens",
            "-k",
            "4",
            "--seed",
            "7",
            "--features",
            "Age,Duration",
            "--strict-scaling",
            "--no-index",
        ]);

        let config = args.pipeline_config();
        assert_eq!(config.n_clusters, 4);
        assert_eq!(config.seed, 7);
        assert_eq!(config.features, vec!["Age", "Duration"]);
        assert_eq!(config.zero_variance, ZeroVariancePolicy::Reject);
        assert!(!args.load_options().index_column);
    }

    #[test]
    fn test_predict_checked_against_feature_count() {
        let args = Args::parse_from([
            "creditlens",
            "--input",
            "missing.csv",
            "--features",
            "Age,Duration",
            "--predict",
            "35,4000,24",
        ]);
        let err = args.parse_applicant_values().unwrap_err();
        assert!(err.to_string().contains("Age,Duration"));
    }

    #[test]
    fn test_zero_max_iterations_rejected() {
        assert!(Args::try_parse_from(["creditlens", "--max-iters", "0"]).is_err());
        let args = Args::try_parse_from(["creditlens", "--max-iters", "1"]).unwrap();
        assert_eq!(args.pipeline_config().max_iterations, 1);
    }
}
