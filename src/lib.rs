//! creditlens: profiling and K-Means segmentation of credit applicants
//!
//! The core is a four-stage pipeline over an in-memory [`RecordTable`]:
//! categorical normalization, descriptive statistics, feature scaling and
//! seeded K-Means clustering. CSV ingestion and chart rendering sit around it.

pub mod cli;
pub mod data;
pub mod error;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod scale;
pub mod summary;
pub mod table;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use data::{load_credit_table, LoadOptions};
pub use error::{Error, Result};
pub use model::{fit_kmeans, KMeansParams, SegmentationModel};
pub use normalize::{normalize, CategoryCodeMap, CodeMaps, Normalized, UNKNOWN_LABEL};
pub use pipeline::{run, PipelineConfig, PipelineOutput, CLUSTER_COLUMN};
pub use scale::{scale_features, ScaledFeatures, StandardScaler, ZeroVariancePolicy};
pub use summary::{describe, group_mean, ColumnSummary, GroupMean};
pub use table::{Column, ColumnKind, RecordTable};
pub use viz::generate_visualization_report;
