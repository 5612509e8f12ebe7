//! K-Means segmentation engine

use crate::error::{Error, Result};
use linfa::metrics::SilhouetteScore;
use linfa::DatasetBase;
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

/// Iteration bound used when none is configured
pub const DEFAULT_MAX_ITERATIONS: usize = 300;

/// K-Means parameters
///
/// The seed is part of the parameters: two fits with the same parameters on
/// the same matrix produce the same labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KMeansParams {
    n_clusters: usize,
    max_iterations: usize,
    seed: u64,
}

impl KMeansParams {
    pub fn new(n_clusters: usize, seed: u64) -> Self {
        Self {
            n_clusters,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            seed,
        }
    }

    /// Cap on assignment/update rounds; at least one round always runs
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Run Lloyd's algorithm on the rows of `features`.
    ///
    /// 1. Pick K starting centroids among the rows with seeded k-means++
    /// 2. Assign each row to its nearest centroid (ties go to the lower index)
    /// 3. Move each centroid to the mean of its rows; empty clusters stay put
    /// 4. Stop once no row changes cluster, or after `max_iterations`
    pub fn fit(&self, features: &Array2<f64>) -> Result<SegmentationModel> {
        let n_samples = features.nrows();
        let k = self.n_clusters;
        if k < 2 || k > n_samples {
            return Err(Error::InvalidClusterCount { k, rows: n_samples });
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = init_centroids(features, k, &mut rng);
        let mut labels = Array1::<usize>::zeros(n_samples);
        let mut converged = false;
        let mut n_iterations = 0;

        for iteration in 0..self.max_iterations {
            n_iterations = iteration + 1;
            let changed = assign(features, &centroids, &mut labels);
            debug!(iteration, changed, "k-means assignment pass");

            if iteration > 0 && changed == 0 {
                converged = true;
                break;
            }
            centroids = update_centroids(features, &labels, &centroids);
        }

        if !converged {
            assign(features, &centroids, &mut labels);
        }

        let inertia = compute_inertia(features, &labels, &centroids);
        let model = SegmentationModel {
            n_clusters: k,
            labels,
            centroids,
            inertia,
            n_iterations,
            converged,
        };

        info!(
            clusters = k,
            iterations = n_iterations,
            converged,
            inertia = model.inertia,
            sizes = ?model.cluster_sizes(),
            "k-means fitted"
        );
        Ok(model)
    }
}

/// Fitted segmentation with its per-row labels
#[derive(Debug, Clone)]
pub struct SegmentationModel {
    /// Number of clusters
    pub n_clusters: usize,
    /// Cluster label of every training row
    pub labels: Array1<usize>,
    /// Cluster centroids in scaled space
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares
    pub inertia: f64,
    pub n_iterations: usize,
    /// False if the iteration bound stopped the fit
    pub converged: bool,
}

impl SegmentationModel {
    /// Nearest centroid of a scaled observation
    pub fn predict(&self, features: ArrayView1<f64>) -> Result<usize> {
        if features.len() != self.centroids.ncols() {
            return Err(Error::schema(
                "features",
                format!(
                    "feature vector must have {} dimensions, got {}",
                    self.centroids.ncols(),
                    features.len()
                ),
            ));
        }
        Ok(nearest(features, &self.centroids).0)
    }

    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in self.labels.iter() {
            sizes[label] += 1;
        }
        sizes
    }

    /// Mean silhouette coefficient of the training rows.
    ///
    /// `None` when fewer than two clusters are populated or `features` is
    /// not the matrix the model was fitted on.
    pub fn silhouette(&self, features: &Array2<f64>) -> Option<f64> {
        let populated = self.cluster_sizes().iter().filter(|&&s| s > 0).count();
        if populated < 2 || features.nrows() != self.labels.len() {
            return None;
        }

        let dataset = DatasetBase::new(features.clone(), self.labels.clone());
        dataset
            .silhouette_score()
            .ok()
            .filter(|score: &f64| score.is_finite())
    }
}

/// Convenience wrapper around [`KMeansParams::fit`]
pub fn fit_kmeans(
    features: &Array2<f64>,
    n_clusters: usize,
    max_iterations: usize,
    seed: u64,
) -> Result<SegmentationModel> {
    KMeansParams::new(n_clusters, seed)
        .max_iterations(max_iterations)
        .fit(features)
}

/// k-means++ seeding: the first centroid is a uniformly drawn row, each next
/// one is drawn with probability proportional to its squared distance from
/// the closest centroid chosen so far. When every row already coincides with
/// a centroid the draw falls back to uniform, which yields duplicate
/// centroids (and empty clusters) rather than an error.
fn init_centroids(features: &Array2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n_samples = features.nrows();
    let mut centroids = Array2::zeros((k, features.ncols()));

    let first = rng.gen_range(0..n_samples);
    centroids.row_mut(0).assign(&features.row(first));
    let mut min_dists: Vec<f64> = features
        .outer_iter()
        .map(|row| squared_distance(row, features.row(first)))
        .collect();

    for cluster in 1..k {
        let total: f64 = min_dists.iter().sum();
        let chosen = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = min_dists
                .iter()
                .rposition(|&d| d > 0.0)
                .unwrap_or(n_samples - 1);
            for (idx, &d) in min_dists.iter().enumerate() {
                if target < d {
                    chosen = idx;
                    break;
                }
                target -= d;
            }
            chosen
        } else {
            rng.gen_range(0..n_samples)
        };

        centroids.row_mut(cluster).assign(&features.row(chosen));
        for (idx, row) in features.outer_iter().enumerate() {
            let d = squared_distance(row, features.row(chosen));
            if d < min_dists[idx] {
                min_dists[idx] = d;
            }
        }
    }

    centroids
}

/// Assign every row to its nearest centroid, returning how many moved
fn assign(features: &Array2<f64>, centroids: &Array2<f64>, labels: &mut Array1<usize>) -> usize {
    let mut changed = 0;
    for (idx, row) in features.outer_iter().enumerate() {
        let (cluster, _) = nearest(row, centroids);
        if labels[idx] != cluster {
            labels[idx] = cluster;
            changed += 1;
        }
    }
    changed
}

fn update_centroids(
    features: &Array2<f64>,
    labels: &Array1<usize>,
    previous: &Array2<f64>,
) -> Array2<f64> {
    let mut sums = Array2::<f64>::zeros(previous.raw_dim());
    let mut counts = vec![0usize; previous.nrows()];
    for (row, &label) in features.outer_iter().zip(labels.iter()) {
        let mut sum = sums.row_mut(label);
        sum += &row;
        counts[label] += 1;
    }

    let mut centroids = previous.clone();
    for (cluster, &count) in counts.iter().enumerate() {
        if count > 0 {
            let mean = &sums.row(cluster) / count as f64;
            centroids.row_mut(cluster).assign(&mean);
        }
    }
    centroids
}

fn nearest(point: ArrayView1<f64>, centroids: &Array2<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (cluster, centroid) in centroids.outer_iter().enumerate() {
        let d = squared_distance(point, centroid);
        if d < best.1 {
            best = (cluster, d);
        }
    }
    best
}

/// Within-cluster sum of squares (inertia)
fn compute_inertia(features: &Array2<f64>, labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    features
        .outer_iter()
        .zip(labels.iter())
        .map(|(row, &label)| squared_distance(row, centroids.row(label)))
        .sum()
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}
