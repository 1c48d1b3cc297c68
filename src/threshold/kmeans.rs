//! Clustering-based membership thresholds.

use ndarray::ArrayView1;
use std::cmp::Ordering;

use crate::threshold::dagostino::EMPTY_MODULE_MARGIN;

/// Arguments for k-means clustering
#[derive(Debug, Clone)]
pub struct KmeansArgs {
    /// Number of clusters
    pub num_clusters: usize,
    /// Maximum number of iterations
    pub max_iter: usize,
    /// Independent clusterings, the one with the lowest within-cluster sum of squares is kept
    pub num_restarts: usize,
}

impl Default for KmeansArgs {
    fn default() -> Self {
        Self {
            num_clusters: 3,
            max_iter: 300,
            num_restarts: 10,
        }
    }
}

/// K-means on scalar values.
///
/// Clusters are relabeled by increasing centroid and empty clusters are dropped, so labels
/// do not depend on the random initialization. With at most `num_clusters` distinct values
/// every distinct value forms its own cluster.
///
/// # Returns
/// Cluster assignment per value and the centroid of each label
pub fn kmeans_1d(values: &[f64], args: &KmeansArgs) -> (Vec<usize>, Vec<f64>) {
    if values.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let k = args.num_clusters.max(1);

    let mut distinct = values.to_vec();
    distinct.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    distinct.dedup();
    let membership = if k == 1 {
        vec![0; values.len()]
    } else if distinct.len() <= k {
        values
            .iter()
            .map(|x| distinct.iter().position(|d| d == x).unwrap_or(0))
            .collect()
    } else {
        let data: Vec<Vec<f64>> = values.iter().map(|&x| vec![x]).collect();
        let mut best: Option<(f64, Vec<usize>)> = None;
        for _ in 0..args.num_restarts.max(1) {
            let clust = clustering::kmeans(k, &data, args.max_iter);
            let (_, centroids) = cluster_means(values, &clust.membership);
            let inertia = within_cluster_ss(values, &clust.membership, &centroids);
            if best.as_ref().is_none_or(|(top, _)| inertia < *top) {
                best = Some((inertia, clust.membership));
            }
        }
        best.map(|(_, membership)| membership).unwrap_or_default()
    };
    relabel_by_centroid(values, &membership)
}

/// Per-label counts and means, `NaN` for empty labels.
fn cluster_means(values: &[f64], membership: &[usize]) -> (Vec<usize>, Vec<f64>) {
    let n_labels = membership.iter().max().map_or(0, |&m| m + 1);
    let mut sums = vec![0.0; n_labels];
    let mut counts = vec![0usize; n_labels];
    for (&x, &c) in values.iter().zip(membership) {
        sums[c] += x;
        counts[c] += 1;
    }
    let means = sums
        .iter()
        .zip(&counts)
        .map(|(&sum, &count)| if count > 0 { sum / count as f64 } else { f64::NAN })
        .collect();
    (counts, means)
}

fn within_cluster_ss(values: &[f64], membership: &[usize], centroids: &[f64]) -> f64 {
    values
        .iter()
        .zip(membership)
        .map(|(&x, &c)| (x - centroids[c]).powi(2))
        .sum()
}

fn relabel_by_centroid(values: &[f64], membership: &[usize]) -> (Vec<usize>, Vec<f64>) {
    let (counts, means) = cluster_means(values, membership);
    let mut labels: Vec<usize> = (0..counts.len()).filter(|&c| counts[c] > 0).collect();
    labels.sort_by(|&a, &b| means[a].partial_cmp(&means[b]).unwrap_or(Ordering::Equal));

    let mut new_label = vec![0; counts.len()];
    for (rank, &c) in labels.iter().enumerate() {
        new_label[c] = rank;
    }
    let assignments = membership.iter().map(|&c| new_label[c]).collect();
    let centroids = labels.iter().map(|&c| means[c]).collect();
    (assignments, centroids)
}

/// Threshold of one weight column from a three-way clustering of |weight|.
///
/// The two smallest clusters hold the module genes; the threshold is the midpoint between
/// the lowest value of the smallest cluster and the highest value of the next one. Clusters
/// of equal size are ordered by decreasing centroid.
pub fn kmeans_threshold(weights: ArrayView1<'_, f64>) -> f64 {
    let magnitudes: Vec<f64> = weights.iter().map(|w| w.abs()).collect();
    let (assignments, centroids) = kmeans_1d(&magnitudes, &KmeansArgs::default());

    let mut counts = vec![0usize; centroids.len()];
    for &c in &assignments {
        counts[c] += 1;
    }
    let mut clusters: Vec<usize> = (0..centroids.len()).filter(|&j| counts[j] > 0).collect();
    if clusters.len() < 2 {
        let max = magnitudes.iter().copied().fold(0.0, f64::max);
        return max + EMPTY_MODULE_MARGIN;
    }
    clusters.sort_by(|&a, &b| {
        counts[a].cmp(&counts[b]).then(
            centroids[b]
                .partial_cmp(&centroids[a])
                .unwrap_or(Ordering::Equal),
        )
    });

    let (smallest, next) = (clusters[0], clusters[1]);
    let mut low = f64::INFINITY;
    let mut high = f64::NEG_INFINITY;
    for (&w, &c) in magnitudes.iter().zip(assignments.iter()) {
        if c == smallest {
            low = low.min(w);
        } else if c == next {
            high = high.max(w);
        }
    }
    (low + high) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array1;

    #[test]
    fn three_levels_are_separated() {
        let values = [0.01, 0.02, 0.03, 0.015, 0.025, 0.2, 0.22, 0.5];
        let (assignments, centroids) = kmeans_1d(&values, &KmeansArgs::default());
        assert_eq!(assignments, vec![0, 0, 0, 0, 0, 1, 1, 2]);
        assert_relative_eq!(centroids[2], 0.5, epsilon = 1e-12);
        assert_relative_eq!(centroids[1], 0.21, epsilon = 1e-12);
    }

    #[test]
    fn few_distinct_values_form_their_own_clusters() {
        let (assignments, centroids) = kmeans_1d(&[0.4, 0.1, 0.4, 0.1], &KmeansArgs::default());
        assert_eq!(assignments, vec![1, 0, 1, 0]);
        assert_eq!(centroids, vec![0.1, 0.4]);
        let (single, _) = kmeans_1d(&[0.3, 0.7], &KmeansArgs { num_clusters: 1, ..Default::default() });
        assert_eq!(single, vec![0, 0]);
    }

    #[test]
    fn threshold_splits_background_from_the_rest() {
        let column = Array1::from(vec![0.01, -0.02, 0.03, 0.015, -0.025, 0.2, -0.22, 0.5]);
        // smallest cluster {0.5}, next {0.2, 0.22}
        assert_relative_eq!(kmeans_threshold(column.view()), (0.5 + 0.22) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn constant_column_has_no_members() {
        let column = Array1::from(vec![0.1, -0.1, 0.1, 0.1]);
        assert_relative_eq!(kmeans_threshold(column.view()), 0.15, epsilon = 1e-12);
    }

    #[test]
    fn equal_sized_clusters_prefer_higher_centroid() {
        let column = Array1::from(vec![0.0, 0.0, 0.5, 0.5, 1.0, 1.0]);
        // all clusters have two genes: order is {1.0}, {0.5}, {0.0}
        assert_relative_eq!(kmeans_threshold(column.view()), 0.75, epsilon = 1e-12);
    }
}
