//! Moment-based membership thresholds.
//!
//! Genes are removed from a module in decreasing order of absolute weight until the
//! remaining weights look normal, i.e. until the D'Agostino-Pearson `K²` statistic drops to
//! the cutoff. The removed genes are the module members.

use ndarray::ArrayView1;
use std::cmp::Ordering;

use crate::testing::inference::normality::{PowerSums, k_squared};

/// Margin above the largest weight used when a module has no members.
pub const EMPTY_MODULE_MARGIN: f64 = 0.05;

/// `K²` trajectory of one weight column under successive removal of its top gene.
///
/// Building the profile costs one pass over the sorted weights; every later cutoff is
/// answered without re-running the normality test.
#[derive(Debug, Clone, PartialEq)]
pub struct DagostinoProfile {
    /// gene positions by decreasing |weight|
    order: Vec<usize>,
    /// |weight| in the same order
    magnitudes: Vec<f64>,
    /// `k2[r]` is `K²` of the genes left after removing the top `r`
    k2: Vec<f64>,
}

impl DagostinoProfile {
    pub fn new(weights: ArrayView1<'_, f64>) -> Self {
        let mut order: Vec<usize> = (0..weights.len()).collect();
        order.sort_by(|&a, &b| {
            weights[b]
                .abs()
                .partial_cmp(&weights[a].abs())
                .unwrap_or(Ordering::Equal)
        });
        let magnitudes: Vec<f64> = order.iter().map(|&i| weights[i].abs()).collect();

        let signed: Vec<f64> = weights.iter().copied().collect();
        let mut sums = PowerSums::from_values(&signed);
        let mut k2 = Vec::new();
        while let Some(k) = k_squared(&sums) {
            sums.remove(signed[order[k2.len()]]);
            k2.push(k);
        }

        DagostinoProfile {
            order,
            magnitudes,
            k2,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `K²` after removing 0, 1, 2, ... top genes.
    pub fn trajectory(&self) -> &[f64] {
        &self.k2
    }

    /// Number of top genes removed before `K²` is no longer above `cutoff`.
    ///
    /// Removal also stops once too few genes remain for the test.
    pub fn removed_at(&self, cutoff: f64) -> usize {
        self.k2
            .iter()
            .position(|&k| k.is_nan() || k <= cutoff)
            .unwrap_or(self.k2.len())
    }

    /// Absolute-weight threshold at `cutoff`.
    ///
    /// The midpoint of the weakest member and the strongest non-member, or
    /// `max|w| + 0.05` when no gene was removed.
    pub fn threshold(&self, cutoff: f64) -> f64 {
        let removed = self.removed_at(cutoff);
        if removed == 0 {
            return self.magnitudes.first().copied().unwrap_or(0.0) + EMPTY_MODULE_MARGIN;
        }
        (self.magnitudes[removed - 1] + self.magnitudes[removed]) / 2.0
    }

    /// Gene positions whose |weight| exceeds the threshold at `cutoff`, strongest first.
    pub fn members(&self, cutoff: f64) -> Vec<usize> {
        let threshold = self.threshold(cutoff);
        self.order
            .iter()
            .zip(self.magnitudes.iter())
            .take_while(|&(_, &w)| w > threshold)
            .map(|(&i, _)| i)
            .collect()
    }
}

/// Threshold of one weight column at a D'Agostino cutoff.
pub fn compute_dagostino_threshold(weights: ArrayView1<'_, f64>, cutoff: f64) -> f64 {
    DagostinoProfile::new(weights).threshold(cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array1;

    fn background() -> Vec<f64> {
        vec![
            -0.021, 0.013, 0.004, -0.008, 0.017, -0.012, 0.002, 0.009, -0.015, 0.006, 0.011,
            -0.003, 0.019, -0.018, 0.001, 0.007, -0.010, 0.014, -0.005, 0.003,
        ]
    }

    #[test]
    fn outlying_genes_become_members() {
        let mut weights = background();
        weights.extend([0.42, -0.38, 0.35]);
        let column = Array1::from(weights);
        let profile = DagostinoProfile::new(column.view());

        assert!(profile.trajectory()[0] > 10.0);
        // K² falls from 52 to below 2 once the third outlier is removed
        let members = profile.members(10.0);
        assert_eq!(members, vec![20, 21, 22]);
        assert_relative_eq!(profile.threshold(10.0), (0.35 + 0.021) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn normal_column_has_no_members() {
        let column = Array1::from(background());
        let profile = DagostinoProfile::new(column.view());
        assert_eq!(profile.removed_at(550.0), 0);
        assert_relative_eq!(profile.threshold(550.0), 0.021 + 0.05, epsilon = 1e-12);
        assert!(profile.members(550.0).is_empty());
    }

    #[test]
    fn removal_stops_before_the_test_is_undefined() {
        let column = Array1::from(background());
        let profile = DagostinoProfile::new(column.view());
        assert_eq!(profile.trajectory().len(), background().len() - 7);
        // a negative cutoff keeps removing until only seven genes are left
        assert_eq!(profile.removed_at(-1.0), background().len() - 7);
    }

    #[test]
    fn short_columns_have_no_members() {
        let column = Array1::from(vec![0.9, 0.1, -0.2]);
        assert_relative_eq!(compute_dagostino_threshold(column.view(), 550.0), 0.95, epsilon = 1e-12);
    }
}
