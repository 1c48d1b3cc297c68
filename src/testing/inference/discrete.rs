use crate::testing::{Alternative, TestResult};
use statrs::distribution::{Discrete, Hypergeometric};
use std::collections::HashSet;
use std::hash::Hash;

/// 2x2 overlap table between a gene set and a target set over a gene universe.
///
/// Layout follows `[[tp, fp], [fn, tn]]` where positives are members of the gene set and
/// truth is membership of the target set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContingencyTable {
    pub true_positive: u64,
    pub false_positive: u64,
    pub false_negative: u64,
    pub true_negative: u64,
}

impl ContingencyTable {
    pub fn new(true_positive: u64, false_positive: u64, false_negative: u64, true_negative: u64) -> Self {
        ContingencyTable {
            true_positive,
            false_positive,
            false_negative,
            true_negative,
        }
    }

    /// Builds the table from explicit sets. Both sets must lie inside `universe`.
    pub fn from_sets<T>(
        gene_set: &HashSet<T>,
        target_set: &HashSet<T>,
        universe: &HashSet<T>,
    ) -> anyhow::Result<Self>
    where
        T: Eq + Hash,
    {
        if !gene_set.is_subset(universe) || !target_set.is_subset(universe) {
            return Err(anyhow::anyhow!("Gene sets contain genes not in all_genes"));
        }
        let tp = gene_set.intersection(target_set).count() as u64;
        let gene_only = gene_set.len() as u64 - tp;
        let target_only = target_set.len() as u64 - tp;
        let tn = universe.len() as u64 - tp - gene_only - target_only;
        Ok(ContingencyTable::new(tp, gene_only, target_only, tn))
    }

    pub fn total(&self) -> u64 {
        self.true_positive + self.false_positive + self.false_negative + self.true_negative
    }

    /// Fraction of the gene set that falls in the target set.
    pub fn precision(&self) -> f64 {
        if self.true_positive == 0 {
            return 0.0;
        }
        self.true_positive as f64 / (self.true_positive + self.false_positive) as f64
    }

    /// Fraction of the target set recovered by the gene set.
    pub fn recall(&self) -> f64 {
        if self.true_positive == 0 {
            return 0.0;
        }
        self.true_positive as f64 / (self.true_positive + self.false_negative) as f64
    }

    pub fn f1_score(&self) -> f64 {
        if self.true_positive == 0 {
            return 0.0;
        }
        let precision = self.precision();
        let recall = self.recall();
        2.0 * precision * recall / (precision + recall)
    }
}

/// Fisher's exact test on a 2x2 table, evaluated through the hypergeometric distribution.
///
/// The statistic is the sample odds ratio (infinite when a off-diagonal cell is zero).
pub fn fisher_exact(table: &ContingencyTable, alternative: Alternative) -> TestResult<f64> {
    let a = table.true_positive;
    let b = table.false_positive;
    let c = table.false_negative;
    let d = table.true_negative;

    let odds_ratio = if b == 0 || c == 0 {
        if a == 0 || d == 0 { f64::NAN } else { f64::INFINITY }
    } else {
        (a as f64 * d as f64) / (b as f64 * c as f64)
    };

    let population = table.total();
    let successes = a + c;
    let draws = a + b;
    let hyper = match Hypergeometric::new(population, successes, draws) {
        Ok(dist) => dist,
        Err(_) => return TestResult::new(odds_ratio, 1.0),
    };

    let low = draws.saturating_sub(population - successes);
    let high = draws.min(successes);
    // tails are summed from the pmf so that tiny p-values keep their precision
    let tail = |from: u64, to: u64| (from..=to).map(|k| hyper.pmf(k)).sum::<f64>();

    let p_value = match alternative {
        Alternative::Greater => tail(a.max(low), high),
        Alternative::Less => tail(low, a.min(high)),
        Alternative::TwoSided => {
            let observed = hyper.pmf(a);
            // relative tolerance as in scipy.stats.fisher_exact
            let cutoff = observed * (1.0 + 1e-7);
            (low..=high)
                .map(|k| hyper.pmf(k))
                .filter(|&pmf| pmf <= cutoff)
                .sum::<f64>()
        }
    };

    TestResult::new(odds_ratio, p_value.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn set(items: &[&'static str]) -> HashSet<&'static str> {
        items.iter().copied().collect()
    }

    #[test]
    fn table_from_sets() {
        let universe = set(&["a", "b", "c", "d", "e", "f"]);
        let genes = set(&["a", "b", "c"]);
        let targets = set(&["b", "c", "d", "e"]);
        let table = ContingencyTable::from_sets(&genes, &targets, &universe).unwrap();
        assert_eq!(table, ContingencyTable::new(2, 1, 2, 1));
        assert_relative_eq!(table.precision(), 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(table.recall(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(table.f1_score(), 4.0 / 7.0, epsilon = 1e-12);
    }

    #[test]
    fn sets_outside_universe_fail() {
        let universe = set(&["a", "b"]);
        let result = ContingencyTable::from_sets(&set(&["a", "z"]), &set(&["a"]), &universe);
        assert!(result.is_err());
    }

    #[test]
    fn zero_overlap_scores_are_zero() {
        let table = ContingencyTable::new(0, 4, 3, 10);
        assert_eq!(table.precision(), 0.0);
        assert_eq!(table.recall(), 0.0);
        assert_eq!(table.f1_score(), 0.0);
    }

    #[test]
    fn fisher_greater_matches_reference() {
        // P(X >= 8) for X ~ Hypergeom(16, 9, 10) = 196 / 8008
        let table = ContingencyTable::new(8, 2, 1, 5);
        let result = fisher_exact(&table, Alternative::Greater);
        assert_relative_eq!(result.p_value, 196.0 / 8008.0, epsilon = 1e-9);
        assert_relative_eq!(result.statistic, 20.0, epsilon = 1e-12);
    }

    #[test]
    fn fisher_two_sided_matches_reference() {
        // tables at most as likely as the observed one: k = 3 and k = 8, 9
        let table = ContingencyTable::new(8, 2, 1, 5);
        let result = fisher_exact(&table, Alternative::TwoSided);
        assert_relative_eq!(result.p_value, 0.034_965_034_965, epsilon = 1e-9);
        let less = fisher_exact(&table, Alternative::Less);
        assert_relative_eq!(less.p_value, 0.999_125_874_126, epsilon = 1e-9);
    }
}
