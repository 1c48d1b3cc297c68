use approx::assert_relative_eq;
use ndarray::Array1;
use single_imodulon::enrichment::{compute_enrichment, filter_fdr};
use single_imodulon::testing::Alternative;
use single_imodulon::testing::correction::benjamini_hochberg_correction;
use single_imodulon::testing::inference::discrete::{ContingencyTable, fisher_exact};
use single_imodulon::testing::inference::normality::dagostino_pearson;
use single_imodulon::threshold::{DagostinoProfile, KmeansArgs, kmeans_threshold};
use single_imodulon::threshold::kmeans::kmeans_1d;
use single_imodulon::trn::{CombineMode, RegulatoryNetwork, TrnEdge};
use std::collections::HashSet;

#[cfg(test)]
mod primitives {
    use super::*;

    fn set<'a>(items: &[&'a str]) -> HashSet<&'a str> {
        items.iter().copied().collect()
    }

    #[test]
    fn fisher_tails_on_a_balanced_table() {
        // Hypergeom(8, 4, 4): P(X >= 3) = 17 / 70
        let table = ContingencyTable::new(3, 1, 1, 3);
        let greater = fisher_exact(&table, Alternative::Greater);
        assert_relative_eq!(greater.p_value, 17.0 / 70.0, epsilon = 1e-12);
        assert_relative_eq!(greater.statistic, 9.0, epsilon = 1e-12);
        let less = fisher_exact(&table, Alternative::Less);
        assert_relative_eq!(less.p_value, 69.0 / 70.0, epsilon = 1e-12);
    }

    #[test]
    fn enrichment_of_partial_overlap() {
        let universe = set(&["g1", "g2", "g3", "g4", "g5", "g6", "g7", "g8", "g9", "g10"]);
        let genes = set(&["g1", "g2", "g3"]);
        let targets = set(&["g2", "g3", "g4", "g5"]);
        let result = compute_enrichment(&genes, &targets, &universe, "Fur").unwrap();
        assert_relative_eq!(result.p_value, 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(result.precision, 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(result.recall, 0.5, epsilon = 1e-12);
        assert_relative_eq!(result.f1_score, 4.0 / 7.0, epsilon = 1e-12);
        assert_eq!(result.true_positive, 2);
        assert_eq!(result.q_value, None);
    }

    #[test]
    fn fdr_filter_is_strict_and_sorted() {
        let universe = set(&["g1", "g2", "g3", "g4", "g5", "g6", "g7", "g8", "g9", "g10"]);
        let genes = set(&["g1", "g2", "g3"]);
        let partial = compute_enrichment(&genes, &set(&["g2", "g3", "g4", "g5"]), &universe, "partial").unwrap();
        let exact = compute_enrichment(&genes, &genes, &universe, "exact").unwrap();
        let none = compute_enrichment(&genes, &set(&["g9"]), &universe, "none").unwrap();
        assert_eq!(exact.p_value, 0.0);
        assert_eq!(none.p_value, 1.0);

        // q-values: exact 0, partial 0.5, none 1
        let results = vec![partial, none, exact];
        let kept = filter_fdr(results.clone(), 0.6).unwrap();
        let labels: Vec<&str> = kept.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["exact", "partial"]);
        assert_relative_eq!(kept[1].q_value.unwrap(), 0.5, epsilon = 1e-9);
        let kept = filter_fdr(results, 0.4).unwrap();
        assert_eq!(kept.len(), 1);
        assert!(filter_fdr(Vec::new(), 0.1).unwrap().is_empty());
    }

    #[test]
    fn bh_matches_hand_computation() {
        let q = benjamini_hochberg_correction(&[0.001, 0.008, 0.039, 0.041, 0.042]).unwrap();
        assert_relative_eq!(q[0], 0.005, epsilon = 1e-12);
        assert_relative_eq!(q[1], 0.02, epsilon = 1e-12);
        assert_relative_eq!(q[4], 0.042, epsilon = 1e-12);
        assert_relative_eq!(q[2], 0.042, epsilon = 1e-12);
    }

    #[test]
    fn normality_statistic_matches_reference() {
        let values = [0.1, 0.4, 0.2, 0.9, 0.3, 0.5, 1.7, 0.25, 0.6, 0.35];
        let result = dagostino_pearson(&values[..]).unwrap();
        assert_relative_eq!(result.statistic, 13.117859319, max_relative = 1e-6);
        // chi-squared with two degrees of freedom
        assert_relative_eq!(result.p_value, (-result.statistic / 2.0).exp(), max_relative = 1e-9);
        assert_relative_eq!(result.metadata["skew_z"], 2.763865590, max_relative = 1e-6);
    }

    #[test]
    fn kmeans_threshold_on_signed_weights() {
        let column = Array1::from(vec![0.01, -0.02, 0.01, 0.03, -0.02, 0.3, -0.31, 0.9, -0.95]);
        let (assignments, _) = kmeans_1d(
            &column.iter().map(|w: &f64| w.abs()).collect::<Vec<_>>(),
            &KmeansArgs::default(),
        );
        assert_eq!(assignments, vec![0, 0, 0, 0, 0, 1, 1, 2, 2]);
        // clusters {0.9, 0.95} and {0.3, 0.31} tie on size; the higher one counts as smallest
        assert_relative_eq!(kmeans_threshold(column.view()), (0.9 + 0.31) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn dagostino_threshold_tightens_with_cutoff() {
        let mut weights: Vec<f64> = (0..40).map(|i| ((i * 17) % 23) as f64 * 0.002 - 0.022).collect();
        weights.extend([0.6, 0.5, -0.45, 0.3]);
        let column = Array1::from(weights);
        let profile = DagostinoProfile::new(column.view());
        let loose = profile.members(1.0).len();
        let strict = profile.members(1e6).len();
        assert!(loose >= strict);
        assert_eq!(strict, 0);
        assert!(profile.threshold(1e6) > 0.6);
    }

    #[test]
    fn regulon_expressions() {
        let trn = RegulatoryNetwork::new(vec![
            TrnEdge::new("Fur", "g1"),
            TrnEdge::new("Fur", "g2"),
            TrnEdge::new("Fnr", "g2"),
            TrnEdge::new("Fnr", "g3"),
        ]);
        let (and, n) = trn.regulon("Fur+Fnr", CombineMode::Or).unwrap();
        assert_eq!(and, set(&["g2"]));
        assert_eq!(n, 2);
        let (or, _) = trn.regulon("Fur/Fnr", CombineMode::And).unwrap();
        assert_eq!(or, set(&["g1", "g2", "g3"]));
        let (grouped, _) = trn.regulon("Fur;Fnr", CombineMode::And).unwrap();
        assert_eq!(grouped, set(&["g2"]));
        assert!(trn.regulon("Fur+Fnr/ArcA", CombineMode::Or).is_err());
    }
}
