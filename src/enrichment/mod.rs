//! Gene set enrichment of iModulons against regulons and annotation categories.
//!
//! Every test compares a gene set (the members of an iModulon) with a target set (the genes
//! of a regulon or category) over the gene universe, using Fisher's exact test.
//!
//! ## Available Methods
//!
//! - **Regulon** (`regulon`): one regulator expression, or every regulator of a TRN and their
//!   combinations
//! - **Annotation** (`annotation`): every category of a gene annotation
//!
//! ## Quick Example
//!
//! ```rust
//! use std::collections::HashSet;
//! use single_imodulon::enrichment::compute_enrichment;
//!
//! let universe: HashSet<&str> = ["b1", "b2", "b3", "b4", "b5", "b6"].into_iter().collect();
//! let members: HashSet<&str> = ["b1", "b2"].into_iter().collect();
//! let regulon: HashSet<&str> = ["b1", "b2", "b3"].into_iter().collect();
//!
//! let result = compute_enrichment(&members, &regulon, &universe, "Fur").unwrap();
//! assert_eq!(result.true_positive, 2);
//! assert_eq!(result.precision, 1.0);
//! ```

use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::str::FromStr;

use crate::data::ModuleName;
use crate::error::{ModulonError, Result};
use crate::testing::Alternative;
use crate::testing::correction::benjamini_hochberg_correction;
use crate::testing::inference::discrete::{ContingencyTable, fisher_exact};

pub mod annotation;
pub mod regulon;

pub use annotation::{GeneAnnotation, compute_annotation_enrichment};
pub use regulon::{compute_regulon_enrichment, compute_trn_enrichment};

/// Overlap statistics of one gene set against one target set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enrichment {
    /// Regulator expression or annotation category
    pub label: String,
    #[serde(rename = "pvalue")]
    pub p_value: f64,
    /// Benjamini-Hochberg q-value; absent for a single test
    #[serde(rename = "qvalue", skip_serializing_if = "Option::is_none")]
    pub q_value: Option<f64>,
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1score")]
    pub f1_score: f64,
    #[serde(rename = "TP")]
    pub true_positive: usize,
    pub target_set_size: usize,
    pub gene_set_size: usize,
    /// Number of regulators in a regulon expression
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_regs: Option<usize>,
}

/// Enrichment of `gene_set` in `target_set`.
///
/// No overlap yields `p = 1` with zero scores; identical sets yield `p = 0` with unit
/// scores; everything else runs the one-sided Fisher test.
pub fn compute_enrichment(
    gene_set: &HashSet<&str>,
    target_set: &HashSet<&str>,
    universe: &HashSet<&str>,
    label: &str,
) -> Result<Enrichment> {
    let table = ContingencyTable::from_sets(gene_set, target_set, universe)?;
    let mut result = Enrichment {
        label: label.to_string(),
        p_value: 1.0,
        q_value: None,
        precision: 0.0,
        recall: 0.0,
        f1_score: 0.0,
        true_positive: 0,
        target_set_size: target_set.len(),
        gene_set_size: gene_set.len(),
        n_regs: None,
    };
    if table.true_positive == 0 {
        return Ok(result);
    }
    if table.false_positive == 0 && table.false_negative == 0 {
        result.p_value = 0.0;
        result.precision = 1.0;
        result.recall = 1.0;
        result.f1_score = 1.0;
        result.true_positive = gene_set.len();
        return Ok(result);
    }
    result.p_value = fisher_exact(&table, Alternative::Greater).p_value;
    result.precision = table.precision();
    result.recall = table.recall();
    result.f1_score = table.f1_score();
    result.true_positive = table.true_positive as usize;
    Ok(result)
}

/// Adds BH q-values and keeps results with `q < fdr`, ordered by q-value.
pub fn filter_fdr(mut results: Vec<Enrichment>, fdr: f64) -> Result<Vec<Enrichment>> {
    if results.is_empty() {
        return Ok(results);
    }
    let p_values: Vec<f64> = results.iter().map(|r| r.p_value).collect();
    let q_values = benjamini_hochberg_correction(&p_values)?;
    for (result, q) in results.iter_mut().zip(q_values) {
        result.q_value = Some(q);
    }
    results.retain(|r| r.q_value.is_some_and(|q| q < fdr));
    results.sort_by(|a, b| a.q_value.partial_cmp(&b.q_value).unwrap_or(std::cmp::Ordering::Equal));
    Ok(results)
}

/// How multi-regulator regulons are formed in TRN-wide enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombineMethod {
    /// Union of the regulons
    Or,
    /// Intersection of the regulons
    And,
    #[default]
    Both,
}

impl CombineMethod {
    pub fn includes_and(&self) -> bool {
        matches!(self, CombineMethod::And | CombineMethod::Both)
    }

    pub fn includes_or(&self) -> bool {
        matches!(self, CombineMethod::Or | CombineMethod::Both)
    }
}

impl FromStr for CombineMethod {
    type Err = ModulonError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "or" => Ok(CombineMethod::Or),
            "and" => Ok(CombineMethod::And),
            "both" => Ok(CombineMethod::Both),
            other => Err(ModulonError::precondition(format!(
                "method must be \"or\", \"and\" or \"both\", got \"{}\"",
                other
            ))),
        }
    }
}

/// Enrichment results for several iModulons, grouped by iModulon.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentTable {
    target_column: String,
    size_column: String,
    rows: Vec<(ModuleName, Enrichment)>,
}

impl EnrichmentTable {
    /// Table whose labels are regulator expressions.
    pub fn regulons(rows: Vec<(ModuleName, Enrichment)>) -> Self {
        EnrichmentTable {
            target_column: "regulator".to_string(),
            size_column: "regulon_size".to_string(),
            rows,
        }
    }

    /// Table whose labels are categories of the annotation column `column`.
    pub fn annotations(column: &str, rows: Vec<(ModuleName, Enrichment)>) -> Self {
        EnrichmentTable {
            target_column: column.to_string(),
            size_column: "target_set_size".to_string(),
            rows,
        }
    }

    pub fn rows(&self) -> &[(ModuleName, Enrichment)] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Name of the column holding the labels.
    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// Results for one iModulon, best first.
    pub fn for_module<'a>(&'a self, module: &'a ModuleName) -> impl Iterator<Item = &'a Enrichment> + 'a {
        self.rows
            .iter()
            .filter(move |(name, _)| name == module)
            .map(|(_, enrichment)| enrichment)
    }

    /// The first (best) result of every iModulon that has one.
    pub fn best_per_module(&self) -> Vec<(&ModuleName, &Enrichment)> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .filter(|(name, _)| seen.insert(name))
            .map(|(name, enrichment)| (name, enrichment))
            .collect()
    }

    /// Cells stored in the iModulon table for one result.
    pub fn cells(&self, enrichment: &Enrichment) -> Vec<(String, Value)> {
        enrichment_cells(enrichment, &self.target_column, &self.size_column)
    }
}

pub(crate) fn enrichment_cells(enrichment: &Enrichment, target_column: &str, size_column: &str) -> Vec<(String, Value)> {
    let mut cells = vec![
        (target_column.to_string(), json!(enrichment.label)),
        ("pvalue".to_string(), json!(enrichment.p_value)),
    ];
    if let Some(q) = enrichment.q_value {
        cells.push(("qvalue".to_string(), json!(q)));
    }
    cells.extend([
        ("precision".to_string(), json!(enrichment.precision)),
        ("recall".to_string(), json!(enrichment.recall)),
        ("f1score".to_string(), json!(enrichment.f1_score)),
        ("TP".to_string(), json!(enrichment.true_positive)),
        (size_column.to_string(), json!(enrichment.target_set_size)),
        ("imodulon_size".to_string(), json!(enrichment.gene_set_size)),
    ]);
    if let Some(n) = enrichment.n_regs {
        cells.push(("n_regs".to_string(), json!(n)));
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn set<'a>(items: &[&'a str]) -> HashSet<&'a str> {
        items.iter().copied().collect()
    }

    fn universe() -> HashSet<&'static str> {
        set(&["g1", "g2", "g3", "g4", "g5", "g6", "g7", "g8", "g9", "g10"])
    }

    #[test]
    fn disjoint_sets_are_not_enriched() {
        let result = compute_enrichment(&set(&["g1", "g2"]), &set(&["g3"]), &universe(), "Fur").unwrap();
        assert_eq!(result.p_value, 1.0);
        assert_eq!(result.f1_score, 0.0);
        assert_eq!(result.target_set_size, 1);
        assert_eq!(result.gene_set_size, 2);
    }

    #[test]
    fn identical_sets_are_perfect() {
        let genes = set(&["g1", "g2", "g3"]);
        let result = compute_enrichment(&genes, &genes, &universe(), "Fur").unwrap();
        assert_eq!(result.p_value, 0.0);
        assert_eq!(result.f1_score, 1.0);
        assert_eq!(result.true_positive, 3);
    }

    #[test]
    fn partial_overlap_uses_fisher() {
        let result = compute_enrichment(
            &set(&["g1", "g2", "g3"]),
            &set(&["g2", "g3", "g4"]),
            &universe(),
            "ArcA",
        )
        .unwrap();
        // P(X >= 2) for X ~ Hypergeom(10, 3, 3) = 22 / 120
        assert_relative_eq!(result.p_value, 22.0 / 120.0, epsilon = 1e-12);
        assert_relative_eq!(result.precision, 2.0 / 3.0, epsilon = 1e-12);
        assert_eq!(result.true_positive, 2);
    }

    #[test]
    fn fdr_filter_keeps_significant_results() {
        let make = |label: &str, p: f64| Enrichment {
            label: label.to_string(),
            p_value: p,
            q_value: None,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            true_positive: 0,
            target_set_size: 0,
            gene_set_size: 0,
            n_regs: Some(1),
        };
        let results = vec![make("a", 0.04), make("b", 0.001), make("c", 0.9)];
        let kept = filter_fdr(results, 0.05).unwrap();
        let labels: Vec<&str> = kept.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["b"]);
        assert_relative_eq!(kept[0].q_value.unwrap(), 0.003, epsilon = 1e-12);
        assert!(filter_fdr(Vec::new(), 0.05).unwrap().is_empty());
    }

    #[test]
    fn cells_follow_table_layout() {
        let genes = set(&["g1", "g2", "g3"]);
        let mut result = compute_enrichment(&genes, &genes, &universe(), "Fur").unwrap();
        result.n_regs = Some(1);
        result.q_value = Some(0.0);
        let table = EnrichmentTable::regulons(vec![(ModuleName::Index(0), result.clone())]);
        let names: Vec<String> = table.cells(&result).into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec![
                "regulator", "pvalue", "qvalue", "precision", "recall", "f1score", "TP",
                "regulon_size", "imodulon_size", "n_regs"
            ]
        );
    }
}
