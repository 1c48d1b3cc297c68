use std::collections::HashSet;

use crate::data::AnnotationTable;
use crate::data::table::cell_text;
use crate::enrichment::{Enrichment, compute_enrichment, filter_fdr};
use crate::error::{ModulonError, Result};

/// Gene → category relation, e.g. COG categories or GO terms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneAnnotation {
    pairs: Vec<(String, String)>,
}

impl GeneAnnotation {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        GeneAnnotation { pairs }
    }

    /// Reads `column` of a gene-indexed table; genes with a null cell are left out.
    pub fn from_table(table: &AnnotationTable<String>, column: &str) -> Result<Self> {
        let values = table.column(column).ok_or_else(|| {
            ModulonError::precondition(format!("annotation table has no column \"{}\"", column))
        })?;
        let pairs = table
            .index()
            .iter()
            .zip(values)
            .filter_map(|(gene, value)| cell_text(value).map(|category| (gene.clone(), category)))
            .collect();
        Ok(GeneAnnotation { pairs })
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Unique categories in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.pairs
            .iter()
            .map(|(_, category)| category.as_str())
            .filter(|c| seen.insert(*c))
            .collect()
    }

    pub fn genes_in(&self, category: &str) -> HashSet<&str> {
        self.pairs
            .iter()
            .filter(|(_, c)| c == category)
            .map(|(gene, _)| gene.as_str())
            .collect()
    }

    /// Genes annotated here that are not in `universe`, sorted.
    pub fn unknown_genes(&self, universe: &HashSet<&str>) -> Vec<String> {
        let mut unknown: Vec<String> = self
            .pairs
            .iter()
            .map(|(gene, _)| gene.as_str())
            .filter(|g| !universe.contains(g))
            .collect::<HashSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        unknown.sort();
        unknown
    }
}

/// Enrichment of a gene set against every category of `annotation`.
///
/// Annotated genes outside `universe` are ignored. Results are BH-corrected over all
/// categories and filtered to `q < fdr`.
pub fn compute_annotation_enrichment(
    gene_set: &HashSet<&str>,
    universe: &HashSet<&str>,
    annotation: &GeneAnnotation,
    fdr: f64,
) -> Result<Vec<Enrichment>> {
    let mut results = Vec::new();
    for category in annotation.categories() {
        let targets: HashSet<&str> = annotation
            .genes_in(category)
            .into_iter()
            .filter(|g| universe.contains(g))
            .collect();
        results.push(compute_enrichment(gene_set, &targets, universe, category)?);
    }
    filter_fdr(results, fdr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn annotation() -> GeneAnnotation {
        let mut pairs = Vec::new();
        for i in 1..=5 {
            pairs.push((format!("g{}", i), "Iron transport".to_string()));
        }
        for i in 10..=14 {
            pairs.push((format!("g{}", i), "Motility".to_string()));
        }
        pairs.push(("b9999".to_string(), "Motility".to_string()));
        GeneAnnotation::new(pairs)
    }

    #[test]
    fn categories_keep_first_seen_order() {
        assert_eq!(annotation().categories(), vec!["Iron transport", "Motility"]);
        assert_eq!(annotation().genes_in("Motility").len(), 6);
    }

    #[test]
    fn matching_category_is_enriched() {
        let ids: Vec<String> = (1..=30).map(|i| format!("g{}", i)).collect();
        let universe: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let members: HashSet<&str> = ["g1", "g2", "g3", "g4"].into_iter().collect();
        let annotation = annotation();

        assert_eq!(annotation.unknown_genes(&universe), vec!["b9999".to_string()]);
        let results = compute_annotation_enrichment(&members, &universe, &annotation, 0.1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].label, "Iron transport");
        assert_eq!(results[0].true_positive, 4);
        assert_eq!(results[0].target_set_size, 5);
    }

    #[test]
    fn table_column_is_required() {
        let table = AnnotationTable::from_columns(
            vec!["g1".to_string(), "g2".to_string()],
            vec![("COG".to_string(), vec![json!("Energy"), serde_json::Value::Null])],
        )
        .unwrap();
        let annotation = GeneAnnotation::from_table(&table, "COG").unwrap();
        assert_eq!(annotation.pairs(), &[("g1".to_string(), "Energy".to_string())]);
        assert!(GeneAnnotation::from_table(&table, "GO").is_err());
    }
}
