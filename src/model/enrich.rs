use log::{debug, warn};
use std::borrow::Cow;
use std::collections::HashSet;

use crate::data::{AnnotationTable, ModuleName};
use crate::enrichment::{
    self, CombineMethod, Enrichment, EnrichmentTable, GeneAnnotation, enrichment_cells,
};
use crate::error::Result;
use crate::model::IcaData;
use crate::trn::CombineMode;

/// Arguments of [`IcaData::compute_trn_enrichment`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrnEnrichmentArgs {
    /// iModulons to test, all of them when `None`
    pub imodulons: Option<Vec<ModuleName>>,
    pub fdr: f64,
    /// Largest regulator combination to test
    pub max_regs: usize,
    /// Stores the best result of every iModulon in the iModulon table
    pub save: bool,
    pub method: CombineMethod,
    /// Allows `max_regs` above two
    pub force: bool,
    /// Evidence levels of the TRN edges to use
    pub evidence: Option<Vec<String>>,
}

impl Default for TrnEnrichmentArgs {
    fn default() -> Self {
        TrnEnrichmentArgs {
            imodulons: None,
            fdr: 1e-5,
            max_regs: 1,
            save: false,
            method: CombineMethod::Both,
            force: false,
            evidence: None,
        }
    }
}

impl IcaData {
    /// Enrichment of one iModulon in the regulon of `regulator`.
    ///
    /// No multiple-testing correction is applied to a single test. With `save`, the result
    /// is written into the iModulon table row of `imodulon`.
    pub fn compute_regulon_enrichment(
        &mut self,
        imodulon: &ModuleName,
        regulator: &str,
        mode: CombineMode,
        save: bool,
        evidence: Option<&[String]>,
    ) -> Result<Enrichment> {
        let result = {
            let genes: HashSet<&str> = self.imodulon_genes(imodulon)?.into_iter().collect();
            let trn = match evidence {
                Some(levels) => self.trn.filter_evidence(levels),
                None => Cow::Borrowed(&self.trn),
            };
            enrichment::compute_regulon_enrichment(&genes, regulator, &self.gene_universe(), &trn, mode)?
        };

        if save {
            let mut table = self.imodulon_table.clone();
            for (column, value) in enrichment_cells(&result, "regulator", "regulon_size") {
                table.set(imodulon, &column, value)?;
            }
            self.imodulon_table = table;
        }
        Ok(result)
    }

    /// Enrichment of each iModulon against every regulator of the TRN and their
    /// combinations.
    ///
    /// Rows are sorted by iModulon position in `M`, then by q-value, then by number of
    /// regulators. With `args.save`, the first row of each iModulon is merged into
    /// the iModulon table.
    pub fn compute_trn_enrichment(&mut self, args: &TrnEnrichmentArgs) -> Result<EnrichmentTable> {
        let imodulons = self.requested_modules(args.imodulons.as_deref())?;
        let table = {
            let trn = match &args.evidence {
                Some(levels) => self.trn.filter_evidence(levels),
                None => Cow::Borrowed(&self.trn),
            };
            let universe = self.gene_universe();
            let mut rows = Vec::new();
            for imodulon in &imodulons {
                let genes: HashSet<&str> = self.imodulon_genes(imodulon)?.into_iter().collect();
                let results = enrichment::compute_trn_enrichment(
                    &genes,
                    &universe,
                    &trn,
                    args.max_regs,
                    args.fdr,
                    args.method,
                    args.force,
                )?;
                debug!("iModulon {}: {} enriched regulons", imodulon, results.len());
                let position = self.module_position(imodulon)?;
                rows.extend(results.into_iter().map(|r| (position, imodulon.clone(), r)));
            }
            // rows of one iModulon are already ordered by q-value and regulator count
            rows.sort_by_key(|(position, _, _)| *position);
            EnrichmentTable::regulons(rows.into_iter().map(|(_, name, r)| (name, r)).collect())
        };

        if args.save {
            let updates: Vec<(ModuleName, Vec<(String, serde_json::Value)>)> = table
                .best_per_module()
                .into_iter()
                .map(|(name, result)| (name.clone(), table.cells(result)))
                .collect();
            let order = self.m.cols().to_vec();
            self.imodulon_table = self.imodulon_table.merge_rows(&updates, &order)?;
        }
        Ok(table)
    }

    /// Enrichment of each iModulon against the categories in `column` of a gene table.
    ///
    /// Annotated genes that are not in the model are ignored with a warning. A typical `fdr`
    /// is 0.1.
    pub fn compute_annotation_enrichment(
        &self,
        annotation: &AnnotationTable<String>,
        column: &str,
        imodulons: Option<&[ModuleName]>,
        fdr: f64,
    ) -> Result<EnrichmentTable> {
        let imodulons = self.requested_modules(imodulons)?;
        let annotation = GeneAnnotation::from_table(annotation, column)?;
        let universe = self.gene_universe();
        let unknown = annotation.unknown_genes(&universe);
        if !unknown.is_empty() {
            warn!(
                "The following genes are annotated but not in the M matrix: {}",
                unknown.join(", ")
            );
        }

        let mut rows = Vec::new();
        for imodulon in &imodulons {
            let genes: HashSet<&str> = self.imodulon_genes(imodulon)?.into_iter().collect();
            let results = enrichment::compute_annotation_enrichment(&genes, &universe, &annotation, fdr)?;
            rows.extend(results.into_iter().map(|r| (imodulon.clone(), r)));
        }
        Ok(EnrichmentTable::annotations(column, rows))
    }

    /// Every requested iModulon must exist before any test runs.
    fn requested_modules(&self, imodulons: Option<&[ModuleName]>) -> Result<Vec<ModuleName>> {
        match imodulons {
            None => Ok(self.m.cols().to_vec()),
            Some(names) => {
                for name in names {
                    self.module_position(name)?;
                }
                Ok(names.to_vec())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::LabeledMatrix;
    use crate::error::ModulonError;
    use crate::model::IcaDataOptions;
    use crate::trn::{RegulatoryNetwork, TrnEdge};
    use ndarray::Array2;
    use serde_json::json;

    // 40 genes, iModulon 0 holds g1..g6, iModulon 1 holds g30..g33
    fn model() -> IcaData {
        let genes: Vec<String> = (1..=40).map(|i| format!("g{}", i)).collect();
        let values = Array2::from_shape_fn((40, 2), |(i, j)| match (i + 1, j) {
            (1..=6, 0) => 0.5,
            (30..=33, 1) => -0.4,
            _ => 0.01,
        });
        let m: crate::model::WeightMatrix = LabeledMatrix::new(genes, vec![ModuleName::Index(0), ModuleName::Index(1)], values).unwrap();
        let a: crate::model::ActivityMatrix = LabeledMatrix::new(
            vec![ModuleName::Index(0), ModuleName::Index(1)],
            vec!["s1".into()],
            Array2::zeros((2, 1)),
        )
        .unwrap();
        let mut edges = Vec::new();
        for i in 1..=6 {
            edges.push(TrnEdge::new("Fur", format!("g{}", i)).with_evidence("strong"));
        }
        for i in 4..=9 {
            edges.push(TrnEdge::new("ArcA", format!("g{}", i)).with_evidence("weak"));
        }
        for i in 30..=35 {
            edges.push(TrnEdge::new("Lrp", format!("g{}", i)).with_evidence("strong"));
        }
        let trn = RegulatoryNetwork::new(edges).with_evidence_column();
        let options = IcaDataOptions::default()
            .with_trn(trn)
            .with_thresholds(vec![0.2, 0.2]);
        IcaData::new(m, a, options).unwrap()
    }

    #[test]
    fn single_regulon_is_saved_without_qvalue() {
        let mut data = model();
        let result = data
            .compute_regulon_enrichment(&ModuleName::Index(0), "Fur", CombineMode::Or, true, None)
            .unwrap();
        assert_eq!(result.p_value, 0.0);
        assert_eq!(result.n_regs, Some(1));
        let table = data.imodulon_table();
        assert_eq!(table.get(&ModuleName::Index(0), "regulator"), Some(&json!("Fur")));
        assert_eq!(table.get(&ModuleName::Index(0), "regulon_size"), Some(&json!(6)));
        assert!(!table.has_column("qvalue"));
    }

    #[test]
    fn evidence_filter_narrows_the_regulon() {
        let mut data = model();
        let levels = vec!["strong".to_string()];
        let result = data
            .compute_regulon_enrichment(&ModuleName::Index(0), "ArcA", CombineMode::Or, false, Some(&levels))
            .unwrap();
        assert_eq!(result.target_set_size, 0);
        assert_eq!(result.p_value, 1.0);
    }

    #[test]
    fn trn_enrichment_is_sorted_by_weight_column_order() {
        let mut data = model();
        let args = TrnEnrichmentArgs {
            imodulons: Some(vec![ModuleName::Index(1), ModuleName::Index(0)]),
            fdr: 0.05,
            save: true,
            ..Default::default()
        };
        let table = data.compute_trn_enrichment(&args).unwrap();
        let rows: Vec<String> = table
            .rows()
            .iter()
            .map(|(name, result)| format!("{}:{}", name, result.label))
            .collect();
        // ArcA shares three of the six genes of iModulon 0, q about 0.033
        assert_eq!(rows, vec!["0:Fur", "0:ArcA", "1:Lrp"]);
        let best = table.best_per_module();
        assert_eq!(best.len(), 2);
        assert_eq!(best[0].1.label, "Fur");
        assert_eq!(best[1].1.label, "Lrp");

        let saved = data.imodulon_table();
        assert_eq!(saved.index(), &[ModuleName::Index(0), ModuleName::Index(1)]);
        assert_eq!(saved.get(&ModuleName::Index(0), "regulator"), Some(&json!("Fur")));
        assert_eq!(saved.get(&ModuleName::Index(1), "regulator"), Some(&json!("Lrp")));
        assert!(saved.has_column("qvalue"));
    }

    #[test]
    fn unknown_module_fails_before_testing() {
        let mut data = model();
        let args = TrnEnrichmentArgs {
            imodulons: Some(vec![ModuleName::Index(0), ModuleName::from("Fur-2")]),
            save: true,
            ..Default::default()
        };
        let err = data.compute_trn_enrichment(&args).unwrap_err();
        assert!(matches!(err, ModulonError::UnknownModule(_)));
        assert!(!data.imodulon_table().has_column("regulator"));
    }

    #[test]
    fn annotation_enrichment_per_module() {
        let data = model();
        let annotation = AnnotationTable::from_columns(
            vec!["g1".into(), "g2".into(), "g3".into(), "g4".into(), "g5".into(), "g6".into(), "g99".into()],
            vec![(
                "COG".into(),
                vec![
                    json!("Iron"),
                    json!("Iron"),
                    json!("Iron"),
                    json!("Iron"),
                    json!("Iron"),
                    json!("Iron"),
                    json!("Iron"),
                ],
            )],
        )
        .unwrap();
        let table = data
            .compute_annotation_enrichment(&annotation, "COG", None, 0.1)
            .unwrap();
        assert_eq!(table.target_column(), "COG");
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].0, ModuleName::Index(0));
        assert_eq!(table.rows()[0].1.target_set_size, 6);

        let err = data
            .compute_annotation_enrichment(&annotation, "GO", None, 0.1)
            .unwrap_err();
        assert!(matches!(err, ModulonError::Precondition(_)));
    }
}
