//! The iModulon data model: weight and activity matrices bound to their annotation tables,
//! a regulatory network and per-iModulon thresholds.
//!
//! Every mutator of [`IcaData`] validates its input before writing any field, so a failed
//! call leaves the model as it was.

use log::{info, warn};
use ndarray::Array2;
use serde_json::{Value, json};
use std::collections::HashSet;

use crate::data::table::cell_text;
use crate::data::{AnnotationTable, DataSource, Label, LabeledMatrix, ModuleName};
use crate::error::{ModulonError, Result};
use crate::threshold::{KmeansReason, ThresholdDecision, ThresholdMethod, Thresholds};
use crate::trn::RegulatoryNetwork;

pub mod config;
pub mod enrich;
pub mod metadata;
pub mod names;
pub mod optimize;
pub mod thresholds;

pub use config::IcaDataOptions;
pub use enrich::TrnEnrichmentArgs;
pub use metadata::DatabaseMetadata;
pub use names::RenameNotice;
pub use optimize::CutoffOptimization;

/// Genes × iModulons.
pub type WeightMatrix = LabeledMatrix<String, ModuleName>;
/// iModulons × samples.
pub type ActivityMatrix = LabeledMatrix<ModuleName, String>;
/// Genes × samples.
pub type ExpressionMatrix = LabeledMatrix<String, String>;

/// Outcome of assigning a regulatory network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrnReport {
    /// Target genes that are not in the weight matrix, sorted
    pub dropped_genes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IcaData {
    m: WeightMatrix,
    a: ActivityMatrix,
    x: Option<ExpressionMatrix>,
    log_tpm: Option<ExpressionMatrix>,
    gene_table: AnnotationTable<String>,
    sample_table: AnnotationTable<String>,
    imodulon_table: AnnotationTable<ModuleName>,
    trn: RegulatoryNetwork,
    thresholds: Thresholds,
    dagostino_cutoff: Option<u32>,
    cutoff_optimized: bool,
    threshold_decision: ThresholdDecision,
    metadata: DatabaseMetadata,
}

impl IcaData {
    /// Builds a model from a weight matrix `m` and an activity matrix `a`.
    ///
    /// Thresholds come from `options.thresholds` when given. Otherwise k-means is used if
    /// it was requested or no TRN is available, and the D'Agostino method (optionally
    /// optimized against the TRN) in every other case. The choice is available afterwards
    /// through [`IcaData::threshold_decision`].
    pub fn new(
        m: impl Into<DataSource<WeightMatrix>>,
        a: impl Into<DataSource<ActivityMatrix>>,
        options: IcaDataOptions,
    ) -> Result<Self> {
        let method: ThresholdMethod = options.threshold_method.parse()?;

        let m = coerce_module_names(m.into().resolve()?)?;
        let a = a.into().resolve()?;
        if m.cols() != a.rows() {
            return Err(ModulonError::schema("M and A matrices have different iModulon names"));
        }
        if let Some(gene) = m.first_duplicate_row() {
            return Err(ModulonError::schema(format!(
                "M matrix contains duplicate gene names: {}",
                gene
            )));
        }
        if let Some(sample) = a.first_duplicate_col() {
            return Err(ModulonError::schema(format!(
                "A matrix contains duplicate sample names: {}",
                sample
            )));
        }
        if let Some(module) = m.first_duplicate_col() {
            return Err(ModulonError::schema(format!(
                "M and A matrices contain duplicate iModulon names: {}",
                module
            )));
        }

        let x = options.x.map(DataSource::resolve).transpose()?;
        if let Some(x) = &x {
            check_expression(x, &m, &a, "X")?;
        }
        let log_tpm = options.log_tpm.map(DataSource::resolve).transpose()?;
        if let Some(log_tpm) = &log_tpm {
            check_expression(log_tpm, &m, &a, "log-TPM")?;
        }

        let gene_table = AnnotationTable::empty(m.rows().to_vec());
        let sample_table = AnnotationTable::empty(a.cols().to_vec());
        let imodulon_table = AnnotationTable::empty(m.cols().to_vec());
        let mut data = IcaData {
            m,
            a,
            x,
            log_tpm,
            gene_table,
            sample_table,
            imodulon_table,
            trn: RegulatoryNetwork::default(),
            thresholds: Thresholds::default(),
            dagostino_cutoff: None,
            cutoff_optimized: false,
            threshold_decision: ThresholdDecision::Manual {
                optimization_skipped: false,
            },
            metadata: DatabaseMetadata::default(),
        };

        data.bind_gene_table(options.gene_table.map(DataSource::resolve).transpose()?)?;
        data.bind_sample_table(options.sample_table.map(DataSource::resolve).transpose()?)?;
        data.bind_imodulon_table(options.imodulon_table.map(DataSource::resolve).transpose()?)?;

        if let Some(trn) = options.trn {
            data.bind_trn(trn.resolve()?)?;
        }

        let optimize = options.optimize_cutoff;
        data.threshold_decision = if let Some(input) = options.thresholds {
            if optimize {
                warn!("Using manually input thresholds. D'agostino optimization will not be performed");
            }
            data.thresholds = input.resolve(data.m.cols())?;
            data.dagostino_cutoff = None;
            ThresholdDecision::Manual {
                optimization_skipped: optimize,
            }
        } else if data.trn.is_empty() || method == ThresholdMethod::Kmeans {
            let reason = if method == ThresholdMethod::Kmeans {
                KmeansReason::Requested
            } else {
                info!("No TRN provided. Using Kmeans threshold method");
                KmeansReason::NoTrn
            };
            if optimize {
                warn!("Using Kmeans threshold method. D'agostino optimization will not be performed");
            }
            data.compute_kmeans_thresholds();
            ThresholdDecision::Kmeans {
                reason,
                optimization_skipped: optimize,
            }
        } else if optimize {
            warn!("Optimizing iModulon thresholds, may take 2-3 minutes...");
            data.dagostino_cutoff = Some(options.dagostino_cutoff);
            let outcome = data.reoptimize_thresholds(options.show_progress)?;
            ThresholdDecision::Dagostino {
                cutoff: outcome.cutoff,
                optimized: true,
            }
        } else {
            data.recompute_thresholds(options.dagostino_cutoff);
            ThresholdDecision::Dagostino {
                cutoff: options.dagostino_cutoff,
                optimized: false,
            }
        };

        data.metadata = DatabaseMetadata::build(
            &data,
            options.dataset_table.map(DataSource::resolve).transpose()?,
            options.splash_table.map(DataSource::resolve).transpose()?,
            options.gene_links.map(DataSource::resolve).transpose()?,
            options.tf_links.map(DataSource::resolve).transpose()?,
            options.link_database,
        )?;

        Ok(data)
    }

    pub fn m(&self) -> &WeightMatrix {
        &self.m
    }

    pub fn a(&self) -> &ActivityMatrix {
        &self.a
    }

    pub fn x(&self) -> Option<&ExpressionMatrix> {
        self.x.as_ref()
    }

    pub fn log_tpm(&self) -> Option<&ExpressionMatrix> {
        self.log_tpm.as_ref()
    }

    pub fn set_x(&mut self, x: impl Into<DataSource<ExpressionMatrix>>) -> Result<()> {
        let x = x.into().resolve()?;
        check_expression(&x, &self.m, &self.a, "X")?;
        self.x = Some(x);
        Ok(())
    }

    pub fn clear_x(&mut self) {
        self.x = None;
    }

    pub fn set_log_tpm(&mut self, log_tpm: impl Into<DataSource<ExpressionMatrix>>) -> Result<()> {
        let log_tpm = log_tpm.into().resolve()?;
        check_expression(&log_tpm, &self.m, &self.a, "log-TPM")?;
        self.log_tpm = Some(log_tpm);
        Ok(())
    }

    pub fn clear_log_tpm(&mut self) {
        self.log_tpm = None;
    }

    /// 1 where |weight| exceeds the iModulon threshold, else 0.
    pub fn m_binarized(&self) -> LabeledMatrix<String, ModuleName, u8> {
        let cutoffs: Vec<f64> = self
            .m
            .cols()
            .iter()
            .map(|name| self.thresholds.get(name).unwrap_or(f64::INFINITY))
            .collect();
        let weights = self.m.values();
        let values = Array2::from_shape_fn(weights.dim(), |(i, j)| {
            u8::from(weights[[i, j]].abs() > cutoffs[j])
        });
        LabeledMatrix::from_parts(self.m.rows().to_vec(), self.m.cols().to_vec(), values)
    }

    pub fn gene_names(&self) -> &[String] {
        self.m.rows()
    }

    pub fn sample_names(&self) -> &[String] {
        self.a.cols()
    }

    pub fn imodulon_names(&self) -> &[ModuleName] {
        self.m.cols()
    }

    pub fn gene_table(&self) -> &AnnotationTable<String> {
        &self.gene_table
    }

    pub fn sample_table(&self) -> &AnnotationTable<String> {
        &self.sample_table
    }

    pub fn imodulon_table(&self) -> &AnnotationTable<ModuleName> {
        &self.imodulon_table
    }

    /// Replaces the gene table and reorders the gene axis of M, X and log-TPM to match it.
    pub fn set_gene_table(&mut self, table: impl Into<DataSource<AnnotationTable<String>>>) -> Result<()> {
        self.bind_gene_table(Some(table.into().resolve()?))
    }

    /// Replaces the sample table and reorders the sample axis of A, X and log-TPM to match it.
    pub fn set_sample_table(&mut self, table: impl Into<DataSource<AnnotationTable<String>>>) -> Result<()> {
        self.bind_sample_table(Some(table.into().resolve()?))
    }

    /// Replaces the iModulon table and reorders the iModulon axis of M, A and the thresholds.
    pub fn set_imodulon_table(
        &mut self,
        table: impl Into<DataSource<AnnotationTable<ModuleName>>>,
    ) -> Result<()> {
        self.bind_imodulon_table(Some(table.into().resolve()?))
    }

    pub fn trn(&self) -> &RegulatoryNetwork {
        &self.trn
    }

    /// Replaces the regulatory network.
    ///
    /// Edges targeting genes outside M are dropped with a warning and the gene table
    /// `regulator` column is rewritten. Thresholds are left alone, but the cutoff is no
    /// longer considered optimized.
    pub fn set_trn(&mut self, trn: impl Into<DataSource<RegulatoryNetwork>>) -> Result<TrnReport> {
        self.bind_trn(trn.into().resolve()?)
    }

    /// Genes of an iModulon, in gene order.
    pub fn imodulon_genes(&self, imodulon: &ModuleName) -> Result<Vec<&str>> {
        let j = self.module_position(imodulon)?;
        let threshold = self
            .thresholds
            .get(imodulon)
            .ok_or_else(|| ModulonError::UnknownModule(imodulon.clone()))?;
        Ok(self
            .m
            .rows()
            .iter()
            .zip(self.m.column(j).iter())
            .filter(|&(_, w)| w.abs() > threshold)
            .map(|(gene, _)| gene.as_str())
            .collect())
    }

    /// Genes of an iModulon with their weight followed by their gene table columns.
    pub fn view_imodulon(&self, imodulon: &ModuleName) -> Result<AnnotationTable<String>> {
        let genes: Vec<String> = self
            .imodulon_genes(imodulon)?
            .into_iter()
            .map(str::to_string)
            .collect();
        let j = self.module_position(imodulon)?;
        let weights: Vec<Value> = genes
            .iter()
            .map(|g| {
                self.m
                    .row_position(g)
                    .map_or(Value::Null, |i| json!(self.m.values()[[i, j]]))
            })
            .collect();
        let rows = self.gene_table.select_rows(&genes)?;
        let mut columns = vec![("gene_weight".to_string(), weights)];
        for name in rows.columns() {
            let values = rows.column(name).map(<[Value]>::to_vec).unwrap_or_default();
            columns.push((name.clone(), values));
        }
        AnnotationTable::from_columns(genes, columns)
    }

    /// iModulons whose largest |weight| is more than twice the second largest.
    ///
    /// With `save`, marks them with `single_gene = true` in the iModulon table.
    pub fn find_single_gene_imodulons(&mut self, save: bool) -> Result<Vec<ModuleName>> {
        let mut found = Vec::new();
        for (j, name) in self.m.cols().iter().enumerate() {
            let mut weights: Vec<f64> = self.m.column(j).iter().map(|w| w.abs()).collect();
            weights.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
            if weights.len() >= 2 && weights[0] > 2.0 * weights[1] {
                found.push(name.clone());
            }
        }
        if save {
            let mut table = self.imodulon_table.clone();
            for name in &found {
                table.set(name, "single_gene", json!(true))?;
            }
            self.imodulon_table = table;
        }
        Ok(found)
    }

    /// iModulons containing a gene, given by locus tag or gene name.
    pub fn imodulons_with(&self, gene: &str) -> Result<Vec<ModuleName>> {
        let i = match self.m.row_position(&gene.to_string()) {
            Some(i) => i,
            None => {
                let locus = self.name2num(gene)?;
                self.m
                    .row_position(&locus)
                    .ok_or(ModulonError::UnknownGene(locus))?
            }
        };
        Ok(self
            .m
            .cols()
            .iter()
            .enumerate()
            .filter(|(j, name)| {
                self.thresholds
                    .get(name)
                    .is_some_and(|t| self.m.values()[[i, *j]].abs() > t)
            })
            .map(|(_, name)| name.clone())
            .collect())
    }

    /// Locus tag of a gene name (case-insensitive match on the `gene_name` column).
    pub fn name2num(&self, gene: &str) -> Result<String> {
        let names = self.gene_table.column("gene_name").ok_or_else(|| {
            ModulonError::precondition("Gene table does not contain \"gene_name\" column.")
        })?;
        let wanted = gene.to_lowercase();
        let loci: Vec<&String> = self
            .gene_table
            .index()
            .iter()
            .zip(names)
            .filter(|(_, name)| cell_text(name).is_some_and(|n| n.to_lowercase() == wanted))
            .map(|(locus, _)| locus)
            .collect();
        match loci.as_slice() {
            [] => Err(ModulonError::UnknownGene(gene.to_string())),
            [locus] => Ok((*locus).clone()),
            [locus, ..] => {
                warn!("Found multiple genes named {}. Only reporting first locus tag", gene);
                Ok((*locus).clone())
            }
        }
    }

    /// Gene name of a locus tag, `None` when the name is missing.
    pub fn num2name(&self, locus: &str) -> Result<Option<String>> {
        if !self.gene_table.has_column("gene_name") {
            return Err(ModulonError::precondition(
                "Gene table does not contain \"gene_name\" column.",
            ));
        }
        self.gene_table
            .get(&locus.to_string(), "gene_name")
            .map(cell_text)
            .ok_or_else(|| ModulonError::UnknownGene(locus.to_string()))
    }

    pub(crate) fn gene_universe(&self) -> HashSet<&str> {
        self.m.rows().iter().map(String::as_str).collect()
    }

    pub(crate) fn module_position(&self, imodulon: &ModuleName) -> Result<usize> {
        self.m
            .col_position(imodulon)
            .ok_or_else(|| ModulonError::UnknownModule(imodulon.clone()))
    }

    fn bind_gene_table(&mut self, table: Option<AnnotationTable<String>>) -> Result<()> {
        let mut table = check_table(table, self.m.rows(), "gene")?;
        let order = table.index().to_vec();
        let m = self.m.reorder_rows(&order)?;
        let x = self.x.as_ref().map(|x| x.reorder_rows(&order)).transpose()?;
        let log_tpm = self
            .log_tpm
            .as_ref()
            .map(|lt| lt.reorder_rows(&order))
            .transpose()?;
        if !self.trn.is_empty() {
            table = with_regulator_column(&table, &self.trn)?;
        }
        self.m = m;
        self.x = x;
        self.log_tpm = log_tpm;
        self.gene_table = table;
        Ok(())
    }

    fn bind_sample_table(&mut self, table: Option<AnnotationTable<String>>) -> Result<()> {
        let table = check_table(table, self.a.cols(), "sample")?;
        let order = table.index().to_vec();
        let a = self.a.reorder_cols(&order)?;
        let x = self.x.as_ref().map(|x| x.reorder_cols(&order)).transpose()?;
        let log_tpm = self
            .log_tpm
            .as_ref()
            .map(|lt| lt.reorder_cols(&order))
            .transpose()?;
        self.a = a;
        self.x = x;
        self.log_tpm = log_tpm;
        self.sample_table = table;
        Ok(())
    }

    fn bind_imodulon_table(&mut self, table: Option<AnnotationTable<ModuleName>>) -> Result<()> {
        let table = check_table(table, self.m.cols(), "iModulon")?;
        let order = table.index().to_vec();
        let m = self.m.reorder_cols(&order)?;
        let a = self.a.reorder_rows(&order)?;
        let thresholds = if self.thresholds.is_empty() {
            Thresholds::default()
        } else {
            Thresholds::from_pairs(
                order
                    .iter()
                    .filter_map(|name| self.thresholds.get(name).map(|t| (name.clone(), t)))
                    .collect(),
            )
        };
        self.m = m;
        self.a = a;
        self.thresholds = thresholds;
        self.imodulon_table = table;
        Ok(())
    }

    fn bind_trn(&mut self, trn: RegulatoryNetwork) -> Result<TrnReport> {
        let trn = trn.normalized()?;
        let (trn, dropped) = trn.restrict_to_genes(&self.gene_universe());
        if !dropped.is_empty() {
            warn!(
                "The following genes are in the TRN but not in your M matrix: {}",
                dropped.join(", ")
            );
        }
        let gene_table = if trn.is_empty() {
            None
        } else {
            Some(with_regulator_column(&self.gene_table, &trn)?)
        };

        if let Some(table) = gene_table {
            self.gene_table = table;
        }
        self.trn = trn;
        self.cutoff_optimized = false;
        Ok(TrnReport {
            dropped_genes: dropped,
        })
    }
}

/// Reads integer-like iModulon names back as indices.
fn coerce_module_names(m: WeightMatrix) -> Result<WeightMatrix> {
    let cols: Vec<ModuleName> = m
        .cols()
        .iter()
        .map(|c| ModuleName::from_text(&c.to_string()))
        .collect();
    if cols.as_slice() == m.cols() {
        return Ok(m);
    }
    let mut m = m;
    m.relabel_cols(cols)?;
    Ok(m)
}

fn check_expression(x: &ExpressionMatrix, m: &WeightMatrix, a: &ActivityMatrix, name: &str) -> Result<()> {
    if x.cols() != a.cols() {
        return Err(ModulonError::schema(format!(
            "{} and A matrices have different sample names",
            name
        )));
    }
    if x.rows() != m.rows() {
        return Err(ModulonError::schema(format!(
            "{} and M matrices have different gene names",
            name
        )));
    }
    Ok(())
}

/// Validates a table against the names of its matrix axis.
///
/// A missing or blank table becomes an empty table over `names`; extra keys are dropped with
/// a warning; missing keys and duplicate keys are schema errors.
fn check_table<K: Label>(table: Option<AnnotationTable<K>>, names: &[K], kind: &str) -> Result<AnnotationTable<K>> {
    let table = match table {
        Some(table) if !(table.is_empty() && table.columns().is_empty()) => table,
        _ => return Ok(AnnotationTable::empty(names.to_vec())),
    };
    if let Some(key) = table.first_duplicate_key() {
        return Err(ModulonError::schema(format!(
            "{} table contains duplicate entries: {}",
            kind, key
        )));
    }
    let (table, dropped) = table.filter_to(names)?;
    if !dropped.is_empty() {
        let dropped: Vec<String> = dropped.iter().map(|k| k.to_string()).collect();
        warn!(
            "The {} table contains entries that are not in the data: {}",
            kind,
            dropped.join(", ")
        );
    }
    Ok(table)
}

/// Gene table with a `regulator` column listing the regulators of each gene.
fn with_regulator_column(table: &AnnotationTable<String>, trn: &RegulatoryNetwork) -> Result<AnnotationTable<String>> {
    let by_gene = trn.regulators_by_gene();
    let values = table
        .index()
        .iter()
        .map(|gene| by_gene.get(gene.as_str()).map_or(Value::Null, |regs| json!(regs)))
        .collect::<Vec<Value>>();
    if table.column("regulator").is_some_and(|existing| existing != values.as_slice()) {
        warn!("Replacing the regulator column of the gene table with regulators from the TRN");
    }
    let mut table = table.clone();
    table.insert_column("regulator", values)?;
    Ok(table)
}
