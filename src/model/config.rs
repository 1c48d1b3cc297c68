use serde_json::{Map, Value};

use crate::data::{AnnotationTable, DataSource, ModuleName};
use crate::model::ExpressionMatrix;
use crate::threshold::{DEFAULT_DAGOSTINO_CUTOFF, ThresholdInput};
use crate::trn::RegulatoryNetwork;

/// Label of the database behind `gene_links` when none is given.
pub const DEFAULT_LINK_DATABASE: &str = "External Database";

/// Optional inputs of [`IcaData::new`](crate::model::IcaData::new).
///
/// ```rust
/// use single_imodulon::model::IcaDataOptions;
///
/// let options = IcaDataOptions::default()
///     .with_threshold_method("kmeans")
///     .with_dagostino_cutoff(750);
/// assert_eq!(options.dagostino_cutoff, 750);
/// ```
#[derive(Debug, Clone)]
pub struct IcaDataOptions {
    /// Centered expression matrix (genes × samples)
    pub x: Option<DataSource<ExpressionMatrix>>,
    /// Uncentered log-TPM matrix (genes × samples)
    pub log_tpm: Option<DataSource<ExpressionMatrix>>,
    pub gene_table: Option<DataSource<AnnotationTable<String>>>,
    pub sample_table: Option<DataSource<AnnotationTable<String>>>,
    pub imodulon_table: Option<DataSource<AnnotationTable<ModuleName>>>,
    pub trn: Option<DataSource<RegulatoryNetwork>>,
    pub dagostino_cutoff: u32,
    pub optimize_cutoff: bool,
    /// Overrides both threshold methods when present
    pub thresholds: Option<ThresholdInput>,
    /// `"dagostino"` or `"kmeans"`
    pub threshold_method: String,
    pub dataset_table: Option<DataSource<Map<String, Value>>>,
    pub splash_table: Option<DataSource<Map<String, Value>>>,
    pub gene_links: Option<DataSource<Map<String, Value>>>,
    pub tf_links: Option<DataSource<Map<String, Value>>>,
    pub link_database: String,
    /// Draw a progress bar during cutoff optimization
    pub show_progress: bool,
}

impl Default for IcaDataOptions {
    fn default() -> Self {
        IcaDataOptions {
            x: None,
            log_tpm: None,
            gene_table: None,
            sample_table: None,
            imodulon_table: None,
            trn: None,
            dagostino_cutoff: DEFAULT_DAGOSTINO_CUTOFF,
            optimize_cutoff: false,
            thresholds: None,
            threshold_method: "dagostino".to_string(),
            dataset_table: None,
            splash_table: None,
            gene_links: None,
            tf_links: None,
            link_database: DEFAULT_LINK_DATABASE.to_string(),
            show_progress: false,
        }
    }
}

impl IcaDataOptions {
    pub fn with_x(mut self, x: impl Into<DataSource<ExpressionMatrix>>) -> Self {
        self.x = Some(x.into());
        self
    }

    pub fn with_log_tpm(mut self, log_tpm: impl Into<DataSource<ExpressionMatrix>>) -> Self {
        self.log_tpm = Some(log_tpm.into());
        self
    }

    pub fn with_gene_table(mut self, table: impl Into<DataSource<AnnotationTable<String>>>) -> Self {
        self.gene_table = Some(table.into());
        self
    }

    pub fn with_sample_table(mut self, table: impl Into<DataSource<AnnotationTable<String>>>) -> Self {
        self.sample_table = Some(table.into());
        self
    }

    pub fn with_imodulon_table(
        mut self,
        table: impl Into<DataSource<AnnotationTable<ModuleName>>>,
    ) -> Self {
        self.imodulon_table = Some(table.into());
        self
    }

    pub fn with_trn(mut self, trn: impl Into<DataSource<RegulatoryNetwork>>) -> Self {
        self.trn = Some(trn.into());
        self
    }

    pub fn with_dagostino_cutoff(mut self, cutoff: u32) -> Self {
        self.dagostino_cutoff = cutoff;
        self
    }

    pub fn with_optimize_cutoff(mut self, optimize: bool) -> Self {
        self.optimize_cutoff = optimize;
        self
    }

    pub fn with_thresholds(mut self, thresholds: impl Into<ThresholdInput>) -> Self {
        self.thresholds = Some(thresholds.into());
        self
    }

    pub fn with_threshold_method(mut self, method: impl Into<String>) -> Self {
        self.threshold_method = method.into();
        self
    }

    pub fn with_dataset_table(mut self, table: impl Into<DataSource<Map<String, Value>>>) -> Self {
        self.dataset_table = Some(table.into());
        self
    }

    pub fn with_splash_table(mut self, table: impl Into<DataSource<Map<String, Value>>>) -> Self {
        self.splash_table = Some(table.into());
        self
    }

    pub fn with_gene_links(mut self, links: impl Into<DataSource<Map<String, Value>>>) -> Self {
        self.gene_links = Some(links.into());
        self
    }

    pub fn with_tf_links(mut self, links: impl Into<DataSource<Map<String, Value>>>) -> Self {
        self.tf_links = Some(links.into());
        self
    }

    pub fn with_link_database(mut self, name: impl Into<String>) -> Self {
        self.link_database = name.into();
        self
    }

    pub fn with_show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}
