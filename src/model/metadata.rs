//! Dataset descriptions and external links published alongside a model.

use log::warn;
use serde_json::{Map, Value, json};
use std::collections::HashSet;

use crate::data::DataSource;
use crate::data::table::cell_text;
use crate::error::{ModulonError, Result};
use crate::model::IcaData;
use crate::model::config::DEFAULT_LINK_DATABASE;

const SPLASH_DEFAULTS: [(&str, &str); 5] = [
    ("large_title", "New Dataset"),
    ("subtitle", "Unpublished study"),
    ("author", "Pymodulon User"),
    ("organism_folder", "new_org"),
    ("dataset_folder", "new_dataset"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseMetadata {
    dataset_table: Map<String, Value>,
    splash_table: Map<String, Value>,
    gene_links: Map<String, Value>,
    tf_links: Map<String, Value>,
    link_database: String,
}

impl Default for DatabaseMetadata {
    fn default() -> Self {
        DatabaseMetadata {
            dataset_table: Map::new(),
            splash_table: Map::new(),
            gene_links: Map::new(),
            tf_links: Map::new(),
            link_database: DEFAULT_LINK_DATABASE.to_string(),
        }
    }
}

impl DatabaseMetadata {
    pub(crate) fn build(
        data: &IcaData,
        dataset_table: Option<Map<String, Value>>,
        splash_table: Option<Map<String, Value>>,
        gene_links: Option<Map<String, Value>>,
        tf_links: Option<Map<String, Value>>,
        link_database: String,
    ) -> Result<Self> {
        Ok(DatabaseMetadata {
            dataset_table: dataset_table.unwrap_or_else(|| default_dataset_table(data)),
            splash_table: with_splash_defaults(splash_table.unwrap_or_default()),
            gene_links: check_gene_links(data, gene_links.unwrap_or_default())?,
            tf_links: check_tf_links(data, tf_links.unwrap_or_default())?,
            link_database,
        })
    }

    pub fn dataset_table(&self) -> &Map<String, Value> {
        &self.dataset_table
    }

    pub fn splash_table(&self) -> &Map<String, Value> {
        &self.splash_table
    }

    pub fn gene_links(&self) -> &Map<String, Value> {
        &self.gene_links
    }

    pub fn tf_links(&self) -> &Map<String, Value> {
        &self.tf_links
    }

    pub fn link_database(&self) -> &str {
        &self.link_database
    }
}

impl IcaData {
    pub fn metadata(&self) -> &DatabaseMetadata {
        &self.metadata
    }

    /// Replaces the dataset description; `None` regenerates the default summary.
    pub fn set_dataset_table(&mut self, table: Option<DataSource<Map<String, Value>>>) -> Result<()> {
        let table = match table {
            Some(source) => source.resolve()?,
            None => default_dataset_table(self),
        };
        self.metadata.dataset_table = table;
        Ok(())
    }

    /// Replaces the landing-page description, filling in defaults for missing keys.
    pub fn set_splash_table(&mut self, table: Option<DataSource<Map<String, Value>>>) -> Result<()> {
        let table = table.map(DataSource::resolve).transpose()?.unwrap_or_default();
        self.metadata.splash_table = with_splash_defaults(table);
        Ok(())
    }

    pub fn set_gene_links(&mut self, links: Option<DataSource<Map<String, Value>>>) -> Result<()> {
        let links = links.map(DataSource::resolve).transpose()?.unwrap_or_default();
        self.metadata.gene_links = check_gene_links(self, links)?;
        Ok(())
    }

    pub fn set_tf_links(&mut self, links: Option<DataSource<Map<String, Value>>>) -> Result<()> {
        let links = links.map(DataSource::resolve).transpose()?.unwrap_or_default();
        self.metadata.tf_links = check_tf_links(self, links)?;
        Ok(())
    }

    pub fn set_link_database(&mut self, name: impl Into<String>) {
        self.metadata.link_database = name.into();
    }
}

fn default_dataset_table(data: &IcaData) -> Map<String, Value> {
    let conditions = count_conditions(data).map_or(json!("Unknown"), |n| json!(n));
    let mut table = Map::new();
    table.insert("Title".into(), json!("New Dataset"));
    table.insert("Organism".into(), json!("New Organism"));
    table.insert("Strain".into(), json!("Unknown Strain"));
    table.insert("Number of Samples".into(), json!(data.sample_names().len()));
    table.insert("Number of Unique Conditions".into(), conditions);
    table.insert("Number of Genes".into(), json!(data.gene_names().len()));
    table.insert("Number of iModulons".into(), json!(data.imodulon_names().len()));
    table
}

/// Distinct (condition, project) pairs of the sample table, skipping incomplete rows.
fn count_conditions(data: &IcaData) -> Option<usize> {
    let table = data.sample_table();
    let conditions = table.column("condition")?;
    let projects = table.column("project")?;
    let pairs: HashSet<(String, String)> = conditions
        .iter()
        .zip(projects)
        .filter_map(|(c, p)| Some((cell_text(c)?, cell_text(p)?)))
        .collect();
    Some(pairs.len())
}

fn with_splash_defaults(mut table: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in SPLASH_DEFAULTS {
        if !table.contains_key(key) {
            table.insert(key.to_string(), json!(value));
        }
    }
    table
}

fn check_link_values(links: &Map<String, Value>, kind: &str) -> Result<()> {
    for (key, value) in links {
        if !(value.is_string() || value.is_null()) {
            return Err(ModulonError::precondition(format!(
                "{} link for {} must be a string, got {}",
                kind, key, value
            )));
        }
    }
    Ok(())
}

/// Every gene of the model gets an entry; genes without a link map to `null`.
fn check_gene_links(data: &IcaData, mut links: Map<String, Value>) -> Result<Map<String, Value>> {
    check_link_values(&links, "Gene")?;
    let genes: HashSet<&str> = data.gene_universe();
    let unknown: Vec<&str> = links
        .keys()
        .map(String::as_str)
        .filter(|g| !genes.contains(g))
        .collect();
    if !unknown.is_empty() {
        warn!(
            "The following genes have a link but are not in the M matrix: {}",
            unknown.join(", ")
        );
    }
    for gene in data.gene_names() {
        if !links.contains_key(gene) {
            links.insert(gene.clone(), Value::Null);
        }
    }
    Ok(links)
}

fn check_tf_links(data: &IcaData, links: Map<String, Value>) -> Result<Map<String, Value>> {
    check_link_values(&links, "TF")?;
    if !data.trn().is_empty() {
        for tf in links.keys() {
            if !data.trn().contains_regulator(tf) {
                warn!("{} has a TF link but is not in the TRN", tf);
            }
        }
    }
    Ok(links)
}
