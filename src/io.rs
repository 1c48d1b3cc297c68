//! JSON persistence of [`IcaData`] models.
//!
//! The document is a single JSON object. Matrices, tables and the TRN are embedded as
//! pandas-style JSON strings; thresholds and metadata are plain objects. Files ending in
//! `.gz` are gzip-compressed.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::data::{AnnotationTable, DataSource, LoadFrame, ModuleName};
use crate::error::Result;
use crate::model::{ActivityMatrix, ExpressionMatrix, IcaData, IcaDataOptions, WeightMatrix};
use crate::threshold::{ThresholdInput, Thresholds};
use crate::trn::RegulatoryNetwork;

/// Keys written by older versions that are no longer constructor inputs.
const DEPRECATED_KEYS: [&str; 2] = ["cog_colors", "_dagostino_cutoff"];

/// Serialized form of a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IcaDataRecord {
    #[serde(rename = "M")]
    pub m: String,
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "X", default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_tpm: Option<String>,
    #[serde(default)]
    pub gene_table: Option<String>,
    #[serde(default)]
    pub sample_table: Option<String>,
    #[serde(default)]
    pub imodulon_table: Option<String>,
    #[serde(default)]
    pub trn: Option<String>,
    #[serde(default)]
    pub dagostino_cutoff: Option<u32>,
    #[serde(default)]
    pub thresholds: Option<Thresholds>,
    #[serde(default)]
    pub dataset_table: Option<Map<String, Value>>,
    #[serde(default)]
    pub splash_table: Option<Map<String, Value>>,
    #[serde(default)]
    pub gene_links: Option<Map<String, Value>>,
    #[serde(default)]
    pub tf_links: Option<Map<String, Value>>,
    #[serde(default)]
    pub link_database: Option<String>,
}

impl IcaDataRecord {
    pub fn from_model(data: &IcaData) -> Self {
        let metadata = data.metadata();
        IcaDataRecord {
            m: data.m().to_json_string(),
            a: data.a().to_json_string(),
            x: data.x().map(LoadFrame::to_json_string),
            log_tpm: data.log_tpm().map(LoadFrame::to_json_string),
            gene_table: Some(data.gene_table().to_json_string()),
            sample_table: Some(data.sample_table().to_json_string()),
            imodulon_table: Some(data.imodulon_table().to_json_string()),
            trn: Some(data.trn().to_json_string()),
            dagostino_cutoff: data.dagostino_cutoff(),
            thresholds: Some(data.thresholds().clone()),
            dataset_table: Some(metadata.dataset_table().clone()),
            splash_table: Some(metadata.splash_table().clone()),
            gene_links: Some(metadata.gene_links().clone()),
            tf_links: Some(metadata.tf_links().clone()),
            link_database: Some(metadata.link_database().to_string()),
        }
    }

    /// Rebuilds the model with its saved thresholds and D'Agostino cutoff.
    pub fn into_model(self) -> Result<IcaData> {
        let mut options = IcaDataOptions::default();
        if let Some(x) = self.x {
            options = options.with_x(DataSource::<ExpressionMatrix>::json(x));
        }
        if let Some(log_tpm) = self.log_tpm {
            options = options.with_log_tpm(DataSource::<ExpressionMatrix>::json(log_tpm));
        }
        if let Some(table) = self.gene_table {
            options = options.with_gene_table(DataSource::<AnnotationTable<String>>::json(table));
        }
        if let Some(table) = self.sample_table {
            options = options.with_sample_table(DataSource::<AnnotationTable<String>>::json(table));
        }
        if let Some(table) = self.imodulon_table {
            options = options.with_imodulon_table(DataSource::<AnnotationTable<ModuleName>>::json(table));
        }
        if let Some(trn) = self.trn {
            options = options.with_trn(DataSource::<RegulatoryNetwork>::json(trn));
        }
        if let Some(cutoff) = self.dagostino_cutoff {
            options = options.with_dagostino_cutoff(cutoff);
        }
        if let Some(thresholds) = self.thresholds {
            let map: HashMap<ModuleName, f64> = thresholds
                .iter()
                .map(|(name, value)| (name.clone(), value))
                .collect();
            options = options.with_thresholds(ThresholdInput::Map(map));
        }
        if let Some(table) = self.dataset_table {
            options = options.with_dataset_table(table);
        }
        if let Some(table) = self.splash_table {
            options = options.with_splash_table(table);
        }
        if let Some(links) = self.gene_links {
            options = options.with_gene_links(links);
        }
        if let Some(links) = self.tf_links {
            options = options.with_tf_links(links);
        }
        if let Some(name) = self.link_database {
            options = options.with_link_database(name);
        }

        let mut data = IcaData::new(
            DataSource::<WeightMatrix>::json(self.m),
            DataSource::<ActivityMatrix>::json(self.a),
            options,
        )?;
        data.restore_dagostino_cutoff(self.dagostino_cutoff);
        Ok(data)
    }
}

/// Output path for `fname`: `.json`, or `.json.gz` when compressing.
fn normalized_path(fname: &Path, compress: bool) -> PathBuf {
    let name = fname.to_string_lossy();
    let name = if compress {
        if name.ends_with(".json.gz") {
            name.into_owned()
        } else if name.ends_with(".json") {
            format!("{}.gz", name)
        } else {
            format!("{}.json.gz", name)
        }
    } else if name.ends_with(".json") {
        name.into_owned()
    } else {
        format!("{}.json", name)
    };
    PathBuf::from(name)
}

/// Writes `data` to `fname` and returns the path actually written.
pub fn save_to_json(data: &IcaData, fname: impl AsRef<Path>, compress: bool) -> Result<PathBuf> {
    let path = normalized_path(fname.as_ref(), compress);
    let record = IcaDataRecord::from_model(data);
    let file = File::create(&path)?;
    if compress {
        let mut writer = BufWriter::new(GzEncoder::new(file, Compression::default()));
        serde_json::to_writer(&mut writer, &record)?;
        writer.flush()?;
        let encoder = writer.into_inner().map_err(|e| e.into_error())?;
        encoder.finish()?;
    } else {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &record)?;
        writer.flush()?;
    }
    debug!("Saved model to {}", path.display());
    Ok(path)
}

/// Loads a model saved by [`save_to_json`]; `.gz` files are decompressed.
pub fn load_json_model(path: impl AsRef<Path>) -> Result<IcaData> {
    let path = path.as_ref();
    let file = File::open(path)?;
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        load_json_model_from_reader(BufReader::new(GzDecoder::new(file)))
    } else {
        load_json_model_from_reader(BufReader::new(file))
    }
}

pub fn load_json_model_from_reader(reader: impl Read) -> Result<IcaData> {
    let mut document: Map<String, Value> = serde_json::from_reader(reader)?;
    for key in DEPRECATED_KEYS {
        if document.remove(key).is_some() {
            debug!("Ignoring deprecated key {}", key);
        }
    }
    let record: IcaDataRecord = serde_json::from_value(Value::Object(document))?;
    record.into_model()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffixes_are_normalized() {
        assert_eq!(normalized_path(Path::new("model"), false), PathBuf::from("model.json"));
        assert_eq!(normalized_path(Path::new("model.json"), false), PathBuf::from("model.json"));
        assert_eq!(normalized_path(Path::new("model"), true), PathBuf::from("model.json.gz"));
        assert_eq!(normalized_path(Path::new("model.json"), true), PathBuf::from("model.json.gz"));
        assert_eq!(
            normalized_path(Path::new("model.json.gz"), true),
            PathBuf::from("model.json.gz")
        );
    }

    #[test]
    fn deprecated_keys_are_ignored() {
        let document = r#"{
            "M": "{\"0\":{\"b1\":0.9,\"b2\":0.1}}",
            "A": "{\"s1\":{\"0\":1.0}}",
            "thresholds": {"0": 0.5},
            "dagostino_cutoff": 750,
            "cog_colors": {"A": "red"},
            "_dagostino_cutoff": 550
        }"#;
        let data = load_json_model_from_reader(document.as_bytes()).unwrap();
        assert_eq!(data.imodulon_names(), &[ModuleName::Index(0)]);
        assert_eq!(data.thresholds().get(&ModuleName::Index(0)), Some(0.5));
        assert_eq!(data.dagostino_cutoff(), Some(750));
        assert_eq!(data.imodulon_genes(&ModuleName::Index(0)).unwrap(), vec!["b1"]);
    }
}
