//! Per-iModulon membership thresholds on absolute gene weight.
//!
//! Two strategies are available:
//! - **[`dagostino`]**: remove top genes until the rest passes a normality cutoff
//! - **[`kmeans`]**: split |weight| into three clusters and cut between the two smallest

use log::debug;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::data::{LabeledMatrix, ModuleName};
use crate::error::{ModulonError, Result};

pub mod dagostino;
pub mod kmeans;

pub use dagostino::{DagostinoProfile, compute_dagostino_threshold};
pub use kmeans::{KmeansArgs, kmeans_threshold};

/// Default D'Agostino cutoff.
pub const DEFAULT_DAGOSTINO_CUTOFF: u32 = 550;

/// Threshold per iModulon, in iModulon order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Thresholds {
    entries: Vec<(ModuleName, f64)>,
}

impl Thresholds {
    pub fn from_pairs(entries: Vec<(ModuleName, f64)>) -> Self {
        Thresholds { entries }
    }

    pub fn get(&self, module: &ModuleName) -> Option<f64> {
        self.entries
            .iter()
            .find(|(name, _)| name == module)
            .map(|(_, value)| *value)
    }

    pub fn set(&mut self, module: &ModuleName, value: f64) -> Result<()> {
        check_value(module, value)?;
        match self.entries.iter_mut().find(|(name, _)| name == module) {
            Some(entry) => {
                entry.1 = value;
                Ok(())
            }
            None => Err(ModulonError::UnknownModule(module.clone())),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ModuleName, f64)> {
        self.entries.iter().map(|(name, value)| (name, *value))
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleName> {
        self.entries.iter().map(|(name, _)| name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replaces the keys positionally, keeping every value with its module.
    pub(crate) fn renamed(&self, names: &[ModuleName]) -> Result<Self> {
        if names.len() != self.entries.len() {
            return Err(ModulonError::ThresholdCount {
                found: names.len(),
                expected: self.entries.len(),
            });
        }
        Ok(Thresholds {
            entries: names
                .iter()
                .cloned()
                .zip(self.entries.iter().map(|(_, value)| *value))
                .collect(),
        })
    }
}

impl Serialize for Thresholds {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(&name.to_string(), value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Thresholds {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ThresholdVisitor;

        impl<'de> Visitor<'de> for ThresholdVisitor {
            type Value = Thresholds;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from iModulon name to threshold")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Thresholds, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, f64>()? {
                    entries.push((ModuleName::from_text(&key), value));
                }
                Ok(Thresholds { entries })
            }
        }

        deserializer.deserialize_map(ThresholdVisitor)
    }
}

/// Thresholds supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ThresholdInput {
    /// One value per iModulon name
    Map(HashMap<ModuleName, f64>),
    /// One value per iModulon, in iModulon order
    List(Vec<f64>),
}

impl ThresholdInput {
    /// Binds the input to `modules`, which fixes the order of the result.
    pub fn resolve(self, modules: &[ModuleName]) -> Result<Thresholds> {
        match self {
            ThresholdInput::List(values) => {
                if values.len() != modules.len() {
                    return Err(ModulonError::ThresholdCount {
                        found: values.len(),
                        expected: modules.len(),
                    });
                }
                let entries: Vec<(ModuleName, f64)> = modules.iter().cloned().zip(values).collect();
                for (name, value) in &entries {
                    check_value(name, *value)?;
                }
                Ok(Thresholds::from_pairs(entries))
            }
            ThresholdInput::Map(map) => {
                if map.len() != modules.len() {
                    return Err(ModulonError::ThresholdCount {
                        found: map.len(),
                        expected: modules.len(),
                    });
                }
                let known: HashSet<&ModuleName> = modules.iter().collect();
                if let Some(extra) = map.keys().find(|k| !known.contains(k)) {
                    return Err(ModulonError::schema(format!(
                        "Threshold keys must match iModulon names: unexpected key {}",
                        extra
                    )));
                }
                let entries = modules
                    .iter()
                    .map(|m| {
                        let value = map
                            .get(m)
                            .copied()
                            .ok_or_else(|| ModulonError::UnknownModule(m.clone()))?;
                        check_value(m, value)?;
                        Ok((m.clone(), value))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Thresholds::from_pairs(entries))
            }
        }
    }
}

/// Thresholds compare against |weight| and must be non-negative numbers.
fn check_value(module: &ModuleName, value: f64) -> Result<()> {
    if value.is_nan() || value < 0.0 {
        return Err(ModulonError::schema(format!(
            "Threshold of iModulon {} must be non-negative, got {}",
            module, value
        )));
    }
    Ok(())
}

impl From<Vec<f64>> for ThresholdInput {
    fn from(values: Vec<f64>) -> Self {
        ThresholdInput::List(values)
    }
}

impl From<HashMap<ModuleName, f64>> for ThresholdInput {
    fn from(map: HashMap<ModuleName, f64>) -> Self {
        ThresholdInput::Map(map)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThresholdMethod {
    #[default]
    Dagostino,
    Kmeans,
}

impl FromStr for ThresholdMethod {
    type Err = ModulonError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dagostino" => Ok(ThresholdMethod::Dagostino),
            "kmeans" => Ok(ThresholdMethod::Kmeans),
            other => Err(ModulonError::precondition(format!(
                "threshold_method must be \"dagostino\" or \"kmeans\", got \"{}\"",
                other
            ))),
        }
    }
}

impl fmt::Display for ThresholdMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdMethod::Dagostino => write!(f, "dagostino"),
            ThresholdMethod::Kmeans => write!(f, "kmeans"),
        }
    }
}

/// Why clustering was used instead of the D'Agostino method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KmeansReason {
    Requested,
    NoTrn,
}

/// How the thresholds of a model were established at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdDecision {
    /// Caller-supplied thresholds; `optimization_skipped` is set if optimization was requested.
    Manual { optimization_skipped: bool },
    Kmeans {
        reason: KmeansReason,
        optimization_skipped: bool,
    },
    Dagostino { cutoff: u32, optimized: bool },
}

/// D'Agostino thresholds for every column of the weight matrix.
pub fn compute_dagostino_thresholds(m: &LabeledMatrix<String, ModuleName>, cutoff: u32) -> Thresholds {
    debug!("Computing D'Agostino thresholds at cutoff {}", cutoff);
    let entries = m
        .cols()
        .iter()
        .enumerate()
        .map(|(j, name)| (name.clone(), compute_dagostino_threshold(m.column(j), cutoff as f64)))
        .collect();
    Thresholds::from_pairs(entries)
}

/// K-means thresholds for every column of the weight matrix.
pub fn compute_kmeans_thresholds(m: &LabeledMatrix<String, ModuleName>) -> Thresholds {
    let entries = m
        .cols()
        .iter()
        .enumerate()
        .map(|(j, name)| (name.clone(), kmeans_threshold(m.column(j))))
        .collect();
    Thresholds::from_pairs(entries)
}
