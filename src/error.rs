use thiserror::Error;

use crate::data::ModuleName;

/// Errors surfaced while building, mutating or persisting an [`IcaData`](crate::model::IcaData).
#[derive(Debug, Error)]
pub enum ModulonError {
    /// Axis mismatch, duplicate keys or a malformed table.
    #[error("Schema error: {0}")]
    Schema(String),
    /// A required input is missing or an argument is invalid for the current state.
    #[error("Precondition failed: {0}")]
    Precondition(String),
    #[error("new thresholds have {found} elements, but should have {expected} elements")]
    ThresholdCount { found: usize, expected: usize },
    #[error("iModulon {0} does not exist")]
    UnknownModule(ModuleName),
    #[error("Gene does not exist: {0}")]
    UnknownGene(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to parse delimited file: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Stats(#[from] anyhow::Error),
}

impl ModulonError {
    pub(crate) fn schema(msg: impl Into<String>) -> Self {
        ModulonError::Schema(msg.into())
    }

    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        ModulonError::Precondition(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ModulonError>;
