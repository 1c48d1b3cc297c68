//! Labeled containers shared by the iModulon model.
//!
//! - **[`LabeledMatrix`]**: a dense ndarray block with row and column labels (M, A, X)
//! - **[`AnnotationTable`]**: gene, sample and iModulon metadata keyed by the matrix labels
//! - **[`DataSource`]**: an in-memory value, a delimited file, or a pandas-style JSON document

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::Hash;

pub mod matrix;
pub mod source;
pub mod table;

pub use matrix::LabeledMatrix;
pub use source::{DataSource, LoadFrame};
pub use table::AnnotationTable;

/// Identifier of an iModulon.
///
/// ICA produces integer component names; curated names are strings. Text made only of
/// ASCII digits is always read back as [`ModuleName::Index`], so integer names survive a
/// trip through JSON object keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModuleName {
    Index(i64),
    Label(String),
}

impl ModuleName {
    pub fn from_text(text: &str) -> Self {
        if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(idx) = text.parse::<i64>() {
                return ModuleName::Index(idx);
            }
        }
        ModuleName::Label(text.to_string())
    }

    /// Appends `-{n}`, used when disambiguating duplicate names.
    pub fn with_suffix(&self, n: usize) -> Self {
        ModuleName::from_text(&format!("{}-{}", self, n))
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleName::Index(idx) => write!(f, "{}", idx),
            ModuleName::Label(label) => write!(f, "{}", label),
        }
    }
}

impl From<i64> for ModuleName {
    fn from(value: i64) -> Self {
        ModuleName::Index(value)
    }
}

impl From<&str> for ModuleName {
    fn from(value: &str) -> Self {
        ModuleName::from_text(value)
    }
}

impl From<String> for ModuleName {
    fn from(value: String) -> Self {
        ModuleName::from_text(&value)
    }
}

impl Serialize for ModuleName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ModuleName::Index(idx) => serializer.serialize_i64(*idx),
            ModuleName::Label(label) => serializer.serialize_str(label),
        }
    }
}

impl<'de> Deserialize<'de> for ModuleName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(idx) => ModuleName::Index(idx),
            Raw::Text(text) => ModuleName::from_text(&text),
        })
    }
}

/// Row or column label of a labeled container.
pub trait Label: Clone + Eq + Hash + fmt::Display + fmt::Debug {
    fn from_text(text: &str) -> Self;
}

impl Label for String {
    fn from_text(text: &str) -> Self {
        text.to_string()
    }
}

impl Label for ModuleName {
    fn from_text(text: &str) -> Self {
        ModuleName::from_text(text)
    }
}

/// Returns the first label that occurs more than once.
pub(crate) fn first_duplicate<L: Label>(labels: &[L]) -> Option<&L> {
    let mut seen = std::collections::HashSet::with_capacity(labels.len());
    labels.iter().find(|label| !seen.insert(*label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_strings_become_indices() {
        assert_eq!(ModuleName::from("12"), ModuleName::Index(12));
        assert_eq!(ModuleName::from("iM1"), ModuleName::Label("iM1".to_string()));
        assert_eq!(ModuleName::from("-3"), ModuleName::Label("-3".to_string()));
        assert_eq!(ModuleName::from(""), ModuleName::Label(String::new()));
    }

    #[test]
    fn suffix_keeps_label_text() {
        let name = ModuleName::from("ArcA");
        assert_eq!(name.with_suffix(2), ModuleName::from("ArcA-2"));
        assert_eq!(ModuleName::Index(4).with_suffix(1), ModuleName::from("4-1"));
    }

    #[test]
    fn json_keys_are_coerced() {
        let parsed: Vec<ModuleName> = serde_json::from_str(r#"[0, "1", "Fur-1"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                ModuleName::Index(0),
                ModuleName::Index(1),
                ModuleName::Label("Fur-1".to_string())
            ]
        );
    }

    #[test]
    fn duplicates_are_found() {
        let labels = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        assert_eq!(first_duplicate(&labels), Some(&"a".to_string()));
        assert_eq!(first_duplicate(&labels[..2]), None);
    }
}
