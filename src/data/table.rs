use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::data::{Label, first_duplicate};
use crate::error::{ModulonError, Result};

/// Metadata table keyed by gene, sample or iModulon identifiers.
///
/// Cells are JSON values so that arbitrary annotation columns can be carried; `Value::Null`
/// marks a missing entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationTable<K> {
    index: Vec<K>,
    columns: Vec<String>,
    data: Vec<Vec<Value>>,
}

impl<K: Label> AnnotationTable<K> {
    /// A table with the given index and no columns.
    pub fn empty(index: Vec<K>) -> Self {
        AnnotationTable {
            index,
            columns: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn from_columns(index: Vec<K>, columns: Vec<(String, Vec<Value>)>) -> Result<Self> {
        let mut table = AnnotationTable::empty(index);
        for (name, values) in columns {
            table.insert_column(&name, values)?;
        }
        Ok(table)
    }

    pub fn index(&self) -> &[K] {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.column_position(name).map(|j| self.data[j].as_slice())
    }

    pub fn position(&self, key: &K) -> Option<usize> {
        self.index.iter().position(|k| k == key)
    }

    pub fn get(&self, key: &K, column: &str) -> Option<&Value> {
        let i = self.position(key)?;
        let j = self.column_position(column)?;
        Some(&self.data[j][i])
    }

    /// Sets one cell, creating the column (filled with nulls) when needed.
    pub fn set(&mut self, key: &K, column: &str, value: Value) -> Result<()> {
        let i = self
            .position(key)
            .ok_or_else(|| ModulonError::schema(format!("key {} is not in the table", key)))?;
        let j = match self.column_position(column) {
            Some(j) => j,
            None => {
                self.columns.push(column.to_string());
                self.data.push(vec![Value::Null; self.index.len()]);
                self.columns.len() - 1
            }
        };
        self.data[j][i] = value;
        Ok(())
    }

    /// Inserts or replaces a whole column.
    pub fn insert_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if values.len() != self.index.len() {
            return Err(ModulonError::schema(format!(
                "column {} has {} values but the table has {} rows",
                name,
                values.len(),
                self.index.len()
            )));
        }
        match self.column_position(name) {
            Some(j) => self.data[j] = values,
            None => {
                self.columns.push(name.to_string());
                self.data.push(values);
            }
        }
        Ok(())
    }

    pub fn first_duplicate_key(&self) -> Option<&K> {
        first_duplicate(&self.index)
    }

    /// Keeps only the rows whose key is in `names`, in table order.
    ///
    /// Every name must be present; returns the dropped keys alongside the filtered table.
    pub fn filter_to(&self, names: &[K]) -> Result<(Self, Vec<K>)> {
        let wanted: HashSet<&K> = names.iter().collect();
        let present: HashSet<&K> = self.index.iter().collect();
        let missing: Vec<String> = names
            .iter()
            .filter(|n| !present.contains(n))
            .map(|n| n.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ModulonError::schema(format!(
                "table is missing entries for: {}",
                missing.join(", ")
            )));
        }

        let mut keep = Vec::with_capacity(names.len());
        let mut dropped = Vec::new();
        for (i, key) in self.index.iter().enumerate() {
            if wanted.contains(key) {
                keep.push(i);
            } else {
                dropped.push(key.clone());
            }
        }
        Ok((self.take_rows(&keep), dropped))
    }

    /// Rows in the order given by `order`.
    pub fn select_rows(&self, order: &[K]) -> Result<Self> {
        let lookup = self.lookup();
        let positions = order
            .iter()
            .map(|k| {
                lookup
                    .get(k)
                    .copied()
                    .ok_or_else(|| ModulonError::schema(format!("key {} is not in the table", k)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.take_rows(&positions))
    }

    /// Replaces the keys positionally.
    pub fn relabel(&mut self, index: Vec<K>) -> Result<()> {
        if index.len() != self.index.len() {
            return Err(ModulonError::schema(format!(
                "expected {} keys, got {}",
                self.index.len(),
                index.len()
            )));
        }
        self.index = index;
        Ok(())
    }

    /// Merges per-key updates into the table.
    ///
    /// Columns named in `updates` come first and are overwritten for the updated keys; other
    /// columns keep their values; rows not mentioned keep theirs. The result follows `order`.
    pub fn merge_rows(&self, updates: &[(K, Vec<(String, Value)>)], order: &[K]) -> Result<Self> {
        let mut new_columns: Vec<String> = Vec::new();
        for (_, cells) in updates {
            for (name, _) in cells {
                if !new_columns.contains(name) {
                    new_columns.push(name.clone());
                }
            }
        }
        let mut column_order = new_columns.clone();
        column_order.extend(
            self.columns
                .iter()
                .filter(|c| !new_columns.contains(c))
                .cloned(),
        );

        let mut merged = self.select_rows(order)?;
        let mut reordered = AnnotationTable::empty(merged.index.clone());
        for name in &column_order {
            let values = merged
                .column(name)
                .map(|c| c.to_vec())
                .unwrap_or_else(|| vec![Value::Null; merged.index.len()]);
            reordered.insert_column(name, values)?;
        }
        merged = reordered;

        for (key, cells) in updates {
            for (name, value) in cells {
                merged.set(key, name, value.clone())?;
            }
        }
        Ok(merged)
    }

    fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn lookup(&self) -> HashMap<&K, usize> {
        self.index.iter().enumerate().map(|(i, k)| (k, i)).collect()
    }

    fn take_rows(&self, positions: &[usize]) -> Self {
        AnnotationTable {
            index: positions.iter().map(|&i| self.index[i].clone()).collect(),
            columns: self.columns.clone(),
            data: self
                .data
                .iter()
                .map(|col| positions.iter().map(|&i| col[i].clone()).collect())
                .collect(),
        }
    }
}

/// Text form of a cell, treating strings verbatim and `null` as absent.
pub fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
