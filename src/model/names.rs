use log::warn;
use std::collections::HashMap;

use crate::data::ModuleName;
use crate::data::first_duplicate;
use crate::error::{ModulonError, Result};
use crate::model::IcaData;

/// A requested iModulon name that was changed to keep names unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameNotice {
    /// Name before the rename
    pub original: ModuleName,
    pub requested: ModuleName,
    pub assigned: ModuleName,
}

impl IcaData {
    /// Renames every iModulon positionally.
    ///
    /// Repeated names get `-1`, `-2`, ... suffixes in first-seen order, each reported as a
    /// [`RenameNotice`]. Thresholds, the M and A axes and the iModulon table are renamed
    /// together.
    pub fn set_imodulon_names(&mut self, names: Vec<ModuleName>) -> Result<Vec<RenameNotice>> {
        let current = self.m.cols().to_vec();
        if names.len() != current.len() {
            return Err(ModulonError::schema(format!(
                "expected {} iModulon names, got {}",
                current.len(),
                names.len()
            )));
        }
        let (names, notices) = disambiguate(&current, names);
        if let Some(name) = first_duplicate(&names) {
            return Err(ModulonError::schema(format!(
                "iModulon name {} is still duplicated after adding suffixes",
                name
            )));
        }
        self.apply_module_names(names)?;
        Ok(notices)
    }

    /// Renames the iModulons listed in `mapping`, leaving the others unchanged.
    pub fn rename_imodulons(&mut self, mapping: &HashMap<ModuleName, ModuleName>) -> Result<Vec<RenameNotice>> {
        if let Some(unknown) = mapping.keys().find(|k| self.m.col_position(k).is_none()) {
            return Err(ModulonError::UnknownModule(unknown.clone()));
        }
        let names = self
            .m
            .cols()
            .iter()
            .map(|name| mapping.get(name).unwrap_or(name).clone())
            .collect();
        self.set_imodulon_names(names)
    }

    /// Writes validated names into every iModulon axis at once.
    fn apply_module_names(&mut self, names: Vec<ModuleName>) -> Result<()> {
        let thresholds = self.thresholds.renamed(&names)?;
        let mut m = self.m.clone();
        m.relabel_cols(names.clone())?;
        let mut a = self.a.clone();
        a.relabel_rows(names.clone())?;
        let mut table = self.imodulon_table.clone();
        table.relabel(names)?;

        self.thresholds = thresholds;
        self.m = m;
        self.a = a;
        self.imodulon_table = table;
        self.cutoff_optimized = false;
        Ok(())
    }
}

/// Suffixes every occurrence of a repeated name, counting per name in first-seen order.
fn disambiguate(current: &[ModuleName], names: Vec<ModuleName>) -> (Vec<ModuleName>, Vec<RenameNotice>) {
    let mut counts: HashMap<&ModuleName, usize> = HashMap::new();
    for name in &names {
        *counts.entry(name).or_default() += 1;
    }

    let mut seen: HashMap<ModuleName, usize> = HashMap::new();
    let mut notices = Vec::new();
    let mut final_names = Vec::with_capacity(names.len());
    for (original, name) in current.iter().zip(names.iter()) {
        if counts.get(name).copied().unwrap_or(0) < 2 {
            final_names.push(name.clone());
            continue;
        }
        let next = seen.entry(name.clone()).or_insert(1);
        let assigned = name.with_suffix(*next);
        *next += 1;
        warn!(
            "Duplicate iModulon names detected. iModulon {} will be renamed to {}",
            original, assigned
        );
        notices.push(RenameNotice {
            original: original.clone(),
            requested: name.clone(),
            assigned: assigned.clone(),
        });
        final_names.push(assigned);
    }
    (final_names, notices)
}
