//! Global D'Agostino cutoff search against the regulatory network.

use indicatif::{ProgressBar, ProgressDrawTarget};
use log::{debug, info, warn};
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::data::ModuleName;
use crate::enrichment::{CombineMethod, compute_trn_enrichment};
use crate::error::{ModulonError, Result};
use crate::model::IcaData;
use crate::testing::inference::discrete::ContingencyTable;
use crate::threshold::{DEFAULT_DAGOSTINO_CUTOFF, DagostinoProfile};

/// Genes per iModulon used to find its best regulator.
const TOP_GENES: usize = 20;

const GRID_START: u32 = 300;
const GRID_END: u32 = 2000;
const GRID_STEP: usize = 50;

/// Result of a cutoff search.
#[derive(Debug, Clone, PartialEq)]
pub struct CutoffOptimization {
    pub cutoff: u32,
    /// `false` when the model was already optimized and nothing was recomputed
    pub changed: bool,
    /// Mean F1 score at every candidate cutoff, in increasing cutoff order
    pub sensitivity: Vec<(u32, f64)>,
}

impl IcaData {
    /// Picks the D'Agostino cutoff whose memberships best reproduce the regulons of each
    /// iModulon's best regulator, then recomputes all thresholds at that cutoff.
    ///
    /// Calling this again before the TRN, names or thresholds change returns the current
    /// cutoff with `changed == false`.
    pub fn reoptimize_thresholds(&mut self, progress: bool) -> Result<CutoffOptimization> {
        if self.trn.is_empty() {
            return Err(ModulonError::precondition(
                "D'agostino cutoff optimization requires a TRN",
            ));
        }
        if self.cutoff_optimized {
            let cutoff = self.dagostino_cutoff.unwrap_or(DEFAULT_DAGOSTINO_CUTOFF);
            info!("Cutoff already optimized ({}), and no new TRN data provided", cutoff);
            return Ok(CutoffOptimization {
                cutoff,
                changed: false,
                sensitivity: Vec::new(),
            });
        }

        let sensitivity = self.cutoff_sensitivity(progress)?;
        let mut best: Option<(u32, f64)> = None;
        for &(cutoff, score) in &sensitivity {
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((cutoff, score));
            }
        }
        let (cutoff, score) = best.unwrap_or((DEFAULT_DAGOSTINO_CUTOFF, 0.0));
        debug!("Best D'Agostino cutoff {} with mean F1 {:.4}", cutoff, score);

        self.apply_dagostino_cutoff(cutoff);
        self.cutoff_optimized = true;
        Ok(CutoffOptimization {
            cutoff,
            changed: true,
            sensitivity,
        })
    }

    /// The strongest single-regulator hit among the top genes of every iModulon.
    fn best_regulators(&self) -> Result<Vec<(ModuleName, String)>> {
        let universe = self.gene_universe();
        let mut pairs = Vec::new();
        for (j, name) in self.m.cols().iter().enumerate() {
            let column = self.m.column(j);
            let mut order: Vec<usize> = (0..column.len()).collect();
            order.sort_by(|&a, &b| {
                column[b]
                    .abs()
                    .partial_cmp(&column[a].abs())
                    .unwrap_or(Ordering::Equal)
            });
            let top: HashSet<&str> = order
                .iter()
                .take(TOP_GENES)
                .map(|&i| self.m.rows()[i].as_str())
                .collect();
            let hits = compute_trn_enrichment(
                &top,
                &universe,
                &self.trn,
                1,
                f64::INFINITY,
                CombineMethod::Both,
                false,
            )?;
            if let Some(hit) = hits.into_iter().next() {
                pairs.push((name.clone(), hit.label));
            }
        }
        Ok(pairs)
    }

    fn cutoff_sensitivity(&self, progress: bool) -> Result<Vec<(u32, f64)>> {
        let grid: Vec<u32> = (GRID_START..=GRID_END).step_by(GRID_STEP).collect();
        let pairs = self.best_regulators()?;
        if pairs.is_empty() {
            warn!(
                "No iModulon shares its top genes with the TRN, using the lowest candidate cutoff {}",
                GRID_START
            );
            return Ok(grid.into_iter().map(|cutoff| (cutoff, 0.0)).collect());
        }
        debug!("Optimizing the cutoff over {} iModulon-regulator pairs", pairs.len());

        let universe = self.gene_universe();
        let mut profiles = Vec::with_capacity(pairs.len());
        for (module, regulator) in &pairs {
            let j = self.module_position(module)?;
            profiles.push((DagostinoProfile::new(self.m.column(j)), self.trn.targets(regulator)));
        }

        let pb = ProgressBar::new(grid.len() as u64);
        if !progress {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }

        let mut sensitivity = Vec::with_capacity(grid.len());
        for cutoff in grid {
            let mut total = 0.0;
            for (profile, regulon) in &profiles {
                let members: HashSet<&str> = profile
                    .members(cutoff as f64)
                    .into_iter()
                    .map(|i| self.m.rows()[i].as_str())
                    .collect();
                let table = ContingencyTable::from_sets(&members, regulon, &universe)?;
                total += table.f1_score();
            }
            sensitivity.push((cutoff, total / profiles.len() as f64));
            pb.inc(1);
        }
        pb.finish_and_clear();
        Ok(sensitivity)
    }
}
