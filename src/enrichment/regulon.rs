use itertools::Itertools;
use log::debug;
use std::collections::HashSet;

use crate::enrichment::{CombineMethod, Enrichment, compute_enrichment, filter_fdr};
use crate::error::{ModulonError, Result};
use crate::trn::{CombineMode, RegulatoryNetwork};

/// Largest regulator combination tested without `force`.
pub const MAX_UNFORCED_REGULATORS: usize = 2;

/// Enrichment of a gene set in the regulon of `regulator`.
///
/// `regulator` is a TRN regulator or a composite expression (see
/// [`RegulatoryNetwork::regulon`]); `;` groups are combined with `mode`. No multiple-testing
/// correction is applied to a single test.
pub fn compute_regulon_enrichment(
    gene_set: &HashSet<&str>,
    regulator: &str,
    universe: &HashSet<&str>,
    trn: &RegulatoryNetwork,
    mode: CombineMode,
) -> Result<Enrichment> {
    let (regulon, n_regs) = trn.regulon(regulator, mode)?;
    let mut result = compute_enrichment(gene_set, &regulon, universe, regulator)?;
    result.n_regs = Some(n_regs);
    Ok(result)
}

/// Enrichment of a gene set against every regulator of `trn` that targets at least one of
/// its genes, and combinations of up to `max_regs` such regulators.
///
/// Results are BH-corrected over the whole test set, filtered to `q < fdr` and ordered by
/// q-value, then by number of regulators.
pub fn compute_trn_enrichment(
    gene_set: &HashSet<&str>,
    universe: &HashSet<&str>,
    trn: &RegulatoryNetwork,
    max_regs: usize,
    fdr: f64,
    method: CombineMethod,
    force: bool,
) -> Result<Vec<Enrichment>> {
    if max_regs == 0 {
        return Err(ModulonError::precondition("max_regs must be at least 1"));
    }
    if max_regs > MAX_UNFORCED_REGULATORS && !force {
        return Err(ModulonError::precondition(format!(
            "Using more than {} regulators requires force = true (got max_regs = {})",
            MAX_UNFORCED_REGULATORS, max_regs
        )));
    }

    let regulators: Vec<&str> = trn
        .regulators()
        .into_iter()
        .filter(|reg| trn.targets(reg).iter().any(|g| gene_set.contains(g)))
        .collect();
    debug!(
        "{} regulators target the gene set of {} genes",
        regulators.len(),
        gene_set.len()
    );

    let mut results = Vec::new();
    for n_regs in 1..=max_regs {
        for group in regulators.iter().copied().combinations(n_regs) {
            if n_regs == 1 {
                let mut result = compute_enrichment(gene_set, &trn.targets(group[0]), universe, group[0])?;
                result.n_regs = Some(1);
                results.push(result);
                continue;
            }
            let regulons: Vec<HashSet<&str>> = group.iter().map(|reg| trn.targets(reg)).collect();
            if method.includes_and() {
                let genes = combine(&regulons, CombineMode::And);
                let mut result = compute_enrichment(gene_set, &genes, universe, &group.join("+"))?;
                result.n_regs = Some(n_regs);
                results.push(result);
            }
            if method.includes_or() {
                let genes = combine(&regulons, CombineMode::Or);
                let mut result = compute_enrichment(gene_set, &genes, universe, &group.join("/"))?;
                result.n_regs = Some(n_regs);
                results.push(result);
            }
        }
    }

    let mut results = filter_fdr(results, fdr)?;
    results.sort_by(|a, b| {
        a.q_value
            .partial_cmp(&b.q_value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.n_regs.cmp(&b.n_regs))
    });
    Ok(results)
}

fn combine<'a>(regulons: &[HashSet<&'a str>], mode: CombineMode) -> HashSet<&'a str> {
    let mut sets = regulons.iter();
    let first = sets.next().cloned().unwrap_or_default();
    sets.fold(first, |acc, next| match mode {
        CombineMode::Or => acc.union(next).copied().collect(),
        CombineMode::And => acc.intersection(next).copied().collect(),
    })
}
