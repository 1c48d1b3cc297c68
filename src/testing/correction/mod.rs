//! Multiple testing correction for enrichment p-values.

use anyhow::{Result, anyhow};
use std::cmp::Ordering;

/// Benjamini-Hochberg adjusted p-values (q-values), in input order.
///
/// Controls the false discovery rate over a family of independent or positively dependent
/// tests. Each q-value is `min(1, min_{j >= i} p_(j) * n / j)` over the sorted p-values.
///
/// # Example
/// ```
/// use single_imodulon::testing::correction::benjamini_hochberg_correction;
///
/// let q = benjamini_hochberg_correction(&[0.01, 0.04, 0.03]).unwrap();
/// assert!((q[0] - 0.03).abs() < 1e-12);
/// assert!((q[1] - 0.04).abs() < 1e-12);
/// ```
pub fn benjamini_hochberg_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    let n = p_values.len();
    if n == 0 {
        return Err(anyhow!("Empty p-value array"));
    }
    if let Some((i, p)) = p_values
        .iter()
        .enumerate()
        .find(|(_, p)| !(0.0..=1.0).contains(*p))
    {
        return Err(anyhow!("Invalid p-value at index {}: {}", i, p));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| p_values[a].partial_cmp(&p_values[b]).unwrap_or(Ordering::Equal));

    // step up from the largest p-value so the q-values stay monotone
    let mut adjusted = vec![0.0; n];
    let mut running_min = 1.0_f64;
    for (rank, &i) in order.iter().enumerate().rev() {
        let scaled = (p_values[i] * n as f64 / (rank + 1) as f64).min(1.0);
        running_min = running_min.min(scaled);
        adjusted[i] = running_min;
    }
    Ok(adjusted)
}
