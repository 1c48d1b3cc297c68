//! D'Agostino-Pearson omnibus normality test.
//!
//! The statistic combines the skewness and kurtosis z-scores, `K² = Zs² + Zk²`, following the
//! formulas used by `scipy.stats.normaltest`. Moments are derived from running power sums so a
//! caller can drop observations one at a time and re-evaluate in constant time.

use crate::testing::TestResult;
use single_utilities::traits::FloatOps;
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Smallest sample for which the skewness test is defined.
pub const MIN_OBSERVATIONS: usize = 8;

/// Power sums of `x - shift`; central moments do not depend on the shift.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PowerSums {
    n: usize,
    shift: f64,
    s1: f64,
    s2: f64,
    s3: f64,
    s4: f64,
}

impl PowerSums {
    /// Accumulates `values`, shifted by their mean to limit cancellation.
    pub fn from_values(values: &[f64]) -> Self {
        let shift = if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        };
        let mut sums = PowerSums {
            shift,
            ..Default::default()
        };
        for &x in values {
            sums.push(x);
        }
        sums
    }

    pub fn push(&mut self, x: f64) {
        let d = x - self.shift;
        let d2 = d * d;
        self.n += 1;
        self.s1 += d;
        self.s2 += d2;
        self.s3 += d2 * d;
        self.s4 += d2 * d2;
    }

    pub fn remove(&mut self, x: f64) {
        let d = x - self.shift;
        let d2 = d * d;
        self.n -= 1;
        self.s1 -= d;
        self.s2 -= d2;
        self.s3 -= d2 * d;
        self.s4 -= d2 * d2;
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Biased central moments `(m2, m3, m4)`.
    pub fn central_moments(&self) -> (f64, f64, f64) {
        let n = self.n as f64;
        let mean = self.s1 / n;
        let r2 = self.s2 / n;
        let r3 = self.s3 / n;
        let r4 = self.s4 / n;
        let mean2 = mean * mean;
        let m2 = r2 - mean2;
        let m3 = r3 - 3.0 * mean * r2 + 2.0 * mean2 * mean;
        let m4 = r4 - 4.0 * mean * r3 + 6.0 * mean2 * r2 - 3.0 * mean2 * mean2;
        (m2, m3, m4)
    }
}

/// z-score of the sample skewness.
pub fn skew_z(sums: &PowerSums) -> Option<f64> {
    if sums.len() < MIN_OBSERVATIONS {
        return None;
    }
    let n = sums.len() as f64;
    let (m2, m3, _) = sums.central_moments();
    let b2 = m3 / m2.powf(1.5);

    let mut y = b2 * ((n + 1.0) * (n + 3.0) / (6.0 * (n - 2.0))).sqrt();
    let beta2 = 3.0 * (n * n + 27.0 * n - 70.0) * (n + 1.0) * (n + 3.0)
        / ((n - 2.0) * (n + 5.0) * (n + 7.0) * (n + 9.0));
    let w2 = -1.0 + (2.0 * (beta2 - 1.0)).sqrt();
    let delta = 1.0 / (0.5 * w2.ln()).sqrt();
    let alpha = (2.0 / (w2 - 1.0)).sqrt();
    if y == 0.0 {
        y = 1.0;
    }
    let ya = y / alpha;
    Some(delta * (ya + (ya * ya + 1.0).sqrt()).ln())
}

/// z-score of the sample kurtosis (Anscombe & Glynn).
pub fn kurtosis_z(sums: &PowerSums) -> Option<f64> {
    if sums.len() < MIN_OBSERVATIONS {
        return None;
    }
    let n = sums.len() as f64;
    let (m2, _, m4) = sums.central_moments();
    let b2 = m4 / (m2 * m2);

    let e = 3.0 * (n - 1.0) / (n + 1.0);
    let var_b2 =
        24.0 * n * (n - 2.0) * (n - 3.0) / ((n + 1.0) * (n + 1.0) * (n + 3.0) * (n + 5.0));
    let x = (b2 - e) / var_b2.sqrt();
    let sqrt_beta1 = 6.0 * (n * n - 5.0 * n + 2.0) / ((n + 7.0) * (n + 9.0))
        * (6.0 * (n + 3.0) * (n + 5.0) / (n * (n - 2.0) * (n - 3.0))).sqrt();
    let a = 6.0
        + 8.0 / sqrt_beta1 * (2.0 / sqrt_beta1 + (1.0 + 4.0 / (sqrt_beta1 * sqrt_beta1)).sqrt());
    let term1 = 1.0 - 2.0 / (9.0 * a);
    let denom = 1.0 + x * (2.0 / (a - 4.0)).sqrt();
    if denom == 0.0 {
        return Some(f64::NAN);
    }
    let term2 = denom.signum() * ((1.0 - 2.0 / a) / denom.abs()).powf(1.0 / 3.0);
    Some((term1 - term2) / (2.0 / (9.0 * a)).sqrt())
}

/// The omnibus statistic `K²`, or `None` below [`MIN_OBSERVATIONS`].
pub fn k_squared(sums: &PowerSums) -> Option<f64> {
    let zs = skew_z(sums)?;
    let zk = kurtosis_z(sums)?;
    Some(zs * zs + zk * zk)
}

/// Tests the null hypothesis that `values` come from a normal distribution.
///
/// # Returns
///
/// `TestResult` with `K²` as statistic, the chi-squared (2 df) p-value, and the two component
/// z-scores as `skew_z` / `kurtosis_z` metadata.
pub fn dagostino_pearson<T>(values: &[T]) -> anyhow::Result<TestResult<f64>>
where
    T: FloatOps,
{
    if values.len() < MIN_OBSERVATIONS {
        return Err(anyhow::anyhow!(
            "normality test requires at least {} observations, got {}",
            MIN_OBSERVATIONS,
            values.len()
        ));
    }
    let values: Vec<f64> = values
        .iter()
        .map(|v| v.to_f64().unwrap_or(f64::NAN))
        .collect();
    let sums = PowerSums::from_values(&values);
    let zs = skew_z(&sums).unwrap_or(f64::NAN);
    let zk = kurtosis_z(&sums).unwrap_or(f64::NAN);
    let k2 = zs * zs + zk * zk;

    let p_value = match ChiSquared::new(2.0) {
        Ok(chi) if k2.is_finite() => chi.sf(k2),
        _ => f64::NAN,
    };

    Ok(TestResult::new(k2, p_value)
        .with_metadata("skew_z", zs)
        .with_metadata("kurtosis_z", zk))
}
