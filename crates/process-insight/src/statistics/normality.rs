//! Normality tests: Shapiro-Wilk, Kolmogorov-Smirnov and Anderson-Darling.

use crate::error::{ComputationWarning, Result, WarningKind};
use crate::statistics::descriptive::{mean, sorted_copy, std_dev};
use crate::statistics::hypothesis::normal_cdf;
use crate::types::Dataset;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Smallest sample the Anderson-Darling test accepts.
pub const AD_MIN_SAMPLES: usize = 8;

/// Largest sample for the exact Kolmogorov distribution.
const KS_EXACT_MAX_N: usize = 1000;

/// Shapiro-Wilk W and p-value. `None` when the test rejects the sample
/// (fewer than three or more than 5000 values, a constant sample, NaN).
pub fn shapiro_wilk(data: &[f64]) -> Option<(f64, f64)> {
    if data.iter().any(|v| v.is_nan()) {
        return None;
    }
    let result = ::normality::shapiro_wilk(data.to_vec()).ok()?;
    Some((result.statistic, result.p_value)).filter(|(w, p)| w.is_finite() && p.is_finite())
}

// =============================================================================
// Kolmogorov-Smirnov against N(mean, std)
// =============================================================================

/// KS statistic D against a normal with the sample's mean and std, and its
/// two-sided p-value.
///
/// Up to [`KS_EXACT_MAX_N`] values the p-value comes from the exact
/// distribution of D; larger samples use the Kolmogorov limit with
/// Stephens' adjustment.
pub fn kolmogorov_smirnov(data: &[f64]) -> Option<(f64, f64)> {
    let n = data.len();
    let sd = std_dev(data);
    if n < 2 || sd.is_nan() || sd <= 0.0 {
        return None;
    }
    let mu = mean(data);
    let nf = n as f64;

    let d = sorted_copy(data)
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let f = normal_cdf((v - mu) / sd);
            ((i as f64 + 1.0) / nf - f).max(f - i as f64 / nf)
        })
        .fold(0.0, f64::max);

    let p = if n <= KS_EXACT_MAX_N {
        ks_exact_sf(n, d)
    } else {
        ks_asymptotic_sf(n, d)
    };
    Some((d, p.clamp(0.0, 1.0)))
}

fn ks_asymptotic_sf(n: usize, d: f64) -> f64 {
    let en = (n as f64).sqrt();
    let lambda = (en + 0.12 + 0.11 / en) * d;
    let mut p = 0.0;
    for k in 1..=100 {
        let kf = k as f64;
        let term = 2.0 * (-2.0 * kf * kf * lambda * lambda).exp();
        p += if k % 2 == 1 { term } else { -term };
        if term < 1e-12 {
            break;
        }
    }
    p
}

/// `P(D_n >= d)`.
fn ks_exact_sf(n: usize, d: f64) -> f64 {
    let nf = n as f64;
    let nd2 = nf * d * d;
    // Far tail: the exact value is below any p-value that matters.
    if nd2 > 7.24 || (nd2 > 3.76 && n > 99) {
        return 2.0 * (-(2.000071 + 0.331 / nf.sqrt() + 1.409 / nf) * nd2).exp();
    }
    1.0 - kolmogorov_cdf(n, d)
}

/// `P(D_n < d)` (Marsaglia, Tsang and Wang, 2003).
fn kolmogorov_cdf(n: usize, d: f64) -> f64 {
    let nf = n as f64;
    if d <= 0.0 {
        return 0.0;
    }
    if d >= 1.0 {
        return 1.0;
    }
    let k = (nf * d) as usize + 1;
    let m = 2 * k - 1;
    let h = k as f64 - nf * d;

    let mut hm = vec![0.0; m * m];
    for i in 0..m {
        for j in 0..m {
            if i + 1 >= j {
                hm[i * m + j] = 1.0;
            }
        }
    }
    for i in 0..m {
        hm[i * m] -= h.powi(i as i32 + 1);
        hm[(m - 1) * m + i] -= h.powi((m - i) as i32);
    }
    if 2.0 * h - 1.0 > 0.0 {
        hm[(m - 1) * m] += (2.0 * h - 1.0).powi(m as i32);
    }
    for i in 0..m {
        for j in 0..=i {
            for g in 1..=(i + 1 - j) {
                hm[i * m + j] /= g as f64;
            }
        }
    }

    let (q, mut exponent) = matrix_power(&hm, 0, m, n);
    let mut s = q[(k - 1) * m + k - 1];
    for i in 1..=n {
        s = s * i as f64 / nf;
        if s < 1e-140 {
            s *= 1e140;
            exponent -= 140;
        }
    }
    s * 10f64.powi(exponent)
}

fn matrix_mul(a: &[f64], b: &[f64], m: usize) -> Vec<f64> {
    let mut out = vec![0.0; m * m];
    for i in 0..m {
        for k in 0..m {
            let aik = a[i * m + k];
            if aik == 0.0 {
                continue;
            }
            for j in 0..m {
                out[i * m + j] += aik * b[k * m + j];
            }
        }
    }
    out
}

/// `a^n` as a mantissa matrix and a power-of-ten exponent.
fn matrix_power(a: &[f64], a_exp: i32, m: usize, n: usize) -> (Vec<f64>, i32) {
    if n == 1 {
        return (a.to_vec(), a_exp);
    }
    let (half, half_exp) = matrix_power(a, a_exp, m, n / 2);
    let squared = matrix_mul(&half, &half, m);
    let (mut v, mut exp) = if n % 2 == 0 {
        (squared, 2 * half_exp)
    } else {
        (matrix_mul(a, &squared, m), a_exp + 2 * half_exp)
    };
    if v[(m / 2) * m + m / 2] > 1e140 {
        v.iter_mut().for_each(|x| *x *= 1e-140);
        exp += 140;
    }
    (v, exp)
}

// =============================================================================
// Anderson-Darling
// =============================================================================

/// Anderson-Darling outcome with the 5% critical value for the sample size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AndersonDarling {
    pub statistic: f64,
    pub p_value: f64,
    pub critical_5pct: f64,
}

/// 5% critical value of A² for a normal with estimated parameters.
pub fn anderson_darling_critical(n: usize) -> f64 {
    let nf = n as f64;
    0.787 / (1.0 + 4.0 / nf - 25.0 / (nf * nf))
}

/// A² with its p-value. `None` below eight values or for a constant sample.
pub fn anderson_darling(data: &[f64]) -> Option<AndersonDarling> {
    let result = ::normality::anderson_darling(data.to_vec()).ok()?;
    if !result.statistic.is_finite() {
        return None;
    }
    Some(AndersonDarling {
        statistic: result.statistic,
        p_value: result.p_value,
        critical_5pct: anderson_darling_critical(data.len()),
    })
}

// =============================================================================
// Per-column table
// =============================================================================

/// Normality tests of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalityResult {
    pub column: String,
    pub sample_size: usize,
    pub shapiro_statistic: f64,
    pub shapiro_p_value: f64,
    pub shapiro_normal: bool,
    pub ks_statistic: f64,
    pub ks_p_value: f64,
    pub ks_normal: bool,
    /// Anderson-Darling needs [`AD_MIN_SAMPLES`] values; `None` below that.
    pub ad_statistic: Option<f64>,
    pub ad_p_value: Option<f64>,
    pub ad_critical_5pct: Option<f64>,
    pub ad_normal: Option<bool>,
}

impl NormalityResult {
    /// Every test that ran accepts normality.
    pub fn is_normal(&self) -> bool {
        self.shapiro_normal && self.ks_normal && self.ad_normal.unwrap_or(true)
    }
}

/// Normality table plus the columns that could not be tested.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalityReport {
    pub results: Vec<NormalityResult>,
    pub warnings: Vec<ComputationWarning>,
}

/// Run the three tests on every column with at least three values.
///
/// Shapiro-Wilk uses the first `max_samples` values; Anderson-Darling is
/// skipped below [`AD_MIN_SAMPLES`]. A column where a test that should run
/// cannot be computed is left out and reported as a warning.
pub fn normality_tests(
    data: &Dataset,
    columns: &[String],
    max_samples: usize,
    alpha: f64,
) -> Result<NormalityReport> {
    let mut report = NormalityReport::default();
    if data.is_empty() {
        return Ok(report);
    }

    for column in columns {
        if !data.has_column(column) {
            continue;
        }
        let values = data.column_non_null(column)?;
        if values.len() < 3 {
            continue;
        }

        let head = &values[..values.len().min(max_samples)];
        let tests = shapiro_wilk(head).ok_or("Shapiro-Wilk").and_then(|sw| {
            let ks = kolmogorov_smirnov(&values).ok_or("Kolmogorov-Smirnov")?;
            let ad = if values.len() >= AD_MIN_SAMPLES {
                Some(anderson_darling(&values).ok_or("Anderson-Darling")?)
            } else {
                None
            };
            Ok((sw, ks, ad))
        });

        match tests {
            Ok(((w, sw_p), (d, ks_p), ad)) => {
                report.results.push(NormalityResult {
                    column: column.clone(),
                    sample_size: values.len(),
                    shapiro_statistic: w,
                    shapiro_p_value: sw_p,
                    shapiro_normal: sw_p > alpha,
                    ks_statistic: d,
                    ks_p_value: ks_p,
                    ks_normal: ks_p > alpha,
                    ad_statistic: ad.map(|a| a.statistic),
                    ad_p_value: ad.map(|a| a.p_value),
                    ad_critical_5pct: ad.map(|a| a.critical_5pct),
                    ad_normal: ad.map(|a| a.statistic < a.critical_5pct),
                });
            }
            Err(test) => {
                let warning = ComputationWarning::new(
                    WarningKind::NormalityTest,
                    format!("{} test could not be computed for '{}'", test, column),
                );
                warn!("{}", warning);
                report.warnings.push(warning);
            }
        }
    }

    Ok(report)
}
