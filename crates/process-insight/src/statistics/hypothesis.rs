//! Two-sample hypothesis tests and the distribution helpers behind them.

use crate::error::{AnalysisError, Result};
use crate::statistics::descriptive::{mean, std_dev, variance};
use crate::types::{Dataset, TimeRange};
use anofox_statistics::nonparametric::wilcoxon::mann_whitney_u as rank_sum_test;
use anofox_statistics::parametric::ttest::{Alternative, TTestKind, t_test};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, Normal};

/// Both samples at or below this size, without ties, get the exact U distribution.
const MANN_WHITNEY_EXACT_MAX: usize = 8;

// =============================================================================
// Distribution helpers
// =============================================================================

/// Standard normal CDF.
pub(crate) fn normal_cdf(z: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(dist) => dist.cdf(z),
        Err(_) => f64::NAN,
    }
}

/// Two-sided p-value of a variance ratio.
fn f_two_sided_p(f: f64, df1: f64, df2: f64) -> f64 {
    if f.is_nan() || df1 <= 0.0 || df2 <= 0.0 {
        return f64::NAN;
    }
    if f.is_infinite() {
        return 0.0;
    }
    match FisherSnedecor::new(df1, df2) {
        Ok(dist) => {
            let cdf = dist.cdf(f);
            2.0 * cdf.min(1.0 - cdf)
        }
        Err(_) => f64::NAN,
    }
}

// =============================================================================
// Tests
// =============================================================================

/// Statistic and p-value of one test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub statistic: f64,
    pub p_value: f64,
    /// `p_value` below the significance level (false when p is undefined).
    pub significant: bool,
}

impl TestOutcome {
    fn new(statistic: f64, p_value: f64, alpha: f64) -> Self {
        Self {
            statistic,
            p_value,
            significant: p_value < alpha,
        }
    }
}

/// Student's two-sample t-test with pooled variance. Needs two values per window.
pub fn pooled_t_test(a: &[f64], b: &[f64], alpha: f64) -> Option<TestOutcome> {
    let result = t_test(a, b, TTestKind::Student, Alternative::TwoSided, 0.0, None).ok()?;
    Some(TestOutcome::new(result.statistic, result.p_value, alpha))
}

/// F-test for equal variances, `F = var(a) / var(b)`.
///
/// A zero variance in `b` gives an infinite statistic.
pub fn variance_ratio_test(a: &[f64], b: &[f64], alpha: f64) -> Option<TestOutcome> {
    if a.len() < 2 || b.len() < 2 {
        return None;
    }
    let var_b = variance(b);
    let f = if var_b != 0.0 {
        variance(a) / var_b
    } else {
        f64::INFINITY
    };
    let p = f_two_sided_p(f, (a.len() - 1) as f64, (b.len() - 1) as f64);
    Some(TestOutcome::new(f, p, alpha))
}

fn has_ties(a: &[f64], b: &[f64]) -> bool {
    let mut combined: Vec<f64> = a.iter().chain(b).copied().collect();
    combined.sort_by(f64::total_cmp);
    combined.windows(2).any(|w| w[0] == w[1])
}

/// Two-sided Mann-Whitney U test; the statistic is U for `a`.
///
/// Small samples without ties use the exact distribution of U, everything
/// else the tie-corrected normal approximation with continuity correction.
pub fn mann_whitney_u(a: &[f64], b: &[f64], alpha: f64) -> Option<TestOutcome> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let exact = a.len() <= MANN_WHITNEY_EXACT_MAX
        && b.len() <= MANN_WHITNEY_EXACT_MAX
        && !has_ties(a, b);
    let result = rank_sum_test(a, b, Alternative::TwoSided, true, exact, None, None).ok()?;
    Some(TestOutcome::new(
        result.statistic,
        result.p_value.clamp(0.0, 1.0),
        alpha,
    ))
}

// =============================================================================
// Period comparison
// =============================================================================

/// Summary of one comparison window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl PeriodSummary {
    fn new(range: &TimeRange, values: &[f64]) -> Self {
        Self {
            start: range.start,
            end: range.end,
            count: values.len(),
            mean: mean(values),
            std: std_dev(values),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Two windows of one column compared side by side.
///
/// A test is `None` when the windows are too small for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodComparison {
    pub column: String,
    pub period1: PeriodSummary,
    pub period2: PeriodSummary,
    pub t_test: Option<TestOutcome>,
    pub f_test: Option<TestOutcome>,
    pub mann_whitney: Option<TestOutcome>,
}

/// Compare `column` over two inclusive time windows.
///
/// Returns `Ok(None)` when the index is not temporal or either window holds
/// no values.
pub fn compare_periods(
    data: &Dataset,
    column: &str,
    period1: &TimeRange,
    period2: &TimeRange,
    alpha: f64,
) -> Result<Option<PeriodComparison>> {
    if !data.has_column(column) {
        return Err(AnalysisError::ColumnNotFound(column.to_string()));
    }
    let Some(stamps) = data.index().timestamps() else {
        return Ok(None);
    };
    let values = data.column_values(column)?;

    let window = |range: &TimeRange| -> Vec<f64> {
        stamps
            .iter()
            .zip(&values)
            .filter(|(ts, _)| range.contains(ts))
            .filter_map(|(_, v)| v.filter(|x| !x.is_nan()))
            .collect()
    };
    let first = window(period1);
    let second = window(period2);
    if first.is_empty() || second.is_empty() {
        return Ok(None);
    }

    Ok(Some(PeriodComparison {
        column: column.to_string(),
        period1: PeriodSummary::new(period1, &first),
        period2: PeriodSummary::new(period2, &second),
        t_test: pooled_t_test(&first, &second, alpha),
        f_test: variance_ratio_test(&first, &second, alpha),
        mann_whitney: mann_whitney_u(&first, &second, alpha),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowIndex;
    use chrono::NaiveDate;
    use polars::prelude::*;

    fn approx(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_normal_cdf() {
        assert!(approx(normal_cdf(0.0), 0.5, 1e-12));
        assert!(approx(normal_cdf(1.959_964), 0.975, 1e-6));
    }

    #[test]
    fn test_pooled_t_test() {
        // Means 2 and 5, both variances 1: t = -3 / sqrt(1 * (2/3)) = -3.674
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        let out = pooled_t_test(&a, &b, 0.05).unwrap();
        assert!(approx(out.statistic, -3.674_235, 1e-5));
        // scipy.stats.ttest_ind reference p = 0.02131
        assert!(approx(out.p_value, 0.021_31, 1e-4));
        assert!(out.significant);
        assert!(pooled_t_test(&a, &[7.0], 0.05).is_none());
    }

    #[test]
    fn test_variance_ratio_test() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let out = variance_ratio_test(&a, &a, 0.05).unwrap();
        assert!(approx(out.statistic, 1.0, 1e-12));
        assert!(approx(out.p_value, 1.0, 1e-9));
        assert!(!out.significant);

        let flat = variance_ratio_test(&a, &[2.0, 2.0, 2.0], 0.05).unwrap();
        assert!(flat.statistic.is_infinite());
        assert_eq!(flat.p_value, 0.0);
    }

    #[test]
    fn test_mann_whitney_exact_small_samples() {
        // Exact null distribution: P(U = 0) = 1 / C(8, 4), doubled
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [5.0, 6.0, 7.0, 8.0];
        let out = mann_whitney_u(&a, &b, 0.05).unwrap();
        assert_eq!(out.statistic, 0.0);
        assert!(approx(out.p_value, 2.0 / 70.0, 1e-4));
        assert!(out.significant);
    }

    #[test]
    fn test_mann_whitney_separated_samples() {
        let a: Vec<f64> = (0..20).map(f64::from).collect();
        let b: Vec<f64> = (100..120).map(f64::from).collect();
        let out = mann_whitney_u(&a, &b, 0.05).unwrap();
        assert_eq!(out.statistic, 0.0);
        assert!(out.p_value < 1e-6);
        assert!(out.significant);
    }

    #[test]
    fn test_mann_whitney_identical_samples() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = mann_whitney_u(&a, &a, 0.05).unwrap();
        assert_eq!(out.statistic, 12.5);
        assert!(out.p_value > 0.9);
        assert!(!out.significant);
    }

    #[test]
    fn test_tie_detection() {
        assert!(has_ties(&[1.0, 2.0], &[2.0, 3.0]));
        assert!(!has_ties(&[1.0, 2.0], &[3.0, 4.0]));
    }

    #[test]
    fn test_compare_periods() {
        let day = |d: u32| {
            NaiveDate::from_ymd_opt(2024, 2, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        };
        let frame = df!["v" => [1.0, 2.0, 3.0, 10.0, 11.0, 12.0]].unwrap();
        let index = RowIndex::Timestamps((1..=6).map(day).collect());
        let data = Dataset::new("date", index, frame).unwrap();

        let cmp = compare_periods(
            &data,
            "v",
            &TimeRange::new(day(1), day(3)),
            &TimeRange::new(day(4), day(6)),
            0.05,
        )
        .unwrap()
        .unwrap();
        assert_eq!(cmp.period1.count, 3);
        assert_eq!(cmp.period2.mean, 11.0);
        assert!(cmp.t_test.unwrap().significant);

        let empty = compare_periods(
            &data,
            "v",
            &TimeRange::new(day(1), day(3)),
            &TimeRange::new(day(20), day(21)),
            0.05,
        )
        .unwrap();
        assert!(empty.is_none());

        let labelled = Dataset::from_frame(data.frame().clone());
        assert!(
            compare_periods(
                &labelled,
                "v",
                &TimeRange::new(day(1), day(3)),
                &TimeRange::new(day(4), day(6)),
                0.05
            )
            .unwrap()
            .is_none()
        );
    }
}
