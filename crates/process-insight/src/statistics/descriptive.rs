//! Descriptive statistics over plain `f64` samples.
//!
//! Conventions follow what analysts expect from spreadsheet and dataframe
//! tools: sample standard deviation (n − 1), linearly interpolated quantiles,
//! bias-corrected skewness and excess kurtosis. Undefined results are `NaN`.

use crate::error::Result;
use crate::types::Dataset;
use serde::{Deserialize, Serialize};

/// Arithmetic mean. `NaN` for an empty sample.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n − 1 denominator). `NaN` below two values.
pub fn variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64
}

/// Sample standard deviation (n − 1 denominator).
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Quantile of an already sorted sample with linear interpolation.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
    }
}

/// Quantile of an unsorted sample.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    quantile_sorted(&sorted_copy(values), q)
}

/// Copy of `values` sorted ascending (NaN-safe total order).
pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Bias-corrected sample skewness (G1). `NaN` below three values.
pub fn skewness(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 3 {
        return f64::NAN;
    }
    let m = mean(values);
    let nf = n as f64;
    let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / nf;
    let m3 = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / nf;
    if m2 == 0.0 {
        return 0.0;
    }
    let g1 = m3 / m2.powf(1.5);
    (nf * (nf - 1.0)).sqrt() / (nf - 2.0) * g1
}

/// Bias-corrected excess kurtosis (G2). `NaN` below four values.
pub fn kurtosis(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 4 {
        return f64::NAN;
    }
    let m = mean(values);
    let nf = n as f64;
    let s2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    let s4 = values.iter().map(|v| (v - m).powi(4)).sum::<f64>();
    if s2 == 0.0 {
        return 0.0;
    }
    let numerator = nf * (nf + 1.0) * (nf - 1.0) * s4;
    let denominator = (nf - 2.0) * (nf - 3.0) * s2 * s2;
    let adjustment = 3.0 * (nf - 1.0).powi(2) / ((nf - 2.0) * (nf - 3.0));
    numerator / denominator - adjustment
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        })
}

/// Summary of one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistics {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub q25: f64,
    pub q75: f64,
    pub skewness: f64,
    pub kurtosis: f64,
}

impl ColumnStatistics {
    /// Statistics of a non-empty sample. `None` when `values` is empty.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let sorted = sorted_copy(values);
        let (min, max) = min_max(values);
        Some(Self {
            count: values.len(),
            mean: mean(values),
            std: std_dev(values),
            min,
            max,
            median: quantile_sorted(&sorted, 0.5),
            q25: quantile_sorted(&sorted, 0.25),
            q75: quantile_sorted(&sorted, 0.75),
            skewness: skewness(values),
            kurtosis: kurtosis(values),
        })
    }

    /// Coefficient of variation |std / mean|, when defined.
    pub fn coefficient_of_variation(&self) -> Option<f64> {
        if self.std > 0.0 && self.mean != 0.0 {
            Some((self.std / self.mean).abs())
        } else {
            None
        }
    }
}

/// One row of the basic statistics table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicStatisticsRow {
    pub column: String,
    #[serde(flatten)]
    pub stats: ColumnStatistics,
    pub missing_count: usize,
    pub missing_percent: f64,
}

/// Basic statistics table for `columns`.
///
/// Columns that are absent or hold no values are skipped, matching how the
/// table is shown to users.
pub fn basic_statistics(data: &Dataset, columns: &[String]) -> Result<Vec<BasicStatisticsRow>> {
    let mut rows = Vec::with_capacity(columns.len());
    if data.is_empty() {
        return Ok(rows);
    }

    for column in columns {
        if !data.has_column(column) {
            continue;
        }
        let values = data.column_non_null(column)?;
        let Some(stats) = ColumnStatistics::from_values(&values) else {
            continue;
        };
        let missing_count = data.height() - values.len();
        rows.push(BasicStatisticsRow {
            column: column.clone(),
            stats,
            missing_count,
            missing_percent: missing_count as f64 / data.height() as f64 * 100.0,
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::{mean, quantile};
    use polars::prelude::*;

    fn approx(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    // ==================== moment tests ====================

    #[test]
    fn test_mean_and_std() {
        // Mean = 3, sample variance = 10 / 4 = 2.5
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(mean(&values), 3.0);
        assert!(approx(variance(&values), 2.5, 1e-12));
        assert!(approx(std_dev(&values), 2.5f64.sqrt(), 1e-12));
    }

    #[test]
    fn test_std_single_value_is_nan() {
        assert!(std_dev(&[5.0]).is_nan());
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn test_quantile_linear_interpolation() {
        let values = [1.0, 2.0, 3.0, 4.0];
        // position 0.75 between 1 and 2
        assert!(approx(quantile(&values, 0.25), 1.75, 1e-12));
        assert!(approx(quantile(&values, 0.5), 2.5, 1e-12));
        assert!(approx(quantile(&values, 0.75), 3.25, 1e-12));
        assert_eq!(quantile(&values, 0.0), 1.0);
        assert_eq!(quantile(&values, 1.0), 4.0);
    }

    #[test]
    fn test_skewness_symmetric_and_skewed() {
        assert!(approx(skewness(&[1.0, 2.0, 3.0, 4.0, 5.0]), 0.0, 1e-12));
        // Reference value: pandas Series([1, 2, 3, 10]).skew() = 1.7636...
        assert!(approx(skewness(&[1.0, 2.0, 3.0, 10.0]), 1.763_6, 1e-3));
        assert!(skewness(&[1.0, 2.0]).is_nan());
    }

    #[test]
    fn test_kurtosis_reference() {
        // Reference value: pandas Series([1, 2, 3, 4, 5]).kurt() = -1.2
        assert!(approx(kurtosis(&[1.0, 2.0, 3.0, 4.0, 5.0]), -1.2, 1e-12));
        assert_eq!(kurtosis(&[2.0, 2.0, 2.0, 2.0]), 0.0);
    }

    // ==================== table tests ====================

    #[test]
    fn test_column_statistics_from_values() {
        let stats = ColumnStatistics::from_values(&[4.0, 1.0, 3.0, 2.0, 5.0]).unwrap();
        assert_eq!(stats.count, 5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 5.0);
        assert_eq!(stats.median, 3.0);
        assert_eq!(stats.q25, 2.0);
        assert_eq!(stats.q75, 4.0);
        assert!(ColumnStatistics::from_values(&[]).is_none());
    }

    #[test]
    fn test_coefficient_of_variation() {
        let stats = ColumnStatistics::from_values(&[1.0, 2.0, 3.0]).unwrap();
        assert!(approx(stats.coefficient_of_variation().unwrap(), 0.5, 1e-12));
        let flat = ColumnStatistics::from_values(&[2.0, 2.0]).unwrap();
        assert!(flat.coefficient_of_variation().is_none());
    }

    #[test]
    fn test_basic_statistics_reports_missing() {
        let frame = df![
            "a" => [Some(1.0), None, Some(3.0), Some(5.0)],
            "empty" => [None::<f64>, None, None, None],
        ]
        .unwrap();
        let data = Dataset::from_frame(frame);
        let columns = vec!["a".to_string(), "empty".to_string(), "ghost".to_string()];

        let rows = basic_statistics(&data, &columns).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].column, "a");
        assert_eq!(rows[0].stats.count, 3);
        assert_eq!(rows[0].missing_count, 1);
        assert!(approx(rows[0].missing_percent, 25.0, 1e-12));
    }
}
