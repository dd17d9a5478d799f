//! Pearson correlation: matrices, significance and highlighted pairs.

use crate::error::{AnalysisError, Result};
use crate::types::Dataset;
use anofox_statistics::correlation as cor;
use serde::{Deserialize, Serialize};

/// Pearson r with its two-sided p-value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PearsonOutcome {
    pub r: f64,
    pub p_value: f64,
}

/// Pearson test of two equally long samples. `None` below three points or
/// when either sample is constant.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<PearsonOutcome> {
    let n = x.len().min(y.len());
    if n < 3 {
        return None;
    }
    let result = cor::pearson(&x[..n], &y[..n], None).ok()?;
    if !result.estimate.is_finite() {
        return None;
    }
    Some(PearsonOutcome {
        r: result.estimate,
        p_value: result.p_value,
    })
}

/// Pearson r, `NaN` where [`pearson`] is undefined.
pub fn pearson_r(x: &[f64], y: &[f64]) -> f64 {
    pearson(x, y).map_or(f64::NAN, |outcome| outcome.r)
}

fn is_constant(values: &[f64]) -> bool {
    values.iter().all(|v| *v == values[0])
}

/// Rows where both columns have a value.
fn complete_pairs(x: &[Option<f64>], y: &[Option<f64>]) -> (Vec<f64>, Vec<f64>) {
    x.iter()
        .zip(y)
        .filter_map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) if !a.is_nan() && !b.is_nan() => Some((*a, *b)),
            _ => None,
        })
        .unzip()
}

fn columns_or_err(data: &Dataset, columns: &[String]) -> Result<Vec<Vec<Option<f64>>>> {
    columns
        .iter()
        .map(|name| {
            if data.has_column(name) {
                data.column_values(name)
            } else {
                Err(AnalysisError::ColumnNotFound(name.clone()))
            }
        })
        .collect()
}

// =============================================================================
// Matrix
// =============================================================================

/// Square correlation matrix with labelled rows and columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Row-major values; `NaN` where undefined.
    pub values: Vec<Vec<f64>>,
}

/// A highlighted pair from a correlation matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedPair {
    pub first: String,
    pub second: String,
    pub correlation: f64,
}

impl CorrelationMatrix {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Correlation between two named columns.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        Some(self.values[i][j])
    }

    /// Upper-triangle pairs with `|r| > threshold`, in matrix order, at most `limit`.
    pub fn strong_pairs(&self, threshold: f64, limit: usize) -> Vec<CorrelatedPair> {
        let mut pairs = Vec::new();
        for i in 0..self.len() {
            for j in (i + 1)..self.len() {
                let r = self.values[i][j];
                if r.abs() > threshold {
                    pairs.push(CorrelatedPair {
                        first: self.columns[i].clone(),
                        second: self.columns[j].clone(),
                        correlation: r,
                    });
                }
            }
        }
        pairs.truncate(limit);
        pairs
    }

    /// Copy with every value rounded to `decimals` places.
    pub fn rounded(&self, decimals: i32) -> CorrelationMatrix {
        let factor = 10f64.powi(decimals);
        CorrelationMatrix {
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .map(|row| row.iter().map(|v| (v * factor).round() / factor).collect())
                .collect(),
        }
    }
}

/// Pairwise-complete Pearson correlation matrix of `columns`.
pub fn correlation_matrix(data: &Dataset, columns: &[String]) -> Result<CorrelationMatrix> {
    if data.is_empty() {
        return Ok(CorrelationMatrix::default());
    }
    let series = columns_or_err(data, columns)?;
    let k = columns.len();
    let mut values = vec![vec![f64::NAN; k]; k];

    for i in 0..k {
        for j in i..k {
            let (x, y) = complete_pairs(&series[i], &series[j]);
            let r = if i != j {
                pearson_r(&x, &y)
            } else if x.len() >= 2 && !is_constant(&x) {
                1.0
            } else {
                f64::NAN
            };
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    Ok(CorrelationMatrix {
        columns: columns.to_vec(),
        values,
    })
}

// =============================================================================
// Significance
// =============================================================================

/// Correlation of one column pair with its significance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationSignificance {
    pub first: String,
    pub second: String,
    pub correlation: f64,
    pub p_value: f64,
    pub sample_size: usize,
    pub significant_005: bool,
    pub significant_001: bool,
}

impl CorrelationSignificance {
    /// `first_vs_second`
    pub fn label(&self) -> String {
        format!("{}_vs_{}", self.first, self.second)
    }
}

/// Pearson r and p-value for every pair `i < j` with more than two complete rows.
///
/// `alpha` and `strict_alpha` set the two significance flags.
pub fn correlation_with_significance(
    data: &Dataset,
    columns: &[String],
    alpha: f64,
    strict_alpha: f64,
) -> Result<Vec<CorrelationSignificance>> {
    if data.is_empty() || columns.len() < 2 {
        return Ok(Vec::new());
    }
    let series = columns_or_err(data, columns)?;
    let mut results = Vec::new();

    for i in 0..columns.len() {
        for j in (i + 1)..columns.len() {
            let (x, y) = complete_pairs(&series[i], &series[j]);
            if x.len() <= 2 {
                continue;
            }
            let (r, p) = pearson(&x, &y).map_or((f64::NAN, f64::NAN), |o| (o.r, o.p_value));
            results.push(CorrelationSignificance {
                first: columns[i].clone(),
                second: columns[j].clone(),
                correlation: r,
                p_value: p,
                sample_size: x.len(),
                significant_005: p < alpha,
                significant_001: p < strict_alpha,
            });
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn approx(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    fn sample() -> Dataset {
        let frame = df![
            "x" => [1.0, 2.0, 3.0, 4.0, 5.0],
            "double" => [2.0, 4.0, 6.0, 8.0, 10.0],
            "inverse" => [5.0, 4.0, 3.0, 2.0, 1.0],
            "gappy" => [Some(1.0), None, Some(2.0), Some(1.0), Some(3.0)],
            "flat" => [7.0, 7.0, 7.0, 7.0, 7.0],
        ]
        .unwrap();
        Dataset::from_frame(frame)
    }

    #[test]
    fn test_pearson_basics() {
        assert!(approx(pearson_r(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]), 1.0, 1e-12));
        assert!(approx(pearson_r(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]), -1.0, 1e-12));
        assert!(pearson_r(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_nan());
        assert!(pearson(&[1.0, 2.0], &[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_pearson_reference() {
        // r = 0.8, t = 0.8 * sqrt(3 / 0.36) = 2.3094, p = 0.1041
        let out = pearson(&[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 1.0, 4.0, 3.0, 5.0]).unwrap();
        assert!(approx(out.r, 0.8, 1e-12));
        assert!(approx(out.p_value, 0.104_1, 1e-3));
    }

    #[test]
    fn test_matrix_is_pairwise_complete() {
        let data = sample();
        let m = correlation_matrix(&data, &names(&["x", "double", "inverse", "gappy", "flat"]))
            .unwrap();

        assert_eq!(m.len(), 5);
        assert!(approx(m.get("x", "double").unwrap(), 1.0, 1e-12));
        assert!(approx(m.get("x", "inverse").unwrap(), -1.0, 1e-12));
        // x restricted to rows 0, 2, 3, 4 = [1, 3, 4, 5] vs [1, 2, 1, 3]
        let expected = pearson_r(&[1.0, 3.0, 4.0, 5.0], &[1.0, 2.0, 1.0, 3.0]);
        assert!(approx(m.get("x", "gappy").unwrap(), expected, 1e-12));
        assert!(m.get("flat", "flat").unwrap().is_nan());
        assert_eq!(m.get("gappy", "gappy"), Some(1.0));
    }

    #[test]
    fn test_matrix_missing_column() {
        let err = correlation_matrix(&sample(), &names(&["x", "ghost"])).unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_strong_pairs_and_rounding() {
        let data = sample();
        let m = correlation_matrix(&data, &names(&["x", "double", "inverse"])).unwrap();
        let pairs = m.strong_pairs(0.7, 10);
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].first, "x");
        assert_eq!(pairs[0].second, "double");
        assert_eq!(m.strong_pairs(0.7, 2).len(), 2);

        let rounded = correlation_matrix(&data, &names(&["x", "gappy"]))
            .unwrap()
            .rounded(3);
        let r = rounded.values[0][1];
        assert_eq!((r * 1000.0).round() / 1000.0, r);
    }

    #[test]
    fn test_correlation_with_significance() {
        let data = sample();
        let results =
            correlation_with_significance(&data, &names(&["x", "double", "gappy"]), 0.05, 0.01)
                .unwrap();
        assert_eq!(results.len(), 3);

        let perfect = &results[0];
        assert_eq!(perfect.label(), "x_vs_double");
        assert_eq!(perfect.p_value, 0.0);
        assert!(perfect.significant_005 && perfect.significant_001);

        let gappy = results.iter().find(|r| r.second == "gappy").unwrap();
        assert_eq!(gappy.sample_size, 4);

        let single = correlation_with_significance(&data, &names(&["x"]), 0.05, 0.01).unwrap();
        assert!(single.is_empty());
    }
}
