//! Outlier methods and threshold computation.

use crate::error::AnalysisError;
use crate::statistics::descriptive::{mean, quantile_sorted, sorted_copy, std_dev};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Statistical rule used to flag outliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutlierMethod {
    /// Outside `[Q1 − m·IQR, Q3 + m·IQR]`
    #[default]
    #[serde(rename = "iqr")]
    Iqr,
    /// Outside `[mean − m·std, mean + m·std]`
    #[serde(rename = "zscore")]
    ZScore,
}

impl OutlierMethod {
    /// Machine name accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Iqr => "iqr",
            Self::ZScore => "zscore",
        }
    }

    /// Human readable name used in history tables and reports.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Iqr => "IQR",
            Self::ZScore => "Z-score",
        }
    }
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutlierMethod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iqr" => Ok(Self::Iqr),
            "zscore" | "z-score" | "z_score" => Ok(Self::ZScore),
            _ => Err(AnalysisError::UnsupportedMethod(s.to_string())),
        }
    }
}

/// Inclusive keep-interval for one column. Values strictly outside are outliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    /// Bounds from the non-null `values` of a column.
    ///
    /// An empty sample (or a single value under z-score) yields `NaN` bounds,
    /// which flag nothing.
    pub fn compute(values: &[f64], method: OutlierMethod, multiplier: f64) -> Self {
        match method {
            OutlierMethod::Iqr => {
                let sorted = sorted_copy(values);
                let q1 = quantile_sorted(&sorted, 0.25);
                let q3 = quantile_sorted(&sorted, 0.75);
                let iqr = q3 - q1;
                Self {
                    lower: q1 - multiplier * iqr,
                    upper: q3 + multiplier * iqr,
                }
            }
            OutlierMethod::ZScore => {
                let m = mean(values);
                let s = std_dev(values);
                Self {
                    lower: m - multiplier * s,
                    upper: m + multiplier * s,
                }
            }
        }
    }

    #[inline]
    pub fn is_outlier(&self, value: f64) -> bool {
        value < self.lower || value > self.upper
    }

    /// Per-row outlier flags. Missing values are never flagged.
    pub fn mask(&self, values: &[Option<f64>]) -> Vec<bool> {
        values
            .iter()
            .map(|v| v.is_some_and(|val| self.is_outlier(val)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_from_str() {
        assert_eq!("iqr".parse::<OutlierMethod>().unwrap(), OutlierMethod::Iqr);
        assert_eq!("ZScore".parse::<OutlierMethod>().unwrap(), OutlierMethod::ZScore);
        assert_eq!("z-score".parse::<OutlierMethod>().unwrap(), OutlierMethod::ZScore);

        let err = "mad".parse::<OutlierMethod>().unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_METHOD");
    }

    #[test]
    fn test_method_serde_names() {
        assert_eq!(serde_json::to_string(&OutlierMethod::ZScore).unwrap(), "\"zscore\"");
        let parsed: OutlierMethod = serde_json::from_str("\"iqr\"").unwrap();
        assert_eq!(parsed, OutlierMethod::Iqr);
    }

    #[test]
    fn test_iqr_bounds() {
        // Q1 = 2, Q3 = 4, IQR = 2
        let bounds = OutlierBounds::compute(&[1.0, 2.0, 3.0, 4.0, 5.0], OutlierMethod::Iqr, 1.5);
        assert_eq!(bounds.lower, -1.0);
        assert_eq!(bounds.upper, 7.0);
        assert!(bounds.is_outlier(7.5));
        assert!(!bounds.is_outlier(7.0));
    }

    #[test]
    fn test_zscore_bounds() {
        // mean = 3, std = sqrt(2.5)
        let bounds = OutlierBounds::compute(&[1.0, 2.0, 3.0, 4.0, 5.0], OutlierMethod::ZScore, 2.0);
        let s = 2.5f64.sqrt();
        assert!((bounds.lower - (3.0 - 2.0 * s)).abs() < 1e-12);
        assert!((bounds.upper - (3.0 + 2.0 * s)).abs() < 1e-12);
    }

    #[test]
    fn test_mask_keeps_nulls() {
        let bounds = OutlierBounds { lower: 0.0, upper: 10.0 };
        let mask = bounds.mask(&[Some(5.0), None, Some(-1.0), Some(11.0), Some(10.0)]);
        assert_eq!(mask, vec![false, false, true, true, false]);
    }

    #[test]
    fn test_empty_sample_flags_nothing() {
        let bounds = OutlierBounds::compute(&[], OutlierMethod::Iqr, 1.5);
        assert!(bounds.lower.is_nan());
        assert_eq!(bounds.mask(&[Some(1.0), Some(1e9)]), vec![false, false]);
    }
}
