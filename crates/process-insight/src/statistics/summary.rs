//! Outlier statistics and the plain-text statistics summary.

use crate::error::{AnalysisError, Result};
use crate::outliers::{OutlierBounds, OutlierMethod};
use crate::statistics::descriptive::{mean, std_dev};
use crate::types::Dataset;
use crate::utils::{TIMESTAMP_FORMAT, fmt_float};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Values listed in [`OutlierStatistics::outlier_values`] at most.
pub const MAX_LISTED_OUTLIERS: usize = 100;

/// How many values of a column fall outside the bounds of a method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierStatistics {
    pub method: OutlierMethod,
    pub multiplier: f64,
    pub total_points: usize,
    pub outlier_count: usize,
    pub outlier_percentage: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// First outlying values in row order.
    pub outlier_values: Vec<f64>,
}

/// Outlier counts for `column` without removing anything.
///
/// `Ok(None)` when the column holds no values.
pub fn outlier_statistics(
    data: &Dataset,
    column: &str,
    method: OutlierMethod,
    multiplier: f64,
) -> Result<Option<OutlierStatistics>> {
    if !data.has_column(column) {
        return Err(AnalysisError::ColumnNotFound(column.to_string()));
    }
    let values = data.column_non_null(column)?;
    if values.is_empty() {
        return Ok(None);
    }

    let bounds = OutlierBounds::compute(&values, method, multiplier);
    let outliers: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| bounds.is_outlier(*v))
        .collect();

    Ok(Some(OutlierStatistics {
        method,
        multiplier,
        total_points: values.len(),
        outlier_count: outliers.len(),
        outlier_percentage: outliers.len() as f64 / values.len() as f64 * 100.0,
        lower_bound: bounds.lower,
        upper_bound: bounds.upper,
        outlier_values: outliers.into_iter().take(MAX_LISTED_OUTLIERS).collect(),
    }))
}

/// Plain-text overview of `columns`: period, size and per-column figures.
pub fn statistics_summary(data: &Dataset, columns: &[String]) -> Result<String> {
    if data.is_empty() {
        return Ok("Dataset is empty.".to_string());
    }

    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "=== Data Statistics Summary ===");
    match data.time_span() {
        Some((start, end)) => {
            let _ = writeln!(
                out,
                "Period: {} to {}",
                start.format(TIMESTAMP_FORMAT),
                end.format(TIMESTAMP_FORMAT)
            );
        }
        None => {
            let strings = data.index().to_strings();
            let first = strings.first().map(String::as_str).unwrap_or("-");
            let last = strings.last().map(String::as_str).unwrap_or("-");
            let _ = writeln!(out, "Period: {} to {}", first, last);
        }
    }
    let _ = writeln!(out, "Total rows: {}", data.height());
    let _ = writeln!(out, "Variables: {}", columns.len());
    let _ = writeln!(out);

    for column in columns {
        if !data.has_column(column) {
            continue;
        }
        let values = data.column_non_null(column)?;
        if values.is_empty() {
            continue;
        }
        let avg = mean(&values);
        let spread = std_dev(&values);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let missing = data.height() - values.len();

        let _ = writeln!(out, "[{}]", column);
        let _ = writeln!(out, "  Mean: {}", fmt_float(avg, 3));
        let _ = writeln!(out, "  Std: {}", fmt_float(spread, 3));
        let _ = writeln!(out, "  Range: {} to {}", fmt_float(min, 3), fmt_float(max, 3));
        let _ = writeln!(
            out,
            "  Missing: {:.1}%",
            missing as f64 / data.height() as f64 * 100.0
        );
        let _ = writeln!(out);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn spiky() -> Dataset {
        let frame = df![
            "v" => [Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0), None, Some(50.0)],
        ]
        .unwrap();
        Dataset::from_frame(frame)
    }

    #[test]
    fn test_outlier_statistics_iqr() {
        let stats = outlier_statistics(&spiky(), "v", OutlierMethod::Iqr, 1.5)
            .unwrap()
            .unwrap();
        assert_eq!(stats.total_points, 6);
        assert_eq!(stats.outlier_count, 1);
        assert_eq!(stats.outlier_values, vec![50.0]);
        assert!((stats.outlier_percentage - 100.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_outlier_statistics_edge_cases() {
        let data = spiky();
        assert!(outlier_statistics(&data, "ghost", OutlierMethod::Iqr, 1.5).is_err());

        let empty = Dataset::from_frame(df!["v" => [None::<f64>, None]].unwrap());
        assert!(
            outlier_statistics(&empty, "v", OutlierMethod::ZScore, 3.0)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_statistics_summary_text() {
        let text = statistics_summary(&spiky(), &["v".to_string()]).unwrap();
        assert!(text.starts_with("=== Data Statistics Summary ==="));
        assert!(text.contains("Total rows: 7"));
        assert!(text.contains("[v]"));
        assert!(text.contains("Range: 1.000 to 50.000"));
        assert!(text.contains("Missing: 14.3%"));

        assert_eq!(
            statistics_summary(&Dataset::empty(), &[]).unwrap(),
            "Dataset is empty."
        );
    }
}
