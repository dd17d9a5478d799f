//! Trend and autocorrelation of a time-indexed column.

use crate::error::{AnalysisError, Result};
use crate::statistics::correlation::{pearson, pearson_r};
use crate::statistics::descriptive::{mean, std_dev};
use crate::types::Dataset;
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendDirection {
    pub fn from_slope(slope: f64) -> Self {
        if slope > 0.0 {
            TrendDirection::Increasing
        } else if slope < 0.0 {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        }
    }
}

/// Least-squares line through `(position, value)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub p_value: f64,
    pub direction: TrendDirection,
}

/// Ordinary least squares of `y` on `x`. `None` below two points or when `x`
/// is constant.
pub fn linear_regression(x: &[f64], y: &[f64]) -> Option<Trend> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let mx = mean(&x[..n]);
    let my = mean(&y[..n]);
    let sxx: f64 = x[..n].iter().map(|v| (v - mx).powi(2)).sum();
    if sxx <= 0.0 {
        return None;
    }
    let sxy: f64 = x[..n].iter().zip(&y[..n]).map(|(a, b)| (a - mx) * (b - my)).sum();
    let syy: f64 = y[..n].iter().map(|v| (v - my).powi(2)).sum();
    let slope = sxy / sxx;
    let intercept = my - slope * mx;

    // A constant response has no defined r; treat it as no fit.
    let r = if syy > 0.0 {
        (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
    } else {
        0.0
    };
    // slope test: the same t statistic as the correlation test
    let p_value = pearson(&x[..n], &y[..n]).map_or(f64::NAN, |outcome| outcome.p_value);
    Some(Trend {
        slope,
        intercept,
        r_squared: r * r,
        p_value,
        direction: TrendDirection::from_slope(slope),
    })
}

/// Pearson correlation of the series with itself shifted by one step.
pub fn lag1_autocorrelation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    pearson_r(&values[..values.len() - 1], &values[1..])
}

/// Time-series summary of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesStatistics {
    pub column: String,
    pub period_start: NaiveDateTime,
    pub period_end: NaiveDateTime,
    /// Whole seconds between the first and last observation.
    pub duration_seconds: i64,
    pub data_points: usize,
    pub mean: f64,
    pub std: f64,
    pub trend: Option<Trend>,
    pub autocorr_lag1: Option<f64>,
}

impl TimeSeriesStatistics {
    pub fn duration(&self) -> TimeDelta {
        self.period_end - self.period_start
    }
}

/// Trend, spread and lag-1 autocorrelation of `column` over its non-null rows.
///
/// `Ok(None)` when the index is not temporal or the column has no values.
pub fn time_series_statistics(
    data: &Dataset,
    column: &str,
) -> Result<Option<TimeSeriesStatistics>> {
    if !data.has_column(column) {
        return Err(AnalysisError::ColumnNotFound(column.to_string()));
    }
    let Some(stamps) = data.index().timestamps() else {
        return Ok(None);
    };

    let (times, values): (Vec<NaiveDateTime>, Vec<f64>) = stamps
        .iter()
        .zip(data.column_values(column)?)
        .filter_map(|(ts, v)| v.filter(|x| !x.is_nan()).map(|x| (*ts, x)))
        .unzip();

    let (Some(start), Some(end)) = (times.iter().min(), times.iter().max()) else {
        return Ok(None);
    };

    let positions: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    let autocorr = lag1_autocorrelation(&values);

    Ok(Some(TimeSeriesStatistics {
        column: column.to_string(),
        period_start: *start,
        period_end: *end,
        duration_seconds: (*end - *start).num_seconds(),
        data_points: values.len(),
        mean: mean(&values),
        std: std_dev(&values),
        trend: linear_regression(&positions, &values),
        autocorr_lag1: autocorr.is_finite().then_some(autocorr),
    }))
}
