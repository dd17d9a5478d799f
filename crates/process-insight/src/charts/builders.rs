//! Figure builders: trend, scatter matrix, histogram grid, correlation heatmap.
//!
//! Builders never fail on unknown or non-numeric columns; those are skipped.
//! An empty dataset or too few usable columns gives an empty figure.

use super::figure::{
    Annotation, Axis, ChartKind, Figure, Highlight, HistogramBin, LineDash, Panel, ReferenceLine,
    Trace, XAxisKind, time_to_x,
};
use crate::error::Result;
use crate::statistics::correlation::{correlation_matrix, pearson_r};
use crate::statistics::descriptive::{mean, std_dev};
use crate::statistics::timeseries::linear_regression;
use crate::types::{Dataset, RowIndex, TimeRange};
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, Normal};
use tracing::debug;

/// Points used to draw the fitted normal curve.
const NORMAL_CURVE_POINTS: usize = 100;

pub const DEFAULT_SIGMA_MULTIPLIER: f64 = 1.0;

/// Display options for [`trend_chart`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendOptions {
    pub y1_columns: Vec<String>,
    pub y2_columns: Vec<String>,
    pub x_range: Option<TimeRange>,
    pub y1_range: Option<(f64, f64)>,
    pub y2_range: Option<(f64, f64)>,
    /// Draw mean and mean ± k·σ lines per column.
    pub show_statistics: bool,
    /// Rows used for the statistics lines; all rows when `None`.
    pub statistics_period: Option<TimeRange>,
    /// k of the mean ± k·σ lines; [`DEFAULT_SIGMA_MULTIPLIER`] when `None`.
    pub sigma_multiplier: Option<f64>,
}

impl Default for TrendOptions {
    fn default() -> Self {
        Self {
            y1_columns: Vec::new(),
            y2_columns: Vec::new(),
            x_range: None,
            y1_range: None,
            y2_range: None,
            show_statistics: true,
            statistics_period: None,
            sigma_multiplier: None,
        }
    }
}

impl TrendOptions {
    pub fn new(y1_columns: Vec<String>) -> Self {
        Self {
            y1_columns,
            ..Default::default()
        }
    }
}

/// Requested columns that exist and are numeric, in request order.
fn usable_columns(data: &Dataset, columns: &[String]) -> Vec<String> {
    let numeric = data.numeric_columns();
    columns
        .iter()
        .filter(|c| numeric.contains(c))
        .cloned()
        .collect()
}

/// X coordinate of every row: epoch seconds for timestamps, position otherwise.
fn index_positions(data: &Dataset) -> (Vec<f64>, XAxisKind) {
    match data.index() {
        RowIndex::Timestamps(stamps) => (stamps.iter().map(time_to_x).collect(), XAxisKind::Time),
        RowIndex::Labels(labels) => ((0..labels.len()).map(|i| i as f64).collect(), XAxisKind::Numeric),
    }
}

/// Rows where both columns have a value, as `(x, y)` vectors.
fn paired_values(data: &Dataset, x_col: &str, y_col: &str) -> Result<(Vec<f64>, Vec<f64>)> {
    let xs = data.column_values(x_col)?;
    let ys = data.column_values(y_col)?;
    Ok(xs
        .into_iter()
        .zip(ys)
        .filter_map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) if !x.is_nan() && !y.is_nan() => Some((x, y)),
            _ => None,
        })
        .unzip())
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Equal-width bins over the value range; the last bin is closed.
pub fn histogram_bins(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    let Some((lo, hi)) = min_max(values) else {
        return Vec::new();
    };
    if hi <= lo {
        return vec![HistogramBin {
            start: lo - 0.5,
            end: lo + 0.5,
            count: values.len(),
        }];
    }
    let bins = bins.max(1);
    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in values {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            start: lo + i as f64 * width,
            end: lo + (i + 1) as f64 * width,
            count,
        })
        .collect()
}

// =============================================================================
// Trend
// =============================================================================

/// Line chart of columns against the row index, with an optional secondary axis.
pub fn trend_chart(data: &Dataset, options: &TrendOptions) -> Result<Figure> {
    let title = "Time series trend";
    let y1 = usable_columns(data, &options.y1_columns);
    let y2 = usable_columns(data, &options.y2_columns);
    if data.is_empty() || (y1.is_empty() && y2.is_empty()) {
        return Ok(Figure::empty(title, ChartKind::Trend));
    }

    let (xs, x_axis) = index_positions(data);
    let mut panel = Panel::new("");
    panel.x_axis = x_axis;
    panel.x_label = match x_axis {
        XAxisKind::Time => "Time".to_string(),
        XAxisKind::Numeric => data.index_name().to_string(),
    };
    panel.y_label = "Y1".to_string();
    if !y2.is_empty() {
        panel.secondary_y_label = Some("Y2".to_string());
        panel.y2_range = options.y2_range;
    }
    panel.y_range = options.y1_range;
    panel.x_range = options
        .x_range
        .filter(|_| x_axis == XAxisKind::Time)
        .map(|r| (time_to_x(&r.start), time_to_x(&r.end)));

    let axes = y1
        .iter()
        .map(|c| (c, Axis::Primary))
        .chain(y2.iter().map(|c| (c, Axis::Secondary)));
    for (column, axis) in axes.clone() {
        panel.traces.push(Trace::Line {
            name: column.clone(),
            x: xs.clone(),
            y: data.column_values(column)?,
            axis,
            dash: LineDash::Solid,
        });
    }

    if options.show_statistics {
        let period_mask = options
            .statistics_period
            .as_ref()
            .and_then(|period| data.time_mask(period).map(|mask| (period, mask)));
        if let Some((period, _)) = &period_mask {
            panel.highlight = Some(Highlight {
                x0: time_to_x(&period.start),
                x1: time_to_x(&period.end),
            });
        }

        let k = options.sigma_multiplier.unwrap_or(DEFAULT_SIGMA_MULTIPLIER);
        for (column, axis) in axes {
            let values: Vec<f64> = data
                .column_values(column)?
                .into_iter()
                .enumerate()
                .filter(|(i, _)| period_mask.as_ref().is_none_or(|(_, mask)| mask[*i]))
                .filter_map(|(_, v)| v.filter(|v| !v.is_nan()))
                .collect();
            if values.is_empty() {
                continue;
            }
            let avg = mean(&values);
            let sd = std_dev(&values);
            panel.reference_lines.push(ReferenceLine {
                y: avg,
                label: format!("{column} mean"),
                axis,
                dash: LineDash::Dash,
            });
            if sd.is_finite() {
                for (sign, symbol) in [(1.0, '+'), (-1.0, '-')] {
                    panel.reference_lines.push(ReferenceLine {
                        y: avg + sign * k * sd,
                        label: format!("{column} mean {symbol}{k}σ"),
                        axis,
                        dash: LineDash::Dot,
                    });
                }
            }
        }
    }

    debug!(
        y1 = y1.len(),
        y2 = y2.len(),
        reference_lines = panel.reference_lines.len(),
        "Trend chart built"
    );
    Ok(Figure {
        title: title.to_string(),
        kind: ChartKind::Trend,
        width: 1200,
        height: 600,
        grid: (1, 1),
        panels: vec![panel],
    })
}

// =============================================================================
// Scatter matrix
// =============================================================================

/// Every pair of columns: histograms on the diagonal, scatter plus
/// least-squares line elsewhere. Panel `(i, j)` plots column `i` against
/// column `j`.
pub fn scatter_matrix(data: &Dataset, columns: &[String], bins: usize) -> Result<Figure> {
    let title = "Scatter matrix";
    let columns = usable_columns(data, columns);
    if data.is_empty() || columns.len() < 2 {
        return Ok(Figure::empty(title, ChartKind::ScatterMatrix));
    }

    let n = columns.len();
    let mut panels = Vec::with_capacity(n * n);
    for y_col in &columns {
        for x_col in &columns {
            let mut panel = Panel::new(format!("{y_col} vs {x_col}"));
            panel.x_label = x_col.clone();
            if x_col == y_col {
                panel.y_label = "count".to_string();
                panel.traces.push(Trace::Histogram {
                    name: format!("{y_col} distribution"),
                    bins: histogram_bins(&data.column_non_null(y_col)?, bins),
                });
                panels.push(panel);
                continue;
            }

            panel.y_label = y_col.clone();
            let (xs, ys) = paired_values(data, x_col, y_col)?;
            let fit = linear_regression(&xs, &ys);
            let span = min_max(&xs);
            let y_low = min_max(&ys).map(|(lo, _)| lo);
            panel.traces.push(Trace::Scatter {
                name: format!("{y_col} vs {x_col}"),
                x: xs.clone(),
                y: ys.clone(),
            });

            if let (Some(fit), Some((x_lo, x_hi)), Some(y_lo)) = (fit, span, y_low) {
                let r = pearson_r(&xs, &ys);
                panel.traces.push(Trace::Line {
                    name: format!("regression (r={r:.3})"),
                    x: vec![x_lo, x_hi],
                    y: vec![
                        Some(fit.slope * x_lo + fit.intercept),
                        Some(fit.slope * x_hi + fit.intercept),
                    ],
                    axis: Axis::Primary,
                    dash: LineDash::Dash,
                });
                panel.annotations.push(Annotation {
                    x: x_hi,
                    y: y_lo,
                    text: format!(
                        "y = {:.3}x + {:.3}\nr = {:.3}\nR² = {:.3}",
                        fit.slope, fit.intercept, r, fit.r_squared
                    ),
                });
            }
            panels.push(panel);
        }
    }

    Ok(Figure {
        title: title.to_string(),
        kind: ChartKind::ScatterMatrix,
        width: 200 * n as u32,
        height: 300 * n as u32,
        grid: (n, n),
        panels,
    })
}

// =============================================================================
// Histograms
// =============================================================================

/// One histogram per column, at most three per row, optionally with the
/// fitted normal density scaled to the bar heights.
pub fn histogram_grid(
    data: &Dataset,
    columns: &[String],
    bins: usize,
    show_normal: bool,
) -> Result<Figure> {
    let title = "Distribution histograms";
    let columns = usable_columns(data, columns);
    if data.is_empty() || columns.is_empty() {
        return Ok(Figure::empty(title, ChartKind::HistogramGrid));
    }

    let grid_cols = columns.len().min(3);
    let grid_rows = columns.len().div_ceil(grid_cols);
    let bins = bins.max(1);

    let mut panels = Vec::with_capacity(columns.len());
    for column in &columns {
        let values = data.column_non_null(column)?;
        let mut panel = Panel::new(column.clone());
        panel.x_label = column.clone();
        panel.y_label = "count".to_string();
        panel.traces.push(Trace::Histogram {
            name: format!("{column} distribution"),
            bins: histogram_bins(&values, bins),
        });
        if show_normal {
            if let Some(curve) = normal_curve(&values, bins) {
                panel.traces.push(curve);
            }
        }
        panels.push(panel);
    }

    Ok(Figure {
        title: title.to_string(),
        kind: ChartKind::HistogramGrid,
        width: 1200,
        height: 300 * grid_rows as u32,
        grid: (grid_rows, grid_cols),
        panels,
    })
}

/// Normal density with the sample mean and deviation, scaled by n·bin_width.
fn normal_curve(values: &[f64], bins: usize) -> Option<Trace> {
    let (lo, hi) = min_max(values)?;
    let sd = std_dev(values);
    if values.len() < 2 || hi <= lo || !(sd.is_finite() && sd > 0.0) {
        return None;
    }
    let dist = Normal::new(mean(values), sd).ok()?;
    let scale = values.len() as f64 * (hi - lo) / bins as f64;
    let step = (hi - lo) / (NORMAL_CURVE_POINTS - 1) as f64;
    let x: Vec<f64> = (0..NORMAL_CURVE_POINTS).map(|i| lo + i as f64 * step).collect();
    let y = x.iter().map(|&v| Some(dist.pdf(v) * scale)).collect();
    Some(Trace::Line {
        name: "normal fit".to_string(),
        x,
        y,
        axis: Axis::Primary,
        dash: LineDash::Solid,
    })
}

// =============================================================================
// Correlation heatmap
// =============================================================================

/// Pearson correlation matrix as a heatmap, values rounded to three decimals.
pub fn correlation_heatmap(data: &Dataset, columns: &[String]) -> Result<Figure> {
    let title = "Correlation heatmap";
    let columns = usable_columns(data, columns);
    if data.is_empty() || columns.len() < 2 {
        return Ok(Figure::empty(title, ChartKind::CorrelationHeatmap));
    }

    let matrix = correlation_matrix(data, &columns)?.rounded(3);
    let z = matrix
        .values
        .iter()
        .map(|row| row.iter().map(|v| (!v.is_nan()).then_some(*v)).collect())
        .collect();

    let mut panel = Panel::new("");
    panel.x_label = "Variable".to_string();
    panel.y_label = "Variable".to_string();
    panel.traces.push(Trace::Heatmap {
        x_labels: matrix.columns.clone(),
        y_labels: matrix.columns,
        z,
    });

    Ok(Figure {
        title: title.to_string(),
        kind: ChartKind::CorrelationHeatmap,
        width: 800,
        height: 800,
        grid: (1, 1),
        panels: vec![panel],
    })
}
