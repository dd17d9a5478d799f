//! Backend-independent chart description.
//!
//! A [`Figure`] is a grid of [`Panel`]s, each holding traces, horizontal
//! reference lines, an optional highlighted x interval and text annotations.
//! Builders in [`super::builders`] produce figures; [`super::export`] draws
//! them. The model serializes to JSON for front ends that draw themselves.

use crate::utils::MINUTE_FORMAT;
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Which builder produced a figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Trend,
    ScatterMatrix,
    HistogramGrid,
    CorrelationHeatmap,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Trend => "trend",
            ChartKind::ScatterMatrix => "scatter_matrix",
            ChartKind::HistogramGrid => "histogram_grid",
            ChartKind::CorrelationHeatmap => "correlation_heatmap",
        }
    }
}

/// Y axis a trace or reference line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    #[default]
    Primary,
    Secondary,
}

/// How x values are to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XAxisKind {
    #[default]
    Numeric,
    /// Seconds since the Unix epoch of a naive timestamp.
    Time,
}

/// Stroke pattern of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineDash {
    #[default]
    Solid,
    Dash,
    Dot,
}

/// One histogram bar: `[start, end)` and its count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trace {
    /// Connected line; a `None` value breaks the line.
    Line {
        name: String,
        x: Vec<f64>,
        y: Vec<Option<f64>>,
        axis: Axis,
        dash: LineDash,
    },
    Scatter {
        name: String,
        x: Vec<f64>,
        y: Vec<f64>,
    },
    Histogram {
        name: String,
        bins: Vec<HistogramBin>,
    },
    /// Cell grid; `z[row][col]`, `None` where undefined.
    Heatmap {
        x_labels: Vec<String>,
        y_labels: Vec<String>,
        z: Vec<Vec<Option<f64>>>,
    },
}

impl Trace {
    pub fn type_name(&self) -> &'static str {
        match self {
            Trace::Line { .. } => "line",
            Trace::Scatter { .. } => "scatter",
            Trace::Histogram { .. } => "histogram",
            Trace::Heatmap { .. } => "heatmap",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Trace::Line { name, .. } | Trace::Scatter { name, .. } | Trace::Histogram { name, .. } => {
                name
            }
            Trace::Heatmap { .. } => "",
        }
    }

    /// Number of drawn data points (bars for histograms, cells for heatmaps).
    pub fn point_count(&self) -> usize {
        match self {
            Trace::Line { y, .. } => y.iter().flatten().count(),
            Trace::Scatter { x, .. } => x.len(),
            Trace::Histogram { bins, .. } => bins.len(),
            Trace::Heatmap { z, .. } => z.iter().map(|row| row.iter().flatten().count()).sum(),
        }
    }

    pub fn axis(&self) -> Axis {
        match self {
            Trace::Line { axis, .. } => *axis,
            _ => Axis::Primary,
        }
    }
}

/// Horizontal line across the whole panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLine {
    pub y: f64,
    pub label: String,
    pub axis: Axis,
    pub dash: LineDash,
}

/// Shaded x interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub x0: f64,
    pub x1: f64,
}

/// Text placed at data coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub x: f64,
    pub y: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Panel {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub secondary_y_label: Option<String>,
    pub x_axis: XAxisKind,
    pub traces: Vec<Trace>,
    pub reference_lines: Vec<ReferenceLine>,
    pub highlight: Option<Highlight>,
    pub x_range: Option<(f64, f64)>,
    pub y_range: Option<(f64, f64)>,
    pub y2_range: Option<(f64, f64)>,
    pub annotations: Vec<Annotation>,
}

impl Panel {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn has_secondary(&self) -> bool {
        self.traces.iter().any(|t| t.axis() == Axis::Secondary)
            || self.reference_lines.iter().any(|l| l.axis == Axis::Secondary)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub title: String,
    pub kind: ChartKind,
    pub width: u32,
    pub height: u32,
    /// `(rows, cols)` of the panel grid, filled row by row.
    pub grid: (usize, usize),
    pub panels: Vec<Panel>,
}

impl Figure {
    /// A figure with no panels; drawn as a blank canvas.
    pub fn empty(title: impl Into<String>, kind: ChartKind) -> Self {
        Self {
            title: title.into(),
            kind,
            width: 1200,
            height: 800,
            grid: (0, 0),
            panels: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.panels.iter().all(|p| p.traces.is_empty())
    }

    pub fn trace_count(&self) -> usize {
        self.panels.iter().map(|p| p.traces.len()).sum()
    }
}

/// Counts describing a figure, for summaries and tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FigureStats {
    pub title: String,
    pub kind: ChartKind,
    pub panel_count: usize,
    pub trace_count: usize,
    pub trace_types: Vec<&'static str>,
    pub point_count: usize,
    pub reference_line_count: usize,
    pub has_annotations: bool,
}

pub fn figure_stats(figure: &Figure) -> FigureStats {
    let traces = figure.panels.iter().flat_map(|p| p.traces.iter());
    FigureStats {
        title: figure.title.clone(),
        kind: figure.kind,
        panel_count: figure.panels.len(),
        trace_count: figure.trace_count(),
        trace_types: traces.clone().map(Trace::type_name).collect(),
        point_count: traces.map(Trace::point_count).sum(),
        reference_line_count: figure.panels.iter().map(|p| p.reference_lines.len()).sum(),
        has_annotations: figure.panels.iter().any(|p| !p.annotations.is_empty()),
    }
}

// =============================================================================
// Time axis helpers
// =============================================================================

pub(crate) fn time_to_x(ts: &NaiveDateTime) -> f64 {
    ts.and_utc().timestamp() as f64
}

/// Tick label for an x value on a time axis.
pub(crate) fn x_to_time_label(x: f64) -> String {
    DateTime::from_timestamp(x.round() as i64, 0)
        .map(|dt| dt.naive_utc().format(MINUTE_FORMAT).to_string())
        .unwrap_or_default()
}
