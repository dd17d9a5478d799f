//! Visualizer: chart specifications and image export.
//!
//! Builders turn a dataset and a column selection into a [`Figure`]; a figure
//! can be serialized as JSON or drawn to PNG/SVG/PDF bytes with [`export_figure`].

pub mod builders;
pub mod export;
pub mod figure;
pub mod pdf;

pub use builders::{
    TrendOptions, correlation_heatmap, histogram_bins, histogram_grid, scatter_matrix, trend_chart,
};
pub use export::{ChartFormat, export_figure};
pub use pdf::figure_pdf;
pub use figure::{
    Annotation, Axis, ChartKind, Figure, FigureStats, Highlight, HistogramBin, LineDash, Panel,
    ReferenceLine, Trace, XAxisKind, figure_stats,
};
