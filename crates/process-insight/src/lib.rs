//! Process Data Analysis Library
//!
//! Interactive analysis of plant and process data built on Polars: load a
//! time-indexed table, strip outliers with a full undo history, run the usual
//! statistics, draw charts and write a report.
//!
//! # Overview
//!
//! - **Data processing**: CSV/XLSX loading with encoding detection, missing
//!   value strategies, validation and export
//! - **Outlier removal**: range and statistical (IQR, z-score) filters, each
//!   recorded with a snapshot so any step can be rolled back
//! - **Statistics**: descriptive tables, correlation with significance,
//!   normality tests, trend regression and two-period comparison
//! - **Charts**: trend, scatter matrix, histogram grid and correlation heatmap,
//!   exportable as PNG or SVG
//! - **Reports**: HTML, JSON or plain text documents
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use process_insight::{AnalysisConfig, AnalysisSession, ReportFormat};
//! use std::path::Path;
//!
//! let mut session = AnalysisSession::new(AnalysisConfig::default());
//! session.load_file(Path::new("plant.csv"))?;
//!
//! // Drop temperature spikes, then change our mind.
//! session.apply_statistical_filter("temperature", "iqr", 1.5)?;
//! session.restore(0)?;
//!
//! let figure = session.correlation_heatmap(&[])?;
//! let report = session.generate_report(ReportFormat::Html, &[("Correlation".into(), figure)])?;
//! std::fs::write("report.html", report.bytes)?;
//! ```
//!
//! # Modules
//!
//! - [`session`]: the stateful entry point tying everything together
//! - [`processor`]: loading, cleaning, validation and export
//! - [`outliers`]: filters and the undo history
//! - [`statistics`]: stateless statistical functions
//! - [`charts`]: chart specifications and image export
//! - [`reporting`]: report documents and renderers

pub mod charts;
pub mod config;
pub mod error;
pub mod outliers;
pub mod processor;
pub mod reporting;
pub mod session;
pub mod statistics;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use charts::{ChartFormat, ChartKind, Figure, TrendOptions};
pub use config::{AnalysisConfig, AnalysisConfigBuilder, ConfigValidationError};
pub use error::{AnalysisError, ComputationWarning, Result, ResultExt, WarningKind};
pub use outliers::{
    HistoryExport, HistorySummaryRow, OperationKind, OperationRecord, OutlierBounds,
    OutlierMethod, OutlierRemover,
};
pub use processor::{DataInfo, DataProcessor, MissingValueStrategy, ValidationReport};
pub use reporting::{Report, ReportFormat, ReportGenerator};
pub use session::{AnalysisSession, RenderedReport};
pub use statistics::{
    BasicStatisticsRow, ColumnStatistics, CorrelationMatrix, NormalityResult, OutlierStatistics,
    PeriodComparison, TimeSeriesStatistics,
};
pub use types::{Dataset, RowIndex, RowKey, TimeRange, ValueRange};
