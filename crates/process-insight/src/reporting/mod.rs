//! Report generation.
//!
//! [`ReportGenerator`] assembles a [`Report`] document from the current
//! dataset, precomputed statistics, the outlier history summary and any
//! named figures. Renderers turn the document into HTML, JSON, plain text or PDF.
//!
//! # Example
//!
//! ```rust,ignore
//! use process_insight::reporting::{ReportFormat, ReportGenerator, ReportInputs, render_report};
//!
//! let report = ReportGenerator::new(&config).generate(&ReportInputs {
//!     data: &dataset,
//!     results: &results,
//!     history: &history,
//!     figures: &figures,
//! });
//! let html = render_report(&report, ReportFormat::Html)?;
//! ```

mod document;
mod generator;
mod pdf;
mod render;

pub use document::{Block, Report, Section};
pub use generator::{
    AnalysisResults, ReportGenerator, ReportInputs, export_data_summary, quick_report,
};
pub use pdf::PdfRenderer;
pub use render::{
    DocumentRenderer, HtmlRenderer, JsonRenderer, ReportFormat, TextRenderer, render_report,
    renderer_for,
};
