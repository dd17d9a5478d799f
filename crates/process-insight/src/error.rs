//! Error types for process data analysis.
//!
//! Fatal conditions are modelled by [`AnalysisError`] using `thiserror`.
//! Non-fatal conditions (an index that could not be read as timestamps, a
//! normality test that failed numerically, a chart that could not be exported)
//! are [`ComputationWarning`] values: they are logged where they happen and
//! handed back to the caller next to a usable fallback result.
//!
//! Both types serialize as `{ code, message }`-shaped structs so a front end
//! can display them without knowing the Rust types.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The main error type for analysis operations.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Input could not be read or decoded. Nothing is committed to the session.
    #[error("Failed to load data: {0}")]
    Load(String),

    /// The file extension is not one of the supported input formats.
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Unknown outlier or statistical method name.
    #[error("Unsupported method: '{0}' (expected 'iqr' or 'zscore')")]
    UnsupportedMethod(String),

    /// Restore target has no snapshot.
    #[error("Unknown operation id: {0}")]
    UnknownOperation(usize),

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// No data loaded in the session.
    #[error("No data loaded")]
    NoDataLoaded,

    /// Not enough observations for a computation.
    #[error("Not enough data for {what}: need at least {required}, got {actual}")]
    InsufficientData {
        what: String,
        required: usize,
        actual: usize,
    },

    /// Range filter request that would not select anything meaningful.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Chart could not be rendered to the requested format.
    #[error("Chart export failed: {0}")]
    ChartExport(String),

    /// The requested report format has no renderer in this build.
    #[error("Report renderer unavailable: {0}")]
    RendererUnavailable(String),

    /// Data export failed.
    #[error("Export failed: {0}")]
    Export(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Spreadsheet reader error.
    #[error("Spreadsheet error: {0}")]
    Excel(#[from] calamine::Error),

    /// Spreadsheet writer error.
    #[error("Spreadsheet writer error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<AnalysisError>,
    },
}

impl AnalysisError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        AnalysisError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for front-end handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Load(_) => "LOAD_ERROR",
            Self::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Self::UnsupportedMethod(_) => "UNSUPPORTED_METHOD",
            Self::UnknownOperation(_) => "UNKNOWN_OPERATION",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::NoDataLoaded => "NO_DATA_LOADED",
            Self::InsufficientData { .. } => "INSUFFICIENT_DATA",
            Self::InvalidFilter(_) => "INVALID_FILTER",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::ChartExport(_) => "CHART_EXPORT_FAILED",
            Self::RendererUnavailable(_) => "RENDERER_UNAVAILABLE",
            Self::Export(_) => "EXPORT_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Excel(_) => "SPREADSHEET_ERROR",
            Self::Xlsx(_) => "SPREADSHEET_WRITER_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether the error belongs to the load family (input rejected, nothing committed).
    pub fn is_load_error(&self) -> bool {
        match self {
            Self::Load(_) | Self::UnsupportedFormat(_) | Self::Excel(_) => true,
            Self::WithContext { source, .. } => source.is_load_error(),
            _ => false,
        }
    }

    /// Check if this error leaves the session usable (user can just retry differently).
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::UnsupportedMethod(_)
            | Self::UnknownOperation(_)
            | Self::ColumnNotFound(_)
            | Self::NoDataLoaded
            | Self::InsufficientData { .. }
            | Self::InvalidFilter(_)
            | Self::InvalidConfig(_)
            | Self::RendererUnavailable(_) => true,
            Self::WithContext { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for AnalysisError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("AnalysisError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| AnalysisError::Polars(e).with_context(context))
    }
}

// =============================================================================
// Non-fatal warnings
// =============================================================================

/// What kind of computation produced a [`ComputationWarning`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// The index column could not be converted to timestamps.
    IndexCoercion,
    /// A normality test failed numerically for a column.
    NormalityTest,
    /// A chart could not be exported.
    ChartExport,
    /// The report could not be rendered in the requested format.
    ReportRendering,
}

impl WarningKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::IndexCoercion => "INDEX_COERCION",
            Self::NormalityTest => "NORMALITY_TEST",
            Self::ChartExport => "CHART_EXPORT",
            Self::ReportRendering => "REPORT_RENDERING",
        }
    }
}

/// A non-fatal problem. Processing continued with a fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationWarning {
    pub kind: WarningKind,
    pub message: String,
}

impl ComputationWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ComputationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.code(), self.message)
    }
}
