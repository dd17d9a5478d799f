//! Data processor: loading, querying, cleaning and exporting the working dataset.
//!
//! The processor keeps two copies: the data as loaded (`original`) and the
//! current working data. Outlier removal and missing-value handling replace
//! the working copy; [`DataProcessor::reset_data`] goes back to the original.

pub mod export;
pub mod loader;
pub mod validation;

pub use loader::{InputFormat, Loaded, decode_text, load_csv_bytes, load_file, load_spreadsheet};
pub use validation::ValidationReport;

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, ComputationWarning, Result};
use crate::statistics::ColumnStatistics;
use crate::types::{Dataset, TimeRange};
use crate::utils::{dtype_label, is_numeric_dtype};
use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

// =============================================================================
// Data info
// =============================================================================

/// One column of [`DataInfo`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: String,
    pub null_count: usize,
}

/// First and last index timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Shape, columns and footprint of the working data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataInfo {
    pub rows: usize,
    pub columns: Vec<ColumnInfo>,
    pub memory_usage_bytes: usize,
    pub date_range: Option<DateRange>,
}

impl DataInfo {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.columns.len())
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn memory_usage_mb(&self) -> f64 {
        self.memory_usage_bytes as f64 / 1024.0 / 1024.0
    }

    fn of(data: &Dataset) -> Self {
        let columns = data
            .frame()
            .get_columns()
            .iter()
            .map(|col| ColumnInfo {
                name: col.name().to_string(),
                dtype: dtype_label(col.dtype()),
                null_count: col.null_count(),
            })
            .collect();
        DataInfo {
            rows: data.height(),
            columns,
            memory_usage_bytes: data.memory_usage_bytes(),
            date_range: data.time_span().map(|(start, end)| DateRange { start, end }),
        }
    }
}

// =============================================================================
// Missing values
// =============================================================================

/// How [`DataProcessor::handle_missing_values`] treats nulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValueStrategy {
    /// Drop every row with a null in any column.
    DropRows,
    /// Drop every column that contains a null.
    DropColumns,
    /// Carry the previous value forward.
    ForwardFill,
    /// Replace nulls in numeric columns by the column mean.
    MeanFill,
}

fn apply_missing_strategy(data: &Dataset, strategy: MissingValueStrategy) -> Result<Dataset> {
    let frame = data.frame();
    match strategy {
        MissingValueStrategy::DropRows => {
            let mut keep = vec![true; data.height()];
            for column in frame.get_columns() {
                if column.null_count() == 0 {
                    continue;
                }
                let nulls = column.as_materialized_series().is_null();
                for (flag, is_null) in keep.iter_mut().zip(nulls.into_iter()) {
                    if is_null.unwrap_or(false) {
                        *flag = false;
                    }
                }
            }
            data.filter(&keep)
        }
        MissingValueStrategy::DropColumns => {
            let kept: Vec<Column> = frame
                .get_columns()
                .iter()
                .filter(|col| col.null_count() == 0)
                .cloned()
                .collect();
            data.with_frame(DataFrame::new(kept)?)
        }
        MissingValueStrategy::ForwardFill => {
            let mut filled = frame.clone();
            for name in data.column_names() {
                let series = filled.column(&name)?.as_materialized_series().clone();
                if series.null_count() > 0 {
                    filled.replace(&name, series.fill_null(FillNullStrategy::Forward(None))?)?;
                }
            }
            data.with_frame(filled)
        }
        MissingValueStrategy::MeanFill => {
            let mut filled = frame.clone();
            for name in data.column_names() {
                let series = filled.column(&name)?.as_materialized_series().clone();
                if series.null_count() > 0 && is_numeric_dtype(series.dtype()) {
                    let as_float = series.cast(&DataType::Float64)?;
                    filled.replace(&name, as_float.fill_null(FillNullStrategy::Mean)?)?;
                }
            }
            data.with_frame(filled)
        }
    }
}

// =============================================================================
// Processor
// =============================================================================

/// Owns the working dataset and the copy it was loaded as.
#[derive(Debug, Clone)]
pub struct DataProcessor {
    data: Option<Dataset>,
    original: Option<Dataset>,
    encoding_candidates: Vec<String>,
    memory_limit_mb: f64,
}

impl Default for DataProcessor {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

impl DataProcessor {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            data: None,
            original: None,
            encoding_candidates: config.encoding_candidates.clone(),
            memory_limit_mb: config.memory_limit_mb,
        }
    }

    // ==================== Loading ====================

    /// Load a file and make it both the original and the working data.
    ///
    /// On error nothing changes.
    pub fn load_file(&mut self, path: &Path) -> Result<Vec<ComputationWarning>> {
        let loaded = load_file(path, &self.encoding_candidates)?;
        Ok(self.install(loaded))
    }

    /// Load delimited text from memory.
    pub fn load_csv_bytes(&mut self, bytes: &[u8]) -> Result<Vec<ComputationWarning>> {
        let loaded = load_csv_bytes(bytes, &self.encoding_candidates)?;
        Ok(self.install(loaded))
    }

    /// Use an already built dataset.
    pub fn load_dataset(&mut self, dataset: Dataset) -> &Dataset {
        self.original = Some(dataset.clone());
        self.data.insert(dataset)
    }

    fn install(&mut self, loaded: Loaded) -> Vec<ComputationWarning> {
        self.load_dataset(loaded.dataset);
        loaded.warnings
    }

    // ==================== Access ====================

    pub fn data(&self) -> Option<&Dataset> {
        self.data.as_ref()
    }

    pub fn original_data(&self) -> Option<&Dataset> {
        self.original.as_ref()
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    fn require_data(&self) -> Result<&Dataset> {
        self.data.as_ref().ok_or(AnalysisError::NoDataLoaded)
    }

    /// Replace the working data.
    pub fn update_data(&mut self, data: Dataset) -> &Dataset {
        debug!(rows = data.height(), "Working data updated");
        self.data.insert(data)
    }

    /// Go back to the data as loaded.
    pub fn reset_data(&mut self) {
        if let Some(original) = &self.original {
            self.data = Some(original.clone());
            info!("Working data reset to the loaded original");
        }
    }

    // ==================== Queries ====================

    pub fn data_info(&self) -> Option<DataInfo> {
        self.data.as_ref().map(DataInfo::of)
    }

    pub fn numeric_columns(&self) -> Vec<String> {
        self.data
            .as_ref()
            .map(Dataset::numeric_columns)
            .unwrap_or_default()
    }

    /// Descriptive statistics of one column. `Ok(None)` when it has no values.
    pub fn column_statistics(&self, column: &str) -> Result<Option<ColumnStatistics>> {
        let data = self.require_data()?;
        let values = data.column_non_null(column)?;
        Ok(ColumnStatistics::from_values(&values))
    }

    /// Rows whose timestamp lies in `range` (inclusive).
    ///
    /// Data without a timestamp index is returned whole.
    pub fn filter_by_date_range(&self, range: &TimeRange) -> Result<Dataset> {
        let data = self.require_data()?;
        match data.time_mask(range) {
            Some(mask) => data.filter(&mask),
            None => Ok(data.clone()),
        }
    }

    pub fn validate(&self) -> ValidationReport {
        validation::validate(self.data.as_ref(), self.memory_limit_mb)
    }

    // ==================== Cleaning ====================

    /// Apply `strategy` to the working data and return the result.
    pub fn handle_missing_values(&mut self, strategy: MissingValueStrategy) -> Result<Dataset> {
        let data = self.require_data()?;
        let cleaned = apply_missing_strategy(data, strategy)?;
        info!(
            ?strategy,
            rows = cleaned.height(),
            columns = cleaned.width(),
            "Missing values handled"
        );
        self.data = Some(cleaned.clone());
        Ok(cleaned)
    }

    // ==================== Export ====================

    /// CSV bytes of the working data; empty when nothing is loaded.
    pub fn export_csv(&self) -> Result<Vec<u8>> {
        match &self.data {
            Some(data) => export::to_csv_bytes(data),
            None => Ok(Vec::new()),
        }
    }

    /// XLSX bytes of the working data; empty when nothing is loaded.
    pub fn export_xlsx(&self) -> Result<Vec<u8>> {
        match &self.data {
            Some(data) => export::to_xlsx_bytes(data),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CSV: &str = "time,temp,flow,tag\n\
                       2024-01-01 00:00,20.0,1.0,a\n\
                       2024-01-01 01:00,,2.0,b\n\
                       2024-01-01 02:00,24.0,,c\n\
                       2024-01-01 03:00,26.0,4.0,d\n";

    fn loaded() -> DataProcessor {
        let mut processor = DataProcessor::default();
        let warnings = processor.load_csv_bytes(CSV.as_bytes()).unwrap();
        assert!(warnings.is_empty());
        processor
    }

    fn hour(h: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_data_info() {
        let info = loaded().data_info().unwrap();
        assert_eq!(info.shape(), (4, 3));
        assert_eq!(info.column_names(), vec!["temp", "flow", "tag"]);
        assert_eq!(info.columns[0].dtype, "float64");
        assert_eq!(info.columns[0].null_count, 1);
        assert_eq!(
            info.date_range,
            Some(DateRange {
                start: hour(0),
                end: hour(3)
            })
        );
        assert!(info.memory_usage_bytes > 0);
    }

    #[test]
    fn test_nothing_loaded() {
        let processor = DataProcessor::default();
        assert!(processor.data_info().is_none());
        assert!(processor.numeric_columns().is_empty());
        assert!(processor.export_csv().unwrap().is_empty());
        assert!(processor.export_xlsx().unwrap().is_empty());
        assert_eq!(
            processor.column_statistics("temp").unwrap_err().error_code(),
            "NO_DATA_LOADED"
        );
    }

    #[test]
    fn test_column_statistics() {
        let stats = loaded().column_statistics("temp").unwrap().unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.median, 24.0);
        assert_eq!(stats.min, 20.0);
    }

    #[test]
    fn test_filter_by_date_range_inclusive() {
        let processor = loaded();
        let filtered = processor
            .filter_by_date_range(&TimeRange::new(hour(1), hour(2)))
            .unwrap();
        assert_eq!(filtered.height(), 2);
        // The working data itself is unchanged.
        assert_eq!(processor.data().unwrap().height(), 4);
    }

    #[test]
    fn test_missing_value_strategies() {
        let mut processor = loaded();
        assert_eq!(
            processor
                .handle_missing_values(MissingValueStrategy::DropRows)
                .unwrap()
                .height(),
            2
        );

        processor.reset_data();
        let dropped = processor
            .handle_missing_values(MissingValueStrategy::DropColumns)
            .unwrap();
        assert_eq!(dropped.column_names(), vec!["tag"]);

        processor.reset_data();
        let ffilled = processor
            .handle_missing_values(MissingValueStrategy::ForwardFill)
            .unwrap();
        assert_eq!(
            ffilled.column_values("temp").unwrap(),
            vec![Some(20.0), Some(20.0), Some(24.0), Some(26.0)]
        );

        processor.reset_data();
        let mean_filled = processor
            .handle_missing_values(MissingValueStrategy::MeanFill)
            .unwrap();
        assert_eq!(mean_filled.null_count("temp").unwrap(), 0);
        assert_eq!(mean_filled.column_values("temp").unwrap()[1], Some(70.0 / 3.0));
        assert_eq!(mean_filled.null_count("tag").unwrap(), 0);
    }

    #[test]
    fn test_update_and_reset() {
        let mut processor = loaded();
        let smaller = processor.data().unwrap().filter(&[true, false, false, false]).unwrap();
        processor.update_data(smaller);
        assert_eq!(processor.data().unwrap().height(), 1);
        processor.reset_data();
        assert_eq!(processor.data().unwrap().height(), 4);
        assert_eq!(processor.original_data().unwrap().height(), 4);
    }

    #[test]
    fn test_validate_loaded() {
        let report = loaded().validate();
        assert!(report.is_valid, "{:?}", report.errors);
    }
}
