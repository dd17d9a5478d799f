//! Core data types: the [`Dataset`] and its row index.
//!
//! A dataset is a polars [`DataFrame`] of named columns plus a separate row
//! index taken from the first column of the input. The index is kept outside
//! the frame so that filtering, snapshotting and exporting always move the two
//! together, and so that duplicate index values are allowed.

use crate::error::{AnalysisError, Result};
use crate::utils::{KEY_TIMESTAMP_FORMAT, is_numeric_dtype};
use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Row index
// =============================================================================

/// Ordered row keys of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum RowIndex {
    /// Index parsed as date-times (the normal case for process data).
    Timestamps(Vec<NaiveDateTime>),
    /// Index kept in its original textual representation.
    Labels(Vec<String>),
}

impl RowIndex {
    /// Positional labels `"0"`, `"1"`, ... for data without a usable index.
    pub fn positional(len: usize) -> Self {
        RowIndex::Labels((0..len).map(|i| i.to_string()).collect())
    }

    pub fn len(&self) -> usize {
        match self {
            RowIndex::Timestamps(values) => values.len(),
            RowIndex::Labels(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, RowIndex::Timestamps(_))
    }

    pub fn timestamps(&self) -> Option<&[NaiveDateTime]> {
        match self {
            RowIndex::Timestamps(values) => Some(values),
            RowIndex::Labels(_) => None,
        }
    }

    /// Key at `position`. Panics when out of bounds, like slice indexing.
    pub fn key(&self, position: usize) -> RowKey {
        match self {
            RowIndex::Timestamps(values) => RowKey::Timestamp(values[position]),
            RowIndex::Labels(values) => RowKey::Label(values[position].clone()),
        }
    }

    /// Keep the entries whose mask value is `true`.
    pub fn filter(&self, keep: &[bool]) -> RowIndex {
        fn pick<T: Clone>(values: &[T], keep: &[bool]) -> Vec<T> {
            values
                .iter()
                .zip(keep)
                .filter(|(_, k)| **k)
                .map(|(v, _)| v.clone())
                .collect()
        }

        match self {
            RowIndex::Timestamps(values) => RowIndex::Timestamps(pick(values, keep)),
            RowIndex::Labels(values) => RowIndex::Labels(pick(values, keep)),
        }
    }

    /// String form of every key, timestamps as `%Y-%m-%d %H:%M:%S%.f`.
    pub fn to_strings(&self) -> Vec<String> {
        match self {
            RowIndex::Timestamps(values) => values
                .iter()
                .map(|ts| ts.format(KEY_TIMESTAMP_FORMAT).to_string())
                .collect(),
            RowIndex::Labels(values) => values.clone(),
        }
    }

    fn estimated_size(&self) -> usize {
        match self {
            RowIndex::Timestamps(values) => values.len() * std::mem::size_of::<NaiveDateTime>(),
            RowIndex::Labels(values) => values
                .iter()
                .map(|s| s.len() + std::mem::size_of::<String>())
                .sum(),
        }
    }
}

/// A single row key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowKey {
    Timestamp(NaiveDateTime),
    Label(String),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Timestamp(ts) => write!(f, "{}", ts.format(KEY_TIMESTAMP_FORMAT)),
            RowKey::Label(label) => f.write_str(label),
        }
    }
}

// =============================================================================
// Ranges
// =============================================================================

/// Inclusive time window on the row index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn contains(&self, ts: &NaiveDateTime) -> bool {
        *ts >= self.start && *ts <= self.end
    }
}

/// Inclusive value window on one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

// =============================================================================
// Dataset
// =============================================================================

/// Tabular data with an ordered row index.
///
/// Invariant: `index.len() == frame.height()`.
#[derive(Debug, Clone)]
pub struct Dataset {
    index_name: String,
    index: RowIndex,
    frame: DataFrame,
}

impl Dataset {
    /// Build a dataset, checking that the index and the frame line up.
    pub fn new(index_name: impl Into<String>, index: RowIndex, frame: DataFrame) -> Result<Self> {
        // A frame without columns has height 0 in polars; let the index decide.
        if frame.width() > 0 && index.len() != frame.height() {
            return Err(AnalysisError::Load(format!(
                "index has {} entries but the data has {} rows",
                index.len(),
                frame.height()
            )));
        }
        Ok(Self {
            index_name: index_name.into(),
            index,
            frame,
        })
    }

    /// Wrap a frame with positional labels as index.
    pub fn from_frame(frame: DataFrame) -> Self {
        let index = RowIndex::positional(frame.height());
        Self {
            index_name: "index".to_string(),
            index,
            frame,
        }
    }

    /// A dataset with no rows and no columns.
    pub fn empty() -> Self {
        Self {
            index_name: "index".to_string(),
            index: RowIndex::Labels(Vec::new()),
            frame: DataFrame::empty(),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn index(&self) -> &RowIndex {
        &self.index
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn is_time_indexed(&self) -> bool {
        self.index.is_temporal()
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.index.len()
    }

    /// Number of data columns (the index is not counted).
    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0 || self.width() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }

    /// Names of integer and floating point columns, in frame order.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.frame
            .get_columns()
            .iter()
            .filter(|col| is_numeric_dtype(col.dtype()))
            .map(|col| col.name().to_string())
            .collect()
    }

    /// Values of `name` cast to `f64`, nulls preserved.
    pub fn column_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let column = self
            .frame
            .column(name)
            .map_err(|_| AnalysisError::ColumnNotFound(name.to_string()))?;
        let casted = column
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        let values = casted.f64()?.into_iter().collect();
        Ok(values)
    }

    /// Non-null values of `name` as `f64`, in row order.
    pub fn column_non_null(&self, name: &str) -> Result<Vec<f64>> {
        Ok(self
            .column_values(name)?
            .into_iter()
            .flatten()
            .filter(|v| !v.is_nan())
            .collect())
    }

    /// Number of nulls in `name`.
    pub fn null_count(&self, name: &str) -> Result<usize> {
        self.frame
            .column(name)
            .map(|col| col.null_count())
            .map_err(|_| AnalysisError::ColumnNotFound(name.to_string()))
    }

    /// Keep the rows whose mask value is `true`.
    pub fn filter(&self, keep: &[bool]) -> Result<Dataset> {
        if keep.len() != self.height() {
            return Err(AnalysisError::InvalidFilter(format!(
                "mask has {} entries for {} rows",
                keep.len(),
                self.height()
            )));
        }
        let mask = BooleanChunked::from_slice("mask".into(), keep);
        let frame = if self.frame.width() > 0 {
            self.frame.filter(&mask)?
        } else {
            self.frame.clone()
        };
        Ok(Dataset {
            index_name: self.index_name.clone(),
            index: self.index.filter(keep),
            frame,
        })
    }

    /// Replace the frame, keeping the index. Heights must match.
    pub fn with_frame(&self, frame: DataFrame) -> Result<Dataset> {
        Dataset::new(self.index_name.clone(), self.index.clone(), frame)
    }

    /// Earliest and latest timestamp, for time-indexed data.
    pub fn time_span(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let stamps = self.index.timestamps()?;
        let min = stamps.iter().min()?;
        let max = stamps.iter().max()?;
        Some((*min, *max))
    }

    /// Per-row membership in `range`. `None` when the index is not temporal.
    pub fn time_mask(&self, range: &TimeRange) -> Option<Vec<bool>> {
        self.index
            .timestamps()
            .map(|stamps| stamps.iter().map(|ts| range.contains(ts)).collect())
    }

    /// Estimated in-memory size in bytes (frame plus index).
    pub fn memory_usage_bytes(&self) -> usize {
        self.frame.estimated_size() + self.index.estimated_size()
    }

    pub fn memory_usage_mb(&self) -> f64 {
        self.memory_usage_bytes() as f64 / 1024.0 / 1024.0
    }

    /// Same index, same columns, same values (nulls compare equal).
    pub fn same_as(&self, other: &Dataset) -> bool {
        self.index_name == other.index_name
            && self.index == other.index
            && self.frame.equals_missing(&other.frame)
    }

    /// The frame with the index prepended as its first column.
    ///
    /// Timestamps are written as `%Y-%m-%d %H:%M:%S%.f` strings so that an
    /// exported file loads back with the same temporal index.
    pub fn to_export_frame(&self) -> Result<DataFrame> {
        let index_series = Series::new(self.index_name.as_str().into(), self.index.to_strings());
        let mut columns: Vec<Column> = Vec::with_capacity(self.width() + 1);
        columns.push(index_series.into());
        columns.extend(self.frame.get_columns().iter().cloned());
        Ok(DataFrame::new(columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn sample() -> Dataset {
        let frame = df![
            "temp" => [Some(20.0), None, Some(22.5), Some(30.0)],
            "grade" => ["a", "b", "c", "d"],
        ]
        .unwrap();
        let index = RowIndex::Timestamps(vec![ts(1, 0), ts(1, 1), ts(2, 0), ts(3, 0)]);
        Dataset::new("time", index, frame).unwrap()
    }

    #[test]
    fn test_new_rejects_mismatched_index() {
        let frame = df!["a" => [1, 2, 3]].unwrap();
        let result = Dataset::new("idx", RowIndex::positional(2), frame);
        assert!(result.is_err());
    }

    #[test]
    fn test_shape_and_columns() {
        let data = sample();
        assert_eq!(data.shape(), (4, 2));
        assert_eq!(data.column_names(), vec!["temp", "grade"]);
        assert_eq!(data.numeric_columns(), vec!["temp"]);
        assert!(data.is_time_indexed());
        assert_eq!(data.null_count("temp").unwrap(), 1);
    }

    #[test]
    fn test_column_values_missing_column() {
        let data = sample();
        let err = data.column_values("pressure").unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_filter_moves_index_with_rows() {
        let data = sample();
        let filtered = data.filter(&[true, false, false, true]).unwrap();
        assert_eq!(filtered.height(), 2);
        assert_eq!(filtered.index().key(1), RowKey::Timestamp(ts(3, 0)));
        assert_eq!(
            filtered.column_values("temp").unwrap(),
            vec![Some(20.0), Some(30.0)]
        );
    }

    #[test]
    fn test_time_span_and_mask() {
        let data = sample();
        assert_eq!(data.time_span(), Some((ts(1, 0), ts(3, 0))));

        let mask = data.time_mask(&TimeRange::new(ts(1, 1), ts(2, 0))).unwrap();
        assert_eq!(mask, vec![false, true, true, false]);

        let labelled = Dataset::from_frame(data.frame().clone());
        assert!(labelled.time_mask(&TimeRange::new(ts(1, 0), ts(2, 0))).is_none());
        assert!(labelled.time_span().is_none());
    }

    #[test]
    fn test_same_as_treats_nulls_as_equal() {
        let a = sample();
        let b = sample();
        assert!(a.same_as(&b));

        let c = a.filter(&[true, true, true, false]).unwrap();
        assert!(!a.same_as(&c));
    }

    #[test]
    fn test_export_frame_prepends_index() {
        let data = sample();
        let frame = data.to_export_frame().unwrap();
        assert_eq!(frame.width(), 3);
        assert_eq!(frame.get_column_names()[0].as_str(), "time");
        let first = frame
            .column("time")
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .get(0)
            .unwrap()
            .to_string();
        assert_eq!(first, "2024-01-01 00:00:00");
    }

    #[test]
    fn test_row_key_display() {
        assert_eq!(RowKey::Timestamp(ts(2, 5)).to_string(), "2024-01-02 05:00:00");
        assert_eq!(RowKey::Label("row-7".to_string()).to_string(), "row-7");

        let quarter = ts(2, 5) + chrono::TimeDelta::milliseconds(250);
        assert_eq!(RowKey::Timestamp(quarter).to_string(), "2024-01-02 05:00:00.250");
        assert_eq!(
            RowIndex::Timestamps(vec![ts(2, 5), quarter]).to_strings(),
            vec!["2024-01-02 05:00:00", "2024-01-02 05:00:00.250"]
        );
    }
}
