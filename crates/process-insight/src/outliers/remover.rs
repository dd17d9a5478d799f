//! The outlier remover: filters plus the snapshot store behind undo.

use crate::error::{AnalysisError, Result};
use crate::outliers::{
    HistoryExport, HistorySummaryRow, OperationKind, OperationRecord, OutlierBounds,
    OutlierMethod,
};
use crate::types::{Dataset, TimeRange, ValueRange};
use chrono::Local;
use tracing::{debug, info};

/// Removes outliers and keeps enough state to undo any removal.
///
/// Snapshot `i` is the dataset as it was right before operation `i`, so the
/// snapshot list and the history always grow and shrink together. The
/// dataset given to [`OutlierRemover::initialize`] is kept separately as the
/// initial snapshot.
#[derive(Debug, Default, Clone)]
pub struct OutlierRemover {
    initial: Option<Dataset>,
    history: Vec<OperationRecord>,
    snapshots: Vec<Dataset>,
}

impl OutlierRemover {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything and store `data` as the initial snapshot.
    pub fn initialize(&mut self, data: &Dataset) {
        self.history.clear();
        self.snapshots.clear();
        self.initial = Some(data.clone());
        debug!(rows = data.height(), "Outlier history initialized");
    }

    // ==================== Filters ====================

    /// Remove the rows that fall inside every given range.
    ///
    /// The time range applies to the row index, the value range to `column`.
    /// Both bounds are inclusive. Rows with a missing value in `column` never
    /// match a value range.
    pub fn apply_range_filter(
        &mut self,
        data: &Dataset,
        column: &str,
        time_range: Option<TimeRange>,
        value_range: Option<ValueRange>,
    ) -> Result<Dataset> {
        if data.is_empty() {
            return Ok(data.clone());
        }
        if time_range.is_none() && value_range.is_none() {
            return Err(AnalysisError::InvalidFilter(
                "a range filter needs a time range, a value range or both".to_string(),
            ));
        }

        let mut remove = vec![true; data.height()];

        if let Some(range) = &time_range {
            let in_range = data.time_mask(range).ok_or_else(|| {
                AnalysisError::InvalidFilter(
                    "time range given but the data has no timestamp index".to_string(),
                )
            })?;
            for (flag, hit) in remove.iter_mut().zip(in_range) {
                *flag &= hit;
            }
        }

        if let Some(range) = &value_range {
            let values = data.column_values(column)?;
            for (flag, value) in remove.iter_mut().zip(values) {
                *flag &= value.is_some_and(|v| range.contains(v));
            }
        }

        let kind = OperationKind::Range {
            time_range,
            value_range,
        };
        self.commit(data, column, kind, &remove)
    }

    /// Remove the rows of `column` outside the bounds of `method`.
    pub fn apply_statistical_filter(
        &mut self,
        data: &Dataset,
        column: &str,
        method: OutlierMethod,
        multiplier: f64,
    ) -> Result<Dataset> {
        if data.is_empty() {
            return Ok(data.clone());
        }

        let values = data.column_values(column)?;
        let non_null: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
        let bounds = OutlierBounds::compute(&non_null, method, multiplier);
        let remove = bounds.mask(&values);

        let kind = OperationKind::Statistical {
            method,
            multiplier,
            lower_bound: bounds.lower,
            upper_bound: bounds.upper,
        };
        self.commit(data, column, kind, &remove)
    }

    /// Same as [`apply_statistical_filter`](Self::apply_statistical_filter)
    /// with the method given by name. An unknown name changes nothing.
    pub fn apply_statistical_filter_by_name(
        &mut self,
        data: &Dataset,
        column: &str,
        method: &str,
        multiplier: f64,
    ) -> Result<Dataset> {
        let method: OutlierMethod = method.parse()?;
        self.apply_statistical_filter(data, column, method, multiplier)
    }

    /// Which rows a statistical filter would remove, without removing them.
    ///
    /// Returns an all-false mask when the column is absent or the method is
    /// unknown.
    pub fn preview_candidates(
        data: &Dataset,
        column: &str,
        method: &str,
        multiplier: f64,
    ) -> Vec<bool> {
        let none = vec![false; data.height()];
        let Ok(method) = method.parse::<OutlierMethod>() else {
            return none;
        };
        let Ok(values) = data.column_values(column) else {
            return none;
        };
        let non_null: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
        OutlierBounds::compute(&non_null, method, multiplier).mask(&values)
    }

    /// Drop the flagged rows, store the pre-operation snapshot and append a record.
    fn commit(
        &mut self,
        data: &Dataset,
        column: &str,
        kind: OperationKind,
        remove: &[bool],
    ) -> Result<Dataset> {
        let keep: Vec<bool> = remove.iter().map(|r| !r).collect();
        let filtered = data.filter(&keep)?;

        let removed_positions: Vec<usize> = remove
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.then_some(i))
            .collect();
        let removed_keys = removed_positions
            .iter()
            .map(|&i| data.index().key(i))
            .collect();

        let id = self.history.len();
        self.snapshots.truncate(id);
        self.snapshots.push(data.clone());

        let record = OperationRecord {
            id,
            column: column.to_string(),
            kind,
            removed_keys,
            removed_positions,
            rows_before: data.height(),
            rows_after: filtered.height(),
            columns: data.width(),
            timestamp: Local::now(),
        };
        info!(
            operation = id,
            column,
            method = %record.method_description(),
            removed = record.removed_count(),
            "Outliers removed"
        );
        self.history.push(record);

        Ok(filtered)
    }

    // ==================== Undo ====================

    /// Return the data as it was before operation `operation_id`.
    ///
    /// Later operations are forgotten. The snapshot itself is kept, so the
    /// same id can be restored again.
    pub fn restore(&mut self, operation_id: usize) -> Result<Dataset> {
        let Some(snapshot) = self.snapshots.get(operation_id).cloned() else {
            return Err(AnalysisError::UnknownOperation(operation_id));
        };
        self.history.truncate(operation_id);
        self.snapshots.truncate(operation_id + 1);
        info!(operation = operation_id, rows = snapshot.height(), "Restored snapshot");
        Ok(snapshot)
    }

    /// Return the initial data and forget every operation.
    pub fn restore_initial(&mut self) -> Option<Dataset> {
        let initial = self.initial.clone()?;
        self.history.clear();
        self.snapshots.clear();
        info!(rows = initial.height(), "Restored initial data");
        Some(initial)
    }

    /// Forget the most recent operation without touching any data.
    pub fn remove_last_operation(&mut self) -> Option<OperationRecord> {
        let record = self.history.pop()?;
        self.snapshots.truncate(self.history.len());
        Some(record)
    }

    /// Empty the history and every snapshot, the initial one included.
    pub fn clear(&mut self) {
        self.history.clear();
        self.snapshots.clear();
        self.initial = None;
        debug!("Outlier history cleared");
    }

    // ==================== Queries ====================

    pub fn history(&self) -> &[OperationRecord] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Number of per-operation snapshots (the initial one is not counted).
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn initial(&self) -> Option<&Dataset> {
        self.initial.as_ref()
    }

    pub fn summary(&self) -> Vec<HistorySummaryRow> {
        self.history.iter().map(OperationRecord::summary_row).collect()
    }

    /// Rows that operation `operation_id` removed, taken from its snapshot.
    pub fn removed_rows(&self, operation_id: usize) -> Option<Dataset> {
        let record = self.history.get(operation_id)?;
        let snapshot = self.snapshots.get(operation_id)?;
        let mut keep = vec![false; snapshot.height()];
        for &pos in &record.removed_positions {
            if let Some(flag) = keep.get_mut(pos) {
                *flag = true;
            }
        }
        snapshot.filter(&keep).ok()
    }

    pub fn export_history(&self) -> HistoryExport {
        HistoryExport {
            history: self.history.clone(),
            total_operations: self.history.len(),
        }
    }
}
