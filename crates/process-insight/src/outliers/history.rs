//! Operation records and their tabular summaries.

use crate::outliers::OutlierMethod;
use crate::types::{RowKey, TimeRange, ValueRange};
use crate::utils::{MINUTE_FORMAT, TIMESTAMP_FORMAT};
use chrono::{DateTime, Local};
use serde::Serialize;

/// What a removal operation did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationKind {
    /// Rows inside a user-drawn time and/or value window were removed.
    Range {
        time_range: Option<TimeRange>,
        value_range: Option<ValueRange>,
    },
    /// Rows outside statistically derived bounds were removed.
    Statistical {
        method: OutlierMethod,
        multiplier: f64,
        lower_bound: f64,
        upper_bound: f64,
    },
}

impl OperationKind {
    /// One-line description, e.g. `IQR (multiplier: 1.5)`.
    pub fn describe(&self) -> String {
        match self {
            OperationKind::Statistical {
                method, multiplier, ..
            } => format!("{} (multiplier: {})", method.display_name(), multiplier),
            OperationKind::Range {
                time_range,
                value_range,
            } => {
                let mut parts = Vec::new();
                if let Some(range) = time_range {
                    parts.push(format!(
                        "time: {} to {}",
                        range.start.format(MINUTE_FORMAT),
                        range.end.format(MINUTE_FORMAT)
                    ));
                }
                if let Some(range) = value_range {
                    parts.push(format!("value: {:.2} to {:.2}", range.min, range.max));
                }
                format!("Range ({})", parts.join(", "))
            }
        }
    }

    /// Short label without parameters: `IQR`, `Z-score` or `Range`.
    pub fn short_name(&self) -> &'static str {
        match self {
            OperationKind::Statistical { method, .. } => method.display_name(),
            OperationKind::Range { .. } => "Range",
        }
    }
}

/// One entry of the removal history. Immutable once appended.
#[derive(Debug, Clone, Serialize)]
pub struct OperationRecord {
    /// Position in the history, assigned at append time.
    pub id: usize,
    pub column: String,
    #[serde(flatten)]
    pub kind: OperationKind,
    /// Index keys of the removed rows, in row order.
    pub removed_keys: Vec<RowKey>,
    /// Positions of the removed rows in the dataset the operation received.
    #[serde(skip)]
    pub removed_positions: Vec<usize>,
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns: usize,
    pub timestamp: DateTime<Local>,
}

impl OperationRecord {
    pub fn removed_count(&self) -> usize {
        self.removed_keys.len()
    }

    pub fn method_description(&self) -> String {
        self.kind.describe()
    }

    pub fn summary_row(&self) -> HistorySummaryRow {
        HistorySummaryRow {
            operation_id: self.id,
            timestamp: self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            column: self.column.clone(),
            method: self.method_description(),
            removed_count: self.removed_count(),
            rows_before: self.rows_before,
            rows_after: self.rows_after,
        }
    }
}

/// Human-readable history row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySummaryRow {
    pub operation_id: usize,
    pub timestamp: String,
    pub column: String,
    pub method: String,
    pub removed_count: usize,
    pub rows_before: usize,
    pub rows_after: usize,
}

/// Serializable dump of the whole history.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryExport {
    pub history: Vec<OperationRecord>,
    pub total_operations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(kind: OperationKind) -> OperationRecord {
        OperationRecord {
            id: 0,
            column: "temp".to_string(),
            kind,
            removed_keys: vec![RowKey::Label("3".to_string())],
            removed_positions: vec![3],
            rows_before: 10,
            rows_after: 9,
            columns: 2,
            timestamp: Local::now(),
        }
    }

    #[test]
    fn test_statistical_description() {
        let kind = OperationKind::Statistical {
            method: OutlierMethod::Iqr,
            multiplier: 1.5,
            lower_bound: 0.0,
            upper_bound: 1.0,
        };
        assert_eq!(kind.describe(), "IQR (multiplier: 1.5)");

        let kind = OperationKind::Statistical {
            method: OutlierMethod::ZScore,
            multiplier: 3.0,
            lower_bound: 0.0,
            upper_bound: 1.0,
        };
        assert_eq!(kind.describe(), "Z-score (multiplier: 3)");
    }

    #[test]
    fn test_range_description_joins_given_parts() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(17, 30, 0)
            .unwrap();

        let both = OperationKind::Range {
            time_range: Some(TimeRange::new(start, end)),
            value_range: Some(ValueRange::new(0.0, 50.0)),
        };
        assert_eq!(
            both.describe(),
            "Range (time: 2024-01-01 08:00 to 2024-01-02 17:30, value: 0.00 to 50.00)"
        );

        let value_only = OperationKind::Range {
            time_range: None,
            value_range: Some(ValueRange::new(-1.5, 2.25)),
        };
        assert_eq!(value_only.describe(), "Range (value: -1.50 to 2.25)");
    }

    #[test]
    fn test_summary_row() {
        let rec = record(OperationKind::Range {
            time_range: None,
            value_range: Some(ValueRange::new(1.0, 2.0)),
        });
        let row = rec.summary_row();
        assert_eq!(row.operation_id, 0);
        assert_eq!(row.removed_count, 1);
        assert_eq!(row.rows_before, 10);
        assert_eq!(row.rows_after, 9);
        assert_eq!(row.timestamp.len(), "2024-01-01 00:00:00".len());
    }

    #[test]
    fn test_record_serialization_is_flat() {
        let rec = record(OperationKind::Statistical {
            method: OutlierMethod::ZScore,
            multiplier: 2.0,
            lower_bound: -1.0,
            upper_bound: 1.0,
        });
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["kind"], "statistical");
        assert_eq!(json["method"], "zscore");
        assert_eq!(json["removed_keys"][0], "3");
        assert!(json.get("removed_positions").is_none());
    }
}
