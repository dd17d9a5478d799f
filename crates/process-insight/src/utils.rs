//! Shared utilities for loading and describing process data.
//!
//! This module contains common helper functions used across multiple modules
//! to reduce code duplication and ensure consistency.

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;

/// Canonical timestamp format used for display and export.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Row keys and exported index values: [`TIMESTAMP_FORMAT`] plus the
/// fractional seconds when there are any.
pub const KEY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Minute-resolution timestamp format used in history tables.
pub const MINUTE_FORMAT: &str = "%Y-%m-%d %H:%M";

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Short lowercase name of a dtype for tables and summaries.
pub fn dtype_label(dtype: &DataType) -> String {
    match dtype {
        DataType::Int64 => "int64".to_string(),
        DataType::Float64 => "float64".to_string(),
        DataType::String => "string".to_string(),
        DataType::Boolean => "bool".to_string(),
        other => other.to_string().to_lowercase(),
    }
}

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Cell values treated as missing when reading delimited text.
pub const NULL_MARKERS: [&str; 11] = [
    "", "na", "n/a", "nan", "null", "none", "#n/a", "-nan", "<na>", "-", "#value!",
];

/// Check if a raw cell value means "missing".
pub fn is_null_marker(s: &str) -> bool {
    let lower = s.trim().to_ascii_lowercase();
    NULL_MARKERS.iter().any(|&marker| lower == marker)
}

/// Parse an integer cell, tolerating surrounding whitespace.
pub fn parse_integer(s: &str) -> Option<i64> {
    s.trim().parse::<i64>().ok()
}

/// Parse a floating point cell, tolerating surrounding whitespace.
pub fn parse_float(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

/// Date-time layouts accepted for the row index, tried in order.
const DATETIME_FORMATS: [&str; 11] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M",
    "%Y.%m.%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

/// Date-only layouts; the time becomes midnight.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

/// Parse a cell as a timestamp using the accepted layouts.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

// =============================================================================
// Formatting Utilities
// =============================================================================

/// Whole days between two timestamps (floor, like a calendar day count).
pub fn span_days(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    (end - start).num_days()
}

/// Truncate a string to `max_len` characters, marking the cut with "...".
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format a float with `decimals` digits; non-finite values print as "N/A".
pub fn fmt_float(value: f64, decimals: usize) -> String {
    if value.is_finite() {
        format!("{:.*}", decimals, value)
    } else {
        "N/A".to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_dtype_label() {
        assert_eq!(dtype_label(&DataType::Float64), "float64");
        assert_eq!(dtype_label(&DataType::String), "string");
    }

    #[test]
    fn test_null_markers() {
        assert!(is_null_marker(""));
        assert!(is_null_marker("  NaN "));
        assert!(is_null_marker("N/A"));
        assert!(!is_null_marker("0"));
        assert!(!is_null_marker("abc"));
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_integer(" 42 "), Some(42));
        assert_eq!(parse_integer("4.2"), None);
        assert_eq!(parse_float("4.25"), Some(4.25));
        assert_eq!(parse_float("1e3"), Some(1000.0));
        assert_eq!(parse_float("abc"), None);
    }

    #[test]
    fn test_parse_timestamp_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-03-05 14:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T14:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024/03/05 14:30"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-03-05"),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("batch-7"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("a_very_long_column_name", 10), "a_very_...");
    }

    #[test]
    fn test_fmt_float() {
        assert_eq!(fmt_float(1.23456, 3), "1.235");
        assert_eq!(fmt_float(f64::NAN, 2), "N/A");
    }
}
