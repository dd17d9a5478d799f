//! Advisory checks on a loaded dataset.

use crate::types::Dataset;
use serde::Serialize;

/// Outcome of [`validate`]: usable or not, plus every problem found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn into_tuple(self) -> (bool, Vec<String>) {
        (self.is_valid, self.errors)
    }
}

/// Check that data is present, non-empty, has numeric columns and stays under
/// the memory ceiling. All problems are reported, not just the first.
pub fn validate(data: Option<&Dataset>, memory_limit_mb: f64) -> ValidationReport {
    let Some(data) = data else {
        return ValidationReport {
            is_valid: false,
            errors: vec!["No data loaded".to_string()],
        };
    };

    let mut errors = Vec::new();
    if data.is_empty() {
        errors.push("Dataset is empty".to_string());
    }
    if data.numeric_columns().is_empty() {
        errors.push("No numeric columns found".to_string());
    }
    let memory_mb = data.memory_usage_mb();
    if memory_mb > memory_limit_mb {
        errors.push(format!("Data size too large: {:.1}MB", memory_mb));
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
    }
}
