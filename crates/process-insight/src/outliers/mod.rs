//! Outlier removal with an undoable history.
//!
//! Every removal is recorded as an [`OperationRecord`] and the dataset it
//! received is kept as a snapshot, so the data can be rolled back to the state
//! before any recorded operation.
//!
//! ```ignore
//! let mut remover = OutlierRemover::new();
//! remover.initialize(&data);
//! let cleaned = remover.apply_statistical_filter(&data, "temp", OutlierMethod::Iqr, 1.5)?;
//! let before = remover.restore(0)?;
//! ```

mod bounds;
mod history;
mod remover;

pub use bounds::{OutlierBounds, OutlierMethod};
pub use history::{HistoryExport, HistorySummaryRow, OperationKind, OperationRecord};
pub use remover::OutlierRemover;
