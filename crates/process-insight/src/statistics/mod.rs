//! Statistics engine.
//!
//! Stateless functions over a [`Dataset`](crate::types::Dataset): descriptive
//! tables, correlation, normality, time-series trend and two-period
//! comparison. Inputs are never modified.
//!
//! Numbers follow the usual dataframe conventions: sample standard deviation
//! (n − 1), linearly interpolated quantiles, pairwise-complete correlation.

pub mod correlation;
pub mod descriptive;
pub mod hypothesis;
pub mod normality;
pub mod summary;
pub mod timeseries;

pub use correlation::{
    CorrelatedPair, CorrelationMatrix, CorrelationSignificance, correlation_matrix,
    correlation_with_significance,
};
pub use descriptive::{BasicStatisticsRow, ColumnStatistics, basic_statistics};
pub use hypothesis::{PeriodComparison, PeriodSummary, TestOutcome, compare_periods};
pub use normality::{NormalityReport, NormalityResult, normality_tests};
pub use summary::{OutlierStatistics, outlier_statistics, statistics_summary};
pub use timeseries::{Trend, TrendDirection, TimeSeriesStatistics, time_series_statistics};
