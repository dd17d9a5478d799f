//! Configuration types for process data analysis.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic session setup.

use crate::outliers::OutlierMethod;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Text encodings tried, in order, when decoding delimited text input.
pub const DEFAULT_ENCODINGS: [&str; 4] = ["utf-8", "shift_jis", "cp932", "iso-2022-jp"];

/// Configuration for an analysis session.
///
/// Use [`AnalysisConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use process_insight::config::AnalysisConfig;
/// use process_insight::outliers::OutlierMethod;
///
/// let config = AnalysisConfig::builder()
///     .default_method(OutlierMethod::ZScore)
///     .default_multiplier(3.0)
///     .histogram_bins(40)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Encodings tried in order when loading delimited text.
    /// Default: utf-8, shift_jis, cp932, iso-2022-jp
    pub encoding_candidates: Vec<String>,

    /// Advisory memory ceiling in megabytes. Datasets above it fail validation
    /// but stay usable.
    /// Default: 100.0
    pub memory_limit_mb: f64,

    /// Outlier method used when the caller does not name one.
    /// Default: Iqr
    pub default_method: OutlierMethod,

    /// Multiplier used when the caller does not give one.
    /// Default: 1.5
    pub default_multiplier: f64,

    /// IQR multiplier used by outlier statistics.
    /// Default: 1.5
    pub outlier_stats_iqr_multiplier: f64,

    /// Z-score threshold used by outlier statistics.
    /// Default: 3.0
    pub outlier_stats_zscore_threshold: f64,

    /// Maximum number of samples fed to the Shapiro-Wilk test.
    /// Default: 5000
    pub max_normality_samples: usize,

    /// Significance level for hypothesis tests.
    /// Default: 0.05
    pub significance_level: f64,

    /// Stricter significance level reported next to the default one.
    /// Default: 0.01
    pub strict_significance_level: f64,

    /// Absolute correlation above which a pair is highlighted in reports.
    /// Default: 0.7
    pub correlation_highlight_threshold: f64,

    /// Maximum number of highlighted correlation pairs in reports.
    /// Default: 10
    pub max_correlation_highlights: usize,

    /// Number of histogram bins.
    /// Default: 30
    pub histogram_bins: usize,

    /// Width of the mean ± k·σ band drawn on trend charts.
    /// Default: 1.0
    pub sigma_multiplier: f64,

    /// Size of exported charts in pixels.
    /// Default: 1200 x 800
    pub chart_width: u32,
    pub chart_height: u32,

    /// Size of charts embedded in reports in pixels.
    /// Default: 600 x 400
    pub report_chart_width: u32,
    pub report_chart_height: u32,

    /// Output directory for exported files.
    /// Default: "output"
    pub output_dir: PathBuf,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            encoding_candidates: DEFAULT_ENCODINGS.iter().map(|s| s.to_string()).collect(),
            memory_limit_mb: 100.0,
            default_method: OutlierMethod::default(),
            default_multiplier: 1.5,
            outlier_stats_iqr_multiplier: 1.5,
            outlier_stats_zscore_threshold: 3.0,
            max_normality_samples: 5000,
            significance_level: 0.05,
            strict_significance_level: 0.01,
            correlation_highlight_threshold: 0.7,
            max_correlation_highlights: 10,
            histogram_bins: 30,
            sigma_multiplier: 1.0,
            chart_width: 1200,
            chart_height: 800,
            report_chart_width: 600,
            report_chart_height: 400,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl AnalysisConfig {
    /// Create a new configuration builder.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Multiplier for `method` when the caller gives none: `default_multiplier`
    /// for the default method, the outlier statistics setting otherwise.
    pub fn multiplier_for(&self, method: OutlierMethod) -> f64 {
        if method == self.default_method {
            return self.default_multiplier;
        }
        match method {
            OutlierMethod::Iqr => self.outlier_stats_iqr_multiplier,
            OutlierMethod::ZScore => self.outlier_stats_zscore_threshold,
        }
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.encoding_candidates.is_empty() {
            return Err(ConfigValidationError::NoEncodings);
        }

        if !(self.memory_limit_mb > 0.0) {
            return Err(ConfigValidationError::NonPositive {
                field: "memory_limit_mb".to_string(),
                value: self.memory_limit_mb,
            });
        }

        for (field, value) in [
            ("default_multiplier", self.default_multiplier),
            ("outlier_stats_iqr_multiplier", self.outlier_stats_iqr_multiplier),
            ("outlier_stats_zscore_threshold", self.outlier_stats_zscore_threshold),
            ("sigma_multiplier", self.sigma_multiplier),
        ] {
            if !(value > 0.0) {
                return Err(ConfigValidationError::NonPositive {
                    field: field.to_string(),
                    value,
                });
            }
        }

        for (field, value) in [
            ("significance_level", self.significance_level),
            ("strict_significance_level", self.strict_significance_level),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(ConfigValidationError::InvalidProbability {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if !(0.0..=1.0).contains(&self.correlation_highlight_threshold) {
            return Err(ConfigValidationError::InvalidProbability {
                field: "correlation_highlight_threshold".to_string(),
                value: self.correlation_highlight_threshold,
            });
        }

        if self.histogram_bins == 0 {
            return Err(ConfigValidationError::InvalidBins(self.histogram_bins));
        }

        if self.max_normality_samples < 3 {
            return Err(ConfigValidationError::InvalidSampleLimit(
                self.max_normality_samples,
            ));
        }

        if self.chart_width == 0
            || self.chart_height == 0
            || self.report_chart_width == 0
            || self.report_chart_height == 0
        {
            return Err(ConfigValidationError::InvalidChartSize);
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("At least one encoding candidate is required")]
    NoEncodings,

    #[error("Invalid value for '{field}': {value} (must be positive)")]
    NonPositive { field: String, value: f64 },

    #[error("Invalid value for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidProbability { field: String, value: f64 },

    #[error("Invalid histogram bins: {0} (must be at least 1)")]
    InvalidBins(usize),

    #[error("Invalid normality sample limit: {0} (must be at least 3)")]
    InvalidSampleLimit(usize),

    #[error("Chart dimensions must be non-zero")]
    InvalidChartSize,
}

/// Builder for [`AnalysisConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    encoding_candidates: Option<Vec<String>>,
    memory_limit_mb: Option<f64>,
    default_method: Option<OutlierMethod>,
    default_multiplier: Option<f64>,
    max_normality_samples: Option<usize>,
    significance_level: Option<f64>,
    correlation_highlight_threshold: Option<f64>,
    histogram_bins: Option<usize>,
    sigma_multiplier: Option<f64>,
    chart_size: Option<(u32, u32)>,
    report_chart_size: Option<(u32, u32)>,
    output_dir: Option<PathBuf>,
}

impl AnalysisConfigBuilder {
    /// Set the ordered list of encodings tried for delimited text.
    pub fn encoding_candidates<I, S>(mut self, encodings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.encoding_candidates = Some(encodings.into_iter().map(Into::into).collect());
        self
    }

    /// Set the advisory memory ceiling in megabytes.
    pub fn memory_limit_mb(mut self, limit: f64) -> Self {
        self.memory_limit_mb = Some(limit);
        self
    }

    /// Set the default outlier method.
    pub fn default_method(mut self, method: OutlierMethod) -> Self {
        self.default_method = Some(method);
        self
    }

    /// Set the default outlier multiplier.
    pub fn default_multiplier(mut self, multiplier: f64) -> Self {
        self.default_multiplier = Some(multiplier);
        self
    }

    /// Set the Shapiro-Wilk sample limit.
    pub fn max_normality_samples(mut self, limit: usize) -> Self {
        self.max_normality_samples = Some(limit);
        self
    }

    /// Set the significance level used by hypothesis tests.
    pub fn significance_level(mut self, alpha: f64) -> Self {
        self.significance_level = Some(alpha);
        self
    }

    /// Set the |r| threshold for highlighted correlation pairs.
    pub fn correlation_highlight_threshold(mut self, threshold: f64) -> Self {
        self.correlation_highlight_threshold = Some(threshold);
        self
    }

    /// Set the number of histogram bins.
    pub fn histogram_bins(mut self, bins: usize) -> Self {
        self.histogram_bins = Some(bins);
        self
    }

    /// Set the k in the mean ± k·σ trend band.
    pub fn sigma_multiplier(mut self, k: f64) -> Self {
        self.sigma_multiplier = Some(k);
        self
    }

    /// Set the exported chart size.
    pub fn chart_size(mut self, width: u32, height: u32) -> Self {
        self.chart_size = Some((width, height));
        self
    }

    /// Set the size of charts embedded in reports.
    pub fn report_chart_size(mut self, width: u32, height: u32) -> Self {
        self.report_chart_size = Some((width, height));
        self
    }

    /// Set the output directory for exported files.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `AnalysisConfig` or an error if validation fails.
    pub fn build(self) -> Result<AnalysisConfig, ConfigValidationError> {
        let defaults = AnalysisConfig::default();
        let (chart_width, chart_height) = self
            .chart_size
            .unwrap_or((defaults.chart_width, defaults.chart_height));
        let (report_chart_width, report_chart_height) = self.report_chart_size.unwrap_or((
            defaults.report_chart_width,
            defaults.report_chart_height,
        ));

        let config = AnalysisConfig {
            encoding_candidates: self
                .encoding_candidates
                .unwrap_or(defaults.encoding_candidates),
            memory_limit_mb: self.memory_limit_mb.unwrap_or(defaults.memory_limit_mb),
            default_method: self.default_method.unwrap_or_default(),
            default_multiplier: self
                .default_multiplier
                .unwrap_or(defaults.default_multiplier),
            max_normality_samples: self
                .max_normality_samples
                .unwrap_or(defaults.max_normality_samples),
            significance_level: self
                .significance_level
                .unwrap_or(defaults.significance_level),
            correlation_highlight_threshold: self
                .correlation_highlight_threshold
                .unwrap_or(defaults.correlation_highlight_threshold),
            histogram_bins: self.histogram_bins.unwrap_or(defaults.histogram_bins),
            sigma_multiplier: self.sigma_multiplier.unwrap_or(defaults.sigma_multiplier),
            chart_width,
            chart_height,
            report_chart_width,
            report_chart_height,
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.encoding_candidates, DEFAULT_ENCODINGS.to_vec());
        assert_eq!(config.memory_limit_mb, 100.0);
        assert_eq!(config.default_method, OutlierMethod::Iqr);
        assert_eq!(config.default_multiplier, 1.5);
        assert_eq!(config.max_normality_samples, 5000);
        assert_eq!(config.histogram_bins, 30);
        assert_eq!((config.chart_width, config.chart_height), (1200, 800));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = AnalysisConfig::builder()
            .default_method(OutlierMethod::ZScore)
            .default_multiplier(3.0)
            .histogram_bins(50)
            .chart_size(800, 600)
            .encoding_candidates(["utf-8"])
            .build()
            .unwrap();

        assert_eq!(config.default_method, OutlierMethod::ZScore);
        assert_eq!(config.default_multiplier, 3.0);
        assert_eq!(config.histogram_bins, 50);
        assert_eq!((config.chart_width, config.chart_height), (800, 600));
        assert_eq!(config.encoding_candidates, vec!["utf-8".to_string()]);
        // untouched fields keep their defaults
        assert_eq!(config.report_chart_width, 600);
        assert_eq!(config.outlier_stats_zscore_threshold, 3.0);
    }

    #[test]
    fn test_validation_rejects_zero_bins() {
        let result = AnalysisConfig::builder().histogram_bins(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidBins(0)
        ));
    }

    #[test]
    fn test_validation_rejects_bad_significance() {
        let result = AnalysisConfig::builder().significance_level(1.5).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidProbability { .. }
        ));
    }

    #[test]
    fn test_validation_rejects_negative_multiplier() {
        let result = AnalysisConfig::builder().default_multiplier(-1.0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::NonPositive { .. }
        ));
    }

    #[test]
    fn test_validation_rejects_empty_encodings() {
        let empty: Vec<String> = Vec::new();
        let result = AnalysisConfig::builder().encoding_candidates(empty).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::NoEncodings
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = AnalysisConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: AnalysisConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config.memory_limit_mb, deserialized.memory_limit_mb);
        assert_eq!(config.default_method, deserialized.default_method);
        assert_eq!(config.encoding_candidates, deserialized.encoding_candidates);
    }

    #[test]
    fn test_multiplier_for_uses_defaults() {
        let config = AnalysisConfig::builder()
            .default_method(OutlierMethod::ZScore)
            .default_multiplier(2.5)
            .build()
            .unwrap();
        assert_eq!(config.multiplier_for(OutlierMethod::ZScore), 2.5);
        assert_eq!(config.multiplier_for(OutlierMethod::Iqr), 1.5);

        let config = AnalysisConfig::default();
        assert_eq!(config.multiplier_for(OutlierMethod::Iqr), 1.5);
        assert_eq!(config.multiplier_for(OutlierMethod::ZScore), 3.0);
    }
}
