//! Analysis session: the state a user works on between actions.
//!
//! The session owns the data processor, the outlier history and the warnings
//! collected since the last load. Every handler takes `&mut self` and either
//! succeeds or leaves the session exactly as it was.

use crate::charts::{self, ChartFormat, Figure, TrendOptions};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, ComputationWarning, Result, WarningKind};
use crate::outliers::{HistoryExport, HistorySummaryRow, OperationRecord, OutlierMethod, OutlierRemover};
use crate::processor::{DataInfo, DataProcessor, MissingValueStrategy, ValidationReport};
use crate::reporting::{
    AnalysisResults, DocumentRenderer, Report, ReportFormat, ReportGenerator, ReportInputs,
    export_data_summary, quick_report, renderer_for,
};
use crate::statistics::{
    self, BasicStatisticsRow, ColumnStatistics, CorrelationMatrix, CorrelationSignificance,
    NormalityResult, OutlierStatistics, PeriodComparison, TimeSeriesStatistics,
};
use crate::types::{Dataset, TimeRange, ValueRange};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// A rendered report and the format it actually ended up in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedReport {
    pub format: ReportFormat,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct AnalysisSession {
    config: AnalysisConfig,
    processor: DataProcessor,
    remover: OutlierRemover,
    warnings: Vec<ComputationWarning>,
}

static_assertions::assert_impl_all!(AnalysisSession: Send);

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl AnalysisSession {
    pub fn new(config: AnalysisConfig) -> Self {
        let processor = DataProcessor::new(&config);
        Self {
            config,
            processor,
            remover: OutlierRemover::new(),
            warnings: Vec::new(),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    // ==================== Loading ====================

    /// Load a CSV or spreadsheet file as the new working data.
    pub fn load_file(&mut self, path: &Path) -> Result<&Dataset> {
        let warnings = self.processor.load_file(path)?;
        info!(path = %path.display(), "Loaded file");
        self.start_over(warnings)
    }

    /// Load delimited text from memory as the new working data.
    pub fn load_csv_bytes(&mut self, bytes: &[u8]) -> Result<&Dataset> {
        let warnings = self.processor.load_csv_bytes(bytes)?;
        self.start_over(warnings)
    }

    pub fn load_dataset(&mut self, dataset: Dataset) -> &Dataset {
        let data = self.processor.load_dataset(dataset);
        self.remover.initialize(data);
        self.warnings.clear();
        data
    }

    fn start_over(&mut self, warnings: Vec<ComputationWarning>) -> Result<&Dataset> {
        let data = self.processor.data().ok_or(AnalysisError::NoDataLoaded)?;
        self.remover.initialize(data);
        self.warnings = warnings;
        Ok(data)
    }

    // ==================== Access ====================

    pub fn data(&self) -> Option<&Dataset> {
        self.processor.data()
    }

    pub fn original_data(&self) -> Option<&Dataset> {
        self.processor.original_data()
    }

    fn require_data(&self) -> Result<&Dataset> {
        self.processor.data().ok_or(AnalysisError::NoDataLoaded)
    }

    /// `columns`, or every numeric column when empty.
    fn selection(&self, columns: &[String]) -> Result<Vec<String>> {
        if columns.is_empty() {
            Ok(self.require_data()?.numeric_columns())
        } else {
            Ok(columns.to_vec())
        }
    }

    pub fn data_info(&self) -> Option<DataInfo> {
        self.processor.data_info()
    }

    pub fn numeric_columns(&self) -> Vec<String> {
        self.processor.numeric_columns()
    }

    pub fn column_statistics(&self, column: &str) -> Result<Option<ColumnStatistics>> {
        self.processor.column_statistics(column)
    }

    pub fn filter_by_date_range(&self, range: &TimeRange) -> Result<Dataset> {
        self.processor.filter_by_date_range(range)
    }

    pub fn validate(&self) -> ValidationReport {
        self.processor.validate()
    }

    // ==================== Outlier removal ====================

    pub fn apply_range_filter(
        &mut self,
        column: &str,
        time_range: Option<TimeRange>,
        value_range: Option<ValueRange>,
    ) -> Result<&Dataset> {
        let data = self.processor.data().ok_or(AnalysisError::NoDataLoaded)?;
        let filtered = self
            .remover
            .apply_range_filter(data, column, time_range, value_range)?;
        Ok(self.replace_data(filtered))
    }

    pub fn apply_statistical_filter(
        &mut self,
        column: &str,
        method: &str,
        multiplier: f64,
    ) -> Result<&Dataset> {
        let data = self.processor.data().ok_or(AnalysisError::NoDataLoaded)?;
        let filtered = self
            .remover
            .apply_statistical_filter_by_name(data, column, method, multiplier)?;
        Ok(self.replace_data(filtered))
    }

    /// Statistical filter on `column`. `method` and `multiplier` fall back to
    /// the configured defaults when not given.
    pub fn apply_statistical_filter_or_default(
        &mut self,
        column: &str,
        method: Option<OutlierMethod>,
        multiplier: Option<f64>,
    ) -> Result<&Dataset> {
        let method = method.unwrap_or(self.config.default_method);
        let multiplier = multiplier.unwrap_or_else(|| self.config.multiplier_for(method));
        let data = self.processor.data().ok_or(AnalysisError::NoDataLoaded)?;
        let filtered = self
            .remover
            .apply_statistical_filter(data, column, method, multiplier)?;
        Ok(self.replace_data(filtered))
    }

    /// Rows the statistical filter would remove right now.
    pub fn preview_candidates(&self, column: &str, method: &str, multiplier: f64) -> Result<Vec<bool>> {
        let data = self.require_data()?;
        Ok(OutlierRemover::preview_candidates(data, column, method, multiplier))
    }

    /// Roll back to the data as it was before operation `operation_id`.
    pub fn restore(&mut self, operation_id: usize) -> Result<&Dataset> {
        let restored = self.remover.restore(operation_id)?;
        Ok(self.replace_data(restored))
    }

    /// Roll back every operation.
    pub fn restore_initial(&mut self) -> Result<&Dataset> {
        let restored = self.remover.restore_initial().ok_or(AnalysisError::NoDataLoaded)?;
        Ok(self.replace_data(restored))
    }

    /// Forget the history. The working data stays as it is.
    pub fn clear_history(&mut self) {
        self.remover.clear();
    }

    pub fn history(&self) -> &[OperationRecord] {
        self.remover.history()
    }

    pub fn history_summary(&self) -> Vec<HistorySummaryRow> {
        self.remover.summary()
    }

    pub fn export_history(&self) -> HistoryExport {
        self.remover.export_history()
    }

    pub fn removed_rows(&self, operation_id: usize) -> Option<Dataset> {
        self.remover.removed_rows(operation_id)
    }

    fn replace_data(&mut self, data: Dataset) -> &Dataset {
        self.processor.update_data(data)
    }

    // ==================== Cleaning ====================

    /// Back to the data as loaded, with a fresh history.
    pub fn reset_data(&mut self) -> Result<&Dataset> {
        self.processor.reset_data();
        self.start_over(Vec::new())
    }

    pub fn handle_missing_values(&mut self, strategy: MissingValueStrategy) -> Result<&Dataset> {
        self.processor.handle_missing_values(strategy)?;
        self.require_data()
    }

    // ==================== Statistics ====================

    pub fn basic_statistics(&self, columns: &[String]) -> Result<Vec<BasicStatisticsRow>> {
        statistics::basic_statistics(self.require_data()?, &self.selection(columns)?)
    }

    pub fn correlation_matrix(&self, columns: &[String]) -> Result<CorrelationMatrix> {
        statistics::correlation_matrix(self.require_data()?, &self.selection(columns)?)
    }

    pub fn correlation_with_significance(&self, columns: &[String]) -> Result<Vec<CorrelationSignificance>> {
        statistics::correlation_with_significance(
            self.require_data()?,
            &self.selection(columns)?,
            self.config.significance_level,
            self.config.strict_significance_level,
        )
    }

    /// Normality tests; columns whose tests fail are left out and noted as warnings.
    pub fn normality_tests(&mut self, columns: &[String]) -> Result<Vec<NormalityResult>> {
        let report = statistics::normality_tests(
            self.require_data()?,
            &self.selection(columns)?,
            self.config.max_normality_samples,
            self.config.significance_level,
        )?;
        self.warnings.extend(report.warnings);
        Ok(report.results)
    }

    pub fn time_series_statistics(&self, column: &str) -> Result<Option<TimeSeriesStatistics>> {
        statistics::time_series_statistics(self.require_data()?, column)
    }

    pub fn compare_periods(
        &self,
        column: &str,
        period1: &TimeRange,
        period2: &TimeRange,
    ) -> Result<Option<PeriodComparison>> {
        statistics::compare_periods(
            self.require_data()?,
            column,
            period1,
            period2,
            self.config.significance_level,
        )
    }

    /// Outlier count and bounds with the configured multiplier for `method`.
    pub fn outlier_statistics(&self, column: &str, method: &str) -> Result<Option<OutlierStatistics>> {
        let method: OutlierMethod = method.parse()?;
        let multiplier = match method {
            OutlierMethod::Iqr => self.config.outlier_stats_iqr_multiplier,
            OutlierMethod::ZScore => self.config.outlier_stats_zscore_threshold,
        };
        statistics::outlier_statistics(self.require_data()?, column, method, multiplier)
    }

    pub fn statistics_summary(&self, columns: &[String]) -> Result<String> {
        statistics::statistics_summary(self.require_data()?, &self.selection(columns)?)
    }

    /// Basic statistics, correlation matrix and normality tests in one go.
    pub fn analysis_results(&mut self, columns: &[String]) -> Result<AnalysisResults> {
        let columns = self.selection(columns)?;
        let basic_stats = self.basic_statistics(&columns)?;
        let correlation = if columns.len() > 1 {
            Some(self.correlation_matrix(&columns)?)
        } else {
            None
        };
        let normality = self.normality_tests(&columns)?;
        Ok(AnalysisResults {
            basic_stats,
            correlation,
            normality,
        })
    }

    // ==================== Charts ====================

    /// Trend chart; the σ band uses the configured multiplier unless `options`
    /// sets one.
    pub fn trend_chart(&self, options: &TrendOptions) -> Result<Figure> {
        let mut options = options.clone();
        options
            .sigma_multiplier
            .get_or_insert(self.config.sigma_multiplier);
        charts::trend_chart(self.require_data()?, &options)
    }

    pub fn scatter_matrix(&self, columns: &[String]) -> Result<Figure> {
        charts::scatter_matrix(
            self.require_data()?,
            &self.selection(columns)?,
            self.config.histogram_bins,
        )
    }

    pub fn histogram_grid(&self, columns: &[String], show_normal: bool) -> Result<Figure> {
        charts::histogram_grid(
            self.require_data()?,
            &self.selection(columns)?,
            self.config.histogram_bins,
            show_normal,
        )
    }

    pub fn correlation_heatmap(&self, columns: &[String]) -> Result<Figure> {
        charts::correlation_heatmap(self.require_data()?, &self.selection(columns)?)
    }

    /// Image bytes of `figure` at the configured size.
    ///
    /// A failed export gives empty bytes and a `ChartExport` warning.
    pub fn export_chart(&mut self, figure: &Figure, format: ChartFormat) -> Vec<u8> {
        match charts::export_figure(figure, format, self.config.chart_width, self.config.chart_height) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, format = %format, "Chart export failed");
                self.warnings.push(ComputationWarning::new(
                    WarningKind::ChartExport,
                    format!("{} export of '{}' failed: {err}", format, figure.title),
                ));
                Vec::new()
            }
        }
    }

    // ==================== Reports ====================

    /// Build the full report document over the numeric columns.
    pub fn build_report(&mut self, figures: &[(String, Figure)]) -> Result<Report> {
        let results = self.analysis_results(&[])?;
        let history = self.history_summary();
        let data = self.require_data()?;
        Ok(ReportGenerator::new(&self.config).generate(&ReportInputs {
            data,
            results: &results,
            history: &history,
            figures,
        }))
    }

    /// Render the report in `format`.
    pub fn generate_report(
        &mut self,
        format: ReportFormat,
        figures: &[(String, Figure)],
    ) -> Result<RenderedReport> {
        self.generate_report_with(renderer_for(format).as_ref(), figures)
    }

    /// Render the report with `renderer`. When the renderer reports itself
    /// unavailable the plain text data summary is returned instead and a
    /// `ReportRendering` warning is recorded.
    pub fn generate_report_with(
        &mut self,
        renderer: &dyn DocumentRenderer,
        figures: &[(String, Figure)],
    ) -> Result<RenderedReport> {
        let format = renderer.format();
        let report = self.build_report(figures)?;
        match renderer.render(&report) {
            Ok(bytes) => Ok(RenderedReport { format, bytes }),
            Err(err @ AnalysisError::RendererUnavailable(_)) => {
                warn!(error = %err, "Falling back to the text data summary");
                self.warnings.push(ComputationWarning::new(
                    WarningKind::ReportRendering,
                    format!("{format} report unavailable ({err}); wrote a text summary instead"),
                ));
                let summary = export_data_summary(self.require_data()?);
                Ok(RenderedReport {
                    format: ReportFormat::Text,
                    bytes: summary.into_bytes(),
                })
            }
            Err(err) => Err(err),
        }
    }

    pub fn quick_report(&self, title: &str) -> Result<Report> {
        Ok(quick_report(self.require_data()?, title))
    }

    pub fn data_summary(&self) -> Result<String> {
        Ok(export_data_summary(self.require_data()?))
    }

    // ==================== Export ====================

    pub fn export_csv(&self) -> Result<Vec<u8>> {
        self.processor.export_csv()
    }

    pub fn export_xlsx(&self) -> Result<Vec<u8>> {
        self.processor.export_xlsx()
    }

    // ==================== Warnings ====================

    pub fn warnings(&self) -> &[ComputationWarning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<ComputationWarning> {
        std::mem::take(&mut self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CSV: &str = "time,temp,flow\n\
                       2024-01-01 00:00,20.0,1.0\n\
                       2024-01-01 01:00,21.0,2.0\n\
                       2024-01-01 02:00,22.0,3.0\n\
                       2024-01-01 03:00,21.5,2.5\n\
                       2024-01-01 04:00,20.5,1.5\n\
                       2024-01-01 05:00,95.0,2.2\n";

    fn session() -> AnalysisSession {
        let mut session = AnalysisSession::default();
        session.load_csv_bytes(CSV.as_bytes()).unwrap();
        session
    }

    #[test]
    fn test_handlers_need_data() {
        let mut session = AnalysisSession::default();
        assert_eq!(
            session.apply_statistical_filter("temp", "iqr", 1.5).unwrap_err().error_code(),
            "NO_DATA_LOADED"
        );
        assert!(session.basic_statistics(&[]).is_err());
        assert!(session.restore_initial().is_err());
    }

    #[test]
    fn test_filter_restore_cycle() {
        let mut session = session();
        assert_eq!(session.apply_statistical_filter("temp", "iqr", 1.5).unwrap().height(), 5);
        assert_eq!(session.history().len(), 1);

        let restored = session.restore(0).unwrap();
        assert_eq!(restored.height(), 6);
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_failed_handlers_leave_state_untouched() {
        let mut session = session();
        session.apply_statistical_filter("temp", "iqr", 1.5).unwrap();

        let err = session.apply_statistical_filter("temp", "mad", 1.5).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_METHOD");
        let err = session.restore(7).unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_OPERATION");

        assert_eq!(session.history().len(), 1);
        assert_eq!(session.data().unwrap().height(), 5);
    }

    #[test]
    fn test_load_resets_history_and_warnings() {
        let mut session = session();
        session.apply_statistical_filter("temp", "iqr", 1.5).unwrap();
        session
            .load_csv_bytes(b"id,v\nx,1\ny,2\n")
            .unwrap();
        assert!(session.history().is_empty());
        assert_eq!(session.warnings().len(), 1);
        assert_eq!(session.warnings()[0].kind, WarningKind::IndexCoercion);
        assert_eq!(session.take_warnings().len(), 1);
        assert!(session.warnings().is_empty());
    }

    #[test]
    fn test_reset_data() {
        let mut session = session();
        session.apply_statistical_filter("temp", "iqr", 1.5).unwrap();
        assert_eq!(session.reset_data().unwrap().height(), 6);
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_preview_does_not_mutate() {
        let session = session();
        let mask = session.preview_candidates("temp", "iqr", 1.5).unwrap();
        assert_eq!(mask, vec![false, false, false, false, false, true]);
        assert_eq!(session.data().unwrap().height(), 6);
        assert!(session.history().is_empty());
    }

    struct UnavailableRenderer;

    impl DocumentRenderer for UnavailableRenderer {
        fn format(&self) -> ReportFormat {
            ReportFormat::Pdf
        }

        fn render(&self, _report: &Report) -> Result<Vec<u8>> {
            Err(AnalysisError::RendererUnavailable("PDF: font table missing".to_string()))
        }
    }

    #[test]
    fn test_pdf_report_is_rendered() {
        let mut session = session();
        let rendered = session.generate_report(ReportFormat::Pdf, &[]).unwrap();
        assert_eq!(rendered.format, ReportFormat::Pdf);
        assert!(rendered.bytes.starts_with(b"%PDF-"));
        assert!(session.warnings().is_empty());
    }

    #[test]
    fn test_unavailable_renderer_falls_back_to_text() {
        let mut session = session();
        let rendered = session.generate_report_with(&UnavailableRenderer, &[]).unwrap();
        assert_eq!(rendered.format, ReportFormat::Text);
        assert!(String::from_utf8(rendered.bytes).unwrap().starts_with("=== Data Summary ==="));
        assert_eq!(session.warnings().len(), 1);
        assert_eq!(session.warnings()[0].kind, WarningKind::ReportRendering);
    }

    #[test]
    fn test_pdf_chart_export() {
        let mut session = session();
        let figure = session.histogram_grid(&[], true).unwrap();
        let bytes = session.export_chart(&figure, ChartFormat::Pdf);
        assert!(bytes.starts_with(b"%PDF-"));
        assert!(session.warnings().is_empty());
    }

    #[test]
    fn test_chart_export_failure_is_a_warning() {
        let config = AnalysisConfig {
            chart_width: 0,
            ..AnalysisConfig::default()
        };
        let mut session = AnalysisSession::new(config);
        session.load_csv_bytes(CSV.as_bytes()).unwrap();
        let figure = session.histogram_grid(&[], true).unwrap();
        let bytes = session.export_chart(&figure, ChartFormat::Pdf);
        assert!(bytes.is_empty());
        assert_eq!(session.warnings()[0].kind, WarningKind::ChartExport);
    }

    #[test]
    fn test_default_filter_uses_configured_method() {
        let config = AnalysisConfig::builder()
            .default_method(OutlierMethod::ZScore)
            .default_multiplier(1.0)
            .build()
            .unwrap();
        let mut session = AnalysisSession::new(config);
        session.load_csv_bytes(CSV.as_bytes()).unwrap();

        let rows = session
            .apply_statistical_filter_or_default("temp", None, None)
            .unwrap()
            .height();
        assert_eq!(rows, 5);
        assert_eq!(session.history()[0].method_description(), "Z-score (multiplier: 1)");
    }

    #[test]
    fn test_trend_chart_uses_configured_sigma() {
        let config = AnalysisConfig::builder().sigma_multiplier(2.0).build().unwrap();
        let mut session = AnalysisSession::new(config);
        session.load_csv_bytes(CSV.as_bytes()).unwrap();

        let figure = session.trend_chart(&TrendOptions::new(vec!["flow".to_string()])).unwrap();
        let labels: Vec<&str> = figure.panels[0]
            .reference_lines
            .iter()
            .map(|l| l.label.as_str())
            .collect();
        assert!(labels.contains(&"flow mean +2σ"));

        let mut explicit = TrendOptions::new(vec!["flow".to_string()]);
        explicit.sigma_multiplier = Some(3.0);
        let figure = session.trend_chart(&explicit).unwrap();
        assert!(figure.panels[0].reference_lines.iter().any(|l| l.label == "flow mean -3σ"));
    }

    #[test]
    fn test_outlier_statistics_uses_configured_multiplier() {
        let session = session();
        let stats = session.outlier_statistics("temp", "iqr").unwrap().unwrap();
        assert_eq!(stats.multiplier, 1.5);
        assert_eq!(stats.outlier_count, 1);
        assert_eq!(stats.outlier_values, vec![95.0]);
    }
}
