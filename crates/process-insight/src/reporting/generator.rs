//! Assembling the analysis report document from data, statistics and history.

use super::document::{Block, Report, Section};
use crate::charts::{ChartFormat, Figure, export_figure};
use crate::config::AnalysisConfig;
use crate::outliers::HistorySummaryRow;
use crate::statistics::{
    BasicStatisticsRow, CorrelationMatrix, NormalityResult, basic_statistics,
};
use crate::types::Dataset;
use crate::utils::{TIMESTAMP_FORMAT, dtype_label, span_days};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ============================================================================
// Inputs
// ============================================================================

/// Statistics computed ahead of report generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub basic_stats: Vec<BasicStatisticsRow>,
    pub correlation: Option<CorrelationMatrix>,
    pub normality: Vec<NormalityResult>,
}

/// Everything a report is built from.
pub struct ReportInputs<'a> {
    pub data: &'a Dataset,
    pub results: &'a AnalysisResults,
    pub history: &'a [HistorySummaryRow],
    /// Named figures, embedded in order.
    pub figures: &'a [(String, Figure)],
}

/// Coefficient of variation above which a variable is called out.
const HIGH_CV_THRESHOLD: f64 = 0.5;
const MAX_HIGH_CV_VARIABLES: usize = 3;
const MAX_STATS_ROWS: usize = 5;

const RECOMMENDATIONS: [&str; 4] = [
    "Run data quality checks on a regular schedule",
    "Set up monitoring for early detection of abnormal values",
    "Analyse highly correlated variable groups together",
    "Keep watching for changes in trend",
];

// ============================================================================
// Generator
// ============================================================================

/// Builds the analysis report document. Holds display settings only.
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    chart_width: u32,
    chart_height: u32,
    correlation_threshold: f64,
    max_correlation_pairs: usize,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

impl ReportGenerator {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            chart_width: config.report_chart_width,
            chart_height: config.report_chart_height,
            correlation_threshold: config.correlation_highlight_threshold,
            max_correlation_pairs: config.max_correlation_highlights,
        }
    }

    /// Full report: overview, outlier history, statistics, figures, conclusion.
    pub fn generate(&self, inputs: &ReportInputs<'_>) -> Report {
        let mut sections = vec![
            data_overview(inputs.data),
            outlier_history(inputs.history),
            self.statistics_section(inputs.results),
        ];
        if !inputs.figures.is_empty() {
            sections.push(self.figures_section(inputs.figures));
        }
        sections.push(conclusion(inputs.data, &inputs.results.basic_stats));

        debug!(
            sections = sections.len(),
            figures = inputs.figures.len(),
            history = inputs.history.len(),
            "Report generated"
        );
        Report {
            title: "Process Data Analysis Report".to_string(),
            created_at: now(),
            sections,
        }
    }

    fn statistics_section(&self, results: &AnalysisResults) -> Section {
        let mut section = Section::new("3. Statistical analysis");

        section.push(Block::heading(2, "3.1 Basic statistics"));
        if results.basic_stats.is_empty() {
            section.push(Block::paragraph("No numeric variables to summarise."));
        } else {
            let rows = results
                .basic_stats
                .iter()
                .take(MAX_STATS_ROWS)
                .map(|row| {
                    vec![
                        row.column.clone(),
                        format!("{:.3}", row.stats.mean),
                        format!("{:.3}", row.stats.std),
                        format!("{:.3}", row.stats.min),
                        format!("{:.3}", row.stats.max),
                    ]
                })
                .collect();
            section.push(Block::table(["Variable", "Mean", "Std", "Min", "Max"], rows));
        }

        if let Some(matrix) = results.correlation.as_ref().filter(|m| m.len() > 1) {
            section.push(Block::heading(2, "3.2 Correlation analysis"));
            let pairs = matrix.strong_pairs(self.correlation_threshold, self.max_correlation_pairs);
            if pairs.is_empty() {
                section.push(Block::paragraph(format!(
                    "No highly correlated pairs (|r| > {}).",
                    self.correlation_threshold
                )));
            } else {
                let rows = pairs
                    .into_iter()
                    .map(|p| vec![p.first, p.second, format!("{:.3}", p.correlation)])
                    .collect();
                section.push(Block::table(["Variable 1", "Variable 2", "Correlation"], rows));
            }
        }

        if !results.normality.is_empty() {
            section.push(Block::heading(2, "3.3 Normality tests"));
            let yes_no = |b: bool| (if b { "yes" } else { "no" }).to_string();
            let rows = results
                .normality
                .iter()
                .map(|r| {
                    vec![
                        r.column.clone(),
                        r.sample_size.to_string(),
                        format!("{:.4}", r.shapiro_p_value),
                        format!("{:.4}", r.ks_p_value),
                        match (r.ad_statistic, r.ad_critical_5pct) {
                            (Some(stat), Some(crit)) => format!("{stat:.3} / {crit:.3}"),
                            _ => "-".to_string(),
                        },
                        yes_no(r.is_normal()),
                    ]
                })
                .collect();
            section.push(Block::table(
                ["Variable", "n", "Shapiro-Wilk p", "KS p", "AD stat / 5% crit", "Normal"],
                rows,
            ));
        }
        section
    }

    fn figures_section(&self, figures: &[(String, Figure)]) -> Section {
        let mut section = Section::new("4. Charts");
        for (i, (name, figure)) in figures.iter().enumerate() {
            section.push(Block::heading(2, format!("4.{} {}", i + 1, name)));
            let svg = match export_figure(figure, ChartFormat::Svg, self.chart_width, self.chart_height) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(err) => {
                    warn!(figure = %name, error = %err, "Figure could not be embedded");
                    section.push(Block::paragraph(format!("Failed to render the chart: {err}")));
                    String::new()
                }
            };
            section.push(Block::Figure {
                caption: name.clone(),
                svg,
                figure: Some(figure.clone()),
            });
        }
        section
    }
}

fn now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// `1234567` as `1,234,567`.
fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ============================================================================
// Sections
// ============================================================================

fn data_overview(data: &Dataset) -> Section {
    let mut section = Section::new("1. Data overview");

    let mut info = vec![
        vec!["Rows".to_string(), thousands(data.height())],
        vec!["Columns".to_string(), data.width().to_string()],
    ];
    if let Some((start, end)) = data.time_span() {
        info.push(vec![
            "Period".to_string(),
            format!("{} ~ {}", start.format(TIMESTAMP_FORMAT), end.format(TIMESTAMP_FORMAT)),
        ]);
        info.push(vec!["Days".to_string(), format!("{} days", span_days(start, end))]);
    }
    info.push(vec![
        "Memory usage".to_string(),
        format!("{:.1} MB", data.memory_usage_mb()),
    ]);
    section.push(Block::table(["Item", "Value"], info));

    section.push(Block::heading(2, "1.1 Variables"));
    let height = data.height().max(1) as f64;
    let variables = data
        .frame()
        .get_columns()
        .iter()
        .map(|col| {
            let nulls = col.null_count();
            vec![
                col.name().to_string(),
                dtype_label(col.dtype()),
                nulls.to_string(),
                format!("{:.1}%", nulls as f64 / height * 100.0),
            ]
        })
        .collect();
    section.push(Block::table(["Variable", "Type", "Missing", "Missing %"], variables));
    section
}

fn outlier_history(history: &[HistorySummaryRow]) -> Section {
    let mut section = Section::new("2. Outlier removal history");
    if history.is_empty() {
        section.push(Block::paragraph("No outlier removal was performed."));
        return section;
    }
    let rows = history
        .iter()
        .map(|row| {
            vec![
                // Minute precision.
                row.timestamp.chars().take(16).collect(),
                row.column.clone(),
                row.method.clone(),
                row.removed_count.to_string(),
            ]
        })
        .collect();
    section.push(Block::table(["Time", "Variable", "Method", "Removed"], rows));
    section
}

fn conclusion(data: &Dataset, basic_stats: &[BasicStatisticsRow]) -> Section {
    let mut section = Section::new("5. Conclusion");

    let mut summary = format!(
        "This analysis covered {} rows x {} columns of process data with time series, \
         statistical and correlation analysis.",
        data.height(),
        data.width()
    );
    if let Some((start, end)) = data.time_span() {
        summary.push_str(&format!(
            " Period: {} ~ {} ({} days).",
            start.format(TIMESTAMP_FORMAT),
            end.format(TIMESTAMP_FORMAT),
            span_days(start, end)
        ));
    }
    section.push(Block::paragraph(summary));

    let mut high_cv: Vec<(&str, f64)> = basic_stats
        .iter()
        .filter(|row| row.stats.std > 0.0 && row.stats.mean != 0.0)
        .map(|row| (row.column.as_str(), (row.stats.std / row.stats.mean).abs()))
        .filter(|(_, cv)| *cv > HIGH_CV_THRESHOLD)
        .collect();
    if !high_cv.is_empty() {
        high_cv.sort_by(|a, b| b.1.total_cmp(&a.1));
        let names: Vec<&str> = high_cv
            .iter()
            .take(MAX_HIGH_CV_VARIABLES)
            .map(|(name, _)| *name)
            .collect();
        section.push(Block::paragraph(format!(
            "Key findings: high-variability variables are {}. These variables need close monitoring.",
            names.join(", ")
        )));
    }

    section.push(Block::heading(2, "Recommendations"));
    section.push(Block::List {
        ordered: true,
        items: RECOMMENDATIONS.iter().map(|s| s.to_string()).collect(),
    });
    section
}

// ============================================================================
// Short forms
// ============================================================================

/// Title plus the data overview.
pub fn quick_report(data: &Dataset, title: &str) -> Report {
    Report {
        title: title.to_string(),
        created_at: now(),
        sections: vec![data_overview(data)],
    }
}

/// Plain-text overview with per-column basic statistics.
pub fn export_data_summary(data: &Dataset) -> String {
    let mut lines = vec![
        "=== Data Summary ===".to_string(),
        format!("Created: {}", now()),
        String::new(),
        "[Basic information]".to_string(),
        format!("Rows: {}", thousands(data.height())),
        format!("Columns: {}", data.width()),
    ];
    if let Some((start, end)) = data.time_span() {
        lines.push(format!(
            "Period: {} ~ {}",
            start.format(TIMESTAMP_FORMAT),
            end.format(TIMESTAMP_FORMAT)
        ));
        lines.push(format!("Days: {}", span_days(start, end)));
    }
    lines.push(String::new());

    let numeric = data.numeric_columns();
    let rows = basic_statistics(data, &numeric).unwrap_or_default();
    if !rows.is_empty() {
        lines.push("[Numeric variables]".to_string());
        for row in rows {
            lines.push(format!("{}:", row.column));
            lines.push(format!("  Mean: {:.3}", row.stats.mean));
            lines.push(format!("  Std: {:.3}", row.stats.std));
            lines.push(format!("  Range: {:.3} ~ {:.3}", row.stats.min, row.stats.max));
            lines.push(format!("  Missing: {:.1}%", row.missing_percent));
            lines.push(String::new());
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::correlation_matrix;
    use crate::types::RowIndex;
    use chrono::NaiveDate;
    use polars::prelude::*;

    fn sample() -> Dataset {
        let frame = df![
            "temp" => [20.0, 22.0, 24.0, 26.0],
            "flow" => [Some(1.0), Some(2.0), None, Some(4.5)],
            "spiky" => [1.0, 10.0, 0.5, 20.0],
        ]
        .unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let index = RowIndex::Timestamps((0..4).map(|d| start + chrono::Duration::days(d)).collect());
        Dataset::new("time", index, frame).unwrap()
    }

    fn results(data: &Dataset) -> AnalysisResults {
        let columns = data.numeric_columns();
        AnalysisResults {
            basic_stats: basic_statistics(data, &columns).unwrap(),
            correlation: Some(correlation_matrix(data, &columns).unwrap()),
            normality: Vec::new(),
        }
    }

    fn table_rows(block: &Block) -> &Vec<Vec<String>> {
        match block {
            Block::Table { rows, .. } => rows,
            other => panic!("expected a table, got {other:?}"),
        }
    }

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_report_sections() {
        let data = sample();
        let results = results(&data);
        let report = ReportGenerator::default().generate(&ReportInputs {
            data: &data,
            results: &results,
            history: &[],
            figures: &[],
        });

        let headings: Vec<&str> = report.sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(
            headings,
            vec![
                "1. Data overview",
                "2. Outlier removal history",
                "3. Statistical analysis",
                "5. Conclusion"
            ]
        );

        let overview = report.section("1.").unwrap();
        let info = table_rows(&overview.blocks[0]);
        assert_eq!(info[0], vec!["Rows", "4"]);
        assert_eq!(info[3], vec!["Days", "3 days"]);
        let variables = table_rows(&overview.blocks[2]);
        assert_eq!(variables[1], vec!["flow", "float64", "1", "25.0%"]);

        let history = report.section("2.").unwrap();
        assert_eq!(
            history.blocks[0],
            Block::paragraph("No outlier removal was performed.")
        );

        let stats = report.section("3.").unwrap();
        let basic = table_rows(&stats.blocks[1]);
        assert_eq!(basic[0], vec!["temp", "23.000", "2.582", "20.000", "26.000"]);
        // temp and flow are almost perfectly correlated.
        let corr = table_rows(&stats.blocks[3]);
        assert_eq!(corr[0][0], "temp");
        assert_eq!(corr[0][1], "flow");

        let conclusion = report.section("5.").unwrap();
        let Block::Paragraph { text } = &conclusion.blocks[1] else {
            panic!("expected findings paragraph");
        };
        assert!(text.contains("spiky"));
        assert!(!text.contains("temp"));
    }

    #[test]
    fn test_history_table_uses_minutes() {
        let data = sample();
        let history = vec![HistorySummaryRow {
            operation_id: 0,
            timestamp: "2024-05-01 10:20:30".to_string(),
            column: "temp".to_string(),
            method: "IQR (multiplier: 1.5)".to_string(),
            removed_count: 2,
            rows_before: 4,
            rows_after: 2,
        }];
        let report = ReportGenerator::default().generate(&ReportInputs {
            data: &data,
            results: &AnalysisResults::default(),
            history: &history,
            figures: &[],
        });
        let rows = table_rows(&report.section("2.").unwrap().blocks[0]);
        assert_eq!(rows[0], vec!["2024-05-01 10:20", "temp", "IQR (multiplier: 1.5)", "2"]);
        // Without a correlation matrix there is no 3.2.
        let stats = report.section("3.").unwrap();
        assert!(!stats.blocks.contains(&Block::heading(2, "3.2 Correlation analysis")));
    }

    #[test]
    fn test_figures_section_embeds_or_reports_failure() {
        let data = sample();
        let figure = crate::charts::histogram_grid(&data, &["temp".to_string()], 5, false).unwrap();
        let figures = vec![("Histogram".to_string(), figure)];
        let report = ReportGenerator::default().generate(&ReportInputs {
            data: &data,
            results: &AnalysisResults::default(),
            history: &[],
            figures: &figures,
        });
        let section = report.section("4.").unwrap();
        assert_eq!(section.blocks[0], Block::heading(2, "4.1 Histogram"));
        match &section.blocks[1] {
            Block::Figure { svg, figure, .. } => {
                assert!(svg.contains("<svg"));
                assert_eq!(figure.as_ref(), Some(&figures[0].1));
            }
            Block::Paragraph { text } => {
                assert!(text.starts_with("Failed to render the chart"));
                // The model is kept so PDF output can still draw it.
                match &section.blocks[2] {
                    Block::Figure { svg, figure, .. } => {
                        assert!(svg.is_empty());
                        assert!(figure.is_some());
                    }
                    other => panic!("unexpected block {other:?}"),
                }
            }
            other => panic!("unexpected block {other:?}"),
        }
    }

    #[test]
    fn test_quick_report_and_summary() {
        let data = sample();
        let quick = quick_report(&data, "Quick look");
        assert_eq!(quick.title, "Quick look");
        assert_eq!(quick.sections.len(), 1);

        let text = export_data_summary(&data);
        assert!(text.starts_with("=== Data Summary ==="));
        assert!(text.contains("Rows: 4"));
        assert!(text.contains("Period: 2024-01-01 00:00:00 ~ 2024-01-04 00:00:00"));
        assert!(text.contains("flow:\n  Mean: 2.500"));
        assert!(text.contains("  Missing: 25.0%"));
    }
}
