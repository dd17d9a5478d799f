//! CLI entry point for process data analysis.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use process_insight::{
    AnalysisConfig, AnalysisSession, ChartFormat, Figure, OutlierMethod, ReportFormat,
    TrendOptions, ValueRange,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One `--filter` argument.
#[derive(Debug, Clone, PartialEq)]
enum FilterSpec {
    /// `None` fields take the session's configured defaults.
    Statistical {
        method: Option<OutlierMethod>,
        column: String,
        multiplier: Option<f64>,
    },
    Range {
        column: String,
        min: f64,
        max: f64,
    },
}

impl FilterSpec {
    fn describe(&self) -> String {
        match self {
            FilterSpec::Statistical {
                method,
                column,
                multiplier,
            } => {
                let method = method.map_or("default method".to_string(), |m| m.to_string());
                let multiplier = multiplier.map_or("default".to_string(), |m| m.to_string());
                format!("{method} on '{column}' (x{multiplier})")
            }
            FilterSpec::Range { column, min, max } => {
                format!("range on '{column}' [{min}, {max}]")
            }
        }
    }
}

fn parse_number(s: &str, what: &str) -> Result<f64, String> {
    s.parse::<f64>()
        .map_err(|_| format!("{what} must be a number, got '{s}'"))
}

fn parse_method(s: &str) -> Result<OutlierMethod, String> {
    s.parse::<OutlierMethod>().map_err(|e| e.to_string())
}

/// `col`, `iqr:col[:m]`, `zscore:col[:m]` or `range:col:min:max`.
fn parse_filter(s: &str) -> Result<FilterSpec, String> {
    let parts: Vec<&str> = s.split(':').collect();
    match parts.as_slice() {
        ["range", column, min, max] => Ok(FilterSpec::Range {
            column: column.to_string(),
            min: parse_number(min, "range minimum")?,
            max: parse_number(max, "range maximum")?,
        }),
        [column] if !column.is_empty() => Ok(FilterSpec::Statistical {
            method: None,
            column: column.to_string(),
            multiplier: None,
        }),
        [method @ ("iqr" | "zscore"), column] => Ok(FilterSpec::Statistical {
            method: Some(parse_method(method)?),
            column: column.to_string(),
            multiplier: None,
        }),
        [method @ ("iqr" | "zscore"), column, multiplier] => Ok(FilterSpec::Statistical {
            method: Some(parse_method(method)?),
            column: column.to_string(),
            multiplier: Some(parse_number(multiplier, "multiplier")?),
        }),
        _ => Err(format!(
            "expected COLUMN, iqr:COLUMN[:M], zscore:COLUMN[:M] or range:COLUMN:MIN:MAX, got '{s}'"
        )),
    }
}

/// CLI-compatible chart kind
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliChart {
    /// Time-series trend of every numeric column
    Trend,
    /// Correlation heatmap
    Heatmap,
    /// Histogram grid with normal curves
    Histogram,
    /// Pairwise scatter matrix
    Scatter,
}

/// CLI-compatible chart image format
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliChartFormat {
    Png,
    Svg,
    Pdf,
}

impl From<CliChartFormat> for ChartFormat {
    fn from(cli: CliChartFormat) -> Self {
        match cli {
            CliChartFormat::Png => ChartFormat::Png,
            CliChartFormat::Svg => ChartFormat::Svg,
            CliChartFormat::Pdf => ChartFormat::Pdf,
        }
    }
}

/// CLI-compatible report format
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliReportFormat {
    Html,
    Json,
    Text,
    /// A4 document; a plain text summary is written if PDF rendering fails
    Pdf,
}

impl From<CliReportFormat> for ReportFormat {
    fn from(cli: CliReportFormat) -> Self {
        match cli {
            CliReportFormat::Html => ReportFormat::Html,
            CliReportFormat::Json => ReportFormat::Json,
            CliReportFormat::Text => ReportFormat::Text,
            CliReportFormat::Pdf => ReportFormat::Pdf,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Process data analysis: outlier removal, statistics, charts and reports",
    long_about = "Loads a time-indexed CSV or XLSX file, applies outlier filters in order \
                  and prints an analysis summary.\n\n\
                  EXAMPLES:\n  \
                  # Summary of a file\n  \
                  process-insight -i plant.csv\n\n  \
                  # Remove temperature spikes and write an HTML report\n  \
                  process-insight -i plant.csv --filter iqr:temperature --report report.html\n\n  \
                  # Apply two filters, then roll the second one back\n  \
                  process-insight -i plant.csv --filter zscore:flow:2.5 --filter range:pressure:0:5 --restore 1\n\n  \
                  # Export a correlation heatmap\n  \
                  process-insight -i plant.csv --chart heatmap --chart-format svg -o charts/"
)]
struct Args {
    /// Path to the CSV or XLSX file to analyse
    #[arg(short, long)]
    input: PathBuf,

    /// Outlier filter, applied in the order given
    ///
    /// COLUMN, iqr:COLUMN[:MULTIPLIER], zscore:COLUMN[:THRESHOLD] or range:COLUMN:MIN:MAX.
    /// A bare COLUMN uses --method; a missing multiplier uses --multiplier.
    #[arg(long = "filter", value_parser = parse_filter)]
    filters: Vec<FilterSpec>,

    /// Outlier method for filters that name none (iqr or zscore)
    #[arg(long, value_parser = parse_method)]
    method: Option<OutlierMethod>,

    /// Multiplier for filters that give none
    #[arg(long)]
    multiplier: Option<f64>,

    /// k of the mean ± k·σ lines on trend charts
    #[arg(long)]
    sigma: Option<f64>,

    /// Roll back to the data as it was before operation N
    #[arg(long)]
    restore: Option<usize>,

    /// Write a report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value = "html")]
    report_format: CliReportFormat,

    /// Chart to export (repeatable)
    #[arg(long, value_enum)]
    chart: Vec<CliChart>,

    /// Chart image format
    #[arg(long, value_enum, default_value = "png")]
    chart_format: CliChartFormat,

    /// Output directory for charts [default: output]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the filtered data as CSV
    #[arg(long)]
    export_csv: Option<PathBuf>,

    /// Write the filtered data as XLSX
    #[arg(long)]
    export_xlsx: Option<PathBuf>,

    /// Print a JSON document instead of the text summary
    #[arg(long, default_value = "false")]
    json: bool,

    /// Logging level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Only log warnings and errors
    #[arg(short, long, default_value = "false")]
    quiet: bool,
}

/// Initialize the tracing subscriber
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    // stdout carries the JSON document alone
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    if !args.input.exists() {
        return Err(anyhow!("Input file not found: {}", args.input.display()));
    }

    let config = build_config(&args)?;
    let mut session = AnalysisSession::new(config);

    info!("Loading dataset from: {}", args.input.display());
    let shape = session.load_file(&args.input)?.shape();
    info!("Dataset loaded successfully: {:?}", shape);

    apply_filters(&mut session, &args.filters)?;

    if let Some(id) = args.restore {
        let rows = session.restore(id)?.height();
        info!(operation = id, rows, "Restored");
    }

    let figures = export_charts(&mut session, &args)?;
    write_outputs(&mut session, &args, &figures)?;

    if args.json {
        print_json(&mut session)
    } else {
        print_summary(&mut session, &args.input)
    }
}

fn build_config(args: &Args) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder();
    if let Some(method) = args.method {
        builder = builder.default_method(method);
    }
    if let Some(multiplier) = args.multiplier {
        builder = builder.default_multiplier(multiplier);
    }
    if let Some(k) = args.sigma {
        builder = builder.sigma_multiplier(k);
    }
    if let Some(dir) = &args.output {
        builder = builder.output_dir(dir);
    }
    Ok(builder.build()?)
}

fn apply_filters(session: &mut AnalysisSession, filters: &[FilterSpec]) -> Result<()> {
    for filter in filters {
        let rows = match filter {
            FilterSpec::Statistical {
                method,
                column,
                multiplier,
            } => session.apply_statistical_filter_or_default(column, *method, *multiplier)?,
            FilterSpec::Range { column, min, max } => {
                session.apply_range_filter(column, None, Some(ValueRange::new(*min, *max)))?
            }
        }
        .height();
        info!(filter = %filter.describe(), rows, "Filter applied");
    }
    Ok(())
}

fn build_chart(session: &AnalysisSession, chart: CliChart) -> Result<(String, Figure)> {
    let figure = match chart {
        CliChart::Trend => {
            session.trend_chart(&TrendOptions::new(session.numeric_columns()))?
        }
        CliChart::Heatmap => session.correlation_heatmap(&[])?,
        CliChart::Histogram => session.histogram_grid(&[], true)?,
        CliChart::Scatter => session.scatter_matrix(&[])?,
    };
    Ok((figure.kind.as_str().to_string(), figure))
}

/// Export the requested charts; returns them for the report.
fn export_charts(session: &mut AnalysisSession, args: &Args) -> Result<Vec<(String, Figure)>> {
    if args.chart.is_empty() {
        return Ok(Vec::new());
    }
    let output_dir = session.config().output_dir.clone();
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let format: ChartFormat = args.chart_format.into();
    let mut figures = Vec::with_capacity(args.chart.len());
    for chart in &args.chart {
        let (name, figure) = build_chart(session, *chart)?;
        let bytes = session.export_chart(&figure, format);
        if bytes.is_empty() {
            warn!(chart = %name, "Chart skipped");
        } else {
            let path = output_dir.join(format!("{name}.{}", format.extension()));
            std::fs::write(&path, bytes)?;
            info!("Chart written to: {}", path.display());
        }
        figures.push((name, figure));
    }
    Ok(figures)
}

fn write_outputs(
    session: &mut AnalysisSession,
    args: &Args,
    figures: &[(String, Figure)],
) -> Result<()> {
    if let Some(path) = &args.report {
        let rendered = session.generate_report(args.report_format.into(), figures)?;
        let format: ReportFormat = args.report_format.into();
        let path = if rendered.format == format {
            path.clone()
        } else {
            path.with_extension(rendered.format.extension())
        };
        std::fs::write(&path, rendered.bytes)?;
        info!("Report written to: {}", path.display());
    }
    if let Some(path) = &args.export_csv {
        std::fs::write(path, session.export_csv()?)?;
        info!("CSV written to: {}", path.display());
    }
    if let Some(path) = &args.export_xlsx {
        std::fs::write(path, session.export_xlsx()?)?;
        info!("XLSX written to: {}", path.display());
    }
    Ok(())
}

fn print_json(session: &mut AnalysisSession) -> Result<()> {
    let results = session.analysis_results(&[])?;
    let document = serde_json::json!({
        "info": session.data_info(),
        "validation": session.validate(),
        "history": session.export_history(),
        "statistics": results,
        "warnings": session.warnings(),
    });
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

/// Framed human-readable summary.
///
/// Uses `println!` on purpose: this is the output, not a log.
fn print_summary(session: &mut AnalysisSession, input: &Path) -> Result<()> {
    println!("\n{}", "=".repeat(80));
    println!("PROCESS DATA ANALYSIS");
    println!("{}\n", "=".repeat(80));

    println!("DATASET");
    println!("{}", "-".repeat(40));
    println!("  File: {}", input.display());
    if let Some(info) = session.data_info() {
        println!("  Rows: {}", info.rows);
        println!("  Columns: {}", info.columns.len());
        println!("  Memory: {:.2} MB", info.memory_usage_mb());
        if let Some(range) = info.date_range {
            println!("  Period: {} to {}", range.start, range.end);
        }
    }

    let validation = session.validate();
    println!("\nVALIDATION");
    println!("{}", "-".repeat(40));
    if validation.is_valid {
        println!("  OK");
    } else {
        for error in &validation.errors {
            println!("  ! {error}");
        }
    }

    println!("\nOUTLIER REMOVAL HISTORY");
    println!("{}", "-".repeat(40));
    let history = session.history_summary();
    if history.is_empty() {
        println!("  (none)");
    }
    for row in &history {
        println!(
            "  #{} {} {} on '{}': removed {} ({} -> {})",
            row.operation_id,
            row.timestamp,
            row.method,
            row.column,
            row.removed_count,
            row.rows_before,
            row.rows_after
        );
    }

    println!("\nSTATISTICS");
    println!("{}", "-".repeat(40));
    println!("{}", session.statistics_summary(&[])?);

    let warnings = session.take_warnings();
    if !warnings.is_empty() {
        println!("\nWARNINGS");
        println!("{}", "-".repeat(40));
        for warning in &warnings {
            println!("  {warning}");
        }
    }
    println!("{}", "=".repeat(80));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter() {
        assert_eq!(
            parse_filter("iqr:temp").unwrap(),
            FilterSpec::Statistical {
                method: Some(OutlierMethod::Iqr),
                column: "temp".to_string(),
                multiplier: None
            }
        );
        assert_eq!(
            parse_filter("zscore:flow:2.5").unwrap(),
            FilterSpec::Statistical {
                method: Some(OutlierMethod::ZScore),
                column: "flow".to_string(),
                multiplier: Some(2.5)
            }
        );
        assert_eq!(
            parse_filter("temp").unwrap(),
            FilterSpec::Statistical {
                method: None,
                column: "temp".to_string(),
                multiplier: None
            }
        );
        assert_eq!(
            parse_filter("range:p:-1:5").unwrap(),
            FilterSpec::Range {
                column: "p".to_string(),
                min: -1.0,
                max: 5.0
            }
        );
    }

    #[test]
    fn test_parse_filter_rejects_garbage() {
        assert!(parse_filter("mad:temp").is_err());
        assert!(parse_filter("range:temp:1").is_err());
        assert!(parse_filter("iqr:temp:x").is_err());
        assert!(parse_filter("").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "process-insight",
            "-i",
            "data.csv",
            "--filter",
            "iqr:temp",
            "--chart",
            "heatmap",
            "--chart",
            "trend",
            "--json",
        ])
        .unwrap();
        assert_eq!(args.filters.len(), 1);
        assert_eq!(args.chart.len(), 2);
        assert!(args.json);
    }

    #[test]
    fn test_config_from_args() {
        let args = Args::try_parse_from([
            "process-insight",
            "-i",
            "data.csv",
            "--method",
            "zscore",
            "--multiplier",
            "2.5",
            "--sigma",
            "2",
            "-o",
            "charts",
            "--chart-format",
            "pdf",
        ])
        .unwrap();
        let config = build_config(&args).unwrap();
        assert_eq!(config.default_method, OutlierMethod::ZScore);
        assert_eq!(config.default_multiplier, 2.5);
        assert_eq!(config.sigma_multiplier, 2.0);
        assert_eq!(config.output_dir, PathBuf::from("charts"));
        assert_eq!(ChartFormat::from(args.chart_format), ChartFormat::Pdf);

        let defaults = build_config(&Args::try_parse_from(["process-insight", "-i", "d.csv"]).unwrap())
            .unwrap();
        assert_eq!(defaults.output_dir, PathBuf::from("output"));
    }
}
