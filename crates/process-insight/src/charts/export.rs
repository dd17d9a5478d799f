//! Drawing figures with plotters.
//!
//! PNG goes through the bitmap backend into a temporary file (the backend
//! picks the encoder from the file extension), SVG is drawn into a string and
//! PDF goes through the printpdf backend in [`super::pdf`].

use super::figure::{
    Axis, Figure, LineDash, Panel, ReferenceLine, Trace, XAxisKind, x_to_time_label,
};
use super::pdf::figure_pdf;
use crate::error::{AnalysisError, Result};
use plotters::coord::Shift;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Output format of [`export_figure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartFormat {
    #[default]
    Png,
    Svg,
    Pdf,
}

impl ChartFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ChartFormat::Png => "png",
            ChartFormat::Svg => "svg",
            ChartFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for ChartFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ChartFormat {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ChartFormat::Png),
            "svg" => Ok(ChartFormat::Svg),
            "pdf" => Ok(ChartFormat::Pdf),
            other => Err(AnalysisError::ChartExport(format!(
                "unsupported chart format '{other}'"
            ))),
        }
    }
}

const PALETTE: [RGBColor; 8] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(23, 190, 207),
];
const HIGHLIGHT: RGBColor = RGBColor(211, 211, 211);

pub(crate) fn chart_error(err: impl fmt::Display) -> AnalysisError {
    AnalysisError::ChartExport(err.to_string())
}

/// Render `figure` to image bytes of the given size in pixels.
pub fn export_figure(figure: &Figure, format: ChartFormat, width: u32, height: u32) -> Result<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(AnalysisError::ChartExport(format!(
            "invalid image size {width}x{height}"
        )));
    }
    let bytes = match format {
        ChartFormat::Png => {
            let file = tempfile::Builder::new().suffix(".png").tempfile()?;
            {
                let root = BitMapBackend::new(file.path(), (width, height)).into_drawing_area();
                draw_figure(&root, figure)?;
                root.present().map_err(chart_error)?;
            }
            std::fs::read(file.path())?
        }
        ChartFormat::Svg => {
            let mut svg = String::new();
            {
                let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
                draw_figure(&root, figure)?;
                root.present().map_err(chart_error)?;
            }
            svg.into_bytes()
        }
        ChartFormat::Pdf => figure_pdf(figure, width, height)?,
    };
    debug!(format = %format, bytes = bytes.len(), kind = figure.kind.as_str(), "Figure exported");
    Ok(bytes)
}

pub(crate) fn draw_figure<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, figure: &Figure) -> Result<()> {
    root.fill(&WHITE).map_err(chart_error)?;
    if figure.panels.is_empty() {
        return Ok(());
    }
    let body = root
        .titled(&figure.title, ("sans-serif", 22))
        .map_err(chart_error)?;
    let (rows, cols) = figure.grid;
    let areas = body.split_evenly((rows.max(1), cols.max(1)));
    for (panel, area) in figure.panels.iter().zip(areas.iter()) {
        draw_panel(area, panel)?;
    }
    Ok(())
}

// =============================================================================
// Axis ranges
// =============================================================================

fn padded(lo: f64, hi: f64) -> (f64, f64) {
    if !(lo.is_finite() && hi.is_finite()) {
        return (0.0, 1.0);
    }
    if hi <= lo {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

fn extend(bounds: &mut Option<(f64, f64)>, v: f64) {
    if !v.is_finite() {
        return;
    }
    *bounds = Some(match *bounds {
        None => (v, v),
        Some((lo, hi)) => (lo.min(v), hi.max(v)),
    });
}

struct PanelBounds {
    x: (f64, f64),
    y: (f64, f64),
    y2: (f64, f64),
}

fn panel_bounds(panel: &Panel) -> PanelBounds {
    let mut x = None;
    let mut y = None;
    let mut y2 = None;
    for trace in &panel.traces {
        match trace {
            Trace::Line { x: xs, y: ys, axis, .. } => {
                let target = if *axis == Axis::Secondary { &mut y2 } else { &mut y };
                for (xv, yv) in xs.iter().zip(ys) {
                    if let Some(yv) = yv {
                        extend(&mut x, *xv);
                        extend(target, *yv);
                    }
                }
            }
            Trace::Scatter { x: xs, y: ys, .. } => {
                xs.iter().for_each(|v| extend(&mut x, *v));
                ys.iter().for_each(|v| extend(&mut y, *v));
            }
            Trace::Histogram { bins, .. } => {
                for bin in bins {
                    extend(&mut x, bin.start);
                    extend(&mut x, bin.end);
                    extend(&mut y, 0.0);
                    extend(&mut y, bin.count as f64);
                }
            }
            Trace::Heatmap { x_labels, y_labels, .. } => {
                extend(&mut x, -0.5);
                extend(&mut x, x_labels.len() as f64 - 0.5);
                extend(&mut y, -0.5);
                extend(&mut y, y_labels.len() as f64 - 0.5);
            }
        }
    }
    for line in &panel.reference_lines {
        let target = if line.axis == Axis::Secondary { &mut y2 } else { &mut y };
        extend(target, line.y);
    }

    let heatmap = panel.traces.iter().any(|t| matches!(t, Trace::Heatmap { .. }));
    let auto = |b: Option<(f64, f64)>| {
        let (lo, hi) = b.unwrap_or((0.0, 1.0));
        if heatmap { (lo, hi) } else { padded(lo, hi) }
    };
    PanelBounds {
        x: panel.x_range.unwrap_or_else(|| auto(x)),
        y: panel.y_range.unwrap_or_else(|| auto(y)),
        y2: panel.y2_range.unwrap_or_else(|| auto(y2)),
    }
}

// =============================================================================
// Panels
// =============================================================================

type Chart<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

fn draw_panel<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, panel: &Panel) -> Result<()> {
    let bounds = panel_bounds(panel);
    let secondary = panel.has_secondary();

    let mut builder = ChartBuilder::on(area);
    builder
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(50);
    if secondary {
        builder.right_y_label_area_size(50);
    }
    if !panel.title.is_empty() {
        builder.caption(&panel.title, ("sans-serif", 14));
    }
    let mut chart = builder
        .build_cartesian_2d(bounds.x.0..bounds.x.1, bounds.y.0..bounds.y.1)
        .map_err(chart_error)?;

    let heatmap_labels = panel.traces.iter().find_map(|t| match t {
        Trace::Heatmap { x_labels, y_labels, .. } => Some((x_labels.clone(), y_labels.clone())),
        _ => None,
    });
    let x_axis = panel.x_axis;
    let (x_names, y_names) = heatmap_labels.unwrap_or_default();
    let x_formatter = |v: &f64| match x_axis {
        XAxisKind::Time => x_to_time_label(*v),
        XAxisKind::Numeric if !x_names.is_empty() => category_label(&x_names, *v),
        XAxisKind::Numeric => format!("{v:.2}"),
    };
    let y_formatter = |v: &f64| {
        if y_names.is_empty() {
            format!("{v:.2}")
        } else {
            category_label(&y_names, *v)
        }
    };

    let mut mesh = chart.configure_mesh();
    mesh.x_desc(panel.x_label.as_str())
        .y_desc(panel.y_label.as_str())
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&y_formatter)
        .x_labels(if x_names.is_empty() { 6 } else { x_names.len() })
        .y_labels(if y_names.is_empty() { 6 } else { y_names.len() });
    if !x_names.is_empty() {
        mesh.disable_mesh();
    }
    mesh.draw().map_err(chart_error)?;

    if let Some(highlight) = &panel.highlight {
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(highlight.x0, bounds.y.0), (highlight.x1, bounds.y.1)],
                HIGHLIGHT.mix(0.3).filled(),
            )))
            .map_err(chart_error)?;
    }

    let mut labelled = false;
    for (idx, trace) in panel.traces.iter().enumerate() {
        if trace.axis() == Axis::Primary {
            labelled |= draw_primary_trace(&mut chart, trace, idx)?;
        }
    }
    for line in panel.reference_lines.iter().filter(|l| l.axis == Axis::Primary) {
        draw_reference_line(&mut chart, line, bounds.x, RED)?;
    }
    for note in &panel.annotations {
        for (i, text) in note.text.lines().enumerate() {
            chart
                .draw_series(std::iter::once(
                    EmptyElement::at((note.x, note.y))
                        + Text::new(
                            text.to_string(),
                            (-110, -12 * (3 - i as i32)),
                            ("sans-serif", 11).into_font(),
                        ),
                ))
                .map_err(chart_error)?;
        }
    }

    if secondary {
        let mut dual = chart.set_secondary_coord(bounds.x.0..bounds.x.1, bounds.y2.0..bounds.y2.1);
        dual.configure_secondary_axes()
            .y_desc(panel.secondary_y_label.as_deref().unwrap_or(""))
            .draw()
            .map_err(chart_error)?;
        for (idx, trace) in panel.traces.iter().enumerate() {
            if let Trace::Line { name, x, y, .. } = trace {
                if trace.axis() != Axis::Secondary {
                    continue;
                }
                let color = PALETTE[idx % PALETTE.len()];
                for segment in segments(x, y) {
                    dual.draw_secondary_series(LineSeries::new(segment, color))
                        .map_err(chart_error)?;
                }
                dual.draw_secondary_series(std::iter::empty::<PathElement<(f64, f64)>>())
                    .map_err(chart_error)?
                    .label(name.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
                labelled = true;
            }
        }
        for line in panel.reference_lines.iter().filter(|l| l.axis == Axis::Secondary) {
            let points = vec![(bounds.x.0, line.y), (bounds.x.1, line.y)];
            dual.draw_secondary_series(LineSeries::new(points, reference_style(line, GREEN)))
                .map_err(chart_error)?;
        }
        if labelled {
            dual.configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .map_err(chart_error)?;
        }
    } else if labelled {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(chart_error)?;
    }
    Ok(())
}

/// Draw one trace on the primary axis. Returns whether it added a legend entry.
fn draw_primary_trace<DB: DrawingBackend>(
    chart: &mut Chart<'_, DB>,
    trace: &Trace,
    idx: usize,
) -> Result<bool> {
    let color = PALETTE[idx % PALETTE.len()];
    match trace {
        Trace::Line { name, x, y, dash, .. } => {
            let style = match dash {
                LineDash::Solid => ShapeStyle::from(&color).stroke_width(2),
                LineDash::Dash | LineDash::Dot => ShapeStyle::from(&RED).stroke_width(1),
            };
            for segment in segments(x, y) {
                chart
                    .draw_series(LineSeries::new(segment, style))
                    .map_err(chart_error)?;
            }
            chart
                .draw_series(std::iter::empty::<PathElement<(f64, f64)>>())
                .map_err(chart_error)?
                .label(name.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
            Ok(true)
        }
        Trace::Scatter { x, y, .. } => {
            chart
                .draw_series(
                    x.iter()
                        .zip(y)
                        .map(|(&x, &y)| Circle::new((x, y), 2, color.mix(0.6).filled())),
                )
                .map_err(chart_error)?;
            Ok(false)
        }
        Trace::Histogram { bins, .. } => {
            chart
                .draw_series(bins.iter().map(|bin| {
                    Rectangle::new(
                        [(bin.start, 0.0), (bin.end, bin.count as f64)],
                        color.mix(0.7).filled(),
                    )
                }))
                .map_err(chart_error)?;
            Ok(false)
        }
        Trace::Heatmap { z, .. } => {
            for (row, values) in z.iter().enumerate() {
                for (col, value) in values.iter().enumerate() {
                    let (x, y) = (col as f64, row as f64);
                    let fill = value.map(diverging_color).unwrap_or(HIGHLIGHT);
                    chart
                        .draw_series(std::iter::once(Rectangle::new(
                            [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
                            fill.filled(),
                        )))
                        .map_err(chart_error)?;
                    if let Some(v) = value {
                        chart
                            .draw_series(std::iter::once(
                                EmptyElement::at((x, y))
                                    + Text::new(format!("{v:.3}"), (-14, -6), ("sans-serif", 12).into_font()),
                            ))
                            .map_err(chart_error)?;
                    }
                }
            }
            Ok(false)
        }
    }
}

fn reference_style(line: &ReferenceLine, base: RGBColor) -> ShapeStyle {
    match line.dash {
        LineDash::Solid | LineDash::Dash => ShapeStyle::from(&base).stroke_width(2),
        LineDash::Dot => ShapeStyle::from(&base.mix(0.6)).stroke_width(1),
    }
}

fn draw_reference_line<DB: DrawingBackend>(
    chart: &mut Chart<'_, DB>,
    line: &ReferenceLine,
    x: (f64, f64),
    base: RGBColor,
) -> Result<()> {
    let base = if line.dash == LineDash::Dot { RGBColor(255, 165, 0) } else { base };
    chart
        .draw_series(LineSeries::new(
            vec![(x.0, line.y), (x.1, line.y)],
            reference_style(line, base),
        ))
        .map_err(chart_error)?;
    Ok(())
}

/// Consecutive runs of defined points.
fn segments(x: &[f64], y: &[Option<f64>]) -> Vec<Vec<(f64, f64)>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for (&xv, yv) in x.iter().zip(y) {
        match yv {
            Some(yv) if yv.is_finite() => current.push((xv, *yv)),
            _ => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Label of the category nearest to `v` (categories sit at 0, 1, 2, ...).
fn category_label(names: &[String], v: f64) -> String {
    let idx = v.round();
    if idx < 0.0 || (v - idx).abs() > 0.25 {
        return String::new();
    }
    names.get(idx as usize).cloned().unwrap_or_default()
}

/// Red-white-blue scale for values in [-1, 1]; blue is positive.
fn diverging_color(v: f64) -> RGBColor {
    let t = v.clamp(-1.0, 1.0);
    let fade = |intensity: f64| (255.0 * (1.0 - intensity)) as u8;
    if t >= 0.0 {
        RGBColor(fade(t), fade(t * 0.6), 255)
    } else {
        RGBColor(255, fade(-t * 0.6), fade(-t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::figure::{ChartKind, HistogramBin};

    fn histogram_figure() -> Figure {
        let mut panel = Panel::new("values");
        panel.traces.push(Trace::Histogram {
            name: "values".to_string(),
            bins: vec![
                HistogramBin {
                    start: 0.0,
                    end: 1.0,
                    count: 3,
                },
                HistogramBin {
                    start: 1.0,
                    end: 2.0,
                    count: 5,
                },
            ],
        });
        Figure {
            title: "Histogram".to_string(),
            kind: ChartKind::HistogramGrid,
            width: 400,
            height: 300,
            grid: (1, 1),
            panels: vec![panel],
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("SVG".parse::<ChartFormat>().unwrap(), ChartFormat::Svg);
        assert_eq!(ChartFormat::Png.extension(), "png");
        assert!("gif".parse::<ChartFormat>().is_err());
    }

    #[test]
    fn test_pdf_export() {
        let bytes = export_figure(&histogram_figure(), ChartFormat::Pdf, 400, 300).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_zero_size_is_rejected_for_every_format() {
        for format in [ChartFormat::Png, ChartFormat::Svg, ChartFormat::Pdf] {
            let err = export_figure(&histogram_figure(), format, 0, 300).unwrap_err();
            assert_eq!(err.error_code(), "CHART_EXPORT_FAILED");
        }
    }

    #[test]
    fn test_svg_export() {
        // Text rendering needs a system font; without one the export fails
        // with a chart error instead of producing bytes.
        match export_figure(&histogram_figure(), ChartFormat::Svg, 400, 300) {
            Ok(bytes) => {
                let svg = String::from_utf8(bytes).unwrap();
                assert!(svg.contains("<svg"));
                assert!(svg.contains("<rect"));
            }
            Err(err) => assert_eq!(err.error_code(), "CHART_EXPORT_FAILED"),
        }
    }

    #[test]
    fn test_empty_figure_svg_has_no_text() {
        let figure = Figure::empty("nothing", ChartKind::Trend);
        let bytes = export_figure(&figure, ChartFormat::Svg, 200, 100).unwrap();
        assert!(String::from_utf8(bytes).unwrap().contains("<svg"));
    }

    #[test]
    fn test_png_export() {
        match export_figure(&histogram_figure(), ChartFormat::Png, 400, 300) {
            Ok(bytes) => assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G'])),
            Err(err) => assert_eq!(err.error_code(), "CHART_EXPORT_FAILED"),
        }
    }

    #[test]
    fn test_segments_break_on_gaps() {
        let parts = segments(&[0.0, 1.0, 2.0, 3.0], &[Some(1.0), None, Some(2.0), Some(f64::NAN)]);
        assert_eq!(parts, vec![vec![(0.0, 1.0)], vec![(2.0, 2.0)]]);
    }

    #[test]
    fn test_category_labels() {
        let names = vec!["a".to_string(), "b".to_string()];
        assert_eq!(category_label(&names, 1.0), "b");
        assert_eq!(category_label(&names, 0.5), "");
        assert_eq!(category_label(&names, 4.0), "");
    }

    #[test]
    fn test_padded_ranges() {
        assert_eq!(padded(0.0, 10.0), (-0.5, 10.5));
        assert_eq!(padded(2.0, 2.0), (1.0, 3.0));
    }
}
