//! Turning a [`Report`] into bytes.

use super::document::{Block, Report};
use super::pdf::PdfRenderer;
use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Html,
    Json,
    Text,
    Pdf,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Html => "html",
            ReportFormat::Json => "json",
            ReportFormat::Text => "txt",
            ReportFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportFormat::Html => "html",
            ReportFormat::Json => "json",
            ReportFormat::Text => "text",
            ReportFormat::Pdf => "pdf",
        };
        f.write_str(name)
    }
}

impl FromStr for ReportFormat {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "html" | "htm" => Ok(ReportFormat::Html),
            "json" => Ok(ReportFormat::Json),
            "text" | "txt" => Ok(ReportFormat::Text),
            "pdf" => Ok(ReportFormat::Pdf),
            other => Err(AnalysisError::InvalidConfig(format!(
                "unknown report format '{other}'"
            ))),
        }
    }
}

/// Serializes a report document into one output format.
pub trait DocumentRenderer {
    fn format(&self) -> ReportFormat;

    fn render(&self, report: &Report) -> Result<Vec<u8>>;
}

pub fn renderer_for(format: ReportFormat) -> Box<dyn DocumentRenderer> {
    match format {
        ReportFormat::Html => Box::new(HtmlRenderer),
        ReportFormat::Json => Box::new(JsonRenderer { pretty: true }),
        ReportFormat::Text => Box::new(TextRenderer),
        ReportFormat::Pdf => Box::new(PdfRenderer),
    }
}

pub fn render_report(report: &Report, format: ReportFormat) -> Result<Vec<u8>> {
    renderer_for(format).render(report)
}

// ============================================================================
// JSON
// ============================================================================

pub struct JsonRenderer {
    pub pretty: bool,
}

impl DocumentRenderer for JsonRenderer {
    fn format(&self) -> ReportFormat {
        ReportFormat::Json
    }

    fn render(&self, report: &Report) -> Result<Vec<u8>> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(report)?
        } else {
            serde_json::to_vec(report)?
        };
        Ok(bytes)
    }
}

// ============================================================================
// Text
// ============================================================================

pub struct TextRenderer;

pub(crate) fn text_table(headers: &[String], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }
    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:<w$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };
    let mut out = vec![line(headers)];
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.extend(rows.iter().map(|r| line(r)));
    out
}

impl DocumentRenderer for TextRenderer {
    fn format(&self) -> ReportFormat {
        ReportFormat::Text
    }

    fn render(&self, report: &Report) -> Result<Vec<u8>> {
        let mut lines = vec![
            report.title.clone(),
            "=".repeat(report.title.chars().count().max(20)),
            format!("Created: {}", report.created_at),
            String::new(),
        ];
        for section in &report.sections {
            lines.push(section.heading.clone());
            lines.push("-".repeat(section.heading.chars().count()));
            for block in &section.blocks {
                match block {
                    Block::Heading { text, .. } => lines.push(format!("\n{text}")),
                    Block::Paragraph { text } => lines.push(text.clone()),
                    Block::Table { headers, rows } => lines.extend(text_table(headers, rows)),
                    Block::Figure { caption, svg, .. } if !svg.is_empty() => {
                        lines.push(format!("[chart: {caption}]"))
                    }
                    Block::Figure { .. } => {}
                    Block::List { ordered, items } => {
                        for (i, item) in items.iter().enumerate() {
                            if *ordered {
                                lines.push(format!("{}. {item}", i + 1));
                            } else {
                                lines.push(format!("- {item}"));
                            }
                        }
                    }
                }
            }
            lines.push(String::new());
        }
        Ok(lines.join("\n").into_bytes())
    }
}

// ============================================================================
// HTML
// ============================================================================

/// Single self-contained page; charts are inline SVG.
pub struct HtmlRenderer;

const HTML_STYLE: &str = "body{font-family:sans-serif;max-width:960px;margin:2em auto;color:#222}\
h1{text-align:center}h2{color:#1f3b73;border-bottom:1px solid #ccc}h3{color:#2e6b30}\
table{border-collapse:collapse;margin:1em 0}th{background:#777;color:#fff}\
td,th{border:1px solid #333;padding:4px 8px;font-size:0.9em}td{background:#f5f5dc}\
figure{margin:1em 0}figcaption{font-style:italic}";

pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl DocumentRenderer for HtmlRenderer {
    fn format(&self) -> ReportFormat {
        ReportFormat::Html
    }

    fn render(&self, report: &Report) -> Result<Vec<u8>> {
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<title>{}</title>\n", escape_html(&report.title)));
        html.push_str(&format!("<style>{HTML_STYLE}</style>\n</head>\n<body>\n"));
        html.push_str(&format!("<h1>{}</h1>\n", escape_html(&report.title)));
        html.push_str(&format!(
            "<p>Created: {}</p>\n<p>This report was generated automatically.</p>\n",
            escape_html(&report.created_at)
        ));

        for section in &report.sections {
            html.push_str(&format!("<h2>{}</h2>\n", escape_html(&section.heading)));
            for block in &section.blocks {
                match block {
                    Block::Heading { level, text } => {
                        let level = (*level).clamp(3, 6);
                        html.push_str(&format!("<h{level}>{}</h{level}>\n", escape_html(text)));
                    }
                    Block::Paragraph { text } => {
                        html.push_str(&format!("<p>{}</p>\n", escape_html(text)));
                    }
                    Block::Table { headers, rows } => {
                        html.push_str("<table>\n<tr>");
                        for header in headers {
                            html.push_str(&format!("<th>{}</th>", escape_html(header)));
                        }
                        html.push_str("</tr>\n");
                        for row in rows {
                            html.push_str("<tr>");
                            for cell in row {
                                html.push_str(&format!("<td>{}</td>", escape_html(cell)));
                            }
                            html.push_str("</tr>\n");
                        }
                        html.push_str("</table>\n");
                    }
                    Block::Figure { caption, svg, .. } if !svg.is_empty() => {
                        html.push_str(&format!(
                            "<figure>\n{svg}\n<figcaption>{}</figcaption>\n</figure>\n",
                            escape_html(caption)
                        ));
                    }
                    Block::Figure { .. } => {}
                    Block::List { ordered, items } => {
                        let tag = if *ordered { "ol" } else { "ul" };
                        html.push_str(&format!("<{tag}>\n"));
                        for item in items {
                            html.push_str(&format!("<li>{}</li>\n", escape_html(item)));
                        }
                        html.push_str(&format!("</{tag}>\n"));
                    }
                }
            }
        }
        html.push_str("</body>\n</html>\n");
        Ok(html.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::document::Section;

    fn report() -> Report {
        let mut section = Section::new("1. Data <overview>");
        section
            .push(Block::table(["Item", "Value"], vec![vec!["Rows".to_string(), "1,000".to_string()]]))
            .push(Block::List {
                ordered: true,
                items: vec!["first".to_string(), "second".to_string()],
            });
        Report {
            title: "Report".to_string(),
            created_at: "2024-01-01 00:00:00".to_string(),
            sections: vec![section],
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("HTML".parse::<ReportFormat>().unwrap(), ReportFormat::Html);
        assert_eq!("txt".parse::<ReportFormat>().unwrap(), ReportFormat::Text);
        assert!("docx".parse::<ReportFormat>().is_err());
        assert_eq!(ReportFormat::Text.extension(), "txt");
    }

    #[test]
    fn test_every_format_has_a_renderer() {
        for format in [ReportFormat::Html, ReportFormat::Json, ReportFormat::Text, ReportFormat::Pdf] {
            assert_eq!(renderer_for(format).format(), format);
        }
        let pdf = render_report(&report(), ReportFormat::Pdf).unwrap();
        assert!(pdf.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_figure_without_svg_is_skipped_in_html_and_text() {
        let mut report = report();
        report.sections[0].push(Block::Figure {
            caption: "Trend".to_string(),
            svg: String::new(),
            figure: None,
        });
        let html = String::from_utf8(render_report(&report, ReportFormat::Html).unwrap()).unwrap();
        assert!(!html.contains("<figure>"));
        let text = String::from_utf8(render_report(&report, ReportFormat::Text).unwrap()).unwrap();
        assert!(!text.contains("[chart: Trend]"));
    }

    #[test]
    fn test_html_escapes_and_structures() {
        let html = String::from_utf8(render_report(&report(), ReportFormat::Html).unwrap()).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<h2>1. Data &lt;overview&gt;</h2>"));
        assert!(html.contains("<td>1,000</td>"));
        assert!(html.contains("<ol>\n<li>first</li>"));
    }

    #[test]
    fn test_text_table_alignment() {
        let text = String::from_utf8(render_report(&report(), ReportFormat::Text).unwrap()).unwrap();
        assert!(text.contains("Item | Value"));
        assert!(text.contains("-----+------"));
        assert!(text.contains("Rows | 1,000"));
        assert!(text.contains("2. second"));
    }

    #[test]
    fn test_json_roundtrip() {
        let bytes = render_report(&report(), ReportFormat::Json).unwrap();
        let parsed: Report = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, report());
    }
}
