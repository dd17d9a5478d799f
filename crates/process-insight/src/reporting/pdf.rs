//! PDF report rendering.
//!
//! Pages are A4 portrait and use only the PDF builtin fonts (Helvetica for
//! prose, Courier for tables), so no font files are needed at runtime.
//! Builtin fonts cover Latin-1; other characters are dropped from the output.
//! Figures are drawn from their chart model, not from the embedded SVG.

use super::document::{Block, Report};
use super::render::{DocumentRenderer, ReportFormat, text_table};
use crate::charts::Figure;
use crate::charts::pdf::draw_on_layer;
use crate::error::{AnalysisError, Result};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
    Rgb,
};
use tracing::{debug, warn};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const MM_PER_PT: f32 = 25.4 / 72.0;
const LEADING: f32 = 1.35;
/// Average Helvetica advance as a fraction of the font size.
const SANS_ADVANCE: f32 = 0.5;
const MONO_ADVANCE: f32 = 0.6;

const TITLE_PT: f32 = 18.0;
const SECTION_PT: f32 = 14.0;
const BODY_PT: f32 = 10.0;
const SMALL_PT: f32 = 9.0;
const TABLE_MIN_PT: f32 = 5.0;
/// Chart size used when a figure carries no pixel size of its own.
const DEFAULT_FIGURE_PX: (u32, u32) = (600, 400);

/// Renders reports as PDF documents.
pub struct PdfRenderer;

fn unavailable(err: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::RendererUnavailable(format!("PDF: {err}"))
}

fn black() -> Color {
    Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None))
}

/// Greedy word wrap to at most `max_chars` per line. Words longer than a line
/// are kept whole.
pub(crate) fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let needed = current.chars().count() + 1 + word.chars().count();
            if !current.is_empty() && needed > max_chars {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }
    lines
}

/// Largest font size (points) at which `chars` monospace characters fit the
/// content width, capped at `max_pt`.
fn monospace_fit(chars: usize, max_pt: f32) -> f32 {
    if chars == 0 {
        return max_pt;
    }
    let fit = CONTENT_WIDTH / (chars as f32 * MONO_ADVANCE * MM_PER_PT);
    fit.clamp(TABLE_MIN_PT, max_pt)
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
    mono: IndirectFontRef,
}

/// Flows lines and figures down the page, starting new pages as needed.
/// `cursor` is the distance of the next line's top from the page bottom.
struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    fonts: &'a Fonts,
    cursor: f32,
    pages: usize,
}

impl PageWriter<'_> {
    fn new_page(&mut self) {
        self.pages += 1;
        let (page, layer) =
            self.doc
                .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), format!("page {}", self.pages));
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor = PAGE_HEIGHT - MARGIN;
    }

    fn at_page_top(&self) -> bool {
        self.cursor >= PAGE_HEIGHT - MARGIN
    }

    fn reserve(&mut self, height: f32) {
        if self.cursor - height < MARGIN && !self.at_page_top() {
            self.new_page();
        }
    }

    fn gap(&mut self, height: f32) {
        if !self.at_page_top() {
            self.cursor -= height;
        }
    }

    fn line(&mut self, text: &str, size: f32, font: &IndirectFontRef, indent: f32) {
        let height = size * MM_PER_PT * LEADING;
        self.reserve(height);
        self.cursor -= height;
        if text.is_empty() {
            return;
        }
        self.layer.set_fill_color(black());
        let baseline = self.cursor + size * MM_PER_PT * (LEADING - 1.0);
        self.layer
            .use_text(text, size, Mm(MARGIN + indent), Mm(baseline), font);
    }

    fn wrapped(&mut self, text: &str, size: f32, font: &IndirectFontRef, indent: f32) {
        let width = CONTENT_WIDTH - indent;
        let max_chars = (width / (size * MM_PER_PT * SANS_ADVANCE)) as usize;
        for line in wrap(text, max_chars) {
            self.line(&line, size, font, indent);
        }
    }

    fn table(&mut self, headers: &[String], rows: &[Vec<String>]) {
        let lines = text_table(headers, rows);
        let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let size = monospace_fit(longest, SMALL_PT);
        let fonts = self.fonts;
        for line in &lines {
            self.line(line, size, &fonts.mono, 0.0);
        }
    }

    fn figure(&mut self, caption: &str, figure: &Figure) {
        let fonts = self.fonts;
        let px = if figure.width == 0 || figure.height == 0 {
            DEFAULT_FIGURE_PX
        } else {
            (figure.width, figure.height)
        };
        let aspect = px.1 as f32 / px.0 as f32;
        let max_height = PAGE_HEIGHT - 2.0 * MARGIN - 2.0 * SMALL_PT * MM_PER_PT * LEADING;
        let width = CONTENT_WIDTH.min(max_height / aspect);
        let height = width * aspect;

        self.reserve(height);
        let left = MARGIN + (CONTENT_WIDTH - width) / 2.0;
        let bottom = self.cursor - height;
        match draw_on_layer(
            &self.layer,
            &fonts.regular,
            figure,
            px,
            (Mm(left), Mm(bottom)),
            Mm(width),
        ) {
            Ok(()) => self.cursor = bottom,
            Err(err) => {
                warn!(figure = %caption, error = %err, "Figure could not be drawn into the PDF");
                self.wrapped(
                    &format!("Failed to render the chart: {err}"),
                    BODY_PT,
                    &fonts.regular,
                    0.0,
                );
            }
        }
        self.line(caption, SMALL_PT, &fonts.italic, 0.0);
    }

    fn block(&mut self, block: &Block) {
        let fonts = self.fonts;
        match block {
            Block::Heading { level, text } => {
                let size = if *level <= 2 { 12.0 } else { 11.0 };
                self.gap(2.0);
                self.wrapped(text, size, &fonts.bold, 0.0);
            }
            Block::Paragraph { text } => self.wrapped(text, BODY_PT, &fonts.regular, 0.0),
            Block::Table { headers, rows } => self.table(headers, rows),
            Block::Figure {
                caption, figure, ..
            } => match figure {
                Some(figure) => self.figure(caption, figure),
                None => self.line(&format!("[chart: {caption}]"), BODY_PT, &fonts.italic, 0.0),
            },
            Block::List { ordered, items } => {
                for (i, item) in items.iter().enumerate() {
                    let marker = if *ordered {
                        format!("{}.", i + 1)
                    } else {
                        "-".to_string()
                    };
                    self.wrapped(&format!("{marker} {item}"), BODY_PT, &fonts.regular, 4.0);
                }
            }
        }
        self.gap(1.5);
    }
}

impl DocumentRenderer for PdfRenderer {
    fn format(&self) -> ReportFormat {
        ReportFormat::Pdf
    }

    fn render(&self, report: &Report) -> Result<Vec<u8>> {
        let (doc, page, layer) =
            PdfDocument::new(&report.title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "page 1");
        let fonts = Fonts {
            regular: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(unavailable)?,
            bold: doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(unavailable)?,
            italic: doc.add_builtin_font(BuiltinFont::HelveticaOblique).map_err(unavailable)?,
            mono: doc.add_builtin_font(BuiltinFont::Courier).map_err(unavailable)?,
        };
        let pages = {
            let mut writer = PageWriter {
                doc: &doc,
                layer: doc.get_page(page).get_layer(layer),
                fonts: &fonts,
                cursor: PAGE_HEIGHT - MARGIN,
                pages: 1,
            };
            writer.wrapped(&report.title, TITLE_PT, &fonts.bold, 0.0);
            writer.line(&format!("Created: {}", report.created_at), SMALL_PT, &fonts.regular, 0.0);
            writer.line(
                "This report was generated automatically.",
                SMALL_PT,
                &fonts.regular,
                0.0,
            );
            for section in &report.sections {
                writer.gap(4.0);
                writer.wrapped(&section.heading, SECTION_PT, &fonts.bold, 0.0);
                writer.gap(1.0);
                for block in &section.blocks {
                    writer.block(block);
                }
            }
            writer.pages
        };
        let bytes = doc.save_to_bytes().map_err(unavailable)?;
        debug!(pages, bytes = bytes.len(), "PDF report rendered");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::figure::{ChartKind, Panel, Trace};
    use crate::reporting::document::Section;
    use pretty_assertions::assert_eq;

    fn report(rows: usize) -> Report {
        let mut section = Section::new("1. Data overview");
        section.push(Block::paragraph("Rows and columns of the cleaned data."));
        section.push(Block::table(
            ["Item", "Value"],
            (0..rows).map(|i| vec![format!("row {i}"), i.to_string()]).collect(),
        ));
        Report {
            title: "Process data report".to_string(),
            created_at: "2024-01-01 00:00:00".to_string(),
            sections: vec![section],
        }
    }

    #[test]
    fn test_pdf_report_renders() {
        let bytes = PdfRenderer.render(&report(3)).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        assert_eq!(PdfRenderer.format(), ReportFormat::Pdf);
    }

    #[test]
    fn test_long_table_spills_onto_more_pages() {
        let short = PdfRenderer.render(&report(3)).unwrap();
        let long = PdfRenderer.render(&report(400)).unwrap();
        assert!(long.starts_with(b"%PDF-"));
        assert!(long.len() > short.len());
    }

    #[test]
    fn test_report_with_figure_renders() {
        let mut panel = Panel::new("flow");
        panel.traces.push(Trace::Scatter {
            name: "flow".to_string(),
            x: vec![1.0, 2.0, 3.0],
            y: vec![2.0, 4.0, 3.0],
        });
        let mut figure = Figure::empty("Scatter", ChartKind::ScatterMatrix);
        figure.panels.push(panel);

        let mut report = report(1);
        report.sections[0].push(Block::Figure {
            caption: "Scatter".to_string(),
            svg: String::new(),
            figure: Some(figure),
        });
        let bytes = PdfRenderer.render(&report).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_wrap_breaks_on_word_boundaries() {
        assert_eq!(wrap("alpha beta gamma", 10), vec!["alpha beta", "gamma"]);
        assert_eq!(wrap("", 10), Vec::<String>::new());
        assert_eq!(wrap("averyveryverylongword x", 5), vec!["averyveryverylongword", "x"]);
        assert_eq!(wrap("one\ntwo", 40), vec!["one", "two"]);
    }

    #[test]
    fn test_monospace_fit_shrinks_wide_tables() {
        assert_eq!(monospace_fit(10, SMALL_PT), SMALL_PT);
        let wide = monospace_fit(200, SMALL_PT);
        assert!(wide < SMALL_PT);
        assert!(wide >= TABLE_MIN_PT);
    }
}
