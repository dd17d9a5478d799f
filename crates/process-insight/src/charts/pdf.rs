//! PDF output for figures.
//!
//! [`PdfBackend`] is a plotters drawing backend that writes vector paths and
//! builtin-font text onto a printpdf layer, so the same figure drawing code
//! serves PNG, SVG and PDF. Text is measured with a fixed average glyph
//! width, which keeps PDF output independent of installed system fonts.

use super::export::{chart_error, draw_figure};
use super::figure::Figure;
use crate::error::{AnalysisError, Result};
use plotters::drawing::IntoDrawingArea;
use plotters_backend::text_anchor::{HPos, VPos};
use plotters_backend::{
    BackendColor, BackendCoord, BackendStyle, BackendTextStyle, DrawingBackend, DrawingErrorKind,
    FontTransform,
};
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Polygon,
    Rgb, TextMatrix,
};
use std::convert::Infallible;

/// Millimetres per pixel at 96 dpi.
pub(crate) const MM_PER_PX: f32 = 25.4 / 96.0;
const PT_PER_MM: f32 = 72.0 / 25.4;
/// Average Helvetica advance width as a fraction of the font size.
const GLYPH_WIDTH: f64 = 0.52;
const CIRCLE_SEGMENTS: usize = 32;

/// Draws into a `size`-pixel box whose lower-left corner sits at `origin`
/// (millimetres from the page's lower-left corner).
pub(crate) struct PdfBackend<'a> {
    layer: &'a PdfLayerReference,
    font: &'a IndirectFontRef,
    size: (u32, u32),
    origin: (f32, f32),
    scale: f32,
}

impl<'a> PdfBackend<'a> {
    pub(crate) fn new(
        layer: &'a PdfLayerReference,
        font: &'a IndirectFontRef,
        size: (u32, u32),
        origin: (Mm, Mm),
        width: Mm,
    ) -> Self {
        Self {
            layer,
            font,
            size,
            origin: (origin.0.0, origin.1.0),
            scale: width.0 / size.0.max(1) as f32,
        }
    }

    fn point(&self, (x, y): BackendCoord) -> Point {
        self.point_f(x as f32, y as f32)
    }

    fn point_f(&self, x: f32, y: f32) -> Point {
        Point::new(
            Mm(self.origin.0 + x * self.scale),
            Mm(self.origin.1 + (self.size.1 as f32 - y) * self.scale),
        )
    }

    fn stroke(&self, style: &impl BackendStyle) -> bool {
        let color = style.color();
        if color.alpha <= 0.0 {
            return false;
        }
        self.layer.set_outline_color(pdf_color(color));
        let width_mm = style.stroke_width().max(1) as f32 * self.scale;
        self.layer.set_outline_thickness(width_mm * PT_PER_MM);
        true
    }

    fn fill(&self, color: BackendColor) -> bool {
        if color.alpha <= 0.0 {
            return false;
        }
        self.layer.set_fill_color(pdf_color(color));
        true
    }

    fn polyline(&self, points: Vec<Point>, closed: bool) {
        if points.len() < 2 {
            return;
        }
        self.layer.add_line(Line {
            points: points.into_iter().map(|p| (p, false)).collect(),
            is_closed: closed,
        });
    }

    fn filled(&self, points: Vec<Point>) {
        if points.len() < 3 {
            return;
        }
        self.layer.add_polygon(Polygon {
            rings: vec![points.into_iter().map(|p| (p, false)).collect()],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        });
    }
}

/// Translucent colors are blended against white; the page has no other background.
fn pdf_color(color: BackendColor) -> Color {
    let alpha = color.alpha.clamp(0.0, 1.0) as f32;
    let channel = |c: u8| 1.0 - alpha * (1.0 - c as f32 / 255.0);
    let (r, g, b) = color.rgb;
    Color::Rgb(Rgb::new(channel(r), channel(g), channel(b), None))
}

fn text_width(text: &str, size: f64) -> f64 {
    text.chars().count() as f64 * size * GLYPH_WIDTH
}

impl DrawingBackend for PdfBackend<'_> {
    type ErrorType = Infallible;

    fn get_size(&self) -> (u32, u32) {
        self.size
    }

    fn ensure_prepared(&mut self) -> std::result::Result<(), DrawingErrorKind<Infallible>> {
        Ok(())
    }

    fn present(&mut self) -> std::result::Result<(), DrawingErrorKind<Infallible>> {
        Ok(())
    }

    fn draw_pixel(
        &mut self,
        point: BackendCoord,
        color: BackendColor,
    ) -> std::result::Result<(), DrawingErrorKind<Infallible>> {
        if self.fill(color) {
            let (x, y) = point;
            self.filled(vec![
                self.point((x, y)),
                self.point((x + 1, y)),
                self.point((x + 1, y + 1)),
                self.point((x, y + 1)),
            ]);
        }
        Ok(())
    }

    fn draw_line<S: BackendStyle>(
        &mut self,
        from: BackendCoord,
        to: BackendCoord,
        style: &S,
    ) -> std::result::Result<(), DrawingErrorKind<Infallible>> {
        if self.stroke(style) {
            self.polyline(vec![self.point(from), self.point(to)], false);
        }
        Ok(())
    }

    fn draw_rect<S: BackendStyle>(
        &mut self,
        upper_left: BackendCoord,
        bottom_right: BackendCoord,
        style: &S,
        fill: bool,
    ) -> std::result::Result<(), DrawingErrorKind<Infallible>> {
        let (x0, y0) = upper_left;
        let (x1, y1) = bottom_right;
        let corners = vec![
            self.point((x0, y0)),
            self.point((x1, y0)),
            self.point((x1, y1)),
            self.point((x0, y1)),
        ];
        if fill {
            if self.fill(style.color()) {
                self.filled(corners);
            }
        } else if self.stroke(style) {
            self.polyline(corners, true);
        }
        Ok(())
    }

    fn draw_path<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        path: I,
        style: &S,
    ) -> std::result::Result<(), DrawingErrorKind<Infallible>> {
        if self.stroke(style) {
            let points = path.into_iter().map(|c| self.point(c)).collect();
            self.polyline(points, false);
        }
        Ok(())
    }

    fn fill_polygon<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        vert: I,
        style: &S,
    ) -> std::result::Result<(), DrawingErrorKind<Infallible>> {
        if self.fill(style.color()) {
            let points = vert.into_iter().map(|c| self.point(c)).collect();
            self.filled(points);
        }
        Ok(())
    }

    fn draw_circle<S: BackendStyle>(
        &mut self,
        center: BackendCoord,
        radius: u32,
        style: &S,
        fill: bool,
    ) -> std::result::Result<(), DrawingErrorKind<Infallible>> {
        let (cx, cy) = (center.0 as f32, center.1 as f32);
        let r = radius as f32;
        let ring: Vec<Point> = (0..CIRCLE_SEGMENTS)
            .map(|i| {
                let angle = i as f32 / CIRCLE_SEGMENTS as f32 * std::f32::consts::TAU;
                self.point_f(cx + r * angle.cos(), cy + r * angle.sin())
            })
            .collect();
        if fill {
            if self.fill(style.color()) {
                self.filled(ring);
            }
        } else if self.stroke(style) {
            self.polyline(ring, true);
        }
        Ok(())
    }

    fn draw_text<TStyle: BackendTextStyle>(
        &mut self,
        text: &str,
        style: &TStyle,
        pos: BackendCoord,
    ) -> std::result::Result<(), DrawingErrorKind<Infallible>> {
        if text.is_empty() || !self.fill(style.color()) {
            return Ok(());
        }
        let size = style.size();
        let width = text_width(text, size);
        let anchor = style.anchor();
        // Offsets of the baseline start from the anchor, in unrotated text space.
        let dx = match anchor.h_pos {
            HPos::Left => 0.0,
            HPos::Center => -width / 2.0,
            HPos::Right => -width,
        };
        let dy = match anchor.v_pos {
            VPos::Top => size * 0.8,
            VPos::Center => size * 0.3,
            VPos::Bottom => 0.0,
        };
        // Pixel y grows downwards; rotation is clockwise on screen.
        let (ox, oy, degrees) = match style.transform() {
            FontTransform::None => (dx, dy, 0.0),
            FontTransform::Rotate90 => (-dy, dx, 270.0),
            FontTransform::Rotate180 => (-dx, -dy, 180.0),
            FontTransform::Rotate270 => (dy, -dx, 90.0),
        };
        let start = self.point_f(pos.0 as f32 + ox as f32, pos.1 as f32 + oy as f32);
        let font_pt = size as f32 * self.scale * PT_PER_MM;

        self.layer.begin_text_section();
        self.layer.set_font(self.font, font_pt);
        self.layer
            .set_text_matrix(TextMatrix::TranslateRotate(start.x, start.y, degrees));
        self.layer.write_text(text, self.font);
        self.layer.end_text_section();
        Ok(())
    }

    fn estimate_text_size<TStyle: BackendTextStyle>(
        &self,
        text: &str,
        style: &TStyle,
    ) -> std::result::Result<(u32, u32), DrawingErrorKind<Infallible>> {
        let size = style.size();
        Ok((text_width(text, size).ceil() as u32, size.ceil() as u32))
    }
}

pub(crate) fn pdf_error(err: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::ChartExport(format!("PDF: {err}"))
}

/// Draw `figure` into a box on `layer`, scaled to `width` millimetres.
pub(crate) fn draw_on_layer(
    layer: &PdfLayerReference,
    font: &IndirectFontRef,
    figure: &Figure,
    size: (u32, u32),
    origin: (Mm, Mm),
    width: Mm,
) -> Result<()> {
    let root = PdfBackend::new(layer, font, size, origin, width).into_drawing_area();
    draw_figure(&root, figure)?;
    root.present().map_err(chart_error)?;
    Ok(())
}

/// Single-page PDF with the page sized to the figure at 96 dpi.
pub fn figure_pdf(figure: &Figure, width: u32, height: u32) -> Result<Vec<u8>> {
    let page = (Mm(width as f32 * MM_PER_PX), Mm(height as f32 * MM_PER_PX));
    let (doc, page_index, layer_index) = PdfDocument::new(&figure.title, page.0, page.1, "chart");
    let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?;
    let layer = doc.get_page(page_index).get_layer(layer_index);
    draw_on_layer(&layer, &font, figure, (width, height), (Mm(0.0), Mm(0.0)), page.0)?;
    doc.save_to_bytes().map_err(pdf_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::figure::{Axis, ChartKind, LineDash, Panel, Trace};
    use pretty_assertions::assert_eq;

    fn line_figure() -> Figure {
        let mut panel = Panel::new("flow");
        panel.x_label = "Time".to_string();
        panel.y_label = "flow".to_string();
        panel.traces.push(Trace::Line {
            name: "flow".to_string(),
            x: vec![0.0, 1.0, 2.0, 3.0],
            y: vec![Some(1.0), Some(3.0), None, Some(2.0)],
            axis: Axis::Primary,
            dash: LineDash::Solid,
        });
        let mut figure = Figure::empty("Flow trend", ChartKind::Trend);
        figure.panels.push(panel);
        figure
    }

    #[test]
    fn test_figure_pdf_has_header_and_trailer() {
        let bytes = figure_pdf(&line_figure(), 600, 400).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        let tail = String::from_utf8_lossy(&bytes[bytes.len().saturating_sub(16)..]).to_string();
        assert!(tail.contains("%%EOF"));
    }

    #[test]
    fn test_empty_figure_still_makes_a_page() {
        let figure = Figure::empty("nothing", ChartKind::Trend);
        let bytes = figure_pdf(&figure, 200, 100).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_translucent_colors_blend_with_white() {
        let half = BackendColor {
            alpha: 0.5,
            rgb: (0, 0, 0),
        };
        assert_eq!(pdf_color(half), Color::Rgb(Rgb::new(0.5, 0.5, 0.5, None)));
        let opaque = BackendColor {
            alpha: 1.0,
            rgb: (255, 0, 0),
        };
        assert_eq!(pdf_color(opaque), Color::Rgb(Rgb::new(1.0, 0.0, 0.0, None)));
    }

    #[test]
    fn test_text_estimate_scales_with_length() {
        assert!(text_width("abcd", 10.0) > text_width("ab", 10.0));
        assert_eq!(text_width("", 12.0), 0.0);
    }
}
