//! `printpdf` backend.
//!
//! printpdf documents cannot cross threads, so drawing calls are recorded and replayed
//! into a fresh document in `finish`, which runs on a blocking worker.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::io::BufWriter;

use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, LineDashPattern, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point as PdfPoint, Polygon, Pt, Rgb, Svg,
    SvgTransform, TextMatrix, TextRenderingMode,
};
use tracing::{debug, error};

use crate::error::{ChartError, ChartResult};

use super::{Colour, DrawOp, Paint, Point, Shape, Surface, SvgFit, TextMode, TextStyle};

const A4_WIDTH: f64 = 595.28;
const A4_HEIGHT: f64 = 841.89;
const CIRCLE_SEGMENTS: usize = 32;
const CORNER_SEGMENTS: usize = 6;

pub struct PdfSurface {
    title: String,
    ops: Vec<DrawOp>,
    fonts: HashMap<String, Vec<u8>>,
}

impl PdfSurface {
    pub fn new(title: &str) -> Self {
        PdfSurface {
            title: title.to_string(),
            ops: Vec::new(),
            fonts: HashMap::new(),
        }
    }
}

impl Surface for PdfSurface {
    fn begin_page(&mut self, width: f64, height: f64) {
        self.ops.push(DrawOp::Page { width, height });
    }

    fn draw(&mut self, shape: Shape, paint: Paint) {
        self.ops.push(DrawOp::Shape { shape, paint });
    }

    fn text(&mut self, text: &str, x: f64, y: f64, style: &TextStyle) {
        self.ops.push(DrawOp::Text {
            text: text.to_string(),
            x,
            y,
            style: style.clone(),
        });
    }

    fn register_font(&mut self, name: &str, bytes: Vec<u8>) {
        self.fonts.insert(name.to_string(), bytes);
    }

    fn place_svg(&mut self, source: &str, x: f64, y: f64, width: f64, height: f64, fit: SvgFit) {
        self.ops.push(DrawOp::Svg {
            source: source.to_string(),
            x,
            y,
            width,
            height,
            fit,
        });
    }

    fn page_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Page { .. }))
            .count()
    }

    fn finish(self) -> ChartResult<Vec<u8>> {
        let mut replay = Replay::new(&self.title, self.fonts);
        for op in &self.ops {
            replay.apply(op)?;
        }
        replay.save()
    }
}

fn to_mm(value: f64) -> Mm {
    Mm::from(Pt(value as f32))
}

fn pdf_colour(colour: Colour) -> Color {
    let (r, g, b) = colour.to_unit();
    Color::Rgb(Rgb::new(r, g, b, None))
}

struct Replay {
    doc: PdfDocumentReference,
    layer: Option<PdfLayerReference>,
    page_height: f64,
    font_files: HashMap<String, Vec<u8>>,
    loaded: HashMap<String, IndirectFontRef>,
}

impl Replay {
    fn new(title: &str, font_files: HashMap<String, Vec<u8>>) -> Self {
        Replay {
            doc: PdfDocument::empty(title),
            layer: None,
            page_height: A4_HEIGHT,
            font_files,
            loaded: HashMap::new(),
        }
    }

    fn apply(&mut self, op: &DrawOp) -> ChartResult<()> {
        match op {
            DrawOp::Page { width, height } => {
                self.add_page(*width, *height);
            }
            DrawOp::Shape { shape, paint } => self.shape(shape, paint),
            DrawOp::Text { text, x, y, style } => self.text(text, *x, *y, style)?,
            DrawOp::Svg { source, x, y, width, height, fit } => {
                self.svg(source, *x, *y, *width, *height, *fit)
            }
        }
        Ok(())
    }

    fn add_page(&mut self, width: f64, height: f64) -> PdfLayerReference {
        let (page, layer) = self.doc.add_page(to_mm(width), to_mm(height), "Layer 1");
        let layer = self.doc.get_page(page).get_layer(layer);
        self.layer = Some(layer.clone());
        self.page_height = height;
        layer
    }

    /// Drawing before the first page starts an A4 page.
    fn layer(&mut self) -> PdfLayerReference {
        match &self.layer {
            Some(layer) => layer.clone(),
            None => self.add_page(A4_WIDTH, A4_HEIGHT),
        }
    }

    fn point(&self, point: Point) -> (PdfPoint, bool) {
        (
            PdfPoint::new(to_mm(point.x), to_mm(self.page_height - point.y)),
            false,
        )
    }

    fn font(&mut self, name: &str) -> ChartResult<IndirectFontRef> {
        if let Some(font) = self.loaded.get(name) {
            return Ok(font.clone());
        }
        let external = self
            .font_files
            .get(name)
            .and_then(|bytes| match self.doc.add_external_font(bytes.as_slice()) {
                Ok(font) => Some(font),
                Err(err) => {
                    error!(font = name, "unusable font file: {}", err);
                    None
                }
            });
        let font = match external {
            Some(font) => font,
            None => self
                .doc
                .add_builtin_font(builtin_for(name))
                .map_err(|err| ChartError::Pdf(err.to_string()))?,
        };
        self.loaded.insert(name.to_string(), font.clone());
        Ok(font)
    }

    fn shape(&mut self, shape: &Shape, paint: &Paint) {
        let layer = self.layer();
        let (outline, closed) = outline(shape);
        let points: Vec<_> = outline.into_iter().map(|p| self.point(p)).collect();

        if let Some(stroke) = paint.stroke {
            layer.set_outline_color(pdf_colour(stroke.over_white(paint.stroke_opacity)));
            layer.set_outline_thickness(paint.line_width as f32);
        }
        if let Some((length, gap)) = paint.dash {
            layer.set_line_dash_pattern(LineDashPattern {
                dash_1: Some(length.round().max(1.0) as i64),
                gap_1: Some(gap.round().max(1.0) as i64),
                ..LineDashPattern::default()
            });
        }

        if !closed {
            layer.add_line(Line {
                points,
                is_closed: false,
            });
        } else {
            let mode = match (paint.fill, paint.stroke) {
                (Some(fill), stroke) => {
                    layer.set_fill_color(pdf_colour(fill.over_white(paint.fill_opacity)));
                    if stroke.is_some() {
                        PaintMode::FillStroke
                    } else {
                        PaintMode::Fill
                    }
                }
                (None, _) => PaintMode::Stroke,
            };
            layer.add_polygon(Polygon {
                rings: vec![points],
                mode,
                winding_order: WindingOrder::NonZero,
            });
        }

        if paint.dash.is_some() {
            layer.set_line_dash_pattern(LineDashPattern::default());
        }
    }

    fn text(&mut self, text: &str, x: f64, y: f64, style: &TextStyle) -> ChartResult<()> {
        let font = self.font(&style.font)?;
        let layer = self.layer();
        let origin = style.origin(text, x, y);
        let colour = pdf_colour(style.colour.over_white(style.opacity));

        layer.begin_text_section();
        layer.set_font(&font, style.size as f32);
        match style.mode {
            TextMode::Fill => {
                layer.set_text_rendering_mode(TextRenderingMode::Fill);
                layer.set_fill_color(colour);
            }
            TextMode::Stroke => {
                layer.set_text_rendering_mode(TextRenderingMode::Stroke);
                layer.set_outline_color(colour);
                layer.set_outline_thickness(style.line_width as f32);
            }
        }
        layer.set_text_matrix(TextMatrix::TranslateRotate(
            Pt(origin.x as f32),
            Pt((self.page_height - origin.y) as f32),
            style.rotation as f32,
        ));
        layer.write_text(text, &font);
        layer.end_text_section();
        Ok(())
    }

    fn svg(&mut self, source: &str, x: f64, y: f64, width: f64, height: f64, fit: SvgFit) {
        let layer = self.layer();
        let svg = match Svg::parse(source) {
            Ok(svg) => svg,
            Err(err) => {
                error!("skipping unreadable SVG: {:?}", err);
                return;
            }
        };
        let natural_width = svg.width.0 as f64;
        let natural_height = svg.height.0 as f64;
        if natural_width <= 0.0 || natural_height <= 0.0 {
            debug!("skipping empty SVG");
            return;
        }

        let (scale_x, scale_y, left, bottom) = match fit {
            SvgFit::Stretch => (
                width / natural_width,
                height / natural_height,
                x,
                y + height,
            ),
            SvgFit::MeetBottomRight => {
                let scale = (width / natural_width).min(height / natural_height);
                (scale, scale, x + width - natural_width * scale, y + height)
            }
        };
        svg.add_to_layer(
            &layer,
            SvgTransform {
                translate_x: Some(Pt(left as f32)),
                translate_y: Some(Pt((self.page_height - bottom) as f32)),
                scale_x: Some(scale_x as f32),
                scale_y: Some(scale_y as f32),
                dpi: Some(72.0),
                ..SvgTransform::default()
            },
        );
    }

    fn save(mut self) -> ChartResult<Vec<u8>> {
        if self.layer.is_none() {
            self.add_page(A4_WIDTH, A4_HEIGHT);
        }
        let mut buffer = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buffer)
            .map_err(|err| ChartError::Pdf(err.to_string()))?;
        buffer
            .into_inner()
            .map_err(|err| ChartError::Pdf(err.to_string()))
    }
}

fn builtin_for(name: &str) -> BuiltinFont {
    let lower = name.to_ascii_lowercase();
    let bold = lower.contains("bold");
    let italic = lower.ends_with("-it") || lower.contains("italic") || lower.contains("oblique");
    match (bold, italic) {
        (true, true) => BuiltinFont::HelveticaBoldOblique,
        (true, false) => BuiltinFont::HelveticaBold,
        (false, true) => BuiltinFont::HelveticaOblique,
        (false, false) => BuiltinFont::Helvetica,
    }
}

/// Vertices of a shape and whether the outline is closed.
fn outline(shape: &Shape) -> (Vec<Point>, bool) {
    match shape {
        Shape::Line { from, to } => (vec![*from, *to], false),
        Shape::Rect { x, y, width, height } => (
            vec![
                Point::new(*x, *y),
                Point::new(x + width, *y),
                Point::new(x + width, y + height),
                Point::new(*x, y + height),
            ],
            true,
        ),
        Shape::RoundedRect { x, y, width, height, radius } => {
            let r = radius.min(width / 2.0).min(height / 2.0).max(0.0);
            let corners = [
                (x + width - r, y + r, -PI / 2.0),
                (x + width - r, y + height - r, 0.0),
                (x + r, y + height - r, PI / 2.0),
                (x + r, y + r, PI),
            ];
            let mut points = Vec::with_capacity(4 * (CORNER_SEGMENTS + 1));
            for (cx, cy, start) in corners {
                for step in 0..=CORNER_SEGMENTS {
                    let angle = start + PI / 2.0 * step as f64 / CORNER_SEGMENTS as f64;
                    points.push(Point::new(cx + r * angle.cos(), cy + r * angle.sin()));
                }
            }
            (points, true)
        }
        Shape::Polygon { points } => (points.clone(), true),
        Shape::Circle { centre, radius } => {
            let points = (0..CIRCLE_SEGMENTS)
                .map(|step| {
                    let angle = 2.0 * PI * step as f64 / CIRCLE_SEGMENTS as f64;
                    Point::new(centre.x + radius * angle.cos(), centre.y + radius * angle.sin())
                })
                .collect();
            (points, true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outline_of_rect_and_line() {
        let (points, closed) = outline(&Shape::Rect { x: 1.0, y: 2.0, width: 3.0, height: 4.0 });
        assert!(closed);
        assert_eq!(points[2], Point::new(4.0, 6.0));

        let (points, closed) = outline(&Shape::Line {
            from: Point::new(0.0, 0.0),
            to: Point::new(5.0, 5.0),
        });
        assert!(!closed);
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn test_rounded_rect_stays_inside_bounds() {
        let (points, _) = outline(&Shape::RoundedRect {
            x: 10.0,
            y: 10.0,
            width: 100.0,
            height: 40.0,
            radius: 9.0,
        });
        for point in points {
            assert!(point.x >= 10.0 - 1e-9 && point.x <= 110.0 + 1e-9);
            assert!(point.y >= 10.0 - 1e-9 && point.y <= 50.0 + 1e-9);
        }
    }

    #[test]
    fn test_builtin_font_selection() {
        assert!(matches!(builtin_for("SourceSansPro-Bold"), BuiltinFont::HelveticaBold));
        assert!(matches!(builtin_for("SourceSansPro-It"), BuiltinFont::HelveticaOblique));
        assert!(matches!(builtin_for("SourceSansPro-Regular"), BuiltinFont::Helvetica));
    }

    #[test]
    fn test_finish_produces_pdf_bytes() {
        let mut surface = PdfSurface::new("test");
        surface.begin_page(A4_WIDTH, A4_HEIGHT);
        surface.draw(
            Shape::Rect { x: 10.0, y: 10.0, width: 50.0, height: 20.0 },
            Paint::fill_and_stroke(Colour::rgb(255, 0, 0), Colour::BLACK, 1.0),
        );
        surface.text("Hello", 20.0, 20.0, &TextStyle::new("normal", 10.0, Colour::BLACK));
        assert_eq!(surface.page_count(), 1);

        let bytes = surface.finish().unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
