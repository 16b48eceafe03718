use crate::error::ChartResult;

use super::{DrawOp, Paint, Shape, Surface, SvgFit, TextStyle};

/// Keeps every drawing call so output can be inspected without decoding a PDF.
#[derive(Debug, Default, Clone)]
pub struct RecordingSurface {
    ops: Vec<DrawOp>,
    fonts: Vec<String>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn fonts(&self) -> &[String] {
        &self.fonts
    }

    /// Calls made on one page, counting from 1.
    pub fn page(&self, number: usize) -> &[DrawOp] {
        let starts: Vec<usize> = self
            .ops
            .iter()
            .enumerate()
            .filter(|(_, op)| matches!(op, DrawOp::Page { .. }))
            .map(|(index, _)| index)
            .collect();
        let Some(&start) = number.checked_sub(1).and_then(|i| starts.get(i)) else {
            return &[];
        };
        let end = starts.get(number).copied().unwrap_or(self.ops.len());
        &self.ops[start..end]
    }

    /// All text drawn in fill mode, in order.
    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, style, .. } if style.mode == super::TextMode::Fill => {
                    Some(text.as_str())
                }
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
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

    fn register_font(&mut self, name: &str, _bytes: Vec<u8>) {
        self.fonts.push(name.to_string());
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
        Ok(serde_json::to_vec(&self.ops)?)
    }
}
