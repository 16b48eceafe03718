//! Vertical placement of one clinical metric on the chart.

use std::collections::HashMap;

use serde::Deserialize;

use crate::model::ChartField;
use crate::render::Colour;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Bands,
    Dot,
    Candle,
    /// Never drawn. Only used to anchor positions.
    Blank,
    #[serde(other)]
    Simple,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Candle {
    pub low: f64,
    pub mid: f64,
    pub high: f64,
    #[serde(rename = "lowRows")]
    pub low_rows: u32,
    #[serde(rename = "highRows")]
    pub high_rows: u32,
}

/// A section as written in the layout file. Unset members fall back to the running defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SectionSpec {
    pub name: Option<ChartField>,
    #[serde(rename = "type")]
    pub kind: Option<SectionKind>,
    pub bottom: Option<f64>,
    pub range: Option<Vec<f64>>,
    pub font: Option<String>,
    pub font_size: Option<f64>,
    pub colour: Option<Colour>,
    #[serde(rename = "box")]
    pub outline: Option<bool>,
    pub display: Option<String>,
    pub bg_colours: Option<HashMap<String, Colour>>,
    pub border: Option<Colour>,
    pub border_width: Option<f64>,
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub candle: Option<Candle>,
    pub rows: Option<u32>,
    pub message_top: Option<f64>,
    pub message_bottom: Option<f64>,
}

impl SectionSpec {
    /// Members set here win over `defaults`.
    pub fn over(&self, defaults: &SectionSpec) -> SectionSpec {
        SectionSpec {
            name: self.name.or(defaults.name),
            kind: self.kind.or(defaults.kind),
            bottom: self.bottom.or(defaults.bottom),
            range: self.range.clone().or_else(|| defaults.range.clone()),
            font: self.font.clone().or_else(|| defaults.font.clone()),
            font_size: self.font_size.or(defaults.font_size),
            colour: self.colour.or(defaults.colour),
            outline: self.outline.or(defaults.outline),
            display: self.display.clone().or_else(|| defaults.display.clone()),
            bg_colours: self.bg_colours.clone().or_else(|| defaults.bg_colours.clone()),
            border: self.border.or(defaults.border),
            border_width: self.border_width.or(defaults.border_width),
            low: self.low.or(defaults.low),
            high: self.high.or(defaults.high),
            candle: self.candle.or(defaults.candle),
            rows: self.rows.or(defaults.rows),
            message_top: self.message_top.or(defaults.message_top),
            message_bottom: self.message_bottom.or(defaults.message_bottom),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSection {
    pub name: ChartField,
    pub kind: SectionKind,
    pub bottom: f64,
    pub range: Vec<f64>,
    pub font: String,
    pub font_size: f64,
    pub colour: Colour,
    pub outline: bool,
    pub display: Option<String>,
    pub bg_colours: Option<HashMap<String, Colour>>,
    pub border: Option<Colour>,
    pub border_width: f64,
    pub low: f64,
    pub high: f64,
    pub candle: Option<Candle>,
    pub row_count: u32,
    pub row_height: f64,
    pub message_top: f64,
    pub message_bottom: f64,
}

impl ChartSection {
    pub const DEFAULT_FONT_SIZE: f64 = 8.0;
    pub const DEFAULT_BORDER_WIDTH: f64 = 0.5;

    pub fn new(name: ChartField, spec: &SectionSpec, default_font: &str, row_height: f64) -> Self {
        let candle = spec.candle;
        let (kind, row_count) = match candle {
            Some(c) => (SectionKind::Candle, c.low_rows + c.high_rows + 2),
            None => (spec.kind.unwrap_or(SectionKind::Simple), spec.rows.unwrap_or(0)),
        };

        let mut section = ChartSection {
            name,
            kind,
            bottom: spec.bottom.unwrap_or(0.0),
            range: spec.range.clone().unwrap_or_default(),
            font: spec.font.clone().unwrap_or_else(|| default_font.to_string()),
            font_size: spec.font_size.unwrap_or(Self::DEFAULT_FONT_SIZE),
            colour: spec.colour.unwrap_or(Colour::BLACK),
            outline: spec.outline.unwrap_or(false),
            display: spec.display.clone(),
            bg_colours: spec.bg_colours.clone(),
            border: spec.border,
            border_width: spec.border_width.unwrap_or(Self::DEFAULT_BORDER_WIDTH),
            low: spec.low.unwrap_or(0.0),
            high: spec.high.unwrap_or(0.0),
            candle,
            row_count,
            row_height,
            message_top: 0.0,
            message_bottom: 0.0,
        };
        section.message_top = spec.message_top.unwrap_or_else(|| section.top());
        section.message_bottom = spec.message_bottom.unwrap_or(section.bottom);
        section
    }

    pub fn rows(&self) -> u32 {
        if self.row_count > 0 {
            self.row_count
        } else if !self.range.is_empty() {
            self.range.len() as u32
        } else {
            1
        }
    }

    pub fn top(&self) -> f64 {
        self.bottom - f64::from(self.rows()) * self.row_height
    }

    /// First boundary the value does not exceed. Values above every boundary land one past the last.
    pub fn row(&self, value: f64) -> u32 {
        self.range
            .iter()
            .position(|&boundary| value <= boundary)
            .unwrap_or(self.range.len()) as u32
    }

    /// Vertical middle of a row, counting up from the bottom.
    pub fn row_y(&self, row: u32) -> f64 {
        self.bottom - self.row_height * f64::from(row) - self.row_height / 2.0
    }

    /// Linear position between `low` and `high`, spread over all rows but the two end rows.
    pub fn point_y(&self, value: f64) -> f64 {
        let height = self.row_height * (f64::from(self.rows()) - 2.0);
        let offset = (value - self.low) / (self.high - self.low) * height;
        self.bottom - self.row_height - offset
    }

    /// Piecewise-linear position for candle plots, clamped at both ends.
    pub fn candle_y(&self, value: f64) -> f64 {
        let Some(Candle { low, mid, high, low_rows, high_rows }) = self.candle else {
            return 0.0;
        };
        let row_height = self.row_height;
        let low_span = row_height * f64::from(low_rows);
        let high_span = row_height * f64::from(high_rows);

        let offset = if value <= low {
            0.0
        } else if value >= high {
            low_span + high_span
        } else if value > mid {
            (value - mid) / (high - mid) * high_span + low_span
        } else {
            (value - low) / (mid - low) * low_span
        };
        self.bottom - row_height - offset
    }
}
