//! Drawing primitives and the surfaces that consume them.
//!
//! Coordinates are PDF points with the origin at the top-left corner of the page and
//! y growing downwards, the convention the layout file is written in. Surfaces convert
//! to their own space.

pub mod basic_page;
pub mod chart_page;
pub mod document;
pub mod html;
pub mod metrics;
pub mod pdf;
pub mod recording;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ChartResult;

pub use document::{generate_pdf, Generator};
pub use pdf::PdfSurface;
pub use recording::RecordingSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Colour {
    pub const BLACK: Colour = Colour::rgb(0, 0, 0);
    pub const WHITE: Colour = Colour::rgb(255, 255, 255);
    /// Debug outlines.
    pub const GREEN: Colour = Colour::rgb(0, 255, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Colour { r, g, b }
    }

    /// Mix towards white, standing in for transparency over a white page.
    pub fn over_white(&self, opacity: f64) -> Colour {
        let opacity = opacity.clamp(0.0, 1.0);
        let mix = |c: u8| (f64::from(c) * opacity + 255.0 * (1.0 - opacity)).round() as u8;
        Colour::rgb(mix(self.r), mix(self.g), mix(self.b))
    }

    pub fn to_unit(&self) -> (f32, f32, f32) {
        (
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        )
    }
}

impl FromStr for Colour {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let named = match value.to_ascii_lowercase().as_str() {
            "black" => Some(Colour::BLACK),
            "white" => Some(Colour::WHITE),
            "red" => Some(Colour::rgb(255, 0, 0)),
            "green" => Some(Colour::rgb(0, 128, 0)),
            "blue" => Some(Colour::rgb(0, 0, 255)),
            "grey" | "gray" => Some(Colour::rgb(128, 128, 128)),
            "orange" => Some(Colour::rgb(255, 165, 0)),
            "yellow" => Some(Colour::rgb(255, 255, 0)),
            _ => None,
        };
        if let Some(colour) = named {
            return Ok(colour);
        }

        let hex = value
            .strip_prefix('#')
            .ok_or_else(|| format!("unrecognised colour '{}'", value))?;
        if !hex.is_ascii() {
            return Err(format!("bad colour '{}'", value));
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| format!("bad colour '{}'", value));
        match hex.len() {
            6 => Ok(Colour::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => {
                let double = |i: usize| channel(&hex[i..i + 1]).map(|c| c * 17);
                Ok(Colour::rgb(double(0)?, double(1)?, double(2)?))
            }
            _ => Err(format!("bad colour '{}'", value)),
        }
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl<'de> Deserialize<'de> for Colour {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for Colour {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    #[serde(alias = "centre")]
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Baseline {
    #[default]
    Alphabetic,
    Middle,
    Top,
}

/// Fill draws glyphs normally, stroke outlines them (the halo pass).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMode {
    #[default]
    Fill,
    Stroke,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Shape {
    Line { from: Point, to: Point },
    Rect { x: f64, y: f64, width: f64, height: f64 },
    RoundedRect { x: f64, y: f64, width: f64, height: f64, radius: f64 },
    Polygon { points: Vec<Point> },
    Circle { centre: Point, radius: f64 },
}

impl Shape {
    pub fn translated(self, dx: f64, dy: f64) -> Shape {
        let shift = |p: Point| Point::new(p.x + dx, p.y + dy);
        match self {
            Shape::Line { from, to } => Shape::Line { from: shift(from), to: shift(to) },
            Shape::Rect { x, y, width, height } => Shape::Rect { x: x + dx, y: y + dy, width, height },
            Shape::RoundedRect { x, y, width, height, radius } => Shape::RoundedRect {
                x: x + dx,
                y: y + dy,
                width,
                height,
                radius,
            },
            Shape::Polygon { points } => Shape::Polygon {
                points: points.into_iter().map(shift).collect(),
            },
            Shape::Circle { centre, radius } => Shape::Circle { centre: shift(centre), radius },
        }
    }
}

/// How a shape is painted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Paint {
    pub fill: Option<Colour>,
    pub stroke: Option<Colour>,
    pub fill_opacity: f64,
    pub stroke_opacity: f64,
    pub line_width: f64,
    /// Dash length and gap.
    pub dash: Option<(f64, f64)>,
}

impl Paint {
    pub fn fill(colour: Colour) -> Self {
        Paint {
            fill: Some(colour),
            stroke: None,
            fill_opacity: 1.0,
            stroke_opacity: 1.0,
            line_width: 0.0,
            dash: None,
        }
    }

    pub fn stroke(colour: Colour, line_width: f64) -> Self {
        Paint {
            fill: None,
            stroke: Some(colour),
            line_width,
            ..Paint::fill(colour)
        }
    }

    pub fn fill_and_stroke(fill: Colour, stroke: Colour, line_width: f64) -> Self {
        Paint {
            stroke: Some(stroke),
            line_width,
            ..Paint::fill(fill)
        }
    }

    pub fn with_fill_opacity(mut self, opacity: f64) -> Self {
        self.fill_opacity = opacity;
        self
    }

    pub fn dashed(mut self, length: f64, gap: f64) -> Self {
        self.dash = Some((length, gap));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextStyle {
    pub font: String,
    pub size: f64,
    pub colour: Colour,
    pub opacity: f64,
    pub mode: TextMode,
    /// Outline width in stroke mode.
    pub line_width: f64,
    pub align: Align,
    pub baseline: Baseline,
    /// Width of the box `align` works within. Without one the text starts at the anchor.
    pub width: Option<f64>,
    /// Degrees anticlockwise about the anchor.
    pub rotation: f64,
}

impl TextStyle {
    pub fn new(font: &str, size: f64, colour: Colour) -> Self {
        TextStyle {
            font: font.to_string(),
            size,
            colour,
            opacity: 1.0,
            mode: TextMode::Fill,
            line_width: 0.0,
            align: Align::Left,
            baseline: Baseline::Alphabetic,
            width: None,
            rotation: 0.0,
        }
    }

    pub fn aligned(mut self, align: Align, width: f64) -> Self {
        self.align = align;
        self.width = Some(width);
        self
    }

    pub fn baseline(mut self, baseline: Baseline) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn rotated(mut self, degrees: f64) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn halo(mut self, colour: Colour, line_width: f64, opacity: f64) -> Self {
        self.mode = TextMode::Stroke;
        self.colour = colour;
        self.line_width = line_width;
        self.opacity = opacity;
        self
    }

    /// Start of the baseline for `text` drawn at anchor `(x, y)`, in page coordinates.
    pub fn origin(&self, text: &str, x: f64, y: f64) -> Point {
        let text_width = metrics::text_width(text, &self.font, self.size);
        let along = match (self.align, self.width) {
            (Align::Center, Some(width)) => (width - text_width) / 2.0,
            (Align::Right, Some(width)) => width - text_width,
            _ => 0.0,
        };
        // Distance from the anchor line down to the baseline.
        let drop = match self.baseline {
            Baseline::Alphabetic => 0.0,
            Baseline::Middle => self.size * metrics::HALF_CAP_HEIGHT,
            Baseline::Top => self.size * metrics::ASCENT,
        };
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        // Page y grows downwards, so "along the text" is (cos, -sin) and "down" is (sin, cos).
        Point::new(
            x + along * cos + drop * sin,
            y - along * sin + drop * cos,
        )
    }
}

/// One recorded drawing call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawOp {
    Page { width: f64, height: f64 },
    Shape { shape: Shape, paint: Paint },
    Text { text: String, x: f64, y: f64, style: TextStyle },
    Svg { source: String, x: f64, y: f64, width: f64, height: f64, fit: SvgFit },
}

/// How an embedded SVG fills its box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SvgFit {
    Stretch,
    /// Keep aspect ratio, align to the bottom-right corner.
    MeetBottomRight,
}

/// Primitive 2D output. Implementations must keep calls in order.
pub trait Surface: Send {
    fn begin_page(&mut self, width: f64, height: f64);

    fn draw(&mut self, shape: Shape, paint: Paint);

    fn text(&mut self, text: &str, x: f64, y: f64, style: &TextStyle);

    fn text_width(&self, text: &str, font: &str, size: f64) -> f64 {
        metrics::text_width(text, font, size)
    }

    /// Make a font file available under `name`.
    fn register_font(&mut self, name: &str, bytes: Vec<u8>);

    fn place_svg(&mut self, source: &str, x: f64, y: f64, width: f64, height: f64, fit: SvgFit);

    /// Number of pages begun so far.
    fn page_count(&self) -> usize;

    /// Encode everything drawn so far.
    fn finish(self) -> ChartResult<Vec<u8>>
    where
        Self: Sized;
}
