//! Places one page of timeline entries onto the chart grid.

use std::path::Path;

use tracing::{error, warn};

use crate::error::{ChartError, ChartResult};
use crate::layout::{
    ChartGeometry, ChartPageSpec, ChartSection, ColumnInfo, LayoutConfig, SectionKind,
};
use crate::layout::{DisplayTable, MessageText};
use crate::model::observation::format_number;
use crate::model::{ChartValue, Reading, Slot, SpecialValue};
use crate::timeline::Page;

use super::document::{Canvas, Resources};
use super::{Align, Baseline, Colour, Paint, Point, Shape, Surface, SvgFit, TextStyle};

/// Gap between a plotted point and its label.
const POINT_OFFSET: f64 = 3.0;
const BAR_WIDTH: f64 = 2.0;
const DOT_RADIUS: f64 = 2.0;
const POSITION_ICON_SIZE: f64 = 13.0;
const POSITION_SHIFT: f64 = 4.0;
const MESSAGE_OPACITY: f64 = 0.9;

#[derive(Debug, Clone, Copy)]
enum Single<'v> {
    Text(&'v str),
    Reading(&'v Reading),
}

impl<'v> Single<'v> {
    fn from_value(value: &'v ChartValue, section: &ChartSection) -> ChartResult<Self> {
        match value {
            ChartValue::Text(text) => Ok(Single::Text(text)),
            ChartValue::Reading(reading) => Ok(Single::Reading(reading)),
            ChartValue::Pair { .. } => Err(ChartError::InternalConsistency(format!(
                "section {} cannot show a pair of readings",
                section.name
            ))),
        }
    }

    fn colour_key(&self) -> Option<&'v str> {
        match self {
            Single::Text(_) => None,
            Single::Reading(reading) => reading.colour_key.as_deref(),
        }
    }
}

/// Chart label, translated through the display table when one applies.
fn display_reading(value: Single<'_>, table: Option<&DisplayTable>) -> String {
    let display = match value {
        Single::Text(text) => text.to_string(),
        Single::Reading(reading) => reading.display(),
    };
    let Some(table) = table else {
        return display;
    };
    table
        .get(&display)
        .or_else(|| table.get(&display.to_lowercase()))
        .map(|entry| entry.display_name.clone())
        .unwrap_or(display)
}

/// Plotting value. Text that is not a number plots as zero.
fn numeric_reading(value: Single<'_>, table: Option<&DisplayTable>) -> f64 {
    let reading = match value {
        Single::Text(text) => return text.trim().parse().unwrap_or(0.0),
        Single::Reading(reading) => reading,
    };
    let numeric = reading.value.unwrap_or(0.0);
    let Some(table) = table else {
        return numeric;
    };
    let text = reading.text.as_deref().unwrap_or("");
    table
        .get(&format_number(numeric))
        .or_else(|| table.get(text))
        .or_else(|| table.get(&text.to_lowercase()))
        .and_then(|entry| entry.value)
        .unwrap_or(numeric)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

pub struct ChartPainter<'p, S: Surface> {
    pub canvas: &'p mut Canvas<S>,
    pub layout: &'p LayoutConfig,
    pub spec: &'p ChartPageSpec,
    pub geometry: &'p ChartGeometry,
    pub resources: &'p Resources,
    pub positions_dir: &'p Path,
}

impl<'p, S: Surface> ChartPainter<'p, S> {
    pub fn draw_page(&mut self, page: &Page) -> ChartResult<()> {
        let geometry = self.geometry;
        for (index, entry) in page.entries.iter().enumerate() {
            let column = *geometry.columns.get(index).ok_or_else(|| {
                ChartError::InternalConsistency(format!(
                    "page has {} entries but the chart only has {} columns",
                    page.len(),
                    geometry.columns.len()
                ))
            })?;

            // Gap and scale-change columns carry one message down their full height.
            let full_column = entry.marker();
            if let Some(marker) = full_column {
                let message = self.message(marker);
                self.draw_vertical_text(message, &column, geometry.full_message_top, column.bottom, None);
            }

            let sections: Vec<&ChartSection> = match full_column {
                Some(_) => geometry.header_sections().collect(),
                None => geometry.sections.iter().collect(),
            };
            for section in sections {
                let Some(slot) = entry.field(section.name) else {
                    warn!(section = %section.name, column = column.index, "undefined reading");
                    continue;
                };
                let value = match slot {
                    Slot::Special(special) => {
                        if full_column.is_none() {
                            self.draw_symbol_message(section, &column, special);
                        }
                        continue;
                    }
                    Slot::Value(value) => value,
                };

                match section.kind {
                    SectionKind::Blank => {}
                    SectionKind::Bands => {
                        self.plot_in_band(section, &column, Single::from_value(&value, section)?)
                    }
                    SectionKind::Dot => {
                        self.plot_dot(section, &column, Single::from_value(&value, section)?)
                    }
                    SectionKind::Candle => match &value {
                        ChartValue::Pair { high, low } => self.plot_candle(section, &column, high, low),
                        _ => {
                            return Err(ChartError::InternalConsistency(format!(
                                "candle section {} needs a pair of readings",
                                section.name
                            )))
                        }
                    },
                    SectionKind::Simple => {
                        self.plot_cell_value(section, &column, Single::from_value(&value, section)?)
                    }
                }
                if section.outline {
                    self.draw_box_outline(section, &column);
                }
            }
        }
        Ok(())
    }

    /// This chart's message, or the NEWS2 one when this chart leaves it out.
    fn message(&self, special: SpecialValue) -> &'p MessageText {
        let own = self.spec.messages.for_special(special);
        if own.text.is_some() {
            own
        } else {
            self.layout.news2.messages.for_special(special)
        }
    }

    fn display_table(&self, section: &ChartSection) -> Option<&'p DisplayTable> {
        let name = section.display.as_deref()?;
        self.spec
            .display_table(name)
            .or_else(|| self.layout.news2.display_table(name))
    }

    fn section_style(&self, section: &ChartSection, column: &ColumnInfo) -> TextStyle {
        TextStyle::new(self.layout.font(&section.font), section.font_size, section.colour)
            .aligned(Align::Center, column.width)
            .baseline(Baseline::Middle)
    }

    /// Text with a white halo so it reads over bands and grid lines.
    fn draw_nimbus_text(
        &mut self,
        section: &ChartSection,
        column: &ColumnInfo,
        y: f64,
        text: &str,
        left_offset: f64,
    ) {
        if text.is_empty() {
            return;
        }
        let x = column.left + left_offset;
        let fill = self.section_style(section, column);
        let halo = fill.clone().halo(Colour::WHITE, 2.0, 0.7);
        self.canvas.text(text, x, y, &halo);
        self.canvas.text(text, x, y, &fill);
    }

    /// Message running up the column between `top` and `bottom`. Without an alignment it is
    /// repeated at the start, middle and end.
    fn draw_vertical_text(
        &mut self,
        message: &MessageText,
        column: &ColumnInfo,
        top: f64,
        bottom: f64,
        align: Option<Align>,
    ) {
        let Some(text) = message.text.as_deref().filter(|text| !text.is_empty()) else {
            return;
        };
        let margin = column.row_height;
        let length = bottom - top;
        let font = self.layout.font(&self.layout.fonts.normal);
        let size = ChartSection::DEFAULT_FONT_SIZE;

        let text_width = self.canvas.text_width(text, font, size);
        if text_width > length {
            warn!(
                left = column.left,
                top, "message '{}' too long ({} > {})", text, text_width, length
            );
        }

        self.canvas.draw(
            Shape::Rect {
                x: column.left,
                y: top,
                width: column.width,
                height: length,
            },
            Paint::fill_and_stroke(message.bg_colour, message.bg_colour, 1.0)
                .with_fill_opacity(MESSAGE_OPACITY),
        );

        let base = TextStyle::new(font, size, Colour::BLACK)
            .baseline(Baseline::Middle)
            .rotated(90.0);
        if matches!(align, None | Some(Align::Left)) {
            let style = base.clone().aligned(Align::Left, length - 2.0 * margin);
            self.canvas.text(text, column.centre, bottom - margin, &style);
        }
        if matches!(align, None | Some(Align::Center)) {
            let style = base.clone().aligned(Align::Center, length);
            self.canvas.text(text, column.centre, bottom, &style);
        }
        if matches!(align, None | Some(Align::Right)) {
            let style = base.aligned(Align::Right, length - 2.0 * margin);
            self.canvas.text(text, column.centre, bottom - margin, &style);
        }
    }

    fn draw_symbol_message(&mut self, section: &ChartSection, column: &ColumnInfo, special: SpecialValue) {
        let message = self.message(special);
        self.draw_vertical_text(
            message,
            column,
            section.message_top,
            section.message_bottom,
            Some(Align::Center),
        );
    }

    fn plot_cell_value(&mut self, section: &ChartSection, column: &ColumnInfo, value: Single<'_>) {
        let display = display_reading(value, self.display_table(section));

        if let (Some(colours), Some(key)) = (&section.bg_colours, value.colour_key()) {
            match colours.get(key) {
                Some(&colour) => {
                    let paint = match section.border {
                        Some(border) => Paint::fill_and_stroke(colour, border, section.border_width),
                        None => Paint::fill(colour),
                    };
                    self.canvas.draw(
                        Shape::Rect {
                            x: column.left,
                            y: section.top(),
                            width: column.width,
                            height: section.row_height,
                        },
                        paint,
                    );
                }
                None => error!(
                    section = %section.name,
                    "missing background colour for value {}", key
                ),
            }
        }
        self.draw_nimbus_text(section, column, section.row_y(0), &display, 0.0);
    }

    fn plot_in_band(&mut self, section: &ChartSection, column: &ColumnInfo, value: Single<'_>) {
        let table = self.display_table(section);
        let numeric = numeric_reading(value, table);
        let display = display_reading(value, table);
        let y = section.row_y(section.row(numeric));
        self.draw_nimbus_text(section, column, y, &display, 0.0);
    }

    fn plot_dot(&mut self, section: &ChartSection, column: &ColumnInfo, value: Single<'_>) {
        let table = self.display_table(section);
        let numeric = numeric_reading(value, table);
        let display = display_reading(value, table);

        if numeric <= section.low {
            self.draw_triangle(&display, Direction::Down, section.row_y(0), section, column);
        } else if numeric >= section.high {
            let top_row = section.rows() - 1;
            self.draw_triangle(&display, Direction::Up, section.row_y(top_row), section, column);
        } else {
            let y = section.point_y(numeric);
            self.canvas.draw(
                Shape::Circle {
                    centre: Point::new(column.centre, y),
                    radius: DOT_RADIUS,
                },
                Paint::fill(section.colour),
            );
            let label_y = y - section.font_size / 2.0 - POINT_OFFSET;
            self.draw_nimbus_text(section, column, label_y, &display, 0.0);
        }
    }

    /// Arrow for a value off the scale, labelled on the side it points away from.
    fn draw_triangle(
        &mut self,
        caption: &str,
        direction: Direction,
        y: f64,
        section: &ChartSection,
        column: &ColumnInfo,
    ) {
        let centre = column.centre;
        let shift = BAR_WIDTH / 2.0;
        let (base_y, tip_y, text_offset) = match direction {
            Direction::Down => (y - shift, y + shift, -section.font_size / 2.0 - POINT_OFFSET),
            Direction::Up => (y + shift, y - shift, section.font_size / 2.0 + POINT_OFFSET),
        };
        self.canvas.draw(
            Shape::Polygon {
                points: vec![
                    Point::new(centre - BAR_WIDTH, base_y),
                    Point::new(centre + BAR_WIDTH, base_y),
                    Point::new(centre, tip_y),
                ],
            },
            Paint::fill_and_stroke(section.colour, section.colour, 1.0),
        );
        self.draw_nimbus_text(section, column, y + text_offset, caption, 0.0);
    }

    fn plot_candle(
        &mut self,
        section: &ChartSection,
        column: &ColumnInfo,
        high: &Slot<Reading>,
        low: &Slot<Reading>,
    ) {
        let Some(candle) = section.candle else {
            error!(section = %section.name, "missing candle definition");
            return;
        };
        let (high, low) = match (high, low) {
            (Slot::Special(special), _) | (_, Slot::Special(special)) => {
                self.draw_symbol_message(section, column, *special);
                return;
            }
            (Slot::Value(high), Slot::Value(low)) => (high, low),
        };

        let table = self.display_table(section);
        let numeric_high = numeric_reading(Single::Reading(high), table);
        let numeric_low = numeric_reading(Single::Reading(low), table);
        let high_position = section.candle_y(numeric_high);
        let low_position = section.candle_y(numeric_low);

        let position = high.patient_position.as_deref();
        let left_offset = if position.is_some() { -POSITION_SHIFT } else { 0.0 };
        let centre = column.centre + left_offset;
        let ink = Paint::fill_and_stroke(section.colour, section.colour, 1.0);

        self.canvas.draw(
            Shape::Line {
                from: Point::new(centre, high_position),
                to: Point::new(centre, low_position),
            },
            Paint::stroke(section.colour, 1.0),
        );

        let mut text_high = section.row_y(section.rows() - 1);
        let mut text_low = section.row_y(0);
        if numeric_high < candle.high {
            self.canvas.draw(
                Shape::Polygon {
                    points: vec![
                        Point::new(centre - BAR_WIDTH, high_position - BAR_WIDTH),
                        Point::new(centre + BAR_WIDTH, high_position - BAR_WIDTH),
                        Point::new(centre, high_position),
                    ],
                },
                ink,
            );
            text_high = high_position - section.font_size / 2.0 - POINT_OFFSET;
        }
        if numeric_low > candle.low {
            self.canvas.draw(
                Shape::Polygon {
                    points: vec![
                        Point::new(centre - BAR_WIDTH, low_position + BAR_WIDTH),
                        Point::new(centre + BAR_WIDTH, low_position + BAR_WIDTH),
                        Point::new(centre, low_position),
                    ],
                },
                ink,
            );
            text_low = low_position + section.font_size / 2.0 + POINT_OFFSET;
        }

        if let Some(position) = position {
            let path = self.positions_dir.join(format!("{}.svg", position));
            match self.resources.svg(&path) {
                Some(icon) => self.canvas.svg(
                    icon,
                    column.right - 15.0,
                    (text_high + text_low) / 2.0 - 6.0,
                    POSITION_ICON_SIZE,
                    POSITION_ICON_SIZE,
                    SvgFit::MeetBottomRight,
                ),
                None => warn!(path = %path.display(), "no icon for patient position"),
            }
        }

        let display_high = display_reading(Single::Reading(high), table);
        let display_low = display_reading(Single::Reading(low), table);
        self.draw_nimbus_text(section, column, text_high, &display_high, left_offset);
        self.draw_nimbus_text(section, column, text_low, &display_low, left_offset);
    }

    fn draw_box_outline(&mut self, section: &ChartSection, column: &ColumnInfo) {
        for row in 0..section.rows() {
            self.canvas.draw(
                Shape::Rect {
                    x: column.left,
                    y: section.bottom - f64::from(row + 1) * section.row_height,
                    width: column.width,
                    height: section.row_height,
                },
                Paint::stroke(Colour::GREEN, 1.0),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{parse_layout, DisplayEntry};
    use crate::model::format::parse_timestamp;
    use crate::model::request::{ObservationJson, ObservationSetJson};
    use crate::model::{
        ChartField, GapMarker, ObservationSet, ObservationType, ScoreSystemChangeEvent,
        SendConfig, TimelineEntry,
    };
    use crate::render::{DrawOp, RecordingSurface, TextMode};

    struct Fixture {
        layout: LayoutConfig,
        geometry: ChartGeometry,
        resources: Resources,
    }

    fn chart_sections() -> serde_json::Value {
        serde_json::json!([
            {"name": "topSection", "type": "blank", "bottom": 60},
            {"name": "date", "bottom": 70},
            {"name": "time", "bottom": 80},
            {"name": "initials", "bottom": 90},
            {"name": "heart_rate", "type": "dot", "bottom": 230, "rows": 12, "low": 40, "high": 140},
            {"name": "temperature", "type": "bands", "bottom": 280, "range": [35, 36, 38, 39]},
            {"name": "bloodPressure", "bottom": 480,
             "candle": {"low": 50, "mid": 100, "high": 220, "lowRows": 5, "highRows": 12}},
            {"name": "ewsTotal", "bottom": 490,
             "bgColours": {"low": "#00ff00", "high": "#ff0000"}},
        ])
    }

    fn fixture_with(sections: serde_json::Value) -> Fixture {
        let chart = serde_json::json!({
            "col1": {"left": 100, "width": 120, "top": 40, "bottom": 800},
            "col2": {"left": 300, "width": 120},
            "sections": sections,
            "messages": {
                "refused": {"text": "Patient refused", "bgColour": "#ffeeee"},
                "missing": {"text": "Not recorded", "bgColour": "#eeeeee"},
                "no_obs": {"text": "No observations for 24 hours"},
                "score_system_change": {"text": "Score system changed"}
            }
        });
        let json = serde_json::json!({
            "page": {"size": "A4", "margins": {"top": 10, "bottom": 0, "left": 10, "right": 10}},
            "news2": chart.clone(),
            "meows": chart,
        });
        let layout = parse_layout(&json.to_string()).unwrap();
        let geometry = ChartGeometry::new(&layout.news2, &layout.fonts.normal).unwrap();
        Fixture { layout, geometry, resources: Resources::default() }
    }

    fn fixture() -> Fixture {
        fixture_with(chart_sections())
    }

    fn paint<F>(fixture: &Fixture, draw: F) -> (ChartResult<()>, Vec<DrawOp>)
    where
        F: FnOnce(&mut ChartPainter<'_, RecordingSurface>) -> ChartResult<()>,
    {
        let mut canvas = Canvas::new(RecordingSurface::new(), (595.28, 841.89), [0.0, 0.0]);
        let result = {
            let mut painter = ChartPainter {
                canvas: &mut canvas,
                layout: &fixture.layout,
                spec: &fixture.layout.news2,
                geometry: &fixture.geometry,
                resources: &fixture.resources,
                positions_dir: Path::new("positions"),
            };
            draw(&mut painter)
        };
        (result, canvas.into_surface().ops().to_vec())
    }

    fn section(fixture: &Fixture, name: ChartField) -> ChartSection {
        fixture.geometry.section(name).cloned().unwrap()
    }

    fn first_column(fixture: &Fixture) -> ColumnInfo {
        *fixture.geometry.columns.get(0).unwrap()
    }

    fn polygons(ops: &[DrawOp]) -> Vec<&Vec<Point>> {
        ops.iter()
            .filter_map(|op| match op {
                DrawOp::Shape { shape: Shape::Polygon { points }, .. } => Some(points),
                _ => None,
            })
            .collect()
    }

    fn rects(ops: &[DrawOp]) -> Vec<(f64, f64, Paint)> {
        ops.iter()
            .filter_map(|op| match op {
                DrawOp::Shape { shape: Shape::Rect { y, height, .. }, paint } => Some((*y, *height, *paint)),
                _ => None,
            })
            .collect()
    }

    fn texts(ops: &[DrawOp]) -> Vec<(&str, f64, &TextStyle)> {
        ops.iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, y, style, .. } => Some((text.as_str(), *y, style)),
                _ => None,
            })
            .collect()
    }

    fn set_of(observations: Vec<ObservationJson>) -> ObservationSet {
        let json = ObservationSetJson {
            record_time: Some("2019-02-01T10:00:00Z".into()),
            observations,
            score_system: Some("news2".into()),
            spo2_scale: Some(1),
            ..ObservationSetJson::default()
        };
        ObservationSet::from_json(&json, &SendConfig::default())
    }

    fn observation(kind: &str, value: Option<f64>) -> ObservationJson {
        ObservationJson {
            observation_type: kind.to_string(),
            observation_value: value,
            ..ObservationJson::default()
        }
    }

    fn page_of(entries: Vec<TimelineEntry>) -> Page {
        Page { entries, score_system: "news2".to_string() }
    }

    fn acvpu_table() -> DisplayTable {
        let mut table = DisplayTable::new();
        table.insert(
            "a".to_string(),
            DisplayEntry { display_name: "A".into(), value: Some(0.0) },
        );
        table.insert(
            "CVPU".to_string(),
            DisplayEntry { display_name: "New C/V/P/U".into(), value: Some(3.0) },
        );
        table
    }

    fn text_reading(text: &str) -> Reading {
        Reading {
            text: Some(text.to_string()),
            ..Reading::default()
        }
    }

    #[test]
    fn test_display_reading_matches_exact_then_lowercase() {
        let table = acvpu_table();
        let alert = text_reading("A");
        let confused = text_reading("CVPU");
        let unknown = text_reading("Z");

        assert_eq!(display_reading(Single::Reading(&alert), Some(&table)), "A");
        assert_eq!(display_reading(Single::Reading(&confused), Some(&table)), "New C/V/P/U");
        assert_eq!(display_reading(Single::Reading(&unknown), Some(&table)), "Z");
        assert_eq!(display_reading(Single::Reading(&confused), None), "CVPU");
    }

    #[test]
    fn test_numeric_reading() {
        let table = acvpu_table();
        assert_eq!(numeric_reading(Single::Reading(&text_reading("CVPU")), Some(&table)), 3.0);
        assert_eq!(numeric_reading(Single::Reading(&text_reading("A")), Some(&table)), 0.0);
        assert_eq!(numeric_reading(Single::Reading(&Reading::numeric(37.5)), None), 37.5);
        assert_eq!(numeric_reading(Single::Text("12"), None), 12.0);
        assert_eq!(numeric_reading(Single::Text("n/a"), None), 0.0);
        assert_eq!(numeric_reading(Single::Reading(&Reading::default()), None), 0.0);
    }

    #[test]
    fn test_numeric_value_wins_over_text_in_table() {
        let mut table = acvpu_table();
        table.insert(
            "4".to_string(),
            DisplayEntry { display_name: "four".into(), value: Some(40.0) },
        );
        let reading = Reading {
            value: Some(4.0),
            text: Some("CVPU".into()),
            ..Reading::default()
        };
        assert_eq!(numeric_reading(Single::Reading(&reading), Some(&table)), 40.0);
    }

    #[test]
    fn test_dot_below_scale_points_down_from_bottom_row() {
        let fx = fixture();
        let heart_rate = section(&fx, ChartField::Observation(ObservationType::HeartRate));
        let column = first_column(&fx);

        for value in [30.0, 40.0] {
            let reading = Reading::numeric(value);
            let (_, ops) = paint(&fx, |p| {
                p.plot_dot(&heart_rate, &column, Single::Reading(&reading));
                Ok(())
            });
            let triangles = polygons(&ops);
            assert_eq!(triangles.len(), 1);
            let y = heart_rate.row_y(0);
            assert_eq!(triangles[0][0].y, y - 1.0);
            assert_eq!(triangles[0][2], Point::new(column.centre, y + 1.0));
            assert!(!ops.iter().any(|op| matches!(op, DrawOp::Shape { shape: Shape::Circle { .. }, .. })));
        }
    }

    #[test]
    fn test_dot_above_scale_points_up_from_top_row() {
        let fx = fixture();
        let heart_rate = section(&fx, ChartField::Observation(ObservationType::HeartRate));
        let column = first_column(&fx);

        for value in [140.0, 180.0] {
            let reading = Reading::numeric(value);
            let (_, ops) = paint(&fx, |p| {
                p.plot_dot(&heart_rate, &column, Single::Reading(&reading));
                Ok(())
            });
            let triangles = polygons(&ops);
            assert_eq!(triangles.len(), 1);
            let y = heart_rate.row_y(heart_rate.rows() - 1);
            assert_eq!(triangles[0][0].y, y + 1.0);
            assert_eq!(triangles[0][2], Point::new(column.centre, y - 1.0));
        }

        let reading = Reading::numeric(80.0);
        let (_, ops) = paint(&fx, |p| {
            p.plot_dot(&heart_rate, &column, Single::Reading(&reading));
            Ok(())
        });
        assert!(polygons(&ops).is_empty());
        assert!(ops.iter().any(|op| matches!(op, DrawOp::Shape { shape: Shape::Circle { .. }, .. })));
    }

    #[test]
    fn test_candle_end_markers_only_inside_limits() {
        let fx = fixture();
        let bp = section(&fx, ChartField::BloodPressure);
        let column = first_column(&fx);
        let draw = |high: f64, low: f64| {
            let (_, ops) = paint(&fx, |p| {
                p.plot_candle(
                    &bp,
                    &column,
                    &Slot::Value(Reading::numeric(high)),
                    &Slot::Value(Reading::numeric(low)),
                );
                Ok(())
            });
            ops
        };

        let inside = draw(120.0, 80.0);
        let markers = polygons(&inside);
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0][2], Point::new(column.centre, bp.candle_y(120.0)));
        assert_eq!(markers[1][2], Point::new(column.centre, bp.candle_y(80.0)));
        let line = inside
            .iter()
            .filter(|op| matches!(op, DrawOp::Shape { shape: Shape::Line { .. }, .. }))
            .count();
        assert_eq!(line, 1);

        assert!(polygons(&draw(220.0, 50.0)).is_empty());
        assert!(polygons(&draw(250.0, 40.0)).is_empty());

        let low_only = draw(220.0, 80.0);
        let markers = polygons(&low_only);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0][2], Point::new(column.centre, bp.candle_y(80.0)));
    }

    #[test]
    fn test_nimbus_text_strokes_halo_before_fill() {
        let fx = fixture();
        let heart_rate = section(&fx, ChartField::Observation(ObservationType::HeartRate));
        let column = first_column(&fx);
        let (_, ops) = paint(&fx, |p| {
            p.draw_nimbus_text(&heart_rate, &column, 150.0, "97", 0.0);
            Ok(())
        });

        let drawn = texts(&ops);
        assert_eq!(drawn.len(), 2);
        let (halo_text, halo_y, halo) = drawn[0];
        let (fill_text, fill_y, fill) = drawn[1];
        assert_eq!((halo_text, fill_text), ("97", "97"));
        assert_eq!(halo_y, fill_y);
        assert_eq!(halo.mode, TextMode::Stroke);
        assert_eq!(halo.colour, Colour::WHITE);
        assert_eq!(halo.line_width, 2.0);
        assert_eq!(halo.opacity, 0.7);
        assert_eq!(fill.mode, TextMode::Fill);
        assert_eq!(fill.colour, heart_rate.colour);
    }

    #[test]
    fn test_marker_columns_draw_only_header_sections() {
        let fx = fixture();
        let change = ScoreSystemChangeEvent {
            changed_time: parse_timestamp("2019-02-01T10:00:00Z"),
            score_system: "news2".into(),
            spo2_scale: Some(1),
            initials: "AB".into(),
        };
        let page = page_of(vec![
            TimelineEntry::Gap(GapMarker { spo2_scale: Some(1) }),
            TimelineEntry::ScoreSystemChange(change),
        ]);
        let (result, ops) = paint(&fx, |p| p.draw_page(&page));
        assert!(result.is_ok());

        let column = first_column(&fx);
        let top = fx.geometry.full_message_top;
        let shapes = rects(&ops);
        assert_eq!(shapes.len(), 2);
        for (y, height, _) in shapes {
            assert_eq!((y, height), (top, column.bottom - top));
        }

        let drawn = texts(&ops);
        let messages: Vec<_> = drawn.iter().filter(|(_, _, style)| style.rotation != 0.0).collect();
        assert_eq!(messages.len(), 6);

        let cells: Vec<_> = drawn.iter().filter(|(_, _, style)| style.rotation == 0.0).collect();
        assert_eq!(cells.len(), 6);
        for (_, y, _) in &cells {
            assert!(fx
                .geometry
                .header_sections()
                .any(|header| header.top() <= *y && *y <= header.bottom));
        }
        assert!(cells.iter().any(|(text, _, _)| *text == "AB"));
    }

    #[test]
    fn test_missing_and_refused_fill_the_message_extent() {
        let fx = fixture();
        let mut refused = observation("temperature", None);
        refused.patient_refused = Some(true);
        let page = page_of(vec![TimelineEntry::Observation(set_of(vec![refused]))]);
        let (result, ops) = paint(&fx, |p| p.draw_page(&page));
        assert!(result.is_ok());

        let shapes = rects(&ops);
        let drawn = texts(&ops);
        let temperature = ChartField::Observation(ObservationType::Temperature);
        let heart_rate = ChartField::Observation(ObservationType::HeartRate);
        let cases = [
            (temperature, "Patient refused", Colour::rgb(255, 238, 238)),
            (heart_rate, "Not recorded", Colour::rgb(238, 238, 238)),
        ];
        for (name, message, colour) in cases {
            let target = section(&fx, name);
            let extent = target.message_bottom - target.message_top;
            assert!(shapes
                .iter()
                .any(|(y, height, paint)| *y == target.message_top
                    && *height == extent
                    && paint.fill == Some(colour)));
            assert!(drawn.iter().any(|(text, y, style)| *text == message
                && *y == target.message_bottom
                && style.align == Align::Center
                && style.width == Some(extent)));
        }
    }

    #[test]
    fn test_cell_background_is_drawn_before_text() {
        let fx = fixture();
        let ews = section(&fx, ChartField::EwsTotal);
        let column = first_column(&fx);
        let score = Reading {
            text: Some("7".into()),
            colour_key: Some("high".into()),
            ..Reading::default()
        };
        let (_, ops) = paint(&fx, |p| {
            p.plot_cell_value(&ews, &column, Single::Reading(&score));
            Ok(())
        });

        assert_eq!(ops.len(), 3);
        assert_eq!(
            ops[0],
            DrawOp::Shape {
                shape: Shape::Rect {
                    x: column.left,
                    y: ews.top(),
                    width: column.width,
                    height: ews.row_height,
                },
                paint: Paint::fill(Colour::rgb(255, 0, 0)),
            }
        );
        assert!(matches!(&ops[1], DrawOp::Text { text, .. } if text == "7"));
        assert!(matches!(&ops[2], DrawOp::Text { text, .. } if text == "7"));

        let unknown = Reading {
            colour_key: Some("medium".into()),
            ..score
        };
        let (_, ops) = paint(&fx, |p| {
            p.plot_cell_value(&ews, &column, Single::Reading(&unknown));
            Ok(())
        });
        assert!(rects(&ops).is_empty());
        assert_eq!(texts(&ops).len(), 2);
    }

    #[test]
    fn test_pair_in_single_value_section_is_inconsistent() {
        let fx = fixture_with(serde_json::json!([
            {"name": "topSection", "type": "blank", "bottom": 60},
            {"name": "bloodPressure", "type": "dot", "bottom": 300, "rows": 12, "low": 40, "high": 140},
        ]));
        let page = page_of(vec![TimelineEntry::Observation(set_of(vec![
            observation("systolic_blood_pressure", Some(120.0)),
            observation("diastolic_blood_pressure", Some(80.0)),
        ]))]);
        let (result, _) = paint(&fx, |p| p.draw_page(&page));
        assert!(matches!(result, Err(ChartError::InternalConsistency(_))));

        let bp = section(&fx, ChartField::BloodPressure);
        let pair = ChartValue::Pair {
            high: Slot::Value(Reading::numeric(120.0)),
            low: Slot::Value(Reading::numeric(80.0)),
        };
        assert!(matches!(
            Single::from_value(&pair, &bp),
            Err(ChartError::InternalConsistency(_))
        ));
    }

    #[test]
    fn test_single_value_in_candle_section_is_inconsistent() {
        let fx = fixture_with(serde_json::json!([
            {"name": "topSection", "type": "blank", "bottom": 60},
            {"name": "heart_rate", "bottom": 400,
             "candle": {"low": 50, "mid": 100, "high": 220, "lowRows": 5, "highRows": 12}},
        ]));
        let page = page_of(vec![TimelineEntry::Observation(set_of(vec![observation(
            "heart_rate",
            Some(80.0),
        )]))]);
        let (result, _) = paint(&fx, |p| p.draw_page(&page));
        assert!(matches!(result, Err(ChartError::InternalConsistency(_))));
    }
}
