//! Backgrounds, grids and patient header fields shared by every page.

use std::path::Path;

use tracing::{debug, error};

use crate::layout::page::CellSpec;
use crate::layout::{BasePage, Field, FieldKind, FieldSpec, GridSpec, LayoutConfig};
use crate::model::{PatientField, PatientModel};

use super::document::{Canvas, Resources};
use super::html::{self, FontRole};
use super::{Align, Colour, Paint, Point, Shape, Surface, SvgFit, TextStyle};

const GRID_LABEL_SIZE: f64 = 8.0;
const DEFAULT_HTML_WIDTH: f64 = 150.0;
const TABLE_LINE_WIDTH: f64 = 0.5;

pub struct PagePainter<'p, S: Surface> {
    pub canvas: &'p mut Canvas<S>,
    pub layout: &'p LayoutConfig,
    pub patient: &'p PatientModel,
    pub resources: &'p Resources,
    pub page_number: usize,
}

impl<'p, S: Surface> PagePainter<'p, S> {
    pub fn draw(&mut self, page: &BasePage) {
        if let Some(background) = &page.background {
            match self.resources.svg(Path::new(background)) {
                Some(source) => {
                    let (width, height) = self.canvas.page_size();
                    self.canvas.svg(source, 0.0, 0.0, width, height, SvgFit::Stretch);
                }
                None => error!(path = %background, "background not available"),
            }
        }
        if let Some(grid) = &page.grid {
            self.draw_grid(grid);
        }
        for field in page.resolve_fields(&self.layout.fonts.normal) {
            let value = field
                .name
                .map(|name| self.patient.field(name, self.page_number))
                .unwrap_or_default();
            match field.kind {
                FieldKind::Html => self.plot_html(&value, &field),
                FieldKind::Table => self.plot_table(&field),
                FieldKind::Svg => self.plot_svg(&value, &field),
                FieldKind::Text => self.plot_text(&value, &field),
            }
        }
    }

    /// Dashed alignment grid for working on a layout.
    fn draw_grid(&mut self, grid: &GridSpec) {
        if !grid.show || grid.space <= 0.0 {
            return;
        }
        let (page_width, page_height) = self.canvas.page_size();
        let (left, top) = (grid.left, grid.top);
        let width = grid.width.unwrap_or(page_width - left);
        let height = grid.height.unwrap_or(page_height - top - 10.0);
        let (right, bottom) = (left + width, top + height);

        self.canvas.draw(
            Shape::Rect { x: left, y: top, width, height },
            Paint::stroke(Colour::BLACK, 1.0),
        );
        let dashed = Paint::stroke(Colour::BLACK, 1.0).dashed(0.5, 2.0);
        let label = TextStyle::new(self.layout.font(&self.layout.fonts.normal), GRID_LABEL_SIZE, Colour::BLACK);

        let mut x = left + grid.space;
        while x < right {
            self.canvas.draw(
                Shape::Line { from: Point::new(x, top), to: Point::new(x, bottom) },
                dashed,
            );
            let centred = label.clone().aligned(Align::Center, 20.0);
            self.canvas.text(&format!("{}", x), x - 10.0, top + 20.0, &centred);
            x += grid.space;
        }
        let mut y = top + grid.space;
        while y < bottom {
            self.canvas.draw(
                Shape::Line { from: Point::new(left, y), to: Point::new(right, y) },
                dashed,
            );
            self.canvas.text(&format!("{}", y), 10.0, y - 3.0, &label);
            y += grid.space;
        }
    }

    /// A value, optionally preceded by a caption and a dotted leader.
    fn plot_text(&mut self, value: &str, field: &Field) {
        let text = if value.is_empty() && field.name == Some(PatientField::Text) {
            field.text.as_str()
        } else {
            value
        };
        if text.is_empty() {
            return;
        }

        let font = self.layout.font(&field.font);
        let mut style = TextStyle::new(font, field.font_size, Colour::BLACK);

        if let Some(caption) = field.caption.as_deref() {
            let caption_font = self.layout.font(&field.caption_font);
            let caption_style = TextStyle::new(caption_font, field.caption_size, Colour::BLACK);
            self.canvas.text(caption, field.x, field.y, &caption_style);

            let caption_width = self
                .canvas
                .text_width(&format!("{} ", caption), caption_font, field.caption_size);
            let text_width = self
                .canvas
                .text_width(&format!(" {}", text), font, field.font_size);
            let leader_end = (field.x + field.width - text_width).floor();
            let leader_start = field.x + caption_width;
            if leader_end > leader_start {
                self.canvas.draw(
                    Shape::Line {
                        from: Point::new(leader_start, field.y),
                        to: Point::new(leader_end, field.y),
                    },
                    Paint::stroke(Colour::BLACK, 1.0).dashed(1.0, 2.0),
                );
            }
            style = style.aligned(Align::Right, field.width);
        } else if let Some(align) = field.align {
            style = style.aligned(align, field.width);
        }
        self.canvas.text(text, field.x, field.y, &style);
    }

    fn plot_html(&mut self, html: &str, field: &Field) {
        let source = if html.is_empty() { field.text.as_str() } else { html };
        if source.is_empty() {
            return;
        }
        let fonts = &self.layout.fonts;
        let font_for = |role: FontRole| match role {
            FontRole::Normal => self.layout.font(&field.font),
            FontRole::Bold => self.layout.font(&fonts.bold),
            FontRole::Italic => self.layout.font(&fonts.italic),
        };
        let width = if field.width > 0.0 { field.width } else { DEFAULT_HTML_WIDTH };
        let paragraphs = html::to_segments(source);
        let placed = html::layout(&paragraphs, width, field.font_size, |text, role| {
            self.canvas.text_width(text, font_for(role), field.font_size)
        });
        for piece in placed {
            let style = TextStyle::new(font_for(piece.font), field.font_size, Colour::BLACK);
            self.canvas
                .text(&piece.text, field.x + piece.x, field.y + piece.y, &style);
        }
    }

    fn plot_svg(&mut self, path: &str, field: &Field) {
        if path.is_empty() {
            return;
        }
        match self.resources.svg(Path::new(path)) {
            Some(source) => self.canvas.svg(
                source,
                field.x,
                field.y,
                field.width,
                field.height,
                SvgFit::MeetBottomRight,
            ),
            None => error!(path, "svg not available"),
        }
    }

    fn draw_table_grid(&mut self, table: &Field, border: Colour) {
        let paint = Paint::stroke(border, TABLE_LINE_WIDTH);
        self.canvas.draw(
            Shape::RoundedRect {
                x: table.x,
                y: table.y,
                width: table.width,
                height: table.height,
                radius: table.radius,
            },
            paint,
        );
        for &column in &table.columns {
            let x = table.x + column;
            self.canvas.draw(
                Shape::Line {
                    from: Point::new(x, table.y),
                    to: Point::new(x, table.y + table.height),
                },
                paint,
            );
        }
        let pad = table.cellpadding;
        for &row in &table.rows {
            let y = table.y + row;
            self.canvas.draw(
                Shape::Line {
                    from: Point::new(table.x + pad, y),
                    to: Point::new(table.x + table.width - pad, y),
                },
                paint,
            );
        }
    }

    /// Cells from the nurse concern list when the table names columns, otherwise
    /// from the layout.
    fn table_cells(&self, table: &Field) -> Option<(Vec<Vec<CellSpec>>, Vec<FieldSpec>)> {
        let Some(column_names) = &table.column_names else {
            return Some((table.cells.clone(), table.row_defaults.clone()));
        };
        if table.name != Some(PatientField::NurseConcern) {
            error!(name = ?table.name, "column names are only supported for nurse_concern tables");
            return None;
        }
        let cells = self
            .patient
            .nurse_concern
            .iter()
            .map(|concern| {
                column_names
                    .iter()
                    .map(|column| {
                        let text = match column.as_str() {
                            "code" => concern.code.clone(),
                            "name" => concern.name.clone(),
                            "text" => concern.text.clone(),
                            _ => String::new(),
                        };
                        CellSpec::Text(text)
                    })
                    .collect()
            })
            .collect();
        Some((cells, Vec::new()))
    }

    fn plot_table(&mut self, field: &Field) {
        if let Some(border) = field.border {
            self.draw_table_grid(field, border);
        }
        let Some((cells, row_defaults)) = self.table_cells(field) else {
            return;
        };
        let mut table = field.clone();
        table.rows = field.rows_for(cells.len());
        debug!(rows = cells.len(), "drawing table");

        for (row_index, row) in cells.iter().enumerate() {
            let row_default = row_defaults.get(row_index).cloned().unwrap_or_default();
            for (col_index, cell) in row.iter().enumerate() {
                let bounds = table.cell_bounds(col_index, row_index);
                let base = Field {
                    name: None,
                    x: 0.0,
                    y: 0.0,
                    ..table.clone()
                };
                let cell_field = base
                    .with(&row_default)
                    .with(&FieldSpec {
                        width: Some(bounds.width),
                        height: Some(bounds.height),
                        ..FieldSpec::default()
                    })
                    .with(&cell.to_spec());

                let placed = Field {
                    x: bounds.left + table.x + cell_field.x,
                    y: bounds.top + table.y + table.font_size + cell_field.y,
                    width: cell_field.width - cell_field.x,
                    height: cell_field.height - cell_field.y,
                    // Nested tables are drawn as plain text.
                    kind: match cell_field.kind {
                        FieldKind::Html => FieldKind::Html,
                        _ => FieldKind::Text,
                    },
                    border: None,
                    ..cell_field
                };
                let value = match placed.name {
                    Some(name) => self.patient.field(name, self.page_number),
                    None => placed.text.clone(),
                };
                match placed.kind {
                    FieldKind::Html => self.plot_html(&value, &placed),
                    _ => self.plot_text(&value, &placed),
                }
            }
        }
    }
}
