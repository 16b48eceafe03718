//! Field definitions for the basic (non-chart) pages.

use serde::{Deserialize, Deserializer};

use crate::model::PatientField;
use crate::render::{Align, Colour};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    #[serde(alias = "")]
    Text,
    Html,
    Table,
    Svg,
}

/// An empty name is the same as no name.
fn field_name<'de, D>(deserializer: D) -> Result<Option<PatientField>, D::Error>
where
    D: Deserializer<'de>,
{
    let name = Option::<String>::deserialize(deserializer)?;
    match name.as_deref() {
        None | Some("") => Ok(None),
        Some(name) => name.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// A table cell is either literal text or a partial field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CellSpec {
    Text(String),
    Field(Box<FieldSpec>),
}

impl CellSpec {
    pub fn to_spec(&self) -> FieldSpec {
        match self {
            CellSpec::Text(text) => FieldSpec {
                text: Some(text.clone()),
                ..FieldSpec::default()
            },
            CellSpec::Field(spec) => (**spec).clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub kind: Option<FieldKind>,
    #[serde(deserialize_with = "field_name")]
    pub name: Option<PatientField>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub font: Option<String>,
    pub font_size: Option<f64>,
    pub caption: Option<String>,
    pub caption_font: Option<String>,
    pub caption_size: Option<f64>,
    pub text: Option<String>,
    pub radius: Option<f64>,
    pub align: Option<Align>,
    pub cellpadding: Option<f64>,
    pub columns: Option<Vec<f64>>,
    #[serde(rename = "column_names")]
    pub column_names: Option<Vec<String>>,
    pub rows: Option<Vec<f64>>,
    pub row_defaults: Option<Vec<FieldSpec>>,
    pub cells: Option<Vec<Vec<CellSpec>>>,
    pub border: Option<Colour>,
}

/// A fully resolved field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub kind: FieldKind,
    pub name: Option<PatientField>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub font: String,
    pub font_size: f64,
    pub caption: Option<String>,
    pub caption_font: String,
    pub caption_size: f64,
    pub text: String,
    pub radius: f64,
    pub align: Option<Align>,
    pub cellpadding: f64,
    pub columns: Vec<f64>,
    pub column_names: Option<Vec<String>>,
    pub rows: Vec<f64>,
    pub row_defaults: Vec<FieldSpec>,
    pub cells: Vec<Vec<CellSpec>>,
    pub border: Option<Colour>,
}

impl Field {
    /// Starting defaults for the first field on a page.
    pub fn initial(normal_font: &str) -> Self {
        Field {
            kind: FieldKind::Text,
            name: None,
            x: 100.0,
            y: 100.0,
            width: 200.0,
            height: 10.0,
            font: normal_font.to_string(),
            font_size: 10.0,
            caption: None,
            caption_font: normal_font.to_string(),
            caption_size: 10.0,
            text: String::new(),
            radius: 9.0,
            align: None,
            cellpadding: 2.0,
            columns: Vec::new(),
            column_names: None,
            rows: Vec::new(),
            row_defaults: Vec::new(),
            cells: Vec::new(),
            border: None,
        }
    }

    /// Copy of `self` with every member `spec` sets replaced.
    pub fn with(&self, spec: &FieldSpec) -> Field {
        Field {
            kind: spec.kind.unwrap_or(self.kind),
            name: spec.name.or(self.name),
            x: spec.x.unwrap_or(self.x),
            y: spec.y.unwrap_or(self.y),
            width: spec.width.unwrap_or(self.width),
            height: spec.height.unwrap_or(self.height),
            font: spec.font.clone().unwrap_or_else(|| self.font.clone()),
            font_size: spec.font_size.unwrap_or(self.font_size),
            caption: spec.caption.clone().or_else(|| self.caption.clone()),
            caption_font: spec
                .caption_font
                .clone()
                .unwrap_or_else(|| self.caption_font.clone()),
            caption_size: spec.caption_size.unwrap_or(self.caption_size),
            text: spec.text.clone().unwrap_or_else(|| self.text.clone()),
            radius: spec.radius.unwrap_or(self.radius),
            align: spec.align.or(self.align),
            cellpadding: spec.cellpadding.unwrap_or(self.cellpadding),
            columns: spec.columns.clone().unwrap_or_else(|| self.columns.clone()),
            column_names: spec
                .column_names
                .clone()
                .or_else(|| self.column_names.clone()),
            rows: spec.rows.clone().unwrap_or_else(|| self.rows.clone()),
            row_defaults: spec
                .row_defaults
                .clone()
                .unwrap_or_else(|| self.row_defaults.clone()),
            cells: spec.cells.clone().unwrap_or_else(|| self.cells.clone()),
            border: spec.border.or(self.border),
        }
    }

    /// Bounds of one table cell, relative to the table's own origin.
    pub fn cell_bounds(&self, col: usize, row: usize) -> CellBounds {
        let pad = self.cellpadding;
        let boundary = |lines: &[f64], index: usize, end: f64| lines.get(index).copied().unwrap_or(end);

        let left = if col == 0 { pad } else { boundary(&self.columns, col - 1, self.width) } + pad;
        let right = boundary(&self.columns, col, self.width - pad);
        let top = if row == 0 { 0.0 } else { boundary(&self.rows, row - 1, self.height) } + pad;
        let bottom = boundary(&self.rows, row, self.height - pad);
        CellBounds {
            left,
            top,
            width: right - left - pad,
            height: bottom - top - 2.0 * pad,
        }
    }

    /// Row boundaries extended by repeating the last spacing until every row has one.
    pub fn rows_for(&self, row_count: usize) -> Vec<f64> {
        let mut rows = self.rows.clone();
        if row_count > rows.len() && rows.len() == 1 {
            rows.push(2.0 * rows[0]);
        }
        while row_count > rows.len() && rows.len() >= 2 {
            let last = rows.len() - 1;
            rows.push(2.0 * rows[last] - rows[last - 1]);
        }
        rows
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GridSpec {
    pub left: f64,
    pub top: f64,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub show: bool,
    pub space: f64,
}

impl Default for GridSpec {
    fn default() -> Self {
        GridSpec {
            left: 0.0,
            top: 0.0,
            width: None,
            height: None,
            show: false,
            space: 50.0,
        }
    }
}

/// A page as written in the layout file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BasePage {
    pub grid: Option<GridSpec>,
    pub fields: Vec<FieldSpec>,
    pub background: Option<String>,
}

impl BasePage {
    /// Apply the running defaults. A field without a name only updates the defaults.
    pub fn resolve_fields(&self, normal_font: &str) -> Vec<Field> {
        let mut defaults = Field::initial(normal_font);
        let mut fields = Vec::new();
        for spec in &self.fields {
            let field = defaults.with(spec);
            if spec.name.is_none() {
                defaults = field;
            } else {
                fields.push(field);
            }
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unnamed_field_updates_defaults() {
        let page: BasePage = serde_json::from_value(serde_json::json!({
            "fields": [
                {"fontSize": 14, "font": "bold"},
                {"name": "fullName", "x": 20, "y": 30},
                {"name": "dob", "caption": "DOB"},
                {"name": "", "fontSize": 8},
                {"name": "ward"}
            ]
        }))
        .unwrap();
        let fields = page.resolve_fields("normal");

        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].name, Some(PatientField::FullName));
        assert_eq!((fields[0].x, fields[0].y, fields[0].font_size), (20.0, 30.0, 14.0));
        assert_eq!(fields[0].font, "bold");
        assert_eq!(fields[1].caption.as_deref(), Some("DOB"));
        assert_eq!(fields[1].x, 100.0);
        assert_eq!(fields[2].font_size, 8.0);
    }

    #[test]
    fn test_unknown_field_name_is_rejected() {
        let result: Result<BasePage, _> =
            serde_json::from_value(serde_json::json!({"fields": [{"name": "favouriteColour"}]}));
        assert!(result.is_err());
    }

    #[test]
    fn test_table_cells_and_rows() {
        let table: FieldSpec = serde_json::from_value(serde_json::json!({
            "type": "table",
            "name": "text",
            "width": 300,
            "height": 100,
            "cellpadding": 2,
            "columns": [100, 200],
            "rows": [20, 40],
            "cells": [["A", {"text": "B", "font": "bold"}]]
        }))
        .unwrap();
        let field = Field::initial("normal").with(&table);

        assert_eq!(field.kind, FieldKind::Table);
        assert_eq!(field.cells[0][0], CellSpec::Text("A".into()));
        assert_eq!(field.cells[0][1].to_spec().font.as_deref(), Some("bold"));
        assert_eq!(field.rows_for(4), vec![20.0, 40.0, 60.0, 80.0]);

        let first = field.cell_bounds(0, 0);
        assert_eq!((first.left, first.top, first.width, first.height), (4.0, 2.0, 94.0, 14.0));
        let last = field.cell_bounds(2, 2);
        assert_eq!((last.left, last.width), (202.0, 94.0));
    }
}
