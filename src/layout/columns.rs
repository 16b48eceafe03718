//! Pixel bounds of the twelve reading slots on a chart page.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnBlock {
    pub left: f64,
    pub width: f64,
    #[serde(default)]
    pub top: Option<f64>,
    #[serde(default)]
    pub bottom: Option<f64>,
    #[serde(default = "default_row_height")]
    pub row_height: f64,
    #[serde(default = "default_cells")]
    pub cells: usize,
}

fn default_row_height() -> f64 {
    10.0
}

fn default_cells() -> usize {
    6
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnInfo {
    pub left: f64,
    pub right: f64,
    pub centre: f64,
    pub width: f64,
    pub row_height: f64,
    pub top: f64,
    pub bottom: f64,
    /// Position within its block.
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartColumns {
    pub columns: Vec<ColumnInfo>,
}

impl ChartColumns {
    /// Blocks are laid out in order. A block without `top`/`bottom` inherits them from the previous one.
    pub fn new(blocks: &[&ColumnBlock]) -> Self {
        let mut columns = Vec::new();
        let (mut top, mut bottom) = (0.0, 0.0);
        for block in blocks {
            top = block.top.unwrap_or(top);
            bottom = block.bottom.unwrap_or(bottom);
            let width = block.width / block.cells as f64;
            for index in 0..block.cells {
                let left = block.left + width * index as f64;
                let right = left + width;
                columns.push(ColumnInfo {
                    left,
                    right,
                    centre: (left + right) / 2.0,
                    width,
                    row_height: block.row_height,
                    top,
                    bottom,
                    index,
                });
            }
        }
        ChartColumns { columns }
    }

    pub fn get(&self, index: usize) -> Option<&ColumnInfo> {
        self.columns.get(index)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Row height of the first block, shared by every section on the chart.
    pub fn row_height(&self) -> f64 {
        self.columns
            .first()
            .map(|column| column.row_height)
            .unwrap_or_else(default_row_height)
    }
}
