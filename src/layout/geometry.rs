//! Resolved geometry for one chart scheme.

use std::collections::HashMap;

use crate::error::{ChartError, ChartResult};
use crate::model::ChartField;

use super::columns::ChartColumns;
use super::section::{ChartSection, SectionKind, SectionSpec};
use super::ChartPageSpec;

#[derive(Debug, Clone)]
pub struct ChartGeometry {
    pub columns: ChartColumns,
    /// In layout order, which is also drawing order.
    pub sections: Vec<ChartSection>,
    /// Top edge of the full-column messages for gap and score-system-change columns.
    pub full_message_top: f64,
}

impl ChartGeometry {
    pub fn new(page: &ChartPageSpec, normal_font: &str) -> ChartResult<Self> {
        for block in [&page.col1, &page.col2] {
            if block.width <= 0.0 || block.cells == 0 {
                return Err(ChartError::ConfigValidation(
                    "chart columns need a positive width and at least one cell".to_string(),
                ));
            }
        }
        let columns = ChartColumns::new(&[&page.col1, &page.col2]);
        let row_height = columns.row_height();

        let mut defaults = SectionSpec::default();
        let mut sections = Vec::new();
        for spec in &page.sections {
            let merged = spec.over(&defaults);
            match spec.name {
                Some(name) => {
                    let section = ChartSection::new(name, &merged, normal_font, row_height);
                    check_section(&section)?;
                    sections.push(section);
                }
                None => defaults = merged,
            }
        }

        fix_message_groups(&mut sections, &page.message_groups)?;

        let full_message_top = sections
            .iter()
            .find(|section| section.name == ChartField::TopSection)
            .map(|section| section.top())
            .ok_or_else(|| {
                ChartError::ConfigValidation("chart has no topSection".to_string())
            })?;

        Ok(ChartGeometry {
            columns,
            sections,
            full_message_top,
        })
    }

    pub fn section(&self, name: ChartField) -> Option<&ChartSection> {
        self.sections.iter().find(|section| section.name == name)
    }

    /// Date, time and initials, which stay visible under a full-column message.
    pub fn header_sections(&self) -> impl Iterator<Item = &ChartSection> {
        self.sections
            .iter()
            .filter(|section| section.name.is_column_header())
    }
}

fn check_section(section: &ChartSection) -> ChartResult<()> {
    if let Some(candle) = section.candle {
        if !(candle.low < candle.mid && candle.mid < candle.high) {
            return Err(ChartError::ConfigValidation(format!(
                "candle section {} needs low < mid < high",
                section.name
            )));
        }
    }
    if section.kind == SectionKind::Dot && section.high <= section.low {
        return Err(ChartError::ConfigValidation(format!(
            "dot section {} needs low < high",
            section.name
        )));
    }
    Ok(())
}

/// Sections in one group share the outermost message top and bottom.
fn fix_message_groups(sections: &mut [ChartSection], groups: &[Vec<ChartField>]) -> ChartResult<()> {
    let positions: HashMap<ChartField, usize> = sections
        .iter()
        .enumerate()
        .map(|(index, section)| (section.name, index))
        .collect();

    for group in groups {
        let members = group
            .iter()
            .map(|name| {
                positions.get(name).copied().ok_or_else(|| {
                    ChartError::ConfigValidation(format!(
                        "message group names unknown section {}",
                        name
                    ))
                })
            })
            .collect::<ChartResult<Vec<_>>>()?;

        let top = members
            .iter()
            .map(|&i| sections[i].message_top)
            .fold(f64::INFINITY, f64::min);
        let bottom = members
            .iter()
            .map(|&i| sections[i].message_bottom)
            .fold(f64::NEG_INFINITY, f64::max);
        for &i in &members {
            sections[i].message_top = top;
            sections[i].message_bottom = bottom;
        }
    }
    Ok(())
}
