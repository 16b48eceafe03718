//! The layout file: page setup, fonts, page lists and the two chart definitions.

pub mod columns;
pub mod geometry;
pub mod page;
pub mod section;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{ChartError, ChartResult};
use crate::model::request::BcpOverrides;
use crate::model::{ChartField, SpecialValue};
use crate::render::Colour;

pub use columns::{ChartColumns, ColumnBlock, ColumnInfo};
pub use geometry::ChartGeometry;
pub use page::{BasePage, Field, FieldKind, FieldSpec, GridSpec};
pub use section::{ChartSection, SectionKind, SectionSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum PageName {
    #[serde(rename = "news2")]
    News2,
    #[serde(rename = "meows")]
    Meows,
    #[serde(rename = "cover_page")]
    CoverPage,
    #[serde(rename = "threshold_4cols")]
    Threshold4Cols,
    #[serde(rename = "threshold_5cols")]
    Threshold5Cols,
    #[serde(rename = "blank_chart_news2")]
    BlankChartNews2,
    #[serde(rename = "blank_chart_meows")]
    BlankChartMeows,
}

impl PageName {
    const ALL: [PageName; 7] = [
        PageName::News2,
        PageName::Meows,
        PageName::CoverPage,
        PageName::Threshold4Cols,
        PageName::Threshold5Cols,
        PageName::BlankChartNews2,
        PageName::BlankChartMeows,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PageName::News2 => "news2",
            PageName::Meows => "meows",
            PageName::CoverPage => "cover_page",
            PageName::Threshold4Cols => "threshold_4cols",
            PageName::Threshold5Cols => "threshold_5cols",
            PageName::BlankChartNews2 => "blank_chart_news2",
            PageName::BlankChartMeows => "blank_chart_meows",
        }
    }
}

impl FromStr for PageName {
    type Err = ChartError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|page| page.as_str() == name)
            .ok_or_else(|| ChartError::ConfigValidation(format!("unknown page '{}'", name)))
    }
}

impl fmt::Display for PageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum PageSize {
    #[default]
    A4,
    A3,
    #[serde(alias = "LETTER")]
    Letter,
}

impl PageSize {
    /// Width and height in points.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::A3 => (841.89, 1190.55),
            PageSize::Letter => (612.0, 792.0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PageSetup {
    pub size: PageSize,
    /// Offset applied to everything drawn on basic pages.
    pub translate: [f64; 2],
}

/// Font roles and the directory the font files live in.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FontMapping {
    pub fontpath: PathBuf,
    pub normal: String,
    pub bold: String,
    pub italic: String,
}

impl Default for FontMapping {
    fn default() -> Self {
        FontMapping {
            fontpath: PathBuf::from("config/fonts"),
            normal: "SourceSansPro-Regular".to_string(),
            bold: "SourceSansPro-Bold".to_string(),
            italic: "SourceSansPro-It".to_string(),
        }
    }
}

impl FontMapping {
    /// Role names map to their font, anything else is taken as a font name.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        match name {
            "normal" => &self.normal,
            "bold" => &self.bold,
            "italic" => &self.italic,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessageText {
    pub text: Option<String>,
    pub bg_colour: Colour,
}

impl Default for MessageText {
    fn default() -> Self {
        MessageText {
            text: None,
            bg_colour: Colour::WHITE,
        }
    }
}

/// Text shown in place of a reading for each sentinel.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub refused: MessageText,
    pub score_system_change: MessageText,
    pub missing: MessageText,
    pub no_obs: MessageText,
}

impl Messages {
    pub fn for_special(&self, special: SpecialValue) -> &MessageText {
        match special {
            SpecialValue::Refused => &self.refused,
            SpecialValue::ScoreSystemChange => &self.score_system_change,
            SpecialValue::Missing => &self.missing,
            SpecialValue::NoReadingsFor24Hours => &self.no_obs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DisplayEntry {
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(default)]
    pub value: Option<f64>,
}

/// Recorded text to chart label and plotting value, e.g. ACVPU codes.
pub type DisplayTable = HashMap<String, DisplayEntry>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChartPageSpec {
    #[serde(flatten)]
    pub base: BasePage,
    pub col1: ColumnBlock,
    pub col2: ColumnBlock,
    #[serde(default)]
    pub sections: Vec<SectionSpec>,
    #[serde(default)]
    pub message_groups: Vec<Vec<ChartField>>,
    #[serde(default)]
    pub messages: Messages,
    #[serde(default)]
    pub consciousness_map: DisplayTable,
    /// Further tables a section can name in `display`.
    #[serde(default)]
    pub display_tables: HashMap<String, DisplayTable>,
}

impl ChartPageSpec {
    pub fn display_table(&self, name: &str) -> Option<&DisplayTable> {
        if name == "consciousness_map" {
            Some(&self.consciousness_map)
        } else {
            self.display_tables.get(name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LayoutConfig {
    #[serde(default)]
    pub page: PageSetup,
    #[serde(default)]
    pub font_aliases: HashMap<String, String>,
    #[serde(default)]
    pub fonts: FontMapping,
    #[serde(default)]
    pub pages_front: Vec<PageName>,
    #[serde(default)]
    pub pages_back_news2: Vec<PageName>,
    #[serde(default)]
    pub pages_back_meows: Vec<PageName>,
    pub cover_page: Option<BasePage>,
    pub threshold_4cols: Option<BasePage>,
    pub threshold_5cols: Option<BasePage>,
    pub blank_chart_news2: Option<BasePage>,
    pub blank_chart_meows: Option<BasePage>,
    pub news2: ChartPageSpec,
    pub meows: ChartPageSpec,
}

impl LayoutConfig {
    pub fn basic_page(&self, name: PageName) -> Option<&BasePage> {
        match name {
            PageName::News2 => Some(&self.news2.base),
            PageName::Meows => Some(&self.meows.base),
            PageName::CoverPage => self.cover_page.as_ref(),
            PageName::Threshold4Cols => self.threshold_4cols.as_ref(),
            PageName::Threshold5Cols => self.threshold_5cols.as_ref(),
            PageName::BlankChartNews2 => self.blank_chart_news2.as_ref(),
            PageName::BlankChartMeows => self.blank_chart_meows.as_ref(),
        }
    }

    pub fn chart(&self, score_system: &str) -> &ChartPageSpec {
        if score_system == "meows" {
            &self.meows
        } else {
            &self.news2
        }
    }

    /// Back pages follow the scheme of the last chart page.
    pub fn back_pages(&self, score_system: &str) -> &[PageName] {
        if score_system == "meows" {
            &self.pages_back_meows
        } else {
            &self.pages_back_news2
        }
    }

    /// Font for a name used in the layout. Aliases are matched case-insensitively.
    pub fn font<'a>(&'a self, name: &'a str) -> &'a str {
        let resolved = self.fonts.resolve(name);
        self.font_aliases
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(resolved))
            .map(|(_, font)| font.as_str())
            .unwrap_or(resolved)
    }

    /// Replace the page lists a customer overrides.
    pub fn apply_overrides(&mut self, bcp: &BcpOverrides) -> ChartResult<()> {
        let parse = |names: &Vec<String>| {
            names
                .iter()
                .map(|name| name.parse())
                .collect::<ChartResult<Vec<PageName>>>()
        };
        if let Some(names) = &bcp.pages_front {
            self.pages_front = parse(names)?;
        }
        if let Some(names) = &bcp.pages_back_news2 {
            self.pages_back_news2 = parse(names)?;
        }
        if let Some(names) = &bcp.pages_back_meows {
            self.pages_back_meows = parse(names)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> ChartResult<()> {
        let listed = self
            .pages_front
            .iter()
            .chain(&self.pages_back_news2)
            .chain(&self.pages_back_meows);
        for &name in listed {
            if self.basic_page(name).is_none() {
                return Err(ChartError::ConfigValidation(format!(
                    "page {} is listed but not defined",
                    name
                )));
            }
        }
        ChartGeometry::new(&self.news2, &self.fonts.normal)?;
        ChartGeometry::new(&self.meows, &self.fonts.normal)?;
        Ok(())
    }
}

pub fn parse_layout(text: &str) -> ChartResult<LayoutConfig> {
    let layout: LayoutConfig =
        serde_json::from_str(text).map_err(|err| ChartError::ConfigValidation(err.to_string()))?;
    Ok(layout)
}

/// Read the customer layout (or the shared one), apply overrides and validate.
pub async fn load_layout(config: &Config, bcp: &BcpOverrides) -> ChartResult<LayoutConfig> {
    let [customer, shared] = config.layout_candidates();
    let (path, text) = match tokio::fs::read_to_string(&customer).await {
        Ok(text) => (customer, text),
        Err(err) => {
            debug!(path = %customer.display(), "no customer layout: {}", err);
            let text = tokio::fs::read_to_string(&shared)
                .await
                .map_err(|source| ChartError::ResourceLoad {
                    path: shared.clone(),
                    source,
                })?;
            (shared, text)
        }
    };
    info!(path = %path.display(), "loaded layout");

    let mut layout = parse_layout(&text)?;
    layout.apply_overrides(bcp)?;
    layout.validate()?;
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_layout() -> serde_json::Value {
        let chart = serde_json::json!({
            "col1": {"left": 100, "width": 120, "top": 40, "bottom": 800},
            "col2": {"left": 300, "width": 120},
            "sections": [{"name": "topSection", "type": "blank", "bottom": 60}],
            "messages": {"refused": {"text": "Refused", "bgColour": "#ffeeee"}},
            "consciousness_map": {"a": {"displayName": "A", "value": 0}}
        });
        serde_json::json!({
            "page": {"size": "A4", "margins": {"top": 10, "bottom": 0, "left": 10, "right": 10}},
            "fonts": {"bold": "Helvetica-Bold"},
            "font_aliases": {"SourceSansPro": "SourceSansPro-Regular"},
            "pages_front": ["cover_page"],
            "pages_back_news2": [],
            "pages_back_meows": [],
            "cover_page": {"fields": []},
            "news2": chart.clone(),
            "meows": chart,
        })
    }

    #[test]
    fn test_parse_and_validate_minimal_layout() {
        let layout = parse_layout(&minimal_layout().to_string()).unwrap();
        layout.validate().unwrap();

        assert_eq!(layout.page.size.dimensions(), (595.28, 841.89));
        assert_eq!(layout.fonts.normal, "SourceSansPro-Regular");
        assert_eq!(layout.font("bold"), "Helvetica-Bold");
        assert_eq!(layout.font("sourcesanspro"), "SourceSansPro-Regular");
        assert_eq!(layout.news2.messages.refused.bg_colour, Colour::rgb(255, 238, 238));
        assert_eq!(layout.news2.messages.missing.bg_colour, Colour::WHITE);
        assert!(layout.news2.display_table("consciousness_map").is_some());
        assert!(layout.news2.display_table("nothing").is_none());
    }

    #[test]
    fn test_listed_pages_must_exist() {
        let mut json = minimal_layout();
        json["pages_back_news2"] = serde_json::json!(["threshold_4cols"]);
        let layout = parse_layout(&json.to_string()).unwrap();
        assert!(matches!(layout.validate(), Err(ChartError::ConfigValidation(_))));
    }

    #[test]
    fn test_overrides_replace_page_lists() {
        let mut layout = parse_layout(&minimal_layout().to_string()).unwrap();
        let bcp = BcpOverrides {
            pages_front: Some(vec![]),
            pages_back_meows: Some(vec!["cover_page".into()]),
            ..BcpOverrides::default()
        };
        layout.apply_overrides(&bcp).unwrap();
        assert!(layout.pages_front.is_empty());
        assert_eq!(layout.back_pages("meows"), &[PageName::CoverPage]);
        assert!(layout.back_pages("news2").is_empty());

        let bad = BcpOverrides {
            pages_front: Some(vec!["appendix".into()]),
            ..BcpOverrides::default()
        };
        assert!(layout.apply_overrides(&bad).is_err());
    }

    #[test]
    fn test_malformed_colour_is_a_config_error() {
        let mut json = minimal_layout();
        json["news2"]["messages"]["refused"]["bgColour"] = serde_json::json!("#aé");
        assert!(matches!(
            parse_layout(&json.to_string()),
            Err(ChartError::ConfigValidation(_))
        ));
    }

    #[test]
    fn test_section_defaults_do_not_cross_charts() {
        let mut json = minimal_layout();
        json["news2"]["sections"] = serde_json::json!([
            {"fontSize": 7},
            {"name": "topSection", "type": "blank", "bottom": 60},
        ]);
        let layout = parse_layout(&json.to_string()).unwrap();

        let news2 = ChartGeometry::new(&layout.news2, &layout.fonts.normal).unwrap();
        let meows = ChartGeometry::new(&layout.meows, &layout.fonts.normal).unwrap();
        assert_eq!(news2.sections[0].font_size, 7.0);
        assert_eq!(meows.sections[0].font_size, ChartSection::DEFAULT_FONT_SIZE);
    }

    #[test]
    fn test_unknown_page_name_is_rejected() {
        let mut json = minimal_layout();
        json["pages_front"] = serde_json::json!(["appendix"]);
        assert!(parse_layout(&json.to_string()).is_err());
    }
}
