//! Whole-document generation: front pages, chart pages, back pages.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::chart::ChartModel;
use crate::config::Config;
use crate::error::{ChartError, ChartResult};
use crate::layout::{load_layout, ChartGeometry, LayoutConfig, PageName};
use crate::model::{ObservationType, PageRange, PatientField, Slot, TimelineEntry, ValidatedRequest};
use crate::timeline::Page;

use super::basic_page::PagePainter;
use super::chart_page::ChartPainter;
use super::{Paint, PdfSurface, Shape, Surface, SvgFit, TextStyle};

const DOCUMENT_TITLE: &str = "Observation chart";

/// A surface plus the page size and offset every page is drawn with.
pub struct Canvas<S> {
    surface: S,
    width: f64,
    height: f64,
    translate: [f64; 2],
}

impl<S: Surface> Canvas<S> {
    pub fn new(surface: S, size: (f64, f64), translate: [f64; 2]) -> Self {
        Canvas {
            surface,
            width: size.0,
            height: size.1,
            translate,
        }
    }

    pub fn page_size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn begin_page(&mut self) {
        self.surface.begin_page(self.width, self.height);
    }

    pub fn draw(&mut self, shape: Shape, paint: Paint) {
        let [dx, dy] = self.translate;
        self.surface.draw(shape.translated(dx, dy), paint);
    }

    pub fn text(&mut self, text: &str, x: f64, y: f64, style: &TextStyle) {
        let [dx, dy] = self.translate;
        self.surface.text(text, x + dx, y + dy, style);
    }

    pub fn svg(&mut self, source: &str, x: f64, y: f64, width: f64, height: f64, fit: SvgFit) {
        let [dx, dy] = self.translate;
        self.surface.place_svg(source, x + dx, y + dy, width, height, fit);
    }

    pub fn text_width(&self, text: &str, font: &str, size: f64) -> f64 {
        self.surface.text_width(text, font, size)
    }

    pub fn into_surface(self) -> S {
        self.surface
    }
}

/// SVG files and fonts read ahead of drawing, so drawing itself never touches the disk.
#[derive(Debug, Default)]
pub struct Resources {
    svgs: HashMap<PathBuf, String>,
    fonts: Vec<(String, Vec<u8>)>,
}

impl Resources {
    /// Read everything the document can refer to. Missing files are logged and left out.
    pub async fn load(layout: &LayoutConfig, chart: &ChartModel, positions_dir: &Path) -> Self {
        let mut resources = Resources::default();

        let mut paths: Vec<PathBuf> = [
            PageName::CoverPage,
            PageName::Threshold4Cols,
            PageName::Threshold5Cols,
            PageName::BlankChartNews2,
            PageName::BlankChartMeows,
            PageName::News2,
            PageName::Meows,
        ]
        .into_iter()
        .filter_map(|name| layout.basic_page(name))
        .filter_map(|page| page.background.as_ref().map(PathBuf::from))
        .collect();
        paths.push(PathBuf::from(chart.patient.field(PatientField::SvgLogo, 0)));
        paths.extend(
            patient_positions(&chart.pages)
                .into_iter()
                .map(|position| positions_dir.join(format!("{}.svg", position))),
        );

        for path in paths {
            if resources.svgs.contains_key(&path) {
                continue;
            }
            match tokio::fs::read_to_string(&path).await {
                Ok(source) => {
                    resources.svgs.insert(path, source);
                }
                Err(source) => error!("{}", ChartError::ResourceLoad { path, source }),
            }
        }

        resources.fonts = load_fonts(&layout.fonts.fontpath).await;
        resources
    }

    pub fn svg(&self, path: &Path) -> Option<&str> {
        self.svgs.get(path).map(String::as_str)
    }

    pub fn take_fonts(&mut self) -> Vec<(String, Vec<u8>)> {
        std::mem::take(&mut self.fonts)
    }
}

fn patient_positions(pages: &[Page]) -> Vec<String> {
    let mut positions: Vec<String> = pages
        .iter()
        .flat_map(|page| &page.entries)
        .filter_map(|entry| match entry {
            TimelineEntry::Observation(set) => {
                match set.reading(ObservationType::SystolicBloodPressure) {
                    Slot::Value(reading) => reading.patient_position.clone(),
                    Slot::Special(_) => None,
                }
            }
            _ => None,
        })
        .collect();
    positions.sort();
    positions.dedup();
    positions
}

/// Every `.otf` and `.ttf` file in the font directory, named by file stem.
async fn load_fonts(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut fonts = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) => {
            warn!(path = %dir.display(), "no font directory, using built-in fonts: {}", err);
            return fonts;
        }
    };
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(err) => {
                warn!(path = %dir.display(), "failed to list fonts: {}", err);
                break;
            }
        };
        let path = entry.path();
        let is_font = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| matches!(ext.to_ascii_lowercase().as_str(), "otf" | "ttf"));
        let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if !is_font {
            continue;
        }
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!(font = name, "loaded font");
                fonts.push((name.to_string(), bytes));
            }
            Err(source) => error!("{}", ChartError::ResourceLoad { path: path.clone(), source }),
        }
    }
    fonts
}

/// Inclusive range of document pages to draw, counting from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub first: i64,
    pub last: i64,
}

impl PageWindow {
    /// Without a range every page is drawn. A missing `last` means one page after
    /// `first`, and negative numbers count back from `total`.
    pub fn new(range: Option<&PageRange>, total: i64) -> Self {
        let Some(range) = range else {
            return PageWindow { first: 0, last: total + 1 };
        };
        let from_end = |page: i64| if page < 0 { total + page } else { page };
        PageWindow {
            first: from_end(range.first),
            last: from_end(range.last.unwrap_or(range.first + 1)),
        }
    }

    pub fn contains(&self, page: i64) -> bool {
        self.first <= page && page <= self.last
    }
}

/// Parse `first:last` from the sample endpoint. A bad `first` is 0, a missing `last`
/// equals `first` and a bad `last` means the end of the document.
pub fn parse_page_query(query: &str) -> PageRange {
    let mut parts = query.splitn(2, ':');
    let first = parts
        .next()
        .and_then(|part| part.trim().parse().ok())
        .unwrap_or(0);
    let last = match parts.next() {
        None => first,
        Some(part) => part.trim().parse().unwrap_or(99999),
    };
    PageRange { first, last: Some(last) }
}

/// Draws a whole document onto one surface.
pub struct Generator<'a, S: Surface> {
    canvas: Canvas<S>,
    layout: &'a LayoutConfig,
    chart: &'a ChartModel,
    resources: &'a Resources,
    positions_dir: PathBuf,
    news2: ChartGeometry,
    meows: ChartGeometry,
    window: PageWindow,
    current_page: i64,
}

impl<'a, S: Surface> Generator<'a, S> {
    pub fn new(
        surface: S,
        layout: &'a LayoutConfig,
        chart: &'a ChartModel,
        resources: &'a Resources,
        positions_dir: PathBuf,
        window: PageWindow,
    ) -> ChartResult<Self> {
        let normal = &layout.fonts.normal;
        Ok(Generator {
            canvas: Canvas::new(surface, layout.page.size.dimensions(), layout.page.translate),
            layout,
            chart,
            resources,
            positions_dir,
            news2: ChartGeometry::new(&layout.news2, normal)?,
            meows: ChartGeometry::new(&layout.meows, normal)?,
            window,
            current_page: 1,
        })
    }

    /// Pages in the full document, whether or not they fall in the window.
    pub fn total_pages(layout: &LayoutConfig, chart: &ChartModel) -> i64 {
        let back = layout.back_pages(chart.last_score_system()).len();
        (layout.pages_front.len() + chart.page_count() + back) as i64
    }

    pub fn create_document(mut self) -> ChartResult<S> {
        let layout = self.layout;
        let chart = self.chart;

        for &name in &layout.pages_front {
            self.add_basic_page(name)?;
            self.current_page += 1;
        }

        let count = chart.pages.len();
        for (index, page) in chart.pages.iter().enumerate() {
            info!("Observation page {} of {}", index + 1, count);
            self.add_chart_page(page)?;
            self.current_page += 1;
        }

        for &name in layout.back_pages(chart.last_score_system()) {
            self.add_basic_page(name)?;
            self.current_page += 1;
        }
        Ok(self.canvas.into_surface())
    }

    fn in_window(&self) -> bool {
        self.window.contains(self.current_page)
    }

    fn add_basic_page(&mut self, name: PageName) -> ChartResult<()> {
        if !self.in_window() {
            return Ok(());
        }
        let page = self.layout.basic_page(name).ok_or_else(|| {
            ChartError::InternalConsistency(format!("page {} is not defined", name))
        })?;
        info!(page = self.current_page, "Processing {}", name);
        self.canvas.begin_page();
        PagePainter {
            canvas: &mut self.canvas,
            layout: self.layout,
            patient: &self.chart.patient,
            resources: self.resources,
            page_number: self.current_page.max(0) as usize,
        }
        .draw(page);
        Ok(())
    }

    fn add_chart_page(&mut self, page: &Page) -> ChartResult<()> {
        if !self.in_window() {
            return Ok(());
        }
        let (name, spec, geometry) = if page.is_meows() {
            (PageName::Meows, &self.layout.meows, &self.meows)
        } else {
            (PageName::News2, &self.layout.news2, &self.news2)
        };
        info!(page = self.current_page, "Processing {}", name);
        self.canvas.begin_page();
        PagePainter {
            canvas: &mut self.canvas,
            layout: self.layout,
            patient: &self.chart.patient,
            resources: self.resources,
            page_number: self.current_page.max(0) as usize,
        }
        .draw(&spec.base);

        ChartPainter {
            canvas: &mut self.canvas,
            layout: self.layout,
            spec,
            geometry,
            resources: self.resources,
            positions_dir: &self.positions_dir,
        }
        .draw_page(page)
    }
}

/// Draw the document for `request` onto `surface` without encoding it.
pub async fn render<S: Surface>(
    config: &Config,
    request: &ValidatedRequest,
    created_at: DateTime<Utc>,
    mut surface: S,
) -> ChartResult<(ChartModel, S)> {
    info!(customer = %config.customer_code, "generating chart");
    let layout = load_layout(config, &request.send_config.bcp).await?;
    let logo = crate::model::patient::logo_path(&config.logos_dir(), &config.customer_code);
    let chart = ChartModel::new(request, logo, created_at);

    let positions_dir = config.positions_dir();
    let mut resources = Resources::load(&layout, &chart, &positions_dir).await;
    for (name, bytes) in resources.take_fonts() {
        surface.register_font(&name, bytes);
    }

    let total = Generator::<S>::total_pages(&layout, &chart);
    let window = PageWindow::new(request.pages.as_ref(), total);
    debug!(total, first = window.first, last = window.last, "page window");

    let surface = Generator::new(surface, &layout, &chart, &resources, positions_dir, window)?
        .create_document()?;
    Ok((chart, surface))
}

/// A finished document and the name it is served under.
#[derive(Debug)]
pub struct ChartPdf {
    pub filename: String,
    pub bytes: Vec<u8>,
}

pub async fn generate_pdf(
    config: &Config,
    request: &ValidatedRequest,
    created_at: DateTime<Utc>,
) -> ChartResult<ChartPdf> {
    let (chart, surface) = render(config, request, created_at, PdfSurface::new(DOCUMENT_TITLE)).await?;
    let pages = surface.page_count();
    // Encoding is CPU bound and printpdf documents are not Send.
    let bytes = tokio::task::spawn_blocking(move || surface.finish()).await??;
    info!(pages, bytes = bytes.len(), "pdf complete");
    Ok(ChartPdf {
        filename: encode_uri_component(&chart.pdf_filename()),
        bytes,
    })
}

/// Percent-encode everything except the characters JavaScript's
/// `encodeURIComponent` leaves alone.
pub fn encode_uri_component(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => encoded.push(char::from(byte)),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}
