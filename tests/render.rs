use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use pretty_assertions::assert_eq;

use ewschart::api::rest::load_sample;
use ewschart::config::Config;
use ewschart::model::PageRange;
use ewschart::render::document::render;
use ewschart::render::{DrawOp, RecordingSurface};

fn config() -> Config {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let mut config = Config::default();
    config.paths.config_dir = root.join("config");
    config.paths.sample_dir = root.join("tests/fixtures");
    config
}

fn created_at() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2019, 4, 16)
        .and_then(|date| date.and_hms_opt(9, 30, 0))
        .expect("valid date")
        .and_utc()
}

async fn render_sample(pages: Option<PageRange>) -> RecordingSurface {
    let config = config();
    let mut request = load_sample(&config, None).await.expect("sample request");
    request.pages = pages;
    let request = request.validate().expect("sample request is complete");
    let (_, surface) = render(&config, &request, created_at(), RecordingSurface::new())
        .await
        .expect("render");
    surface
}

fn page_count(surface: &RecordingSurface) -> usize {
    surface
        .ops()
        .iter()
        .filter(|op| matches!(op, DrawOp::Page { .. }))
        .count()
}

fn page_texts(ops: &[DrawOp]) -> Vec<&str> {
    ops.iter()
        .filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_full_document_has_front_chart_and_back_pages() {
    let surface = render_sample(None).await;
    // Cover page, four chart pages and one threshold page.
    assert_eq!(page_count(&surface), 6);

    let cover = page_texts(surface.page(1));
    assert!(cover.contains(&"Observation and Escalation Chart"));
    assert!(cover.contains(&"MRN123456"));

    let meows = page_texts(surface.page(2));
    assert!(meows.contains(&"15:56"));
    assert!(meows.contains(&"31 Jan 19"));

    let texts = surface.texts();
    assert!(texts.contains(&"Patient refused"));
    assert!(texts.contains(&"No observations for 24 hours"));
    assert!(texts.contains(&"Score system changed"));
}

#[tokio::test]
async fn test_first_page_window_matches_full_render() {
    let full = render_sample(None).await;
    let first = render_sample(Some(PageRange { first: 1, last: Some(1) })).await;

    assert_eq!(page_count(&first), 1);
    assert_eq!(first.page(1), full.page(1));
}

#[tokio::test]
async fn test_page_window_draws_the_same_page() {
    let full = render_sample(None).await;
    let single = render_sample(Some(PageRange { first: 3, last: Some(3) })).await;

    assert_eq!(page_count(&single), 1);
    assert_eq!(single.page(1), full.page(3));
}

#[tokio::test]
async fn test_negative_window_counts_from_the_end() {
    let full = render_sample(None).await;
    // Six pages: -2 is page 4 and -1 is page 5.
    let tail = render_sample(Some(PageRange { first: -2, last: Some(-1) })).await;

    assert_eq!(page_count(&tail), 2);
    assert_eq!(tail.page(1), full.page(4));
    assert_eq!(tail.page(2), full.page(5));
}
