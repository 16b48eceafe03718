//! ewschart: early-warning observation charts as PDF documents.
//!
//! A request carries a patient's observation sets and score-system history. They are
//! merged into a timeline, split into twelve-column pages, and drawn onto NEWS2 or MEOWS
//! chart pages between configurable front and back pages.

pub mod api;
pub mod chart;
pub mod config;
pub mod error;
pub mod layout;
pub mod model;
pub mod render;
pub mod timeline;

pub use chart::ChartModel;
pub use error::{ChartError, ChartResult};
