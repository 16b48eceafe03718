//! Request types and the chart's data model.

pub mod format;
pub mod observation;
pub mod patient;
pub mod request;

pub use observation::{
    ChartField, ChartValue, GapMarker, ObservationSet, ObservationType, Reading,
    ScoreSystemChangeEvent, Slot, SpecialValue, TimelineEntry,
};
pub use patient::{PatientField, PatientModel};
pub use request::{ChartRequest, PageRange, SendConfig, ValidatedRequest};
