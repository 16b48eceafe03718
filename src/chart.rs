//! Everything a document needs that is derived from the request body.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::model::{ObservationSet, PatientModel, ScoreSystemChangeEvent, ValidatedRequest};
use crate::timeline::{build_timeline, paginate, Page};

#[derive(Debug, Clone)]
pub struct ChartModel {
    pub patient: PatientModel,
    pub pages: Vec<Page>,
}

impl ChartModel {
    pub fn new(request: &ValidatedRequest, logo: PathBuf, created_at: DateTime<Utc>) -> Self {
        let patient = PatientModel::new(
            &request.patient,
            &request.encounter,
            &request.location,
            &request.send_config,
            logo,
            created_at,
        );

        let observation_sets = request
            .observation_sets
            .iter()
            .map(|json| ObservationSet::from_json(json, &request.send_config))
            .collect();
        let events = request
            .encounter
            .score_system_history
            .iter()
            .map(ScoreSystemChangeEvent::from_history)
            .collect();

        let timeline = build_timeline(observation_sets, events);
        debug!(entries = timeline.len(), "built observation timeline");
        let pages = paginate(timeline);

        ChartModel { patient, pages }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Scheme of the final chart page, which picks the back pages. Defaults to news2.
    pub fn last_score_system(&self) -> &str {
        self.pages
            .last()
            .map(|page| page.score_system.as_str())
            .unwrap_or("news2")
    }

    pub fn pdf_filename(&self) -> String {
        format!(
            "{}-{}.pdf",
            self.patient.hospital_number(),
            self.patient.epr_encounter_id
        )
    }
}
