//! Wire types for the chart request body.
//!
//! Every top-level member is optional at the serde level so that a missing one
//! can be reported as a validation failure (400) instead of a parse failure.

use serde::{Deserialize, Serialize};

use crate::error::{ChartError, ChartResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartRequest {
    pub patient: Option<PatientJson>,
    pub encounter: Option<EncounterJson>,
    pub observation_sets: Option<Vec<ObservationSetJson>>,
    pub location: Option<LocationJson>,
    pub trustomer: Option<TrustomerJson>,
    pub pages: Option<PageRange>,
}

/// A request with every mandatory member present.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub patient: PatientJson,
    pub encounter: EncounterJson,
    pub observation_sets: Vec<ObservationSetJson>,
    pub location: LocationJson,
    pub send_config: SendConfig,
    pub pages: Option<PageRange>,
}

impl ChartRequest {
    pub fn validate(self) -> ChartResult<ValidatedRequest> {
        fn required<T>(value: Option<T>, name: &str) -> ChartResult<T> {
            value.ok_or_else(|| ChartError::RequestValidation(format!("missing {}", name)))
        }

        Ok(ValidatedRequest {
            patient: required(self.patient, "patient")?,
            encounter: required(self.encounter, "encounter")?,
            observation_sets: required(self.observation_sets, "observation_sets")?,
            location: required(self.location, "location")?,
            send_config: required(
                self.trustomer.and_then(|t| t.send_config),
                "trustomer.send_config",
            )?,
            pages: self.pages,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub first: i64,
    #[serde(default)]
    pub last: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonJson {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
}

impl PersonJson {
    pub fn initials(&self) -> String {
        let first = self.first_name.as_deref().and_then(|n| n.chars().next());
        let last = self.last_name.as_deref().and_then(|n| n.chars().next());
        first.into_iter().chain(last).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationMetadataJson {
    #[serde(default)]
    pub gcs_eyes: Option<String>,
    #[serde(default)]
    pub gcs_motor: Option<String>,
    #[serde(default)]
    pub mask: Option<String>,
    #[serde(default)]
    pub mask_percent: Option<f64>,
    #[serde(default)]
    pub patient_position: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationJson {
    pub observation_type: String,
    #[serde(default)]
    pub measured_time: Option<String>,
    #[serde(default)]
    pub observation_metadata: Option<ObservationMetadataJson>,
    #[serde(default)]
    pub observation_string: Option<String>,
    #[serde(default)]
    pub observation_unit: Option<String>,
    #[serde(default)]
    pub observation_value: Option<f64>,
    #[serde(default)]
    pub patient_refused: Option<bool>,
    #[serde(default)]
    pub score_value: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservationSetJson {
    #[serde(default)]
    pub record_time: Option<String>,
    #[serde(default)]
    pub observations: Vec<ObservationJson>,
    #[serde(default)]
    pub monitoring_instruction: Option<String>,
    #[serde(default)]
    pub score_severity: Option<String>,
    #[serde(default)]
    pub score_string: Option<String>,
    #[serde(default)]
    pub score_system: Option<String>,
    #[serde(default)]
    pub score_value: Option<f64>,
    #[serde(default)]
    pub spo2_scale: Option<u8>,
    #[serde(default)]
    pub created_by: Option<PersonJson>,
    #[serde(default)]
    pub uuid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreSystemHistoryJson {
    #[serde(default)]
    pub changed_time: Option<String>,
    #[serde(default)]
    pub score_system: Option<String>,
    #[serde(default)]
    pub spo2_scale: Option<u8>,
    #[serde(default)]
    pub changed_by: Option<PersonJson>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientJson {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default)]
    pub hospital_number: String,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub nhs_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncounterJson {
    #[serde(default)]
    pub admitted_at: Option<String>,
    #[serde(default)]
    pub score_system_history: Vec<ScoreSystemHistoryJson>,
    #[serde(default)]
    pub epr_encounter_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationJson {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub location_type: Option<String>,
    #[serde(default)]
    pub parent: Option<Box<LocationJson>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustomerJson {
    #[serde(default)]
    pub send_config: Option<SendConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendConfig {
    #[serde(default)]
    pub bcp: BcpOverrides,
    #[serde(default)]
    pub news2: News2Config,
    #[serde(default)]
    pub nurse_concern: Vec<NurseConcern>,
    #[serde(default)]
    pub oxygen_masks: Vec<OxygenMask>,
}

/// Customer-specific overrides. Anything left `None` falls through to the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BcpOverrides {
    pub pages_front: Option<Vec<String>>,
    pub pages_back_news2: Option<Vec<String>>,
    pub pages_back_meows: Option<Vec<String>>,
    pub routine_monitoring: Option<String>,
    pub low_monitoring: Option<String>,
    pub low_medium_monitoring: Option<String>,
    pub medium_monitoring: Option<String>,
    pub high_monitoring: Option<String>,
    pub zero_severity_interval: Option<String>,
    pub low_severity_interval: Option<String>,
    pub low_medium_severity_interval: Option<String>,
    pub medium_severity_interval: Option<String>,
    pub high_severity_interval: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct News2Config {
    pub zero_severity_interval_hours: Option<f64>,
    pub low_severity_interval_hours: Option<f64>,
    pub low_medium_severity_interval_hours: Option<f64>,
    pub medium_severity_interval_hours: Option<f64>,
    pub high_severity_interval_hours: Option<f64>,
    pub escalation_policy: EscalationPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationPolicy {
    pub routine_monitoring: String,
    pub low_monitoring: String,
    pub low_medium_monitoring: String,
    pub medium_monitoring: String,
    pub high_monitoring: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NurseConcern {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OxygenMask {
    pub code: String,
    pub name: String,
}
