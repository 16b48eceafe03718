//! Typed observation readings and the three kinds of timeline entry.
//!
//! A chart column is filled from one [`TimelineEntry`]. Real observation sets hold a
//! [`Slot`] per clinical metric; score-system changes and gap markers answer every
//! metric with their own sentinel so the renderer can treat all columns uniformly.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer};

use super::format::{format_24_hour, format_short_date, parse_timestamp};
use super::request::{
    News2Config, NurseConcern, ObservationJson, ObservationSetJson, OxygenMask,
    ScoreSystemHistoryJson, SendConfig,
};

/// Mask percentage assumed when the device record carries none.
const DEFAULT_MASK_PERCENT: f64 = 21.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialValue {
    Missing,
    Refused,
    ScoreSystemChange,
    NoReadingsFor24Hours,
}

/// Either a sentinel or a real value, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    Special(SpecialValue),
    Value(T),
}

impl<T> Slot<T> {
    pub fn special(&self) -> Option<SpecialValue> {
        match self {
            Slot::Special(special) => Some(*special),
            Slot::Value(_) => None,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Slot::Special(_) => None,
            Slot::Value(value) => Some(value),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Slot<U> {
        match self {
            Slot::Special(special) => Slot::Special(special),
            Slot::Value(value) => Slot::Value(f(value)),
        }
    }
}

/// Formats a number the way it is printed on the chart: `37`, `36.6`.
pub fn format_number(value: f64) -> String {
    format!("{}", value)
}

/// One clinical value as it reaches the chart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reading {
    pub value: Option<f64>,
    pub text: Option<String>,
    /// Key into a section's background colour table. Defaults to the numeric value.
    pub colour_key: Option<String>,
    pub patient_position: Option<String>,
}

impl Reading {
    pub fn from_observation(observation: &ObservationJson) -> Self {
        let metadata = observation.observation_metadata.as_ref();
        Reading {
            value: observation.observation_value,
            text: observation.observation_string.clone(),
            colour_key: observation.observation_value.map(format_number),
            patient_position: metadata.and_then(|m| m.patient_position.clone()),
        }
    }

    pub fn numeric(value: f64) -> Self {
        Reading {
            value: Some(value),
            colour_key: Some(format_number(value)),
            ..Reading::default()
        }
    }

    /// Text shown for the reading before any display-table translation.
    pub fn display(&self) -> String {
        match (&self.text, self.value) {
            (Some(text), _) => text.clone(),
            (None, Some(value)) => format_number(value),
            (None, None) => String::new(),
        }
    }
}

/// What a chart field resolves to for one column.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartValue {
    Text(String),
    Reading(Reading),
    /// Upper and lower value of a candle plot.
    Pair {
        high: Slot<Reading>,
        low: Slot<Reading>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservationType {
    SystolicBloodPressure,
    DiastolicBloodPressure,
    Temperature,
    ConsciousnessAcvpu,
    Spo2,
    RespiratoryRate,
    HeartRate,
    O2TherapyStatus,
    NurseConcern,
}

impl ObservationType {
    pub const ALL: [ObservationType; 9] = [
        ObservationType::SystolicBloodPressure,
        ObservationType::DiastolicBloodPressure,
        ObservationType::Temperature,
        ObservationType::ConsciousnessAcvpu,
        ObservationType::Spo2,
        ObservationType::RespiratoryRate,
        ObservationType::HeartRate,
        ObservationType::O2TherapyStatus,
        ObservationType::NurseConcern,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationType::SystolicBloodPressure => "systolic_blood_pressure",
            ObservationType::DiastolicBloodPressure => "diastolic_blood_pressure",
            ObservationType::Temperature => "temperature",
            ObservationType::ConsciousnessAcvpu => "consciousness_acvpu",
            ObservationType::Spo2 => "spo2",
            ObservationType::RespiratoryRate => "respiratory_rate",
            ObservationType::HeartRate => "heart_rate",
            ObservationType::O2TherapyStatus => "o2_therapy_status",
            ObservationType::NurseConcern => "nurse_concern",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitoringInstruction {
    Routine,
    Low,
    LowMedium,
    Medium,
    High,
}

impl MonitoringInstruction {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "routine_monitoring" => Some(MonitoringInstruction::Routine),
            "low_monitoring" => Some(MonitoringInstruction::Low),
            "low_medium_monitoring" => Some(MonitoringInstruction::LowMedium),
            "medium_monitoring" => Some(MonitoringInstruction::Medium),
            "high_monitoring" => Some(MonitoringInstruction::High),
            _ => None,
        }
    }

    /// Review interval in hours for this tier.
    pub fn interval_hours(&self, news2: &News2Config) -> Option<f64> {
        match self {
            MonitoringInstruction::Routine => news2.zero_severity_interval_hours,
            MonitoringInstruction::Low => news2.low_severity_interval_hours,
            MonitoringInstruction::LowMedium => news2.low_medium_severity_interval_hours,
            MonitoringInstruction::Medium => news2.medium_severity_interval_hours,
            MonitoringInstruction::High => news2.high_severity_interval_hours,
        }
    }
}

/// Fields a chart section can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartField {
    Date,
    Time,
    Initials,
    TopSection,
    Observation(ObservationType),
    BloodPressure,
    Spo2Scale1,
    Spo2Scale2Air,
    Spo2Scale2O2,
    Air,
    O2PerMin,
    O2Device,
    Acvpu,
    EwsTotal,
    EscalationOfCare,
    MonitoringFrequency,
    NurseConcern,
}

impl ChartField {
    const NAMED: [(&'static str, ChartField); 16] = [
        ("date", ChartField::Date),
        ("time", ChartField::Time),
        ("initials", ChartField::Initials),
        ("topSection", ChartField::TopSection),
        ("bloodPressure", ChartField::BloodPressure),
        ("spo2_scale_1", ChartField::Spo2Scale1),
        ("spo2_scale_2_air", ChartField::Spo2Scale2Air),
        ("spo2_scale_2_o2", ChartField::Spo2Scale2O2),
        ("air", ChartField::Air),
        ("o2PerMin", ChartField::O2PerMin),
        ("o2Device", ChartField::O2Device),
        ("acvpu", ChartField::Acvpu),
        ("ewsTotal", ChartField::EwsTotal),
        ("escalationOfCare", ChartField::EscalationOfCare),
        ("monitoringFrequency", ChartField::MonitoringFrequency),
        ("nurseConcern", ChartField::NurseConcern),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartField::Observation(kind) => kind.as_str(),
            other => Self::NAMED
                .iter()
                .find(|(_, field)| field == other)
                .map(|(name, _)| *name)
                .unwrap_or(""),
        }
    }

    /// Date, time and initials stay visible on columns that carry a full-height message.
    pub fn is_column_header(&self) -> bool {
        matches!(self, ChartField::Date | ChartField::Time | ChartField::Initials)
    }
}

impl FromStr for ChartField {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::NAMED
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, field)| *field)
            .or_else(|| ObservationType::parse(name).map(ChartField::Observation))
            .ok_or_else(|| format!("unknown chart field '{}'", name))
    }
}

impl fmt::Display for ChartField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChartField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Lower-cased words joined by `_`, ignoring the word "or" and any punctuation.
pub fn canonical_nurse_concern(concern: &str) -> String {
    concern
        .to_lowercase()
        .replace(" or ", " ")
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

fn lookup_concern(table: &[NurseConcern], concern: &str) -> Option<String> {
    let wanted = canonical_nurse_concern(concern);
    table
        .iter()
        .find(|entry| canonical_nurse_concern(&entry.name) == wanted)
        .map(|entry| entry.code.clone())
}

/// Maps the recorded concern text to table codes. Lists are matched item by item, unknown items show as `?`.
pub fn nurse_concern_codes(table: &[NurseConcern], concern: &str) -> String {
    if let Some(code) = lookup_concern(table, concern) {
        return code;
    }
    if concern.contains(',') {
        return concern
            .split(',')
            .map(|name| lookup_concern(table, name).unwrap_or_else(|| "?".to_string()))
            .collect::<Vec<_>>()
            .join(", ");
    }
    "?".to_string()
}

fn oxygen_device(masks: &[OxygenMask], o2: &Slot<Reading>, raw: Option<&ObservationJson>) -> String {
    if o2.special().is_some() {
        return String::new();
    }
    let Some(metadata) = raw.and_then(|o| o.observation_metadata.as_ref()) else {
        return String::new();
    };
    let mask = metadata
        .mask
        .as_deref()
        .filter(|m| !m.is_empty())
        .unwrap_or("unknown");
    match masks.iter().find(|m| m.name.eq_ignore_ascii_case(mask)) {
        Some(mapped) => {
            let percent = metadata.mask_percent.unwrap_or(DEFAULT_MASK_PERCENT);
            mapped
                .code
                .replace("{mask_percent}", &format_number(percent))
        }
        None => mask.to_string(),
    }
}

/// Readings keyed by observation type.
#[derive(Debug, Clone, PartialEq)]
pub struct Readings([Slot<Reading>; 9]);

impl Readings {
    fn filled(special: SpecialValue) -> Self {
        Readings(std::array::from_fn(|_| Slot::Special(special)))
    }

    pub fn get(&self, kind: ObservationType) -> &Slot<Reading> {
        &self.0[kind.index()]
    }

    fn set(&mut self, kind: ObservationType, slot: Slot<Reading>) {
        self.0[kind.index()] = slot;
    }
}

/// One bundle of readings taken together.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationSet {
    pub record_time: Option<DateTime<FixedOffset>>,
    pub score_system: String,
    pub spo2_scale: Option<u8>,
    pub score_value: Option<f64>,
    pub score_severity: Option<String>,
    pub monitoring_instruction: String,
    pub monitoring_frequency: Option<f64>,
    pub initials: String,
    pub readings: Readings,
    o2_device: String,
    nurse_concern: String,
}

impl ObservationSet {
    pub fn from_json(json: &ObservationSetJson, send_config: &SendConfig) -> Self {
        let mut readings = Readings::filled(SpecialValue::Missing);
        let mut o2_raw = None;
        for observation in &json.observations {
            let Some(kind) = ObservationType::parse(&observation.observation_type) else {
                continue;
            };
            let slot = if observation.patient_refused == Some(true) {
                Slot::Special(SpecialValue::Refused)
            } else {
                Slot::Value(Reading::from_observation(observation))
            };
            if kind == ObservationType::O2TherapyStatus {
                o2_raw = Some(observation);
            }
            readings.set(kind, slot);
        }

        let monitoring_instruction = json.monitoring_instruction.clone().unwrap_or_default();
        let monitoring_frequency = MonitoringInstruction::parse(&monitoring_instruction)
            .and_then(|tier| tier.interval_hours(&send_config.news2));

        let o2_device = oxygen_device(
            &send_config.oxygen_masks,
            readings.get(ObservationType::O2TherapyStatus),
            o2_raw,
        );
        let nurse_concern = match readings.get(ObservationType::NurseConcern) {
            Slot::Value(reading) => nurse_concern_codes(
                &send_config.nurse_concern,
                reading.text.as_deref().unwrap_or(""),
            ),
            Slot::Special(_) => String::new(),
        };

        ObservationSet {
            record_time: json.record_time.as_deref().and_then(parse_timestamp),
            score_system: json.score_system.clone().unwrap_or_default(),
            spo2_scale: json.spo2_scale,
            score_value: json.score_value,
            score_severity: json.score_severity.clone(),
            monitoring_instruction,
            monitoring_frequency,
            initials: json
                .created_by
                .as_ref()
                .map(|person| person.initials())
                .unwrap_or_default(),
            readings,
            o2_device,
            nurse_concern,
        }
    }

    pub fn reading(&self, kind: ObservationType) -> &Slot<Reading> {
        self.readings.get(kind)
    }

    pub fn o2_device(&self) -> &str {
        &self.o2_device
    }

    pub fn is_oxygen(&self) -> bool {
        !self.o2_device.is_empty() && self.o2_device != "RA"
    }

    /// A real reading with no numeric value counts as missing for plotting.
    fn plottable(&self, kind: ObservationType) -> Slot<Reading> {
        match self.reading(kind) {
            Slot::Value(reading) if reading.value.is_none() => Slot::Special(SpecialValue::Missing),
            other => other.clone(),
        }
    }

    pub fn bp(&self) -> (Slot<f64>, Slot<f64>) {
        let numeric = |kind| match self.plottable(kind) {
            Slot::Value(reading) => reading.value.map_or(Slot::Special(SpecialValue::Missing), Slot::Value),
            Slot::Special(special) => Slot::Special(special),
        };
        (
            numeric(ObservationType::SystolicBloodPressure),
            numeric(ObservationType::DiastolicBloodPressure),
        )
    }

    fn spo2_when(&self, routed: bool) -> Slot<ChartValue> {
        if routed {
            self.reading(ObservationType::Spo2).clone().map(ChartValue::Reading)
        } else {
            Slot::Special(SpecialValue::Missing)
        }
    }

    fn ews_total(&self) -> Reading {
        match self.score_value {
            Some(score) => Reading {
                value: None,
                text: Some(format_number(score)),
                colour_key: self.score_severity.clone(),
                patient_position: None,
            },
            None => Reading::default(),
        }
    }

    pub fn field(&self, field: ChartField) -> Option<Slot<ChartValue>> {
        let text = |s: String| Some(Slot::Value(ChartValue::Text(s)));
        match field {
            ChartField::Date => self
                .record_time
                .map(|t| Slot::Value(ChartValue::Text(format_short_date(&t)))),
            ChartField::Time => self
                .record_time
                .map(|t| Slot::Value(ChartValue::Text(format_24_hour(&t)))),
            ChartField::Initials => text(self.initials.clone()),
            ChartField::TopSection => text(String::new()),
            ChartField::Observation(kind) => {
                Some(self.reading(kind).clone().map(ChartValue::Reading))
            }
            ChartField::Acvpu => Some(
                self.reading(ObservationType::ConsciousnessAcvpu)
                    .clone()
                    .map(ChartValue::Reading),
            ),
            ChartField::BloodPressure => Some(Slot::Value(ChartValue::Pair {
                high: self.plottable(ObservationType::SystolicBloodPressure),
                low: self.plottable(ObservationType::DiastolicBloodPressure),
            })),
            ChartField::Spo2Scale1 => Some(self.spo2_when(self.spo2_scale == Some(1))),
            ChartField::Spo2Scale2Air => {
                Some(self.spo2_when(self.spo2_scale == Some(2) && !self.is_oxygen()))
            }
            ChartField::Spo2Scale2O2 => {
                Some(self.spo2_when(self.spo2_scale == Some(2) && self.is_oxygen()))
            }
            ChartField::Air => Some(
                self.reading(ObservationType::O2TherapyStatus)
                    .clone()
                    .map(|r| ChartValue::Text(if r.value == Some(0.0) { "A".into() } else { String::new() })),
            ),
            ChartField::O2PerMin => Some(
                self.reading(ObservationType::O2TherapyStatus)
                    .clone()
                    .map(|r| {
                        ChartValue::Text(match r.value {
                            Some(v) if v != 0.0 => format_number(v),
                            _ => String::new(),
                        })
                    }),
            ),
            ChartField::O2Device => text(self.o2_device.clone()),
            ChartField::EwsTotal => Some(Slot::Value(ChartValue::Reading(self.ews_total()))),
            ChartField::EscalationOfCare => text(self.monitoring_instruction.clone()),
            ChartField::MonitoringFrequency => {
                text(self.monitoring_frequency.map(format_number).unwrap_or_default())
            }
            ChartField::NurseConcern => text(self.nurse_concern.clone()),
        }
    }
}

/// A recorded or inferred switch of scoring scheme or SpO2 scale.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSystemChangeEvent {
    pub changed_time: Option<DateTime<FixedOffset>>,
    pub score_system: String,
    pub spo2_scale: Option<u8>,
    pub initials: String,
}

impl ScoreSystemChangeEvent {
    pub fn from_history(json: &ScoreSystemHistoryJson) -> Self {
        ScoreSystemChangeEvent {
            changed_time: json.changed_time.as_deref().and_then(parse_timestamp),
            score_system: json.score_system.clone().unwrap_or_default(),
            spo2_scale: json.spo2_scale,
            initials: json
                .changed_by
                .as_ref()
                .map(|person| person.initials())
                .unwrap_or_default(),
        }
    }

    /// Stands in for a change nobody recorded.
    pub fn synthetic(score_system: &str, spo2_scale: u8) -> Self {
        ScoreSystemChangeEvent {
            changed_time: None,
            score_system: score_system.to_string(),
            spo2_scale: Some(spo2_scale),
            initials: String::new(),
        }
    }
}

/// No observations for more than a day. Keeps the scale in force for banding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapMarker {
    pub spo2_scale: Option<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEntry {
    Observation(ObservationSet),
    ScoreSystemChange(ScoreSystemChangeEvent),
    Gap(GapMarker),
}

impl TimelineEntry {
    /// The sentinel a marker column stands for. Real observation sets have none.
    pub fn marker(&self) -> Option<SpecialValue> {
        match self {
            TimelineEntry::Observation(_) => None,
            TimelineEntry::ScoreSystemChange(_) => Some(SpecialValue::ScoreSystemChange),
            TimelineEntry::Gap(_) => Some(SpecialValue::NoReadingsFor24Hours),
        }
    }

    pub fn score_system(&self) -> &str {
        match self {
            TimelineEntry::Observation(set) => &set.score_system,
            TimelineEntry::ScoreSystemChange(event) => &event.score_system,
            TimelineEntry::Gap(_) => "",
        }
    }

    pub fn spo2_scale(&self) -> Option<u8> {
        match self {
            TimelineEntry::Observation(set) => set.spo2_scale,
            TimelineEntry::ScoreSystemChange(event) => event.spo2_scale,
            TimelineEntry::Gap(gap) => gap.spo2_scale,
        }
    }

    fn formatted(&self, format: fn(&DateTime<FixedOffset>) -> String) -> Option<Slot<String>> {
        match self {
            TimelineEntry::Observation(set) => set.record_time.map(|t| Slot::Value(format(&t))),
            TimelineEntry::ScoreSystemChange(event) => Some(Slot::Value(
                event.changed_time.map(|t| format(&t)).unwrap_or_default(),
            )),
            TimelineEntry::Gap(_) => Some(Slot::Special(SpecialValue::NoReadingsFor24Hours)),
        }
    }

    /// `None` for an observation set without a usable record time.
    pub fn date(&self) -> Option<Slot<String>> {
        self.formatted(|t| format_short_date(t))
    }

    pub fn time(&self) -> Option<Slot<String>> {
        self.formatted(|t| format_24_hour(t))
    }

    pub fn bp(&self) -> (Slot<f64>, Slot<f64>) {
        match (self, self.marker()) {
            (TimelineEntry::Observation(set), _) => set.bp(),
            (_, Some(marker)) => (Slot::Special(marker), Slot::Special(marker)),
            (_, None) => (
                Slot::Special(SpecialValue::Missing),
                Slot::Special(SpecialValue::Missing),
            ),
        }
    }

    pub fn reading(&self, kind: ObservationType) -> Slot<Reading> {
        match (self, self.marker()) {
            (TimelineEntry::Observation(set), _) => set.reading(kind).clone(),
            (_, Some(marker)) => Slot::Special(marker),
            (_, None) => Slot::Special(SpecialValue::Missing),
        }
    }

    pub fn initials(&self) -> &str {
        match self {
            TimelineEntry::Observation(set) => &set.initials,
            TimelineEntry::ScoreSystemChange(event) => &event.initials,
            TimelineEntry::Gap(_) => "",
        }
    }

    /// Resolve a chart field for this column. `None` means there is nothing to draw.
    pub fn field(&self, field: ChartField) -> Option<Slot<ChartValue>> {
        if let TimelineEntry::Observation(set) = self {
            return set.field(field);
        }
        match field {
            ChartField::Date => self.date().map(|slot| slot.map(ChartValue::Text)),
            ChartField::Time => self.time().map(|slot| slot.map(ChartValue::Text)),
            ChartField::Initials => Some(Slot::Value(ChartValue::Text(self.initials().to_string()))),
            _ => self.marker().map(Slot::Special),
        }
    }
}
