//! Patient, encounter and location fields printed on page headers and front pages.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Europe::London;
use chrono_tz::Tz;

use super::format::{
    age_in_years, format_24_hour, format_long_date, group_nhs_number, parse_date, word_trim,
};
use super::observation::format_number;
use super::request::{EncounterJson, LocationJson, NurseConcern, PatientJson, SendConfig};

const SNOMED_MALE: &str = "248153007";
const SNOMED_FEMALE: &str = "248152002";
const SNOMED_INDETERMINATE: &str = "32570681000036106";
const SNOMED_WARD: &str = "225746001";

const FULL_NAME_LENGTH: usize = 64;
const FULL_NAME_LONG_LENGTH: usize = 102;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatientField {
    /// Prints the layout field's own `text`.
    Text,
    FullName,
    FullNameLong,
    Gender,
    ShortGender,
    NameWithGender,
    Dob,
    Age,
    DobWithAge,
    HospitalNumber,
    NhsNumber,
    AdmissionDate,
    Ward,
    PageNumber,
    PageDate,
    RoutineMonitoring,
    LowMonitoring,
    LowMediumMonitoring,
    MediumMonitoring,
    HighMonitoring,
    ZeroSeverityInterval,
    LowSeverityInterval,
    LowMediumSeverityInterval,
    MediumSeverityInterval,
    HighSeverityInterval,
    SvgLogo,
    /// Only meaningful for table fields.
    NurseConcern,
}

impl PatientField {
    const NAMES: [(&'static str, PatientField); 27] = [
        ("text", PatientField::Text),
        ("fullName", PatientField::FullName),
        ("fullNameLong", PatientField::FullNameLong),
        ("gender", PatientField::Gender),
        ("shortGender", PatientField::ShortGender),
        ("nameWithGender", PatientField::NameWithGender),
        ("dob", PatientField::Dob),
        ("age", PatientField::Age),
        ("dobWithAge", PatientField::DobWithAge),
        ("hospital_number", PatientField::HospitalNumber),
        ("nhs_number", PatientField::NhsNumber),
        ("admissionDate", PatientField::AdmissionDate),
        ("ward", PatientField::Ward),
        ("pageNumber", PatientField::PageNumber),
        ("pageDate", PatientField::PageDate),
        ("routineMonitoring", PatientField::RoutineMonitoring),
        ("lowMonitoring", PatientField::LowMonitoring),
        ("lowMediumMonitoring", PatientField::LowMediumMonitoring),
        ("mediumMonitoring", PatientField::MediumMonitoring),
        ("highMonitoring", PatientField::HighMonitoring),
        ("zeroSeverityInterval", PatientField::ZeroSeverityInterval),
        ("lowSeverityInterval", PatientField::LowSeverityInterval),
        ("lowMediumSeverityInterval", PatientField::LowMediumSeverityInterval),
        ("mediumSeverityInterval", PatientField::MediumSeverityInterval),
        ("highSeverityInterval", PatientField::HighSeverityInterval),
        ("svgLogo", PatientField::SvgLogo),
        ("nurse_concern", PatientField::NurseConcern),
    ];

    pub fn as_str(&self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(_, field)| field == self)
            .map(|(name, _)| *name)
            .unwrap_or("")
    }
}

impl FromStr for PatientField {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, field)| *field)
            .ok_or_else(|| format!("unknown patient field '{}'", name))
    }
}

impl fmt::Display for PatientField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the basic pages print about the patient, resolved once per request.
#[derive(Debug, Clone)]
pub struct PatientModel {
    pub patient: PatientJson,
    pub epr_encounter_id: String,
    /// Sorted by code for the nurse concern table.
    pub nurse_concern: Vec<NurseConcern>,
    dob: Option<NaiveDate>,
    admitted_at: Option<NaiveDate>,
    ward: String,
    send_config: SendConfig,
    logo: PathBuf,
    /// Wall-clock time in Europe/London.
    created_at: DateTime<Tz>,
}

impl PatientModel {
    /// `created_at` is stamped on every page in UK time, whatever the host's zone.
    pub fn new(
        patient: &PatientJson,
        encounter: &EncounterJson,
        location: &LocationJson,
        send_config: &SendConfig,
        logo: PathBuf,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut nurse_concern = send_config.nurse_concern.clone();
        nurse_concern.sort_by(|a, b| a.code.cmp(&b.code));

        PatientModel {
            patient: patient.clone(),
            epr_encounter_id: encounter.epr_encounter_id.clone().unwrap_or_default(),
            nurse_concern,
            dob: patient.dob.as_deref().and_then(parse_date),
            admitted_at: encounter.admitted_at.as_deref().and_then(parse_date),
            ward: ward_name(location),
            send_config: send_config.clone(),
            logo,
            created_at: created_at.with_timezone(&London),
        }
    }

    pub fn hospital_number(&self) -> &str {
        &self.patient.hospital_number
    }

    fn full_name(&self, length: usize) -> String {
        word_trim(
            &format!(
                "{}, {}",
                self.patient.last_name.to_uppercase(),
                self.patient.first_name
            ),
            length,
        )
    }

    fn gender(&self) -> &'static str {
        match self.patient.sex.as_deref() {
            Some(SNOMED_MALE) => "Male",
            Some(SNOMED_FEMALE) => "Female",
            Some(SNOMED_INDETERMINATE) => "Indeterminate",
            _ => "Unknown",
        }
    }

    fn short_gender(&self) -> &'static str {
        match self.patient.sex.as_deref() {
            Some(SNOMED_MALE) => "M",
            Some(SNOMED_FEMALE) => "F",
            Some(SNOMED_INDETERMINATE) => "I",
            _ => "U",
        }
    }

    fn age(&self) -> String {
        self.dob
            .map(|dob| age_in_years(dob, self.created_at.date_naive()).to_string())
            .unwrap_or_default()
    }

    fn escalation(&self, bcp: &Option<String>, policy: &str) -> String {
        match bcp {
            Some(text) if !text.is_empty() => text.clone(),
            _ => policy.to_string(),
        }
    }

    fn interval(&self, bcp: &Option<String>, hours: Option<f64>) -> String {
        match bcp {
            Some(text) if !text.is_empty() => text.clone(),
            _ => hours.map(format_number).unwrap_or_default(),
        }
    }

    /// Text for a header field. `page_number` is the document page being drawn.
    pub fn field(&self, field: PatientField, page_number: usize) -> String {
        let bcp = &self.send_config.bcp;
        let news2 = &self.send_config.news2;
        let policy = &news2.escalation_policy;
        match field {
            PatientField::Text | PatientField::NurseConcern => String::new(),
            PatientField::FullName => self.full_name(FULL_NAME_LENGTH),
            PatientField::FullNameLong => self.full_name(FULL_NAME_LONG_LENGTH),
            PatientField::Gender => self.gender().to_string(),
            PatientField::ShortGender => self.short_gender().to_string(),
            PatientField::NameWithGender => {
                format!("{} ({})", self.full_name(FULL_NAME_LENGTH), self.short_gender())
            }
            PatientField::Dob => self.dob.map(|d| format_long_date(&d)).unwrap_or_default(),
            PatientField::Age => self.age(),
            PatientField::DobWithAge => match self.dob {
                Some(dob) => format!("{} ({}y)", format_long_date(&dob), self.age()),
                None => String::new(),
            },
            PatientField::HospitalNumber => self.patient.hospital_number.clone(),
            PatientField::NhsNumber => self
                .patient
                .nhs_number
                .as_deref()
                .map(group_nhs_number)
                .unwrap_or_default(),
            PatientField::AdmissionDate => self
                .admitted_at
                .map(|d| format_long_date(&d))
                .unwrap_or_default(),
            PatientField::Ward => self.ward.clone(),
            PatientField::PageNumber => page_number.to_string(),
            PatientField::PageDate => format!(
                "Document created on {} at {}",
                self.created_at.format("%d/%m/%Y"),
                format_24_hour(&self.created_at)
            ),
            PatientField::RoutineMonitoring => {
                self.escalation(&bcp.routine_monitoring, &policy.routine_monitoring)
            }
            PatientField::LowMonitoring => {
                self.escalation(&bcp.low_monitoring, &policy.low_monitoring)
            }
            PatientField::LowMediumMonitoring => {
                self.escalation(&bcp.low_medium_monitoring, &policy.low_medium_monitoring)
            }
            PatientField::MediumMonitoring => {
                self.escalation(&bcp.medium_monitoring, &policy.medium_monitoring)
            }
            PatientField::HighMonitoring => {
                self.escalation(&bcp.high_monitoring, &policy.high_monitoring)
            }
            PatientField::ZeroSeverityInterval => {
                self.interval(&bcp.zero_severity_interval, news2.zero_severity_interval_hours)
            }
            PatientField::LowSeverityInterval => {
                self.interval(&bcp.low_severity_interval, news2.low_severity_interval_hours)
            }
            PatientField::LowMediumSeverityInterval => self.interval(
                &bcp.low_medium_severity_interval,
                news2.low_medium_severity_interval_hours,
            ),
            PatientField::MediumSeverityInterval => self.interval(
                &bcp.medium_severity_interval,
                news2.medium_severity_interval_hours,
            ),
            PatientField::HighSeverityInterval => {
                self.interval(&bcp.high_severity_interval, news2.high_severity_interval_hours)
            }
            PatientField::SvgLogo => self.logo.display().to_string(),
        }
    }
}

/// Customer logo if one exists, otherwise the shared default.
pub fn logo_path(logos_dir: &Path, customer_code: &str) -> PathBuf {
    let customer = logos_dir.join(format!("{}.svg", customer_code));
    if customer.is_file() {
        customer
    } else {
        logos_dir.join("DEFAULT.svg")
    }
}

/// Walk up the location tree to the first ward.
fn ward_name(location: &LocationJson) -> String {
    let mut current = location;
    while current.location_type.as_deref() != Some(SNOMED_WARD) {
        match &current.parent {
            Some(parent) => current = parent,
            None => break,
        }
    }
    current.display_name.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::request::{BcpOverrides, News2Config};

    fn model(patient: PatientJson, send_config: SendConfig) -> PatientModel {
        let created_at = NaiveDate::from_ymd_opt(2020, 3, 9)
            .and_then(|d| d.and_hms_opt(14, 5, 0))
            .unwrap()
            .and_utc();
        model_at(patient, send_config, created_at)
    }

    fn model_at(patient: PatientJson, send_config: SendConfig, created_at: DateTime<Utc>) -> PatientModel {
        let location = LocationJson {
            display_name: "Bed 4".into(),
            location_type: Some("229772003".into()),
            parent: Some(Box::new(LocationJson {
                display_name: "Ward 7C".into(),
                location_type: Some(SNOMED_WARD.into()),
                parent: Some(Box::new(LocationJson {
                    display_name: "John Radcliffe".into(),
                    location_type: Some("22232009".into()),
                    parent: None,
                })),
            })),
        };
        let encounter = EncounterJson {
            admitted_at: Some("2019-01-31T09:00:00.000Z".into()),
            epr_encounter_id: Some("1234".into()),
            ..EncounterJson::default()
        };
        PatientModel::new(
            &patient,
            &encounter,
            &location,
            &send_config,
            PathBuf::from("config/logos/DEFAULT.svg"),
            created_at,
        )
    }

    fn patient() -> PatientJson {
        PatientJson {
            first_name: "Jane".into(),
            last_name: "Foster".into(),
            dob: Some("1980-03-10".into()),
            hospital_number: "MRN123".into(),
            sex: Some(SNOMED_FEMALE.into()),
            nhs_number: Some("4857773456".into()),
        }
    }

    #[test]
    fn test_name_and_gender() {
        let m = model(patient(), SendConfig::default());
        assert_eq!(m.field(PatientField::FullName, 1), "FOSTER, Jane");
        assert_eq!(m.field(PatientField::NameWithGender, 1), "FOSTER, Jane (F)");
        assert_eq!(m.field(PatientField::Gender, 1), "Female");
    }

    #[test]
    fn test_dates_and_age() {
        let m = model(patient(), SendConfig::default());
        assert_eq!(m.field(PatientField::Dob, 1), "10 Mar 1980");
        assert_eq!(m.field(PatientField::DobWithAge, 1), "10 Mar 1980 (39y)");
        assert_eq!(m.field(PatientField::AdmissionDate, 1), "31 Jan 2019");
        assert_eq!(
            m.field(PatientField::PageDate, 1),
            "Document created on 09/03/2020 at 14:05"
        );
    }

    #[test]
    fn test_page_date_is_uk_time() {
        let summer_night = NaiveDate::from_ymd_opt(2019, 6, 1)
            .and_then(|d| d.and_hms_opt(23, 30, 0))
            .unwrap()
            .and_utc();
        let m = model_at(patient(), SendConfig::default(), summer_night);
        assert_eq!(
            m.field(PatientField::PageDate, 1),
            "Document created on 02/06/2019 at 00:30"
        );

        let winter = NaiveDate::from_ymd_opt(2019, 12, 1)
            .and_then(|d| d.and_hms_opt(23, 30, 0))
            .unwrap()
            .and_utc();
        let m = model_at(patient(), SendConfig::default(), winter);
        assert_eq!(
            m.field(PatientField::PageDate, 1),
            "Document created on 01/12/2019 at 23:30"
        );
    }

    #[test]
    fn test_ward_and_identifiers() {
        let m = model(patient(), SendConfig::default());
        assert_eq!(m.field(PatientField::Ward, 1), "Ward 7C");
        assert_eq!(m.field(PatientField::NhsNumber, 1), "485 777 3456");
        assert_eq!(m.field(PatientField::PageNumber, 3), "3");
    }

    #[test]
    fn test_bcp_overrides_win() {
        let mut config = SendConfig {
            news2: News2Config {
                high_severity_interval_hours: Some(0.5),
                low_severity_interval_hours: Some(4.0),
                ..News2Config::default()
            },
            bcp: BcpOverrides {
                high_severity_interval: Some("continuous".into()),
                ..BcpOverrides::default()
            },
            ..SendConfig::default()
        };
        config.news2.escalation_policy.low_monitoring = "Inform nurse in charge".into();
        let m = model(patient(), config);

        assert_eq!(m.field(PatientField::HighSeverityInterval, 1), "continuous");
        assert_eq!(m.field(PatientField::LowSeverityInterval, 1), "4");
        assert_eq!(m.field(PatientField::LowMonitoring, 1), "Inform nurse in charge");
        assert_eq!(m.field(PatientField::ZeroSeverityInterval, 1), "");
    }

    #[test]
    fn test_unknown_field_name() {
        assert!("shoeSize".parse::<PatientField>().is_err());
        assert_eq!("svgLogo".parse::<PatientField>(), Ok(PatientField::SvgLogo));
    }
}
