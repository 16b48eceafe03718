//! Display formatting for dates, times and patient identifiers.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Timelike};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn month_abbrev<D: Datelike>(date: &D) -> &'static str {
    MONTHS[date.month0() as usize]
}

/// `4 Feb 19`
pub fn format_short_date<D: Datelike>(date: &D) -> String {
    format!(
        "{} {} {:02}",
        date.day(),
        month_abbrev(date),
        date.year().rem_euclid(100)
    )
}

/// `4 Feb 2019`
pub fn format_long_date<D: Datelike>(date: &D) -> String {
    format!("{} {} {}", date.day(), month_abbrev(date), date.year())
}

/// `09:05`
pub fn format_24_hour<T: Timelike>(time: &T) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

/// Parse an ISO-8601 timestamp, keeping its own offset. A missing offset is read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed);
    }
    let naive = chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    FixedOffset::east_opt(0)?
        .from_local_datetime(&naive)
        .single()
}

/// Accepts a bare date (`1970-01-01`) or a full timestamp.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(value).map(|ts| ts.date_naive()))
}

/// Shorten to `length` characters, ending with an ellipsis when anything was cut.
pub fn word_trim(value: &str, length: usize) -> String {
    if value.chars().count() <= length {
        return value.to_string();
    }
    let kept: String = value.chars().take(length.saturating_sub(1)).collect();
    format!("{}…", kept.trim())
}

/// NHS numbers are shown in 3-3-4 groups.
pub fn group_nhs_number(value: &str) -> String {
    let digits: Vec<char> = value.chars().collect();
    if digits.len() >= 10 && digits[..10].iter().all(|c| c.is_ascii_digit()) {
        let (a, rest) = digits.split_at(3);
        let (b, rest) = rest.split_at(3);
        let (c, tail) = rest.split_at(4);
        let grouped: String = a
            .iter()
            .chain(std::iter::once(&' '))
            .chain(b)
            .chain(std::iter::once(&' '))
            .chain(c)
            .chain(tail)
            .collect();
        return grouped;
    }
    value.to_string()
}

/// Completed years between `dob` and `today`.
pub fn age_in_years(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age
}
