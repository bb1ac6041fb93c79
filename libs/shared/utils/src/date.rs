use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateError {
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid time, expected HH:MM: {0}")]
    InvalidTime(String),
}

const CANONICAL_DATE: &str = "%Y-%m-%d";

// Tried in order; the first match wins.
const FREE_FORM_DATES: &[&str] = &[
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
];

const FREE_FORM_DATETIMES: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Normalizes a date-ish string to a calendar date.
///
/// Accepts canonical `YYYY-MM-DD`, ISO-8601 timestamps (the date part is kept
/// as written, no timezone shifting), RFC 2822 and a fixed list of free-form
/// layouts. Month-first is assumed for slash-separated dates.
pub fn normalize_date(value: &str) -> Result<NaiveDate, DateError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DateError::InvalidDate(value.to_string()));
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, CANONICAL_DATE) {
        return Ok(date);
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.date_naive());
    }

    for layout in FREE_FORM_DATETIMES {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(value, layout) {
            return Ok(timestamp.date());
        }
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc2822(value) {
        return Ok(timestamp.date_naive());
    }

    for layout in FREE_FORM_DATES {
        if let Ok(date) = NaiveDate::parse_from_str(value, layout) {
            return Ok(date);
        }
    }

    debug!("Unrecognised date value: {}", value);
    Err(DateError::InvalidDate(value.to_string()))
}

/// Formats a date the way it is exchanged with clients.
pub fn format_date(date: NaiveDate) -> String {
    date.format(CANONICAL_DATE).to_string()
}

/// Parses a slot time. Only the two-digit `HH:MM` form is accepted.
pub fn parse_slot_time(value: &str) -> Result<NaiveTime, DateError> {
    let bytes = value.as_bytes();
    let well_formed = bytes.len() == 5
        && bytes[2] == b':'
        && bytes[..2].iter().chain(&bytes[3..]).all(u8::is_ascii_digit);

    if !well_formed {
        return Err(DateError::InvalidTime(value.to_string()));
    }

    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| DateError::InvalidTime(value.to_string()))
}

pub fn format_slot_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Serde adapter for `NaiveTime` fields exchanged as `HH:MM`.
pub mod hh_mm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_slot_time(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_slot_time(&raw).map_err(serde::de::Error::custom)
    }
}
