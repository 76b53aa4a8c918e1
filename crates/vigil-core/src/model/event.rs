// ── Event record domain types ──

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Who produced an event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Origin {
    System,
    Device,
    Unknown,
}

impl Origin {
    /// Parse a wire value; anything unrecognized is `Unknown`.
    pub fn from_wire(value: &str) -> Self {
        value.parse().unwrap_or(Self::Unknown)
    }
}

/// When an event happened, in the representation the source used.
///
/// Devices publish epoch milliseconds; the REST history carries ISO-8601
/// strings. Ordering goes through [`instant`](Self::instant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Millis(i64),
    Text(String),
}

impl Timestamp {
    pub fn now() -> Self {
        Self::Millis(Utc::now().timestamp_millis())
    }

    /// The parsed point in time, or `None` when the value is unreadable.
    ///
    /// All-digit strings are epoch milliseconds. Other strings are tried as
    /// RFC 3339, then as a zone-less ISO date-time taken to be UTC.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Millis(ms) => DateTime::from_timestamp_millis(*ms),
            Self::Text(text) => parse_text(text.trim()),
        }
    }
}

fn parse_text(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }
    if text.bytes().all(|b| b.is_ascii_digit()) {
        return text.parse().ok().and_then(DateTime::from_timestamp_millis);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.instant(), self) {
            (Some(instant), _) => write!(f, "{}", instant.to_rfc3339()),
            (None, Self::Millis(ms)) => write!(f, "{ms}"),
            (None, Self::Text(text)) => f.write_str(text),
        }
    }
}

/// One entry of the event feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    /// Feed identity. Server-assigned for history, generated for live events.
    pub id: String,
    pub origin: Origin,
    pub message: String,
    pub timestamp: Timestamp,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    /// Door state, reported by contact sensors only.
    pub door_open: Option<bool>,
    pub is_live: bool,
}

impl EventRecord {
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        self.timestamp.instant()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn origin_parsing_is_lenient() {
        assert_eq!(Origin::from_wire("system"), Origin::System);
        assert_eq!(Origin::from_wire("DEVICE"), Origin::Device);
        assert_eq!(Origin::from_wire("toaster"), Origin::Unknown);
        assert_eq!(Origin::Device.to_string(), "device");
    }

    #[test]
    fn millis_and_digit_strings_agree() {
        let a = Timestamp::Millis(1_700_000_000_000).instant().unwrap();
        let b = Timestamp::Text("1700000000000".into()).instant().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_rfc3339(), "2023-11-14T22:13:20+00:00");
    }

    #[test]
    fn iso_strings_parse_with_and_without_zone() {
        let zoned = Timestamp::Text("2024-06-15T10:30:00.000Z".into()).instant().unwrap();
        let naive = Timestamp::Text("2024-06-15T10:30:00".into()).instant().unwrap();
        assert_eq!(zoned, naive);
    }

    #[test]
    fn garbage_is_unparseable() {
        assert!(Timestamp::Text("yesterday-ish".into()).instant().is_none());
        assert!(Timestamp::Text(String::new()).instant().is_none());
        assert_eq!(Timestamp::Text("yesterday-ish".into()).to_string(), "yesterday-ish");
    }
}
