//! Diabetes datum vocabulary and fetch-window arithmetic.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;

/// Datum types that count as diabetes data when anchoring the fetch window.
/// Uploads and pump settings are deliberately excluded: a recent upload of
/// old data must not drag the window forward.
pub const DIABETES_DATA_TYPES: [&str; 6] = ["cbg", "smbg", "basal", "bolus", "wizard", "food"];

/// Types requested by the latest-per-type probe ahead of the window fetch.
pub const LATEST_PROBE_TYPES: [&str; 8] = [
    "cbg",
    "smbg",
    "basal",
    "bolus",
    "wizard",
    "food",
    "pumpSettings",
    "upload",
];

/// Days of history fetched before the window anchor.
pub const WINDOW_DAYS_BACK: i64 = 30;
/// Days past the anchor covered by the window, absorbing clock skew between
/// devices and the server.
pub const WINDOW_DAYS_FORWARD: i64 = 1;

/// RFC 3339 with millisecond precision, the backend's timestamp format.
pub fn format_utc(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `time` field of a datum, if present and parseable.
pub fn datum_time(datum: &Value) -> Option<DateTime<Utc>> {
    let raw = datum.get("time")?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Most recent `time` among the diabetes datum types in `data`.
pub fn latest_diabetes_datum_time(data: &[Value]) -> Option<DateTime<Utc>> {
    data.iter()
        .filter(|datum| {
            datum
                .get("type")
                .and_then(Value::as_str)
                .is_some_and(|t| DIABETES_DATA_TYPES.contains(&t))
        })
        .filter_map(datum_time)
        .max()
}

/// The latest `pumpSettings` datum in a probe result, if any.
pub fn latest_pump_settings(data: &[Value]) -> Option<&Value> {
    data.iter()
        .filter(|datum| {
            datum.get("type").and_then(Value::as_str) == Some("pumpSettings")
        })
        .max_by_key(|datum| datum_time(datum))
}

/// Date range of a patient-data fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FetchWindow {
    /// Window anchored at a reference instant: the latest diabetes datum
    /// time, or server time when the account has no data yet.
    pub fn anchored(reference: DateTime<Utc>) -> Self {
        FetchWindow {
            start: reference - Duration::days(WINDOW_DAYS_BACK),
            end: reference + Duration::days(WINDOW_DAYS_FORWARD),
        }
    }

    pub fn start_str(&self) -> String {
        format_utc(self.start)
    }

    pub fn end_str(&self) -> String {
        format_utc(self.end)
    }
}
