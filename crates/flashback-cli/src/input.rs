//! Parsing of user-typed values shared by flags and prompts.

use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

const LOCAL_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// `"work, q3,,home"` -> `["work", "q3", "home"]`
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Blank input means an empty object. Anything else must parse as a JSON
/// object.
pub fn parse_metadata(raw: Option<&str>) -> Result<Value> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    let value: Value =
        serde_json::from_str(raw).map_err(|_| anyhow!("Metadata must be valid JSON"))?;
    if !value.is_object() {
        bail!("Metadata must be a JSON object");
    }
    Ok(value)
}

/// RFC 3339, a local date-time, or a bare date (local midnight).
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in LOCAL_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return local_to_utc(naive, raw);
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return local_to_utc(midnight, raw);
    }
    bail!("unrecognised date '{raw}' (expected RFC 3339, YYYY-MM-DD HH:MM or YYYY-MM-DD)")
}

fn local_to_utc(naive: NaiveDateTime, raw: &str) -> Result<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("'{raw}' does not exist in the local time zone"))
}
