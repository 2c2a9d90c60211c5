//! Timestamp normalization for material metadata.
//!
//! The material master reports change dates either as ISO-8601 strings (with or
//! without an offset) or in the `/Date(<millis>)/` form. BOM documents want
//! `dd/mm/YYYY HH:MM:SS.ffffff` in UTC.

use std::sync::LazyLock;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use regex::Regex;
use tracing::warn;

/// Output format of every normalized timestamp.
pub const BOM_DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S%.6f";

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a raw timestamp into a naive UTC value.
///
/// Returns `None` for anything unrecognized.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    static MILLIS_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^/Date\((-?\d+)(?:[+-]\d{4})?\)/$").expect("valid regex")
    });

    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    // The offset suffix of the millis form is informational; the value is UTC.
    if let Some(caps) = MILLIS_RE.captures(raw) {
        let millis: i64 = caps[1].parse().ok()?;
        return DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Format a parsed timestamp the way BOM documents expect it.
pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(BOM_DATE_FORMAT).to_string()
}

/// Normalize a raw timestamp, falling back to the current local time when it is
/// absent or unparseable.
pub fn normalize_timestamp(raw: Option<&str>) -> String {
    match raw.map(|r| (r, parse_timestamp(r))) {
        Some((_, Some(parsed))) => format_timestamp(&parsed),
        Some((raw, None)) => {
            warn!(raw, "unrecognized timestamp, using current time");
            format_timestamp(&Local::now().naive_local())
        }
        None => format_timestamp(&Local::now().naive_local()),
    }
}
