//! Common utilities: timestamp normalization, identifier derivation,
//! and small collection helpers shared across feeds and the runner.

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

/// Date-only formats accepted from feed metadata and config.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y"];

/// Parse a timestamp from the many shapes feeds report.
///
/// Accepts RFC 3339 (with `Z` or offset), a bare `YYYY-MM-DDTHH:MM:SS` /
/// `YYYY-MM-DD HH:MM:SS` (assumed UTC), or a date-only string (midnight UTC).
/// Returns `None` for anything unparseable; callers decide what a missing
/// timestamp means.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    parse_date_only(raw).and_then(|date| {
        date.and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
    })
}

/// Parse a calendar date (UTC) from config or CLI input.
pub fn parse_date_only(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Format an instant as ISO-8601 UTC with `Z` suffix and second precision.
pub fn to_iso_z(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Current instant formatted for the state document.
pub fn now_iso() -> String {
    to_iso_z(Utc::now())
}

fn slug_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_-]+").expect("valid slug pattern"))
}

/// Filesystem- and id-safe slug. Falls back when the input has no usable
/// characters at all.
pub fn slugify(value: &str, fallback: &str) -> String {
    let replaced = slug_pattern().replace_all(value.trim(), "-");
    let slug = replaced.trim_matches('-').to_lowercase();
    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug
    }
}

/// Stable short hex hash for derived identifiers.
pub fn short_hash(value: &str, length: usize) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let hex = format!("{digest:x}");
    hex[..length.min(hex.len())].to_string()
}

/// Deduplicate while preserving first-seen order, dropping blanks.
pub fn unique_strings<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    let mut output = Vec::new();
    for value in values {
        let item = value.as_ref().trim();
        if item.is_empty() || !seen.insert(item.to_string()) {
            continue;
        }
        output.push(item.to_string());
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_datetime_rfc3339_z() {
        let parsed = parse_datetime("2024-03-05T12:30:00Z").unwrap();
        assert_eq!(parsed.year(), 2024);
        assert_eq!(parsed.hour(), 12);
    }

    #[test]
    fn test_parse_datetime_offset_normalized_to_utc() {
        let parsed = parse_datetime("2024-03-05T12:30:00+02:00").unwrap();
        assert_eq!(parsed.hour(), 10);
    }

    #[test]
    fn test_parse_datetime_date_only() {
        let parsed = parse_datetime("2024-03-05").unwrap();
        assert_eq!(parsed.hour(), 0);
        assert_eq!(parsed.day(), 5);
    }

    #[test]
    fn test_parse_datetime_garbage() {
        assert!(parse_datetime("not a date").is_none());
        assert!(parse_datetime("").is_none());
    }

    #[test]
    fn test_parse_date_only_formats() {
        assert!(parse_date_only("2024-03-05").is_some());
        assert!(parse_date_only("2024/03/05").is_some());
        assert!(parse_date_only("05-03-2024").is_some());
        assert!(parse_date_only("03/05/2024 12:00").is_none());
    }

    #[test]
    fn test_to_iso_z_round_trip() {
        let now = parse_datetime("2024-03-05T12:30:00Z").unwrap();
        assert_eq!(to_iso_z(now), "2024-03-05T12:30:00Z");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("My Automation #1", "item"), "my-automation-1");
        assert_eq!(slugify("***", "item"), "item");
        assert_eq!(slugify("already-fine", "item"), "already-fine");
    }

    #[test]
    fn test_short_hash_stable() {
        let a = short_hash("archive:gp_001", 12);
        let b = short_hash("archive:gp_001", 12);
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert_ne!(a, short_hash("archive:gp_002", 12));
    }

    #[test]
    fn test_unique_strings() {
        let out = unique_strings(["a", " b ", "a", "", "c", "b"]);
        assert_eq!(out, vec!["a", "b", "c"]);
    }
}
