//! Timestamp ordering for the log store
//!
//! Producers report event time as free-form strings. `Lexicographic` compares those
//! strings byte-wise, which is what existing producers rely on (fixed-width,
//! zero-padded, single timezone). `Chronological` parses the common formats and
//! compares instants, falling back to the raw string for anything unparseable.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Naive formats accepted in chronological mode, interpreted as UTC
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// How record timestamps are compared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampOrdering {
    /// Byte-wise string comparison
    #[default]
    Lexicographic,
    /// Parsed instant comparison; unparseable timestamps sort first
    Chronological,
}

/// Sort key derived from a record timestamp
///
/// Field order matters: the derived `Ord` compares `instant` first, so `None`
/// (unparsed) keys precede every parsed instant and fall back to `raw` among
/// themselves.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderKey {
    instant: Option<i64>,
    raw: String,
}

impl OrderKey {
    /// The raw timestamp this key was derived from
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Parsed instant in microseconds since epoch, if any
    pub fn instant_micros(&self) -> Option<i64> {
        self.instant
    }
}

impl TimestampOrdering {
    /// Build the sort key for a timestamp string
    pub fn key(&self, timestamp: &str) -> OrderKey {
        let instant = match self {
            TimestampOrdering::Lexicographic => None,
            TimestampOrdering::Chronological => parse_timestamp_micros(timestamp),
        };
        OrderKey {
            instant,
            raw: timestamp.to_string(),
        }
    }
}

/// Parse RFC 3339 or `YYYY-MM-DD HH:MM:SS[.fff]` (UTC) into epoch microseconds
pub fn parse_timestamp_micros(timestamp: &str) -> Option<i64> {
    let trimmed = timestamp.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.timestamp_micros());
    }

    NAIVE_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(trimmed, format)
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive).timestamp_micros())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexicographic_matches_string_order() {
        let ordering = TimestampOrdering::Lexicographic;
        assert!(ordering.key("2024-01-01 09:00:00") < ordering.key("2024-01-01 10:00:00"));
        // Not zero padded: string order wins even though 9 < 10
        assert!(ordering.key("2024-01-01 9:00:00") > ordering.key("2024-01-01 10:00:00"));
    }

    #[test]
    fn test_chronological_handles_offsets() {
        let ordering = TimestampOrdering::Chronological;
        // 10:00+02:00 is 08:00Z, earlier than 09:00Z
        let with_offset = ordering.key("2024-01-01T10:00:00+02:00");
        let utc = ordering.key("2024-01-01T09:00:00Z");
        assert!(with_offset < utc);
    }

    #[test]
    fn test_chronological_mixes_legacy_and_rfc3339() {
        let ordering = TimestampOrdering::Chronological;
        let legacy = ordering.key("2024-01-01 09:30:00.250");
        let modern = ordering.key("2024-01-01T09:30:01Z");
        assert!(legacy < modern);
        assert!(legacy.instant_micros().is_some());
    }

    #[test]
    fn test_unparseable_sorts_first() {
        let ordering = TimestampOrdering::Chronological;
        let garbage = ordering.key("zzz");
        let parsed = ordering.key("1999-01-01 00:00:00");
        assert!(garbage < parsed);
        assert_eq!(garbage.raw(), "zzz");
    }

    #[test]
    fn test_parse_without_fraction() {
        assert_eq!(
            parse_timestamp_micros("1970-01-01 00:00:01"),
            Some(1_000_000)
        );
        assert_eq!(parse_timestamp_micros("not a date"), None);
    }
}
