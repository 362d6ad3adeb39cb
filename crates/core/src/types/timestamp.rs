//! Backend timestamps.
//!
//! The backend serializes datetimes with Python's `isoformat()`, which omits
//! the offset for naive values (`2024-05-01T12:30:00.123456`). Those are
//! stored as UTC on the server side, so they are read as UTC here.

use core::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A point in time as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    #[must_use]
    pub const fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse RFC 3339 or an offset-less ISO-8601 datetime.
    ///
    /// # Errors
    ///
    /// Returns the chrono parse error of the naive attempt when neither
    /// format matches.
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        if let Ok(at) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self(at.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
            .map(|naive| Self(naive.and_utc()))
    }

    #[must_use]
    pub const fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Short date, e.g. `2024-05-01`.
    #[must_use]
    pub fn date(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }

    /// Date and minute, e.g. `2024-05-01 12:30`.
    #[must_use]
    pub fn date_time(&self) -> String {
        self.0.format("%Y-%m-%d %H:%M").to_string()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(at: DateTime<Utc>) -> Self {
        Self(at)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_naive_isoformat_as_utc() {
        let ts = Timestamp::parse("2024-05-01T12:30:00.123456").unwrap();
        assert_eq!(ts.date_time(), "2024-05-01 12:30");
        let no_fraction = Timestamp::parse("2024-05-01T12:30:00").unwrap();
        assert_eq!(no_fraction.date(), "2024-05-01");
    }

    #[test]
    fn test_parses_rfc3339_with_offset() {
        let ts = Timestamp::parse("2024-05-01T09:30:00-03:00").unwrap();
        assert_eq!(ts.date_time(), "2024-05-01 12:30");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(Timestamp::parse("yesterday").is_err());
        assert!(serde_json::from_str::<Timestamp>("\"\"").is_err());
    }

    #[test]
    fn test_json_round_trip_keeps_instant() {
        let ts: Timestamp = serde_json::from_str("\"2024-01-02T03:04:05\"").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }
}
