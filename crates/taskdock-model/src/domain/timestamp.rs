use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::{
    OffsetDateTime, PrimitiveDateTime, format_description::well_known::Rfc3339,
    macros::format_description,
};

use crate::error::ModelError;

/// Point in time stored on task descriptors.
///
/// Rendered as RFC 3339 in UTC. Parsing also accepts ISO-8601 values without an
/// offset (e.g. `2024-03-01T10:20:30.123456`), which are read as UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// Current time in UTC.
    #[inline]
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Wrap an existing datetime, normalized to UTC.
    #[inline]
    pub fn from_datetime(dt: OffsetDateTime) -> Self {
        Self(dt.to_offset(time::UtcOffset::UTC))
    }

    /// Unix timestamp in seconds.
    #[inline]
    pub fn unix_timestamp(&self) -> i64 {
        self.0.unix_timestamp()
    }

    /// Underlying datetime.
    #[inline]
    pub fn as_datetime(&self) -> OffsetDateTime {
        self.0
    }

    /// RFC 3339 representation.
    pub fn to_rfc3339(&self) -> String {
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.0.unix_timestamp().to_string())
    }
}

impl FromStr for Timestamp {
    type Err = ModelError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
            return Ok(Self::from_datetime(dt));
        }
        let naive = format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
        );
        PrimitiveDateTime::parse(s, naive)
            .map(|dt| Self(dt.assume_utc()))
            .map_err(|e| ModelError::InvalidTimestamp(format!("{s}: {e}")))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "schema")]
impl schemars::JsonSchema for Timestamp {
    fn schema_name() -> std::borrow::Cow<'static, str> {
        "Timestamp".into()
    }

    fn json_schema(_: &mut schemars::SchemaGenerator) -> schemars::Schema {
        schemars::json_schema!({ "type": "string", "format": "date-time" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_with_offset_and_normalizes_to_utc() {
        let ts: Timestamp = "2024-03-01T12:00:00+02:00".parse().unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T10:00:00Z");
    }

    #[test]
    fn parses_naive_iso8601_as_utc() {
        let ts: Timestamp = "2024-03-01T10:20:30.123456".parse().unwrap();
        assert_eq!(ts.as_datetime().offset(), time::UtcOffset::UTC);
        assert_eq!(ts.as_datetime().second(), 30);
        assert_eq!(ts.as_datetime().microsecond(), 123_456);

        let whole: Timestamp = "2024-03-01T10:20:30".parse().unwrap();
        assert_eq!(whole.unix_timestamp(), ts.unix_timestamp());
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "yesterday", "2024-13-01T00:00:00", "12:00"] {
            assert!(
                bad.parse::<Timestamp>().is_err(),
                "expected error for {bad:?}"
            );
        }
    }

    #[test]
    fn serde_uses_rfc3339_string() {
        let ts: Timestamp = "2024-03-01T10:00:00Z".parse().unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, r#""2024-03-01T10:00:00Z""#);

        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn ordering_follows_time() {
        let a: Timestamp = "2024-03-01T10:00:00Z".parse().unwrap();
        let b: Timestamp = "2024-03-01T10:00:01Z".parse().unwrap();
        assert!(a < b);
    }
}
