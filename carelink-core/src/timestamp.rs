//! Timestamp parsing and JSON formatting
//!
//! Columns are stored as naive UTC (`TIMESTAMP`). Input accepts:
//! - `2025-11-08T14:30:00` (optionally with fractional seconds, or a space separator)
//! - RFC 3339 with offset (`2025-11-08T14:30:00-05:00`, `...Z`), converted to UTC
//! - a bare date (`2025-11-08`), read as midnight
//!
//! Output is always `YYYY-MM-DDTHH:MM:SS`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};

use crate::error::{CoreError, Result};

const OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a timestamp in any accepted format.
pub fn parse(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CoreError::invalid_timestamp(value, "empty string"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc).naive_utc());
    }

    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }

    Err(CoreError::invalid_timestamp(
        value,
        "expected ISO 8601 like 2025-11-08T14:30:00",
    ))
}

/// Format a timestamp for JSON output.
pub fn format(value: &NaiveDateTime) -> String {
    value.format(OUTPUT_FORMAT).to_string()
}

/// Current UTC time, truncated to whole seconds.
pub fn now() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Serde adapter for `NaiveDateTime` fields.
pub mod iso {
    use chrono::NaiveDateTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse(&raw).map_err(D::Error::custom)
    }
}

/// Serde adapter for `Option<NaiveDateTime>` fields.
pub mod iso_opt {
    use chrono::NaiveDateTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<NaiveDateTime>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.serialize_str(&super::format(v)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDateTime>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) => super::parse(&raw).map(Some).map_err(D::Error::custom),
            None => Ok(None),
        }
    }
}

/// Serde adapter for patch fields: absent = `None`, `null` = `Some(None)`.
///
/// Use with `#[serde(default, with = "timestamp::iso_patch")]`.
pub mod iso_patch {
    use chrono::NaiveDateTime;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Option<NaiveDateTime>>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(inner) => super::iso_opt::serialize(inner, s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<Option<NaiveDateTime>>, D::Error> {
        super::iso_opt::deserialize(d).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use serde::{Deserialize, Serialize};

    #[test]
    fn parses_naive_iso() {
        let dt = parse("2025-11-08T14:30:00").unwrap();
        assert_eq!((dt.hour(), dt.minute()), (14, 30));

        let dt = parse("2025-11-08 09:05:00.250").unwrap();
        assert_eq!(dt.minute(), 5);

        let dt = parse("2025-11-08T09:05").unwrap();
        assert_eq!(dt.hour(), 9);
    }

    #[test]
    fn converts_offsets_to_utc() {
        let dt = parse("2025-11-08T10:00:00-05:00").unwrap();
        assert_eq!(dt.hour(), 15);

        let dt = parse("2025-11-08T10:00:00Z").unwrap();
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn bare_date_is_midnight() {
        let dt = parse("2025-11-08").unwrap();
        assert_eq!((dt.day(), dt.hour()), (8, 0));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("").is_err());
        assert!(parse("next tuesday").is_err());
        assert!(parse("2025-13-01").is_err());
    }

    #[test]
    fn formats_without_fraction() {
        let dt = parse("2025-11-08T14:30:00.999").unwrap();
        assert_eq!(format(&dt), "2025-11-08T14:30:00");
    }

    #[derive(Serialize, Deserialize)]
    struct Row {
        #[serde(with = "iso")]
        at: NaiveDateTime,
        #[serde(default, with = "iso_opt")]
        maybe: Option<NaiveDateTime>,
    }

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, with = "iso_patch")]
        due_at: Option<Option<NaiveDateTime>>,
    }

    #[test]
    fn serde_adapters() {
        let row: Row = serde_json::from_str(r#"{"at": "2025-01-02T03:04:05Z"}"#).unwrap();
        assert!(row.maybe.is_none());
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["at"], "2025-01-02T03:04:05");
        assert!(json["maybe"].is_null());

        assert!(serde_json::from_str::<Row>(r#"{"at": "soon"}"#).is_err());
    }

    #[test]
    fn patch_distinguishes_absent_from_null() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.due_at, None);

        let cleared: Patch = serde_json::from_str(r#"{"due_at": null}"#).unwrap();
        assert_eq!(cleared.due_at, Some(None));

        let set: Patch = serde_json::from_str(r#"{"due_at": "2025-11-08"}"#).unwrap();
        assert!(matches!(set.due_at, Some(Some(_))));
    }
}
