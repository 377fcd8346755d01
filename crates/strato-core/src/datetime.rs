//! Tolerant timestamp parsing for service responses
//!
//! Services in the wild disagree about date formats. This module accepts the
//! variants seen across deployed APIs and folds them all into a single
//! canonical instant type, `chrono::DateTime<Utc>`:
//! - RFC 3339 / ISO-8601 with fractional seconds and `Z` or numeric offsets
//! - ISO-8601 offsets without a colon (`+0000`)
//! - Offset-less date-times, `T` or space separated (treated as UTC)
//! - Bare dates (`yyyy-mm-dd`, midnight UTC)
//! - Numeric epoch values in seconds or, at thirteen digits and above,
//!   milliseconds

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::{Error, Result};

/// Digit count at which a bare numeric timestamp is read as milliseconds
const EPOCH_MILLIS_DIGITS: usize = 13;

/// Parses a timestamp string in any of the accepted formats into a UTC
/// instant.
///
/// Returns a deserialization error when no format matches.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Deserialization {
            message: "empty timestamp".to_string(),
            source: None,
        });
    }

    if value.bytes().all(|b| b.is_ascii_digit()) {
        return parse_epoch(value);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    // Offsets without a colon, e.g. `+0000`, are outside RFC 3339
    if let Ok(parsed) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(parsed.and_utc());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(parsed.and_utc());
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = parsed.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(Error::Deserialization {
        message: format!("unrecognized timestamp format: '{}'", value),
        source: None,
    })
}

fn parse_epoch(digits: &str) -> Result<DateTime<Utc>> {
    let number: i64 = digits.parse().map_err(|_| Error::Deserialization {
        message: format!("epoch timestamp out of range: '{}'", digits),
        source: None,
    })?;
    let instant = if digits.len() >= EPOCH_MILLIS_DIGITS {
        DateTime::from_timestamp_millis(number)
    } else {
        DateTime::from_timestamp(number, 0)
    };
    instant.ok_or_else(|| Error::Deserialization {
        message: format!("epoch timestamp out of range: '{}'", digits),
        source: None,
    })
}

/// Wire representation of a timestamp field: services emit either a string
/// in one of the accepted formats or a bare epoch number.
#[derive(Deserialize)]
#[serde(untagged)]
enum TimestampRepr {
    Number(i64),
    Text(String),
}

impl TimestampRepr {
    fn into_instant(self) -> Result<DateTime<Utc>> {
        match self {
            // Bare JSON numbers lose their digit count, so size decides
            TimestampRepr::Number(n) if n.unsigned_abs() >= 1_000_000_000_000 => {
                DateTime::from_timestamp_millis(n).ok_or_else(|| Error::Deserialization {
                    message: format!("epoch timestamp out of range: {}", n),
                    source: None,
                })
            }
            TimestampRepr::Number(n) => {
                DateTime::from_timestamp(n, 0).ok_or_else(|| Error::Deserialization {
                    message: format!("epoch timestamp out of range: {}", n),
                    source: None,
                })
            }
            TimestampRepr::Text(s) => parse_timestamp(&s),
        }
    }
}

/// Serde adapter for required timestamp fields:
/// `#[serde(deserialize_with = "strato_core::datetime::deserialize_timestamp")]`
pub fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let repr = TimestampRepr::deserialize(deserializer)?;
    repr.into_instant().map_err(serde::de::Error::custom)
}

/// Serde adapter for optional timestamp fields; combine with
/// `#[serde(default)]` so absent fields read as `None`.
pub fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let repr = Option::<TimestampRepr>::deserialize(deserializer)?;
    repr.map(|r| r.into_instant().map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn rfc3339(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_offset_without_colon() {
        let parsed = parse_timestamp("2016-06-20T04:25:16.218+0000").unwrap();
        assert_eq!(parsed, rfc3339("2016-06-20T04:25:16.218+00:00"));
    }

    #[test]
    fn test_offsetless_datetime_is_utc() {
        let parsed = parse_timestamp("2016-06-20T04:25:16").unwrap();
        assert_eq!(parsed, rfc3339("2016-06-20T04:25:16Z"));
    }

    #[test]
    fn test_fractional_zulu() {
        let parsed = parse_timestamp("2016-06-20T04:25:16.218Z").unwrap();
        assert_eq!(parsed, rfc3339("2016-06-20T04:25:16.218Z"));
    }

    #[test]
    fn test_plain_zulu() {
        let parsed = parse_timestamp("2015-05-28T18:01:57Z").unwrap();
        assert_eq!(parsed, rfc3339("2015-05-28T18:01:57Z"));
    }

    #[test]
    fn test_space_separated() {
        let parsed = parse_timestamp("2016-06-20 04:25:16").unwrap();
        assert_eq!(parsed, rfc3339("2016-06-20T04:25:16Z"));
    }

    #[test]
    fn test_bare_date() {
        let parsed = parse_timestamp("2016-06-20").unwrap();
        assert_eq!(parsed, rfc3339("2016-06-20T00:00:00Z"));
    }

    #[test]
    fn test_epoch_seconds() {
        let parsed = parse_timestamp("1478097789").unwrap();
        assert_eq!(parsed.timestamp(), 1478097789);
    }

    #[test]
    fn test_epoch_millis() {
        let parsed = parse_timestamp("1478097789000").unwrap();
        assert_eq!(parsed.timestamp(), 1478097789);
        assert_eq!(parsed, parse_timestamp("1478097789").unwrap());
    }

    #[test]
    fn test_all_vectors_share_one_type() {
        let vectors = [
            "2016-06-20T04:25:16.218+0000",
            "2016-06-20T04:25:16",
            "2016-06-20T04:25:16.218Z",
            "2015-05-28T18:01:57Z",
            "1478097789",
            "1478097789000",
        ];
        for vector in vectors {
            parse_timestamp(vector).unwrap();
        }
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(parse_timestamp("not-a-date").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[derive(Deserialize)]
    struct Doc {
        #[serde(deserialize_with = "deserialize_timestamp")]
        created: DateTime<Utc>,
        #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
        updated: Option<DateTime<Utc>>,
    }

    #[test]
    fn test_serde_adapter_accepts_strings_and_numbers() {
        let doc: Doc =
            serde_json::from_str(r#"{"created": "2016-06-20T04:25:16.218Z"}"#).unwrap();
        assert_eq!(doc.created, rfc3339("2016-06-20T04:25:16.218Z"));
        assert!(doc.updated.is_none());

        let doc: Doc =
            serde_json::from_str(r#"{"created": 1478097789, "updated": 1478097789000}"#).unwrap();
        assert_eq!(doc.created.timestamp(), 1478097789);
        assert_eq!(doc.updated.unwrap(), doc.created);
    }
}
