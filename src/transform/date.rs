use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::{DataTransformer, TransformError};
use crate::value::FieldValue;

const NAME: &str = "date";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Calendar dates in records, ISO-8601 UTC timestamps in documents.
///
/// Encode: `2024-03-01` becomes `2024-03-01T00:00:00Z`; a timestamp with an
/// offset is converted to UTC; a timestamp without one is taken as UTC.
/// Decode: the calendar date of the timestamp, in its own offset.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTransformer;

impl DataTransformer for DateTransformer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn type_keys(&self) -> &'static [&'static str] {
        &["date", "date_iso8601", "dateiso8601"]
    }

    fn encode(&self, value: &FieldValue) -> Result<FieldValue, TransformError> {
        let raw = match value {
            FieldValue::Null => return Ok(FieldValue::Null),
            FieldValue::String(s) => s.trim(),
            other => return Err(TransformError::unsupported(NAME, other)),
        };
        if raw.is_empty() {
            return Ok(FieldValue::Null);
        }

        if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
            return Ok(FieldValue::String(format!("{}T00:00:00Z", date.format(DATE_FORMAT))));
        }
        if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
            return Ok(FieldValue::String(stamp.naive_utc().format(TIMESTAMP_FORMAT).to_string()));
        }
        parse_naive(raw)
            .map(|stamp| FieldValue::String(stamp.format(TIMESTAMP_FORMAT).to_string()))
            .ok_or_else(|| TransformError::unparseable(NAME, raw))
    }

    fn decode(&self, value: &FieldValue) -> Result<FieldValue, TransformError> {
        let raw = match value {
            FieldValue::Null => return Ok(FieldValue::Null),
            FieldValue::String(s) => s.trim(),
            other => return Err(TransformError::unsupported(NAME, other)),
        };
        if raw.is_empty() {
            return Ok(FieldValue::Null);
        }

        let date = NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.date_naive()))
            .or_else(|| parse_naive(raw).map(|d| d.date()))
            .or_else(|| {
                // Trailing zone designators we do not recognise
                raw.get(..10)
                    .filter(|_| raw.as_bytes().get(10) == Some(&b'T'))
                    .and_then(|prefix| NaiveDate::parse_from_str(prefix, DATE_FORMAT).ok())
            })
            .ok_or_else(|| TransformError::unparseable(NAME, raw))?;

        Ok(FieldValue::String(date.format(DATE_FORMAT).to_string()))
    }
}

fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.strip_suffix('Z').unwrap_or(raw);
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
}
