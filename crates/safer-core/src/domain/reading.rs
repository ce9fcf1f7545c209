//! Sensor readings and the structured-reading predicate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One `key:value` pair of a structured reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingField {
    pub key: String,
    pub value: String,
}

/// A qualifying sensor payload received during `AwaitingReading`.
///
/// Only payloads that pass [`SensorReading::parse`] become readings; anything
/// else the link produces is diagnostic noise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Payload exactly as received (trimmed). This is what the classifier sees.
    pub raw: String,
    pub fields: Vec<ReadingField>,
    pub received_at: DateTime<Utc>,
}

impl SensorReading {
    /// Parse a link payload as a structured reading.
    ///
    /// The trimmed payload must be wrapped in `{` and `}` and hold one or more
    /// comma-separated `key:value` fields, each with a non-empty key and value.
    /// Surrounding quotes on keys and values are ignored, so flat JSON objects
    /// qualify as well as the MCU's `{temp:29,smoke:5}` form.
    pub fn parse(payload: &str) -> Option<SensorReading> {
        let raw = payload.trim();
        let body = raw.strip_prefix('{')?.strip_suffix('}')?;

        let mut fields = Vec::new();
        for part in body.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (key, value) = part.split_once(':')?;
            let key = unquote(key);
            let value = unquote(value);
            if key.is_empty() || value.is_empty() {
                return None;
            }
            fields.push(ReadingField {
                key: key.to_string(),
                value: value.to_string(),
            });
        }

        if fields.is_empty() {
            return None;
        }

        Some(SensorReading {
            raw: raw.to_string(),
            fields,
            received_at: Utc::now(),
        })
    }

    /// Look up a field value by key.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.key == key)
            .map(|f| f.value.as_str())
    }
}

/// Whether a payload looks like structured sensor data.
pub fn is_structured_reading(payload: &str) -> bool {
    SensorReading::parse(payload).is_some()
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
        .trim()
}
