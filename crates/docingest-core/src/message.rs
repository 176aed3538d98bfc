//! The document type carried through the indexing pipeline and its
//! conversion into the body a store receives.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::traits::Meter;
use crate::types::Source;

pub const FIELD_ID: &str = "_id";
pub const FIELD_TIMESTAMP: &str = "timestamp";
pub const FIELD_PROCESSING_ERROR: &str = "processing_error";

/// Timestamp layout written to the store, always UTC.
pub const STORE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

const KEY_REPLACEMENT_CHAR: char = '_';

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: String,
    fields: Source,
}

impl Message {
    pub fn new(id: impl Into<String>, fields: Source) -> Self {
        Self { id: id.into(), fields }
    }

    /// Build a message from a raw JSON object, taking the id from `_id` or `id`.
    pub fn from_source(mut fields: Source) -> Option<Self> {
        let id = match fields.remove(FIELD_ID).or_else(|| fields.get("id").cloned())? {
            Value::String(s) if !s.is_empty() => s,
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(Self { id, fields })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fields(&self) -> &Source {
        &self.fields
    }

    pub fn get_field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Convert into the body sent to the store.
    ///
    /// Dots in field names become underscores; when that collides with an
    /// existing field the original undotted field is kept. A missing or
    /// unparseable timestamp is replaced with the current time, recorded in
    /// `processing_error` and marked on `invalid_timestamp_meter`.
    pub fn to_store_object(&self, invalid_timestamp_meter: &dyn Meter) -> Source {
        let mut obj = Source::new();

        for (key, value) in &self.fields {
            if key == FIELD_ID || key == FIELD_TIMESTAMP || key.contains('.') {
                continue;
            }
            obj.insert(key.clone(), value.clone());
        }
        for (key, value) in self.fields.iter().filter(|(k, _)| k.contains('.')) {
            let new_key = key.replace('.', &KEY_REPLACEMENT_CHAR.to_string());
            if obj.contains_key(&new_key) {
                warn!(message_id = %self.id, field = %key, "Keeping existing field <{}>, dropping <{}>", new_key, key);
                continue;
            }
            obj.insert(new_key, value.clone());
        }

        let raw = self.fields.get(FIELD_TIMESTAMP);
        let timestamp = match raw.and_then(parse_timestamp) {
            Some(ts) => ts,
            None => {
                invalid_timestamp_meter.mark();
                let shown = raw.map_or_else(|| "<missing>".to_string(), Value::to_string);
                warn!(message_id = %self.id, value = %shown, "Replacing invalid timestamp with current time");
                obj.insert(
                    FIELD_PROCESSING_ERROR.to_string(),
                    Value::String(format!(
                        "Replaced invalid timestamp value in message <{}> with current time - Value <{}> could not be parsed",
                        self.id, shown
                    )),
                );
                Utc::now()
            }
        };
        obj.insert(FIELD_TIMESTAMP.to_string(), Value::String(format_timestamp(&timestamp)));
        obj
    }
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(STORE_TIME_FORMAT).to_string()
}

/// Accepts the store layout, RFC 3339, or epoch seconds (fraction allowed).
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .or_else(|_| DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc)))
            .ok(),
        Value::Number(n) => {
            let seconds = n.as_f64().filter(|s| s.is_finite())?;
            let millis = (seconds * 1000.0).round();
            if millis.abs() > i64::MAX as f64 {
                return None;
            }
            DateTime::from_timestamp_millis(millis as i64)
        }
        _ => None,
    }
}
