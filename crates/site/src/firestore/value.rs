//! Firestore REST document and value shapes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zynvo_core::{Email, EntryStatus, WaitlistEntry, WaitlistStats};

/// A typed Firestore value.
///
/// Only the variants this crate reads or writes are modelled; anything else
/// deserializes with every field empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Value {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    /// Int64, encoded as a decimal string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integer_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub double_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_value: Option<DateTime<Utc>>,
}

impl Value {
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            string_value: Some(value.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn integer(value: i64) -> Self {
        Self {
            integer_value: Some(value.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn timestamp(value: DateTime<Utc>) -> Self {
        Self {
            timestamp_value: Some(value),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.string_value.as_deref()
    }

    /// Non-negative integer, accepting doubles written by other clients.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn as_u64(&self) -> Option<u64> {
        if let Some(raw) = &self.integer_value {
            return raw.parse::<i64>().ok().map(|n| u64::try_from(n).unwrap_or(0));
        }
        self.double_value
            .filter(|n| n.is_finite())
            .map(|n| n.max(0.0) as u64)
    }

    /// Timestamp, also accepting RFC 3339 strings written by web clients.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp_value.or_else(|| {
            let raw = self.string_value.as_deref()?;
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|at| at.with_timezone(&Utc))
        })
    }
}

/// A stored document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub fields: HashMap<String, Value>,
}

impl Document {
    /// Last path segment of the document name.
    #[must_use]
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }

    fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

// =============================================================================
// Waitlist mapping
// =============================================================================

pub const EMAIL: &str = "email";
pub const TIMESTAMP: &str = "timestamp";
pub const STATUS: &str = "status";
pub const SOURCE: &str = "source";
pub const USER_AGENT: &str = "userAgent";

pub const TOTAL_COUNT: &str = "totalCount";
pub const TODAY_COUNT: &str = "todayCount";
pub const LAST_UPDATED: &str = "lastUpdated";

/// Fields for a new entry. The timestamp is left out when `with_timestamp`
/// is false so a server transform can fill it.
#[must_use]
pub fn entry_fields(entry: &WaitlistEntry, with_timestamp: bool) -> HashMap<String, Value> {
    let mut fields = HashMap::from([
        (EMAIL.to_string(), Value::string(entry.email.as_str())),
        (STATUS.to_string(), Value::string(entry.status.as_str())),
        (SOURCE.to_string(), Value::string(entry.source.clone())),
    ]);
    if let Some(user_agent) = &entry.user_agent {
        fields.insert(USER_AGENT.to_string(), Value::string(user_agent.clone()));
    }
    if with_timestamp && let Some(ts) = entry.timestamp {
        fields.insert(TIMESTAMP.to_string(), Value::timestamp(ts));
    }
    fields
}

/// Decode a waitlist document.
///
/// # Errors
///
/// Returns a description of the problem when the email field is missing or
/// not a valid address.
pub fn entry_from_document(document: &Document) -> Result<WaitlistEntry, String> {
    let raw = document
        .field(EMAIL)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("document {} has no email", document.id()))?;
    let email = Email::normalize(raw).map_err(|e| format!("document {}: {e}", document.id()))?;

    Ok(WaitlistEntry {
        email,
        timestamp: document.field(TIMESTAMP).and_then(Value::as_timestamp),
        status: document
            .field(STATUS)
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<EntryStatus>().ok())
            .unwrap_or_default(),
        source: document
            .field(SOURCE)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        user_agent: document
            .field(USER_AGENT)
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

#[must_use]
pub fn stats_from_document(document: &Document) -> WaitlistStats {
    let count = |key: &str| document.field(key).and_then(Value::as_u64).unwrap_or(0);
    WaitlistStats {
        total_count: count(TOTAL_COUNT),
        today_count: count(TODAY_COUNT),
        last_updated: document.field(LAST_UPDATED).and_then(Value::as_timestamp),
    }
}
