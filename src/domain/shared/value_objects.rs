//! Shared value objects used across the call context and the store

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Call identifier (the record's key in the store)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User identifier as issued by the authentication backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Placeholder the store replaces with its own clock at commit time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerValue {
    #[serde(rename = ".sv")]
    kind: ServerValueKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ServerValueKind {
    Timestamp,
}

impl ServerValue {
    pub const TIMESTAMP: ServerValue = ServerValue {
        kind: ServerValueKind::Timestamp,
    };
}

/// A point in time as stored: the server placeholder before commit,
/// epoch milliseconds after
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Server(ServerValue),
    Millis(i64),
}

impl Timestamp {
    /// Ask the store to stamp its commit time
    pub fn server() -> Self {
        Timestamp::Server(ServerValue::TIMESTAMP)
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Timestamp::Millis(at.timestamp_millis())
    }

    pub fn millis(&self) -> Option<i64> {
        match self {
            Timestamp::Millis(ms) => Some(*ms),
            Timestamp::Server(_) => None,
        }
    }

    /// Resolved time, `None` while still a placeholder
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        self.millis()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Timestamp::Millis(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_server_timestamp_wire_format() {
        let value = serde_json::to_value(Timestamp::server()).unwrap();
        assert_eq!(value, json!({ ".sv": "timestamp" }));

        let parsed: Timestamp = serde_json::from_value(value).unwrap();
        assert!(!parsed.is_resolved());
        assert_eq!(parsed.to_datetime(), None);
    }

    #[test]
    fn test_resolved_timestamp() {
        let parsed: Timestamp = serde_json::from_value(json!(1_700_000_000_123i64)).unwrap();
        assert_eq!(parsed.millis(), Some(1_700_000_000_123));
        assert_eq!(
            parsed.to_datetime().unwrap().timestamp_millis(),
            1_700_000_000_123
        );
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        assert_eq!(serde_json::to_value(UserId::new("u1")).unwrap(), json!("u1"));
        assert_eq!(serde_json::to_value(CallId::new("-Nabc")).unwrap(), json!("-Nabc"));
        assert_eq!(UserId::from("u2").to_string(), "u2");
    }
}
