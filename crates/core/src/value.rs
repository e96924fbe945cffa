use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordered key/value map used for attack extras and notification snapshots.
pub type DetailMap = BTreeMap<String, DetailValue>;

/// Typed detail values, serialized as `{"kind": ..., "value": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DetailValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
}

impl DetailValue {
    /// Extract as string, returning None for non-text values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DetailValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<&str> for DetailValue {
    fn from(s: &str) -> Self {
        DetailValue::Text(s.to_string())
    }
}

impl From<String> for DetailValue {
    fn from(s: String) -> Self {
        DetailValue::Text(s)
    }
}

impl From<i64> for DetailValue {
    fn from(n: i64) -> Self {
        DetailValue::Integer(n)
    }
}

impl From<i32> for DetailValue {
    fn from(n: i32) -> Self {
        DetailValue::Integer(i64::from(n))
    }
}

impl From<f64> for DetailValue {
    fn from(n: f64) -> Self {
        DetailValue::Float(n)
    }
}

impl From<bool> for DetailValue {
    fn from(b: bool) -> Self {
        DetailValue::Boolean(b)
    }
}

impl From<DateTime<Utc>> for DetailValue {
    fn from(ts: DateTime<Utc>) -> Self {
        DetailValue::Timestamp(ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(DetailValue::Integer(3)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "integer", "value": 3}));

        let back: DetailValue =
            serde_json::from_value(serde_json::json!({"kind": "text", "value": "ddos"})).unwrap();
        assert_eq!(back.as_str(), Some("ddos"));
    }

    #[test]
    fn map_serialization_is_key_ordered() {
        let mut map = DetailMap::new();
        map.insert("zeta".into(), DetailValue::from(true));
        map.insert("alpha".into(), DetailValue::from(1i64));
        let json = serde_json::to_string(&map).unwrap();
        assert!(json.find("alpha").unwrap() < json.find("zeta").unwrap());
    }
}
