use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attack::AttackId;
use crate::value::DetailMap;

/// Stored in place of an attack id when a volume rule fires.
pub const VOLUME_SENTINEL: &str = "threshold";

/// Detail key carrying the number of matches behind a volume notification.
pub const MATCHED_COUNT_KEY: &str = "matched_count";

/// What a notification points at: one attack, or a volume crossing.
///
/// Serialized as a plain string: the attack UUID or [`VOLUME_SENTINEL`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AttackRef {
    Attack(AttackId),
    Volume,
    /// Anything else found in storage, kept verbatim.
    Other(String),
}

impl AttackRef {
    pub fn as_attack_id(&self) -> Option<AttackId> {
        match self {
            AttackRef::Attack(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for AttackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttackRef::Attack(id) => write!(f, "{}", id),
            AttackRef::Volume => write!(f, "{}", VOLUME_SENTINEL),
            AttackRef::Other(s) => write!(f, "{}", s),
        }
    }
}

impl From<String> for AttackRef {
    fn from(s: String) -> Self {
        if s == VOLUME_SENTINEL {
            return AttackRef::Volume;
        }
        match Uuid::parse_str(&s) {
            Ok(id) => AttackRef::Attack(id),
            Err(_) => AttackRef::Other(s),
        }
    }
}

impl From<AttackRef> for String {
    fn from(r: AttackRef) -> Self {
        r.to_string()
    }
}

/// A raised notification. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub rule_name: String,
    pub attack_id: AttackRef,
    pub triggered_at: DateTime<Utc>,
    pub details: DetailMap,
}

impl Notification {
    pub fn new(
        rule_name: impl Into<String>,
        attack_id: AttackRef,
        triggered_at: DateTime<Utc>,
        details: DetailMap,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            rule_name: rule_name.into(),
            attack_id,
            triggered_at,
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attack_ref_string_forms() {
        let id = Uuid::new_v4();
        assert_eq!(AttackRef::from(id.to_string()), AttackRef::Attack(id));
        assert_eq!(AttackRef::from(VOLUME_SENTINEL.to_string()), AttackRef::Volume);
        assert_eq!(
            AttackRef::from("legacy-42".to_string()),
            AttackRef::Other("legacy-42".into())
        );
        assert_eq!(AttackRef::Volume.to_string(), "threshold");
    }

    #[test]
    fn notification_json_uses_plain_attack_id() {
        let n = Notification::new("r", AttackRef::Volume, Utc::now(), DetailMap::new());
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["attack_id"], "threshold");
    }
}
