use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

pub type RuleId = Uuid;

/// Cooldown applied when a rule leaves `cooldown_minutes` unset.
pub const DEFAULT_COOLDOWN_MINUTES: i32 = 10;

pub const SEVERITY_MIN: i32 = 1;
pub const SEVERITY_MAX: i32 = 10;

/// Whether `value` is a valid attack severity.
pub fn severity_in_range(value: i32) -> bool {
    (SEVERITY_MIN..=SEVERITY_MAX).contains(&value)
}

/// Operator-defined notification rule.
///
/// Every filter is optional; present filters are ANDed. `threshold_count`
/// switches the rule from per-event mode to volume mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationRule {
    pub id: RuleId,
    pub name: String,
    pub attack_type: Option<String>,
    /// Matches either the source or the destination country.
    pub country: Option<String>,
    pub min_severity: Option<i32>,
    pub max_severity: Option<i32>,
    pub active: bool,
    pub threshold_count: Option<i32>,
    pub time_window_minutes: Option<i32>,
    pub cooldown_minutes: Option<i32>,
    /// Written only by the evaluator.
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NotificationRule {
    /// Build a fresh rule from a validated input.
    pub fn from_input(input: RuleInput, now: DateTime<Utc>) -> Self {
        let mut rule = Self {
            id: Uuid::new_v4(),
            name: String::new(),
            attack_type: None,
            country: None,
            min_severity: None,
            max_severity: None,
            active: true,
            threshold_count: None,
            time_window_minutes: None,
            cooldown_minutes: None,
            last_triggered_at: None,
            created_at: now,
        };
        rule.apply(input);
        rule
    }

    /// Overwrite the configurable fields, keeping id, creation time and
    /// cooldown state.
    pub fn apply(&mut self, input: RuleInput) {
        let input = input.normalized();
        self.name = input.name;
        self.attack_type = input.attack_type;
        self.country = input.country;
        self.min_severity = input.min_severity;
        self.max_severity = input.max_severity;
        self.active = input.active;
        self.threshold_count = input.threshold_count;
        self.time_window_minutes = input.time_window_minutes;
        self.cooldown_minutes = input.cooldown_minutes;
    }

    pub fn is_volume_mode(&self) -> bool {
        self.threshold_count.is_some()
    }

    pub fn effective_cooldown_minutes(&self) -> i32 {
        self.cooldown_minutes.unwrap_or(DEFAULT_COOLDOWN_MINUTES)
    }
}

fn default_active() -> bool {
    true
}

/// Create/update payload for a rule (API bodies and YAML seed files).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleInput {
    pub name: String,
    #[serde(default)]
    pub attack_type: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub min_severity: Option<i32>,
    #[serde(default)]
    pub max_severity: Option<i32>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub threshold_count: Option<i32>,
    #[serde(default)]
    pub time_window_minutes: Option<i32>,
    #[serde(default)]
    pub cooldown_minutes: Option<i32>,
}

impl RuleInput {
    /// Trim text fields and turn blank filters into absent ones.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.attack_type = blank_to_none(self.attack_type);
        self.country = blank_to_none(self.country);
        self
    }

    /// Check the definition before it is stored.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        for (field, value) in [
            ("min_severity", self.min_severity),
            ("max_severity", self.max_severity),
        ] {
            if let Some(v) = value {
                if !severity_in_range(v) {
                    return Err(ValidationError::SeverityOutOfRange { field, value: v });
                }
            }
        }
        if let (Some(min), Some(max)) = (self.min_severity, self.max_severity) {
            if min > max {
                return Err(ValidationError::InvertedSeverityRange { min, max });
            }
        }
        for (field, value) in [
            ("threshold_count", self.threshold_count),
            ("time_window_minutes", self.time_window_minutes),
        ] {
            if let Some(v) = value {
                if v <= 0 {
                    return Err(ValidationError::NotPositive { field, value: v });
                }
            }
        }
        if let Some(c) = self.cooldown_minutes {
            if c < 0 {
                return Err(ValidationError::NegativeCooldown(c));
            }
        }
        Ok(())
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str) -> RuleInput {
        RuleInput {
            name: name.to_string(),
            attack_type: None,
            country: None,
            min_severity: None,
            max_severity: None,
            active: true,
            threshold_count: None,
            time_window_minutes: None,
            cooldown_minutes: None,
        }
    }

    #[test]
    fn minimal_input_is_valid() {
        assert_eq!(input("all attacks").validate(), Ok(()));
    }

    #[test]
    fn rejects_blank_name() {
        assert_eq!(input("   ").validate(), Err(ValidationError::EmptyName));
    }

    #[test]
    fn rejects_out_of_range_severity() {
        let mut i = input("r");
        i.max_severity = Some(11);
        assert_eq!(
            i.validate(),
            Err(ValidationError::SeverityOutOfRange {
                field: "max_severity",
                value: 11
            })
        );
    }

    #[test]
    fn rejects_inverted_range() {
        let mut i = input("r");
        i.min_severity = Some(8);
        i.max_severity = Some(3);
        assert_eq!(
            i.validate(),
            Err(ValidationError::InvertedSeverityRange { min: 8, max: 3 })
        );
    }

    #[test]
    fn rejects_zero_threshold_and_negative_cooldown() {
        let mut i = input("r");
        i.threshold_count = Some(0);
        assert!(matches!(
            i.validate(),
            Err(ValidationError::NotPositive {
                field: "threshold_count",
                ..
            })
        ));

        let mut i = input("r");
        i.cooldown_minutes = Some(-1);
        assert_eq!(i.validate(), Err(ValidationError::NegativeCooldown(-1)));
    }

    #[test]
    fn defaults_when_deserializing() {
        let i: RuleInput = serde_json::from_str(r#"{"name": "ddos watch"}"#).unwrap();
        assert!(i.active);
        assert!(i.threshold_count.is_none());
    }

    #[test]
    fn apply_keeps_cooldown_state() {
        let now = Utc::now();
        let mut rule = NotificationRule::from_input(input("first"), now);
        rule.last_triggered_at = Some(now);

        let mut update = input("  renamed ");
        update.country = Some("  ".into());
        update.threshold_count = Some(5);
        rule.apply(update);

        assert_eq!(rule.name, "renamed");
        assert!(rule.country.is_none());
        assert!(rule.is_volume_mode());
        assert_eq!(rule.last_triggered_at, Some(now));
        assert_eq!(rule.effective_cooldown_minutes(), DEFAULT_COOLDOWN_MINUTES);
    }
}
