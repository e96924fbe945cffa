//! Conjunctive attack predicates.
//!
//! A predicate is a flat AND of optional constraints. Rules compile into one
//! via [`AttackPredicate::for_rule`]; the listing API builds them from query
//! parameters. Stores either evaluate [`AttackPredicate::matches`] directly
//! or translate the fields into their own query language.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use attackwatch_core::{severity_in_range, AttackEvent, NotificationRule};

use crate::error::ConfigurationError;

/// Conjunction of optional attack filters. `None` means "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttackPredicate {
    /// Exact attack type.
    pub attack_type: Option<String>,
    /// Source OR destination country.
    pub country: Option<String>,
    /// Inclusive lower severity bound.
    pub min_severity: Option<i32>,
    /// Inclusive upper severity bound.
    pub max_severity: Option<i32>,
    /// Inclusive lower timestamp bound.
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper timestamp bound.
    pub until: Option<DateTime<Utc>>,
}

impl AttackPredicate {
    /// Predicate matching every attack.
    pub fn all() -> Self {
        Self::default()
    }

    /// Compile a rule's filters as of `now`.
    ///
    /// Blank text filters are treated as absent. Severity bounds must lie in
    /// 1..=10 and must not be inverted; a time window must be positive.
    pub fn for_rule(
        rule: &NotificationRule,
        now: DateTime<Utc>,
    ) -> Result<Self, ConfigurationError> {
        for (field, value) in [
            ("min_severity", rule.min_severity),
            ("max_severity", rule.max_severity),
        ] {
            if let Some(v) = value {
                if !severity_in_range(v) {
                    return Err(ConfigurationError::SeverityOutOfRange { field, value: v });
                }
            }
        }
        if let (Some(min), Some(max)) = (rule.min_severity, rule.max_severity) {
            if min > max {
                return Err(ConfigurationError::InvertedSeverityRange { min, max });
            }
        }

        let since = match rule.time_window_minutes {
            None => None,
            Some(minutes) if minutes <= 0 => {
                return Err(ConfigurationError::NotPositive {
                    field: "time_window_minutes",
                    value: minutes,
                })
            }
            Some(minutes) => Some(
                now.checked_sub_signed(Duration::minutes(i64::from(minutes)))
                    .ok_or(ConfigurationError::TimeOutOfRange {
                        field: "time_window_minutes",
                        minutes,
                    })?,
            ),
        };

        Ok(Self {
            attack_type: non_blank(rule.attack_type.as_deref()),
            country: non_blank(rule.country.as_deref()),
            min_severity: rule.min_severity,
            max_severity: rule.max_severity,
            since,
            until: None,
        })
    }

    /// True when no field constrains the match.
    pub fn is_unconstrained(&self) -> bool {
        self == &Self::default()
    }

    /// Evaluate the conjunction against a single attack.
    pub fn matches(&self, event: &AttackEvent) -> bool {
        if let Some(t) = &self.attack_type {
            if &event.attack_type != t {
                return false;
            }
        }
        if let Some(c) = &self.country {
            if !event.involves_country(c) {
                return false;
            }
        }
        if let Some(min) = self.min_severity {
            if event.severity < min {
                return false;
            }
        }
        if let Some(max) = self.max_severity {
            if event.severity > max {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.timestamp > until {
                return false;
            }
        }
        true
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use attackwatch_core::{DetailMap, GeoLocation};
    use uuid::Uuid;

    fn location(country: &str) -> GeoLocation {
        GeoLocation {
            latitude: 0.0,
            longitude: 0.0,
            country: country.to_string(),
        }
    }

    fn attack(kind: &str, severity: i32, src: &str, dst: &str, ts: DateTime<Utc>) -> AttackEvent {
        AttackEvent {
            id: Uuid::new_v4(),
            attack_type: kind.to_string(),
            severity,
            source: location(src),
            destination: location(dst),
            timestamp: ts,
            extra: DetailMap::new(),
        }
    }

    fn rule() -> NotificationRule {
        NotificationRule {
            id: Uuid::new_v4(),
            name: "test".into(),
            attack_type: None,
            country: None,
            min_severity: None,
            max_severity: None,
            active: true,
            threshold_count: None,
            time_window_minutes: None,
            cooldown_minutes: None,
            last_triggered_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_rule_matches_everything() {
        let now = Utc::now();
        let p = AttackPredicate::for_rule(&rule(), now).unwrap();
        assert!(p.is_unconstrained());
        assert!(p.matches(&attack("Malware", 1, "Peru", "Chile", now)));
        assert!(p.matches(&attack("DDoS", 10, "USA", "France", now - Duration::days(400))));
    }

    #[test]
    fn country_matches_either_side() {
        let now = Utc::now();
        let mut r = rule();
        r.country = Some("USA".into());
        let p = AttackPredicate::for_rule(&r, now).unwrap();

        assert!(p.matches(&attack("DDoS", 5, "USA", "France", now)));
        assert!(p.matches(&attack("DDoS", 5, "France", "USA", now)));
        assert!(!p.matches(&attack("DDoS", 5, "France", "Spain", now)));
    }

    #[test]
    fn severity_bounds_are_inclusive() {
        let now = Utc::now();
        let mut r = rule();
        r.min_severity = Some(4);
        r.max_severity = Some(6);
        let p = AttackPredicate::for_rule(&r, now).unwrap();

        assert!(!p.matches(&attack("x", 3, "a", "b", now)));
        assert!(p.matches(&attack("x", 4, "a", "b", now)));
        assert!(p.matches(&attack("x", 6, "a", "b", now)));
        assert!(!p.matches(&attack("x", 7, "a", "b", now)));
    }

    #[test]
    fn filters_are_anded() {
        let now = Utc::now();
        let mut r = rule();
        r.attack_type = Some("DDoS".into());
        r.country = Some("USA".into());
        r.min_severity = Some(8);
        let p = AttackPredicate::for_rule(&r, now).unwrap();

        assert!(p.matches(&attack("DDoS", 9, "USA", "Japan", now)));
        assert!(!p.matches(&attack("Phishing", 9, "USA", "Japan", now)));
        assert!(!p.matches(&attack("DDoS", 7, "USA", "Japan", now)));
        assert!(!p.matches(&attack("DDoS", 9, "Brazil", "Japan", now)));
    }

    #[test]
    fn time_window_restricts_lookback() {
        let now = Utc::now();
        let mut r = rule();
        r.time_window_minutes = Some(30);
        let p = AttackPredicate::for_rule(&r, now).unwrap();

        assert_eq!(p.since, Some(now - Duration::minutes(30)));
        assert!(p.matches(&attack("x", 1, "a", "b", now - Duration::minutes(30))));
        assert!(!p.matches(&attack("x", 1, "a", "b", now - Duration::minutes(31))));
    }

    #[test]
    fn blank_filters_are_ignored() {
        let mut r = rule();
        r.attack_type = Some("  ".into());
        r.country = Some(String::new());
        assert!(AttackPredicate::for_rule(&r, Utc::now())
            .unwrap()
            .is_unconstrained());
    }

    #[test]
    fn malformed_numeric_filters_are_configuration_errors() {
        let now = Utc::now();

        let mut r = rule();
        r.min_severity = Some(0);
        assert_eq!(
            AttackPredicate::for_rule(&r, now),
            Err(ConfigurationError::SeverityOutOfRange {
                field: "min_severity",
                value: 0
            })
        );

        let mut r = rule();
        r.min_severity = Some(9);
        r.max_severity = Some(2);
        assert_eq!(
            AttackPredicate::for_rule(&r, now),
            Err(ConfigurationError::InvertedSeverityRange { min: 9, max: 2 })
        );

        let mut r = rule();
        r.time_window_minutes = Some(-5);
        assert!(matches!(
            AttackPredicate::for_rule(&r, now),
            Err(ConfigurationError::NotPositive { .. })
        ));
    }

    #[test]
    fn until_bound_is_inclusive() {
        let now = Utc::now();
        let p = AttackPredicate {
            until: Some(now),
            ..AttackPredicate::all()
        };
        assert!(p.matches(&attack("x", 1, "a", "b", now)));
        assert!(!p.matches(&attack("x", 1, "a", "b", now + Duration::seconds(1))));
    }
}
