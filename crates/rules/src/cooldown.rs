//! Per-rule cooldown gate.

use chrono::{DateTime, Duration, Utc};

use attackwatch_core::NotificationRule;

use crate::error::ConfigurationError;

/// Whether a rule may be evaluated at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownState {
    Ready,
    /// Skipped until `until` (exclusive).
    Cooling { until: DateTime<Utc> },
}

/// Check a rule's cooldown at `now`.
///
/// A rule that never fired is always ready. Otherwise it is cooling while
/// `now < last_triggered_at + cooldown`, with the cooldown defaulting to
/// [`attackwatch_core::DEFAULT_COOLDOWN_MINUTES`] when unset.
pub fn cooldown_state(
    rule: &NotificationRule,
    now: DateTime<Utc>,
) -> Result<CooldownState, ConfigurationError> {
    let minutes = rule.effective_cooldown_minutes();
    if minutes < 0 {
        return Err(ConfigurationError::NegativeCooldown(minutes));
    }

    let Some(last) = rule.last_triggered_at else {
        return Ok(CooldownState::Ready);
    };

    let until = last
        .checked_add_signed(Duration::minutes(i64::from(minutes)))
        .ok_or(ConfigurationError::TimeOutOfRange {
            field: "cooldown_minutes",
            minutes,
        })?;

    if now < until {
        Ok(CooldownState::Cooling { until })
    } else {
        Ok(CooldownState::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn rule(last: Option<DateTime<Utc>>, cooldown: Option<i32>) -> NotificationRule {
        NotificationRule {
            id: Uuid::new_v4(),
            name: "cooldown".into(),
            attack_type: None,
            country: None,
            min_severity: None,
            max_severity: None,
            active: true,
            threshold_count: None,
            time_window_minutes: None,
            cooldown_minutes: cooldown,
            last_triggered_at: last,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn never_triggered_is_ready() {
        assert_eq!(
            cooldown_state(&rule(None, Some(60)), Utc::now()),
            Ok(CooldownState::Ready)
        );
    }

    #[test]
    fn cooling_inside_window_ready_after() {
        let t0 = Utc::now();
        let r = rule(Some(t0), Some(10));

        assert_eq!(
            cooldown_state(&r, t0 + Duration::minutes(5)),
            Ok(CooldownState::Cooling {
                until: t0 + Duration::minutes(10)
            })
        );
        // The end of the window is no longer cooling.
        assert_eq!(
            cooldown_state(&r, t0 + Duration::minutes(10)),
            Ok(CooldownState::Ready)
        );
        assert_eq!(
            cooldown_state(&r, t0 + Duration::minutes(11)),
            Ok(CooldownState::Ready)
        );
    }

    #[test]
    fn unset_cooldown_defaults_to_ten_minutes() {
        let t0 = Utc::now();
        let r = rule(Some(t0), None);
        assert!(matches!(
            cooldown_state(&r, t0 + Duration::minutes(9)),
            Ok(CooldownState::Cooling { .. })
        ));
        assert_eq!(
            cooldown_state(&r, t0 + Duration::minutes(10)),
            Ok(CooldownState::Ready)
        );
    }

    #[test]
    fn zero_cooldown_never_blocks() {
        let t0 = Utc::now();
        assert_eq!(
            cooldown_state(&rule(Some(t0), Some(0)), t0),
            Ok(CooldownState::Ready)
        );
    }

    #[test]
    fn negative_cooldown_is_configuration_error() {
        assert_eq!(
            cooldown_state(&rule(None, Some(-3)), Utc::now()),
            Err(ConfigurationError::NegativeCooldown(-3))
        );
    }
}
