//! Trigger policies: per-event and volume.

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use attackwatch_core::{
    AttackEvent, AttackRef, DetailMap, DetailValue, Notification, NotificationRule,
    MATCHED_COUNT_KEY,
};

use crate::audit_log::AuditEvent;
use crate::error::{ConfigurationError, StoreError};

use super::RuleEvaluator;

/// How a rule turns matches into notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TriggerMode {
    /// One notification per attack, deduplicated per (rule name, attack).
    PerEvent,
    /// One notification once the match count reaches `threshold`.
    Volume { threshold: usize },
}

impl TriggerMode {
    pub(super) fn for_rule(rule: &NotificationRule) -> Result<Self, ConfigurationError> {
        match rule.threshold_count {
            None => Ok(TriggerMode::PerEvent),
            Some(t) if t <= 0 => Err(ConfigurationError::NotPositive {
                field: "threshold_count",
                value: t,
            }),
            Some(t) => Ok(TriggerMode::Volume {
                threshold: t as usize,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct TriggerOutcome {
    pub created: usize,
    /// Another pass moved the cooldown marker first; this pass backed off.
    pub claim_lost: bool,
}

impl RuleEvaluator {
    pub(super) async fn fire(
        &self,
        rule: &NotificationRule,
        mode: TriggerMode,
        matches: &[AttackEvent],
        now: DateTime<Utc>,
    ) -> Result<TriggerOutcome, StoreError> {
        let outcome = match mode {
            TriggerMode::Volume { threshold } => {
                self.fire_volume(rule, threshold, matches.len(), now).await?
            }
            TriggerMode::PerEvent => self.fire_per_event(rule, matches, now).await?,
        };

        if outcome.claim_lost {
            warn!(rule_id = %rule.id, "cooldown claimed by a concurrent pass, backing off");
            self.audit(rule, AuditEvent::ClaimLost);
        }
        Ok(outcome)
    }

    async fn fire_volume(
        &self,
        rule: &NotificationRule,
        threshold: usize,
        matched: usize,
        now: DateTime<Utc>,
    ) -> Result<TriggerOutcome, StoreError> {
        if matched < threshold {
            return Ok(TriggerOutcome::default());
        }

        if !self.claim(rule, now).await? {
            return Ok(TriggerOutcome {
                created: 0,
                claim_lost: true,
            });
        }

        let notification = Notification::new(
            &rule.name,
            AttackRef::Volume,
            now,
            volume_details(rule, matched),
        );
        let inserted = match self
            .call("insert", self.notifications.insert(&notification))
            .await
        {
            Ok(inserted) => inserted,
            Err(e) => {
                self.release(rule, now).await;
                return Err(e);
            }
        };

        info!(rule_id = %rule.id, rule = %rule.name, matched, threshold, "volume threshold reached");
        self.audit(rule, AuditEvent::VolumeReached { matched, threshold });

        Ok(TriggerOutcome {
            created: usize::from(inserted),
            claim_lost: false,
        })
    }

    async fn fire_per_event(
        &self,
        rule: &NotificationRule,
        matches: &[AttackEvent],
        now: DateTime<Utc>,
    ) -> Result<TriggerOutcome, StoreError> {
        let mut progress = PerEventProgress::default();
        match self.notify_new_events(rule, matches, now, &mut progress).await {
            Ok(()) => Ok(progress.outcome),
            Err(e) => {
                // Keep the marker once a notification exists to justify it.
                if progress.claimed && progress.outcome.created == 0 {
                    self.release(rule, now).await;
                }
                Err(e)
            }
        }
    }

    async fn notify_new_events(
        &self,
        rule: &NotificationRule,
        matches: &[AttackEvent],
        now: DateTime<Utc>,
        progress: &mut PerEventProgress,
    ) -> Result<(), StoreError> {
        for event in matches {
            let attack_ref = AttackRef::Attack(event.id);
            if self
                .call("exists", self.notifications.exists(&rule.name, &attack_ref))
                .await?
            {
                continue;
            }

            // Cooldown moves with the first new notification of the pass.
            if !progress.claimed {
                if !self.claim(rule, now).await? {
                    progress.outcome.claim_lost = true;
                    return Ok(());
                }
                progress.claimed = true;
            }

            let notification = Notification::new(&rule.name, attack_ref, now, event_snapshot(event));
            if self
                .call("insert", self.notifications.insert(&notification))
                .await?
            {
                progress.outcome.created += 1;
                info!(rule_id = %rule.id, rule = %rule.name, attack_id = %event.id, "rule triggered by attack");
                self.audit(rule, AuditEvent::Notified { attack_id: event.id });
            }
        }
        Ok(())
    }

    /// Move the rule's cooldown marker from the value read at pass start to
    /// `now`. Fails when another pass got there first.
    async fn claim(&self, rule: &NotificationRule, now: DateTime<Utc>) -> Result<bool, StoreError> {
        self.call(
            "update_last_triggered",
            self.rules
                .update_last_triggered(rule.id, rule.last_triggered_at, now),
        )
        .await
    }

    /// Put the marker back to its value at pass start after a claim whose
    /// notification never got written.
    async fn release(&self, rule: &NotificationRule, claimed: DateTime<Utc>) {
        let previous = rule.last_triggered_at;
        match self
            .call(
                "release_last_triggered",
                self.rules.release_last_triggered(rule.id, claimed, previous),
            )
            .await
        {
            Ok(true) => {
                warn!(rule_id = %rule.id, "cooldown claim released after failed notification write");
                self.audit(rule, AuditEvent::ClaimReleased { restored: previous });
            }
            Ok(false) => {
                warn!(rule_id = %rule.id, "cooldown marker moved by another pass, not released")
            }
            Err(e) => {
                error!(rule_id = %rule.id, error = %e, "failed to release cooldown claim")
            }
        }
    }
}

#[derive(Default)]
struct PerEventProgress {
    outcome: TriggerOutcome,
    claimed: bool,
}

/// Details recorded on a per-event notification.
pub(crate) fn event_snapshot(event: &AttackEvent) -> DetailMap {
    let mut details = DetailMap::new();
    details.insert("attack_type".into(), DetailValue::from(event.attack_type.as_str()));
    details.insert("severity".into(), DetailValue::from(event.severity));
    details.insert("country_src".into(), DetailValue::from(event.source_country()));
    details.insert("country_dst".into(), DetailValue::from(event.dest_country()));
    details.insert("timestamp".into(), DetailValue::from(event.timestamp));
    details
}

fn volume_details(rule: &NotificationRule, matched: usize) -> DetailMap {
    let mut details = DetailMap::new();
    details.insert(MATCHED_COUNT_KEY.into(), DetailValue::Integer(matched as i64));
    if let Some(t) = rule.threshold_count {
        details.insert("threshold_count".into(), DetailValue::from(t));
    }
    if let Some(w) = rule.time_window_minutes {
        details.insert("time_window_minutes".into(), DetailValue::from(w));
    }
    details
}
