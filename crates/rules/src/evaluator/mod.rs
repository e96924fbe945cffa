//! Batch evaluation of notification rules.
//!
//! One pass walks every active rule in sequence:
//!
//! 1. **Cooldown gate**: a rule still cooling down is skipped without
//!    touching the event store.
//! 2. **Predicate**: the rule's filters compile into an [`AttackPredicate`].
//! 3. **Match**: the event store returns every attack satisfying it.
//! 4. **Trigger**: volume mode fires once when the match count reaches the
//!    threshold; per-event mode fires once per attack not yet notified.
//!
//! A malformed rule is reported and skipped. Any store failure (including a
//! call exceeding the store timeout) aborts the whole pass.

mod trigger;


use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use attackwatch_core::{NotificationRule, RuleId};

use crate::audit_log::{AuditEvent, AuditLog};
use crate::cooldown::{cooldown_state, CooldownState};
use crate::error::{ConfigurationError, EvaluationError, StoreError};
use crate::predicate::AttackPredicate;
use crate::store::{EventStore, NotificationStore, RuleStore, StoreResult};

use trigger::{TriggerMode, TriggerOutcome};

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

// ── Abort signal ────────────────────────────────────────────────────

/// Shared flag checked between rules. Once raised it stays raised.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Pass summary ────────────────────────────────────────────────────

/// A rule skipped because its configuration could not be compiled.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RuleFailure {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub error: String,
}

/// Outcome of one evaluation pass.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EvaluationSummary {
    /// The `now` the pass was evaluated at.
    pub evaluated_at: DateTime<Utc>,
    pub notifications_created: usize,
    pub rules_evaluated: usize,
    pub rules_skipped_cooldown: usize,
    pub failures: Vec<RuleFailure>,
    /// The pass stopped early on an abort signal.
    pub aborted: bool,
}

impl EvaluationSummary {
    fn new(evaluated_at: DateTime<Utc>) -> Self {
        Self {
            evaluated_at,
            notifications_created: 0,
            rules_evaluated: 0,
            rules_skipped_cooldown: 0,
            failures: Vec::new(),
            aborted: false,
        }
    }
}

// ── Rule-local errors ───────────────────────────────────────────────

/// Errors raised while evaluating a single rule. Configuration errors stay
/// inside the rule boundary; store errors escape the pass.
#[derive(Debug)]
enum RuleError {
    Configuration(ConfigurationError),
    Store(StoreError),
}

impl From<ConfigurationError> for RuleError {
    fn from(e: ConfigurationError) -> Self {
        RuleError::Configuration(e)
    }
}

impl From<StoreError> for RuleError {
    fn from(e: StoreError) -> Self {
        RuleError::Store(e)
    }
}

enum RuleOutcome {
    CoolingDown,
    Evaluated(TriggerOutcome),
}

// ── Rule evaluator ──────────────────────────────────────────────────

/// Evaluates all active rules against the event store.
pub struct RuleEvaluator {
    events: Arc<dyn EventStore>,
    rules: Arc<dyn RuleStore>,
    notifications: Arc<dyn NotificationStore>,
    store_timeout: Duration,
    audit_log: Option<Arc<AuditLog>>,
}

impl RuleEvaluator {
    pub fn new(
        events: Arc<dyn EventStore>,
        rules: Arc<dyn RuleStore>,
        notifications: Arc<dyn NotificationStore>,
    ) -> Self {
        Self {
            events,
            rules,
            notifications,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            audit_log: None,
        }
    }

    /// Upper bound applied to every individual store call.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_audit_log(mut self, audit_log: Arc<AuditLog>) -> Self {
        self.audit_log = Some(audit_log);
        self
    }

    /// Run one full pass at `now`.
    pub async fn evaluate(&self, now: DateTime<Utc>) -> Result<EvaluationSummary, EvaluationError> {
        self.evaluate_with_abort(now, &AbortSignal::new()).await
    }

    /// Run one pass, checking `abort` before each rule.
    ///
    /// Notifications and cooldown updates made before the abort stay in place.
    pub async fn evaluate_with_abort(
        &self,
        now: DateTime<Utc>,
        abort: &AbortSignal,
    ) -> Result<EvaluationSummary, EvaluationError> {
        let mut summary = EvaluationSummary::new(now);
        if abort.is_aborted() {
            summary.aborted = true;
            return Ok(summary);
        }

        let rules = self
            .call("list_active", self.rules.list_active())
            .await
            .map_err(|e| {
                error!(error = %e, "failed to list active rules");
                EvaluationError::from(e)
            })?;
        debug!(rules = rules.len(), %now, "evaluation pass started");

        for rule in rules.iter().filter(|r| r.active) {
            if abort.is_aborted() {
                warn!(rule_id = %rule.id, "evaluation pass aborted before rule");
                summary.aborted = true;
                break;
            }

            match self.evaluate_rule(rule, now).await {
                Ok(RuleOutcome::CoolingDown) => summary.rules_skipped_cooldown += 1,
                Ok(RuleOutcome::Evaluated(outcome)) => {
                    summary.rules_evaluated += 1;
                    summary.notifications_created += outcome.created;
                }
                Err(RuleError::Configuration(e)) => {
                    warn!(rule_id = %rule.id, rule = %rule.name, error = %e, "skipping misconfigured rule");
                    self.audit(rule, AuditEvent::Misconfigured { error: e.to_string() });
                    summary.failures.push(RuleFailure {
                        rule_id: rule.id,
                        rule_name: rule.name.clone(),
                        error: e.to_string(),
                    });
                }
                Err(RuleError::Store(e)) => {
                    error!(rule_id = %rule.id, error = %e, "store failure, aborting pass");
                    self.audit(rule, AuditEvent::StoreFailed { error: e.to_string() });
                    return Err(e.into());
                }
            }
        }

        info!(
            notifications = summary.notifications_created,
            evaluated = summary.rules_evaluated,
            cooling = summary.rules_skipped_cooldown,
            failed = summary.failures.len(),
            aborted = summary.aborted,
            "evaluation pass complete"
        );
        Ok(summary)
    }

    async fn evaluate_rule(
        &self,
        rule: &NotificationRule,
        now: DateTime<Utc>,
    ) -> Result<RuleOutcome, RuleError> {
        if let CooldownState::Cooling { until } = cooldown_state(rule, now)? {
            debug!(rule_id = %rule.id, %until, "rule cooling down");
            self.audit(rule, AuditEvent::CoolingDown { until });
            return Ok(RuleOutcome::CoolingDown);
        }

        let mode = TriggerMode::for_rule(rule)?;
        let predicate = AttackPredicate::for_rule(rule, now)?;

        let matches = self.call("find", self.events.find(&predicate)).await?;
        self.audit(rule, AuditEvent::Matched { count: matches.len() });

        let outcome = self.fire(rule, mode, &matches, now).await?;
        self.audit(
            rule,
            AuditEvent::Completed {
                matched: matches.len(),
                created: outcome.created,
            },
        );
        Ok(RuleOutcome::Evaluated(outcome))
    }

    /// Await a store call under the configured timeout.
    async fn call<T, F>(&self, operation: &'static str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                operation,
                after: self.store_timeout,
            }),
        }
    }

    fn audit(&self, rule: &NotificationRule, event: AuditEvent) {
        if let Some(log) = &self.audit_log {
            log.record(rule.id, event);
        }
    }
}
