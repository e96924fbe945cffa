//! Per-rule evaluation history.
//!
//! Every step the evaluator takes for a rule (gated by cooldown, matched,
//! triggered, failed) is recorded as a typed [`AuditEvent`]. Each rule keeps
//! at most `capacity` entries; the oldest are dropped first.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use attackwatch_core::{AttackId, RuleId};

pub const DEFAULT_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// What happened to a rule during a pass.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    CoolingDown { until: DateTime<Utc> },
    Misconfigured { error: String },
    Matched { count: usize },
    VolumeReached { matched: usize, threshold: usize },
    Notified { attack_id: AttackId },
    /// A concurrent pass moved the cooldown marker first.
    ClaimLost,
    /// The cooldown marker was put back after a failed notification write.
    ClaimReleased { restored: Option<DateTime<Utc>> },
    StoreFailed { error: String },
    Completed { matched: usize, created: usize },
}

impl AuditEvent {
    pub fn level(&self) -> LogLevel {
        match self {
            AuditEvent::CoolingDown { .. } | AuditEvent::Matched { .. } => LogLevel::Debug,
            AuditEvent::VolumeReached { .. }
            | AuditEvent::Notified { .. }
            | AuditEvent::Completed { .. } => LogLevel::Info,
            AuditEvent::Misconfigured { .. }
            | AuditEvent::ClaimLost
            | AuditEvent::ClaimReleased { .. } => LogLevel::Warning,
            AuditEvent::StoreFailed { .. } => LogLevel::Error,
        }
    }

    /// The serialized `event` tag.
    pub fn name(&self) -> &'static str {
        match self {
            AuditEvent::CoolingDown { .. } => "cooling_down",
            AuditEvent::Misconfigured { .. } => "misconfigured",
            AuditEvent::Matched { .. } => "matched",
            AuditEvent::VolumeReached { .. } => "volume_reached",
            AuditEvent::Notified { .. } => "notified",
            AuditEvent::ClaimLost => "claim_lost",
            AuditEvent::ClaimReleased { .. } => "claim_released",
            AuditEvent::StoreFailed { .. } => "store_failed",
            AuditEvent::Completed { .. } => "completed",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    #[serde(flatten)]
    pub event: AuditEvent,
}

/// Selection applied by [`AuditLog::entries`].
#[derive(Debug, Clone)]
pub struct AuditFilter {
    pub min_level: LogLevel,
    /// Only entries whose event tag equals this.
    pub event: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: usize,
}

impl Default for AuditFilter {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Debug,
            event: None,
            since: None,
            limit: 100,
        }
    }
}

impl AuditFilter {
    fn accepts(&self, entry: &AuditEntry) -> bool {
        entry.level >= self.min_level
            && self.event.as_deref().map_or(true, |e| entry.event.name() == e)
            && self.since.map_or(true, |s| entry.at >= s)
    }
}

pub struct AuditLog {
    rules: Mutex<HashMap<RuleId, VecDeque<AuditEntry>>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rules: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, rule_id: RuleId, event: AuditEvent) {
        self.record_at(rule_id, Utc::now(), event);
    }

    pub fn record_at(&self, rule_id: RuleId, at: DateTime<Utc>, event: AuditEvent) {
        let entry = AuditEntry {
            at,
            level: event.level(),
            event,
        };
        let mut rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        let history = rules.entry(rule_id).or_default();
        if history.len() == self.capacity {
            history.pop_front();
        }
        history.push_back(entry);
    }

    /// Matching entries for `rule_id`, newest first.
    pub fn entries(&self, rule_id: RuleId, filter: &AuditFilter) -> Vec<AuditEntry> {
        let rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        rules
            .get(&rule_id)
            .map(|history| {
                history
                    .iter()
                    .rev()
                    .filter(|e| filter.accepts(e))
                    .take(filter.limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn forget(&self, rule_id: RuleId) {
        self.rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&rule_id);
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}
