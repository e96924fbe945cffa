//! Store abstractions consumed by the evaluator and the API layer.
//!
//! Implementations must be safe to share across tasks. The evaluator puts
//! its own timeout around every call, so implementations do not need one.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use attackwatch_core::{AttackEvent, AttackRef, Notification, NotificationRule, RuleId, RuleInput};

use crate::error::StoreError;
use crate::predicate::AttackPredicate;

pub type StoreResult<T> = Result<T, StoreError>;

/// One page of attacks plus the total number of matches.
#[derive(Debug, Clone, Serialize)]
pub struct AttackPage {
    pub total: usize,
    pub items: Vec<AttackEvent>,
}

/// Attack counts grouped by country, type and severity.
///
/// Both endpoints of an attack count towards `by_country`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttackStatistics {
    pub by_country: BTreeMap<String, u64>,
    pub by_attack_type: BTreeMap<String, u64>,
    pub by_severity: BTreeMap<i32, u64>,
}

impl AttackStatistics {
    pub fn record(&mut self, event: &AttackEvent) {
        *self
            .by_country
            .entry(event.source_country().to_string())
            .or_default() += 1;
        *self
            .by_country
            .entry(event.dest_country().to_string())
            .or_default() += 1;
        *self
            .by_attack_type
            .entry(event.attack_type.clone())
            .or_default() += 1;
        *self.by_severity.entry(event.severity).or_default() += 1;
    }
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// All attacks satisfying the predicate, in no particular order.
    async fn find(&self, predicate: &AttackPredicate) -> StoreResult<Vec<AttackEvent>>;

    /// Matching attacks newest first, skipping `offset` and returning at
    /// most `limit`.
    async fn page(
        &self,
        predicate: &AttackPredicate,
        offset: usize,
        limit: usize,
    ) -> StoreResult<AttackPage>;

    /// Append attacks; returns how many were stored.
    async fn insert_many(&self, events: &[AttackEvent]) -> StoreResult<usize>;

    /// Counts over the whole store.
    async fn statistics(&self) -> StoreResult<AttackStatistics> {
        let mut stats = AttackStatistics::default();
        for event in self.find(&AttackPredicate::all()).await? {
            stats.record(&event);
        }
        Ok(stats)
    }
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn list_active(&self) -> StoreResult<Vec<NotificationRule>>;

    /// Compare-and-set of the cooldown marker.
    ///
    /// Writes `at` only if the stored value still equals `expected`; returns
    /// whether the write happened.
    async fn update_last_triggered(
        &self,
        rule_id: RuleId,
        expected: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Undo a claim made by [`RuleStore::update_last_triggered`].
    ///
    /// Restores `previous` only if the marker still holds `claimed`, so a
    /// newer claim by another pass is left alone.
    async fn release_last_triggered(
        &self,
        rule_id: RuleId,
        claimed: DateTime<Utc>,
        previous: Option<DateTime<Utc>>,
    ) -> StoreResult<bool>;

    async fn list_all(&self) -> StoreResult<Vec<NotificationRule>>;

    async fn get(&self, rule_id: RuleId) -> StoreResult<Option<NotificationRule>>;

    async fn create(&self, rule: NotificationRule) -> StoreResult<NotificationRule>;

    /// Replace a rule's configuration; cooldown state is kept.
    async fn update(
        &self,
        rule_id: RuleId,
        input: RuleInput,
    ) -> StoreResult<Option<NotificationRule>>;

    async fn delete(&self, rule_id: RuleId) -> StoreResult<bool>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn exists(&self, rule_name: &str, attack_id: &AttackRef) -> StoreResult<bool>;

    /// Append a notification. Returns `false` when the store already holds a
    /// per-event notification for the same `(rule_name, attack_id)`.
    async fn insert(&self, notification: &Notification) -> StoreResult<bool>;

    /// Newest first, optionally restricted to one rule name.
    async fn list(&self, rule_name: Option<&str>, limit: usize)
        -> StoreResult<Vec<Notification>>;
}
