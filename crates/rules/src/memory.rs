//! In-memory store backing all three store traits.
//!
//! Used when no database is configured and throughout the tests. Each
//! collection sits behind its own `tokio::sync::RwLock`; the cooldown
//! compare-and-set and the dedup-aware insert happen under a single write
//! guard, so they are atomic with respect to other callers.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use attackwatch_core::{
    AttackEvent, AttackRef, Notification, NotificationRule, RuleId, RuleInput,
};

use crate::predicate::AttackPredicate;
use crate::store::{AttackPage, EventStore, NotificationStore, RuleStore, StoreResult};

#[derive(Default)]
pub struct MemoryStore {
    events: RwLock<Vec<AttackEvent>>,
    rules: RwLock<BTreeMap<RuleId, NotificationRule>>,
    notifications: RwLock<Vec<Notification>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored notifications.
    pub async fn notification_count(&self) -> usize {
        self.notifications.read().await.len()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn find(&self, predicate: &AttackPredicate) -> StoreResult<Vec<AttackEvent>> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| predicate.matches(e))
            .cloned()
            .collect())
    }

    async fn page(
        &self,
        predicate: &AttackPredicate,
        offset: usize,
        limit: usize,
    ) -> StoreResult<AttackPage> {
        let events = self.events.read().await;
        let mut matched: Vec<&AttackEvent> =
            events.iter().filter(|e| predicate.matches(e)).collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(AttackPage {
            total: matched.len(),
            items: matched
                .into_iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
        })
    }

    async fn insert_many(&self, new_events: &[AttackEvent]) -> StoreResult<usize> {
        let mut events = self.events.write().await;
        events.extend_from_slice(new_events);
        Ok(new_events.len())
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn list_active(&self) -> StoreResult<Vec<NotificationRule>> {
        let rules = self.rules.read().await;
        Ok(rules.values().filter(|r| r.active).cloned().collect())
    }

    async fn update_last_triggered(
        &self,
        rule_id: RuleId,
        expected: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut rules = self.rules.write().await;
        match rules.get_mut(&rule_id) {
            Some(rule) if rule.last_triggered_at == expected => {
                rule.last_triggered_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_last_triggered(
        &self,
        rule_id: RuleId,
        claimed: DateTime<Utc>,
        previous: Option<DateTime<Utc>>,
    ) -> StoreResult<bool> {
        let mut rules = self.rules.write().await;
        match rules.get_mut(&rule_id) {
            Some(rule) if rule.last_triggered_at == Some(claimed) => {
                rule.last_triggered_at = previous;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_all(&self) -> StoreResult<Vec<NotificationRule>> {
        let rules = self.rules.read().await;
        let mut all: Vec<NotificationRule> = rules.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn get(&self, rule_id: RuleId) -> StoreResult<Option<NotificationRule>> {
        Ok(self.rules.read().await.get(&rule_id).cloned())
    }

    async fn create(&self, rule: NotificationRule) -> StoreResult<NotificationRule> {
        self.rules.write().await.insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn update(
        &self,
        rule_id: RuleId,
        input: RuleInput,
    ) -> StoreResult<Option<NotificationRule>> {
        let mut rules = self.rules.write().await;
        Ok(rules.get_mut(&rule_id).map(|rule| {
            rule.apply(input);
            rule.clone()
        }))
    }

    async fn delete(&self, rule_id: RuleId) -> StoreResult<bool> {
        Ok(self.rules.write().await.remove(&rule_id).is_some())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn exists(&self, rule_name: &str, attack_id: &AttackRef) -> StoreResult<bool> {
        let notifications = self.notifications.read().await;
        Ok(notifications
            .iter()
            .any(|n| n.rule_name == rule_name && &n.attack_id == attack_id))
    }

    async fn insert(&self, notification: &Notification) -> StoreResult<bool> {
        let mut notifications = self.notifications.write().await;
        if notification.attack_id != AttackRef::Volume
            && notifications.iter().any(|n| {
                n.rule_name == notification.rule_name && n.attack_id == notification.attack_id
            })
        {
            return Ok(false);
        }
        notifications.push(notification.clone());
        Ok(true)
    }

    async fn list(
        &self,
        rule_name: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<Notification>> {
        let notifications = self.notifications.read().await;
        let mut selected: Vec<Notification> = notifications
            .iter()
            .filter(|n| rule_name.map_or(true, |name| n.rule_name == name))
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        selected.truncate(limit);
        Ok(selected)
    }
}
