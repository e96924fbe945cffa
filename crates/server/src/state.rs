use std::sync::Arc;

use sqlx::PgPool;

use attackwatch_core::config::PostgresConfig;
use attackwatch_core::Config;
use attackwatch_rules::audit_log::AuditLog;
use attackwatch_rules::{
    EventStore, MemoryStore, NotificationStore, PassRunner, RuleEvaluator, RuleStore,
};

use crate::db;
use crate::pg_store::PgStore;

/// The three stores plus a label for the backend behind them.
#[derive(Clone)]
pub struct Stores {
    pub events: Arc<dyn EventStore>,
    pub rules: Arc<dyn RuleStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub backend: &'static str,
}

impl Stores {
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            events: store.clone(),
            rules: store.clone(),
            notifications: store,
            backend: "memory",
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            events: store.clone(),
            rules: store.clone(),
            notifications: store,
            backend: "postgres",
        }
    }

    /// Postgres when configured and reachable, otherwise in-memory.
    pub async fn connect(config: &PostgresConfig) -> Self {
        match db::init_pg_pool(config).await {
            Some(pool) => Self::postgres(pool),
            None => Self::memory(),
        }
    }
}

pub struct AppState {
    pub config: Config,
    pub stores: Stores,
    pub audit_log: Arc<AuditLog>,
    pub runner: Arc<PassRunner>,
}

impl AppState {
    pub fn new(config: Config, stores: Stores) -> Self {
        let audit_log = Arc::new(AuditLog::with_capacity(
            config.evaluator.audit_log_max_entries,
        ));
        let evaluator = RuleEvaluator::new(
            stores.events.clone(),
            stores.rules.clone(),
            stores.notifications.clone(),
        )
        .with_store_timeout(config.evaluator.store_timeout())
        .with_audit_log(audit_log.clone());

        Self {
            config,
            stores,
            audit_log,
            runner: Arc::new(PassRunner::new(evaluator)),
        }
    }
}
