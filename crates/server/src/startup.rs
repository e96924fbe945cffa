//! Server startup: shared state initialization and rule seeding.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use attackwatch_core::Config;
use attackwatch_rules::{load_rule_inputs, seed_rules, SeedReport};

use crate::generator::generate_attacks;
use crate::state::{AppState, Stores};

/// Connect the stores, build `AppState` and seed rules from the configured file.
pub async fn build_app_state(config: Config) -> anyhow::Result<Arc<AppState>> {
    let stores = Stores::connect(&config.postgres).await;
    info!(store = stores.backend, "stores ready");

    let state = Arc::new(AppState::new(config, stores));
    seed_from_config(&state).await?;
    Ok(state)
}

/// Load `RULES_SEED_FILE` into the rule store. A missing or unreadable file
/// is logged and ignored; store failures are returned.
pub async fn seed_from_config(state: &AppState) -> anyhow::Result<Option<SeedReport>> {
    let Some(path) = state.config.seed.rules_file.as_deref() else {
        return Ok(None);
    };

    let inputs = match load_rule_inputs(path) {
        Ok(inputs) => inputs,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read rule seed file");
            return Ok(None);
        }
    };

    let report = seed_rules(state.stores.rules.as_ref(), inputs, Utc::now()).await?;
    info!(
        path = %path.display(),
        created = report.created.len(),
        skipped = report.skipped.len(),
        "rule seeding complete"
    );
    Ok(Some(report))
}

/// Insert `count` synthetic attacks, returning how many were stored.
pub async fn generate_into(state: &AppState, count: usize) -> anyhow::Result<usize> {
    let attacks = generate_attacks(count, Utc::now(), &mut rand::thread_rng());
    let inserted = state.stores.events.insert_many(&attacks).await?;
    info!(requested = count, inserted, "synthetic attacks generated");
    Ok(inserted)
}
