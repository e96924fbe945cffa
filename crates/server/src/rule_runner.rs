//! Background rule evaluation loop.
//!
//! Spawns a tokio task that runs an evaluation pass every configured
//! interval until shutdown is signalled.

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::info;

use attackwatch_rules::run_scheduled;

use crate::state::AppState;

/// Start the scheduled loop, or return `None` when evaluation is disabled.
///
/// Wake the loop with `shutdown.notify_one()`; it aborts any running pass
/// between rules and exits.
pub fn spawn_rule_loop(state: &AppState, shutdown: Arc<Notify>) -> Option<JoinHandle<()>> {
    let evaluator = &state.config.evaluator;
    if !evaluator.enabled {
        info!("scheduled rule evaluation disabled");
        return None;
    }

    let interval = evaluator.interval();
    info!(interval_secs = interval.as_secs(), "scheduled rule evaluation enabled");
    Some(tokio::spawn(run_scheduled(
        state.runner.clone(),
        interval,
        shutdown,
    )))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use attackwatch_core::Config;

    use super::*;
    use crate::state::Stores;

    #[tokio::test]
    async fn disabled_loop_is_not_spawned() {
        let mut config = Config::for_profile("");
        config.evaluator.enabled = false;
        let state = AppState::new(config, Stores::memory());
        assert!(spawn_rule_loop(&state, Arc::new(Notify::new())).is_none());
    }

    #[tokio::test]
    async fn loop_runs_and_stops_on_shutdown() {
        let mut config = Config::for_profile("");
        config.evaluator.enabled = true;
        config.evaluator.interval_secs = 1;
        let state = AppState::new(config, Stores::memory());
        let shutdown = Arc::new(Notify::new());

        let handle = spawn_rule_loop(&state, shutdown.clone()).expect("loop should spawn");
        // The first tick fires immediately.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(state.runner.last_summary().is_some());

        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop should stop")
            .expect("loop should not panic");
        assert!(state.runner.is_aborted());
    }
}
