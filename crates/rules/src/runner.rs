//! Pass serialization and the scheduled evaluation loop.
//!
//! Passes triggered by the timer and by the API share one [`PassRunner`],
//! which holds a mutex for the duration of a pass so two passes never
//! interleave inside this process.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::EvaluationError;
use crate::evaluator::{AbortSignal, EvaluationSummary, RuleEvaluator};

pub struct PassRunner {
    evaluator: RuleEvaluator,
    gate: Mutex<()>,
    abort: AbortSignal,
    last_summary: RwLock<Option<EvaluationSummary>>,
}

impl PassRunner {
    pub fn new(evaluator: RuleEvaluator) -> Self {
        Self {
            evaluator,
            gate: Mutex::new(()),
            abort: AbortSignal::new(),
            last_summary: RwLock::new(None),
        }
    }

    /// Run a pass at `now`, waiting for any pass already in flight.
    pub async fn run_evaluation_pass(
        &self,
        now: DateTime<Utc>,
    ) -> Result<EvaluationSummary, EvaluationError> {
        let _guard = self.gate.lock().await;
        self.run_locked(now).await
    }

    /// Run a pass at `now` unless one is already running.
    pub async fn try_run_evaluation_pass(
        &self,
        now: DateTime<Utc>,
    ) -> Result<EvaluationSummary, EvaluationError> {
        let Ok(_guard) = self.gate.try_lock() else {
            return Err(EvaluationError::PassInProgress);
        };
        self.run_locked(now).await
    }

    async fn run_locked(&self, now: DateTime<Utc>) -> Result<EvaluationSummary, EvaluationError> {
        let summary = self.evaluator.evaluate_with_abort(now, &self.abort).await?;
        *self
            .last_summary
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(summary.clone());
        Ok(summary)
    }

    /// Stop the running pass before its next rule. Later passes stop
    /// immediately as well.
    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }

    /// Summary of the most recent successful pass.
    pub fn last_summary(&self) -> Option<EvaluationSummary> {
        self.last_summary
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Evaluate every `interval` until `shutdown` is notified or the runner is
/// aborted. A tick that finds a pass already running is skipped.
///
/// Callers should signal with [`Notify::notify_one`] so a shutdown raised
/// while a pass is running is not lost.
pub async fn run_scheduled(runner: Arc<PassRunner>, interval: Duration, shutdown: Arc<Notify>) {
    info!(interval_secs = interval.as_secs_f64(), "scheduled evaluation started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.notified() => {
                runner.abort();
                break;
            }
        }

        if runner.is_aborted() {
            break;
        }

        match runner.try_run_evaluation_pass(Utc::now()).await {
            Ok(summary) if summary.notifications_created > 0 => info!(
                notifications = summary.notifications_created,
                rules = summary.rules_evaluated,
                "scheduled pass created notifications"
            ),
            Ok(summary) => debug!(rules = summary.rules_evaluated, "scheduled pass complete"),
            Err(EvaluationError::PassInProgress) => {
                debug!("pass already running, skipping tick")
            }
            Err(e) => error!(error = %e, "scheduled pass failed"),
        }
    }

    warn!("scheduled evaluation stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::RuleStore;
    use attackwatch_core::{NotificationRule, RuleInput};

    async fn runner_with_rule() -> Arc<PassRunner> {
        let store = Arc::new(MemoryStore::new());
        let input: RuleInput = serde_json::from_value(serde_json::json!({"name": "all"})).unwrap();
        store
            .create(NotificationRule::from_input(input, Utc::now()))
            .await
            .unwrap();
        let evaluator = RuleEvaluator::new(store.clone(), store.clone(), store);
        Arc::new(PassRunner::new(evaluator))
    }

    #[tokio::test]
    async fn pass_records_last_summary() {
        let runner = runner_with_rule().await;
        assert!(runner.last_summary().is_none());

        let now = Utc::now();
        let summary = runner.run_evaluation_pass(now).await.unwrap();
        assert_eq!(summary.rules_evaluated, 1);
        assert_eq!(runner.last_summary().unwrap().evaluated_at, now);
    }

    #[tokio::test]
    async fn try_run_refuses_while_gate_held() {
        let runner = runner_with_rule().await;
        let guard = runner.gate.lock().await;

        let err = runner.try_run_evaluation_pass(Utc::now()).await.unwrap_err();
        assert!(matches!(err, EvaluationError::PassInProgress));

        drop(guard);
        assert!(runner.try_run_evaluation_pass(Utc::now()).await.is_ok());
    }

    #[tokio::test]
    async fn abort_is_sticky() {
        let runner = runner_with_rule().await;
        runner.abort();
        assert!(runner.abort_signal().is_aborted());

        let summary = runner.run_evaluation_pass(Utc::now()).await.unwrap();
        assert!(summary.aborted);
        assert_eq!(summary.rules_evaluated, 0);
    }

    #[tokio::test]
    async fn scheduled_loop_runs_and_stops_on_shutdown() {
        let runner = runner_with_rule().await;
        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(run_scheduled(
            runner.clone(),
            Duration::from_millis(10),
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop should stop after shutdown")
            .unwrap();

        assert!(runner.last_summary().is_some());
        assert!(runner.is_aborted());
    }
}
