//! Notification rule engine for recorded attacks.
//!
//! This crate provides:
//! - Predicate composition from optional rule filters
//! - Async store traits for events, rules and notifications, plus an
//!   in-memory implementation
//! - The batch evaluator (cooldown gate, per-event and volume triggers)
//! - A pass runner that serializes passes and drives the scheduled loop
//! - A bounded per-rule audit log and YAML rule seeding

pub mod audit_log;
pub mod cooldown;
pub mod error;
pub mod evaluator;
pub mod memory;
pub mod predicate;
pub mod runner;
pub mod seed;
pub mod store;

pub use error::{ConfigurationError, EvaluationError, StoreError};
pub use evaluator::{AbortSignal, EvaluationSummary, RuleEvaluator, RuleFailure};
pub use memory::MemoryStore;
pub use predicate::AttackPredicate;
pub use runner::{run_scheduled, PassRunner};
pub use seed::{load_rule_inputs, seed_rules, SeedError, SeedReport};
pub use store::{AttackPage, AttackStatistics, EventStore, NotificationStore, RuleStore, StoreResult};
