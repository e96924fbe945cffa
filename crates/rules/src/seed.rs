//! Seeding rules from a YAML file at startup.
//!
//! The file holds a sequence of rule definitions:
//!
//! ```yaml
//! - name: ddos-usa
//!   attack_type: DDoS
//!   country: USA
//!   min_severity: 8
//! - name: ransomware-burst
//!   attack_type: Ransomware
//!   threshold_count: 5
//!   time_window_minutes: 60
//! ```
//!
//! Entries that fail to parse or validate are skipped with a warning. A rule
//! is only created when no stored rule has the same name.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use attackwatch_core::{NotificationRule, RuleInput};

use crate::store::{RuleStore, StoreResult};

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("seed file must contain a list of rules")]
    NotASequence,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
}

/// Parse rule definitions from YAML text. Entries with the wrong shape are
/// dropped with a warning.
pub fn parse_rule_inputs(yaml: &str) -> Result<Vec<RuleInput>, SeedError> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    let entries = match value {
        serde_yaml::Value::Sequence(entries) => entries,
        serde_yaml::Value::Null => return Ok(Vec::new()),
        _ => return Err(SeedError::NotASequence),
    };

    let mut inputs = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_yaml::from_value::<RuleInput>(entry) {
            Ok(input) => inputs.push(input),
            Err(e) => warn!(index, error = %e, "skipping unparseable seed rule"),
        }
    }
    Ok(inputs)
}

pub fn load_rule_inputs(path: &Path) -> Result<Vec<RuleInput>, SeedError> {
    let content = fs::read_to_string(path)?;
    parse_rule_inputs(&content)
}

/// Create every valid input whose name is not taken yet.
pub async fn seed_rules(
    store: &dyn RuleStore,
    inputs: Vec<RuleInput>,
    now: DateTime<Utc>,
) -> StoreResult<SeedReport> {
    let mut taken: HashSet<String> = store
        .list_all()
        .await?
        .into_iter()
        .map(|r| r.name)
        .collect();
    let mut report = SeedReport::default();

    for input in inputs {
        let input = input.normalized();
        if let Err(e) = input.validate() {
            warn!(rule = %input.name, error = %e, "skipping invalid seed rule");
            report.skipped.push(input.name);
            continue;
        }
        if !taken.insert(input.name.clone()) {
            report.skipped.push(input.name);
            continue;
        }

        let rule = store.create(NotificationRule::from_input(input, now)).await?;
        info!(rule_id = %rule.id, rule = %rule.name, "seeded rule");
        report.created.push(rule.name);
    }

    Ok(report)
}
