//! Task binding.
//!
//! Resolves schedule entries against task definitions, the action
//! registry, and open account sessions. Binding failures are per-task:
//! a broken entry is logged and skipped while its siblings still
//! schedule.

use std::collections::HashMap;
use std::sync::Arc;

use postpilot_actions::{Action, ActionContext, ActionRegistry};
use postpilot_channels::{FileStoreClient, InstagramSession};
use postpilot_core::config::{Config, ScheduleEntry};
use postpilot_core::error::{PostPilotError, Result};
use serde_json::{Value, json};
use tracing::warn;

use crate::rules::{ScheduleRule, parse_rules};

/// A task definition bound to one account and a set of schedule rules.
pub struct BoundTask {
    pub task_name: String,
    pub action: Arc<dyn Action>,
    pub context: ActionContext,
    pub rules: Vec<ScheduleRule>,
}

/// Bind every enabled schedule entry in `config`.
///
/// Entries that fail to bind are logged and dropped; the remainder is
/// returned ready for scheduling.
pub fn bind_tasks(
    config: &Config,
    registry: &ActionRegistry,
    sessions: &HashMap<String, Arc<InstagramSession>>,
    files: &Arc<FileStoreClient>,
) -> Vec<BoundTask> {
    let mut bound = Vec::new();
    for entry in &config.schedule_tasks {
        if entry.disabled {
            continue;
        }
        match bind_entry(config, registry, sessions, files, entry) {
            Ok(task) => bound.push(task),
            Err(e) => warn!("task '{}' cannot be scheduled: {e}", entry.task),
        }
    }
    bound
}

fn bind_entry(
    config: &Config,
    registry: &ActionRegistry,
    sessions: &HashMap<String, Arc<InstagramSession>>,
    files: &Arc<FileStoreClient>,
    entry: &ScheduleEntry,
) -> Result<BoundTask> {
    let task_def = config.task_definitions.get(&entry.task).ok_or_else(|| {
        PostPilotError::Config(format!("task definition not found: {}", entry.task))
    })?;

    let action = registry
        .get(&task_def.action)
        .ok_or_else(|| PostPilotError::UnknownAction(task_def.action.clone()))?;

    let static_args = action
        .load_from_config(config, task_def)
        .map_err(|e| PostPilotError::Task(format!("loading task '{}': {e}", entry.task)))?;

    let session = sessions
        .get(&entry.account)
        .ok_or_else(|| PostPilotError::AccountNotFound(entry.account.clone()))?;

    let rules = parse_rules(&entry.schedule)?;

    Ok(BoundTask {
        task_name: entry.task.clone(),
        action,
        context: ActionContext {
            account_name: entry.account.clone(),
            session: Arc::clone(session),
            files: Arc::clone(files),
            args: merge_account(&static_args, &entry.account),
        },
        rules,
    })
}

/// Static args plus the account identity, merged into a fresh tree.
///
/// The static args object is never mutated: two accounts sharing one
/// task definition get independent argument copies.
fn merge_account(static_args: &Value, account_name: &str) -> Value {
    let mut merged = static_args.clone();
    deep_merge(&mut merged, &json!({ "account_name": account_name }));
    merged
}

/// Recursive object merge; non-object values on the right replace the
/// left-hand slot.
fn deep_merge(target: &mut Value, overlay: &Value) {
    match (target, overlay) {
        (Value::Object(target_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                deep_merge(
                    target_map.entry(key.clone()).or_insert(Value::Null),
                    value,
                );
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}
