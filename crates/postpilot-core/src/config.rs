//! Configuration model for PostPilot.
//!
//! One TOML document drives the whole daemon: account credentials, named
//! task definitions, hashtag pools, and the schedule entries that bind a
//! task definition to an account. The daemon normally downloads it from
//! the remote file store; a local path can override that for development.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PostPilotError, Result};

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Named social account credentials.
    #[serde(default)]
    pub accounts: HashMap<String, AccountConfig>,

    /// Named task definitions (action kind + action-specific parameters).
    #[serde(default)]
    pub task_definitions: HashMap<String, TaskDefinition>,

    /// Named hashtag pools referenced by task definitions.
    #[serde(default)]
    pub hashtag_groups: HashMap<String, Vec<String>>,

    /// Schedule entries binding a task definition to an account.
    #[serde(default)]
    pub schedule_tasks: Vec<ScheduleEntry>,
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| PostPilotError::Config(format!("cannot parse config: {e}")))
    }

    /// Read and parse a local config file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }
}

/// Credentials for one social account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub password: String,
}

/// A named task definition: which action to run, plus whatever extra
/// keys that action reads in its `load_from_config` phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Action name, resolved against the action registry at bind time.
    pub action: String,

    /// Action-specific parameters, passed through untyped.
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// One schedule entry: a task, an account, and its trigger descriptors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Task definition name.
    pub task: String,

    /// Account name.
    pub account: String,

    /// When true the entry is skipped silently.
    #[serde(default)]
    pub disabled: bool,

    /// Raw trigger descriptors, normalized by the scheduler crate.
    #[serde(default)]
    pub schedule: Vec<ScheduleSpec>,
}

/// A raw trigger descriptor as written in config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSpec {
    /// `"cron"` or `"date"`.
    pub mode: String,

    /// Cron expression, or an absolute timestamp.
    pub spec: String,
}
