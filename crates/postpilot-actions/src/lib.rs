//! # PostPilot Actions
//! Pluggable units of work bound to schedules. Each action validates its
//! static arguments from config once at bind time, then executes against
//! the shared store on every trigger.
//!
//! ## Action Registry
//! | Action | Description |
//! |--------|-------------|
//! | upload_image | Pick an unposted image from a remote folder and post it |

pub mod upload_image;

use std::sync::Arc;

use async_trait::async_trait;
use postpilot_channels::{FileStoreClient, InstagramSession};
use postpilot_core::config::{Config, TaskDefinition};
use postpilot_core::error::Result;
use postpilot_store::Store;
use serde_json::Value;

/// Everything an invocation carries besides the store: the merged
/// arguments, the account identity, and the external clients.
#[derive(Clone)]
pub struct ActionContext {
    /// Account this invocation posts as.
    pub account_name: String,
    /// Open session for that account.
    pub session: Arc<InstagramSession>,
    /// Remote file store client.
    pub files: Arc<FileStoreClient>,
    /// Static args deep-merged with the account identity.
    pub args: Value,
}

/// A pluggable action: a load/validate phase and an execute phase.
#[async_trait]
pub trait Action: Send + Sync {
    /// Action name as referenced by task definitions.
    fn name(&self) -> &str;

    /// Resolve and validate the action's static arguments from config.
    fn load_from_config(&self, config: &Config, task_def: &TaskDefinition) -> Result<Value>;

    /// Run one invocation against the shared store. Errors are caught
    /// and logged by the scheduler; they never reach other tasks.
    async fn execute(&self, ctx: &ActionContext, store: &Store) -> Result<()>;
}

/// Action registry: lookup table from action name to implementation.
pub struct ActionRegistry {
    actions: Vec<Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self { actions: vec![] }
    }

    pub fn register(&mut self, action: Arc<dyn Action>) {
        self.actions.push(action);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.iter().find(|a| a.name() == name).cloned()
    }

    /// Registry with the built-in actions.
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        reg.register(Arc::new(upload_image::UploadImage));
        reg
    }

    pub fn count(&self) -> usize {
        self.actions.len()
    }

    /// List action names only.
    pub fn action_names(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.name().to_string()).collect()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
