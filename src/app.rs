//! Application lifecycle.
//!
//! Startup order matters: external clients first, then config, then the
//! persisted store, then account sessions, then binding and scheduling.
//! Shutdown flushes the store snapshot back to the remote file store
//! when anything changed since startup.

use std::collections::HashMap;
use std::sync::Arc;

use postpilot_actions::ActionRegistry;
use postpilot_channels::{FileStoreClient, InstagramSession};
use postpilot_core::config::Config;
use postpilot_core::error::{PostPilotError, Result};
use postpilot_scheduler::{Scheduler, bind_tasks};
use postpilot_store::Store;
use tracing::{error, info, warn};

/// Remote path of the TOML configuration.
pub const CONFIG_PATH: &str = "/config.toml";
/// Remote path of the persisted store snapshot.
pub const STORE_PATH: &str = "/.store.json";

/// The running application: clients, shared store, armed scheduler.
pub struct App {
    files: Arc<FileStoreClient>,
    store: Arc<Store>,
    scheduler: Scheduler,
}

impl App {
    /// Run the full startup sequence and arm the scheduler.
    pub async fn start(access_token: &str, local_config: Option<&str>) -> Result<App> {
        let files = Arc::new(FileStoreClient::new(access_token));

        info!("loading config..");
        let config = load_config(&files, local_config).await?;

        info!("loading store..");
        let store = Arc::new(load_store(&files).await?);

        info!("opening account sessions..");
        let sessions = open_sessions(&config).await?;

        info!("scheduling tasks..");
        let registry = ActionRegistry::with_defaults();
        let tasks = bind_tasks(&config, &registry, &sessions, &files);
        let scheduler = Scheduler::schedule(tasks, Arc::clone(&store));
        info!("{} timer(s) armed", scheduler.armed_timers());

        Ok(App {
            files,
            store,
            scheduler,
        })
    }

    /// Block until ctrl-c or SIGTERM, then flush the store if dirty.
    /// A failed flush is logged; exit proceeds regardless.
    pub async fn run_until_shutdown(self) -> Result<()> {
        wait_for_shutdown().await;
        info!("shutting down..");
        self.scheduler.shutdown();

        if self.store.is_dirty() {
            match save_store(&self.files, &self.store).await {
                Ok(()) => info!("store saved"),
                Err(e) => error!("failed to save store: {e}"),
            }
        }
        Ok(())
    }
}

/// Load config from a local override path, or download it from the
/// remote file store.
pub async fn load_config(files: &FileStoreClient, local: Option<&str>) -> Result<Config> {
    if let Some(path) = local {
        return Config::load_from(std::path::Path::new(path));
    }
    let bytes = files.download_file(CONFIG_PATH).await?;
    let text = String::from_utf8(bytes)
        .map_err(|e| PostPilotError::Config(format!("config is not valid UTF-8: {e}")))?;
    Config::from_toml(&text)
}

/// Load the persisted store snapshot.
async fn load_store(files: &FileStoreClient) -> Result<Store> {
    store_from_snapshot(files.download_file(STORE_PATH).await)
}

/// Recovery policy: no snapshot yet (first run) and a corrupt snapshot
/// both yield an empty store; any other persistence error aborts
/// startup.
fn store_from_snapshot(snapshot: Result<Vec<u8>>) -> Result<Store> {
    match snapshot {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(state) => Ok(Store::with_state(state)),
            Err(e) => {
                warn!("malformed store snapshot, starting empty: {e}");
                Ok(Store::new())
            }
        },
        Err(PostPilotError::RemoteNotFound(_)) => Ok(Store::new()),
        Err(e) => Err(e),
    }
}

/// Serialize and upload the store snapshot, replacing the previous one.
async fn save_store(files: &FileStoreClient, store: &Store) -> Result<()> {
    let json = serde_json::to_vec_pretty(&store.snapshot())?;
    files.upload_file(STORE_PATH, json, true).await
}

/// Open one session per configured account, sequentially. Any login
/// failure aborts startup.
async fn open_sessions(config: &Config) -> Result<HashMap<String, Arc<InstagramSession>>> {
    let mut sessions = HashMap::new();
    for (name, account) in &config.accounts {
        info!("  - {name}..");
        let mut session = InstagramSession::new(name.clone());
        session.login(&account.password).await?;
        sessions.insert(name.clone(), Arc::new(session));
    }
    Ok(sessions)
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}
