//! # PostPilot CLI
//!
//! Scheduled social posting daemon: posts images from a remote folder to
//! social accounts on cron or one-shot schedules, remembering what it
//! already posted across restarts.
//!
//! Usage:
//!   postpilot run                      # start the scheduler daemon
//!   postpilot config show              # print the effective config
//!   postpilot info                     # version and environment info

mod app;

use anyhow::Result;
use clap::{Parser, Subcommand};
use postpilot_channels::FileStoreClient;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "postpilot",
    version,
    about = "📸 PostPilot — scheduled social posting daemon",
    long_about = "Posts images from a remote folder to social accounts on cron or\none-shot schedules, with durable cross-run state."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Local config file path (skips the remote config download)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the scheduler daemon
    Run,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show system info
    Info,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "postpilot=debug,postpilot_scheduler=debug,postpilot_actions=debug,postpilot_channels=debug"
    } else {
        "postpilot=info,postpilot_scheduler=info,postpilot_actions=info,postpilot_channels=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let access_token = std::env::var("DROPBOX_ACCESS_TOKEN")
        .map_err(|_| anyhow::anyhow!("DROPBOX_ACCESS_TOKEN is not set"))?;

    match cli.command {
        Commands::Run => {
            println!("📸 PostPilot v{}", env!("CARGO_PKG_VERSION"));
            let app = app::App::start(&access_token, cli.config.as_deref()).await?;
            app.run_until_shutdown().await?;
            println!("👋 Goodbye!");
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let files = FileStoreClient::new(&access_token);
                let config = app::load_config(&files, cli.config.as_deref()).await?;
                let content = toml::to_string_pretty(&config)?;
                println!("{content}");
            }
        },

        Commands::Info => {
            println!("📸 PostPilot v{}", env!("CARGO_PKG_VERSION"));
            println!("   Platform: {} / {}", std::env::consts::OS, std::env::consts::ARCH);
            println!("   Remote config: {}", app::CONFIG_PATH);
            println!("   Remote store:  {}", app::STORE_PATH);
        }
    }

    Ok(())
}
