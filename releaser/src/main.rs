//! Releaser - Entry Point
//!
//! Builds a new timestamped release of a git branch on every configured
//! server and optionally promotes it to `current`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;
use tracing::warn;

use releaser::deploy::events::{log_events, EventBus};
use releaser::deploy::pipeline::ReleasePipeline;
use releaser::deploy::publish::Publisher;
use releaser::errors::ReleaseError;
use releaser::history::{ReleaseHistory, RemoteReleaseHistory};
use releaser::logs::{init_logging, LogLevel};
use releaser::remote::ssh::SshExecutor;
use releaser::settings::{Settings, DEFAULT_SETTINGS_FILE};
use releaser::utils::version_info;

#[derive(Debug, Parser)]
#[command(name = "releaser", about = "Timestamped git releases on remote servers")]
struct Cli {
    /// Settings file
    #[arg(short, long, env = "RELEASER_CONFIG", default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a new release and check out the configured branch
    Update,
    /// Update, then point `current` at the new release
    Deploy,
    /// Show the active release and its revision
    Current,
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            if e.downcast_ref::<ReleaseError>().is_some_and(ReleaseError::is_remote) {
                eprintln!("The unfinished release directory was left on the servers.");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Version = cli.command {
        println!("{}", serde_json::to_string_pretty(&version_info())?);
        return Ok(());
    }

    let settings = Settings::load(&cli.config)
        .await
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let mut log_options = settings.log_options();
    if let Some(level) = cli.log_level {
        log_options.log_level = level;
    }
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let executor = Arc::new(SshExecutor::new(settings.targets()?, settings.ssh.clone())?);
    let history = RemoteReleaseHistory::new(executor.clone(), settings.deploy_to.clone());
    let events = EventBus::new();
    let logger = tokio::spawn(log_events(events.subscribe()));

    let result = execute(cli.command, &settings, executor, history, events).await;

    // every bus clone is gone once execute returns, so the logger finishes
    if let Err(e) = logger.await {
        warn!("Event logger stopped: {}", e);
    }
    result
}

async fn execute(
    command: Commands,
    settings: &Settings,
    executor: Arc<SshExecutor>,
    history: RemoteReleaseHistory<Arc<SshExecutor>>,
    events: EventBus,
) -> anyhow::Result<()> {
    match command {
        Commands::Update => {
            let pipeline = ReleasePipeline::new(settings.pipeline_config(), executor, history)
                .with_events(events);
            let state = pipeline.update().await.context("update failed")?;
            println!("{}", serde_json::to_string_pretty(&state)?);
            eprintln!(
                "{} release {} updated",
                "✔".green(),
                display_opt(state.release_dirname())
            );
        }
        Commands::Deploy => {
            let pipeline =
                ReleasePipeline::new(settings.pipeline_config(), executor.clone(), history)
                    .with_events(events.clone());
            let state = pipeline.update().await.context("update failed")?;
            let release = Publisher::new(executor, settings.deploy_to.clone())
                .with_events(events)
                .publish(&state)
                .await
                .context("publish failed")?;
            println!("{}", serde_json::to_string_pretty(&state)?);
            eprintln!(
                "{} release {} published at revision {}",
                "✔".green(),
                release,
                display_opt(state.current_revision())
            );
        }
        Commands::Current => {
            let release = history.current_release_name().await?;
            let revision = match &release {
                Some(release) => history.revision_of(release).await?,
                None => None,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "release": release, "revision": revision }))?
            );
        }
        // printed before loading settings
        Commands::Version => {}
    }

    Ok(())
}

fn display_opt<T: std::fmt::Display>(value: Option<&T>) -> String {
    value.map(ToString::to_string).unwrap_or_else(|| "-".to_string())
}
