//! workday-daemon: background host and CLI for the workday tracker.
//!
//! ## Subcommands
//!
//! - `run`: Poll loop that owns the engine until SIGINT/SIGTERM
//! - `status`: Print today's numbers (`--json` for machine output)
//! - `pause` / `resume` / `toggle`: Control the pause state
//! - `reset`: Discard today's session and start over from now
//! - `history`: List archived days (`--month YYYY-MM` to filter)
//! - `settings`: Print the effective settings
//!
//! All commands share one storage root (`~/.workday`, or `WORKDAY_HOME`, or
//! `--root`). While `run` is active it is the only writer: it holds
//! `daemon.pid`, and `pause`/`resume`/`toggle`/`reset` are queued for it.

mod commands;
mod config;
mod intents;
mod lock_monitor;
mod logging;
mod pidfile;
mod service;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use workday_core::{
    JsonFilePersistence, Persistence, StorageConfig, SystemClock, WorkdayEngine,
};

use commands::PauseAction;

#[derive(Parser)]
#[command(name = "workday-daemon")]
#[command(about = "Tracks effective work time against your workday")]
#[command(version)]
struct Cli {
    /// Storage root (defaults to $WORKDAY_HOME or ~/.workday)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tracker until interrupted
    Run,

    /// Show today's progress
    Status {
        /// Print the full snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Pause time tracking
    Pause,

    /// Resume time tracking
    Resume,

    /// Pause if running, resume if paused
    Toggle,

    /// Discard today's session and start again from now
    Reset,

    /// List archived days
    History {
        /// Only show this month (YYYY-MM)
        #[arg(long, value_name = "YYYY-MM")]
        month: Option<String>,
    },

    /// Print the effective settings
    Settings,
}

/// Shared wiring for every command: where data lives and which clock to use.
pub struct Host {
    storage: StorageConfig,
}

impl Host {
    fn new(root: Option<PathBuf>) -> Self {
        let storage = root
            .map(StorageConfig::with_root)
            .unwrap_or_default();
        Self { storage }
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn persistence(&self) -> JsonFilePersistence {
        JsonFilePersistence::new(self.storage.clone())
    }

    pub fn clock(&self) -> SystemClock {
        SystemClock
    }
}

fn run_daemon(host: &Host) -> Result<(), String> {
    let _pid_file = pidfile::PidFileGuard::acquire(&host.storage().daemon_pid_file())?;
    let config_path = host.storage().daemon_config_file();
    let daemon_config = match config::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to load daemon config; using defaults");
            config::DaemonConfig::default()
        }
    };

    let persistence = host.persistence();
    let settings = persistence.load_settings();
    // Write defaults out on first run so the file can be edited by hand.
    if !host.storage().settings_file().exists() {
        if let Err(err) = persistence.save_settings(&settings) {
            tracing::warn!(error = %err, "Failed to write default settings");
        }
    }

    let lock_source = service::lock_source(&daemon_config);
    let engine = WorkdayEngine::new(
        settings,
        Box::new(persistence),
        Box::new(host.clock()),
        lock_source.as_ref(),
    )?;
    service::run(engine, &daemon_config, &intents::IntentQueue::new(host.storage()))
}

fn main() {
    let cli = Cli::parse();
    let host = Host::new(cli.root);
    let console = matches!(cli.command, Commands::Run);
    let logging_guard = logging::init(&host.storage().logs_dir(), console);

    let result = match cli.command {
        Commands::Run => run_daemon(&host),
        Commands::Status { json } => commands::status(&host, json),
        Commands::Pause => commands::pause(&host, PauseAction::Pause),
        Commands::Resume => commands::pause(&host, PauseAction::Resume),
        Commands::Toggle => commands::pause(&host, PauseAction::Toggle),
        Commands::Reset => commands::reset(&host),
        Commands::History { month } => commands::history(&host, month.as_deref()),
        Commands::Settings => commands::settings(&host),
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "workday-daemon failed");
        eprintln!("workday-daemon: {}", err);
        drop(logging_guard);
        std::process::exit(1);
    }
}
