mod config;
mod reporter;
mod source;
mod store;
mod transport;
mod web;

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::{Config, ConfigError, SourceConfig};
use crate::reporter::{PersistedCounters, Reporter, ReporterError};
use crate::source::{GpsdSource, LocationSource, Permission as SourcePermission, PushSource};
use crate::store::{FileStore, StoreError};
use crate::transport::HttpTransport;
use crate::web::AppState;

#[derive(Parser)]
#[command(name = "loc-o-mat")]
#[command(about = "Periodic location reporter")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a config file
    Validate { config: String },
    /// Print the persisted counters
    Status { config: String },
    /// Run the reporter until interrupted
    Run { config: String },
}

#[derive(Debug, Error)]
enum StartupError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("reporter error: {0}")]
    Reporter(#[from] ReporterError),
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Status { config } => status(&config),
        Commands::Run { config } => run(&config).await,
    }
}

fn load_config(path: &str) -> Option<Config> {
    match Config::from_file(path) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("Error loading {}: {}", path, e);
            None
        }
    }
}

fn validate(path: &str) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };

    println!("Config is valid");
    println!("  collector: {}", config.collector.url);
    println!("  store: {}", config.store.path.display());
    match &config.location.source {
        SourceConfig::Gpsd { address, .. } => println!("  source: gpsd at {}", address),
        SourceConfig::Push => println!("  source: push"),
    }
    println!(
        "  default interval: {}s (autostart: {})",
        config.reporting.default_interval_seconds, config.reporting.autostart
    );
    match &config.web {
        Some(web) => println!("  api: {} ({} keys)", web.bind, config.api_keys.len()),
        None => println!("  api: disabled"),
    }
    ExitCode::SUCCESS
}

fn status(path: &str) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };

    let counters = FileStore::open(&config.store.path).and_then(|store| {
        PersistedCounters::load(&store, config.reporting.default_interval_seconds)
    });

    match counters {
        Ok(counters) => {
            println!("sent: {}", counters.sent_count);
            println!("errors: {}", counters.error_count);
            println!("interval: {}s", counters.interval_seconds);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error reading {}: {}", config.store.path.display(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(path: &str) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };

    let (reporter, push) = match build_reporter(&config) {
        Ok(built) => built,
        Err(e) => {
            log::error!("Startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let reporter = Arc::new(Mutex::new(reporter));

    {
        let mut locked = reporter.lock().await;
        if config.reporting.autostart {
            if let Err(e) = locked.start() {
                log::error!("Failed to start tracking: {}", e);
            }
        }
        if !locked.is_active() {
            log::info!("Tracking is not active");
        }
    }

    let served = match config.web.clone() {
        Some(web) => {
            let state = AppState {
                config: Arc::new(config),
                reporter: reporter.clone(),
                push,
            };
            web::run_server(&web.bind, state, shutdown_signal()).await
        }
        None => {
            shutdown_signal().await;
            Ok(())
        }
    };

    reporter.lock().await.stop().await;

    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_reporter(config: &Config) -> Result<(Reporter, Option<Arc<PushSource>>), StartupError> {
    let store = FileStore::open(&config.store.path)?;
    log::info!("Using state file {}", store.path().display());

    let transport = HttpTransport::new(config.collector_url()?, config.collector.timeout)?;

    let mut push = None;
    let source: Arc<dyn LocationSource> = match &config.location.source {
        SourceConfig::Gpsd {
            address,
            reconnect_delay,
        } => Arc::new(GpsdSource::new(address.clone(), *reconnect_delay)),
        SourceConfig::Push => {
            let permission = if config.accepts_pushed_locations() {
                SourcePermission::Granted
            } else {
                log::warn!("No API key may push locations, tracking cannot start");
                SourcePermission::Denied
            };
            let source = Arc::new(PushSource::with_permission(permission));
            push = Some(source.clone());
            source
        }
    };

    let reporter = Reporter::new(
        source,
        Arc::new(transport),
        Arc::new(store),
        config.location.watch_options(),
        config.reporting.default_interval_seconds,
    )?;

    Ok((reporter, push))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}
