pub mod cli;
pub mod core;
pub mod providers;
pub mod server;
pub mod service;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::credentials::{self, EnvCredentials};
use crate::core::quota::{FileQuotaTracker, QuotaTracker, spawn_periodic_flush};
use crate::core::window::SystemClock;
use crate::providers::HttpRateSource;
use crate::server::AppState;
use crate::service::RateService;
use crate::store::StateFile;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

pub enum AppCommand {
    Serve,
    Status,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let tracker = open_tracker(&config)?;
    match command {
        AppCommand::Serve => serve(&config, tracker).await,
        AppCommand::Status => cli::status::run(tracker.as_ref()).await,
    }
}

fn open_tracker(config: &AppConfig) -> Result<Arc<FileQuotaTracker<SystemClock>>> {
    credentials::load_dotenv(config.providers.iter().map(|p| p.credential_env()));
    let registry = config
        .build_registry(&EnvCredentials)
        .context("Invalid provider configuration")?;
    let state_path = config.state_file_path()?;
    info!(
        providers = ?registry.names().collect::<Vec<_>>(),
        state_file = %state_path.display(),
        "Loaded providers"
    );

    Ok(Arc::new(FileQuotaTracker::open(
        Arc::new(registry),
        StateFile::new(state_path),
        SystemClock,
    )))
}

async fn serve(config: &AppConfig, tracker: Arc<FileQuotaTracker<SystemClock>>) -> Result<()> {
    let registry = Arc::clone(tracker.registry());
    let tracker: Arc<dyn QuotaTracker> = tracker;

    let flusher = config
        .flush_interval()
        .map(|every| spawn_periodic_flush(Arc::clone(&tracker), every));

    let source = HttpRateSource::new().context("Failed to build HTTP client")?;
    let service = RateService::new(
        registry,
        Arc::clone(&tracker),
        Arc::new(source),
        config.admission,
    );
    let router = server::build_router(AppState {
        service: Arc::new(service),
    });

    let listener = TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    let served = server::serve(listener, router, server::shutdown_signal()).await;

    if let Some(flusher) = flusher {
        flusher.abort();
    }
    match tracker.flush().await {
        Ok(()) => info!("Saved quota state"),
        Err(e) => warn!(error = %e, "Failed to save quota state on shutdown"),
    }

    served.context("Server error")
}
