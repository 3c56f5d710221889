// Eventloom - recurring event engine
// Runs the reminder sweep against the configured store until Ctrl-C

use eventloom::directory::StaticUserDirectory;
use eventloom::messaging::producer_from_config;
use eventloom::ports::UserDirectory;
use eventloom::rooms::NoopRoomAvailability;
use eventloom::timezone::TzDatabaseResolver;
use eventloom::utils::logging::{init_logging, log_error_with_context};
use eventloom::{run_sweep_loop, AppState, Database, EngineConfig};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = run().await {
        log_error_with_context(&e, "Startup");
        return Err(e);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    info!("Starting eventloom");

    let config = EngineConfig::from_env()?;
    config.validate()?;

    let db = Database::connect(&config.database_url).await?;

    let directory: Arc<dyn UserDirectory> = match &config.directory_file {
        Some(path) => Arc::new(StaticUserDirectory::from_file(path)?),
        None => {
            warn!("No directory file configured; department and branch audiences will be empty");
            Arc::new(StaticUserDirectory::default())
        }
    };
    let producer = producer_from_config(&config)?;
    let interval = Duration::from_secs(config.sweep_interval_secs);

    let state = AppState::build(
        config,
        Arc::new(db),
        Arc::new(TzDatabaseResolver::new()),
        Arc::new(NoopRoomAvailability),
        directory,
        producer,
    )?;

    let sweep_handle = tokio::spawn(run_sweep_loop(
        Arc::clone(&state.sweep),
        interval,
        state.shutdown.clone(),
    ));

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, shutting down");
    state.shutdown.cancel();

    sweep_handle.await?;
    info!("Eventloom stopped");
    Ok(())
}
