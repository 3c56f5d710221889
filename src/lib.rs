// Eventloom Library
// Recurring calendar events: month-by-month expansion, notify times and
// the reminder sweep

pub mod alerts;
pub mod calendar;
pub mod config;
pub mod database;
pub mod directory;
pub mod error;
pub mod http_config;
pub mod messaging;
pub mod models;
pub mod ports;
pub mod recurring;
pub mod rooms;
pub mod timezone;
pub mod utils;

// Re-export commonly used types
pub use alerts::{run_sweep_loop, NotificationSweep, SweepReport};
pub use config::EngineConfig;
pub use database::Database;
pub use error::{AppError, AppResult};
pub use models::*;
pub use recurring::{EditScope, EventActions, InstanceGenerator, RangeExpander, UpdateOutcome};

use ports::{MessagingProducer, RoomAvailability, Storage, TimezoneResolver, UserDirectory};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Engine components wired to one set of collaborators.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Storage>,
    pub config: Arc<EngineConfig>,
    pub generator: Arc<InstanceGenerator>,
    pub expander: Arc<RangeExpander>,
    pub actions: Arc<EventActions>,
    pub sweep: Arc<NotificationSweep>,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn build(
        config: EngineConfig,
        store: Arc<dyn Storage>,
        timezones: Arc<dyn TimezoneResolver>,
        rooms: Arc<dyn RoomAvailability>,
        directory: Arc<dyn UserDirectory>,
        producer: Arc<dyn MessagingProducer>,
    ) -> AppResult<Self> {
        config.validate()?;
        let shutdown = CancellationToken::new();

        let generator = Arc::new(InstanceGenerator::new(Arc::clone(&store), &config)?);
        let expander = Arc::new(RangeExpander::new(
            Arc::clone(&store),
            Arc::clone(&timezones),
            Arc::clone(&generator),
        ));
        let actions = Arc::new(EventActions::new(
            Arc::clone(&store),
            timezones,
            rooms,
            Arc::clone(&generator),
        ));
        let sweep = Arc::new(NotificationSweep::new(
            Arc::clone(&store),
            Arc::clone(&expander),
            directory,
            producer,
            &config,
            shutdown.child_token(),
        )?);

        Ok(Self {
            store,
            config: Arc::new(config),
            generator,
            expander,
            actions,
            sweep,
            shutdown,
        })
    }
}
