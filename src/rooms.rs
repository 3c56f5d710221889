use crate::error::AppResult;
use crate::ports::RoomAvailability;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;

/// Used when no room booking system is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRoomAvailability;

#[async_trait]
impl RoomAvailability for NoopRoomAvailability {
    async fn release_instance(&self, instance_id: &str) -> AppResult<()> {
        debug!("No room system attached; nothing to release for instance {}", instance_id);
        Ok(())
    }

    async fn release_from(&self, event_id: &str, from: DateTime<Utc>) -> AppResult<()> {
        debug!("No room system attached; nothing to release for event {} from {}", event_id, from);
        Ok(())
    }

    async fn release_all(&self, event_id: &str) -> AppResult<()> {
        debug!("No room system attached; nothing to release for event {}", event_id);
        Ok(())
    }
}
