//! Seams between the engine and the outside world.
//!
//! The engine only talks to storage, timezone data, room bookings, the push
//! pipeline and the user directory through these traits. Concrete
//! implementations live in `database`, `timezone`, `rooms`, `messaging` and
//! `directory`.

use crate::error::AppResult;
use crate::models::{
    Event, MonthCommit, MonthYear, NewTracking, PushNotification, RecurringInstance, RecurringTracking,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[async_trait]
pub trait Storage: Send + Sync {
    // --- Events ---

    async fn create_event(&self, event: &Event) -> AppResult<()>;

    /// Soft-deleted events are not returned.
    async fn get_event(&self, id: &str) -> AppResult<Option<Event>>;

    async fn list_events_by_ids(&self, ids: &[String]) -> AppResult<Vec<Event>>;

    /// Non-repeating events with notify on, `notify_time == at` and a start
    /// inside `[from, to)`.
    async fn list_due_events(
        &self,
        at: DateTime<Utc>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Event>>;

    async fn update_event_attendance(&self, id: &str, accepted: &[String], declined: &[String]) -> AppResult<()>;

    // --- Trackings ---

    /// Trackings whose month overlaps `[from, to)`, for events whose repeat
    /// window has not ended before `from`.
    async fn list_trackings_in_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> AppResult<Vec<RecurringTracking>>;

    /// The complement of `list_trackings_in_range` under the same repeat filter.
    async fn list_trackings_outside_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<RecurringTracking>>;

    async fn get_tracking(&self, event_id: &str, month: MonthYear) -> AppResult<Option<RecurringTracking>>;

    /// Writes the tracking and its instances in one transaction. If a tracking
    /// for the same `(event, month)` already exists nothing is written and
    /// `MonthCommit::AlreadyGenerated` is returned.
    async fn persist_generated_month(
        &self,
        tracking: NewTracking,
        instances: Vec<RecurringInstance>,
    ) -> AppResult<MonthCommit>;

    // --- Instances ---

    async fn get_instance(&self, id: &str) -> AppResult<Option<RecurringInstance>>;

    /// Live instances of the given events overlapping `[from, to)`.
    async fn list_instances_by_event_ids(
        &self,
        event_ids: &[String],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<RecurringInstance>>;

    async fn delete_instance(&self, id: &str) -> AppResult<()>;

    /// Rewrites a live instance in place. Attendance is not touched.
    async fn update_instance(&self, instance: &RecurringInstance) -> AppResult<()>;

    async fn update_instance_attendance(&self, id: &str, accepted: &[String], declined: &[String]) -> AppResult<()>;

    // --- Series ---
    //
    // Each of these runs in a single transaction and returns the number of
    // instances it soft-deleted.

    /// Ends the series at `cut`: instances starting after it are removed and
    /// the event and its trackings take `cut` as their `repeat_until`.
    async fn end_series(&self, event_id: &str, cut: DateTime<Utc>) -> AppResult<u64>;

    /// `end_series` plus inserting `successor`, the event carrying the
    /// series on from the cut.
    async fn split_series(&self, event_id: &str, cut: DateTime<Utc>, successor: &Event) -> AppResult<u64>;

    /// Soft-deletes the event and its instances and drops its trackings.
    async fn delete_series(&self, event_id: &str) -> AppResult<u64>;

    /// Overwrites the event row and clears its instances and trackings so the
    /// series can be generated again.
    async fn replace_series(&self, event: &Event) -> AppResult<u64>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimezoneDetail {
    pub id: String,
    pub offset_seconds: i32,
}

#[async_trait]
pub trait TimezoneResolver: Send + Sync {
    async fn detail(&self, id: &str) -> AppResult<TimezoneDetail>;
}

/// Room bookings follow the instances they were made for.
#[async_trait]
pub trait RoomAvailability: Send + Sync {
    async fn release_instance(&self, instance_id: &str) -> AppResult<()>;

    async fn release_from(&self, event_id: &str, from: DateTime<Utc>) -> AppResult<()>;

    async fn release_all(&self, event_id: &str) -> AppResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagingProducer: Send + Sync {
    async fn publish_push_notification(&self, message: PushNotification) -> AppResult<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFilter {
    pub department_ids: Vec<String>,
    pub branch_ids: Vec<String>,
}

impl UserFilter {
    pub fn departments(ids: Vec<String>) -> Self {
        Self {
            department_ids: ids,
            branch_ids: Vec::new(),
        }
    }

    pub fn branches(ids: Vec<String>) -> Self {
        Self {
            department_ids: Vec::new(),
            branch_ids: ids,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Users belonging to any of the filter's departments or branches.
    async fn list_user_ids(&self, filter: UserFilter) -> AppResult<Vec<String>>;
}
