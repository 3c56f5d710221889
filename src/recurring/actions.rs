//! Request-side operations on events and their instances.
//!
//! Edits and deletes share one scope model: a single instance, an instance
//! and everything after it, or the whole series.

use super::generator::InstanceGenerator;
use crate::calendar::common::{offset_from_seconds, truncate_to_second};
use crate::calendar::Occurrence;
use crate::error::{AppError, AppResult};
use crate::models::{Attendance, Event, EventUpdate, NewEvent, RecurringInstance};
use crate::ports::{RoomAvailability, Storage, TimezoneDetail, TimezoneResolver};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// How far an edit or delete on one instance reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditScope {
    /// Just this instance
    One,
    /// This instance and every later one
    From,
    /// The whole series, including the event
    All,
}

impl FromStr for EditScope {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one" => Ok(EditScope::One),
            "from" => Ok(EditScope::From),
            "all" => Ok(EditScope::All),
            other => Err(AppError::invalid_input(format!("Unknown edit scope: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedEvent {
    pub event: Event,
    /// Instances of the first month. Empty for non-repeating events.
    pub instances: Vec<RecurringInstance>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOutcome {
    pub scope: EditScope,
    pub instances_removed: u64,
    /// New end of the series after a `From` delete.
    pub repeat_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub scope: EditScope,
    /// Event the edited occurrences belong to now. A `From` edit starts a new
    /// series, so this differs from the original event there.
    pub event_id: String,
    /// The rewritten instance for `One`, otherwise the regenerated first month.
    pub instances: Vec<RecurringInstance>,
    pub instances_removed: u64,
}

pub struct EventActions {
    store: Arc<dyn Storage>,
    timezones: Arc<dyn TimezoneResolver>,
    rooms: Arc<dyn RoomAvailability>,
    generator: Arc<InstanceGenerator>,
}

impl EventActions {
    pub fn new(
        store: Arc<dyn Storage>,
        timezones: Arc<dyn TimezoneResolver>,
        rooms: Arc<dyn RoomAvailability>,
        generator: Arc<InstanceGenerator>,
    ) -> Self {
        Self {
            store,
            timezones,
            rooms,
            generator,
        }
    }

    /// Stores the event and, for recurring events, expands its first month.
    pub async fn create_event(&self, input: NewEvent) -> AppResult<CreatedEvent> {
        input.validate().map_err(AppError::invalid_input)?;
        let (created_by_id, changes) = input.split();
        let zone = self.timezones.detail(&changes.timezone_id).await?;

        let now = truncate_to_second(Utc::now());
        let event = self.series_event(uuid::Uuid::new_v4().to_string(), created_by_id, changes, &zone, now);

        self.store.create_event(&event).await?;
        info!("Created event {} ({})", event.id, event.repeat);

        let instances = self.first_month(&event, &zone).await?;
        Ok(CreatedEvent { event, instances })
    }

    pub async fn delete_instance(&self, instance_id: &str, scope: EditScope) -> AppResult<DeleteOutcome> {
        let (instance, event) = self.load_instance(instance_id).await?;

        match scope {
            EditScope::One => self.delete_one(&instance).await,
            EditScope::From if instance.start_time <= event.start_time => {
                // Cutting at the first occurrence leaves nothing behind
                self.delete_all(&event).await.map(|outcome| DeleteOutcome {
                    scope: EditScope::From,
                    ..outcome
                })
            }
            EditScope::From => self.delete_from(&event, &instance).await,
            EditScope::All => self.delete_all(&event).await,
        }
    }

    async fn delete_one(&self, instance: &RecurringInstance) -> AppResult<DeleteOutcome> {
        tokio::try_join!(
            self.store.delete_instance(&instance.id),
            self.rooms.release_instance(&instance.id),
        )?;
        info!("Deleted instance {} of event {}", instance.id, instance.event_id);

        Ok(DeleteOutcome {
            scope: EditScope::One,
            instances_removed: 1,
            repeat_until: None,
        })
    }

    /// Ends the series at the occurrence before `instance`.
    async fn delete_from(&self, event: &Event, instance: &RecurringInstance) -> AppResult<DeleteOutcome> {
        let cut = self.previous_start(event, instance).await?;

        let removed = self.store.end_series(&event.id, cut).await?;
        self.rooms.release_from(&event.id, instance.start_time).await?;
        info!(
            "Ended event {} at {}; removed {} later instance(s)",
            event.id, cut, removed
        );

        Ok(DeleteOutcome {
            scope: EditScope::From,
            instances_removed: removed,
            repeat_until: Some(cut),
        })
    }

    async fn delete_all(&self, event: &Event) -> AppResult<DeleteOutcome> {
        let removed = self.store.delete_series(&event.id).await?;
        self.rooms.release_all(&event.id).await?;
        info!("Deleted event {} with {} instance(s)", event.id, removed);

        Ok(DeleteOutcome {
            scope: EditScope::All,
            instances_removed: removed,
            repeat_until: None,
        })
    }

    /// Applies `changes` to one instance, to it and every later one, or to the
    /// whole series. `One` ignores the repeat fields of `changes`.
    pub async fn update_instance(
        &self,
        instance_id: &str,
        scope: EditScope,
        changes: EventUpdate,
    ) -> AppResult<UpdateOutcome> {
        changes.validate().map_err(AppError::invalid_input)?;
        let (instance, event) = self.load_instance(instance_id).await?;

        match scope {
            EditScope::One => self.update_one(instance, changes).await,
            EditScope::From if instance.start_time <= event.start_time => {
                self.update_all(&event, changes).await.map(|outcome| UpdateOutcome {
                    scope: EditScope::From,
                    ..outcome
                })
            }
            EditScope::From => self.update_from(&event, &instance, changes).await,
            EditScope::All => self.update_all(&event, changes).await,
        }
    }

    async fn update_one(&self, instance: RecurringInstance, changes: EventUpdate) -> AppResult<UpdateOutcome> {
        let zone = self.timezones.detail(&changes.timezone_id).await?;

        let start_time = truncate_to_second(changes.start_time);
        let end_time = truncate_to_second(changes.end_time);
        let notify_time = self.notify_time(start_time, &changes, &zone);
        let moved =
            start_time != instance.start_time || end_time != instance.end_time || changes.room_ids != instance.room_ids;

        let updated = RecurringInstance {
            title: changes.title,
            description: changes.description,
            timezone_id: changes.timezone_id,
            start_time,
            end_time,
            all_day: changes.all_day,
            branch_ids: changes.branch_ids,
            department_ids: changes.department_ids,
            assign_ids: changes.assign_ids,
            room_ids: changes.room_ids,
            category_id: changes.category_id,
            notify: changes.notify,
            alert: changes.alert,
            notify_time,
            visibility: changes.visibility,
            updated_at: truncate_to_second(Utc::now()),
            ..instance
        };

        self.store.update_instance(&updated).await?;
        if moved {
            self.rooms.release_instance(&updated.id).await?;
        }
        info!("Updated instance {} of event {}", updated.id, updated.event_id);

        Ok(UpdateOutcome {
            scope: EditScope::One,
            event_id: updated.event_id.clone(),
            instances: vec![updated],
            instances_removed: 0,
        })
    }

    /// Ends the old series before `instance` and carries it on as a new
    /// event built from `changes`.
    async fn update_from(
        &self,
        event: &Event,
        instance: &RecurringInstance,
        changes: EventUpdate,
    ) -> AppResult<UpdateOutcome> {
        let cut = self.previous_start(event, instance).await?;
        let zone = self.timezones.detail(&changes.timezone_id).await?;

        let now = truncate_to_second(Utc::now());
        let successor = self.series_event(
            uuid::Uuid::new_v4().to_string(),
            event.created_by_id.clone(),
            changes,
            &zone,
            now,
        );

        let removed = self.store.split_series(&event.id, cut, &successor).await?;
        self.rooms.release_from(&event.id, instance.start_time).await?;
        info!(
            "Split event {} at {} into {}; removed {} later instance(s)",
            event.id, cut, successor.id, removed
        );

        let instances = self.first_month(&successor, &zone).await?;
        Ok(UpdateOutcome {
            scope: EditScope::From,
            event_id: successor.id,
            instances,
            instances_removed: removed,
        })
    }

    async fn update_all(&self, event: &Event, changes: EventUpdate) -> AppResult<UpdateOutcome> {
        let zone = self.timezones.detail(&changes.timezone_id).await?;

        let now = truncate_to_second(Utc::now());
        let rewritten = self.series_event(event.id.clone(), event.created_by_id.clone(), changes, &zone, now);
        let updated = Event {
            accepted_ids: event.accepted_ids.clone(),
            declined_ids: event.declined_ids.clone(),
            created_at: event.created_at,
            ..rewritten
        };

        let removed = self.store.replace_series(&updated).await?;
        self.rooms.release_all(&event.id).await?;
        info!("Rewrote event {}; regenerating after {} removed instance(s)", event.id, removed);

        let instances = self.first_month(&updated, &zone).await?;
        Ok(UpdateOutcome {
            scope: EditScope::All,
            event_id: updated.id,
            instances,
            instances_removed: removed,
        })
    }

    async fn load_instance(&self, instance_id: &str) -> AppResult<(RecurringInstance, Event)> {
        let instance = self
            .store
            .get_instance(instance_id)
            .await?
            .ok_or_else(|| AppError::instance_not_found(instance_id))?;
        let event = self
            .store
            .get_event(&instance.event_id)
            .await?
            .ok_or_else(|| AppError::event_not_found(&instance.event_id))?;
        Ok((instance, event))
    }

    /// Start of the occurrence before `instance`, computed in the event's zone.
    async fn previous_start(&self, event: &Event, instance: &RecurringInstance) -> AppResult<DateTime<Utc>> {
        let zone = self.timezones.detail(&event.timezone_id).await?;
        let offset = offset_from_seconds(zone.offset_seconds)?;

        let current = Occurrence::new(
            instance.start_time.with_timezone(&offset),
            instance.end_time.with_timezone(&offset),
        );
        let previous = self
            .generator
            .planner()
            .recurrence()
            .previous_occurrence(current, event.repeat);
        Ok(previous.start.with_timezone(&Utc))
    }

    async fn first_month(&self, event: &Event, zone: &TimezoneDetail) -> AppResult<Vec<RecurringInstance>> {
        if event.repeat.is_recurring() {
            self.generator.generate_initial(event, zone).await
        } else {
            Ok(Vec::new())
        }
    }

    fn notify_time(&self, start_time: DateTime<Utc>, changes: &EventUpdate, zone: &TimezoneDetail) -> Option<DateTime<Utc>> {
        if !changes.notify {
            return None;
        }
        self.generator
            .notify_calculator()
            .calculate(start_time, changes.all_day, changes.alert.as_ref(), zone.offset_seconds)
            .map(|at| at.with_timezone(&Utc))
    }

    /// Builds a fresh series row from `changes` with empty attendance.
    fn series_event(
        &self,
        id: String,
        created_by_id: String,
        changes: EventUpdate,
        zone: &TimezoneDetail,
        now: DateTime<Utc>,
    ) -> Event {
        let start_time = truncate_to_second(changes.start_time);
        let notify_time = self.notify_time(start_time, &changes, zone);

        Event {
            id,
            title: changes.title,
            description: changes.description,
            timezone_id: changes.timezone_id,
            start_time,
            end_time: truncate_to_second(changes.end_time),
            all_day: changes.all_day,
            repeat: changes.repeat,
            repeat_until: changes.repeat_until.map(truncate_to_second),
            branch_ids: changes.branch_ids,
            department_ids: changes.department_ids,
            assign_ids: changes.assign_ids,
            room_ids: changes.room_ids,
            category_id: changes.category_id,
            notify: changes.notify,
            alert: changes.alert,
            notify_time,
            visibility: changes.visibility,
            created_by_id,
            accepted_ids: Vec::new(),
            declined_ids: Vec::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// `id` may name an event or an instance; events are checked first.
    pub async fn update_attendance(&self, id: &str, user_id: &str, status: Attendance) -> AppResult<Attendance> {
        if let Some(event) = self.store.get_event(id).await? {
            let (accepted, declined) = apply_attendance(&event.accepted_ids, &event.declined_ids, user_id, status);
            self.store.update_event_attendance(id, &accepted, &declined).await?;
            return Ok(Attendance::resolve(user_id, &event.created_by_id, &accepted, &declined));
        }

        let instance = self
            .store
            .get_instance(id)
            .await?
            .ok_or_else(|| AppError::instance_not_found(id))?;
        let (accepted, declined) = apply_attendance(&instance.accepted_ids, &instance.declined_ids, user_id, status);
        self.store.update_instance_attendance(id, &accepted, &declined).await?;

        Ok(Attendance::resolve(user_id, &instance.created_by_id, &accepted, &declined))
    }
}

fn apply_attendance(
    accepted: &[String],
    declined: &[String],
    user_id: &str,
    status: Attendance,
) -> (Vec<String>, Vec<String>) {
    let mut accepted: Vec<String> = accepted.iter().filter(|id| *id != user_id).cloned().collect();
    let mut declined: Vec<String> = declined.iter().filter(|id| *id != user_id).cloned().collect();

    match status {
        Attendance::Accepted => accepted.push(user_id.to_string()),
        Attendance::Declined => declined.push(user_id.to_string()),
        Attendance::Unknown => {}
    }

    (accepted, declined)
}
