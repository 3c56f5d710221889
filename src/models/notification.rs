// file: src/models/notification.rs
use super::event::Event;
use super::instance::RecurringInstance;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const EVENT_REMINDER_SOURCE: &str = "event_reminder";

/// Anything the sweep can remind people about: a one-off event or a
/// materialized instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    pub id: String,
    pub event_id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub created_by_id: String,
    pub branch_ids: Vec<String>,
    pub department_ids: Vec<String>,
    pub assign_ids: Vec<String>,
    pub declined_ids: Vec<String>,
}

impl From<&Event> for Reminder {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id.clone(),
            event_id: event.id.clone(),
            title: event.title.clone(),
            start_time: event.start_time,
            created_by_id: event.created_by_id.clone(),
            branch_ids: event.branch_ids.clone(),
            department_ids: event.department_ids.clone(),
            assign_ids: event.assign_ids.clone(),
            declined_ids: event.declined_ids.clone(),
        }
    }
}

impl From<&RecurringInstance> for Reminder {
    fn from(instance: &RecurringInstance) -> Self {
        Self {
            id: instance.id.clone(),
            event_id: instance.event_id.clone(),
            title: instance.title.clone(),
            start_time: instance.start_time,
            created_by_id: instance.created_by_id.clone(),
            branch_ids: instance.branch_ids.clone(),
            department_ids: instance.department_ids.clone(),
            assign_ids: instance.assign_ids.clone(),
            declined_ids: instance.declined_ids.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushNotification {
    pub instance_id: String,
    pub event_id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub minutes_until_start: i64,
    pub recipients: Vec<String>,
    pub created_by_id: String,
    pub source: String,
}

impl PushNotification {
    pub fn for_reminder(reminder: &Reminder, recipients: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            instance_id: reminder.id.clone(),
            event_id: reminder.event_id.clone(),
            title: reminder.title.clone(),
            start_time: reminder.start_time,
            minutes_until_start: (reminder.start_time - now).num_minutes(),
            recipients,
            created_by_id: reminder.created_by_id.clone(),
            source: EVENT_REMINDER_SOURCE.to_string(),
        }
    }
}
