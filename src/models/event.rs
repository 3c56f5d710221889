// file: src/models/event.rs
use super::alert::DateConfig;
use super::instance::Attendance;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Repeat {
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Repeat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Repeat::None => "none",
            Repeat::Daily => "daily",
            Repeat::Weekly => "weekly",
            Repeat::Monthly => "monthly",
            Repeat::Yearly => "yearly",
        }
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, Repeat::None)
    }
}

impl fmt::Display for Repeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Repeat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" | "" => Ok(Repeat::None),
            "daily" => Ok(Repeat::Daily),
            "weekly" => Ok(Repeat::Weekly),
            "monthly" => Ok(Repeat::Monthly),
            "yearly" => Ok(Repeat::Yearly),
            other => Err(format!("Unknown repeat rule: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Visible to creator and assignment set only
    Restricted,
    Public,
    System,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Restricted => "restricted",
            Visibility::Public => "public",
            Visibility::System => "system",
        }
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "restricted" => Ok(Visibility::Restricted),
            "public" => Ok(Visibility::Public),
            "system" => Ok(Visibility::System),
            other => Err(format!("Unknown visibility: {}", other)),
        }
    }
}

/// The recurrence root. Instances are expanded from it month by month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub timezone_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub all_day: bool,
    pub repeat: Repeat,
    pub repeat_until: Option<DateTime<Utc>>,
    pub branch_ids: Vec<String>,
    pub department_ids: Vec<String>,
    pub assign_ids: Vec<String>,
    pub room_ids: Vec<String>,
    pub category_id: Option<String>,
    pub notify: bool,
    pub alert: Option<DateConfig>,
    pub notify_time: Option<DateTime<Utc>>,
    pub visibility: Visibility,
    pub created_by_id: String,
    pub accepted_ids: Vec<String>,
    pub declined_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Event {
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    pub fn attendance_for(&self, user_id: &str) -> Attendance {
        Attendance::resolve(user_id, &self.created_by_id, &self.accepted_ids, &self.declined_ids)
    }
}

/// Input for creating an event. Everything the engine computes itself
/// (id, notify time, timestamps) is left out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub timezone_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub all_day: bool,
    pub repeat: Repeat,
    pub repeat_until: Option<DateTime<Utc>>,
    pub branch_ids: Vec<String>,
    pub department_ids: Vec<String>,
    pub assign_ids: Vec<String>,
    pub room_ids: Vec<String>,
    pub category_id: Option<String>,
    pub notify: bool,
    pub alert: Option<DateConfig>,
    pub visibility: Visibility,
    pub created_by_id: String,
}

impl NewEvent {
    pub fn validate(&self) -> Result<(), String> {
        if self.created_by_id.trim().is_empty() {
            return Err("created_by_id is required".to_string());
        }
        check_schedule(&self.title, self.start_time, self.end_time, self.repeat_until)
    }

    /// Separates the creator from the fields an edit may replace.
    pub fn split(self) -> (String, EventUpdate) {
        let update = EventUpdate {
            title: self.title,
            description: self.description,
            timezone_id: self.timezone_id,
            start_time: self.start_time,
            end_time: self.end_time,
            all_day: self.all_day,
            repeat: self.repeat,
            repeat_until: self.repeat_until,
            branch_ids: self.branch_ids,
            department_ids: self.department_ids,
            assign_ids: self.assign_ids,
            room_ids: self.room_ids,
            category_id: self.category_id,
            notify: self.notify,
            alert: self.alert,
            visibility: self.visibility,
        };
        (self.created_by_id, update)
    }
}

/// Replacement values for an edited event or instance. Editing a single
/// instance ignores `repeat` and `repeat_until`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventUpdate {
    pub title: String,
    pub description: Option<String>,
    pub timezone_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub all_day: bool,
    pub repeat: Repeat,
    pub repeat_until: Option<DateTime<Utc>>,
    pub branch_ids: Vec<String>,
    pub department_ids: Vec<String>,
    pub assign_ids: Vec<String>,
    pub room_ids: Vec<String>,
    pub category_id: Option<String>,
    pub notify: bool,
    pub alert: Option<DateConfig>,
    pub visibility: Visibility,
}

impl EventUpdate {
    pub fn validate(&self) -> Result<(), String> {
        check_schedule(&self.title, self.start_time, self.end_time, self.repeat_until)
    }
}

fn check_schedule(
    title: &str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    repeat_until: Option<DateTime<Utc>>,
) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("title is required".to_string());
    }
    if end_time < start_time {
        return Err("end_time must not be before start_time".to_string());
    }
    if let Some(until) = repeat_until {
        if until < start_time {
            return Err("repeat_until must not be before start_time".to_string());
        }
    }
    Ok(())
}
