// file: src/models/instance.rs
use super::alert::DateConfig;
use super::event::{Event, Visibility};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attendance {
    Unknown,
    Accepted,
    Declined,
}

impl Attendance {
    /// Creator counts as accepted. Declined wins over accepted when a user
    /// somehow appears in both lists.
    pub fn resolve(user_id: &str, creator_id: &str, accepted: &[String], declined: &[String]) -> Self {
        if declined.iter().any(|id| id == user_id) {
            Attendance::Declined
        } else if user_id == creator_id || accepted.iter().any(|id| id == user_id) {
            Attendance::Accepted
        } else {
            Attendance::Unknown
        }
    }
}

/// One concrete occurrence of a recurring event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringInstance {
    pub id: String,
    pub event_id: String,
    pub title: String,
    pub description: Option<String>,
    pub timezone_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub all_day: bool,
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

impl RecurringInstance {
    /// Builds an instance for one occurrence, copying the event's assignment
    /// and metadata fields. Attendance starts empty; each instance is
    /// answered on its own.
    pub fn from_event(
        event: &Event,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        notify_time: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_id: event.id.clone(),
            title: event.title.clone(),
            description: event.description.clone(),
            timezone_id: event.timezone_id.clone(),
            start_time,
            end_time,
            all_day: event.all_day,
            branch_ids: event.branch_ids.clone(),
            department_ids: event.department_ids.clone(),
            assign_ids: event.assign_ids.clone(),
            room_ids: event.room_ids.clone(),
            category_id: event.category_id.clone(),
            notify: event.notify,
            alert: if event.notify { event.alert.clone() } else { None },
            notify_time,
            visibility: event.visibility,
            created_by_id: event.created_by_id.clone(),
            accepted_ids: Vec::new(),
            declined_ids: Vec::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Zero-length instances starting at `from` count as inside.
    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.start_time < to && (self.end_time > from || self.start_time >= from)
    }

    pub fn attendance_for(&self, user_id: &str) -> Attendance {
        Attendance::resolve(user_id, &self.created_by_id, &self.accepted_ids, &self.declined_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_attendance_resolution() {
        let accepted = ids(&["u-2"]);
        let declined = ids(&["u-3"]);

        assert_eq!(Attendance::resolve("u-1", "u-1", &accepted, &declined), Attendance::Accepted);
        assert_eq!(Attendance::resolve("u-2", "u-1", &accepted, &declined), Attendance::Accepted);
        assert_eq!(Attendance::resolve("u-3", "u-1", &accepted, &declined), Attendance::Declined);
        assert_eq!(Attendance::resolve("u-4", "u-1", &accepted, &declined), Attendance::Unknown);
    }

    #[test]
    fn test_from_event_starts_with_empty_attendance() {
        let start = Utc.with_ymd_and_hms(2024, 5, 5, 3, 0, 0).unwrap();
        let event = Event {
            id: "evt-1".to_string(),
            title: "Standup".to_string(),
            description: None,
            timezone_id: "+07:00".to_string(),
            start_time: start,
            end_time: start + Duration::minutes(30),
            all_day: false,
            repeat: crate::models::Repeat::Daily,
            repeat_until: None,
            branch_ids: vec![],
            department_ids: vec![],
            assign_ids: ids(&["u-2", "u-3"]),
            room_ids: vec![],
            category_id: None,
            notify: false,
            alert: Some(DateConfig::minutes_before(5)),
            notify_time: None,
            visibility: Visibility::Restricted,
            created_by_id: "u-1".to_string(),
            accepted_ids: ids(&["u-2"]),
            declined_ids: ids(&["u-3"]),
            created_at: start,
            updated_at: start,
            deleted_at: None,
        };

        let next = start + Duration::days(1);
        let instance = RecurringInstance::from_event(&event, next, next + Duration::minutes(30), None);
        assert!(instance.accepted_ids.is_empty());
        assert!(instance.declined_ids.is_empty());
        assert_eq!(instance.attendance_for("u-3"), Attendance::Unknown);
        assert_eq!(instance.attendance_for("u-1"), Attendance::Accepted);
        assert_eq!(instance.assign_ids, event.assign_ids);
        // Alert is only snapshotted when the event notifies
        assert!(instance.alert.is_none());
        assert_eq!(instance.duration(), Duration::minutes(30));
    }
}
