// file: src/models/mod.rs

pub mod alert;
pub mod event;
pub mod instance;
pub mod notification;
pub mod tracking;

// Flattened so callers can write `use crate::models::Event`.
pub use alert::{DateConfig, DateUnit};
pub use event::{Event, EventUpdate, NewEvent, Repeat, Visibility};
pub use instance::{Attendance, RecurringInstance};
pub use notification::{PushNotification, Reminder, EVENT_REMINDER_SOURCE};
pub use tracking::{MonthCommit, MonthYear, NewTracking, RecurringTracking, Span};
