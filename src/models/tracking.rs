// file: src/models/tracking.rs
use super::event::Repeat;
use super::instance::RecurringInstance;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar month in an event's local offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthYear {
    pub year: i32,
    pub month: u32,
}

impl MonthYear {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn of<D: Datelike>(date: &D) -> Self {
        Self::new(date.year(), date.month())
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }

    /// Inclusive walk from `self` to `last`.
    pub fn through(self, last: MonthYear) -> Vec<MonthYear> {
        let mut months = Vec::new();
        let mut current = self;
        while current <= last {
            months.push(current);
            current = current.next();
        }
        months
    }
}

impl fmt::Display for MonthYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Marker that a month of an event has been expanded and persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringTracking {
    pub id: String,
    pub event_id: String,
    pub year: i32,
    pub month: u32,
    pub repeat: Repeat,
    pub repeat_until: Option<DateTime<Utc>>,
    /// Local month bounds converted to UTC, used for range queries.
    pub range_start: DateTime<Utc>,
    pub range_end: DateTime<Utc>,
    pub spans: Vec<Span>,
    pub created_at: DateTime<Utc>,
}

impl RecurringTracking {
    pub fn month_year(&self) -> MonthYear {
        MonthYear::new(self.year, self.month)
    }
}

/// Tracking row about to be written alongside a month's instances.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTracking {
    pub event_id: String,
    pub month: MonthYear,
    pub repeat: Repeat,
    pub repeat_until: Option<DateTime<Utc>>,
    pub range_start: DateTime<Utc>,
    pub range_end: DateTime<Utc>,
    pub spans: Vec<Span>,
}

/// Outcome of persisting one generated month.
#[derive(Debug, Clone, PartialEq)]
pub enum MonthCommit {
    Created(Vec<RecurringInstance>),
    /// Someone else generated the month first; nothing was written.
    AlreadyGenerated,
}
