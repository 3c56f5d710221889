//! Next/previous occurrence of a recurring time span.
//!
//! All arithmetic happens in the wall clock of the offset carried by the start
//! time, so "same day next month" means the local day, not the UTC one.

use super::common::{days_in_month, on_date};
use crate::config::{DEFAULT_MAX_MONTHLY_ATTEMPTS, DEFAULT_MAX_YEARLY_SKIPS};
use crate::models::Repeat;
use chrono::{DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate};
use log::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl Occurrence {
    pub fn new(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    fn shifted_to(&self, start: DateTime<FixedOffset>) -> Self {
        Self {
            start,
            end: start + self.duration(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

impl Direction {
    fn sign(self) -> i32 {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecurrenceCalculator {
    max_monthly_attempts: u32,
    max_yearly_skips: u32,
}

impl Default for RecurrenceCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MONTHLY_ATTEMPTS, DEFAULT_MAX_YEARLY_SKIPS)
    }
}

impl RecurrenceCalculator {
    pub fn new(max_monthly_attempts: u32, max_yearly_skips: u32) -> Self {
        Self {
            max_monthly_attempts: max_monthly_attempts.max(1),
            max_yearly_skips: max_yearly_skips.max(1),
        }
    }

    pub fn next_occurrence(&self, current: Occurrence, repeat: Repeat) -> Occurrence {
        self.step(current, repeat, Direction::Forward)
    }

    pub fn previous_occurrence(&self, current: Occurrence, repeat: Repeat) -> Occurrence {
        self.step(current, repeat, Direction::Backward)
    }

    fn step(&self, current: Occurrence, repeat: Repeat, direction: Direction) -> Occurrence {
        let days = i64::from(direction.sign());
        match repeat {
            Repeat::None => current,
            Repeat::Daily => current.shifted_to(current.start + Duration::days(days)),
            Repeat::Weekly => current.shifted_to(current.start + Duration::days(7 * days)),
            Repeat::Monthly => self.monthly(current, direction),
            Repeat::Yearly => self.yearly(current, direction),
        }
    }

    /// Keeps the day of month. Months lacking that day are skipped.
    fn monthly(&self, current: Occurrence, direction: Direction) -> Occurrence {
        let day = current.start.day();
        let mut year = current.start.year();
        let mut month = current.start.month();

        for _ in 0..self.max_monthly_attempts {
            (year, month) = shift_month(year, month, direction);
            if day <= days_in_month(year, month) {
                if let Some(start) = NaiveDate::from_ymd_opt(year, month, day)
                    .and_then(|date| on_date(&current.start, date))
                {
                    return current.shifted_to(start);
                }
            }
        }

        error!(
            "Monthly recurrence found no month containing day {} within {} attempts from {}; falling back to a plain one month shift",
            day, self.max_monthly_attempts, current.start
        );
        self.fallback(current, 1, direction)
    }

    /// Keeps month and day. Years lacking the day (Feb 29) are skipped.
    fn yearly(&self, current: Occurrence, direction: Direction) -> Occurrence {
        let month = current.start.month();
        let day = current.start.day();
        let year = current.start.year();

        for skip in 1..=self.max_yearly_skips as i32 {
            let candidate = year + skip * direction.sign();
            if let Some(start) = NaiveDate::from_ymd_opt(candidate, month, day)
                .and_then(|date| on_date(&current.start, date))
            {
                return current.shifted_to(start);
            }
        }

        error!(
            "Yearly recurrence found no year containing {:02}-{:02} within {} years from {}; falling back to a plain twelve month shift",
            month, day, self.max_yearly_skips, current.start
        );
        self.fallback(current, 12, direction)
    }

    fn fallback(&self, current: Occurrence, months: u32, direction: Direction) -> Occurrence {
        let shifted = match direction {
            Direction::Forward => current.start.checked_add_months(Months::new(months)),
            Direction::Backward => current.start.checked_sub_months(Months::new(months)),
        };
        match shifted {
            Some(start) => current.shifted_to(start),
            None => {
                error!("Recurrence fallback overflowed at {}", current.start);
                current
            }
        }
    }
}

fn shift_month(year: i32, month: u32, direction: Direction) -> (i32, u32) {
    match direction {
        Direction::Forward if month == 12 => (year + 1, 1),
        Direction::Forward => (year, month + 1),
        Direction::Backward if month == 1 => (year - 1, 12),
        Direction::Backward => (year, month - 1),
    }
}
