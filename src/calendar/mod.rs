// Calendar arithmetic
// Pure occurrence and notify-time math, no I/O.

pub mod common;
pub mod notify_time;
pub mod recurrence;

pub use notify_time::NotifyTimeCalculator;
pub use recurrence::{Occurrence, RecurrenceCalculator};
