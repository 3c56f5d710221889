use super::common::{at_local, offset_from_seconds};
use crate::error::AppResult;
use crate::models::DateConfig;
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};
use log::warn;

/// Turns an occurrence start and its alert config into the instant the
/// reminder should fire, expressed in the system offset.
#[derive(Debug, Clone, Copy)]
pub struct NotifyTimeCalculator {
    system_offset: FixedOffset,
}

impl NotifyTimeCalculator {
    pub fn new(system_offset_seconds: i32) -> AppResult<Self> {
        Ok(Self {
            system_offset: offset_from_seconds(system_offset_seconds)?,
        })
    }

    pub fn system_offset(&self) -> FixedOffset {
        self.system_offset
    }

    pub fn calculate(
        &self,
        start: DateTime<Utc>,
        all_day: bool,
        alert: Option<&DateConfig>,
        event_offset_seconds: i32,
    ) -> Option<DateTime<FixedOffset>> {
        let alert = alert?;

        let notify_at = if all_day {
            self.all_day(start, alert, event_offset_seconds)?
        } else if alert.is_empty() {
            return None;
        } else {
            start - alert.lead_time()
        };

        Some(notify_at.with_timezone(&self.system_offset))
    }

    /// All-day alerts fire at `hour:00` local, `days_before` days ahead of the
    /// event day. `instant` only keeps a midnight alert from counting as empty.
    fn all_day(&self, start: DateTime<Utc>, alert: &DateConfig, event_offset_seconds: i32) -> Option<DateTime<Utc>> {
        if alert.hour == 0 && alert.num == 0 && !alert.instant {
            return None;
        }

        let Some(event_offset) = FixedOffset::east_opt(event_offset_seconds) else {
            warn!("Skipping all-day notify time: event offset {}s is out of range", event_offset_seconds);
            return None;
        };
        let Some(time) = NaiveTime::from_hms_opt(alert.hour, 0, 0) else {
            warn!("Skipping all-day notify time: alert hour {} is not a valid hour", alert.hour);
            return None;
        };

        let day = start.with_timezone(&event_offset).date_naive() - Duration::days(alert.days_before());

        at_local(&event_offset, day.and_time(time)).map(|local| local.with_timezone(&Utc))
    }
}
