// file: src/models/alert.rs
use chrono::Duration;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateUnit {
    Minute,
    Hour,
    Day,
    Week,
}

/// Alert configuration attached to an event and snapshotted onto each instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateConfig {
    #[serde(default)]
    pub instant: bool,
    #[serde(default)]
    pub unit: Option<DateUnit>,
    #[serde(default)]
    pub num: u32,
    /// Local hour the alert fires at for all-day events.
    #[serde(default)]
    pub hour: u32,
}

impl DateConfig {
    pub fn minutes_before(num: u32) -> Self {
        Self {
            unit: Some(DateUnit::Minute),
            num,
            ..Self::default()
        }
    }

    pub fn days_before_at(num: u32, hour: u32) -> Self {
        Self {
            unit: Some(DateUnit::Day),
            num,
            hour,
            ..Self::default()
        }
    }

    pub fn instant() -> Self {
        Self {
            instant: true,
            ..Self::default()
        }
    }

    /// No unit, no count and not instant: nothing to fire.
    pub fn is_empty(&self) -> bool {
        self.unit.is_none() && self.num == 0 && !self.instant
    }

    /// Lead time before a timed event. Instant alerts fire at the start.
    pub fn lead_time(&self) -> Duration {
        if self.instant {
            return Duration::zero();
        }

        let num = i64::from(self.num);
        match self.unit {
            Some(DateUnit::Minute) => Duration::minutes(num),
            Some(DateUnit::Hour) => Duration::hours(num),
            Some(DateUnit::Day) => Duration::days(num),
            Some(DateUnit::Week) => Duration::weeks(num),
            None => Duration::zero(),
        }
    }

    /// Whole days an all-day alert moves back from the event day.
    pub fn days_before(&self) -> i64 {
        let num = i64::from(self.num);
        match self.unit {
            Some(DateUnit::Day) => num,
            Some(DateUnit::Week) => num * 7,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_detection() {
        assert!(DateConfig::default().is_empty());
        assert!(!DateConfig::instant().is_empty());
        assert!(!DateConfig::minutes_before(15).is_empty());
    }

    #[test]
    fn test_lead_time_per_unit() {
        assert_eq!(DateConfig::minutes_before(15).lead_time(), Duration::minutes(15));
        let hours = DateConfig { unit: Some(DateUnit::Hour), num: 2, ..DateConfig::default() };
        assert_eq!(hours.lead_time(), Duration::hours(2));
        let weeks = DateConfig { unit: Some(DateUnit::Week), num: 1, ..DateConfig::default() };
        assert_eq!(weeks.lead_time(), Duration::days(7));
        let instant = DateConfig { instant: true, unit: Some(DateUnit::Hour), num: 3, hour: 0 };
        assert_eq!(instant.lead_time(), Duration::zero());
    }

    #[test]
    fn test_days_before_ignores_sub_day_units() {
        assert_eq!(DateConfig::days_before_at(2, 9).days_before(), 2);
        let weeks = DateConfig { unit: Some(DateUnit::Week), num: 2, ..DateConfig::default() };
        assert_eq!(weeks.days_before(), 14);
        assert_eq!(DateConfig::minutes_before(30).days_before(), 0);
    }

    #[test]
    fn test_deserializes_partial_json() {
        let config: DateConfig = serde_json::from_str(r#"{"unit":"minute","num":15}"#).unwrap();
        assert_eq!(config, DateConfig::minutes_before(15));
    }
}
