//! Month-at-a-time expansion of a recurring event.

use crate::calendar::common::{month_bounds, month_has_day, offset_from_seconds, on_date};
use crate::calendar::{NotifyTimeCalculator, Occurrence, RecurrenceCalculator};
use crate::config::EngineConfig;
use crate::error::{AppError, AppResult};
use crate::models::{Event, MonthCommit, MonthYear, NewTracking, RecurringInstance, Repeat, Span};
use crate::ports::{Storage, TimezoneDetail};
use crate::utils::logging::log_month_generated;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};
use log::{debug, error, warn};
use std::sync::Arc;

/// Occurrences of one event inside one local month, before anything is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthPlan {
    pub month: MonthYear,
    pub range_start: DateTime<FixedOffset>,
    pub range_end: DateTime<FixedOffset>,
    pub occurrences: Vec<Occurrence>,
    /// True when the per-month cap cut the walk short.
    pub capped: bool,
}

impl MonthPlan {
    fn empty(month: MonthYear, range_start: DateTime<FixedOffset>, range_end: DateTime<FixedOffset>) -> Self {
        Self {
            month,
            range_start,
            range_end,
            occurrences: Vec::new(),
            capped: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MonthPlanner {
    recurrence: RecurrenceCalculator,
    max_instances_per_month: usize,
}

impl MonthPlanner {
    pub fn new(recurrence: RecurrenceCalculator, max_instances_per_month: usize) -> Self {
        Self {
            recurrence,
            max_instances_per_month: max_instances_per_month.max(1),
        }
    }

    pub fn recurrence(&self) -> &RecurrenceCalculator {
        &self.recurrence
    }

    pub fn plan_month(&self, event: &Event, offset_seconds: i32, month: MonthYear) -> AppResult<MonthPlan> {
        if !event.repeat.is_recurring() {
            return Err(AppError::invalid_input(format!("Event {} does not repeat", event.id)));
        }

        let offset = offset_from_seconds(offset_seconds)?;
        let (range_start, range_end) = month_bounds(&offset, month)
            .ok_or_else(|| AppError::invalid_input(format!("Month {} is out of range", month)))?;
        let mut plan = MonthPlan::empty(month, range_start, range_end);

        let origin = Occurrence::new(event.start_time.with_timezone(&offset), event.end_time.with_timezone(&offset));
        if range_end <= origin.start {
            return Ok(plan);
        }

        let Some(first) = first_candidate(&origin, event.repeat, month, &range_start) else {
            debug!("Event {} has no occurrence in {}", event.id, month);
            return Ok(plan);
        };

        let mut current = Occurrence::new(first, first + origin.duration());
        while current.start < range_end {
            if event.repeat_until.is_some_and(|until| current.start > until) {
                break;
            }

            if current.start >= origin.start {
                if plan.occurrences.len() >= self.max_instances_per_month {
                    plan.capped = true;
                    warn!(
                        "Event {} reached the cap of {} instances in {}; remaining occurrences dropped",
                        event.id, self.max_instances_per_month, month
                    );
                    break;
                }
                plan.occurrences.push(current);
            }

            let next = self.recurrence.next_occurrence(current, event.repeat);
            if next.start <= current.start {
                error!(
                    "Recurrence for event {} did not advance past {}; stopping expansion of {}",
                    event.id, current.start, month
                );
                break;
            }
            current = next;
        }

        Ok(plan)
    }
}

/// First occurrence start the walk begins from, or none when the cadence
/// never lands in this month.
fn first_candidate(
    origin: &Occurrence,
    repeat: Repeat,
    month: MonthYear,
    range_start: &DateTime<FixedOffset>,
) -> Option<DateTime<FixedOffset>> {
    let first_of_month = NaiveDate::from_ymd_opt(month.year, month.month, 1)?;

    match repeat {
        Repeat::None => None,
        Repeat::Daily => {
            if origin.start >= *range_start {
                Some(origin.start)
            } else {
                on_date(&origin.start, first_of_month)
            }
        }
        Repeat::Weekly => {
            if origin.start >= *range_start {
                return Some(origin.start);
            }
            let target = origin.start.weekday().num_days_from_monday();
            let first = first_of_month.weekday().num_days_from_monday();
            let delta = (target + 7 - first) % 7;
            on_date(&origin.start, first_of_month + Duration::days(i64::from(delta)))
        }
        Repeat::Monthly => {
            let day = origin.start.day();
            if !month_has_day(month, day) {
                return None;
            }
            on_date(&origin.start, NaiveDate::from_ymd_opt(month.year, month.month, day)?)
        }
        Repeat::Yearly => {
            let day = origin.start.day();
            if month.month != origin.start.month() || !month_has_day(month, day) {
                return None;
            }
            on_date(&origin.start, NaiveDate::from_ymd_opt(month.year, month.month, day)?)
        }
    }
}

pub struct InstanceGenerator {
    store: Arc<dyn Storage>,
    planner: MonthPlanner,
    notify: NotifyTimeCalculator,
}

impl InstanceGenerator {
    pub fn new(store: Arc<dyn Storage>, config: &EngineConfig) -> AppResult<Self> {
        let recurrence = RecurrenceCalculator::new(config.max_monthly_attempts, config.max_yearly_skips);
        Ok(Self {
            store,
            planner: MonthPlanner::new(recurrence, config.max_instances_per_month),
            notify: NotifyTimeCalculator::new(config.system_offset_seconds)?,
        })
    }

    pub fn planner(&self) -> &MonthPlanner {
        &self.planner
    }

    pub fn notify_calculator(&self) -> &NotifyTimeCalculator {
        &self.notify
    }

    /// Expands and persists one month. Returns the instances this call
    /// created; an already generated month yields an empty list.
    pub async fn generate_for_month(
        &self,
        event: &Event,
        timezone: &TimezoneDetail,
        month: MonthYear,
    ) -> AppResult<Vec<RecurringInstance>> {
        if self.store.get_tracking(&event.id, month).await?.is_some() {
            debug!("Month {} of event {} already generated", month, event.id);
            return Ok(Vec::new());
        }

        let plan = self.planner.plan_month(event, timezone.offset_seconds, month)?;

        let instances: Vec<RecurringInstance> = plan
            .occurrences
            .iter()
            .map(|occurrence| {
                let start = occurrence.start.with_timezone(&Utc);
                let end = occurrence.end.with_timezone(&Utc);
                let notify_time = if event.notify {
                    self.notify
                        .calculate(start, event.all_day, event.alert.as_ref(), timezone.offset_seconds)
                        .map(|at| at.with_timezone(&Utc))
                } else {
                    None
                };
                RecurringInstance::from_event(event, start, end, notify_time)
            })
            .collect();

        let tracking = NewTracking {
            event_id: event.id.clone(),
            month,
            repeat: event.repeat,
            repeat_until: event.repeat_until,
            range_start: plan.range_start.with_timezone(&Utc),
            range_end: plan.range_end.with_timezone(&Utc),
            spans: instances
                .iter()
                .map(|instance| Span {
                    start: instance.start_time,
                    end: instance.end_time,
                })
                .collect(),
        };

        match self.store.persist_generated_month(tracking, instances).await? {
            MonthCommit::Created(created) => {
                log_month_generated(&event.id, &month.to_string(), created.len(), plan.capped);
                Ok(created)
            }
            MonthCommit::AlreadyGenerated => {
                debug!("Lost generation race for event {} month {}", event.id, month);
                Ok(Vec::new())
            }
        }
    }

    /// Expands the month the event starts in.
    pub async fn generate_initial(&self, event: &Event, timezone: &TimezoneDetail) -> AppResult<Vec<RecurringInstance>> {
        let offset = offset_from_seconds(timezone.offset_seconds)?;
        let month = MonthYear::of(&event.start_time.with_timezone(&offset));
        self.generate_for_month(event, timezone, month).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateConfig, Visibility};
    use chrono::TimeZone;

    const PLUS_7: i32 = 7 * 3600;

    fn event(start: &str, minutes: i64, repeat: Repeat) -> Event {
        let start = DateTime::parse_from_rfc3339(start).unwrap().with_timezone(&Utc);
        Event {
            id: "evt-1".to_string(),
            title: "Planning".to_string(),
            description: None,
            timezone_id: "Asia/Ho_Chi_Minh".to_string(),
            start_time: start,
            end_time: start + Duration::minutes(minutes),
            all_day: false,
            repeat,
            repeat_until: None,
            branch_ids: vec![],
            department_ids: vec![],
            assign_ids: vec![],
            room_ids: vec![],
            category_id: None,
            notify: true,
            alert: Some(DateConfig::minutes_before(15)),
            notify_time: None,
            visibility: Visibility::Restricted,
            created_by_id: "u-1".to_string(),
            accepted_ids: vec![],
            declined_ids: vec![],
            created_at: start,
            updated_at: start,
            deleted_at: None,
        }
    }

    fn starts(plan: &MonthPlan) -> Vec<String> {
        plan.occurrences.iter().map(|o| o.start.to_rfc3339()).collect()
    }

    #[test]
    fn test_daily_first_month_starts_at_event_start() {
        let planner = MonthPlanner::new(RecurrenceCalculator::default(), 50);
        let event = event("2024-05-28T10:00:00+07:00", 60, Repeat::Daily);

        let plan = planner.plan_month(&event, PLUS_7, MonthYear::new(2024, 5)).unwrap();
        assert_eq!(
            starts(&plan),
            vec![
                "2024-05-28T10:00:00+07:00",
                "2024-05-29T10:00:00+07:00",
                "2024-05-30T10:00:00+07:00",
                "2024-05-31T10:00:00+07:00",
            ]
        );
        assert!(plan.occurrences.iter().all(|o| o.duration() == Duration::minutes(60)));
    }

    #[test]
    fn test_daily_later_month_starts_on_day_one() {
        let planner = MonthPlanner::new(RecurrenceCalculator::default(), 50);
        let event = event("2024-05-28T10:00:00+07:00", 60, Repeat::Daily);

        let plan = planner.plan_month(&event, PLUS_7, MonthYear::new(2024, 6)).unwrap();
        assert_eq!(plan.occurrences.len(), 30);
        assert_eq!(plan.occurrences[0].start.to_rfc3339(), "2024-06-01T10:00:00+07:00");
    }

    #[test]
    fn test_weekly_finds_first_matching_weekday() {
        let planner = MonthPlanner::new(RecurrenceCalculator::default(), 50);
        // A Wednesday
        let event = event("2024-05-01T09:00:00+07:00", 30, Repeat::Weekly);

        let plan = planner.plan_month(&event, PLUS_7, MonthYear::new(2024, 6)).unwrap();
        assert_eq!(
            starts(&plan),
            vec![
                "2024-06-05T09:00:00+07:00",
                "2024-06-12T09:00:00+07:00",
                "2024-06-19T09:00:00+07:00",
                "2024-06-26T09:00:00+07:00",
            ]
        );
    }

    #[test]
    fn test_monthly_skips_months_without_the_day() {
        let planner = MonthPlanner::new(RecurrenceCalculator::default(), 50);
        let event = event("2024-01-31T09:00:00+07:00", 60, Repeat::Monthly);

        let feb = planner.plan_month(&event, PLUS_7, MonthYear::new(2024, 2)).unwrap();
        assert!(feb.occurrences.is_empty());

        let mar = planner.plan_month(&event, PLUS_7, MonthYear::new(2024, 3)).unwrap();
        assert_eq!(starts(&mar), vec!["2024-03-31T09:00:00+07:00"]);
    }

    #[test]
    fn test_yearly_only_in_original_month_of_leap_years() {
        let planner = MonthPlanner::new(RecurrenceCalculator::default(), 50);
        let event = event("2024-02-29T08:00:00+07:00", 60, Repeat::Yearly);

        assert!(planner.plan_month(&event, PLUS_7, MonthYear::new(2025, 2)).unwrap().occurrences.is_empty());
        assert!(planner.plan_month(&event, PLUS_7, MonthYear::new(2028, 3)).unwrap().occurrences.is_empty());
        assert_eq!(
            starts(&planner.plan_month(&event, PLUS_7, MonthYear::new(2028, 2)).unwrap()),
            vec!["2028-02-29T08:00:00+07:00"]
        );
    }

    #[test]
    fn test_repeat_until_bounds_the_walk() {
        let planner = MonthPlanner::new(RecurrenceCalculator::default(), 50);
        let mut event = event("2024-05-01T10:00:00+07:00", 60, Repeat::Daily);
        event.repeat_until = Some(Utc.with_ymd_and_hms(2024, 5, 3, 3, 0, 0).unwrap());

        let plan = planner.plan_month(&event, PLUS_7, MonthYear::new(2024, 5)).unwrap();
        // until is inclusive: 2024-05-03T10:00+07:00 == 03:00Z
        assert_eq!(plan.occurrences.len(), 3);
        assert!(plan
            .occurrences
            .iter()
            .all(|o| o.start.with_timezone(&Utc) <= event.repeat_until.unwrap()));
    }

    #[test]
    fn test_cap_limits_instances() {
        let planner = MonthPlanner::new(RecurrenceCalculator::default(), 5);
        let event = event("2024-05-01T10:00:00+07:00", 60, Repeat::Daily);

        let plan = planner.plan_month(&event, PLUS_7, MonthYear::new(2024, 5)).unwrap();
        assert_eq!(plan.occurrences.len(), 5);
        assert!(plan.capped);
    }

    #[test]
    fn test_months_before_start_are_empty() {
        let planner = MonthPlanner::new(RecurrenceCalculator::default(), 50);
        let event = event("2024-05-01T10:00:00+07:00", 60, Repeat::Daily);

        let plan = planner.plan_month(&event, PLUS_7, MonthYear::new(2024, 4)).unwrap();
        assert!(plan.occurrences.is_empty());
    }

    #[test]
    fn test_month_follows_event_offset() {
        let planner = MonthPlanner::new(RecurrenceCalculator::default(), 50);
        // 2024-05-31T20:00Z is June 1st in UTC+7
        let event = event("2024-06-01T03:00:00+07:00", 60, Repeat::Monthly);

        let may = planner.plan_month(&event, PLUS_7, MonthYear::new(2024, 5)).unwrap();
        assert!(may.occurrences.is_empty());
        let june = planner.plan_month(&event, PLUS_7, MonthYear::new(2024, 6)).unwrap();
        assert_eq!(june.occurrences.len(), 1);
        assert_eq!(june.range_start.to_rfc3339(), "2024-06-01T00:00:00+07:00");
    }

    #[test]
    fn test_non_repeating_event_is_rejected() {
        let planner = MonthPlanner::new(RecurrenceCalculator::default(), 50);
        let event = event("2024-05-01T10:00:00+07:00", 60, Repeat::None);
        assert!(planner.plan_month(&event, PLUS_7, MonthYear::new(2024, 5)).is_err());
    }
}
