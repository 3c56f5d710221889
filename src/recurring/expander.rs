//! Date-range queries over recurring events.
//!
//! Any (event, month) pair the range touches that has not been expanded yet
//! is generated first, so callers always see a complete view of the window.

use super::generator::InstanceGenerator;
use crate::calendar::common::{month_bounds, month_has_day, offset_from_seconds};
use crate::error::{AppError, AppResult};
use crate::models::{Event, MonthYear, RecurringInstance, Repeat};
use crate::ports::{Storage, TimezoneDetail, TimezoneResolver};
use crate::utils::remove_duplicates;
use chrono::{DateTime, Datelike, Duration, Utc};
use futures::future::try_join_all;
use log::{debug, error, info};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Widest UTC offset in use; months are widened by this much so every
/// event's local month that could touch the range is considered.
const MAX_OFFSET_HOURS: i64 = 14;

pub struct RangeExpander {
    store: Arc<dyn Storage>,
    timezones: Arc<dyn TimezoneResolver>,
    generator: Arc<InstanceGenerator>,
}

impl RangeExpander {
    pub fn new(store: Arc<dyn Storage>, timezones: Arc<dyn TimezoneResolver>, generator: Arc<InstanceGenerator>) -> Self {
        Self {
            store,
            timezones,
            generator,
        }
    }

    pub async fn instances_in_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> AppResult<Vec<RecurringInstance>> {
        if to < from {
            return Err(AppError::invalid_input(format!("Range end {} is before start {}", to, from)));
        }
        if to == from {
            return Ok(Vec::new());
        }

        let (inside, outside) = tokio::try_join!(
            self.store.list_trackings_in_range(from, to),
            self.store.list_trackings_outside_range(from, to),
        )?;

        let mut generated: BTreeMap<String, HashSet<MonthYear>> = BTreeMap::new();
        for tracking in inside.iter().chain(outside.iter()) {
            generated
                .entry(tracking.event_id.clone())
                .or_default()
                .insert(tracking.month_year());
        }
        let event_ids: Vec<String> = generated.keys().cloned().collect();

        let candidates = MonthYear::of(&(from - Duration::hours(MAX_OFFSET_HOURS)))
            .through(MonthYear::of(&(to + Duration::hours(MAX_OFFSET_HOURS))));

        let missing: BTreeMap<String, Vec<MonthYear>> = generated
            .iter()
            .filter_map(|(event_id, done)| {
                let months: Vec<MonthYear> = candidates.iter().filter(|m| !done.contains(m)).copied().collect();
                (!months.is_empty()).then(|| (event_id.clone(), months))
            })
            .collect();

        let mut created = Vec::new();
        if missing.is_empty() {
            debug!("All months in {}..{} already generated", from, to);
        } else {
            created = self.generate_missing(&missing, from, to).await?;
        }

        let existing = self.store.list_instances_by_event_ids(&event_ids, from, to).await?;

        let mut seen = HashSet::new();
        let mut instances: Vec<RecurringInstance> = existing
            .into_iter()
            .chain(created.into_iter().filter(|instance| instance.overlaps(from, to)))
            .filter(|instance| seen.insert(instance.id.clone()))
            .collect();
        instances.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));

        Ok(instances)
    }

    async fn generate_missing(
        &self,
        missing: &BTreeMap<String, Vec<MonthYear>>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<RecurringInstance>> {
        let ids: Vec<String> = missing.keys().cloned().collect();
        let events = self.store.list_events_by_ids(&ids).await?;

        let zone_ids: Vec<String> = remove_duplicates(events.iter().map(|e| e.timezone_id.clone()).collect());
        let details = try_join_all(zone_ids.iter().map(|id| self.resolve(id))).await?;
        let zones: HashMap<String, Option<TimezoneDetail>> = zone_ids.into_iter().zip(details).collect();

        let mut created = Vec::new();
        for event in &events {
            let Some(Some(zone)) = zones.get(&event.timezone_id) else {
                error!("Skipping expansion of event {}: timezone {} unavailable", event.id, event.timezone_id);
                continue;
            };
            let Some(months) = missing.get(&event.id) else {
                continue;
            };

            for month in qualifying_months(event, zone, months, from, to)? {
                created.extend(self.generator.generate_for_month(event, zone, month).await?);
            }
        }

        if !created.is_empty() {
            info!("Materialized {} instance(s) for range {}..{}", created.len(), from, to);
        }
        Ok(created)
    }

    /// Unknown zones are reported per event instead of failing the range.
    async fn resolve(&self, id: &str) -> AppResult<Option<TimezoneDetail>> {
        match self.timezones.detail(id).await {
            Ok(detail) => Ok(Some(detail)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Months worth generating for `event`: overlapping the range in the event's
/// offset, not entirely before its start or after its repeat window, and for
/// monthly/yearly cadences containing the original day.
fn qualifying_months(
    event: &Event,
    zone: &TimezoneDetail,
    months: &[MonthYear],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> AppResult<Vec<MonthYear>> {
    let offset = offset_from_seconds(zone.offset_seconds)?;
    let local_start = event.start_time.with_timezone(&offset);

    let mut qualifying = BTreeSet::new();
    for month in months {
        let Some((month_start, month_end)) = month_bounds(&offset, *month) else {
            continue;
        };
        if month_start >= to || month_end <= from {
            continue;
        }
        if month_end <= event.start_time {
            continue;
        }
        if event.repeat_until.is_some_and(|until| month_start > until) {
            continue;
        }
        match event.repeat {
            Repeat::None => continue,
            Repeat::Yearly if month.month != local_start.month() => continue,
            Repeat::Monthly | Repeat::Yearly if !month_has_day(*month, local_start.day()) => continue,
            _ => {}
        }
        qualifying.insert(*month);
    }

    Ok(qualifying.into_iter().collect())
}
