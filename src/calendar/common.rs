use crate::error::{AppError, AppResult};
use crate::models::MonthYear;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};

/// Builds a fixed offset, rejecting anything chrono cannot represent.
pub fn offset_from_seconds(seconds: i32) -> AppResult<FixedOffset> {
    FixedOffset::east_opt(seconds)
        .ok_or_else(|| AppError::invalid_input(format!("UTC offset out of range: {}s", seconds)))
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    match (
        NaiveDate::from_ymd_opt(year, month, 1),
        NaiveDate::from_ymd_opt(next_year, next_month, 1),
    ) {
        (Some(first), Some(next_first)) => (next_first - first).num_days() as u32,
        _ => 0,
    }
}

pub fn month_has_day(month: MonthYear, day: u32) -> bool {
    day >= 1 && day <= days_in_month(month.year, month.month)
}

/// Resolves a wall-clock time in a fixed offset. Fixed offsets never have
/// gaps or folds, so this only fails on out-of-range dates.
pub fn at_local(offset: &FixedOffset, naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    offset.from_local_datetime(&naive).single()
}

/// Same wall-clock time of day as `reference`, on `date`.
pub fn on_date(reference: &DateTime<FixedOffset>, date: NaiveDate) -> Option<DateTime<FixedOffset>> {
    at_local(reference.offset(), date.and_time(reference.time()))
}

/// `[first instant of month, first instant of next month)` in `offset`.
pub fn month_bounds(
    offset: &FixedOffset,
    month: MonthYear,
) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    let next = month.next();
    let start = NaiveDate::from_ymd_opt(month.year, month.month, 1)?.and_time(NaiveTime::MIN);
    let end = NaiveDate::from_ymd_opt(next.year, next.month, 1)?.and_time(NaiveTime::MIN);
    Some((at_local(offset, start)?, at_local(offset, end)?))
}

/// Drops sub-second precision so stored text timestamps compare correctly.
pub fn truncate_to_second(value: DateTime<Utc>) -> DateTime<Utc> {
    value.with_nanosecond(0).unwrap_or(value)
}

/// Truncates to the start of the minute as seen in `offset`.
pub fn truncate_to_minute<Tz: TimeZone>(value: &DateTime<Tz>, offset: &FixedOffset) -> DateTime<FixedOffset> {
    let local = value.with_timezone(offset);
    local
        .with_second(0)
        .and_then(|v| v.with_nanosecond(0))
        .unwrap_or(local)
}
