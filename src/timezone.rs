use crate::error::{AppError, AppResult};
use crate::ports::{TimezoneDetail, TimezoneResolver};
use async_trait::async_trait;
use chrono::{DateTime, Offset, TimeZone, Utc};
use std::str::FromStr;

/// Resolves IANA zone names through chrono-tz, plus literal `±HH:MM`
/// offsets and `UTC`/`Z`.
///
/// Zones with daylight saving are pinned to the offset in force at the
/// reference instant (now, unless fixed with `at`).
#[derive(Debug, Clone, Default)]
pub struct TzDatabaseResolver {
    reference: Option<DateTime<Utc>>,
}

impl TzDatabaseResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(reference: DateTime<Utc>) -> Self {
        Self {
            reference: Some(reference),
        }
    }

    pub fn offset_seconds(&self, id: &str) -> AppResult<i32> {
        let trimmed = id.trim();
        if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" {
            return Ok(0);
        }
        if let Some(seconds) = parse_fixed_offset(trimmed) {
            return Ok(seconds);
        }

        let tz = chrono_tz::Tz::from_str(trimmed).map_err(|_| AppError::timezone_not_found(id))?;
        let reference = self.reference.unwrap_or_else(Utc::now);
        Ok(tz.offset_from_utc_datetime(&reference.naive_utc()).fix().local_minus_utc())
    }
}

#[async_trait]
impl TimezoneResolver for TzDatabaseResolver {
    async fn detail(&self, id: &str) -> AppResult<TimezoneDetail> {
        Ok(TimezoneDetail {
            id: id.to_string(),
            offset_seconds: self.offset_seconds(id)?,
        })
    }
}

/// `+07:00`, `-0530` or `+7`. Anything beyond ±14h is rejected.
fn parse_fixed_offset(value: &str) -> Option<i32> {
    let (sign, rest) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }

    Some(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolves_iana_zone() {
        let resolver = TzDatabaseResolver::new();
        let detail = resolver.detail("Asia/Ho_Chi_Minh").await.unwrap();
        assert_eq!(detail.offset_seconds, 7 * 3600);
        assert_eq!(detail.id, "Asia/Ho_Chi_Minh");
    }

    #[tokio::test]
    async fn test_daylight_saving_follows_reference_instant() {
        let summer = TzDatabaseResolver::at(Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap());
        let winter = TzDatabaseResolver::at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(summer.detail("America/New_York").await.unwrap().offset_seconds, -4 * 3600);
        assert_eq!(winter.detail("America/New_York").await.unwrap().offset_seconds, -5 * 3600);
    }

    #[test]
    fn test_fixed_offsets() {
        let resolver = TzDatabaseResolver::new();
        assert_eq!(resolver.offset_seconds("+07:00").unwrap(), 25_200);
        assert_eq!(resolver.offset_seconds("-0530").unwrap(), -(5 * 3600 + 30 * 60));
        assert_eq!(resolver.offset_seconds("+9").unwrap(), 9 * 3600);
        assert_eq!(resolver.offset_seconds("UTC").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_zone_is_not_found() {
        let resolver = TzDatabaseResolver::new();
        let err = resolver.detail("Mars/Olympus_Mons").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(resolver.offset_seconds("+15:00").is_err());
    }
}
