// file: src/database/trackings.rs
use super::parse_column;
use crate::error::AppResult;
use crate::models::{MonthYear, NewTracking, RecurringTracking, Span};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::{FromRow, Row, SqliteConnection, SqlitePool};

const TRACKING_COLUMNS: &str =
    "id, event_id, year, month, repeat, repeat_until, range_start, range_end, spans, created_at";

impl<'r> FromRow<'r, SqliteRow> for RecurringTracking {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(RecurringTracking {
            id: row.try_get("id")?,
            event_id: row.try_get("event_id")?,
            year: row.try_get("year")?,
            month: row.try_get("month")?,
            repeat: parse_column(row, "repeat")?,
            repeat_until: row.try_get("repeat_until")?,
            range_start: row.try_get("range_start")?,
            range_end: row.try_get("range_end")?,
            spans: row.try_get::<Json<Vec<Span>>, _>("spans")?.0,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Returns false when the `(event, year, month)` key is already taken.
pub(super) async fn insert_if_absent(conn: &mut SqliteConnection, tracking: &NewTracking) -> AppResult<bool> {
    let result = sqlx::query(&format!(
        "INSERT INTO recurring_trackings ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(event_id, year, month) DO NOTHING",
        TRACKING_COLUMNS
    ))
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&tracking.event_id)
    .bind(tracking.month.year)
    .bind(tracking.month.month)
    .bind(tracking.repeat.as_str())
    .bind(tracking.repeat_until)
    .bind(tracking.range_start)
    .bind(tracking.range_end)
    .bind(Json(&tracking.spans))
    .bind(Utc::now())
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get(pool: &SqlitePool, event_id: &str, month: MonthYear) -> AppResult<Option<RecurringTracking>> {
    let tracking = sqlx::query_as::<_, RecurringTracking>(&format!(
        "SELECT {} FROM recurring_trackings WHERE event_id = ? AND year = ? AND month = ?",
        TRACKING_COLUMNS
    ))
    .bind(event_id)
    .bind(month.year)
    .bind(month.month)
    .fetch_optional(pool)
    .await?;

    Ok(tracking)
}

pub async fn list_in_range(pool: &SqlitePool, from: DateTime<Utc>, to: DateTime<Utc>) -> AppResult<Vec<RecurringTracking>> {
    let trackings = sqlx::query_as::<_, RecurringTracking>(&format!(
        r#"
        SELECT {}
        FROM recurring_trackings
        WHERE range_start < ?
            AND range_end > ?
            AND (repeat_until IS NULL OR repeat_until >= ?)
        ORDER BY event_id, year, month
        "#,
        TRACKING_COLUMNS
    ))
    .bind(to)
    .bind(from)
    .bind(from)
    .fetch_all(pool)
    .await?;

    Ok(trackings)
}

pub async fn list_outside_range(
    pool: &SqlitePool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> AppResult<Vec<RecurringTracking>> {
    let trackings = sqlx::query_as::<_, RecurringTracking>(&format!(
        r#"
        SELECT {}
        FROM recurring_trackings
        WHERE NOT (range_start < ? AND range_end > ?)
            AND (repeat_until IS NULL OR repeat_until >= ?)
        ORDER BY event_id, year, month
        "#,
        TRACKING_COLUMNS
    ))
    .bind(to)
    .bind(from)
    .bind(from)
    .fetch_all(pool)
    .await?;

    Ok(trackings)
}

pub async fn update_repeat_until(conn: &mut SqliteConnection, event_id: &str, repeat_until: DateTime<Utc>) -> AppResult<()> {
    sqlx::query("UPDATE recurring_trackings SET repeat_until = ? WHERE event_id = ?")
        .bind(repeat_until)
        .bind(event_id)
        .execute(conn)
        .await?;

    Ok(())
}

pub async fn delete_by_event(conn: &mut SqliteConnection, event_id: &str) -> AppResult<u64> {
    let result = sqlx::query("DELETE FROM recurring_trackings WHERE event_id = ?")
        .bind(event_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}
