// file: src/database/events.rs
use super::parse_column;
use crate::error::AppResult;
use crate::models::{DateConfig, Event};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};

pub(super) const EVENT_COLUMNS: &str = "id, title, description, timezone_id, start_time, end_time, all_day, \
    repeat, repeat_until, branch_ids, department_ids, assign_ids, room_ids, category_id, notify, alert, \
    notify_time, visibility, created_by_id, accepted_ids, declined_ids, created_at, updated_at, deleted_at";

impl<'r> FromRow<'r, SqliteRow> for Event {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Event {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            timezone_id: row.try_get("timezone_id")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            all_day: row.try_get("all_day")?,
            repeat: parse_column(row, "repeat")?,
            repeat_until: row.try_get("repeat_until")?,
            branch_ids: row.try_get::<Json<Vec<String>>, _>("branch_ids")?.0,
            department_ids: row.try_get::<Json<Vec<String>>, _>("department_ids")?.0,
            assign_ids: row.try_get::<Json<Vec<String>>, _>("assign_ids")?.0,
            room_ids: row.try_get::<Json<Vec<String>>, _>("room_ids")?.0,
            category_id: row.try_get("category_id")?,
            notify: row.try_get("notify")?,
            alert: row.try_get::<Option<Json<DateConfig>>, _>("alert")?.map(|json| json.0),
            notify_time: row.try_get("notify_time")?,
            visibility: parse_column(row, "visibility")?,
            created_by_id: row.try_get("created_by_id")?,
            accepted_ids: row.try_get::<Json<Vec<String>>, _>("accepted_ids")?.0,
            declined_ids: row.try_get::<Json<Vec<String>>, _>("declined_ids")?.0,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

pub async fn insert(conn: &mut SqliteConnection, event: &Event) -> AppResult<()> {
    sqlx::query(&format!(
        "INSERT INTO events ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        EVENT_COLUMNS
    ))
    .bind(&event.id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(&event.timezone_id)
    .bind(event.start_time)
    .bind(event.end_time)
    .bind(event.all_day)
    .bind(event.repeat.as_str())
    .bind(event.repeat_until)
    .bind(Json(&event.branch_ids))
    .bind(Json(&event.department_ids))
    .bind(Json(&event.assign_ids))
    .bind(Json(&event.room_ids))
    .bind(&event.category_id)
    .bind(event.notify)
    .bind(event.alert.as_ref().map(Json))
    .bind(event.notify_time)
    .bind(event.visibility.as_str())
    .bind(&event.created_by_id)
    .bind(Json(&event.accepted_ids))
    .bind(Json(&event.declined_ids))
    .bind(event.created_at)
    .bind(event.updated_at)
    .bind(event.deleted_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Overwrites every editable column of a live event. Identity, creator,
/// attendance and `created_at` are kept.
pub async fn replace(conn: &mut SqliteConnection, event: &Event) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE events SET
            title = ?, description = ?, timezone_id = ?, start_time = ?, end_time = ?, all_day = ?,
            repeat = ?, repeat_until = ?, branch_ids = ?, department_ids = ?, assign_ids = ?,
            room_ids = ?, category_id = ?, notify = ?, alert = ?, notify_time = ?, visibility = ?,
            updated_at = ?
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(&event.title)
    .bind(&event.description)
    .bind(&event.timezone_id)
    .bind(event.start_time)
    .bind(event.end_time)
    .bind(event.all_day)
    .bind(event.repeat.as_str())
    .bind(event.repeat_until)
    .bind(Json(&event.branch_ids))
    .bind(Json(&event.department_ids))
    .bind(Json(&event.assign_ids))
    .bind(Json(&event.room_ids))
    .bind(&event.category_id)
    .bind(event.notify)
    .bind(event.alert.as_ref().map(Json))
    .bind(event.notify_time)
    .bind(event.visibility.as_str())
    .bind(event.updated_at)
    .bind(&event.id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn get(pool: &SqlitePool, id: &str) -> AppResult<Option<Event>> {
    let event = sqlx::query_as::<_, Event>(&format!(
        "SELECT {} FROM events WHERE id = ? AND deleted_at IS NULL",
        EVENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(event)
}

pub async fn list_by_ids(pool: &SqlitePool, ids: &[String]) -> AppResult<Vec<Event>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM events WHERE deleted_at IS NULL AND id IN (", EVENT_COLUMNS));
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(") ORDER BY start_time ASC");

    let events = query.build_query_as::<Event>().fetch_all(pool).await?;
    Ok(events)
}

pub async fn list_due(
    pool: &SqlitePool,
    at: DateTime<Utc>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> AppResult<Vec<Event>> {
    let events = sqlx::query_as::<_, Event>(&format!(
        r#"
        SELECT {}
        FROM events
        WHERE repeat = 'none'
            AND notify = 1
            AND notify_time = ?
            AND start_time >= ?
            AND start_time < ?
            AND deleted_at IS NULL
        ORDER BY start_time ASC
        "#,
        EVENT_COLUMNS
    ))
    .bind(at)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    Ok(events)
}

pub async fn update_repeat_until(conn: &mut SqliteConnection, id: &str, repeat_until: DateTime<Utc>) -> AppResult<()> {
    sqlx::query("UPDATE events SET repeat_until = ?, updated_at = ? WHERE id = ?")
        .bind(repeat_until)
        .bind(Utc::now())
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}

pub async fn update_attendance(pool: &SqlitePool, id: &str, accepted: &[String], declined: &[String]) -> AppResult<()> {
    sqlx::query("UPDATE events SET accepted_ids = ?, declined_ids = ?, updated_at = ? WHERE id = ?")
        .bind(Json(accepted))
        .bind(Json(declined))
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn soft_delete(conn: &mut SqliteConnection, id: &str) -> AppResult<()> {
    let now = Utc::now();
    sqlx::query("UPDATE events SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}
