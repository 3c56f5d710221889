// file: src/database/instances.rs
use super::parse_column;
use crate::error::AppResult;
use crate::models::{DateConfig, RecurringInstance};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};

const INSTANCE_COLUMNS: &str = "id, event_id, title, description, timezone_id, start_time, end_time, all_day, \
    branch_ids, department_ids, assign_ids, room_ids, category_id, notify, alert, notify_time, visibility, \
    created_by_id, accepted_ids, declined_ids, created_at, updated_at, deleted_at";

impl<'r> FromRow<'r, SqliteRow> for RecurringInstance {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(RecurringInstance {
            id: row.try_get("id")?,
            event_id: row.try_get("event_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            timezone_id: row.try_get("timezone_id")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            all_day: row.try_get("all_day")?,
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

/// Runs inside the month-persist and series-split transactions.
pub(super) async fn insert(conn: &mut SqliteConnection, instance: &RecurringInstance) -> AppResult<()> {
    sqlx::query(&format!(
        "INSERT INTO recurring_instances ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        INSTANCE_COLUMNS
    ))
    .bind(&instance.id)
    .bind(&instance.event_id)
    .bind(&instance.title)
    .bind(&instance.description)
    .bind(&instance.timezone_id)
    .bind(instance.start_time)
    .bind(instance.end_time)
    .bind(instance.all_day)
    .bind(Json(&instance.branch_ids))
    .bind(Json(&instance.department_ids))
    .bind(Json(&instance.assign_ids))
    .bind(Json(&instance.room_ids))
    .bind(&instance.category_id)
    .bind(instance.notify)
    .bind(instance.alert.as_ref().map(Json))
    .bind(instance.notify_time)
    .bind(instance.visibility.as_str())
    .bind(&instance.created_by_id)
    .bind(Json(&instance.accepted_ids))
    .bind(Json(&instance.declined_ids))
    .bind(instance.created_at)
    .bind(instance.updated_at)
    .bind(instance.deleted_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn get(pool: &SqlitePool, id: &str) -> AppResult<Option<RecurringInstance>> {
    let instance = sqlx::query_as::<_, RecurringInstance>(&format!(
        "SELECT {} FROM recurring_instances WHERE id = ? AND deleted_at IS NULL",
        INSTANCE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(instance)
}

pub async fn list_by_event_ids(
    pool: &SqlitePool,
    event_ids: &[String],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> AppResult<Vec<RecurringInstance>> {
    if event_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM recurring_instances WHERE deleted_at IS NULL AND start_time < ",
        INSTANCE_COLUMNS
    ));
    // Zero-length instances starting at `from` still count as inside
    query.push_bind(to);
    query.push(" AND (end_time > ");
    query.push_bind(from);
    query.push(" OR start_time >= ");
    query.push_bind(from);
    query.push(") AND event_id IN (");
    let mut separated = query.separated(", ");
    for id in event_ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(") ORDER BY start_time ASC");

    let instances = query.build_query_as::<RecurringInstance>().fetch_all(pool).await?;
    Ok(instances)
}

/// Rewrites the editable columns of one live instance.
pub async fn update(pool: &SqlitePool, instance: &RecurringInstance) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE recurring_instances SET
            title = ?, description = ?, timezone_id = ?, start_time = ?, end_time = ?, all_day = ?,
            branch_ids = ?, department_ids = ?, assign_ids = ?, room_ids = ?, category_id = ?,
            notify = ?, alert = ?, notify_time = ?, visibility = ?, updated_at = ?
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(&instance.title)
    .bind(&instance.description)
    .bind(&instance.timezone_id)
    .bind(instance.start_time)
    .bind(instance.end_time)
    .bind(instance.all_day)
    .bind(Json(&instance.branch_ids))
    .bind(Json(&instance.department_ids))
    .bind(Json(&instance.assign_ids))
    .bind(Json(&instance.room_ids))
    .bind(&instance.category_id)
    .bind(instance.notify)
    .bind(instance.alert.as_ref().map(Json))
    .bind(instance.notify_time)
    .bind(instance.visibility.as_str())
    .bind(instance.updated_at)
    .bind(&instance.id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn soft_delete(pool: &SqlitePool, id: &str) -> AppResult<()> {
    let now = Utc::now();
    sqlx::query("UPDATE recurring_instances SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn soft_delete_after(conn: &mut SqliteConnection, event_id: &str, after: DateTime<Utc>) -> AppResult<u64> {
    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE recurring_instances SET deleted_at = ?, updated_at = ? WHERE event_id = ? AND start_time > ? AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(now)
    .bind(event_id)
    .bind(after)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn soft_delete_by_event(conn: &mut SqliteConnection, event_id: &str) -> AppResult<u64> {
    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE recurring_instances SET deleted_at = ?, updated_at = ? WHERE event_id = ? AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(now)
    .bind(event_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn update_attendance(pool: &SqlitePool, id: &str, accepted: &[String], declined: &[String]) -> AppResult<()> {
    sqlx::query("UPDATE recurring_instances SET accepted_ids = ?, declined_ids = ?, updated_at = ? WHERE id = ?")
        .bind(Json(accepted))
        .bind(Json(declined))
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
