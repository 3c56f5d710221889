// file: src/database/mod.rs

use crate::error::{AppError, AppResult};
use crate::models::{Event, MonthCommit, MonthYear, NewTracking, RecurringInstance, RecurringTracking};
use crate::ports::Storage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

// Declare submodules
pub mod events;
pub mod instances;
pub mod trackings;

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the database at `database_url` and applies
    /// the schema.
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self::from_pool(pool).await?;
        info!("Database initialized successfully");
        Ok(db)
    }

    pub async fn from_pool(pool: SqlitePool) -> AppResult<Self> {
        run_schema(&pool).await?;
        Ok(Database { pool })
    }
}

#[async_trait]
impl Storage for Database {
    // --- Event Delegates ---

    async fn create_event(&self, event: &Event) -> AppResult<()> {
        let mut conn = self.pool.acquire().await?;
        events::insert(&mut conn, event).await
    }

    async fn get_event(&self, id: &str) -> AppResult<Option<Event>> {
        events::get(&self.pool, id).await
    }

    async fn list_events_by_ids(&self, ids: &[String]) -> AppResult<Vec<Event>> {
        events::list_by_ids(&self.pool, ids).await
    }

    async fn list_due_events(
        &self,
        at: DateTime<Utc>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Event>> {
        events::list_due(&self.pool, at, from, to).await
    }

    async fn update_event_attendance(&self, id: &str, accepted: &[String], declined: &[String]) -> AppResult<()> {
        events::update_attendance(&self.pool, id, accepted, declined).await
    }

    // --- Tracking Delegates ---

    async fn list_trackings_in_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> AppResult<Vec<RecurringTracking>> {
        trackings::list_in_range(&self.pool, from, to).await
    }

    async fn list_trackings_outside_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<RecurringTracking>> {
        trackings::list_outside_range(&self.pool, from, to).await
    }

    async fn get_tracking(&self, event_id: &str, month: MonthYear) -> AppResult<Option<RecurringTracking>> {
        trackings::get(&self.pool, event_id, month).await
    }

    async fn persist_generated_month(
        &self,
        tracking: NewTracking,
        instances: Vec<RecurringInstance>,
    ) -> AppResult<MonthCommit> {
        let mut tx = self.pool.begin().await?;

        if !trackings::insert_if_absent(&mut tx, &tracking).await? {
            tx.rollback().await?;
            debug!("Month {} of event {} was generated concurrently", tracking.month, tracking.event_id);
            return Ok(MonthCommit::AlreadyGenerated);
        }

        for instance in &instances {
            instances::insert(&mut tx, instance).await?;
        }

        tx.commit().await?;
        Ok(MonthCommit::Created(instances))
    }

    // --- Instance Delegates ---

    async fn get_instance(&self, id: &str) -> AppResult<Option<RecurringInstance>> {
        instances::get(&self.pool, id).await
    }

    async fn list_instances_by_event_ids(
        &self,
        event_ids: &[String],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<RecurringInstance>> {
        instances::list_by_event_ids(&self.pool, event_ids, from, to).await
    }

    async fn delete_instance(&self, id: &str) -> AppResult<()> {
        instances::soft_delete(&self.pool, id).await
    }

    async fn update_instance(&self, instance: &RecurringInstance) -> AppResult<()> {
        if instances::update(&self.pool, instance).await? == 0 {
            return Err(AppError::instance_not_found(&instance.id));
        }
        Ok(())
    }

    async fn update_instance_attendance(&self, id: &str, accepted: &[String], declined: &[String]) -> AppResult<()> {
        instances::update_attendance(&self.pool, id, accepted, declined).await
    }

    // --- Series ---

    async fn end_series(&self, event_id: &str, cut: DateTime<Utc>) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;
        let removed = end_series_in(&mut tx, event_id, cut).await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn split_series(&self, event_id: &str, cut: DateTime<Utc>, successor: &Event) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;
        let removed = end_series_in(&mut tx, event_id, cut).await?;
        events::insert(&mut tx, successor).await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn delete_series(&self, event_id: &str) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;
        let removed = instances::soft_delete_by_event(&mut tx, event_id).await?;
        events::soft_delete(&mut tx, event_id).await?;
        let dropped = trackings::delete_by_event(&mut tx, event_id).await?;
        tx.commit().await?;

        debug!("Deleted series {}: {} instance(s), {} tracking(s)", event_id, removed, dropped);
        Ok(removed)
    }

    async fn replace_series(&self, event: &Event) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;
        if events::replace(&mut tx, event).await? == 0 {
            tx.rollback().await?;
            return Err(AppError::event_not_found(&event.id));
        }
        let removed = instances::soft_delete_by_event(&mut tx, &event.id).await?;
        trackings::delete_by_event(&mut tx, &event.id).await?;
        tx.commit().await?;
        Ok(removed)
    }
}

async fn end_series_in(conn: &mut SqliteConnection, event_id: &str, cut: DateTime<Utc>) -> AppResult<u64> {
    let removed = instances::soft_delete_after(conn, event_id, cut).await?;
    events::update_repeat_until(conn, event_id, cut).await?;
    trackings::update_repeat_until(conn, event_id, cut).await?;
    Ok(removed)
}

/// Decodes a text column through the type's `FromStr`.
pub(crate) fn parse_column<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>().map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: e.into(),
    })
}

async fn run_schema(pool: &SqlitePool) -> AppResult<()> {
    let schema = include_str!("schema.sql");

    let mut current_statement = String::new();
    for line in schema.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") || trimmed.is_empty() {
            continue;
        }

        current_statement.push_str(line);
        current_statement.push('\n');

        if trimmed.ends_with(';') {
            sqlx::query(&current_statement).execute(pool).await?;
            current_statement.clear();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateConfig, Repeat, Span, Visibility};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use tempfile::NamedTempFile;

    async fn create_test_database() -> Database {
        let temp_file = NamedTempFile::new().unwrap();
        let (_, path) = temp_file.keep().unwrap();
        let db_path = format!("sqlite:{}", path.to_str().unwrap());

        Database::connect(&db_path).await.unwrap()
    }

    fn sample_event(id: &str) -> Event {
        let start = Utc.with_ymd_and_hms(2024, 5, 5, 3, 0, 0).unwrap();
        Event {
            id: id.to_string(),
            title: "Weekly sync".to_string(),
            description: Some("Agenda in doc".to_string()),
            timezone_id: "Asia/Ho_Chi_Minh".to_string(),
            start_time: start,
            end_time: start + ChronoDuration::hours(1),
            all_day: false,
            repeat: Repeat::Weekly,
            repeat_until: None,
            branch_ids: vec!["b-1".to_string()],
            department_ids: vec![],
            assign_ids: vec!["u-2".to_string(), "u-3".to_string()],
            room_ids: vec!["room-a".to_string()],
            category_id: None,
            notify: true,
            alert: Some(DateConfig::minutes_before(15)),
            notify_time: Some(start - ChronoDuration::minutes(15)),
            visibility: Visibility::Restricted,
            created_by_id: "u-1".to_string(),
            accepted_ids: vec![],
            declined_ids: vec![],
            created_at: start,
            updated_at: start,
            deleted_at: None,
        }
    }

    fn tracking_for(event: &Event, month: MonthYear) -> NewTracking {
        NewTracking {
            event_id: event.id.clone(),
            month,
            repeat: event.repeat,
            repeat_until: event.repeat_until,
            range_start: Utc.with_ymd_and_hms(2024, 4, 30, 17, 0, 0).unwrap(),
            range_end: Utc.with_ymd_and_hms(2024, 5, 31, 17, 0, 0).unwrap(),
            spans: vec![Span {
                start: event.start_time,
                end: event.end_time,
            }],
        }
    }

    #[tokio::test]
    async fn test_database_connect() {
        let db = create_test_database().await;
        assert!(!db.pool.is_closed());
    }

    #[tokio::test]
    async fn test_event_round_trip() {
        let db = create_test_database().await;
        let event = sample_event("evt-1");
        db.create_event(&event).await.unwrap();

        let stored = db.get_event("evt-1").await.unwrap().unwrap();
        assert_eq!(stored, event);

        db.delete_series("evt-1").await.unwrap();
        assert!(db.get_event("evt-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persist_generated_month_is_insert_if_absent() {
        let db = create_test_database().await;
        let event = sample_event("evt-1");
        db.create_event(&event).await.unwrap();

        let month = MonthYear::new(2024, 5);
        let first = RecurringInstance::from_event(&event, event.start_time, event.end_time, event.notify_time);
        let commit = db
            .persist_generated_month(tracking_for(&event, month), vec![first.clone()])
            .await
            .unwrap();
        assert_eq!(commit, MonthCommit::Created(vec![first.clone()]));

        let duplicate = RecurringInstance::from_event(&event, event.start_time, event.end_time, event.notify_time);
        let commit = db
            .persist_generated_month(tracking_for(&event, month), vec![duplicate.clone()])
            .await
            .unwrap();
        assert_eq!(commit, MonthCommit::AlreadyGenerated);

        // The losing batch must not have been written
        assert!(db.get_instance(&duplicate.id).await.unwrap().is_none());
        assert!(db.get_instance(&first.id).await.unwrap().is_some());

        let tracking = db.get_tracking("evt-1", month).await.unwrap().unwrap();
        assert_eq!(tracking.spans.len(), 1);
    }

    #[tokio::test]
    async fn test_tracking_range_queries() {
        let db = create_test_database().await;
        let event = sample_event("evt-1");
        db.create_event(&event).await.unwrap();
        db.persist_generated_month(tracking_for(&event, MonthYear::new(2024, 5)), vec![])
            .await
            .unwrap();

        let may_from = Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap();
        let may_to = Utc.with_ymd_and_hms(2024, 5, 20, 0, 0, 0).unwrap();
        assert_eq!(db.list_trackings_in_range(may_from, may_to).await.unwrap().len(), 1);
        assert!(db.list_trackings_outside_range(may_from, may_to).await.unwrap().is_empty());

        let july_from = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        let july_to = Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap();
        assert!(db.list_trackings_in_range(july_from, july_to).await.unwrap().is_empty());
        assert_eq!(db.list_trackings_outside_range(july_from, july_to).await.unwrap().len(), 1);

        // A repeat window that ended before the range hides the event
        db.end_series("evt-1", Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
            .await
            .unwrap();
        assert!(db.list_trackings_outside_range(july_from, july_to).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_instance_window_and_deletes() {
        let db = create_test_database().await;
        let event = sample_event("evt-1");
        db.create_event(&event).await.unwrap();

        let batch: Vec<RecurringInstance> = (0..3)
            .map(|week| {
                let start = event.start_time + ChronoDuration::weeks(week);
                RecurringInstance::from_event(&event, start, start + event.duration(), None)
            })
            .collect();
        db.persist_generated_month(tracking_for(&event, MonthYear::new(2024, 5)), batch.clone())
            .await
            .unwrap();

        let ids = vec!["evt-1".to_string()];
        let from = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(db.list_instances_by_event_ids(&ids, from, to).await.unwrap().len(), 3);

        let narrow_to = batch[1].start_time;
        assert_eq!(db.list_instances_by_event_ids(&ids, from, narrow_to).await.unwrap().len(), 1);

        assert_eq!(db.end_series("evt-1", batch[0].start_time).await.unwrap(), 2);
        assert_eq!(db.list_instances_by_event_ids(&ids, from, to).await.unwrap().len(), 1);

        let event = db.get_event("evt-1").await.unwrap().unwrap();
        assert_eq!(event.repeat_until, Some(batch[0].start_time));
        let tracking = db.get_tracking("evt-1", MonthYear::new(2024, 5)).await.unwrap().unwrap();
        assert_eq!(tracking.repeat_until, Some(batch[0].start_time));

        db.delete_instance(&batch[0].id).await.unwrap();
        assert!(db.list_instances_by_event_ids(&ids, from, to).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_due_events_match_exact_notify_time() {
        let db = create_test_database().await;
        let mut event = sample_event("evt-1");
        event.repeat = Repeat::None;
        db.create_event(&event).await.unwrap();

        let at = event.notify_time.unwrap();
        let due = db
            .list_due_events(at, at, at + ChronoDuration::days(30))
            .await
            .unwrap();
        assert_eq!(due.len(), 1);

        let due = db
            .list_due_events(at + ChronoDuration::minutes(1), at, at + ChronoDuration::days(30))
            .await
            .unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn test_attendance_updates() {
        let db = create_test_database().await;
        let event = sample_event("evt-1");
        db.create_event(&event).await.unwrap();

        db.update_event_attendance("evt-1", &["u-2".to_string()], &["u-3".to_string()])
            .await
            .unwrap();
        let stored = db.get_event("evt-1").await.unwrap().unwrap();
        assert_eq!(stored.accepted_ids, vec!["u-2".to_string()]);
        assert_eq!(stored.declined_ids, vec!["u-3".to_string()]);
    }

    fn weekly_batch(event: &Event, weeks: i64) -> Vec<RecurringInstance> {
        (0..weeks)
            .map(|week| {
                let start = event.start_time + ChronoDuration::weeks(week);
                RecurringInstance::from_event(event, start, start + event.duration(), None)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_concurrent_month_persist_keeps_one_batch() {
        let db = create_test_database().await;
        let event = sample_event("evt-1");
        db.create_event(&event).await.unwrap();

        let month = MonthYear::new(2024, 5);
        let left = weekly_batch(&event, 2);
        let right = weekly_batch(&event, 3);

        let (a, b) = tokio::join!(
            db.persist_generated_month(tracking_for(&event, month), left.clone()),
            db.persist_generated_month(tracking_for(&event, month), right.clone()),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        let winner = match (&a, &b) {
            (MonthCommit::Created(_), MonthCommit::AlreadyGenerated) => &left,
            (MonthCommit::AlreadyGenerated, MonthCommit::Created(_)) => &right,
            other => panic!("expected exactly one winner, got {:?}", other),
        };

        let tracking_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recurring_trackings WHERE event_id = ?")
            .bind("evt-1")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(tracking_rows, 1);

        let ids = vec!["evt-1".to_string()];
        let from = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let stored = db.list_instances_by_event_ids(&ids, from, to).await.unwrap();
        assert_eq!(stored.len(), winner.len());
        assert!(stored.iter().all(|instance| winner.iter().any(|w| w.id == instance.id)));

        let mut starts: Vec<_> = stored.iter().map(|instance| instance.start_time).collect();
        starts.dedup();
        assert_eq!(starts.len(), stored.len());
    }

    #[tokio::test]
    async fn test_concurrent_generation_creates_month_once() {
        use crate::config::EngineConfig;
        use crate::ports::TimezoneDetail;
        use crate::recurring::InstanceGenerator;
        use std::sync::Arc;

        let db = create_test_database().await;
        let event = sample_event("evt-1");
        db.create_event(&event).await.unwrap();

        let generator = InstanceGenerator::new(Arc::new(db.clone()), &EngineConfig::default()).unwrap();
        let zone = TimezoneDetail {
            id: "Asia/Ho_Chi_Minh".to_string(),
            offset_seconds: 7 * 3600,
        };
        let month = MonthYear::new(2024, 5);

        let (a, b) = tokio::join!(
            generator.generate_for_month(&event, &zone, month),
            generator.generate_for_month(&event, &zone, month),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        // Weekly from Sunday 5 May: 5, 12, 19, 26
        assert_eq!(a.len() + b.len(), 4);
        assert!(a.is_empty() || b.is_empty());

        let ids = vec!["evt-1".to_string()];
        let from = Utc.with_ymd_and_hms(2024, 4, 30, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(db.list_instances_by_event_ids(&ids, from, to).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_delete_series_clears_event_instances_and_trackings() {
        let db = create_test_database().await;
        let event = sample_event("evt-1");
        db.create_event(&event).await.unwrap();
        let batch = weekly_batch(&event, 3);
        db.persist_generated_month(tracking_for(&event, MonthYear::new(2024, 5)), batch.clone())
            .await
            .unwrap();

        assert_eq!(db.delete_series("evt-1").await.unwrap(), 3);
        assert!(db.get_event("evt-1").await.unwrap().is_none());
        assert!(db.get_instance(&batch[2].id).await.unwrap().is_none());
        assert!(db.get_tracking("evt-1", MonthYear::new(2024, 5)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_split_series_ends_old_and_inserts_successor() {
        let db = create_test_database().await;
        let event = sample_event("evt-1");
        db.create_event(&event).await.unwrap();
        let batch = weekly_batch(&event, 3);
        db.persist_generated_month(tracking_for(&event, MonthYear::new(2024, 5)), batch.clone())
            .await
            .unwrap();

        let mut successor = sample_event("evt-2");
        successor.start_time = batch[1].start_time;
        successor.end_time = batch[1].end_time;
        let removed = db.split_series("evt-1", batch[0].start_time, &successor).await.unwrap();
        assert_eq!(removed, 2);

        let old = db.get_event("evt-1").await.unwrap().unwrap();
        assert_eq!(old.repeat_until, Some(batch[0].start_time));
        assert!(db.get_instance(&batch[0].id).await.unwrap().is_some());
        assert!(db.get_instance(&batch[1].id).await.unwrap().is_none());
        assert_eq!(db.get_event("evt-2").await.unwrap().unwrap().start_time, batch[1].start_time);

        // A successor that collides with an existing id rolls the cut back
        let mut clash = sample_event("evt-2");
        clash.start_time = batch[2].start_time;
        assert!(db.split_series("evt-1", batch[2].start_time, &clash).await.is_err());
        let old = db.get_event("evt-1").await.unwrap().unwrap();
        assert_eq!(old.repeat_until, Some(batch[0].start_time));
    }

    #[tokio::test]
    async fn test_replace_series_rewrites_event_and_clears_generation() {
        let db = create_test_database().await;
        let event = sample_event("evt-1");
        db.create_event(&event).await.unwrap();
        db.update_event_attendance("evt-1", &["u-2".to_string()], &[]).await.unwrap();
        let batch = weekly_batch(&event, 2);
        db.persist_generated_month(tracking_for(&event, MonthYear::new(2024, 5)), batch.clone())
            .await
            .unwrap();

        let replacement = Event {
            title: "Weekly sync (moved)".to_string(),
            start_time: event.start_time + ChronoDuration::hours(2),
            end_time: event.end_time + ChronoDuration::hours(2),
            repeat: Repeat::Daily,
            ..event.clone()
        };
        assert_eq!(db.replace_series(&replacement).await.unwrap(), 2);

        let stored = db.get_event("evt-1").await.unwrap().unwrap();
        assert_eq!(stored.title, "Weekly sync (moved)");
        assert_eq!(stored.repeat, Repeat::Daily);
        assert_eq!(stored.start_time, replacement.start_time);
        // Attendance is not part of the rewrite
        assert_eq!(stored.accepted_ids, vec!["u-2".to_string()]);
        assert!(db.get_instance(&batch[0].id).await.unwrap().is_none());
        assert!(db.get_tracking("evt-1", MonthYear::new(2024, 5)).await.unwrap().is_none());

        let missing = Event {
            id: "evt-404".to_string(),
            ..replacement
        };
        assert!(matches!(
            db.replace_series(&missing).await,
            Err(AppError::EventNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_instance_rewrites_fields() {
        let db = create_test_database().await;
        let event = sample_event("evt-1");
        db.create_event(&event).await.unwrap();
        let batch = weekly_batch(&event, 1);
        db.persist_generated_month(tracking_for(&event, MonthYear::new(2024, 5)), batch.clone())
            .await
            .unwrap();

        let moved = RecurringInstance {
            title: "One-off location".to_string(),
            start_time: batch[0].start_time + ChronoDuration::minutes(30),
            end_time: batch[0].end_time + ChronoDuration::minutes(30),
            room_ids: vec!["room-b".to_string()],
            ..batch[0].clone()
        };
        db.update_instance(&moved).await.unwrap();

        let stored = db.get_instance(&moved.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "One-off location");
        assert_eq!(stored.start_time, moved.start_time);
        assert_eq!(stored.room_ids, vec!["room-b".to_string()]);

        db.delete_instance(&moved.id).await.unwrap();
        assert!(matches!(
            db.update_instance(&moved).await,
            Err(AppError::InstanceNotFound(_))
        ));
    }
}
