//! Periodic reminder sweep.
//!
//! Every tick finds what is due at the current minute (one-off events and
//! materialized instances), resolves who should hear about it and hands one
//! push notification per item to the messaging producer.

use crate::calendar::common::{offset_from_seconds, truncate_to_minute};
use crate::config::EngineConfig;
use crate::error::{AppError, AppResult};
use crate::models::{PushNotification, Reminder};
use crate::ports::{MessagingProducer, Storage, UserDirectory, UserFilter};
use crate::recurring::RangeExpander;
use crate::utils::logging::log_sweep_summary;
use crate::utils::remove_duplicates;
use chrono::{DateTime, FixedOffset, Months, Utc};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub due: usize,
    pub published: usize,
    pub failed: usize,
}

pub struct NotificationSweep {
    store: Arc<dyn Storage>,
    expander: Arc<RangeExpander>,
    directory: Arc<dyn UserDirectory>,
    producer: Arc<dyn MessagingProducer>,
    system_offset: FixedOffset,
    window_months: u32,
    shutdown: CancellationToken,
}

impl NotificationSweep {
    pub fn new(
        store: Arc<dyn Storage>,
        expander: Arc<RangeExpander>,
        directory: Arc<dyn UserDirectory>,
        producer: Arc<dyn MessagingProducer>,
        config: &EngineConfig,
        shutdown: CancellationToken,
    ) -> AppResult<Self> {
        Ok(Self {
            store,
            expander,
            directory,
            producer,
            system_offset: offset_from_seconds(config.system_offset_seconds)?,
            window_months: config.sweep_window_months.max(1),
            shutdown,
        })
    }

    pub async fn check_notify_event(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let rounded = truncate_to_minute(&now, &self.system_offset).with_timezone(&Utc);
        let window_end = rounded
            .checked_add_months(Months::new(self.window_months))
            .ok_or_else(|| AppError::operation_failed(format!("Sweep window overflows at {}", rounded)))?;

        let (events, instances) = tokio::try_join!(
            self.store.list_due_events(rounded, rounded, window_end),
            self.expander.instances_in_range(rounded, window_end),
        )?;

        let mut due: Vec<Reminder> = events.iter().map(Reminder::from).collect();
        due.extend(
            instances
                .iter()
                .filter(|instance| instance.notify && instance.notify_time == Some(rounded))
                .map(Reminder::from),
        );

        if due.is_empty() {
            debug!("Nothing due at {}", rounded);
            return Ok(SweepReport::default());
        }

        info!("{} reminder(s) due at {}", due.len(), rounded);
        let started = Instant::now();
        let report = dispatch(
            due,
            Arc::clone(&self.directory),
            Arc::clone(&self.producer),
            self.shutdown.clone(),
            now,
        )
        .await;
        log_sweep_summary(report.due, report.published, report.failed, started.elapsed().as_millis() as u64);

        Ok(report)
    }
}

/// Runs the sweep every `interval` until `shutdown` fires.
pub async fn run_sweep_loop(sweep: Arc<NotificationSweep>, interval: Duration, shutdown: CancellationToken) {
    info!("Starting notification sweep loop");

    loop {
        if shutdown.is_cancelled() {
            info!("Shutdown signal received, stopping sweep loop");
            break;
        }

        match sweep.check_notify_event(Utc::now()).await {
            Ok(report) => debug!("Sweep cycle completed: {:?}", report),
            Err(e) => error!("Error in sweep cycle: {}", e),
        }

        tokio::select! {
            _ = sleep(interval) => {}
            _ = shutdown.cancelled() => {
                info!("Shutdown signal received during sleep, stopping sweep loop");
                break;
            }
        }
    }

    info!("Notification sweep loop stopped gracefully");
}

/// Creator and assignees always; department members when departments are
/// set; branch members only when neither departments nor assignees are.
/// Declined users are removed.
pub async fn resolve_audience(directory: &dyn UserDirectory, reminder: &Reminder) -> AppResult<Vec<String>> {
    let mut users = direct_recipients(reminder);

    if !reminder.department_ids.is_empty() {
        let members = directory
            .list_user_ids(UserFilter::departments(reminder.department_ids.clone()))
            .await?;
        users.extend(members);
    } else if reminder.assign_ids.is_empty() && !reminder.branch_ids.is_empty() {
        let members = directory
            .list_user_ids(UserFilter::branches(reminder.branch_ids.clone()))
            .await?;
        users.extend(members);
    }

    Ok(without_declined(reminder, users))
}

/// The part of the audience known without asking the directory.
pub fn known_audience(reminder: &Reminder) -> Vec<String> {
    without_declined(reminder, direct_recipients(reminder))
}

fn direct_recipients(reminder: &Reminder) -> Vec<String> {
    let mut users = Vec::with_capacity(1 + reminder.assign_ids.len());
    users.push(reminder.created_by_id.clone());
    users.extend(reminder.assign_ids.iter().cloned());
    users
}

fn without_declined(reminder: &Reminder, mut users: Vec<String>) -> Vec<String> {
    let declined: HashSet<&String> = reminder.declined_ids.iter().collect();
    users.retain(|user| !declined.contains(user));
    remove_duplicates(users)
}

/// Audience workers report to one aggregator over a channel; the aggregator
/// fans publishes out and tallies the results. A directory failure narrows
/// the audience to the known recipients instead of dropping the reminder.
async fn dispatch(
    due: Vec<Reminder>,
    directory: Arc<dyn UserDirectory>,
    producer: Arc<dyn MessagingProducer>,
    shutdown: CancellationToken,
    now: DateTime<Utc>,
) -> SweepReport {
    let mut report = SweepReport {
        due: due.len(),
        ..SweepReport::default()
    };

    let (tx, mut rx) = mpsc::channel::<(Reminder, AppResult<Vec<String>>)>(due.len().max(1));
    let mut audiences = JoinSet::new();
    for reminder in due {
        let tx = tx.clone();
        let directory = Arc::clone(&directory);
        let shutdown = shutdown.clone();
        audiences.spawn(async move {
            let audience = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("Sweep cancelled before audience of {} was resolved", reminder.id);
                    return;
                }
                audience = resolve_audience(directory.as_ref(), &reminder) => audience,
            };
            if tx.send((reminder, audience)).await.is_err() {
                warn!("Sweep aggregator closed before audience was delivered");
            }
        });
    }
    drop(tx);

    let mut publishes = JoinSet::new();
    while let Some((reminder, audience)) = rx.recv().await {
        let recipients = match audience {
            Ok(recipients) => recipients,
            Err(e) => {
                error!(
                    "Failed to resolve directory audience for {}: {}; notifying known recipients only",
                    reminder.id, e
                );
                known_audience(&reminder)
            }
        };
        if recipients.is_empty() {
            debug!("No recipients left for {}", reminder.id);
            continue;
        }

        let message = PushNotification::for_reminder(&reminder, recipients, now);
        let producer = Arc::clone(&producer);
        let shutdown = shutdown.clone();
        publishes.spawn(async move {
            let id = message.instance_id.clone();
            let result = tokio::select! {
                biased;
                _ = shutdown.cancelled() => Err(AppError::publish("sweep cancelled")),
                result = producer.publish_push_notification(message) => result,
            };
            (id, result)
        });
    }

    while let Some(joined) = audiences.join_next().await {
        if let Err(e) = joined {
            error!("Audience worker panicked: {}", e);
        }
    }

    while let Some(joined) = publishes.join_next().await {
        match joined {
            Ok((_, Ok(()))) => report.published += 1,
            Ok((id, Err(e))) => {
                error!("Failed to publish reminder for {}: {}", id, e);
                report.failed += 1;
            }
            Err(e) => {
                error!("Publish worker panicked: {}", e);
                report.failed += 1;
            }
        }
    }

    report
}
