//! Top-level orchestration of wall-clock triggers.
//!
//! A single background worker wakes once per minute and runs whichever
//! tasks have come due, sequentially, so scheduled work never overlaps
//! with itself and contends with inbound chat events only at the storage
//! layer. Tasks are plain records of `{name, cadence, next_due}`; a task
//! body that fails is logged and the loop moves on, so one bad tick never
//! kills the worker.
//!
//! ```text
//! process-due-subscriptions   hourly
//! dispatch-due-reminders      hourly
//! monthly-summary-broadcast   daily 08:00 (acts on day 1 only)
//! retention-vacuum            weekly Sunday 03:00
//! backup-snapshot             daily 02:00 (when enabled)
//! state-gc                    every 2 hours
//! memory-hint                 every 4 hours
//! ```

use std::sync::Arc;
use std::time::Duration;

use jiff::civil::{Time, Weekday, time};
use jiff::{SignedDuration, Span, Timestamp, Zoned};
use sqlx::SqlitePool;
use tokio::sync::watch;
use tokio::time as tokio_time;

use crate::dialog::format;
use crate::dialog::state::{STATE_TTL, StateStore};
use crate::store::{
    NotificationKind, UserId, export, movement, outbox, principal, reminder,
    subscription,
};
use crate::time::TimeSource;

pub const TICK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// The allowlisted principal, target of the backup snapshot.
    pub principal: UserId,
    pub backup_enabled: bool,
    pub retention_days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskName {
    ProcessDueSubscriptions,
    DispatchDueReminders,
    MonthlySummaryBroadcast,
    RetentionVacuum,
    BackupSnapshot,
    StateGc,
    MemoryHint,
}

#[derive(Debug, Clone, Copy)]
enum Cadence {
    Every(Duration),
    DailyAt(Time),
    WeeklyAt(Weekday, Time),
}

impl Cadence {
    fn next_after(&self, now: &Zoned) -> Timestamp {
        match self {
            Cadence::Every(period) => {
                now.timestamp()
                    + SignedDuration::from_secs(period.as_secs() as i64)
            }
            Cadence::DailyAt(at) => next_wall_time(now, None, *at),
            Cadence::WeeklyAt(weekday, at) => {
                next_wall_time(now, Some(*weekday), *at)
            }
        }
    }
}

/// The next instant strictly after `now` that lands on the given wall time
/// (and weekday, if any) in `now`'s timezone. Walks forward day by day so
/// DST gaps resolve to whatever the zone says that wall time means.
fn next_wall_time(
    now: &Zoned,
    weekday: Option<Weekday>,
    at: Time,
) -> Timestamp {
    let tz = now.time_zone();
    let mut date = now.date();
    for _ in 0..8 {
        if weekday.is_none_or(|w| date.weekday() == w) {
            if let Ok(candidate) = date.to_datetime(at).to_zoned(tz.clone()) {
                if &candidate > now {
                    return candidate.timestamp();
                }
            }
        }
        date = match date.tomorrow() {
            Ok(next) => next,
            Err(_) => break,
        };
    }
    now.timestamp() + SignedDuration::from_hours(24)
}

struct Task {
    name: TaskName,
    cadence: Cadence,
    next_due: Timestamp,
}

pub struct Scheduler {
    pool: SqlitePool,
    time_source: TimeSource,
    states: Arc<StateStore>,
    config: SchedulerConfig,
    tick_interval: Duration,
    tasks: Vec<Task>,
}

impl Scheduler {
    pub fn new(
        pool: SqlitePool,
        time_source: TimeSource,
        states: Arc<StateStore>,
        config: SchedulerConfig,
    ) -> Self {
        let now = time_source.zoned_now();
        let table = [
            (TaskName::ProcessDueSubscriptions,
                Cadence::Every(Duration::from_secs(3600))),
            (TaskName::DispatchDueReminders,
                Cadence::Every(Duration::from_secs(3600))),
            (TaskName::MonthlySummaryBroadcast,
                Cadence::DailyAt(time(8, 0, 0, 0))),
            (TaskName::RetentionVacuum,
                Cadence::WeeklyAt(Weekday::Sunday, time(3, 0, 0, 0))),
            (TaskName::BackupSnapshot, Cadence::DailyAt(time(2, 0, 0, 0))),
            (TaskName::StateGc,
                Cadence::Every(Duration::from_secs(2 * 3600))),
            (TaskName::MemoryHint,
                Cadence::Every(Duration::from_secs(4 * 3600))),
        ];
        let tasks = table
            .into_iter()
            .map(|(name, cadence)| Task {
                name,
                cadence,
                next_due: cadence.next_after(&now),
            })
            .collect();
        Self {
            pool,
            time_source,
            states,
            config,
            tick_interval: TICK_INTERVAL,
            tasks,
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Spawn the worker loop. Consuming the scheduler makes a second start
    /// impossible; the returned handle stops it.
    pub fn start(mut self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut interval = tokio_time::interval(self.tick_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => self.run_pending().await,
                    _ = shutdown_rx.changed() => break,
                }
            }
            tracing::info!("scheduler stopped");
        });
        SchedulerHandle { shutdown: shutdown_tx, handle }
    }

    /// Run every task whose due time has passed. Public so tests can drive
    /// the scheduler against a mocked clock without the worker loop.
    pub async fn run_pending(&mut self) {
        let now = self.time_source.now();
        for i in 0..self.tasks.len() {
            if self.tasks[i].next_due > now {
                continue;
            }
            let name = self.tasks[i].name;
            if let Err(e) = self.run_task(name).await {
                tracing::error!(task = ?name, "scheduled task failed: {e:#}");
            }
            let next =
                self.tasks[i].cadence.next_after(&self.time_source.zoned_now());
            self.tasks[i].next_due = next;
        }
    }

    pub async fn run_task(&self, name: TaskName) -> anyhow::Result<()> {
        match name {
            TaskName::ProcessDueSubscriptions => {
                self.process_due_subscriptions().await
            }
            TaskName::DispatchDueReminders => {
                self.dispatch_due_reminders().await
            }
            TaskName::MonthlySummaryBroadcast => {
                self.monthly_summary_broadcast().await
            }
            TaskName::RetentionVacuum => self.retention_vacuum().await,
            TaskName::BackupSnapshot => self.backup_snapshot().await,
            TaskName::StateGc => {
                let removed = self
                    .states
                    .sweep_expired(STATE_TTL, self.time_source.now());
                if removed > 0 {
                    tracing::debug!(removed, "expired conversation states");
                }
                Ok(())
            }
            TaskName::MemoryHint => {
                // best-effort compaction hint; nothing to do beyond giving
                // the allocator a chance at an idle moment
                tracing::debug!("memory hint tick");
                Ok(())
            }
        }
    }

    /// Charge every subscription whose date has arrived and notify the
    /// owner. One failing row is logged and skipped.
    async fn process_due_subscriptions(&self) -> anyhow::Result<()> {
        let due =
            subscription::list_due_subscriptions(&self.pool, &self.time_source)
                .await?;
        if due.is_empty() {
            return Ok(());
        }
        tracing::info!(count = due.len(), "processing due subscriptions");
        for row in due {
            match subscription::process_subscription(
                &self.pool,
                &self.time_source,
                row.id,
            )
            .await
            {
                Ok(Some(charged)) => {
                    outbox::enqueue(
                        &self.pool,
                        &self.time_source,
                        charged.user_id,
                        NotificationKind::SubscriptionCharged,
                        &format::subscription_charged(&charged),
                        Some(serde_json::json!({
                            "name": charged.name,
                            "amount": charged.amount.to_decimal(),
                            "category": charged.category,
                        })),
                    )
                    .await?;
                }
                Ok(None) => {
                    tracing::warn!(id = %row.id, "due subscription vanished");
                }
                Err(e) => {
                    tracing::error!(
                        id = %row.id,
                        "failed to process subscription: {e:#}"
                    );
                }
            }
        }
        Ok(())
    }

    /// Queue a notification for each due reminder and retire it.
    async fn dispatch_due_reminders(&self) -> anyhow::Result<()> {
        let due =
            reminder::list_due_reminders(&self.pool, &self.time_source)
                .await?;
        for row in &due {
            outbox::enqueue(
                &self.pool,
                &self.time_source,
                row.user_id,
                NotificationKind::ReminderDue,
                &format::reminder_due(row),
                Some(serde_json::json!({
                    "description": row.description,
                    "due_date": row.due_date.to_string(),
                })),
            )
            .await?;
            reminder::mark_reminder_dispatched(&self.pool, row.id).await?;
        }
        Ok(())
    }

    /// On the first of the month, send every configured principal the
    /// closed month's summary.
    async fn monthly_summary_broadcast(&self) -> anyhow::Result<()> {
        let today = self.time_source.today();
        if today.day() != 1 {
            return Ok(());
        }
        let previous = today.first_of_month().yesterday()?;
        for user_id in
            principal::list_configured_principals(&self.pool).await?
        {
            let summary = movement::month_summary(
                &self.pool,
                &self.time_source,
                user_id,
                Some(previous.month() as i32),
                Some(previous.year() as i32),
            )
            .await?;
            outbox::enqueue(
                &self.pool,
                &self.time_source,
                user_id,
                NotificationKind::MonthlySummary,
                &format::monthly_broadcast(&summary),
                Some(serde_json::json!({
                    "month": summary.month,
                    "year": summary.year,
                })),
            )
            .await?;
        }
        Ok(())
    }

    /// Weekly cleanup: dispatched reminders, processed notifications and
    /// stale cached summaries past the retention window go away, then the
    /// file is compacted.
    async fn retention_vacuum(&self) -> anyhow::Result<()> {
        let window = Span::new()
            .days(i64::from(self.config.retention_days) * 7);
        let cutoff_date = self.time_source.today().checked_sub(window)?;
        let cutoff_ts = crate::store::sql::Ts(
            self.time_source
                .zoned_now()
                .checked_sub(window)?
                .timestamp(),
        );
        let cutoff_day = crate::store::sql::Day(cutoff_date);

        let reminders = sqlx::query(
            "DELETE FROM reminders WHERE active = 0 AND due_date < $1",
        )
        .bind(cutoff_day)
        .execute(&self.pool)
        .await?
        .rows_affected();
        let notifications = sqlx::query(
            "DELETE FROM outbox_notifications
            WHERE processed = 1 AND created_at < $1",
        )
        .bind(cutoff_ts)
        .execute(&self.pool)
        .await?
        .rows_affected();
        let summaries = sqlx::query(
            "DELETE FROM monthly_summaries WHERE refreshed_at < $1",
        )
        .bind(cutoff_ts)
        .execute(&self.pool)
        .await?
        .rows_affected();
        let daily = sqlx::query(
            "DELETE FROM daily_summaries WHERE date < $1",
        )
        .bind(cutoff_day)
        .execute(&self.pool)
        .await?
        .rows_affected();

        sqlx::query("VACUUM").execute(&self.pool).await?;
        tracing::info!(
            reminders,
            notifications,
            summaries,
            daily,
            "retention sweep done"
        );
        Ok(())
    }

    /// Nightly CSV snapshot for the allowlisted principal, delivered
    /// through the outbox as a backup-ready notification.
    async fn backup_snapshot(&self) -> anyhow::Result<()> {
        if !self.config.backup_enabled {
            return Ok(());
        }
        let user_id = self.config.principal;
        let snapshot =
            export::export_movements(&self.pool, user_id).await?;
        if snapshot.rows == 0 {
            outbox::enqueue(
                &self.pool,
                &self.time_source,
                user_id,
                NotificationKind::BackupReady,
                &format::nothing_to_back_up(),
                None,
            )
            .await?;
            return Ok(());
        }
        let stamp = self.time_source.zoned_now().strftime("%Y%m%d_%H%M");
        outbox::enqueue(
            &self.pool,
            &self.time_source,
            user_id,
            NotificationKind::BackupReady,
            &format!("📄 Backup automático - {} registros", snapshot.rows),
            Some(serde_json::json!({
                "filename": format!("backup_finanzas_{stamp}.csv"),
                "rows": snapshot.rows,
                "csv": String::from_utf8(snapshot.data)?,
            })),
        )
        .await?;
        Ok(())
    }
}

pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal shutdown and join the worker within `timeout`; a worker
    /// stuck in a task is detached by aborting it.
    pub async fn stop(mut self, timeout: Duration) {
        let _ = self.shutdown.send(true);
        if tokio_time::timeout(timeout, &mut self.handle).await.is_err() {
            tracing::warn!("scheduler did not stop in time; aborting");
            self.handle.abort();
        }
    }
}
