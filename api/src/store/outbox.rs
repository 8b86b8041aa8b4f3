//! Durable pending-notification queue. The ledger and the scheduler
//! enqueue; the chat transport drains oldest-first and marks rows
//! processed after delivery. Delivery is at-least-once: a transport crash
//! between deliver and mark leaves the row pending for the next drain.

use jiff::Timestamp;
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};

use crate::store::sql::Ts;
use crate::store::{NotificationId, NotificationKind, StoreError, UserId};
use crate::time::TimeSource;

#[derive(Debug, Clone, FromRow)]
pub struct OutboxNotification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub message: String,
    pub payload: Option<String>,
    pub processed: bool,
    #[sqlx(try_from = "Ts")]
    pub created_at: Timestamp,
}

impl OutboxNotification {
    pub fn payload_json(&self) -> Option<serde_json::Value> {
        self.payload.as_deref().and_then(|p| serde_json::from_str(p).ok())
    }
}

pub async fn enqueue(
    pool: &SqlitePool,
    time_source: &TimeSource,
    user_id: UserId,
    kind: NotificationKind,
    message: &str,
    payload: Option<serde_json::Value>,
) -> Result<NotificationId, StoreError> {
    let mut tx = pool.begin().await?;
    let id =
        enqueue_tx(&mut tx, time_source, user_id, kind, message, payload)
            .await?;
    tx.commit().await?;
    Ok(id)
}

/// Enqueue within an enclosing transaction so a notification commits or
/// rolls back together with the write that produced it.
pub(crate) async fn enqueue_tx(
    tx: &mut Transaction<'_, Sqlite>,
    time_source: &TimeSource,
    user_id: UserId,
    kind: NotificationKind,
    message: &str,
    payload: Option<serde_json::Value>,
) -> Result<NotificationId, StoreError> {
    Ok(sqlx::query_scalar::<_, NotificationId>(
        "INSERT INTO outbox_notifications
            (user_id, kind, message, payload, created_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id",
    )
    .bind(user_id)
    .bind(kind)
    .bind(message)
    .bind(payload.map(|p| p.to_string()))
    .bind(Ts(time_source.now()))
    .fetch_one(&mut **tx)
    .await?)
}

/// Oldest unprocessed rows, optionally for one principal.
pub async fn list_unprocessed(
    pool: &SqlitePool,
    user_id: Option<UserId>,
) -> Result<Vec<OutboxNotification>, StoreError> {
    let notifications = match user_id {
        Some(user_id) => {
            sqlx::query_as::<_, OutboxNotification>(
                "SELECT * FROM outbox_notifications
                WHERE user_id = $1 AND processed = 0
                ORDER BY created_at, id
                LIMIT 100",
            )
            .bind(user_id)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, OutboxNotification>(
                "SELECT * FROM outbox_notifications
                WHERE processed = 0
                ORDER BY created_at, id
                LIMIT 100",
            )
            .fetch_all(pool)
            .await?
        }
    };
    Ok(notifications)
}

pub async fn mark_processed(
    pool: &SqlitePool,
    id: NotificationId,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE outbox_notifications SET processed = 1 WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
