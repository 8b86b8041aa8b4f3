use jiff::Timestamp;
use sqlx::{FromRow, SqlitePool};

use crate::store::sql::Ts;
use crate::store::{AlertId, AlertScope, Money, StoreError, UserId};
use crate::time::TimeSource;

/// A spending-limit rule, evaluated on every expense write. One row per
/// `(user, scope)`.
#[derive(Debug, Clone, FromRow)]
pub struct Alert {
    pub id: AlertId,
    pub user_id: UserId,
    pub scope: AlertScope,
    pub threshold: Money,
    pub active: bool,
    #[sqlx(try_from = "Ts")]
    pub created_at: Timestamp,
}

/// Replaces any existing alert for the `(user, scope)` pair.
pub async fn upsert_alert(
    pool: &SqlitePool,
    time_source: &TimeSource,
    user_id: UserId,
    scope: AlertScope,
    threshold: Money,
) -> Result<Alert, StoreError> {
    if !threshold.in_range(false) {
        return Err(StoreError::InvalidAmount);
    }
    Ok(sqlx::query_as::<_, Alert>(
        "INSERT OR REPLACE INTO alerts
            (user_id, scope, threshold, active, created_at)
        VALUES ($1, $2, $3, 1, $4)
        RETURNING *",
    )
    .bind(user_id)
    .bind(scope)
    .bind(threshold)
    .bind(Ts(time_source.now()))
    .fetch_one(pool)
    .await?)
}

pub async fn list_active_alerts(
    pool: &SqlitePool,
    user_id: UserId,
) -> Result<Vec<Alert>, StoreError> {
    Ok(sqlx::query_as::<_, Alert>(
        "SELECT * FROM alerts
        WHERE user_id = $1 AND active = 1
        ORDER BY scope",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub async fn deactivate_alert(
    pool: &SqlitePool,
    id: AlertId,
    user_id: UserId,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE alerts SET active = 0 WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::AlertNotFound);
    }
    Ok(())
}
