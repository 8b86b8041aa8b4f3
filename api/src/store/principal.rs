use jiff::Timestamp;
use sqlx::{FromRow, SqlitePool};

use crate::store::sql::Ts;
use crate::store::{Money, StoreError, UserId};
use crate::time::TimeSource;

/// The single authorized end user of an instance.
#[derive(Debug, Clone, FromRow)]
pub struct Principal {
    pub user_id: UserId,
    pub initial_balance: Money,
    pub configured: bool,
    #[sqlx(try_from = "Ts")]
    pub created_at: Timestamp,
}

/// Idempotent: re-creating an existing principal resets it to unconfigured
/// with the given starting balance.
pub async fn create_principal(
    pool: &SqlitePool,
    time_source: &TimeSource,
    user_id: UserId,
    initial_balance: Money,
) -> Result<(), StoreError> {
    if !initial_balance.in_range(true) {
        return Err(StoreError::InvalidAmount);
    }
    sqlx::query(
        "INSERT OR REPLACE INTO principals
            (user_id, initial_balance, configured, created_at)
        VALUES ($1, $2, 0, $3)",
    )
    .bind(user_id)
    .bind(initial_balance)
    .bind(Ts(time_source.now()))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn principal_exists(
    pool: &SqlitePool,
    user_id: UserId,
) -> Result<bool, StoreError> {
    let exists = sqlx::query_scalar::<_, i64>(
        "SELECT EXISTS (SELECT 1 FROM principals WHERE user_id = $1)",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(exists != 0)
}

pub async fn is_configured(
    pool: &SqlitePool,
    user_id: UserId,
) -> Result<bool, StoreError> {
    let configured = sqlx::query_scalar::<_, bool>(
        "SELECT configured FROM principals WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(configured.unwrap_or(false))
}

pub async fn mark_configured(
    pool: &SqlitePool,
    user_id: UserId,
) -> Result<(), StoreError> {
    let result =
        sqlx::query("UPDATE principals SET configured = 1 WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::PrincipalNotFound);
    }
    Ok(())
}

pub async fn update_initial_balance(
    pool: &SqlitePool,
    user_id: UserId,
    amount: Money,
) -> Result<(), StoreError> {
    if !amount.in_range(true) {
        return Err(StoreError::InvalidAmount);
    }
    let result = sqlx::query(
        "UPDATE principals SET initial_balance = $1 WHERE user_id = $2",
    )
    .bind(amount)
    .bind(user_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::PrincipalNotFound);
    }
    Ok(())
}

/// Principals that finished first-time setup; the monthly broadcast targets
/// these.
pub async fn list_configured_principals(
    pool: &SqlitePool,
) -> Result<Vec<UserId>, StoreError> {
    Ok(sqlx::query_scalar::<_, UserId>(
        "SELECT user_id FROM principals WHERE configured = 1",
    )
    .fetch_all(pool)
    .await?)
}
