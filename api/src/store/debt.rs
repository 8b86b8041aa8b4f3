use jiff::Timestamp;
use sqlx::{FromRow, SqlitePool};

use crate::store::sql::Ts;
use crate::store::{
    DebtDirection, DebtId, MAX_NAME_LEN, Money, StoreError, UserId,
};
use crate::time::TimeSource;

/// A record of money owed in either direction. Debts never touch the
/// ledger balance.
#[derive(Debug, Clone, FromRow)]
pub struct Debt {
    pub id: DebtId,
    pub user_id: UserId,
    pub counterparty: String,
    pub amount: Money,
    pub direction: DebtDirection,
    pub description: String,
    pub active: bool,
    #[sqlx(try_from = "Ts")]
    pub created_at: Timestamp,
}

impl Debt {
    /// The stored magnitude with the direction's sign reapplied, for
    /// presentation: positive when owed to the principal.
    pub fn signed_amount(&self) -> Money {
        match self.direction {
            DebtDirection::OwedToPrincipal => self.amount,
            DebtDirection::OwedByPrincipal => -self.amount,
        }
    }
}

pub async fn add_debt(
    pool: &SqlitePool,
    time_source: &TimeSource,
    user_id: UserId,
    counterparty: &str,
    amount: Money,
    direction: DebtDirection,
    description: &str,
) -> Result<Debt, StoreError> {
    let counterparty = counterparty.trim();
    if counterparty.len() > MAX_NAME_LEN {
        return Err(StoreError::FieldTooLong);
    }
    // sign is carried by the direction, the row keeps a magnitude
    let magnitude = Money(amount.0.abs());
    if !magnitude.in_range(false) {
        return Err(StoreError::InvalidAmount);
    }
    Ok(sqlx::query_as::<_, Debt>(
        "INSERT INTO debts
            (user_id, counterparty, amount, direction, description,
             created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *",
    )
    .bind(user_id)
    .bind(counterparty)
    .bind(magnitude)
    .bind(direction)
    .bind(description.trim())
    .bind(Ts(time_source.now()))
    .fetch_one(pool)
    .await?)
}

pub async fn list_active_debts(
    pool: &SqlitePool,
    user_id: UserId,
) -> Result<Vec<Debt>, StoreError> {
    Ok(sqlx::query_as::<_, Debt>(
        "SELECT * FROM debts
        WHERE user_id = $1 AND active = 1
        ORDER BY created_at DESC
        LIMIT 50",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub async fn mark_debt_settled(
    pool: &SqlitePool,
    id: DebtId,
    user_id: UserId,
) -> Result<(), StoreError> {
    let result =
        sqlx::query("UPDATE debts SET active = 0 WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::DebtNotFound);
    }
    Ok(())
}
