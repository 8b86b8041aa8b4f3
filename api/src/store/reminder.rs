use jiff::{Timestamp, civil::Date};
use sqlx::{FromRow, SqlitePool};

use crate::store::sql::{Day, Ts};
use crate::store::{
    MAX_DESCRIPTION_LEN, Money, ReminderId, StoreError, UserId,
};
use crate::time::TimeSource;

/// A one-shot dated notification. Deactivated once dispatched.
#[derive(Debug, Clone, FromRow)]
pub struct Reminder {
    pub id: ReminderId,
    pub user_id: UserId,
    pub description: String,
    pub amount: Option<Money>,
    #[sqlx(try_from = "Day")]
    pub due_date: Date,
    pub active: bool,
    #[sqlx(try_from = "Ts")]
    pub created_at: Timestamp,
}

pub async fn add_reminder(
    pool: &SqlitePool,
    time_source: &TimeSource,
    user_id: UserId,
    description: &str,
    due_date: Date,
    amount: Option<Money>,
) -> Result<Reminder, StoreError> {
    let mut description = description.trim().to_string();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        description =
            description.chars().take(MAX_DESCRIPTION_LEN).collect::<String>()
                + "...";
    }
    if let Some(amount) = amount {
        if !amount.in_range(false) {
            return Err(StoreError::InvalidAmount);
        }
    }
    Ok(sqlx::query_as::<_, Reminder>(
        "INSERT INTO reminders
            (user_id, description, amount, due_date, created_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *",
    )
    .bind(user_id)
    .bind(description)
    .bind(amount)
    .bind(Day(due_date))
    .bind(Ts(time_source.now()))
    .fetch_one(pool)
    .await?)
}

pub async fn list_active_reminders(
    pool: &SqlitePool,
    user_id: UserId,
) -> Result<Vec<Reminder>, StoreError> {
    Ok(sqlx::query_as::<_, Reminder>(
        "SELECT * FROM reminders
        WHERE user_id = $1 AND active = 1
        ORDER BY due_date
        LIMIT 50",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// Reminders across all principals that are due for dispatch.
pub async fn list_due_reminders(
    pool: &SqlitePool,
    time_source: &TimeSource,
) -> Result<Vec<Reminder>, StoreError> {
    Ok(sqlx::query_as::<_, Reminder>(
        "SELECT * FROM reminders
        WHERE active = 1 AND due_date <= $1
        ORDER BY due_date
        LIMIT 50",
    )
    .bind(Day(time_source.today()))
    .fetch_all(pool)
    .await?)
}

pub async fn mark_reminder_dispatched(
    pool: &SqlitePool,
    id: ReminderId,
) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE reminders SET active = 0 WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::ReminderNotFound);
    }
    Ok(())
}
