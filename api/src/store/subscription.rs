//! Recurring charges. A subscription materializes an expense movement on
//! each charge day; the charge date math clamps to the last valid day of
//! the target month (day 31 in February charges on the 28th/29th).

use jiff::{Timestamp, civil, civil::Date};
use sqlx::{FromRow, SqlitePool};

use crate::store::sql::{Day, Ts};
use crate::store::{
    MAX_NAME_LEN, Money, MovementKind, StoreError, SubscriptionId, UserId,
    movement,
};
use crate::time::TimeSource;

#[derive(Debug, Clone, FromRow)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub name: String,
    pub amount: Money,
    pub category: String,
    pub charge_day: i32,
    #[sqlx(try_from = "Day")]
    pub next_charge_date: Date,
    pub active: bool,
    #[sqlx(try_from = "Ts")]
    pub created_at: Timestamp,
}

fn clamped_date(year: i16, month: i8, day: i8) -> Date {
    let first = civil::date(year, month, 1);
    civil::date(year, month, day.min(first.days_in_month()))
}

/// The charge day in the month after `date`, clamped.
pub fn charge_date_month_after(date: Date, charge_day: i8) -> Date {
    if date.month() == 12 {
        clamped_date(date.year() + 1, 1, charge_day)
    } else {
        clamped_date(date.year(), date.month() + 1, charge_day)
    }
}

/// Where a new subscription first charges: this month if the charge day is
/// still ahead, otherwise next month.
pub fn first_charge_date(today: Date, charge_day: i8) -> Date {
    if charge_day <= today.day() {
        charge_date_month_after(today, charge_day)
    } else {
        clamped_date(today.year(), today.month(), charge_day)
    }
}

pub async fn add_subscription(
    pool: &SqlitePool,
    time_source: &TimeSource,
    user_id: UserId,
    name: &str,
    amount: Money,
    category: &str,
    charge_day: i32,
) -> Result<Subscription, StoreError> {
    if !(1..=31).contains(&charge_day) {
        return Err(StoreError::InvalidChargeDay);
    }
    if !amount.in_range(false) {
        return Err(StoreError::InvalidAmount);
    }
    let name = name.trim();
    if name.len() > MAX_NAME_LEN {
        return Err(StoreError::FieldTooLong);
    }

    let next_charge =
        first_charge_date(time_source.today(), charge_day as i8);
    Ok(sqlx::query_as::<_, Subscription>(
        "INSERT INTO subscriptions
            (user_id, name, amount, category, charge_day, next_charge_date,
             created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *",
    )
    .bind(user_id)
    .bind(name)
    .bind(amount)
    .bind(category)
    .bind(charge_day)
    .bind(Day(next_charge))
    .bind(Ts(time_source.now()))
    .fetch_one(pool)
    .await?)
}

pub async fn list_active_subscriptions(
    pool: &SqlitePool,
    user_id: UserId,
) -> Result<Vec<Subscription>, StoreError> {
    Ok(sqlx::query_as::<_, Subscription>(
        "SELECT * FROM subscriptions
        WHERE user_id = $1 AND active = 1
        ORDER BY charge_day
        LIMIT 50",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// Subscriptions across all principals whose charge date has arrived.
pub async fn list_due_subscriptions(
    pool: &SqlitePool,
    time_source: &TimeSource,
) -> Result<Vec<Subscription>, StoreError> {
    Ok(sqlx::query_as::<_, Subscription>(
        "SELECT * FROM subscriptions
        WHERE active = 1 AND next_charge_date <= $1
        LIMIT 100",
    )
    .bind(Day(time_source.today()))
    .fetch_all(pool)
    .await?)
}

/// Charge one subscription: insert the expense movement, advance the charge
/// date one calendar month (clamped), and keep the summary caches coherent,
/// all in one transaction. Returns `None` when the subscription does not
/// exist or is inactive.
pub async fn process_subscription(
    pool: &SqlitePool,
    time_source: &TimeSource,
    id: SubscriptionId,
) -> Result<Option<Subscription>, StoreError> {
    let mut tx = pool.begin().await?;

    let subscription = sqlx::query_as::<_, Subscription>(
        "SELECT * FROM subscriptions WHERE id = $1 AND active = 1",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(mut subscription) = subscription else {
        return Ok(None);
    };

    movement::insert_movement_tx(
        &mut tx,
        time_source,
        subscription.user_id,
        MovementKind::Expense,
        &subscription.category,
        subscription.amount,
        &format!("Subscription: {}", subscription.name),
    )
    .await?;

    let next_charge = charge_date_month_after(
        time_source.today(),
        subscription.charge_day as i8,
    );
    sqlx::query("UPDATE subscriptions SET next_charge_date = $1 WHERE id = $2")
        .bind(Day(next_charge))
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    subscription.next_charge_date = next_charge;
    Ok(Some(subscription))
}

pub async fn deactivate_subscription(
    pool: &SqlitePool,
    id: SubscriptionId,
    user_id: UserId,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE subscriptions SET active = 0
        WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::SubscriptionNotFound);
    }
    Ok(())
}
