//! Movement writes and the derived views over them.
//!
//! Every write here runs in one transaction that also maintains the derived
//! summary caches and, for expenses, evaluates the spending alerts, so the
//! ledger and its caches can never be observed out of step.

use jiff::{Timestamp, civil::Date};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};

use crate::store::sql::{Day, Ts};
use crate::store::{
    AlertScope, MAX_DESCRIPTION_LEN, Money, MovementId, MovementKind,
    NotificationKind, StoreError, UserId, outbox,
};
use crate::time::TimeSource;

#[derive(Debug, Clone, FromRow)]
pub struct Movement {
    pub id: MovementId,
    pub user_id: UserId,
    #[sqlx(try_from = "Day")]
    pub date: Date,
    pub kind: MovementKind,
    pub category: String,
    pub amount: Money,
    pub description: String,
    pub month: i32,
    pub year: i32,
    #[sqlx(try_from = "Ts")]
    pub created_at: Timestamp,
}

/// Today's per-kind totals plus the full running balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyBalance {
    pub date: Date,
    pub income: Money,
    pub expense: Money,
    pub saving: Money,
    pub balance: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthSummary {
    pub month: i32,
    pub year: i32,
    pub income: Money,
    pub expense: Money,
    pub saving: Money,
    /// The acting running balance, always computed live.
    pub balance: Money,
}

impl MonthSummary {
    /// Income minus expenses minus savings for the month.
    pub fn net(&self) -> Money {
        self.income - self.expense - self.saving
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct KindTotals {
    income: Money,
    expense: Money,
    saving: Money,
}

impl KindTotals {
    fn from_rows(rows: Vec<(MovementKind, Money)>) -> Self {
        let mut totals = KindTotals::default();
        for (kind, total) in rows {
            match kind {
                MovementKind::Income => totals.income = total,
                MovementKind::Expense => totals.expense = total,
                MovementKind::Saving => totals.saving = total,
            }
        }
        totals
    }
}

/// The monthly cache row for the current month goes stale after an hour;
/// closed months never change underneath it.
const MONTH_CACHE_MAX_AGE_SECS: i64 = 3600;

fn truncate_description(description: &str) -> String {
    let description = description.trim();
    if description.chars().count() <= MAX_DESCRIPTION_LEN {
        return description.to_string();
    }
    let mut truncated: String =
        description.chars().take(MAX_DESCRIPTION_LEN).collect();
    truncated.push_str("...");
    truncated
}

/// Insert a movement dated today. The same transaction invalidates the
/// affected monthly summary, refreshes today's daily summary and, when the
/// movement is an expense, evaluates the spending alerts.
pub async fn add_movement(
    pool: &SqlitePool,
    time_source: &TimeSource,
    user_id: UserId,
    kind: MovementKind,
    category: &str,
    amount: Money,
    description: &str,
) -> Result<Movement, StoreError> {
    if !amount.in_range(false) {
        return Err(StoreError::InvalidAmount);
    }
    let mut tx = pool.begin().await?;
    let movement = insert_movement_tx(
        &mut tx,
        time_source,
        user_id,
        kind,
        category,
        amount,
        description,
    )
    .await?;
    if kind == MovementKind::Expense {
        evaluate_expense_alerts_tx(&mut tx, time_source, user_id).await?;
    }
    tx.commit().await?;
    Ok(movement)
}

/// Shared insert path for conversational writes and subscription charges.
/// Keeps the derived caches coherent but leaves alert evaluation to the
/// caller.
pub(crate) async fn insert_movement_tx(
    tx: &mut Transaction<'_, Sqlite>,
    time_source: &TimeSource,
    user_id: UserId,
    kind: MovementKind,
    category: &str,
    amount: Money,
    description: &str,
) -> Result<Movement, StoreError> {
    let today = time_source.today();
    let movement = sqlx::query_as::<_, Movement>(
        "INSERT INTO movements
            (user_id, date, kind, category, amount, description,
             month, year, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *",
    )
    .bind(user_id)
    .bind(Day(today))
    .bind(kind)
    .bind(category)
    .bind(amount)
    .bind(truncate_description(description))
    .bind(today.month() as i32)
    .bind(today.year() as i32)
    .bind(Ts(time_source.now()))
    .fetch_one(&mut **tx)
    .await?;

    invalidate_monthly_summary_tx(
        tx,
        user_id,
        today.month() as i32,
        today.year() as i32,
    )
    .await?;
    refresh_daily_summary_tx(tx, time_source, user_id, today).await?;

    Ok(movement)
}

/// Movements for one month, newest first. Defaults to the current month.
pub async fn list_movements(
    pool: &SqlitePool,
    time_source: &TimeSource,
    user_id: UserId,
    month: Option<i32>,
    year: Option<i32>,
    kind: Option<MovementKind>,
) -> Result<Vec<Movement>, StoreError> {
    let today = time_source.today();
    let month = month.unwrap_or(today.month() as i32);
    let year = year.unwrap_or(today.year() as i32);
    let movements = match kind {
        Some(kind) => {
            sqlx::query_as::<_, Movement>(
                "SELECT * FROM movements
                WHERE user_id = $1 AND month = $2 AND year = $3 AND kind = $4
                ORDER BY date DESC, id DESC
                LIMIT 100",
            )
            .bind(user_id)
            .bind(month)
            .bind(year)
            .bind(kind)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Movement>(
                "SELECT * FROM movements
                WHERE user_id = $1 AND month = $2 AND year = $3
                ORDER BY date DESC, id DESC
                LIMIT 100",
            )
            .bind(user_id)
            .bind(month)
            .bind(year)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(movements)
}

/// Destructive delete. Drops the monthly summary for the movement's period
/// and the daily summary for its date in the same transaction.
pub async fn delete_movement(
    pool: &SqlitePool,
    movement_id: MovementId,
    user_id: UserId,
) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, (i32, i32, String)>(
        "SELECT month, year, date FROM movements
        WHERE id = $1 AND user_id = $2",
    )
    .bind(movement_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;
    let Some((month, year, date)) = row else {
        return Err(StoreError::MovementNotFound);
    };

    sqlx::query("DELETE FROM movements WHERE id = $1 AND user_id = $2")
        .bind(movement_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    invalidate_monthly_summary_tx(&mut tx, user_id, month, year).await?;
    sqlx::query("DELETE FROM daily_summaries WHERE user_id = $1 AND date = $2")
        .bind(user_id)
        .bind(&date)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// `initial_balance + Σ(income) − Σ(expense) − Σ(saving)`, in one query.
pub async fn current_balance(
    pool: &SqlitePool,
    user_id: UserId,
) -> Result<Money, StoreError> {
    let balance = sqlx::query_scalar::<_, Money>(
        "SELECT p.initial_balance + COALESCE((
            SELECT SUM(CASE WHEN m.kind = 'income'
                THEN m.amount ELSE -m.amount END)
            FROM movements m WHERE m.user_id = p.user_id
        ), 0)
        FROM principals p WHERE p.user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    balance.ok_or(StoreError::PrincipalNotFound)
}

/// Read-through over the daily summary cache: a missing row is
/// materialized from the movements inside the same transaction.
pub async fn daily_balance(
    pool: &SqlitePool,
    time_source: &TimeSource,
    user_id: UserId,
    date: Option<Date>,
) -> Result<DailyBalance, StoreError> {
    let date = date.unwrap_or_else(|| time_source.today());
    let mut tx = pool.begin().await?;

    let cached = sqlx::query_as::<_, (Money, Money, Money)>(
        "SELECT income, expense, saving FROM daily_summaries
        WHERE user_id = $1 AND date = $2",
    )
    .bind(user_id)
    .bind(Day(date))
    .fetch_optional(&mut *tx)
    .await?;
    let totals = match cached {
        Some((income, expense, saving)) => {
            KindTotals { income, expense, saving }
        }
        None => {
            refresh_daily_summary_tx(&mut tx, time_source, user_id, date)
                .await?
        }
    };

    let balance = balance_tx(&mut tx, user_id).await?;
    tx.commit().await?;

    Ok(DailyBalance {
        date,
        income: totals.income,
        expense: totals.expense,
        saving: totals.saving,
        balance,
    })
}

/// Per-kind totals for a month plus the acting balance. The cached totals
/// are reused while fresh; otherwise they are recomputed and the cache row
/// rewritten.
pub async fn month_summary(
    pool: &SqlitePool,
    time_source: &TimeSource,
    user_id: UserId,
    month: Option<i32>,
    year: Option<i32>,
) -> Result<MonthSummary, StoreError> {
    let today = time_source.today();
    let month = month.unwrap_or(today.month() as i32);
    let year = year.unwrap_or(today.year() as i32);
    let mut tx = pool.begin().await?;

    let cached = sqlx::query_as::<_, (Money, Money, Money, Ts)>(
        "SELECT income, expense, saving, refreshed_at
        FROM monthly_summaries
        WHERE user_id = $1 AND month = $2 AND year = $3",
    )
    .bind(user_id)
    .bind(month)
    .bind(year)
    .fetch_optional(&mut *tx)
    .await?;

    let is_closed_month = (year, month)
        < (today.year() as i32, today.month() as i32);
    let totals = match cached {
        Some((income, expense, saving, refreshed_at))
            if is_closed_month
                || time_source.now().duration_since(refreshed_at.0).as_secs()
                    < MONTH_CACHE_MAX_AGE_SECS =>
        {
            KindTotals { income, expense, saving }
        }
        _ => {
            let totals =
                month_totals_tx(&mut tx, user_id, month, year).await?;
            sqlx::query(
                "INSERT OR REPLACE INTO monthly_summaries
                    (user_id, month, year, income, expense, saving,
                     refreshed_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(user_id)
            .bind(month)
            .bind(year)
            .bind(totals.income)
            .bind(totals.expense)
            .bind(totals.saving)
            .bind(Ts(time_source.now()))
            .execute(&mut *tx)
            .await?;
            totals
        }
    };

    let balance = balance_tx(&mut tx, user_id).await?;
    tx.commit().await?;

    Ok(MonthSummary {
        month,
        year,
        income: totals.income,
        expense: totals.expense,
        saving: totals.saving,
        balance,
    })
}

async fn balance_tx(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: UserId,
) -> Result<Money, StoreError> {
    let balance = sqlx::query_scalar::<_, Money>(
        "SELECT p.initial_balance + COALESCE((
            SELECT SUM(CASE WHEN m.kind = 'income'
                THEN m.amount ELSE -m.amount END)
            FROM movements m WHERE m.user_id = p.user_id
        ), 0)
        FROM principals p WHERE p.user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?;
    balance.ok_or(StoreError::PrincipalNotFound)
}

async fn month_totals_tx(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: UserId,
    month: i32,
    year: i32,
) -> Result<KindTotals, StoreError> {
    let rows = sqlx::query_as::<_, (MovementKind, Money)>(
        "SELECT kind, SUM(amount) FROM movements
        WHERE user_id = $1 AND month = $2 AND year = $3
        GROUP BY kind",
    )
    .bind(user_id)
    .bind(month)
    .bind(year)
    .fetch_all(&mut **tx)
    .await?;
    Ok(KindTotals::from_rows(rows))
}

pub(crate) async fn invalidate_monthly_summary_tx(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: UserId,
    month: i32,
    year: i32,
) -> Result<(), StoreError> {
    sqlx::query(
        "DELETE FROM monthly_summaries
        WHERE user_id = $1 AND month = $2 AND year = $3",
    )
    .bind(user_id)
    .bind(month)
    .bind(year)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub(crate) async fn refresh_daily_summary_tx(
    tx: &mut Transaction<'_, Sqlite>,
    time_source: &TimeSource,
    user_id: UserId,
    date: Date,
) -> Result<KindTotals, StoreError> {
    let rows = sqlx::query_as::<_, (MovementKind, Money)>(
        "SELECT kind, SUM(amount) FROM movements
        WHERE user_id = $1 AND date = $2
        GROUP BY kind",
    )
    .bind(user_id)
    .bind(Day(date))
    .fetch_all(&mut **tx)
    .await?;
    let totals = KindTotals::from_rows(rows);
    sqlx::query(
        "INSERT OR REPLACE INTO daily_summaries
            (user_id, date, income, expense, saving, refreshed_at)
        VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(user_id)
    .bind(Day(date))
    .bind(totals.income)
    .bind(totals.expense)
    .bind(totals.saving)
    .bind(Ts(time_source.now()))
    .execute(&mut **tx)
    .await?;
    Ok(totals)
}

/// Spending-limit evaluation, run after each expense insert in the same
/// transaction. A triggered alert enqueues an outbox row; it never blocks
/// the write.
async fn evaluate_expense_alerts_tx(
    tx: &mut Transaction<'_, Sqlite>,
    time_source: &TimeSource,
    user_id: UserId,
) -> Result<(), StoreError> {
    let today = time_source.today();

    for scope in [AlertScope::Daily, AlertScope::Monthly] {
        let threshold = sqlx::query_scalar::<_, Money>(
            "SELECT threshold FROM alerts
            WHERE user_id = $1 AND scope = $2 AND active = 1",
        )
        .bind(user_id)
        .bind(scope)
        .fetch_optional(&mut **tx)
        .await?;
        let Some(threshold) = threshold else {
            continue;
        };

        let spent = match scope {
            AlertScope::Daily => {
                sqlx::query_scalar::<_, Money>(
                    "SELECT COALESCE(SUM(amount), 0) FROM movements
                    WHERE user_id = $1 AND kind = 'expense' AND date = $2",
                )
                .bind(user_id)
                .bind(Day(today))
                .fetch_one(&mut **tx)
                .await?
            }
            AlertScope::Monthly => {
                sqlx::query_scalar::<_, Money>(
                    "SELECT COALESCE(SUM(amount), 0) FROM movements
                    WHERE user_id = $1 AND kind = 'expense'
                        AND month = $2 AND year = $3",
                )
                .bind(user_id)
                .bind(today.month() as i32)
                .bind(today.year() as i32)
                .fetch_one(&mut **tx)
                .await?
            }
        };

        if spent > threshold {
            let label = match scope {
                AlertScope::Daily => "DIARIO",
                AlertScope::Monthly => "MENSUAL",
            };
            let message = format!(
                "🚨 ¡LÍMITE {label} SUPERADO! \
                Límite: ${threshold}, Gastado: ${spent}"
            );
            let payload = serde_json::json!({
                "scope": scope,
                "threshold": threshold.to_decimal(),
                "spent": spent.to_decimal(),
                "excess": (spent - threshold).to_decimal(),
            });
            outbox::enqueue_tx(
                tx,
                time_source,
                user_id,
                NotificationKind::Alert,
                &message,
                Some(payload),
            )
            .await?;
            tracing::warn!(
                user_id = %user_id,
                ?scope,
                %threshold,
                %spent,
                "spending limit exceeded"
            );
        }
    }

    Ok(())
}
