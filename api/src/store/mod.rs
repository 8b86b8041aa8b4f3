//! Storage engine and ledger operations.
//!
//! ## Design Decisions
//!
//! ### Pooled SQLite
//! - One `SqlitePool` capped at `max_connections` backs every operation.
//!   Connections are opened lazily with WAL journaling, `synchronous =
//!   NORMAL`, a 10k-page cache and in-memory temp storage, so long reads do
//!   not block writers and writers serialize at the store layer.
//! - A logical operation acquires one connection for its whole transaction:
//!   commit on success, rollback when the transaction guard drops on error.
//!
//! ### Fixed-point money
//! - Amounts are integer hundredths end to end ([`Money`]). `Decimal` only
//!   appears when parsing user input and when rendering, so ledger
//!   invariants are exact integer arithmetic.
//!
//! ### Time Source Dependency
//! - Functions that need the current instant or date take a
//!   [`TimeSource`](crate::time::TimeSource) so the clock can be mocked in
//!   tests. Row timestamps are always bound explicitly from it, never left
//!   to SQL defaults.
//!
//! ### Derived caches
//! - The monthly and daily summary tables are caches over `movements`.
//!   Every write that can change them deletes or refreshes the affected
//!   rows inside the same transaction, so a cache row is either absent or
//!   equal to re-aggregation.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use derive_more::Display;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteSynchronous,
};

pub mod alert;
pub mod category;
pub mod debt;
pub mod export;
pub mod movement;
pub mod outbox;
pub mod principal;
pub mod reminder;
pub mod sql;
pub mod subscription;

/// Longest allowed movement or reminder description.
pub const MAX_DESCRIPTION_LEN: usize = 500;
/// Longest allowed category name.
pub const MAX_CATEGORY_NAME_LEN: usize = 50;
/// Longest allowed subscription name or debt counterparty name.
pub const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_path: PathBuf,
    pub timeout: Duration,
    pub max_connections: u32,
}

/// Open the pooled store. Connections pick up the SQLite tuning pragmas on
/// first open; the pool enforces the connection cap.
pub async fn connect(config: &StoreConfig) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(&config.database_path)
        .create_if_missing(true)
        .busy_timeout(config.timeout)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .pragma("cache_size", "10000")
        .pragma("temp_store", "MEMORY");
    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
}

/// Drain the pool on shutdown.
pub async fn close_all(pool: &SqlitePool) {
    pool.close().await;
}

/// The chat identity that owns every row. Externally supplied.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    Serialize,
    Deserialize,
    sqlx::Type,
)]
#[sqlx(transparent)]
pub struct UserId(pub i64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct MovementId(pub i64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct SubscriptionId(pub i64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct ReminderId(pub i64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct DebtId(pub i64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct AlertId(pub i64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct NotificationId(pub i64);

/// An amount in hundredths of the currency unit.
///
/// Negative values never reach storage; debts keep a magnitude plus a
/// direction, and balances may only go negative as a computed result.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct Money(pub i64);

impl Money {
    pub const ZERO: Money = Money(0);
    /// 0.01
    pub const MIN: Money = Money(1);
    /// 9,999,999.99
    pub const MAX: Money = Money(999_999_999);

    /// Quantize a decimal to hundredths, half away from zero. `None` when
    /// the value does not fit in the cents range of an `i64`.
    pub fn from_decimal(value: Decimal) -> Option<Money> {
        let cents = (value * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        cents.to_i64().map(Money)
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Range check for user-supplied amounts. Zero is only legal for the
    /// initial balance.
    pub fn in_range(self, allow_zero: bool) -> bool {
        if self == Money::ZERO {
            allow_zero
        } else {
            (Money::MIN..=Money::MAX).contains(&self)
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl std::ops::Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        Money(iter.map(|m| m.0).sum())
    }
}

/// Renders with thousands separators, e.g. `12,345.67`, the way amounts
/// appear in chat messages. CSV export uses [`Money::to_decimal`] instead.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cents = self.0.unsigned_abs();
        let units = (cents / 100).to_string();
        let mut grouped = String::with_capacity(units.len() + units.len() / 3);
        for (i, digit) in units.chars().enumerate() {
            if i > 0 && (units.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(digit);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}{grouped}.{:02}", cents % 100)
    }
}

/// The three movement kinds. Savings reduce the balance but are not
/// expenses, so they never trip spending alerts.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Income,
    Expense,
    Saving,
}

impl MovementKind {
    pub const ALL: [MovementKind; 3] =
        [MovementKind::Income, MovementKind::Expense, MovementKind::Saving];

    pub fn as_str(self) -> &'static str {
        match self {
            MovementKind::Income => "income",
            MovementKind::Expense => "expense",
            MovementKind::Saving => "saving",
        }
    }

    /// +1 for income, -1 for expense and saving; the balance identity.
    pub fn sign(self) -> i64 {
        match self {
            MovementKind::Income => 1,
            MovementKind::Expense | MovementKind::Saving => -1,
        }
    }
}

impl FromStr for MovementKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(MovementKind::Income),
            "expense" => Ok(MovementKind::Expense),
            "saving" => Ok(MovementKind::Saving),
            _ => Err(()),
        }
    }
}

/// Who owes whom. The stored amount is always a magnitude.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DebtDirection {
    OwedToPrincipal,
    OwedByPrincipal,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlertScope {
    Daily,
    Monthly,
}

/// What a pending outbox row notifies about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    Alert,
    SubscriptionCharged,
    ReminderDue,
    MonthlySummary,
    BackupReady,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Amount out of range")]
    InvalidAmount,
    #[error("Charge day out of range")]
    InvalidChargeDay,
    #[error("Field too long")]
    FieldTooLong,
    #[error("Field too short")]
    FieldTooShort,
    #[error("Principal not found")]
    PrincipalNotFound,
    #[error("Movement not found")]
    MovementNotFound,
    #[error("Subscription not found")]
    SubscriptionNotFound,
    #[error("Reminder not found")]
    ReminderNotFound,
    #[error("Debt not found")]
    DebtNotFound,
    #[error("Alert not found")]
    AlertNotFound,
    #[error("Unique constraint violation")]
    NotUnique(#[source] sqlx::Error),
    #[error("Database error")]
    Database(#[source] sqlx::Error),
    #[error("Unexpected error")]
    UnexpectedError(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::NotUnique(e)
            }
            _ => StoreError::Database(e),
        }
    }
}
