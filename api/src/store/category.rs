use sqlx::{FromRow, SqlitePool};

use crate::store::sql::Ts;
use crate::store::{
    MAX_CATEGORY_NAME_LEN, Money, MovementKind, StoreError, UserId,
};
use crate::time::TimeSource;

/// Expense categories seeded when a flow needs one and the principal has
/// none yet.
pub const DEFAULT_EXPENSE_CATEGORIES: [&str; 3] =
    ["Servicios", "Entretenimiento", "Otros"];

/// The category every fast-path movement falls back to.
pub const FALLBACK_CATEGORY: &str = "Otros";

#[derive(Debug, Clone, FromRow)]
pub struct CategoryTotal {
    pub name: String,
    pub total: Money,
}

/// Upsert-ignore on `(user_id, name, kind)`. Returns true only when a row
/// was actually inserted.
pub async fn add_category(
    pool: &SqlitePool,
    time_source: &TimeSource,
    user_id: UserId,
    name: &str,
    kind: MovementKind,
) -> Result<bool, StoreError> {
    let name = name.trim();
    if name.len() > MAX_CATEGORY_NAME_LEN {
        return Err(StoreError::FieldTooLong);
    }
    let result = sqlx::query(
        "INSERT OR IGNORE INTO categories (user_id, name, kind, created_at)
        VALUES ($1, $2, $3, $4)",
    )
    .bind(user_id)
    .bind(name)
    .bind(kind)
    .bind(Ts(time_source.now()))
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Active category names of one kind, lexicographically ordered.
pub async fn list_categories(
    pool: &SqlitePool,
    user_id: UserId,
    kind: MovementKind,
) -> Result<Vec<String>, StoreError> {
    Ok(sqlx::query_scalar::<_, String>(
        "SELECT name FROM categories
        WHERE user_id = $1 AND kind = $2 AND active = 1
        ORDER BY name
        LIMIT 50",
    )
    .bind(user_id)
    .bind(kind)
    .fetch_all(pool)
    .await?)
}

/// Active categories of one kind joined with their summed movements for the
/// period, busiest first.
pub async fn list_categories_with_totals(
    pool: &SqlitePool,
    user_id: UserId,
    kind: MovementKind,
    month: i32,
    year: i32,
) -> Result<Vec<CategoryTotal>, StoreError> {
    Ok(sqlx::query_as::<_, CategoryTotal>(
        "SELECT c.name AS name, COALESCE(SUM(m.amount), 0) AS total
        FROM categories c
        LEFT JOIN movements m ON m.category = c.name
            AND m.user_id = c.user_id
            AND m.kind = c.kind
            AND m.month = $1
            AND m.year = $2
        WHERE c.user_id = $3 AND c.kind = $4 AND c.active = 1
        GROUP BY c.name
        ORDER BY total DESC, c.name",
    )
    .bind(month)
    .bind(year)
    .bind(user_id)
    .bind(kind)
    .fetch_all(pool)
    .await?)
}

/// Categories are never hard-deleted so movement snapshots keep their label.
pub async fn deactivate_category(
    pool: &SqlitePool,
    user_id: UserId,
    name: &str,
    kind: MovementKind,
) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE categories SET active = 0
        WHERE user_id = $1 AND name = $2 AND kind = $3",
    )
    .bind(user_id)
    .bind(name)
    .bind(kind)
    .execute(pool)
    .await?;
    Ok(())
}

/// The first active category of a kind, creating the fallback when the
/// principal has none. Backs the `/expense` and `/income` fast paths.
pub async fn first_or_fallback_category(
    pool: &SqlitePool,
    time_source: &TimeSource,
    user_id: UserId,
    kind: MovementKind,
) -> Result<String, StoreError> {
    let categories = list_categories(pool, user_id, kind).await?;
    if let Some(first) = categories.into_iter().next() {
        return Ok(first);
    }
    add_category(pool, time_source, user_id, FALLBACK_CATEGORY, kind).await?;
    Ok(FALLBACK_CATEGORY.to_string())
}

/// Seed the default expense categories if the principal has none, then
/// return the active list. The subscription flow calls this before showing
/// its category keyboard.
pub async fn expense_categories_with_defaults(
    pool: &SqlitePool,
    time_source: &TimeSource,
    user_id: UserId,
) -> Result<Vec<String>, StoreError> {
    let existing =
        list_categories(pool, user_id, MovementKind::Expense).await?;
    if !existing.is_empty() {
        return Ok(existing);
    }
    for name in DEFAULT_EXPENSE_CATEGORIES {
        add_category(pool, time_source, user_id, name, MovementKind::Expense)
            .await?;
    }
    list_categories(pool, user_id, MovementKind::Expense).await
}
