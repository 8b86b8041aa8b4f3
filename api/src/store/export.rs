//! CSV rendering of a principal's movement history: RFC 4180 quoting,
//! UTF-8 without BOM, header row, one row per movement, newest first.

use anyhow::Context;
use sqlx::SqlitePool;

use crate::store::{StoreError, UserId, movement::Movement};

pub const CSV_HEADER: [&str; 7] =
    ["Date", "Kind", "Category", "Amount", "Description", "Month", "Year"];

/// A rendered export. `rows == 0` means there is nothing to back up; the
/// caller is expected to say so instead of sending a header-only file.
#[derive(Debug, Clone)]
pub struct MovementExport {
    pub data: Vec<u8>,
    pub rows: usize,
}

pub async fn export_movements(
    pool: &SqlitePool,
    user_id: UserId,
) -> Result<MovementExport, StoreError> {
    let movements = sqlx::query_as::<_, Movement>(
        "SELECT * FROM movements
        WHERE user_id = $1
        ORDER BY date DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER).context("writing csv header")?;
    let rows = movements.len();
    for m in movements {
        writer
            .write_record([
                m.date.to_string(),
                m.kind.as_str().to_string(),
                m.category,
                m.amount.to_decimal().to_string(),
                m.description,
                m.month.to_string(),
                m.year.to_string(),
            ])
            .context("writing csv row")?;
    }
    let data = writer
        .into_inner()
        .context("flushing csv writer")?;

    Ok(MovementExport { data, rows })
}
