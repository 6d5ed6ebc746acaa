use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::error::AppError;
use crate::scans::filter::{Page, ScanFilter};
use crate::scans::repo_types::{NewScanEntry, ScanEntry, ScanRow};

const SCAN_COLUMNS: &str = "id, user_id, food_id, food_name, meal_type, portion_amount, portion_unit, \
     calories, protein_g, carbs_g, fat_g, fiber_g, image_ref, scan_date, scan_time, ai_confidence";

/// Insert a ledger row within a transaction.
pub async fn insert_scan_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    entry: &NewScanEntry,
) -> Result<ScanEntry, AppError> {
    let n = entry.nutrients;
    let row = sqlx::query_as::<_, ScanRow>(&format!(
        r#"
        INSERT INTO scan_entry
            (id, user_id, food_id, food_name, meal_type, portion_amount, portion_unit,
             calories, protein_g, carbs_g, fat_g, fiber_g, image_ref, scan_date, scan_time, ai_confidence)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING {SCAN_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(entry.user_id)
    .bind(entry.food_id) // Option<i64> → NULL allowed
    .bind(&entry.food_name)
    .bind(entry.meal_type.map(|m| m.as_str()))
    .bind(entry.portion_amount)
    .bind(&entry.portion_unit)
    .bind(n.calories)
    .bind(n.protein_g)
    .bind(n.carbs_g)
    .bind(n.fat_g)
    .bind(n.fiber_g)
    .bind(&entry.image_ref)
    .bind(entry.scan_date)
    .bind(entry.scan_time)
    .bind(entry.ai_confidence)
    .fetch_one(&mut **tx)
    .await?;
    row.try_into()
}

/// Delete an owned row within a transaction, returning what was removed.
///
/// `None` covers absent ids, rows of other users, and the loser of two concurrent deletes.
pub async fn delete_scan_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    user_id: Uuid,
) -> Result<Option<ScanEntry>, AppError> {
    let row = sqlx::query_as::<_, ScanRow>(&format!(
        "DELETE FROM scan_entry WHERE id = $1 AND user_id = $2 RETURNING {SCAN_COLUMNS}"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?;
    row.map(ScanEntry::try_from).transpose()
}

pub async fn find_scan(db: &PgPool, id: Uuid, user_id: Uuid) -> Result<Option<ScanEntry>, AppError> {
    let row = sqlx::query_as::<_, ScanRow>(&format!(
        "SELECT {SCAN_COLUMNS} FROM scan_entry WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    row.map(ScanEntry::try_from).transpose()
}

/// Newest first: `scan_date DESC, scan_time DESC`, then id for a stable page boundary.
pub async fn list_by_user(
    db: &PgPool,
    user_id: Uuid,
    filter: &ScanFilter,
    page: Page,
) -> Result<Vec<ScanEntry>, AppError> {
    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {SCAN_COLUMNS} FROM scan_entry WHERE user_id = "
    ));
    qb.push_bind(user_id);
    filter.push_predicates(&mut qb);
    qb.push(" ORDER BY scan_date DESC, scan_time DESC, id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset);

    let rows = qb.build_query_as::<ScanRow>().fetch_all(db).await?;
    rows.into_iter().map(ScanEntry::try_from).collect()
}
