use sqlx::{PgPool, Postgres, Transaction};
use time::Date;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::summaries::repo_types::{DailySummary, SummaryDelta};

const SUMMARY_COLUMNS: &str =
    "total_calories, total_protein, total_carbs, total_fat, total_fiber, meal_count";

/// Applies `delta` to the (user, date) row inside the caller's transaction.
///
/// Credits insert-or-add under the row lock taken by `ON CONFLICT`, so
/// concurrent appends accumulate. Debits mirror `DailySummary::apply`.
pub async fn upsert_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    date: Date,
    delta: SummaryDelta,
) -> Result<DailySummary, AppError> {
    let d = delta.nutrients;
    if delta.meals >= 0 {
        let row = sqlx::query_as::<_, DailySummary>(&format!(
            r#"
            INSERT INTO daily_summary
                (user_id, date, total_calories, total_protein, total_carbs, total_fat, total_fiber, meal_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id, date) DO UPDATE SET
                total_calories = daily_summary.total_calories + EXCLUDED.total_calories,
                total_protein  = daily_summary.total_protein  + EXCLUDED.total_protein,
                total_carbs    = daily_summary.total_carbs    + EXCLUDED.total_carbs,
                total_fat      = daily_summary.total_fat      + EXCLUDED.total_fat,
                total_fiber    = daily_summary.total_fiber    + EXCLUDED.total_fiber,
                meal_count     = daily_summary.meal_count     + EXCLUDED.meal_count,
                updated_at     = now()
            RETURNING {SUMMARY_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(date)
        .bind(d.calories)
        .bind(d.protein_g)
        .bind(d.carbs_g)
        .bind(d.fat_g)
        .bind(d.fiber_g)
        .bind(delta.meals)
        .fetch_one(&mut **tx)
        .await?;
        return Ok(row);
    }

    let row = sqlx::query_as::<_, DailySummary>(&format!(
        r#"
        UPDATE daily_summary SET
            total_calories = CASE WHEN meal_count + $8 <= 0 THEN 0 ELSE GREATEST(total_calories - $3, 0) END,
            total_protein  = CASE WHEN meal_count + $8 <= 0 THEN 0 ELSE GREATEST(total_protein  - $4, 0) END,
            total_carbs    = CASE WHEN meal_count + $8 <= 0 THEN 0 ELSE GREATEST(total_carbs    - $5, 0) END,
            total_fat      = CASE WHEN meal_count + $8 <= 0 THEN 0 ELSE GREATEST(total_fat      - $6, 0) END,
            total_fiber    = CASE WHEN meal_count + $8 <= 0 THEN 0 ELSE GREATEST(total_fiber    - $7, 0) END,
            meal_count     = GREATEST(meal_count + $8, 0),
            updated_at     = now()
        WHERE user_id = $1 AND date = $2
        RETURNING {SUMMARY_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(date)
    .bind(d.calories)
    .bind(d.protein_g)
    .bind(d.carbs_g)
    .bind(d.fat_g)
    .bind(d.fiber_g)
    .bind(delta.meals)
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some(row) => Ok(row),
        None => {
            warn!(%user_id, %date, "debit against missing summary row; rebuilding from ledger");
            rebuild_tx(tx, user_id, date).await
        }
    }
}

pub async fn read(db: &PgPool, user_id: Uuid, date: Date) -> Result<Option<DailySummary>, AppError> {
    let row = sqlx::query_as::<_, DailySummary>(&format!(
        "SELECT {SUMMARY_COLUMNS} FROM daily_summary WHERE user_id = $1 AND date = $2"
    ))
    .bind(user_id)
    .bind(date)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Overwrites the (user, date) row with sums recomputed from `scan_entry`.
///
/// The summary row is locked first so writers for the same day queue behind the repair.
pub async fn rebuild_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    date: Date,
) -> Result<DailySummary, AppError> {
    sqlx::query(
        r#"
        INSERT INTO daily_summary (user_id, date)
        VALUES ($1, $2)
        ON CONFLICT (user_id, date) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(date)
    .execute(&mut **tx)
    .await?;

    sqlx::query("SELECT 1 FROM daily_summary WHERE user_id = $1 AND date = $2 FOR UPDATE")
        .bind(user_id)
        .bind(date)
        .execute(&mut **tx)
        .await?;

    let row = sqlx::query_as::<_, DailySummary>(
        r#"
        WITH sums AS (
            SELECT COALESCE(SUM(calories), 0)::float8  AS total_calories,
                   COALESCE(SUM(protein_g), 0)::float8 AS total_protein,
                   COALESCE(SUM(carbs_g), 0)::float8   AS total_carbs,
                   COALESCE(SUM(fat_g), 0)::float8     AS total_fat,
                   COALESCE(SUM(fiber_g), 0)::float8   AS total_fiber,
                   COUNT(*)::int4                      AS meal_count
              FROM scan_entry
             WHERE user_id = $1 AND scan_date = $2
        )
        UPDATE daily_summary d SET
            total_calories = sums.total_calories,
            total_protein  = sums.total_protein,
            total_carbs    = sums.total_carbs,
            total_fat      = sums.total_fat,
            total_fiber    = sums.total_fiber,
            meal_count     = sums.meal_count,
            updated_at     = now()
          FROM sums
         WHERE d.user_id = $1 AND d.date = $2
        RETURNING d.total_calories, d.total_protein, d.total_carbs, d.total_fat, d.total_fiber, d.meal_count
        "#,
    )
    .bind(user_id)
    .bind(date)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row)
}
