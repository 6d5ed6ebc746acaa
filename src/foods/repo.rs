use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppError;
use crate::foods::repo_types::FoodRecord;

/// Read access to the reference food catalog.
#[async_trait]
pub trait FoodCatalog: Send + Sync {
    /// Rows whose name contains `fragment`, case-insensitively, in ascending id order.
    async fn search(&self, fragment: &str, limit: i64) -> Result<Vec<FoodRecord>, AppError>;

    async fn get(&self, id: i64) -> Result<Option<FoodRecord>, AppError>;
}

#[derive(Clone)]
pub struct PgFoodCatalog {
    db: PgPool,
}

impl PgFoodCatalog {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FoodCatalog for PgFoodCatalog {
    async fn search(&self, fragment: &str, limit: i64) -> Result<Vec<FoodRecord>, AppError> {
        // strpos instead of LIKE so '%' and '_' in the label match literally.
        let rows = sqlx::query_as::<_, FoodRecord>(
            r#"
            SELECT id, name, calories, protein_g, carbs_g, fat_g, fiber_g, default_portion
              FROM foods
             WHERE strpos(LOWER(name), LOWER($1)) > 0
             ORDER BY id ASC
             LIMIT $2
            "#,
        )
        .bind(fragment)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn get(&self, id: i64) -> Result<Option<FoodRecord>, AppError> {
        let row = sqlx::query_as::<_, FoodRecord>(
            r#"
            SELECT id, name, calories, protein_g, carbs_g, fat_g, fiber_g, default_portion
              FROM foods
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }
}

#[cfg(test)]
pub use memory::MemoryFoodCatalog;
