use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::AppError;
use crate::goals::repo_types::{GoalsPatch, GoalsRow, UserGoals};

const GOAL_COLUMNS: &str =
    "daily_calorie_goal, target_weight, current_weight, height, unit_system";

#[async_trait]
pub trait GoalStore: Send + Sync {
    /// Stored goals, if the user ever had any. Never writes.
    async fn find(&self, user_id: Uuid) -> Result<Option<UserGoals>, AppError>;

    /// Stored goals, creating the default row on first access.
    async fn get_or_create(&self, user_id: Uuid) -> Result<UserGoals, AppError>;

    async fn update(&self, user_id: Uuid, patch: GoalsPatch) -> Result<UserGoals, AppError>;
}

#[derive(Clone)]
pub struct PgGoalStore {
    db: PgPool,
}

impl PgGoalStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

async fn ensure_row_tx(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> Result<(), AppError> {
    sqlx::query("INSERT INTO user_goals (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[async_trait]
impl GoalStore for PgGoalStore {
    async fn find(&self, user_id: Uuid) -> Result<Option<UserGoals>, AppError> {
        let row = sqlx::query_as::<_, GoalsRow>(&format!(
            "SELECT {GOAL_COLUMNS} FROM user_goals WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        row.map(UserGoals::try_from).transpose()
    }

    async fn get_or_create(&self, user_id: Uuid) -> Result<UserGoals, AppError> {
        let mut tx = self.db.begin().await?;
        ensure_row_tx(&mut tx, user_id).await?;
        let row = sqlx::query_as::<_, GoalsRow>(&format!(
            "SELECT {GOAL_COLUMNS} FROM user_goals WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        row.try_into()
    }

    async fn update(&self, user_id: Uuid, patch: GoalsPatch) -> Result<UserGoals, AppError> {
        let mut tx = self.db.begin().await?;
        ensure_row_tx(&mut tx, user_id).await?;
        let row = sqlx::query_as::<_, GoalsRow>(&format!(
            r#"
            UPDATE user_goals SET
                daily_calorie_goal = COALESCE($2, daily_calorie_goal),
                target_weight      = COALESCE($3, target_weight),
                current_weight     = COALESCE($4, current_weight),
                height             = COALESCE($5, height),
                unit_system        = COALESCE($6, unit_system),
                updated_at         = now()
            WHERE user_id = $1
            RETURNING {GOAL_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(patch.daily_calorie_goal)
        .bind(patch.target_weight)
        .bind(patch.current_weight)
        .bind(patch.height)
        .bind(patch.unit_system.map(|u| u.as_str()))
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        row.try_into()
    }
}

#[cfg(test)]
pub use memory::MemoryGoalStore;
