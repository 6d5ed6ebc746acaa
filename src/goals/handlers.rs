use axum::{extract::State, routing::get, Json, Router};
use tracing::{info, instrument};

use crate::{auth::AuthUser, error::AppError, state::AppState};

use super::dto::{GoalsResponse, UpdateGoalsRequest};

pub fn routes() -> Router<AppState> {
    Router::new().route("/user/goals", get(get_goals).put(update_goals))
}

#[instrument(skip(state))]
pub async fn get_goals(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<GoalsResponse>, AppError> {
    let goals = state.goals.get_or_create(user_id).await?;
    Ok(Json(GoalsResponse { success: true, message: None, goals }))
}

/// Partial update: absent fields keep their stored value.
#[instrument(skip(state, req))]
pub async fn update_goals(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<UpdateGoalsRequest>,
) -> Result<Json<GoalsResponse>, AppError> {
    let patch = req.into_patch()?;
    let goals = state.goals.update(user_id, patch).await?;
    info!(%user_id, daily_calorie_goal = goals.daily_calorie_goal, "goals updated");
    Ok(Json(GoalsResponse {
        success: true,
        message: Some("Goals updated successfully"),
        goals,
    }))
}
