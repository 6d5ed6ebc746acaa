use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{error::AppError, state::AppState};

use super::dto::{FoodResponse, FoodSearchQuery, FoodSearchResponse, MAX_SEARCH_LIMIT};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/foods/search", get(search_foods))
        .route("/foods/:id", get(get_food))
}

#[instrument(skip(state))]
pub async fn search_foods(
    State(state): State<AppState>,
    Query(q): Query<FoodSearchQuery>,
) -> Result<Json<FoodSearchResponse>, AppError> {
    let query = q
        .query
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::validation("search query required"))?;
    if q.limit < 1 {
        return Err(AppError::validation("limit must be at least 1"));
    }

    let foods = state.foods.search(query, q.limit.min(MAX_SEARCH_LIMIT)).await?;
    Ok(Json(FoodSearchResponse { success: true, foods }))
}

#[instrument(skip(state))]
pub async fn get_food(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<FoodResponse>, AppError> {
    let food = state.foods.get(id).await?.ok_or(AppError::NotFound("food"))?;
    Ok(Json(FoodResponse { success: true, food }))
}
