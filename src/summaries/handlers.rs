use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use time::Date;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::AppError,
    goals::repo_types::DEFAULT_CALORIE_GOAL,
    state::AppState,
    timefmt::{iso_date, parse_date, today},
};

use super::repo_types::DailySummary;

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/summary/daily", get(get_daily_summary))
}

pub fn write_routes() -> Router<AppState> {
    Router::new().route("/summary/daily/rebuild", post(rebuild_daily_summary))
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub success: bool,
    #[serde(with = "iso_date")]
    pub date: Date,
    pub summary: DailySummary,
    pub calorie_goal: i32,
    /// Negative once the goal is exceeded.
    pub remaining_calories: f64,
}

impl SummaryResponse {
    fn new(date: Date, summary: DailySummary, calorie_goal: i32) -> Self {
        Self {
            success: true,
            date,
            remaining_calories: f64::from(calorie_goal) - summary.total_calories,
            summary,
            calorie_goal,
        }
    }
}

/// Reads the goal without creating the goals row.
async fn calorie_goal(state: &AppState, user_id: Uuid) -> Result<i32, AppError> {
    Ok(state
        .goals
        .find(user_id)
        .await?
        .map_or(DEFAULT_CALORIE_GOAL, |g| g.daily_calorie_goal))
}

/// Missing or blank `date` means today in the configured offset.
fn resolve_day(state: &AppState, raw: Option<&str>) -> Result<Date, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => parse_date(raw),
        None => Ok(today(state.config.utc_offset)),
    }
}

#[instrument(skip(state))]
pub async fn get_daily_summary(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<SummaryQuery>,
) -> Result<Json<SummaryResponse>, AppError> {
    let date = resolve_day(&state, q.date.as_deref())?;
    let summary = state.ledger.summary(user_id, date).await?;
    let goal = calorie_goal(&state, user_id).await?;
    Ok(Json(SummaryResponse::new(date, summary, goal)))
}

#[instrument(skip(state))]
pub async fn rebuild_daily_summary(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<SummaryQuery>,
) -> Result<Json<SummaryResponse>, AppError> {
    let date = resolve_day(&state, q.date.as_deref())?;
    let summary = state.ledger.rebuild_summary(user_id, date).await?;
    let goal = calorie_goal(&state, user_id).await?;
    Ok(Json(SummaryResponse::new(date, summary, goal)))
}
