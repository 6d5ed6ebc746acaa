use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::AppError,
    images::services::presign_scan_image,
    state::AppState,
};

use super::dto::{DeletedScanResponse, ListScansQuery, LogScanRequest, ScanListResponse, ScanResponse};
use super::filter::{Page, ScanFilter};
use super::services::{delete_scan, log_scan};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/scans", get(list_scans))
        .route("/scans/:id/image", get(get_scan_image)) // 302 to a presigned url
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/scans", post(create_scan))
        .route("/scans/:id", delete(remove_scan))
}

#[instrument(skip(state, req))]
pub async fn create_scan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<LogScanRequest>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<ScanResponse>), AppError> {
    let scan = log_scan(&state, user_id, req).await?;
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/api/v1/scans/{}", scan.id))],
        Json(ScanResponse { success: true, scan }),
    ))
}

#[instrument(skip(state))]
pub async fn list_scans(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<ListScansQuery>,
) -> Result<Json<ScanListResponse>, AppError> {
    let filter = ScanFilter::parse(q.date.as_deref(), q.meal_type.as_deref())?;
    let page = Page::new(q.limit, q.offset)?;
    let scans = state.ledger.list(user_id, &filter, page).await?;
    Ok(Json(ScanListResponse { success: true, count: scans.len(), scans }))
}

#[instrument(skip(state))]
pub async fn remove_scan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletedScanResponse>, AppError> {
    delete_scan(&state, user_id, id).await?;
    Ok(Json(DeletedScanResponse { success: true, message: "Scan deleted" }))
}

#[instrument(skip(state))]
pub async fn get_scan_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1]), AppError> {
    let scan = state.ledger.get(id, user_id).await?;
    let image_ref = scan.image_ref.ok_or(AppError::NotFound("image"))?;
    let url = presign_scan_image(&state, &image_ref).await?;
    Ok((StatusCode::FOUND, [(header::LOCATION, url)]))
}
