use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::AuthUser,
    error::AppError,
    foods::resolver::resolve_detection,
    images::services::{delete_scan_image, read_image_field, upload_scan_image, MAX_IMAGE_BYTES},
    state::AppState,
};

use super::dto::{DetectMultipleResponse, DetectResponse, ResolvedDetection};

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/ai/detect", post(detect_food))
        .route("/ai/detect-multiple", post(detect_multiple_foods))
        // multipart framing on top of the image itself
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 1024 * 1024))
}

/// The caller never learns `image_ref` when detection fails, so the object would leak.
async fn discard_image_on_error<T>(
    state: &AppState,
    image_ref: &str,
    detected: Result<T, AppError>,
) -> Result<T, AppError> {
    if detected.is_err() {
        delete_scan_image(state, image_ref).await;
    }
    detected
}

/// POST /ai/detect (multipart `image`)
#[instrument(skip(state, mp))]
pub async fn detect_food(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<Json<DetectResponse>, AppError> {
    let item = read_image_field(&mut mp).await?;
    let (body, content_type) = (item.body.clone(), item.content_type.clone());
    let image_ref = upload_scan_image(&state, user_id, item).await?;

    let detected = state.recognizer.detect(body, &content_type).await;
    let Some(detection) = discard_image_on_error(&state, &image_ref, detected).await? else {
        info!(%user_id, %image_ref, "no food detected");
        return Ok(Json(DetectResponse {
            success: false,
            message: Some("No food detected".into()),
            detection: None,
            resolution: None,
            image_ref,
        }));
    };

    let resolution = resolve_detection(state.foods.as_ref(), &detection).await?;
    info!(%user_id, food = %detection.food_name, confidence = detection.confidence, "food detected");
    Ok(Json(DetectResponse {
        success: true,
        message: None,
        detection: Some(detection),
        resolution: Some(resolution),
        image_ref,
    }))
}

/// POST /ai/detect-multiple (multipart `image`)
#[instrument(skip(state, mp))]
pub async fn detect_multiple_foods(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<Json<DetectMultipleResponse>, AppError> {
    let item = read_image_field(&mut mp).await?;
    let (body, content_type) = (item.body.clone(), item.content_type.clone());
    let image_ref = upload_scan_image(&state, user_id, item).await?;

    let detected = state.recognizer.detect_multiple(body, &content_type).await;
    let detections = discard_image_on_error(&state, &image_ref, detected).await?;
    let mut resolved = Vec::with_capacity(detections.len());
    for detection in detections {
        let resolution = resolve_detection(state.foods.as_ref(), &detection).await?;
        resolved.push(ResolvedDetection { detection, resolution });
    }

    info!(%user_id, count = resolved.len(), "foods detected");
    Ok(Json(DetectMultipleResponse {
        success: !resolved.is_empty(),
        count: resolved.len(),
        detections: resolved,
        image_ref,
    }))
}
