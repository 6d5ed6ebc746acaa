use std::time::Duration;

use anyhow::Context;
use axum::extract::Multipart;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
const PRESIGN_TTL: Duration = Duration::from_secs(10 * 60);

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

/// Reads the `image` field of a multipart body.
pub async fn read_image_field(mp: &mut Multipart) -> Result<UploadItem, AppError> {
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let body = field
            .bytes()
            .await
            .map_err(|e| AppError::validation(format!("unreadable image field: {e}")))?;
        return Ok(UploadItem { body, content_type });
    }
    Err(AppError::validation("no image provided"))
}

/// Only jpeg and png, at most `MAX_IMAGE_BYTES`.
pub fn validate_image(item: &UploadItem) -> Result<&'static str, AppError> {
    let ext = ext_from_mime(&item.content_type)
        .ok_or_else(|| AppError::validation("only .png, .jpg and .jpeg images are allowed"))?;
    if item.body.is_empty() {
        return Err(AppError::validation("image is empty"));
    }
    if item.body.len() > MAX_IMAGE_BYTES {
        return Err(AppError::validation("image exceeds 5 MiB"));
    }
    Ok(ext)
}

pub fn scan_image_prefix(user_id: Uuid) -> String {
    format!("scans/{}/", user_id)
}

/// An `image_ref` may only point into the caller's own prefix.
pub fn owns_image_ref(user_id: Uuid, image_ref: &str) -> bool {
    image_ref
        .strip_prefix(&scan_image_prefix(user_id))
        .is_some_and(|rest| !rest.is_empty() && !rest.contains('/') && !rest.contains(".."))
}

/// Stores the image and returns its `image_ref`.
pub async fn upload_scan_image(
    st: &AppState,
    user_id: Uuid,
    item: UploadItem,
) -> Result<String, AppError> {
    let ext = validate_image(&item)?;
    let key = format!("{}{}.{}", scan_image_prefix(user_id), Uuid::new_v4(), ext);
    st.storage
        .store(&key, item.body, &item.content_type)
        .await
        .context("upload scan image")?;
    info!(%user_id, image_ref = %key, "scan image stored");
    Ok(key)
}

pub async fn presign_scan_image(st: &AppState, image_ref: &str) -> Result<String, AppError> {
    let url = st
        .storage
        .signed_url(image_ref, PRESIGN_TTL)
        .await
        .with_context(|| format!("presign url for {}", image_ref))?;
    Ok(url)
}

/// Runs after the ledger commit; the row is already gone, so failure only leaks an object.
pub async fn delete_scan_image(st: &AppState, image_ref: &str) {
    if let Err(e) = st.storage.remove(image_ref).await {
        warn!(error = %e, image_ref, "failed to delete scan image");
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        _ => None,
    }
}
