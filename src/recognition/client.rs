use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::dto::{DetectMultipleReply, DetectReply, DetectionResult, HealthReply};
use crate::error::AppError;

const DETECT_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// The external food-recognition service.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Highest-confidence detection, or `None` when no food was found.
    async fn detect(&self, image: Bytes, content_type: &str)
        -> Result<Option<DetectionResult>, AppError>;

    async fn detect_multiple(
        &self,
        image: Bytes,
        content_type: &str,
    ) -> Result<Vec<DetectionResult>, AppError>;

    /// The service's self-reported status string.
    async fn health(&self) -> Result<String, AppError>;
}

#[derive(Clone)]
pub struct HttpRecognizer {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRecognizer {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DETECT_TIMEOUT)
            .build()
            .context("build recognizer http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn image_form(image: Bytes, content_type: &str) -> Result<Form, AppError> {
        let part = Part::bytes(image.to_vec())
            .file_name("scan")
            .mime_str(content_type)
            .map_err(|e| AppError::validation(format!("invalid image content type: {e}")))?;
        Ok(Form::new().part("image", part))
    }

    async fn post_image(
        &self,
        path: &str,
        image: Bytes,
        content_type: &str,
    ) -> Result<reqwest::Response, AppError> {
        let url = format!("{}{}", self.base_url, path);
        let form = Self::image_form(image, content_type)?;
        let res = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(upstream_error)?
            .error_for_status()
            .map_err(upstream_error)?;
        debug!(%url, status = %res.status(), "recognizer replied");
        Ok(res)
    }
}

#[async_trait]
impl Recognizer for HttpRecognizer {
    async fn detect(
        &self,
        image: Bytes,
        content_type: &str,
    ) -> Result<Option<DetectionResult>, AppError> {
        let res = self.post_image("/detect", image, content_type).await?;
        let reply: DetectReply = decode_reply(res, "/detect").await?;
        if !reply.success {
            return Ok(None);
        }
        Ok(reply.detection)
    }

    async fn detect_multiple(
        &self,
        image: Bytes,
        content_type: &str,
    ) -> Result<Vec<DetectionResult>, AppError> {
        let res = self.post_image("/detect-multiple", image, content_type).await?;
        let reply: DetectMultipleReply = decode_reply(res, "/detect-multiple").await?;
        Ok(reply.detections)
    }

    async fn health(&self) -> Result<String, AppError> {
        let res = self
            .http
            .get(format!("{}/health", self.base_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(upstream_error)?;
        let reply: HealthReply = decode_reply(res, "/health").await?;
        Ok(reply.status)
    }
}

/// A reply we cannot read is no answer at all, not "no food found".
async fn decode_reply<T: DeserializeOwned>(res: reqwest::Response, path: &str) -> Result<T, AppError> {
    res.json::<T>().await.map_err(|e| {
        warn!(error = %e, path, "unreadable recognizer reply");
        AppError::UpstreamUnavailable(format!("malformed {path} reply: {e}"))
    })
}

/// Anything that stops us from getting an answer is "could not ask".
fn upstream_error(e: reqwest::Error) -> AppError {
    warn!(error = %e, "recognizer request failed");
    if e.is_connect() || e.is_timeout() || e.is_request() {
        return AppError::UpstreamUnavailable(e.to_string());
    }
    match e.status() {
        Some(status) if status.is_server_error() => AppError::UpstreamUnavailable(e.to_string()),
        Some(status) if status.is_client_error() => {
            AppError::validation(format!("recognizer rejected the image: {status}"))
        }
        _ => AppError::Internal(anyhow::Error::new(e)),
    }
}

#[cfg(test)]
pub use fake::FakeRecognizer;

#[cfg(test)]
mod fake {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Scripted recognizer: returns whatever detections it was given.
    #[derive(Default)]
    pub struct FakeRecognizer {
        detections: Mutex<Vec<DetectionResult>>,
        down: AtomicBool,
    }

    impl FakeRecognizer {
        pub fn set_detections(&self, detections: Vec<DetectionResult>) {
            *self.detections.lock().unwrap() = detections;
        }

        pub fn set_down(&self, down: bool) {
            self.down.store(down, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), AppError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(AppError::UpstreamUnavailable("connection refused".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Recognizer for FakeRecognizer {
        async fn detect(&self, _image: Bytes, _ct: &str) -> Result<Option<DetectionResult>, AppError> {
            self.check()?;
            let detections = self.detections.lock().unwrap();
            Ok(detections
                .iter()
                .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
                .cloned())
        }

        async fn detect_multiple(&self, _image: Bytes, _ct: &str) -> Result<Vec<DetectionResult>, AppError> {
            self.check()?;
            Ok(self.detections.lock().unwrap().clone())
        }

        async fn health(&self) -> Result<String, AppError> {
            self.check()?;
            Ok("healthy".into())
        }
    }
}
