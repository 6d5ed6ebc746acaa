//! Object storage for scan images. The core only ever sees the key (`image_ref`).

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use tracing::debug;

use crate::config::AppConfig;

/// MinIO ignores the region, but the SDK signer needs one.
const SIGNING_REGION: &str = "us-east-1";

#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn store(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
    async fn signed_url(&self, key: &str, ttl: Duration) -> anyhow::Result<String>;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    pub async fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let creds = Credentials::new(
            &cfg.minio_access_key,
            &cfg.minio_secret_key,
            None,
            None,
            "foodscan-env",
        );
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(SIGNING_REGION))
            .credentials_provider(creds)
            .endpoint_url(&cfg.minio_endpoint)
            .load()
            .await;

        // bucket in the path, not the host: MinIO has no wildcard DNS
        let s3 = S3ConfigBuilder::from(&shared).force_path_style(true).build();

        Ok(Self {
            client: Client::from_conf(s3),
            bucket: cfg.minio_bucket.clone(),
        })
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn store(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(size as i64)
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("store {}/{}", self.bucket, key))?;
        debug!(key, size, "object stored");
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("remove {}/{}", self.bucket, key))?;
        Ok(())
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> anyhow::Result<String> {
        let presigning = PresigningConfig::expires_in(ttl).context("presign ttl")?;
        let req = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .with_context(|| format!("sign url for {}/{}", self.bucket, key))?;
        Ok(req.uri().to_string())
    }
}

#[cfg(test)]
pub use memory::MemoryStorage;
