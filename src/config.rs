use anyhow::Context;
use serde::Deserialize;
use time::{macros::format_description, UtcOffset};

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub minio_endpoint: String,
    pub minio_bucket: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    pub recognizer_url: String,
    /// Offset used to derive `scan_date`/`scan_time` and the default summary day.
    pub utc_offset: UtcOffset,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "foodscan".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "foodscan-users".into()),
        };
        let utc_offset = match std::env::var("SCAN_UTC_OFFSET") {
            Ok(raw) => parse_utc_offset(&raw)?,
            Err(_) => UtcOffset::UTC,
        };

        Ok(Self {
            database_url,
            jwt,
            minio_endpoint: std::env::var("MINIO_ENDPOINT").context("MINIO_ENDPOINT")?,
            minio_bucket: std::env::var("MINIO_BUCKET").context("MINIO_BUCKET")?,
            minio_access_key: std::env::var("MINIO_ACCESS_KEY").context("MINIO_ACCESS_KEY")?,
            minio_secret_key: std::env::var("MINIO_SECRET_KEY").context("MINIO_SECRET_KEY")?,
            recognizer_url: std::env::var("RECOGNIZER_URL")
                .unwrap_or_else(|_| "http://localhost:5000".into()),
            utc_offset,
        })
    }
}

/// Parses `+HH:MM` / `-HH:MM`.
pub fn parse_utc_offset(raw: &str) -> anyhow::Result<UtcOffset> {
    let fmt = format_description!("[offset_hour sign:mandatory]:[offset_minute]");
    UtcOffset::parse(raw.trim(), &fmt)
        .with_context(|| format!("invalid SCAN_UTC_OFFSET {raw:?}, expected +HH:MM"))
}
