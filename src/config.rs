use std::env;

use anyhow::{Context, Result, ensure};

/// Lifetime of an issued admin token.
pub const TOKEN_TTL_HOURS: i64 = 24;

/// Process-wide configuration resolved once at startup from the environment.
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub blob_store_url: String,
    pub blob_token: Option<String>,
    pub dev_mode: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL env var is missing")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET env var is missing")?;
        ensure!(!jwt_secret.is_empty(), "JWT_SECRET must not be empty");

        let blob_store_url = env::var("BLOB_STORE_URL")
            .unwrap_or_else(|_| "https://blob.vercel-storage.com".to_string());
        let blob_token = env::var("BLOB_READ_WRITE_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());

        let dev_mode = env::var("APP_ENV")
            .map(|value| value != "production")
            .unwrap_or(true);

        Ok(Self {
            database_url,
            jwt_secret,
            blob_store_url,
            blob_token,
            dev_mode,
        })
    }
}
