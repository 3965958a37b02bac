use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;

use crate::{
    blob::BlobStore,
    config::AppConfig,
    web::cleanup::CleanupQueue,
};

/// Shared handles constructed once at process start and injected into the
/// router. The pool is drained when the last clone drops at shutdown.
#[derive(Clone)]
pub struct AppState {
    pool: PgPool,
    config: Arc<AppConfig>,
    blob: BlobStore,
    cleanup: CleanupQueue,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(&config.database_url)
            .await
            .context("failed to connect to Postgres")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;

        let blob = BlobStore::new(&config);
        let cleanup = CleanupQueue::spawn(blob.clone());

        Ok(Self {
            pool,
            config: Arc::new(config),
            blob,
            cleanup,
        })
    }

    pub async fn ensure_seed_admin(&self) -> Result<()> {
        let has_admin: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM admin_users)")
            .fetch_one(&self.pool)
            .await
            .context("failed to verify admin presence")?;

        if !has_admin {
            let password_hash = crate::web::auth::hash_password("change-me")
                .map_err(|err| anyhow!("failed to hash seed admin password: {err}"))?;

            sqlx::query(
                "INSERT INTO admin_users (username, email, password_hash) VALUES ($1, $2, $3)",
            )
            .bind("admin")
            .bind("admin@localhost")
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .context("failed to insert seed admin user")?;

            info!("Seeded default admin user 'admin' (password: 'change-me'). Update it promptly.");
        }

        Ok(())
    }

    pub fn pool_ref(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn blob(&self) -> &BlobStore {
        &self.blob
    }

    pub fn cleanup(&self) -> &CleanupQueue {
        &self.cleanup
    }
}
