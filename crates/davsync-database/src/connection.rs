//! PostgreSQL pool management.

use std::sync::Arc;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use davsync_core::config::DatabaseConfig;
use davsync_core::error::{AppError, ErrorKind};

use crate::repositories::{
    FavoriteRepository, NodeRepository, SettingsRepository, ShareRepository, TrashRepository,
};
use crate::store::Stores;

/// Connected PostgreSQL pool plus the store handles built on it.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Open a pool sized and timed according to `config`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        info!(
            url = %redact_url(&config.url),
            max = config.max_connections,
            min = config.min_connections,
            "Opening metadata database pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout())
            .idle_timeout(config.idle_timeout())
            .connect(&config.url)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to connect to metadata database: {e}"),
                    e,
                )
            })?;

        Ok(Self { pool })
    }

    /// The underlying sqlx pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Store handles sharing this pool.
    pub fn stores(&self) -> Stores {
        Stores {
            nodes: Arc::new(NodeRepository::new(self.pool.clone())),
            shares: Arc::new(ShareRepository::new(self.pool.clone())),
            trash: Arc::new(TrashRepository::new(self.pool.clone())),
            favorites: Arc::new(FavoriteRepository::new(self.pool.clone())),
            settings: Arc::new(SettingsRepository::new(self.pool.clone())),
        }
    }

    /// Round-trip a trivial query.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Health check failed", e))
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Metadata database pool closed");
    }
}

/// Replace the password of a connection URL before it reaches the logs.
fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://").map(|p| p + 3) else {
        return url.to_string();
    };
    let Some(at) = url[scheme_end..].find('@').map(|p| p + scheme_end) else {
        return url.to_string();
    };
    match url[scheme_end..at].find(':') {
        Some(colon) => format!("{}:****{}", &url[..scheme_end + colon], &url[at..]),
        None => url.to_string(),
    }
}
