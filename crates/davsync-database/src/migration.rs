//! Schema migrations.

use sqlx::PgPool;
use tracing::info;

use davsync_core::error::{AppError, ErrorKind};

/// Apply every pending migration from the workspace `migrations/` folder.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    info!("Applying metadata schema migrations");

    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to run migrations: {e}"),
                e,
            )
        })?;

    info!("Metadata schema is up to date");
    Ok(())
}
