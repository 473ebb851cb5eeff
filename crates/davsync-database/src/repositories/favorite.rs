//! Favorite repository.

use async_trait::async_trait;
use sqlx::PgPool;

use davsync_core::result::AppResult;
use davsync_core::types::id::NodeId;
use davsync_core::types::path::StoragePath;
use davsync_entity::Node;

use super::db_error;
use crate::store::FavoriteStore;

/// Favorite markers in the `favorites` table.
#[derive(Debug, Clone)]
pub struct FavoriteRepository {
    pool: PgPool,
}

impl FavoriteRepository {
    /// Create a new favorite repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FavoriteStore for FavoriteRepository {
    async fn mark(&self, path: &StoragePath, username: &str) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO favorites (node_id, username) \
             SELECT id, $2 FROM nodes WHERE path = $1 \
             ON CONFLICT (node_id, username) DO NOTHING",
        )
        .bind(path.to_string())
        .bind(username)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to mark favorite", e))?;
        Ok(())
    }

    async fn unmark(&self, path: &StoragePath, username: &str) -> AppResult<()> {
        sqlx::query(
            "DELETE FROM favorites WHERE username = $2 \
             AND node_id IN (SELECT id FROM nodes WHERE path = $1)",
        )
        .bind(path.to_string())
        .bind(username)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to unmark favorite", e))?;
        Ok(())
    }

    async fn is_favorite(&self, node_id: NodeId, username: &str) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM favorites WHERE node_id = $1 AND username = $2)",
        )
        .bind(node_id)
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to check favorite", e))
    }

    async fn list(&self, username: &str) -> AppResult<Vec<Node>> {
        sqlx::query_as::<_, Node>(
            "SELECT n.* FROM nodes n JOIN favorites f ON f.node_id = n.id \
             WHERE f.username = $1 ORDER BY n.id ASC",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list favorites", e))
    }
}
