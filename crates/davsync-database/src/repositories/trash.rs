//! Trash link repository.

use async_trait::async_trait;
use sqlx::PgPool;

use davsync_core::result::AppResult;
use davsync_core::types::id::NodeId;
use davsync_core::types::path::StoragePath;
use davsync_entity::TrashNode;

use super::db_error;
use crate::store::TrashStore;

/// Trash links in the `trash_nodes` table.
#[derive(Debug, Clone)]
pub struct TrashRepository {
    pool: PgPool,
}

impl TrashRepository {
    /// Create a new trash repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrashStore for TrashRepository {
    async fn create(&self, trash: &TrashNode) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO trash_nodes (node_id, owner, path, is_dir) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (node_id) DO UPDATE SET owner = EXCLUDED.owner, \
             path = EXCLUDED.path, is_dir = EXCLUDED.is_dir",
        )
        .bind(trash.node_id)
        .bind(&trash.owner)
        .bind(&trash.path)
        .bind(trash.is_dir)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to record trash link", e))?;
        Ok(())
    }

    async fn get(&self, current_path: &StoragePath) -> AppResult<Option<TrashNode>> {
        sqlx::query_as::<_, TrashNode>(
            "SELECT t.* FROM trash_nodes t JOIN nodes n ON n.id = t.node_id WHERE n.path = $1",
        )
        .bind(current_path.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find trash link", e))
    }

    async fn delete(&self, node_id: NodeId) -> AppResult<()> {
        sqlx::query("DELETE FROM trash_nodes WHERE node_id = $1")
            .bind(node_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete trash link", e))?;
        Ok(())
    }
}
