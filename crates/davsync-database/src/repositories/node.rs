//! Node repository.

use async_trait::async_trait;
use sqlx::PgPool;

use davsync_core::error::AppError;
use davsync_core::result::AppResult;
use davsync_core::types::id::NodeId;
use davsync_core::types::path::StoragePath;
use davsync_entity::Node;

use super::db_error;
use crate::store::NodeStore;

/// Node records in the `nodes` table.
#[derive(Debug, Clone)]
pub struct NodeRepository {
    pool: PgPool,
}

impl NodeRepository {
    /// Create a new node repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn repath(
        &self,
        old_path: &StoragePath,
        new_path: &StoragePath,
        new_owner: Option<&str>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE nodes SET path = $2, owner = COALESCE($3, owner) WHERE path = $1",
        )
        .bind(old_path.to_string())
        .bind(new_path.to_string())
        .bind(new_owner)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to move node", e))?;

        if result.rows_affected() != 1 {
            return Err(AppError::database(format!(
                "Internal database error: moving '{old_path}' touched {} rows",
                result.rows_affected()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl NodeStore for NodeRepository {
    async fn get(&self, path: &StoragePath) -> AppResult<Option<Node>> {
        sqlx::query_as::<_, Node>("SELECT * FROM nodes WHERE path = $1")
            .bind(path.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find node", e))
    }

    async fn exists(&self, path: &StoragePath) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM nodes WHERE path = $1)")
            .bind(path.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Failed to check node existence", e))
    }

    async fn save(
        &self,
        path: &StoragePath,
        owner: &str,
        is_dir: bool,
        mime_type: &str,
    ) -> AppResult<Node> {
        sqlx::query_as::<_, Node>(
            "INSERT INTO nodes (owner, path, is_dir, mime_type, deleted) \
             VALUES ($1, $2, $3, $4, FALSE) RETURNING *",
        )
        .bind(owner)
        .bind(path.to_string())
        .bind(is_dir)
        .bind(mime_type)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to save node", e))
    }

    async fn delete_by_prefix(&self, path: &StoragePath) -> AppResult<u64> {
        // shares, trash_nodes and favorites follow through ON DELETE CASCADE
        let result = sqlx::query(
            "DELETE FROM nodes WHERE path = $1 OR starts_with(path, $1 || '/')",
        )
        .bind(path.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to delete nodes", e))?;

        Ok(result.rows_affected())
    }

    async fn move_node(&self, old_path: &StoragePath, new_path: &StoragePath) -> AppResult<()> {
        self.repath(old_path, new_path, None).await
    }

    async fn transfer(
        &self,
        old_path: &StoragePath,
        new_path: &StoragePath,
        new_owner: &str,
    ) -> AppResult<()> {
        self.repath(old_path, new_path, Some(new_owner)).await
    }

    async fn find_by_name_suffix(&self, name: &StoragePath, owner: &str) -> AppResult<Vec<Node>> {
        sqlx::query_as::<_, Node>(
            "SELECT * FROM nodes WHERE owner = $2 \
             AND (path = $1 OR right(path, char_length($1) + 1) = '/' || $1) \
             ORDER BY id ASC",
        )
        .bind(name.to_string())
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to search nodes by name", e))
    }

    async fn find_by_id(&self, id: NodeId) -> AppResult<Option<Node>> {
        sqlx::query_as::<_, Node>("SELECT * FROM nodes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find node by id", e))
    }
}
