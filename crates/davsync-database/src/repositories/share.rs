//! Share repository.

use async_trait::async_trait;
use sqlx::PgPool;

use davsync_core::result::AppResult;
use davsync_core::types::id::{NodeId, ShareId};
use davsync_core::types::identity::Identity;
use davsync_core::types::path::StoragePath;
use davsync_entity::{CreateShare, Node, Share, ShareType};

use super::db_error;
use crate::store::ShareStore;

/// Share grants in the `shares` table.
#[derive(Debug, Clone)]
pub struct ShareRepository {
    pool: PgPool,
}

impl ShareRepository {
    /// Create a new share repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShareStore for ShareRepository {
    async fn create(&self, share: &CreateShare) -> AppResult<Share> {
        sqlx::query_as::<_, Share>(
            "INSERT INTO shares (node_id, target, permissions, share_type, created_at) \
             VALUES ($1, $2, $3, $4, NOW()) RETURNING *",
        )
        .bind(share.node_id)
        .bind(&share.target)
        .bind(share.permissions)
        .bind(share.share_type)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create share", e))
    }

    async fn get_by_node(&self, node_id: NodeId) -> AppResult<Vec<Share>> {
        sqlx::query_as::<_, Share>("SELECT * FROM shares WHERE node_id = $1 ORDER BY id ASC")
            .bind(node_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list shares of node", e))
    }

    async fn get_by_target_exact(&self, target: &str) -> AppResult<Vec<Share>> {
        sqlx::query_as::<_, Share>("SELECT * FROM shares WHERE target = $1 ORDER BY id ASC")
            .bind(target)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list shares to target", e))
    }

    async fn get_by_target_group_prefix(&self, target: &str) -> AppResult<Vec<Share>> {
        sqlx::query_as::<_, Share>(
            "SELECT * FROM shares WHERE target = $1 OR starts_with(target, $1 || '.') \
             ORDER BY id ASC",
        )
        .bind(target)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list shares to group", e))
    }

    async fn delete_by_id(&self, id: ShareId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM shares WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete share", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_node_and_target(&self, node_id: NodeId, target: &str) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM shares WHERE node_id = $1 AND target = $2")
            .bind(node_id)
            .bind(target)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to unshare node", e))?;
        Ok(result.rows_affected())
    }

    async fn find_shared_roots(
        &self,
        suffix: &StoragePath,
        identity: &Identity,
    ) -> AppResult<Vec<Node>> {
        sqlx::query_as::<_, Node>(
            "SELECT n.* FROM nodes n \
             WHERE split_part(n.path, '/', 2) = 'files' \
               AND right(n.path, char_length($1) + 1) = '/' || $1 \
               AND EXISTS ( \
                   SELECT 1 FROM shares s WHERE s.node_id = n.id AND ( \
                       (s.target = $2 AND s.share_type <> $4) \
                       OR (s.share_type = $5 AND s.target = ANY($3)))) \
             ORDER BY n.id ASC",
        )
        .bind(suffix.to_string())
        .bind(&identity.username)
        .bind(identity.group_targets())
        .bind(ShareType::Link)
        .bind(ShareType::Group)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to search share roots", e))
    }
}
