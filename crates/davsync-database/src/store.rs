//! Store traits.
//!
//! One trait per table family so adapters can depend on exactly what they
//! touch. Errors are opaque [`AppError`]s of kind `Database`, except where a
//! method documents another kind.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use davsync_core::result::AppResult;
use davsync_core::types::id::{NodeId, ShareId};
use davsync_core::types::identity::Identity;
use davsync_core::types::path::StoragePath;
use davsync_entity::{CreateShare, Node, Share, ShareType, TrashNode};

use crate::memory::MemoryStore;

/// Path-keyed node records.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Node stored at exactly `path`.
    async fn get(&self, path: &StoragePath) -> AppResult<Option<Node>>;

    /// Whether a node is stored at exactly `path`.
    async fn exists(&self, path: &StoragePath) -> AppResult<bool> {
        Ok(self.get(path).await?.is_some())
    }

    /// Insert a node. Fails with `Conflict` when the path is taken.
    async fn save(
        &self,
        path: &StoragePath,
        owner: &str,
        is_dir: bool,
        mime_type: &str,
    ) -> AppResult<Node>;

    /// Delete `path` and every node below it, together with the shares,
    /// trash links and favorites referencing them. Returns removed nodes.
    async fn delete_by_prefix(&self, path: &StoragePath) -> AppResult<u64>;

    /// Re-path exactly one node. Fails when no row (or more than one) moved.
    async fn move_node(&self, old_path: &StoragePath, new_path: &StoragePath) -> AppResult<()>;

    /// Like [`move_node`](Self::move_node) and also hand the node to
    /// `new_owner`.
    async fn transfer(
        &self,
        old_path: &StoragePath,
        new_path: &StoragePath,
        new_owner: &str,
    ) -> AppResult<()>;

    /// Nodes of `owner` whose path ends with the segments of `name`,
    /// ordered by ascending node id.
    ///
    /// Matching is on whole trailing segments: `a/report.txt` matches
    /// `alice/files/a/report.txt` but not `alice/files/a/my-report.txt`.
    /// A path equal to `name` is a match too.
    async fn find_by_name_suffix(&self, name: &StoragePath, owner: &str) -> AppResult<Vec<Node>>;

    /// Node by id.
    async fn find_by_id(&self, id: NodeId) -> AppResult<Option<Node>>;
}

/// Share grants.
#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Record a new grant.
    async fn create(&self, share: &CreateShare) -> AppResult<Share>;

    /// Every grant on one node, oldest first.
    async fn get_by_node(&self, node_id: NodeId) -> AppResult<Vec<Share>>;

    /// Grants whose target is exactly `target`, oldest first.
    async fn get_by_target_exact(&self, target: &str) -> AppResult<Vec<Share>>;

    /// Grants addressed to `target` or any `target.*` suborganization.
    async fn get_by_target_group_prefix(&self, target: &str) -> AppResult<Vec<Share>>;

    /// Delete one grant. Returns whether it existed.
    async fn delete_by_id(&self, id: ShareId) -> AppResult<bool>;

    /// Delete the grants of `node_id` addressed to `target`.
    async fn delete_by_node_and_target(&self, node_id: NodeId, target: &str) -> AppResult<u64>;

    /// Live nodes (below some `<owner>/files`) whose path ends with the
    /// segments of `suffix` and that are shared to `identity`, ordered by
    /// node id.
    async fn find_shared_roots(
        &self,
        suffix: &StoragePath,
        identity: &Identity,
    ) -> AppResult<Vec<Node>>;

    /// Every grant reaching `identity`, one per node.
    ///
    /// Personal grants (exact username, links excluded) come first. Group
    /// grants follow, fetched per top-level organization of the caller and
    /// kept when their target is one of the caller's organizations or a
    /// dotted ancestor of one. A group grant for a node already listed is
    /// dropped, so a personal grant always wins.
    async fn get_all_effective(&self, identity: &Identity) -> AppResult<Vec<Share>> {
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut effective = Vec::new();

        for share in self.get_by_target_exact(&identity.username).await? {
            if share.share_type != ShareType::Link && seen.insert(share.node_id) {
                effective.push(share);
            }
        }

        for root in identity.group_roots() {
            for share in self.get_by_target_group_prefix(&root).await? {
                if share.share_type == ShareType::Group
                    && identity.is_member_of(&share.target)
                    && seen.insert(share.node_id)
                {
                    effective.push(share);
                }
            }
        }

        Ok(effective)
    }
}

/// Links from trashed nodes to their original location.
#[async_trait]
pub trait TrashStore: Send + Sync {
    /// Record where a node lived before being trashed. Replaces an older
    /// link of the same node.
    async fn create(&self, trash: &TrashNode) -> AppResult<()>;

    /// Link of the node currently stored at `current_path`.
    async fn get(&self, current_path: &StoragePath) -> AppResult<Option<TrashNode>>;

    /// Forget the link of `node_id`.
    async fn delete(&self, node_id: NodeId) -> AppResult<()>;
}

/// Per-user favorite markers. Every operation is idempotent.
#[async_trait]
pub trait FavoriteStore: Send + Sync {
    /// Mark the node at `path` as a favorite of `username`.
    async fn mark(&self, path: &StoragePath, username: &str) -> AppResult<()>;

    /// Remove the marker, if any.
    async fn unmark(&self, path: &StoragePath, username: &str) -> AppResult<()>;

    /// Whether `username` favorited `node_id`.
    async fn is_favorite(&self, node_id: NodeId, username: &str) -> AppResult<bool>;

    /// Nodes favorited by `username`, ordered by node id.
    async fn list(&self, username: &str) -> AppResult<Vec<Node>>;
}

/// Key/value settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Value of `key`.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Insert or overwrite `key`.
    async fn set(&self, key: &str, value: &str) -> AppResult<()>;
}

/// Store handles injected into every component that needs metadata.
#[derive(Clone)]
pub struct Stores {
    /// Node records.
    pub nodes: Arc<dyn NodeStore>,
    /// Share grants.
    pub shares: Arc<dyn ShareStore>,
    /// Trash links.
    pub trash: Arc<dyn TrashStore>,
    /// Favorites.
    pub favorites: Arc<dyn FavoriteStore>,
    /// Settings.
    pub settings: Arc<dyn SettingsStore>,
}

impl Stores {
    /// Every handle backed by one shared in-memory store.
    pub fn memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::new()))
    }

    /// Every handle backed by `store`.
    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            nodes: store.clone(),
            shares: store.clone(),
            trash: store.clone(),
            favorites: store.clone(),
            settings: store,
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
