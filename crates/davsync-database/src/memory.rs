//! In-process implementation of every store trait.
//!
//! Mirrors the PostgreSQL repositories closely enough for the WebDAV layer
//! to be tested without a database: ids are assigned in ascending order,
//! result sets are ordered by id, and deleting a node cascades into the
//! dependent collections the way the foreign keys do.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use davsync_core::error::AppError;
use davsync_core::result::AppResult;
use davsync_core::types::id::{NodeId, ShareId};
use davsync_core::types::identity::Identity;
use davsync_core::types::path::{FILES_DIR, StoragePath};
use davsync_entity::{CreateShare, Favorite, Node, Share, ShareType, TrashNode};

use crate::store::{FavoriteStore, NodeStore, SettingsStore, ShareStore, TrashStore};

#[derive(Debug, Default)]
struct MemoryState {
    next_node_id: i64,
    next_share_id: i64,
    nodes: BTreeMap<NodeId, Node>,
    shares: BTreeMap<ShareId, Share>,
    trash: BTreeMap<NodeId, TrashNode>,
    favorites: Vec<Favorite>,
    settings: HashMap<String, String>,
}

impl MemoryState {
    fn node_at(&self, path: &str) -> Option<&Node> {
        self.nodes.values().find(|n| n.path == path)
    }

    fn node_id_at(&self, path: &str) -> Option<NodeId> {
        self.node_at(path).map(|n| n.id)
    }

    fn repath(&mut self, old: &StoragePath, new: &StoragePath, owner: Option<&str>) -> AppResult<()> {
        let new_path = new.to_string();
        if self.node_at(&new_path).is_some() {
            return Err(AppError::conflict(format!(
                "Failed to move node: '{new_path}' already taken"
            )));
        }
        let old_path = old.to_string();
        let node = self
            .nodes
            .values_mut()
            .find(|n| n.path == old_path)
            .ok_or_else(|| {
                AppError::database(format!(
                    "Internal database error: moving '{old_path}' touched 0 rows"
                ))
            })?;
        node.path = new_path;
        if let Some(owner) = owner {
            node.owner = owner.to_string();
        }
        Ok(())
    }
}

/// Metadata store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn path_under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn get(&self, path: &StoragePath) -> AppResult<Option<Node>> {
        let state = self.state.read().await;
        Ok(state.node_at(&path.to_string()).cloned())
    }

    async fn save(
        &self,
        path: &StoragePath,
        owner: &str,
        is_dir: bool,
        mime_type: &str,
    ) -> AppResult<Node> {
        let mut state = self.state.write().await;
        let path = path.to_string();
        if state.node_at(&path).is_some() {
            return Err(AppError::conflict(format!(
                "Failed to save node: '{path}' already taken"
            )));
        }
        state.next_node_id += 1;
        let node = Node {
            id: NodeId(state.next_node_id),
            owner: owner.to_string(),
            path,
            is_dir,
            mime_type: mime_type.to_string(),
            deleted: false,
        };
        state.nodes.insert(node.id, node.clone());
        Ok(node)
    }

    async fn delete_by_prefix(&self, path: &StoragePath) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let prefix = path.to_string();
        let doomed: Vec<NodeId> = state
            .nodes
            .values()
            .filter(|n| path_under(&n.path, &prefix))
            .map(|n| n.id)
            .collect();

        for id in &doomed {
            state.nodes.remove(id);
            state.trash.remove(id);
        }
        state.shares.retain(|_, s| !doomed.contains(&s.node_id));
        state.favorites.retain(|f| !doomed.contains(&f.node_id));
        Ok(doomed.len() as u64)
    }

    async fn move_node(&self, old_path: &StoragePath, new_path: &StoragePath) -> AppResult<()> {
        self.state.write().await.repath(old_path, new_path, None)
    }

    async fn transfer(
        &self,
        old_path: &StoragePath,
        new_path: &StoragePath,
        new_owner: &str,
    ) -> AppResult<()> {
        self.state
            .write()
            .await
            .repath(old_path, new_path, Some(new_owner))
    }

    async fn find_by_name_suffix(&self, name: &StoragePath, owner: &str) -> AppResult<Vec<Node>> {
        let state = self.state.read().await;
        let mut found = Vec::new();
        // BTreeMap values come in id order.
        for node in state.nodes.values().filter(|n| n.owner == owner) {
            if node.storage_path()?.ends_with(name) {
                found.push(node.clone());
            }
        }
        Ok(found)
    }

    async fn find_by_id(&self, id: NodeId) -> AppResult<Option<Node>> {
        Ok(self.state.read().await.nodes.get(&id).cloned())
    }
}

#[async_trait]
impl ShareStore for MemoryStore {
    async fn create(&self, share: &CreateShare) -> AppResult<Share> {
        let mut state = self.state.write().await;
        if !state.nodes.contains_key(&share.node_id) {
            return Err(AppError::database(format!(
                "Failed to create share: node {} does not exist",
                share.node_id
            )));
        }
        state.next_share_id += 1;
        let created = Share {
            id: ShareId(state.next_share_id),
            node_id: share.node_id,
            target: share.target.clone(),
            permissions: share.permissions,
            share_type: share.share_type,
            created_at: Utc::now(),
        };
        state.shares.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_node(&self, node_id: NodeId) -> AppResult<Vec<Share>> {
        let state = self.state.read().await;
        Ok(state
            .shares
            .values()
            .filter(|s| s.node_id == node_id)
            .cloned()
            .collect())
    }

    async fn get_by_target_exact(&self, target: &str) -> AppResult<Vec<Share>> {
        let state = self.state.read().await;
        Ok(state
            .shares
            .values()
            .filter(|s| s.target == target)
            .cloned()
            .collect())
    }

    async fn get_by_target_group_prefix(&self, target: &str) -> AppResult<Vec<Share>> {
        let state = self.state.read().await;
        Ok(state
            .shares
            .values()
            .filter(|s| davsync_core::types::identity::group_covers(target, &s.target))
            .cloned()
            .collect())
    }

    async fn delete_by_id(&self, id: ShareId) -> AppResult<bool> {
        Ok(self.state.write().await.shares.remove(&id).is_some())
    }

    async fn delete_by_node_and_target(&self, node_id: NodeId, target: &str) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let before = state.shares.len();
        state
            .shares
            .retain(|_, s| !(s.node_id == node_id && s.target == target));
        Ok((before - state.shares.len()) as u64)
    }

    async fn find_shared_roots(
        &self,
        suffix: &StoragePath,
        identity: &Identity,
    ) -> AppResult<Vec<Node>> {
        let groups = identity.group_targets();
        let state = self.state.read().await;
        let mut found = Vec::new();
        for node in state.nodes.values() {
            let path = node.storage_path()?;
            let live = path.segments().get(1).is_some_and(|s| s == FILES_DIR);
            if !live || path.len() <= suffix.len() || !path.ends_with(suffix) {
                continue;
            }
            let shared = state.shares.values().any(|s| {
                s.node_id == node.id
                    && ((s.target == identity.username && s.share_type != ShareType::Link)
                        || (s.share_type == ShareType::Group && groups.contains(&s.target)))
            });
            if shared {
                found.push(node.clone());
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl TrashStore for MemoryStore {
    async fn create(&self, trash: &TrashNode) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.trash.insert(trash.node_id, trash.clone());
        Ok(())
    }

    async fn get(&self, current_path: &StoragePath) -> AppResult<Option<TrashNode>> {
        let state = self.state.read().await;
        Ok(state
            .node_id_at(&current_path.to_string())
            .and_then(|id| state.trash.get(&id).cloned()))
    }

    async fn delete(&self, node_id: NodeId) -> AppResult<()> {
        self.state.write().await.trash.remove(&node_id);
        Ok(())
    }
}

#[async_trait]
impl FavoriteStore for MemoryStore {
    async fn mark(&self, path: &StoragePath, username: &str) -> AppResult<()> {
        let mut state = self.state.write().await;
        if let Some(node_id) = state.node_id_at(&path.to_string()) {
            let favorite = Favorite {
                node_id,
                username: username.to_string(),
            };
            if !state.favorites.contains(&favorite) {
                state.favorites.push(favorite);
            }
        }
        Ok(())
    }

    async fn unmark(&self, path: &StoragePath, username: &str) -> AppResult<()> {
        let mut state = self.state.write().await;
        if let Some(node_id) = state.node_id_at(&path.to_string()) {
            state
                .favorites
                .retain(|f| !(f.node_id == node_id && f.username == username));
        }
        Ok(())
    }

    async fn is_favorite(&self, node_id: NodeId, username: &str) -> AppResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .favorites
            .iter()
            .any(|f| f.node_id == node_id && f.username == username))
    }

    async fn list(&self, username: &str) -> AppResult<Vec<Node>> {
        let state = self.state.read().await;
        Ok(state
            .nodes
            .values()
            .filter(|n| {
                state
                    .favorites
                    .iter()
                    .any(|f| f.node_id == n.id && f.username == username)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.state.read().await.settings.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.state
            .write()
            .await
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
