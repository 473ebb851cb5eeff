//! Client path → storage path, overlaying incoming shares.
//!
//! A client path is relative to the caller's home (`<user>/files`). When the
//! caller owns a node at that location it wins. Otherwise the resolver looks
//! for a *share root*: a live node shared to the caller whose path ends with
//! a leading fragment of the client path, trying the longest fragment first.
//! The part of the client path after the fragment is then appended to the
//! share root's storage path.

use tracing;

use davsync_core::error::AppError;
use davsync_core::result::AppResult;
use davsync_core::types::identity::Identity;
use davsync_core::types::path::StoragePath;
use davsync_database::{NodeStore, ShareStore};
use davsync_entity::Node;

/// Where a client subtree is mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// Client path of the mount point.
    pub client: StoragePath,
    /// Storage path the mount point maps to.
    pub storage: StoragePath,
}

impl Mount {
    /// Client path for a storage path inside this mount.
    pub fn client_path_for(&self, storage: &StoragePath) -> Option<StoragePath> {
        storage
            .strip_prefix(&self.storage)
            .map(|rest| self.client.join(&rest))
    }

    /// Storage path for a client path inside this mount.
    pub fn storage_path_for(&self, client: &StoragePath) -> Option<StoragePath> {
        client
            .strip_prefix(&self.client)
            .map(|rest| self.storage.join(&rest))
    }
}

/// Outcome of resolving one client path.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// Absolute storage path. Below a share root the node may not exist yet.
    pub path: StoragePath,
    /// The mount the path was resolved through.
    pub mount: Mount,
    /// The share root, when the path was reached through a share.
    pub share_root: Option<Node>,
}

impl Resolved {
    /// The caller's home directory.
    pub fn home(identity: &Identity) -> Self {
        let home = StoragePath::home(&identity.username);
        Self {
            path: home.clone(),
            mount: Mount {
                client: StoragePath::root(),
                storage: home,
            },
            share_root: None,
        }
    }

    /// Whether the path lies inside someone else's share.
    pub fn via_share(&self) -> bool {
        self.share_root.is_some()
    }

    /// Whether the path is the mount point of the share itself.
    pub fn is_share_mount(&self) -> bool {
        self.via_share() && self.path == self.mount.storage
    }

    /// Owner of the resolved storage path.
    pub fn owner(&self) -> &str {
        self.path.owner().unwrap_or_default()
    }
}

/// Resolves client paths for one caller at a time.
pub struct PathResolver<'a> {
    nodes: &'a dyn NodeStore,
    shares: &'a dyn ShareStore,
}

impl<'a> PathResolver<'a> {
    /// Create a resolver over the given stores.
    pub fn new(nodes: &'a dyn NodeStore, shares: &'a dyn ShareStore) -> Self {
        Self { nodes, shares }
    }

    /// Resolve `client` for `identity`, failing with `NotFound` when neither
    /// the caller's tree nor any share covers it.
    pub async fn resolve(&self, client: &StoragePath, identity: &Identity) -> AppResult<Resolved> {
        if client.is_root() {
            return Ok(Resolved::home(identity));
        }

        let home = StoragePath::home(&identity.username);
        let owned = home.join(client);
        if self.nodes.exists(&owned).await? {
            return Ok(Resolved {
                path: owned,
                mount: Mount {
                    client: StoragePath::root(),
                    storage: home,
                },
                share_root: None,
            });
        }

        for fragment in client.prefixes() {
            let Some(root) = self.share_root(&fragment, identity).await? else {
                continue;
            };
            let mount = Mount {
                client: fragment.clone(),
                storage: root.storage_path()?,
            };
            let path = mount.storage_path_for(client).ok_or_else(|| {
                AppError::internal(format!("'{client}' is not below '{fragment}'"))
            })?;
            tracing::debug!(
                "Resolved '{}' for {} through share root '{}'",
                client,
                identity.username,
                root.path
            );
            return Ok(Resolved {
                path,
                mount,
                share_root: Some(root),
            });
        }

        Err(AppError::not_found(format!(
            "'{client}' does not resolve for {}",
            identity.username
        )))
    }

    /// Resolve a path that is about to be created: the path itself when it
    /// resolves, otherwise the resolved parent with the leaf appended.
    pub async fn resolve_target(
        &self,
        client: &StoragePath,
        identity: &Identity,
    ) -> AppResult<Resolved> {
        match self.resolve(client, identity).await {
            Err(e) if e.is_not_found() => self.resolve_parent(client, identity).await,
            other => other,
        }
    }

    /// Resolve the parent of `client` and append its leaf. The leaf itself
    /// is never looked up, so a share mounted under the same name is not
    /// followed.
    pub async fn resolve_parent(
        &self,
        client: &StoragePath,
        identity: &Identity,
    ) -> AppResult<Resolved> {
        let (Some(parent), Some(leaf)) = (client.parent(), client.leaf()) else {
            return Ok(Resolved::home(identity));
        };
        let resolved = self.resolve(&parent, identity).await?;
        Ok(Resolved {
            path: resolved.path.try_child(leaf)?,
            ..resolved
        })
    }

    /// The share root whose path ends with `fragment`, if any. Several
    /// candidates are a collision: the lowest node id wins.
    async fn share_root(
        &self,
        fragment: &StoragePath,
        identity: &Identity,
    ) -> AppResult<Option<Node>> {
        let mut candidates = self.shares.find_shared_roots(fragment, identity).await?;
        if candidates.len() > 1 {
            tracing::warn!(
                "Shared folder collision for '{}' and user {}: {} candidates, using '{}'",
                fragment,
                identity.username,
                candidates.len(),
                candidates[0].path
            );
        }
        if candidates.is_empty() {
            return Ok(None);
        }
        Ok(Some(candidates.swap_remove(0)))
    }
}
