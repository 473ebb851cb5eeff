//! Trash relocation, listing, restore and purge.
//!
//! Deleting is a move into `<owner>/files_trash`: every node of the subtree
//! gets a [`TrashNode`] link to where it lived and its record is re-pathed
//! into the trash before the backend moves the bytes. Restore walks the
//! links back; purge removes the bytes and the records for good.

use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use chrono::Utc;
use serde::Serialize;
use tracing;

use davsync_core::error::AppError;
use davsync_core::result::AppResult;
use davsync_core::types::identity::Identity;
use davsync_core::types::path::StoragePath;
use davsync_entity::TrashNode;

use crate::context::DavContext;
use crate::walk;

/// One row of a trash listing.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrashEntry {
    /// Always 0.
    pub etag: i64,
    /// Position in the listing.
    pub id: usize,
    /// Mime type of the node.
    pub mimetype: String,
    /// Modification time in milliseconds.
    pub mtime: i64,
    /// Name on disk.
    pub name: String,
    /// Always null.
    pub parent_id: Option<i64>,
    /// Always 1 (read).
    pub permissions: i32,
    /// Size of the entry itself.
    pub size: u64,
    /// `file` or `dir`.
    #[serde(rename = "type")]
    pub kind: String,
}

/// An item removed from or restored out of the trash.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TrashedItem {
    /// Name as requested.
    pub filename: String,
    /// Modification time in seconds.
    pub timestamp: String,
}

/// Re-path the subtree at `path` into its owner's trash and return the
/// trash location of its root. Only metadata moves; the caller has the
/// backend move the bytes.
///
/// The root lands below the deepest directory already present in the trash
/// that matches a trailing part of its original parent, or directly in the
/// trash root. An occupied destination gets a `.d<unix seconds>` suffix,
/// counting the seconds up until a free name is found.
pub async fn relocate_to_trash(ctx: &DavContext, path: &StoragePath) -> AppResult<StoragePath> {
    let owner = path
        .owner()
        .ok_or_else(|| AppError::conflict("Cannot trash the DAV root"))?;
    let home = StoragePath::home(owner);
    let trash_root = StoragePath::trash_root(owner);
    let relative = path
        .strip_prefix(&home)
        .filter(|r| !r.is_root())
        .ok_or_else(|| AppError::conflict(format!("'{path}' cannot be trashed")))?;
    let leaf = relative.leaf().unwrap_or_default();

    let mut trash_parent = trash_root.clone();
    if let Some(parent) = relative.parent() {
        for candidate in parent.suffixes() {
            let existing = trash_root.join(&candidate);
            if ctx.stores.nodes.exists(&existing).await? {
                trash_parent = existing;
                break;
            }
        }
    }

    let destination = free_trash_slot(ctx, &trash_parent, leaf).await?;

    for entry in walk::subtree(&ctx.dav_root, path).await? {
        let Some(node) = ctx.stores.nodes.get(&entry.path).await? else {
            tracing::warn!("'{}' is on disk but has no node record, skipping", entry.path);
            continue;
        };
        let rest = entry.path.strip_prefix(path).unwrap_or_default();
        ctx.stores
            .trash
            .create(&TrashNode {
                node_id: node.id,
                owner: node.owner.clone(),
                path: node.path.clone(),
                is_dir: node.is_dir,
            })
            .await?;
        ctx.stores
            .nodes
            .move_node(&entry.path, &destination.join(&rest))
            .await?;
    }

    Ok(destination)
}

const MAX_SUFFIX_ATTEMPTS: i64 = 1000;

/// First unused name for `leaf` below `parent`: the leaf itself, then
/// `<leaf>.d<secs>`, `<leaf>.d<secs + 1>` and so on.
async fn free_trash_slot(
    ctx: &DavContext,
    parent: &StoragePath,
    leaf: &str,
) -> AppResult<StoragePath> {
    let plain = parent.child(leaf);
    if !is_occupied(ctx, &plain).await? {
        return Ok(plain);
    }
    let now = Utc::now().timestamp();
    for offset in 0..MAX_SUFFIX_ATTEMPTS {
        let candidate = parent.child(&format!("{leaf}.d{}", now + offset));
        if !is_occupied(ctx, &candidate).await? {
            return Ok(candidate);
        }
    }
    Err(AppError::conflict(format!(
        "No free trash name for '{leaf}' below '{parent}'"
    )))
}

async fn is_occupied(ctx: &DavContext, path: &StoragePath) -> AppResult<bool> {
    Ok(ctx.stores.nodes.exists(path).await?
        || tokio::fs::try_exists(ctx.fs_path(path)).await?)
}

/// Drop the `.d<digits>` suffix the web UI appends to trashed names.
pub fn strip_deletion_suffix(name: &str) -> &str {
    match name.rfind(".d") {
        Some(idx)
            if idx > 0
                && name.len() > idx + 2
                && name[idx + 2..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            &name[..idx]
        }
        _ => name,
    }
}

/// Trash operations of one user.
pub struct TrashBin<'a> {
    ctx: &'a DavContext,
    identity: &'a Identity,
}

impl<'a> TrashBin<'a> {
    /// Trash of `identity`.
    pub fn new(ctx: &'a DavContext, identity: &'a Identity) -> Self {
        Self { ctx, identity }
    }

    fn root(&self) -> StoragePath {
        StoragePath::trash_root(&self.identity.username)
    }

    /// Storage path of a UI-addressed trash item. The name is used as given
    /// when it exists, otherwise without the UI's deletion suffix.
    pub async fn locate(&self, dir: &StoragePath, name: &str) -> AppResult<StoragePath> {
        let dir = self.locate_dir(dir).await?;
        let exact = dir.try_child(name)?;
        if tokio::fs::try_exists(self.ctx.fs_path(&exact)).await? {
            return Ok(exact);
        }
        dir.try_child(strip_deletion_suffix(name))
    }

    /// Physical location of `item`, checked to lie strictly inside this
    /// trash once symlinks are resolved.
    async fn contained(&self, item: &StoragePath) -> AppResult<PathBuf> {
        let root = self.root();
        if !item.starts_with(&root) || item == &root {
            return Err(AppError::validation(format!("'{item}' is not a trash item")));
        }
        let physical = self.ctx.fs_path(item);
        let trash_dir = tokio::fs::canonicalize(self.ctx.fs_path(&root)).await?;
        let canonical = tokio::fs::canonicalize(&physical)
            .await
            .map_err(|e| AppError::not_found(format!("'{item}' is not in the trash: {e}")))?;
        if canonical == trash_dir || !canonical.starts_with(&trash_dir) {
            tracing::warn!(
                "{} addressed '{}' which resolves outside the trash",
                self.identity.username,
                item
            );
            return Err(AppError::validation(format!("'{item}' is not a trash item")));
        }
        Ok(physical)
    }

    async fn locate_dir(&self, dir: &StoragePath) -> AppResult<StoragePath> {
        let exact = self.root().join(dir);
        if dir.is_root() || tokio::fs::try_exists(self.ctx.fs_path(&exact)).await? {
            return Ok(exact);
        }
        let mut segments: Vec<String> = dir.segments().to_vec();
        segments[0] = strip_deletion_suffix(&segments[0]).to_string();
        Ok(self.root().join(&StoragePath::from_segments(segments)?))
    }

    /// Entries directly below `dir` (relative to the trash root).
    pub async fn list(&self, dir: &StoragePath) -> AppResult<Vec<TrashEntry>> {
        let base = self.locate_dir(dir).await?;
        let mut reader = tokio::fs::read_dir(self.ctx.fs_path(&base))
            .await
            .map_err(|e| AppError::not_found(format!("Trash directory '{base}': {e}")))?;

        let mut raw = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            raw.push(entry);
        }
        raw.sort_by_key(|e| e.file_name());

        let mut entries = Vec::new();
        for entry in raw {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = base.child(&name);
            let Some(node) = self.ctx.stores.nodes.get(&path).await? else {
                tracing::error!("'{}' is in the trash but has no node record", path);
                continue;
            };
            let metadata = entry.metadata().await?;
            entries.push(TrashEntry {
                etag: 0,
                id: entries.len(),
                mimetype: node.mime_type,
                mtime: modified_seconds(&metadata) * 1000,
                name,
                parent_id: None,
                permissions: 1,
                size: metadata.len(),
                kind: if metadata.is_dir() { "dir" } else { "file" }.to_string(),
            });
        }
        Ok(entries)
    }

    /// Put a trashed item back where it came from, or below the nearest
    /// ancestor that still exists. Returns the restored path.
    pub async fn restore(&self, item: &StoragePath) -> AppResult<StoragePath> {
        let nodes = &self.ctx.stores.nodes;
        let trash = &self.ctx.stores.trash;
        self.contained(item).await?;

        let link = trash
            .get(item)
            .await?
            .ok_or_else(|| AppError::not_found(format!("'{item}' has no restore information")))?;
        let original = StoragePath::parse(&link.path)?;
        let leaf = original
            .leaf()
            .ok_or_else(|| AppError::internal(format!("Empty original path for '{item}'")))?;

        let home = StoragePath::home(&self.identity.username);
        let mut parent = original
            .parent()
            .filter(|p| p.starts_with(&home))
            .unwrap_or_else(|| home.clone());
        while parent != home && !nodes.exists(&parent).await? {
            parent = parent.parent().unwrap_or_else(|| home.clone());
        }
        let destination = parent.child(leaf);
        if nodes.exists(&destination).await?
            || tokio::fs::try_exists(self.ctx.fs_path(&destination)).await?
        {
            return Err(AppError::conflict(format!("'{destination}' already exists")));
        }

        for entry in walk::subtree(&self.ctx.dav_root, item).await? {
            let Some(node) = nodes.get(&entry.path).await? else {
                tracing::warn!("'{}' is in the trash but has no node record", entry.path);
                continue;
            };
            let rest = entry.path.strip_prefix(item).unwrap_or_default();
            nodes.move_node(&entry.path, &destination.join(&rest)).await?;
            trash.delete(node.id).await?;
        }

        tokio::fs::rename(self.ctx.fs_path(item), self.ctx.fs_path(&destination)).await?;
        tracing::info!("Restored '{}' to '{}'", item, destination);
        Ok(destination)
    }

    /// Remove a trashed item permanently. Returns its modification time.
    pub async fn purge(&self, item: &StoragePath) -> AppResult<i64> {
        let physical = self.contained(item).await?;
        let metadata = tokio::fs::symlink_metadata(&physical)
            .await
            .map_err(|e| AppError::not_found(format!("'{item}' is not in the trash: {e}")))?;

        if metadata.is_dir() {
            tokio::fs::remove_dir_all(&physical).await?;
        } else {
            tokio::fs::remove_file(&physical).await?;
        }
        let removed = self.ctx.stores.nodes.delete_by_prefix(item).await?;
        tracing::info!("Purged '{}' from the trash ({} nodes)", item, removed);
        Ok(modified_seconds(&metadata))
    }

    /// Names directly below `dir` (relative to the trash root).
    pub async fn names(&self, dir: &StoragePath) -> AppResult<Vec<String>> {
        let base = self.locate_dir(dir).await?;
        let mut reader = tokio::fs::read_dir(self.ctx.fs_path(&base)).await?;
        let mut names = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// Modification time of a trash item in seconds.
    pub async fn timestamp(&self, item: &StoragePath) -> AppResult<i64> {
        let metadata = tokio::fs::metadata(self.ctx.fs_path(item))
            .await
            .map_err(|e| AppError::not_found(format!("'{item}' is not in the trash: {e}")))?;
        Ok(modified_seconds(&metadata))
    }
}

fn modified_seconds(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
