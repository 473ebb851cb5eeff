//! Node entity model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use davsync_core::error::AppError;
use davsync_core::types::id::NodeId;
use davsync_core::types::path::StoragePath;

/// Mime type recorded for every directory node.
pub const DIRECTORY_MIME_TYPE: &str = "httpd/unix-directory";

/// Metadata record for one file or directory on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Node {
    /// Stable surrogate key, reported to clients as `oc:fileid`.
    pub id: NodeId,
    /// Username owning the node.
    pub owner: String,
    /// Globally unique storage path, `<owner>/files/...`.
    pub path: String,
    /// Whether this node is a directory.
    pub is_dir: bool,
    /// Mime type (`httpd/unix-directory` for directories).
    pub mime_type: String,
    /// Soft-delete marker. Trash flows relocate instead of setting it.
    pub deleted: bool,
}

impl Node {
    /// The node path as a [`StoragePath`].
    pub fn storage_path(&self) -> Result<StoragePath, AppError> {
        StoragePath::parse(&self.path)
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}
