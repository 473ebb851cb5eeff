//! Trash link model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use davsync_core::types::id::NodeId;

/// Pre-delete location of a node that currently lives in the trash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TrashNode {
    /// The trashed node.
    pub node_id: NodeId,
    /// Owner at the time of deletion.
    pub owner: String,
    /// Original storage path.
    pub path: String,
    /// Whether the node is a directory.
    pub is_dir: bool,
}
