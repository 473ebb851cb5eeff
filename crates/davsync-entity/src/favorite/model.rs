//! Favorite model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use davsync_core::types::id::NodeId;

/// `username` marked `node_id` as a favorite.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct Favorite {
    /// The favorited node.
    pub node_id: NodeId,
    /// The user who favorited it.
    pub username: String,
}
