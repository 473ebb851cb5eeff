//! Share entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use davsync_core::types::id::{NodeId, ShareId};

/// Kind of grantee. The integer values are what sync clients see in
/// `oc:share-type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[repr(i32)]
#[serde(rename_all = "snake_case")]
pub enum ShareType {
    /// Shared with a single user.
    User = 0,
    /// Shared with a group and every dotted subgroup of it.
    Group = 1,
    /// Public link.
    Link = 3,
}

impl ShareType {
    /// Wire value.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// A grant of access to a node for a user or group target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Share {
    /// Unique share identifier.
    pub id: ShareId,
    /// The shared node.
    pub node_id: NodeId,
    /// Username or dotted group name.
    pub target: String,
    /// Product-specific permission bits.
    pub permissions: i32,
    /// Kind of grantee.
    pub share_type: ShareType,
    /// When the share was created.
    pub created_at: DateTime<Utc>,
}

/// Data required to create a new share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShare {
    /// The node to share.
    pub node_id: NodeId,
    /// Permission bits.
    pub permissions: i32,
    /// Username or group name.
    pub target: String,
    /// Kind of grantee.
    pub share_type: ShareType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_type_codes() {
        assert_eq!(ShareType::User.code(), 0);
        assert_eq!(ShareType::Group.code(), 1);
        assert_eq!(ShareType::Link.code(), 3);
    }
}
