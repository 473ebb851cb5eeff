//! Setting model and the well-known keys.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Physical filesystem root; always stored with a trailing slash.
pub const DAV_ROOT: &str = "DAV_ROOT";
/// Server version reported by `status.php`.
pub const VERSION: &str = "VERSION";

/// One row of the settings table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Setting {
    /// Setting name.
    pub key: String,
    /// Setting value.
    pub value: String,
}
