//! Physical storage and WebDAV mount configuration.

use serde::{Deserialize, Serialize};

/// Where files live on disk and where the WebDAV tree is mounted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Physical root of every user tree. Always ends with `/` once loaded.
    ///
    /// Only used to seed the `DAV_ROOT` setting on first start; afterwards
    /// the persisted setting wins.
    #[serde(default = "default_dav_root")]
    pub dav_root: String,
    /// URL prefix the WebDAV tree is served under.
    #[serde(default = "default_webdav_prefix")]
    pub webdav_prefix: String,
}

impl StorageConfig {
    /// Apply the trailing-slash conventions of both fields.
    pub fn normalize(&mut self) {
        self.dav_root = normalize_dav_root(&self.dav_root);
        let prefix = self.webdav_prefix.trim_end_matches('/');
        self.webdav_prefix = if prefix.starts_with('/') {
            prefix.to_string()
        } else {
            format!("/{prefix}")
        };
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let mut config = Self {
            dav_root: default_dav_root(),
            webdav_prefix: default_webdav_prefix(),
        };
        config.normalize();
        config
    }
}

/// Ensure a DAV root carries exactly one trailing slash.
pub fn normalize_dav_root(raw: &str) -> String {
    format!("{}/", raw.trim_end_matches('/'))
}

fn default_dav_root() -> String {
    "./data/dav/".to_string()
}

fn default_webdav_prefix() -> String {
    "/remote.php/webdav".to_string()
}
