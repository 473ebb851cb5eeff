//! Session token verification configuration.

use serde::{Deserialize, Serialize};

/// How incoming session tokens are located and verified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Cookie carrying the signed session token.
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
    /// Signing algorithm: `"HS256"` (shared secret) or `"ES384"` (public key).
    #[serde(default = "default_algorithm")]
    pub jwt_algorithm: String,
    /// Shared secret for HMAC algorithms.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// PEM encoded public key for ECDSA algorithms.
    #[serde(default)]
    pub jwt_public_key: String,
    /// Allowed clock skew when checking `exp`.
    #[serde(default = "default_leeway")]
    pub leeway_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_cookie: default_session_cookie(),
            jwt_algorithm: default_algorithm(),
            jwt_secret: default_jwt_secret(),
            jwt_public_key: String::new(),
            leeway_seconds: default_leeway(),
        }
    }
}

fn default_session_cookie() -> String {
    "session".to_string()
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

fn default_jwt_secret() -> String {
    "CHANGE_ME_IN_PRODUCTION".to_string()
}

fn default_leeway() -> u64 {
    5
}
