//! Session token → caller [`Identity`].
//!
//! The identity provider issues a signed JWT carried either in the session
//! cookie or as a Bearer token. Anything missing, malformed or expired
//! decodes to the zero-value identity; the dispatcher answers 401 for it.

use http::HeaderMap;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use tracing;

use davsync_core::config::AuthConfig;
use davsync_core::error::AppError;
use davsync_core::types::identity::Identity;

/// Scope prefix naming an organization membership.
const MEMBER_OF_SCOPE: &str = "user:memberof:";

/// Claims carried by a session token.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionClaims {
    /// Login name.
    pub username: String,
    /// Expiry (seconds since the epoch).
    pub exp: u64,
    /// Granted scopes; `user:memberof:<org>` entries are memberships.
    #[serde(default)]
    pub scope: Vec<String>,
    /// Memberships listed directly.
    #[serde(default)]
    pub organizations: Vec<String>,
}

impl SessionClaims {
    /// Flatten the claims into an [`Identity`].
    pub fn into_identity(self) -> Identity {
        let mut organizations: Vec<String> = Vec::new();
        let from_scope = self
            .scope
            .iter()
            .filter_map(|s| s.strip_prefix(MEMBER_OF_SCOPE))
            .map(str::to_string);
        for org in from_scope.chain(self.organizations) {
            if !org.is_empty() && !organizations.contains(&org) {
                organizations.push(org);
            }
        }
        Identity::new(self.username, organizations)
    }
}

/// Verifies session tokens.
pub struct SessionDecoder {
    key: DecodingKey,
    validation: Validation,
    cookie_name: String,
}

impl SessionDecoder {
    /// Build a decoder from the auth configuration.
    pub fn new(config: &AuthConfig) -> Result<Self, AppError> {
        let algorithm: Algorithm = config.jwt_algorithm.parse().map_err(|_| {
            AppError::configuration(format!(
                "Unsupported JWT algorithm '{}'",
                config.jwt_algorithm
            ))
        })?;

        let key = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                DecodingKey::from_secret(config.jwt_secret.as_bytes())
            }
            Algorithm::ES256 | Algorithm::ES384 => {
                DecodingKey::from_ec_pem(config.jwt_public_key.as_bytes()).map_err(|e| {
                    AppError::configuration(format!("Invalid EC public key: {e}"))
                })?
            }
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => {
                DecodingKey::from_rsa_pem(config.jwt_public_key.as_bytes()).map_err(|e| {
                    AppError::configuration(format!("Invalid RSA public key: {e}"))
                })?
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unsupported JWT algorithm '{other:?}'"
                )));
            }
        };

        let mut validation = Validation::new(algorithm);
        validation.leeway = config.leeway_seconds;

        Ok(Self {
            key,
            validation,
            cookie_name: config.session_cookie.clone(),
        })
    }

    /// Identity of the caller, or the zero value when there is no valid
    /// session.
    pub fn current_session(&self, headers: &HeaderMap) -> Identity {
        let Some(token) = self.extract_token(headers) else {
            return Identity::default();
        };
        match self.decode(&token) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::debug!("Rejected session token: {}", e);
                Identity::default()
            }
        }
    }

    /// Verify one token.
    pub fn decode(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<SessionClaims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        if data.claims.username.is_empty() {
            return Err(AuthError::MissingUsername);
        }
        Ok(data.claims.into_identity())
    }

    /// Token from the session cookie, falling back to a Bearer header.
    fn extract_token(&self, headers: &HeaderMap) -> Option<String> {
        let from_cookie = headers
            .get_all(http::header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie_name)
            .map(|(_, value)| value.trim_matches('"').to_string());

        from_cookie.or_else(|| {
            headers
                .get(http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| t.trim().to_string())
        })
    }
}

impl std::fmt::Debug for SessionDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDecoder")
            .field("algorithm", &self.validation.algorithms)
            .field("cookie_name", &self.cookie_name)
            .finish_non_exhaustive()
    }
}

/// Session verification errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Signature, expiry or format check failed
    #[error("Invalid session token: {0}")]
    InvalidToken(String),

    /// Token verified but names nobody
    #[error("Session token carries no username")]
    MissingUsername,
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        AppError::authentication(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims<'a> {
        username: &'a str,
        exp: u64,
        scope: Vec<&'a str>,
    }

    fn decoder() -> SessionDecoder {
        SessionDecoder::new(&AuthConfig {
            jwt_secret: "test-secret".to_string(),
            ..AuthConfig::default()
        })
        .unwrap()
    }

    fn token(username: &str, exp: u64, secret: &str) -> String {
        let claims = TestClaims {
            username,
            exp,
            scope: vec!["user:memberof:org.eng", "user:admin", "user:memberof:guild"],
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn future() -> u64 {
        (chrono::Utc::now().timestamp() + 3600) as u64
    }

    #[test]
    fn test_cookie_token_yields_identity() {
        let mut headers = HeaderMap::new();
        let cookie = format!("lang=en; session={}", token("bob", future(), "test-secret"));
        headers.insert(http::header::COOKIE, cookie.parse().unwrap());

        let identity = decoder().current_session(&headers);
        assert_eq!(identity.username, "bob");
        assert_eq!(identity.organizations, vec!["org.eng", "guild"]);
    }

    #[test]
    fn test_bearer_fallback() {
        let mut headers = HeaderMap::new();
        let value = format!("Bearer {}", token("carol", future(), "test-secret"));
        headers.insert(http::header::AUTHORIZATION, value.parse().unwrap());
        assert_eq!(decoder().current_session(&headers).username, "carol");
    }

    #[test]
    fn test_bad_signature_is_anonymous() {
        let mut headers = HeaderMap::new();
        let cookie = format!("session={}", token("bob", future(), "other-secret"));
        headers.insert(http::header::COOKIE, cookie.parse().unwrap());
        assert!(decoder().current_session(&headers).is_anonymous());
    }

    #[test]
    fn test_expired_is_anonymous() {
        let mut headers = HeaderMap::new();
        let cookie = format!("session={}", token("bob", 1_000, "test-secret"));
        headers.insert(http::header::COOKIE, cookie.parse().unwrap());
        assert!(decoder().current_session(&headers).is_anonymous());
    }

    #[test]
    fn test_missing_token_is_anonymous() {
        assert!(decoder().current_session(&HeaderMap::new()).is_anonymous());
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        let config = AuthConfig {
            jwt_algorithm: "XX999".to_string(),
            ..AuthConfig::default()
        };
        assert!(SessionDecoder::new(&config).is_err());
    }
}
