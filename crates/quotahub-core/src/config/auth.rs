//! Handshake credential configuration.

use serde::{Deserialize, Serialize};

/// Credential validation configuration.
///
/// Tokens are issued by the external identity service; this core only
/// verifies them, so the secret must match the issuer's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret key for JWT verification (HMAC-SHA256).
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Clock-skew leeway applied to `exp` checks, in seconds.
    #[serde(default = "default_leeway")]
    pub jwt_leeway_seconds: u64,
    /// Lifetime of tokens minted by the bundled encoder, in hours.
    #[serde(default = "default_ttl_hours")]
    pub jwt_ttl_hours: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            jwt_leeway_seconds: default_leeway(),
            jwt_ttl_hours: default_ttl_hours(),
        }
    }
}

fn default_jwt_secret() -> String {
    "CHANGE_ME_IN_PRODUCTION".to_string()
}

fn default_leeway() -> u64 {
    5
}

fn default_ttl_hours() -> u64 {
    240
}
