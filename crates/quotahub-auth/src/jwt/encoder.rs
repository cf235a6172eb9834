//! JWT token creation.
//!
//! Production tokens come from the identity service. The encoder exists for
//! operational tooling and tests and signs with the same secret.

use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};

use quotahub_core::config::AuthConfig;
use quotahub_core::error::AppError;
use quotahub_core::types::SubscriberId;

use super::claims::Claims;

/// Creates signed handshake tokens.
#[derive(Clone)]
pub struct JwtEncoder {
    /// HMAC secret key for signing.
    encoding_key: EncodingKey,
    /// Token TTL in hours.
    ttl_hours: i64,
}

impl std::fmt::Debug for JwtEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtEncoder")
            .field("ttl_hours", &self.ttl_hours)
            .finish()
    }
}

impl JwtEncoder {
    /// Creates a new encoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            ttl_hours: config.jwt_ttl_hours as i64,
        }
    }

    /// Signs a token for `subscriber_id`.
    pub fn issue(
        &self,
        subscriber_id: SubscriberId,
        email: Option<String>,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subscriber_id,
            email,
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.ttl_hours)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to sign token: {e}")))
    }
}
