//! JWT claims carried by handshake tokens.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use quotahub_core::types::SubscriberId;

/// Claims payload of a handshake token.
///
/// Tokens minted by the identity service carry the subscriber under `id`;
/// `sub` is accepted as well.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the subscriber ID.
    #[serde(alias = "id")]
    pub sub: SubscriberId,
    /// Email at issuance, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issued-at timestamp (seconds since epoch).
    #[serde(default)]
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
}

impl Claims {
    /// Returns the subscriber ID from the subject claim.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.sub
    }

    /// Checks whether this token has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}
