//! Typed identifiers.
//!
//! Subscribers, plans and session rows are keyed by random v4 UUIDs shared
//! with the identity store. Connection handles use v7 so that they sort by
//! creation time in logs and in the `device_sessions` table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident, $generate:path) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(transparent))]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh identifier.
            pub fn new() -> Self {
                Self($generate())
            }

            /// Wraps a UUID read from storage or a token.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// The raw UUID.
            pub fn into_uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

uuid_id!(
    /// Identifies a subscriber.
    SubscriberId,
    Uuid::new_v4
);

uuid_id!(
    /// Identifies a plan.
    PlanId,
    Uuid::new_v4
);

uuid_id!(
    /// Identifies a persisted device session row.
    SessionId,
    Uuid::new_v4
);

uuid_id!(
    /// Opaque handle of one live WebSocket connection.
    ConnectionId,
    Uuid::now_v7
);
