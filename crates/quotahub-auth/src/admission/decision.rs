//! Outcome of an admission attempt.

use quotahub_core::error::AppError;
use quotahub_entity::session::DeviceSession;

use super::DEVICE_LIMIT_MESSAGE;

/// Result of attempting to admit a device.
#[derive(Debug, Clone)]
pub enum AdmissionDecision {
    /// The device is bound to the new connection.
    Admitted {
        /// The registry row now bound to the connection.
        session: DeviceSession,
        /// Whether the device already held a row (reconnect).
        reconnect: bool,
    },
    /// Admission was denied and nothing was written.
    Rejected {
        /// Distinct devices holding rows at decision time.
        active_devices: usize,
        /// The plan's device limit.
        max_devices: u32,
    },
}

impl AdmissionDecision {
    /// Whether the connection was admitted.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }

    /// Converts a rejection into a `DeviceLimit` error.
    pub fn into_result(self) -> Result<DeviceSession, AppError> {
        match self {
            Self::Admitted { session, .. } => Ok(session),
            Self::Rejected { .. } => Err(AppError::device_limit(DEVICE_LIMIT_MESSAGE)),
        }
    }
}
