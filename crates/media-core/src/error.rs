//! Error types for local media handling

use thiserror::Error;

/// Result type for media operations
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors raised while acquiring or routing local media
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// The user or the OS refused access to a capture device
    #[error("Media access denied: {reason}")]
    AccessDenied { reason: String },

    /// No device of the requested kind exists
    #[error("Media device unavailable: {reason}")]
    DeviceUnavailable { reason: String },

    /// The platform cannot perform the operation at all
    #[error("Unsupported media operation: {operation}")]
    Unsupported { operation: String },

    /// Any other failure reported by the device backend
    #[error("Media platform error: {message}")]
    Platform { message: String },
}

impl MediaError {
    pub fn access_denied(reason: impl Into<String>) -> Self {
        Self::AccessDenied {
            reason: reason.into(),
        }
    }

    pub fn device_unavailable(reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            reason: reason.into(),
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
        }
    }

    /// Whether the failure came from a permission decision
    pub fn is_permission_error(&self) -> bool {
        matches!(self, MediaError::AccessDenied { .. })
    }
}
