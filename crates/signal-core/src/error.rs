//! Error types for the signaling layer

use thiserror::Error;

/// Result type for signaling operations
pub type SignalResult<T> = Result<T, SignalError>;

/// Errors that can occur while encoding, decoding or moving signaling payloads
#[derive(Debug, Error)]
pub enum SignalError {
    /// Payload did not match any known signaling message shape
    #[error("Malformed signaling payload: {reason}")]
    MalformedPayload { reason: String },

    /// The underlying pub/sub primitive reported a failure
    #[error("Signal transport error: {message}")]
    Transport { message: String },

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SignalError {
    /// Create a malformed payload error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}
