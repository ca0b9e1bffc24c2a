//! Error types for the peer session layer

use rtcall_media_core::MediaError;
use thiserror::Error;

use crate::types::{SessionId, SessionState};

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Failures reported by the peer engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine could not create a connection object
    #[error("Failed to create peer connection: {reason}")]
    ConnectionCreation { reason: String },

    /// Creating or applying a session description failed
    #[error("Negotiation failed: {reason}")]
    Negotiation { reason: String },

    /// A remote candidate was rejected
    #[error("Failed to apply ICE candidate: {reason}")]
    Candidate { reason: String },

    /// The connection was already closed
    #[error("Peer connection is closed")]
    Closed,
}

impl EngineError {
    pub fn negotiation(reason: impl Into<String>) -> Self {
        Self::Negotiation {
            reason: reason.into(),
        }
    }

    pub fn candidate(reason: impl Into<String>) -> Self {
        Self::Candidate {
            reason: reason.into(),
        }
    }

    pub fn connection_creation(reason: impl Into<String>) -> Self {
        Self::ConnectionCreation {
            reason: reason.into(),
        }
    }
}

/// Failures of a session-level operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    /// The session this operation belonged to has ended or been replaced
    #[error("Session {session_id} is no longer current")]
    Stale { session_id: SessionId },

    /// The session is not in a state that allows the operation
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        state: SessionState,
        operation: String,
    },
}

impl SessionError {
    pub fn stale(session_id: SessionId) -> Self {
        Self::Stale { session_id }
    }

    pub fn invalid_state(state: SessionState, operation: impl Into<String>) -> Self {
        Self::InvalidState {
            state,
            operation: operation.into(),
        }
    }

    /// Whether the failure only means the session went away meanwhile
    pub fn is_stale(&self) -> bool {
        matches!(self, SessionError::Stale { .. })
    }
}
