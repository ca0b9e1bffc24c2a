//! Error types for call orchestration
//!
//! Every public operation of the orchestrator returns [`CallResult`]. Lower
//! layer failures (media, engine, signaling) are folded into the variants a
//! UI can act on: ask for permissions again, pick another peer, or just show
//! the message.

use rtcall_media_core::MediaError;
use rtcall_session_core::{EngineError, SessionError};
use rtcall_signal_core::{PeerId, SignalError};
use thiserror::Error;

/// Result type for call operations
pub type CallResult<T> = Result<T, CallError>;

/// Errors surfaced by the call orchestrator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The user or the platform refused microphone or camera access
    #[error("Media access denied: {reason}")]
    MediaAccessDenied { reason: String },

    /// A required capture device does not exist
    #[error("Media device unavailable: {reason}")]
    MediaDeviceUnavailable { reason: String },

    /// The target is not a known user
    #[error("Unknown peer: {peer}")]
    PeerUnknown { peer: PeerId },

    /// A call is already in progress
    #[error("A call is already in progress")]
    AlreadyInCall,

    /// There is no ringing incoming call to act on
    #[error("No incoming call")]
    NoIncomingCall,

    /// The operation needs a signed-in identity
    #[error("Not signed in")]
    NotSignedIn,

    /// The call ended while the operation was still setting it up
    #[error("Call was ended before setup completed")]
    Cancelled,

    /// The peer engine failed to create or apply a description
    #[error("Call setup failed: {reason}")]
    Negotiation { reason: String },

    /// The platform cannot perform the operation
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// The call history store failed
    #[error("Call history error: {message}")]
    Storage { message: String },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The signaling transport failed
    #[error("Signaling error: {message}")]
    Signal { message: String },
}

impl CallError {
    pub fn negotiation(reason: impl Into<String>) -> Self {
        Self::Negotiation {
            reason: reason.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn signal(message: impl Into<String>) -> Self {
        Self::Signal {
            message: message.into(),
        }
    }

    pub fn peer_unknown(peer: &PeerId) -> Self {
        Self::PeerUnknown { peer: peer.clone() }
    }

    /// Whether the failure came from local media acquisition
    pub fn is_media_error(&self) -> bool {
        matches!(
            self,
            CallError::MediaAccessDenied { .. } | CallError::MediaDeviceUnavailable { .. }
        )
    }

    /// Whether retrying the same operation later could succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CallError::AlreadyInCall
                | CallError::Cancelled
                | CallError::Storage { .. }
                | CallError::Signal { .. }
        )
    }
}

impl From<MediaError> for CallError {
    fn from(error: MediaError) -> Self {
        match error {
            MediaError::AccessDenied { reason } => CallError::MediaAccessDenied { reason },
            MediaError::DeviceUnavailable { reason } => CallError::MediaDeviceUnavailable { reason },
            MediaError::Unsupported { operation } => CallError::Unsupported { operation },
            MediaError::Platform { message } => CallError::MediaDeviceUnavailable { reason: message },
        }
    }
}

impl From<EngineError> for CallError {
    fn from(error: EngineError) -> Self {
        CallError::negotiation(error.to_string())
    }
}

impl From<SessionError> for CallError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::Engine(e) => e.into(),
            SessionError::Media(e) => e.into(),
            SessionError::Stale { .. } => CallError::Cancelled,
            SessionError::InvalidState { .. } => CallError::negotiation(error.to_string()),
        }
    }
}

impl From<SignalError> for CallError {
    fn from(error: SignalError) -> Self {
        CallError::signal(error.to_string())
    }
}

impl From<serde_yaml::Error> for CallError {
    fn from(error: serde_yaml::Error) -> Self {
        CallError::config(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtcall_session_core::SessionId;

    #[test]
    fn test_media_errors_map_to_media_variants() {
        let denied: CallError = MediaError::access_denied("blocked").into();
        assert_eq!(
            denied,
            CallError::MediaAccessDenied {
                reason: "blocked".to_string()
            }
        );
        assert!(denied.is_media_error());

        let platform: CallError = MediaError::platform("driver crashed").into();
        assert!(matches!(platform, CallError::MediaDeviceUnavailable { .. }));
    }

    #[test]
    fn test_stale_session_maps_to_cancelled() {
        let err: CallError = SessionError::stale(SessionId::new()).into();
        assert_eq!(err, CallError::Cancelled);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_engine_errors_keep_their_message() {
        let err: CallError = SessionError::Engine(EngineError::negotiation("bad sdp")).into();
        assert_eq!(err.to_string(), "Call setup failed: Negotiation failed: bad sdp");
    }
}
