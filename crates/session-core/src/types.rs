//! Core types for the peer session layer

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Generation token of one call attempt
///
/// Every async completion and engine event carries the id of the session it
/// was started for; a mismatch means the session it belonged to is gone.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Who initiated the call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Outgoing,
    Incoming,
}

/// How a call attempt is written to the call history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordDirection {
    Outgoing,
    Incoming,
    Missed,
}

impl fmt::Display for RecordDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordDirection::Outgoing => write!(f, "outgoing"),
            RecordDirection::Incoming => write!(f, "incoming"),
            RecordDirection::Missed => write!(f, "missed"),
        }
    }
}

/// Lifecycle state of a call session
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum SessionState {
    /// No call in progress
    Idle,
    /// Outgoing call, offer created or sent, waiting for the answer
    Offering,
    /// Incoming offer is ringing locally
    RingingLocal,
    /// Incoming call accepted, answer being produced
    Answering,
    /// Offer and answer exchanged, connectivity checks running
    Connecting,
    /// Media is flowing
    Connected,
    /// Connectivity lost, the engine is trying to recover
    Reconnecting,
    /// Call finished normally
    Ended,
    /// Call finished because of an unrecoverable failure
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Ended | SessionState::Failed)
    }

    /// Whether this state belongs to a live call
    pub fn is_active(&self) -> bool {
        !self.is_terminal() && *self != SessionState::Idle
    }

    /// Status line shown while the session is in this state
    pub fn status_text(&self) -> &'static str {
        match self {
            SessionState::Idle => "",
            SessionState::Offering => "Calling...",
            SessionState::RingingLocal => "Ringing",
            SessionState::Answering | SessionState::Connecting => "Connecting...",
            SessionState::Connected => "Connected",
            SessionState::Reconnecting => "Reconnecting...",
            SessionState::Ended => "Call ended",
            SessionState::Failed => "Call failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// Local user hung up
    LocalHangUp,
    /// Local user declined the incoming call
    Rejected,
    /// Peer hung up
    RemoteHangUp,
    /// Peer is already in another call
    Busy,
    /// Incoming call was not answered in time
    RingTimeout,
    /// Outgoing call was not answered in time
    AnswerTimeout,
    /// Local capture could not be started
    MediaUnavailable(String),
    /// The engine gave up on the connection
    ConnectionFailed,
    /// Negotiation could not be completed locally
    SetupFailed(String),
    /// The signed-in identity went away
    SignedOut,
}

impl EndReason {
    /// Whether the session should finish in [`SessionState::Failed`]
    pub fn is_failure(&self) -> bool {
        matches!(self, EndReason::ConnectionFailed | EndReason::SetupFailed(_))
    }

    pub fn final_state(&self) -> SessionState {
        if self.is_failure() {
            SessionState::Failed
        } else {
            SessionState::Ended
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::LocalHangUp => write!(f, "local hang-up"),
            EndReason::Rejected => write!(f, "rejected"),
            EndReason::RemoteHangUp => write!(f, "remote hang-up"),
            EndReason::Busy => write!(f, "peer busy"),
            EndReason::RingTimeout => write!(f, "ring timeout"),
            EndReason::AnswerTimeout => write!(f, "answer timeout"),
            EndReason::MediaUnavailable(reason) => write!(f, "media unavailable: {}", reason),
            EndReason::ConnectionFailed => write!(f, "connection failed"),
            EndReason::SetupFailed(reason) => write!(f, "setup failed: {}", reason),
            EndReason::SignedOut => write!(f, "signed out"),
        }
    }
}

/// What to do with an offer that arrives while another call is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlarePolicy {
    /// Ignore the offer; the offerer gets no response
    #[default]
    Drop,
    /// Tell the offerer we are busy
    RespondBusy,
}

/// Connection state reported by the peer engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// One STUN or TURN server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    pub fn turn(
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            urls: vec![url.into()],
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }
}

/// Connectivity configuration handed to the engine for each connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceConfig {
    pub ice_servers: Vec<IceServer>,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![
                IceServer::stun("stun:stun.l.google.com:19302"),
                IceServer::stun("stun:stun1.l.google.com:19302"),
                IceServer::turn(
                    "turn:openrelay.metered.ca:80",
                    "openrelayproject",
                    "openrelayproject",
                ),
            ],
        }
    }
}
