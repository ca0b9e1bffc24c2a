//! UI-facing state and events
//!
//! The orchestrator publishes two things for a UI layer:
//!
//! - a [`CallView`] snapshot through a `tokio::sync::watch` channel, always
//!   holding the latest state a call screen needs to render, and
//! - a stream of [`CallEvent`]s through a `tokio::sync::broadcast` channel,
//!   for things that happen once (an incoming call, a notice to show).

use rtcall_session_core::{EndReason, SessionId, SessionState};
use rtcall_signal_core::{MediaKind, PeerId};
use std::fmt;

/// The call currently on screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveCallView {
    pub session_id: SessionId,
    pub peer_id: PeerId,
    pub display_name: String,
    pub media_kind: MediaKind,
    pub is_incoming: bool,
    pub state: SessionState,
    /// Human readable status line ("Calling...", "Connected", ...)
    pub status: String,
}

/// A ringing call waiting for the user to accept or reject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingCallView {
    pub session_id: SessionId,
    pub peer_id: PeerId,
    pub display_name: String,
    pub media_kind: MediaKind,
}

/// Everything a call screen renders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallView {
    pub active_call: Option<ActiveCallView>,
    pub incoming_call: Option<IncomingCallView>,
    pub is_muted: bool,
    pub is_video_on: bool,
    pub is_speaker_on: bool,
    pub history_loading: bool,
}

impl Default for CallView {
    fn default() -> Self {
        Self {
            active_call: None,
            incoming_call: None,
            is_muted: false,
            is_video_on: true,
            is_speaker_on: false,
            history_loading: false,
        }
    }
}

impl CallView {
    /// Whether any call, ringing or active, is shown
    pub fn has_call(&self) -> bool {
        self.active_call.is_some() || self.incoming_call.is_some()
    }
}

/// How prominently a notice should be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// User-visible message about something that went wrong or is not possible
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallNotice {
    /// Starting a call failed because of the camera or microphone
    StartFailed { reason: String },
    /// Accepting a call failed because of the camera or microphone
    AcceptFailed { reason: String },
    /// The peer engine failed during setup
    SetupFailed { reason: String },
    /// An established or connecting call lost its connection for good
    ConnectionFailed { peer_id: PeerId },
    /// The callee is in another call
    PeerBusy { peer_id: PeerId },
    /// Nobody answered in time
    NoAnswer { peer_id: PeerId },
    /// The platform cannot route audio to a chosen output
    SpeakerUnsupported,
    /// Switching the output device failed
    OutputRoutingFailed { reason: String },
    /// Reading or writing the call history failed
    HistoryUnavailable { reason: String },
}

impl CallNotice {
    pub fn level(&self) -> NoticeLevel {
        match self {
            CallNotice::SpeakerUnsupported | CallNotice::PeerBusy { .. } | CallNotice::NoAnswer { .. } => {
                NoticeLevel::Info
            }
            _ => NoticeLevel::Error,
        }
    }
}

impl fmt::Display for CallNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallNotice::StartFailed { .. } => {
                write!(f, "Could not start the call. Check camera and microphone permissions.")
            }
            CallNotice::AcceptFailed { .. } => {
                write!(f, "Could not accept the call. Check camera and microphone permissions.")
            }
            CallNotice::SetupFailed { .. } => write!(f, "Could not set up the call."),
            CallNotice::ConnectionFailed { .. } => write!(f, "Call connection failed."),
            CallNotice::PeerBusy { peer_id } => write!(f, "{} is busy.", peer_id),
            CallNotice::NoAnswer { peer_id } => write!(f, "{} did not answer.", peer_id),
            CallNotice::SpeakerUnsupported => {
                write!(f, "Switching the audio output device is not supported on this platform.")
            }
            CallNotice::OutputRoutingFailed { .. } => write!(f, "Could not switch the audio device."),
            CallNotice::HistoryUnavailable { .. } => write!(f, "Call history is unavailable."),
        }
    }
}

/// One-off events for the UI layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    /// A call from a known peer is ringing
    IncomingCall {
        session_id: SessionId,
        peer_id: PeerId,
        display_name: String,
        media_kind: MediaKind,
    },
    StateChanged {
        session_id: SessionId,
        from: SessionState,
        to: SessionState,
    },
    /// The session is gone and its resources are released
    CallEnded {
        session_id: SessionId,
        peer_id: PeerId,
        final_state: SessionState,
        reason: EndReason,
    },
    Notice(CallNotice),
    /// The cached call history changed
    HistoryChanged,
}
