//! Events fed into the session state machine

use rtcall_signal_core::{IceCandidate, MediaKind, PeerId, SessionDescription};

use crate::state_table::EventType;
use crate::types::EndReason;

/// An input to [`PeerSessionController::handle_event`](crate::PeerSessionController::handle_event)
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Local user starts a call to `peer`
    StartOutgoing {
        local: PeerId,
        peer: PeerId,
        media_kind: MediaKind,
    },
    /// An offer addressed to `local` arrived from `from`
    ReceiveOffer {
        local: PeerId,
        from: PeerId,
        description: SessionDescription,
        media_kind: MediaKind,
    },
    /// Local user accepted the ringing call
    Accept,
    /// Local user declined the ringing call
    Reject,
    /// The engine produced our offer or answer
    LocalDescriptionReady { description: SessionDescription },
    ReceiveAnswer { description: SessionDescription },
    ReceiveCandidate { candidate: IceCandidate },
    EngineConnected,
    EngineDisconnected,
    EngineFailed,
    ReceiveHangUp,
    ReceiveBusy,
    LocalHangUp,
    RingTimeout,
    AnswerTimeout,
    /// Local capture could not be started
    MediaUnavailable { reason: String },
    /// Local negotiation step failed
    SetupFailed { reason: String },
    /// The signed-in identity went away mid-call
    SignedOut,
}

impl SessionEvent {
    /// Payload-free kind used for table lookup
    pub fn event_type(&self) -> EventType {
        match self {
            SessionEvent::StartOutgoing { .. } => EventType::StartOutgoing,
            SessionEvent::ReceiveOffer { .. } => EventType::ReceiveOffer,
            SessionEvent::Accept => EventType::Accept,
            SessionEvent::Reject => EventType::Reject,
            SessionEvent::LocalDescriptionReady { .. } => EventType::LocalDescriptionReady,
            SessionEvent::ReceiveAnswer { .. } => EventType::ReceiveAnswer,
            SessionEvent::ReceiveCandidate { .. } => EventType::ReceiveCandidate,
            SessionEvent::EngineConnected => EventType::EngineConnected,
            SessionEvent::EngineDisconnected => EventType::EngineDisconnected,
            SessionEvent::EngineFailed => EventType::EngineFailed,
            SessionEvent::ReceiveHangUp => EventType::ReceiveHangUp,
            SessionEvent::ReceiveBusy => EventType::ReceiveBusy,
            SessionEvent::LocalHangUp => EventType::LocalHangUp,
            SessionEvent::RingTimeout => EventType::RingTimeout,
            SessionEvent::AnswerTimeout => EventType::AnswerTimeout,
            SessionEvent::MediaUnavailable { .. } => EventType::MediaUnavailable,
            SessionEvent::SetupFailed { .. } => EventType::SetupFailed,
            SessionEvent::SignedOut => EventType::SignedOut,
        }
    }

    /// Reason recorded when this event ends the session
    pub fn end_reason(&self) -> EndReason {
        match self {
            SessionEvent::Reject => EndReason::Rejected,
            SessionEvent::ReceiveHangUp => EndReason::RemoteHangUp,
            SessionEvent::ReceiveBusy => EndReason::Busy,
            SessionEvent::RingTimeout => EndReason::RingTimeout,
            SessionEvent::AnswerTimeout => EndReason::AnswerTimeout,
            SessionEvent::EngineFailed => EndReason::ConnectionFailed,
            SessionEvent::MediaUnavailable { reason } => EndReason::MediaUnavailable(reason.clone()),
            SessionEvent::SetupFailed { reason } => EndReason::SetupFailed(reason.clone()),
            SessionEvent::SignedOut => EndReason::SignedOut,
            _ => EndReason::LocalHangUp,
        }
    }
}
