//! Shared helpers for session-core integration tests

#![allow(dead_code)]

use std::sync::Arc;

use rtcall_session_core::{
    Dispatch, Effect, EngineEvent, EngineEventSink, PeerSessionController, SessionEvent,
    SessionId,
};
use rtcall_signal_core::{IceCandidate, MediaKind, PeerId, SessionDescription, SignalMessage};
use tokio::sync::mpsc;

pub fn alice() -> PeerId {
    PeerId::from("alice")
}

pub fn bob() -> PeerId {
    PeerId::from("bob")
}

pub fn candidate(n: usize) -> IceCandidate {
    IceCandidate::new(format!("candidate:{} 1 udp 2122260223 10.0.0.{} 9000 typ host", n, n))
}

pub fn start_outgoing(kind: MediaKind) -> SessionEvent {
    SessionEvent::StartOutgoing {
        local: alice(),
        peer: bob(),
        media_kind: kind,
    }
}

pub fn offer_from(peer: &str) -> SessionEvent {
    SessionEvent::ReceiveOffer {
        local: alice(),
        from: PeerId::from(peer),
        description: SessionDescription::offer(format!("v=0 offer from {}", peer)),
        media_kind: MediaKind::Video,
    }
}

/// Controller with a ringing incoming call from bob
pub fn ringing_controller() -> (PeerSessionController, SessionId) {
    let mut controller = PeerSessionController::new(Default::default());
    let dispatch = controller.handle_event(offer_from("bob"));
    let id = dispatch.session_id.expect("offer creates a session");
    (controller, id)
}

/// Engine sink that forwards into a channel
pub fn channel_sink(
    id: SessionId,
) -> (EngineEventSink, mpsc::UnboundedReceiver<(SessionId, EngineEvent)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = EngineEventSink::new(
        id,
        Arc::new(move |session_id, event| {
            let _ = tx.send((session_id, event));
        }),
    );
    (sink, rx)
}

pub fn sent_messages(dispatch: &Dispatch) -> Vec<SignalMessage> {
    dispatch.signals().map(|(_, m)| m.clone()).collect()
}

pub fn has_teardown(dispatch: &Dispatch) -> bool {
    dispatch
        .effects
        .iter()
        .any(|e| matches!(e, Effect::Teardown(_)))
}
