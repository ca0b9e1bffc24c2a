//! Property tests for the single-session invariant

mod common;

use common::*;
use proptest::prelude::*;
use rtcall_session_core::{GlarePolicy, PeerSessionController, SessionEvent, SessionState};
use rtcall_signal_core::{MediaKind, SessionDescription};

fn event_strategy() -> impl Strategy<Value = SessionEvent> {
    prop_oneof![
        (0usize..4).prop_map(|n| offer_from(&format!("peer-{}", n))),
        Just(start_outgoing(MediaKind::Voice)),
        Just(SessionEvent::Accept),
        Just(SessionEvent::Reject),
        Just(SessionEvent::LocalDescriptionReady {
            description: SessionDescription::offer("v=0"),
        }),
        Just(SessionEvent::ReceiveAnswer {
            description: SessionDescription::answer("v=0"),
        }),
        (0usize..4).prop_map(|n| SessionEvent::ReceiveCandidate { candidate: candidate(n) }),
        Just(SessionEvent::EngineConnected),
        Just(SessionEvent::EngineDisconnected),
        Just(SessionEvent::EngineFailed),
        Just(SessionEvent::ReceiveHangUp),
        Just(SessionEvent::LocalHangUp),
        Just(SessionEvent::RingTimeout),
    ]
}

proptest! {
    /// An offer arriving while a call is live never touches that call.
    #[test]
    fn prop_offer_during_live_call_is_dropped(
        events in prop::collection::vec(event_strategy(), 1..40),
        respond_busy in any::<bool>(),
    ) {
        let policy = if respond_busy { GlarePolicy::RespondBusy } else { GlarePolicy::Drop };
        let mut controller = PeerSessionController::new(policy);

        for event in events {
            let before = controller.snapshot().filter(|s| s.state.is_active());
            let is_offer = matches!(event, SessionEvent::ReceiveOffer { .. });
            let dispatch = controller.handle_event(event);

            if let (true, Some(before)) = (is_offer, before) {
                let after = controller.snapshot().unwrap();
                prop_assert!(!dispatch.handled);
                prop_assert_eq!(after.id, before.id);
                prop_assert_eq!(after.peer_id, before.peer_id);
                prop_assert_eq!(after.state, before.state);
                prop_assert_eq!(dispatch.effects.len(), usize::from(respond_busy));
            }
        }
    }

    /// Once terminal, a session stays terminal until a new one is created.
    #[test]
    fn prop_terminal_sessions_stay_terminal(
        events in prop::collection::vec(event_strategy(), 1..40),
    ) {
        let mut controller = PeerSessionController::new(GlarePolicy::Drop);

        for event in events {
            let before = controller.snapshot();
            let creates = matches!(
                event,
                SessionEvent::ReceiveOffer { .. } | SessionEvent::StartOutgoing { .. }
            );
            let dispatch = controller.handle_event(event);

            if let Some(before) = before.filter(|s| s.state.is_terminal()) {
                if !creates {
                    prop_assert!(!dispatch.handled);
                    prop_assert_eq!(controller.current_state(), before.state);
                }
            }
            prop_assert!(
                controller.current_state() != SessionState::Idle || controller.session().is_none()
            );
        }
    }
}
