//! Candidate buffering and negotiation ordering against the mock engine

mod common;

use std::sync::Arc;

use common::*;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rtcall_session_core::{
    negotiation, Effect, EndReason, IceConfig, MockEngine, MockOp, PeerConnection, PeerEngine,
    PeerSessionController, SessionEvent, SessionId, SessionState,
};
use rtcall_signal_core::{MediaKind, SdpType, SessionDescription};
use tracing_test::traced_test;

/// Ringing incoming session with a mock connection attached
async fn incoming_with_connection() -> (Arc<Mutex<PeerSessionController>>, Arc<MockEngine>, SessionId) {
    let (controller, id) = ringing_controller();
    let controller = Arc::new(Mutex::new(controller));
    let engine = Arc::new(MockEngine::new());
    engine.set_auto_connect(false);

    let (sink, _rx) = channel_sink(id);
    let connection = engine
        .create_connection(&IceConfig::default(), sink)
        .await
        .unwrap();
    controller.lock().handle_event(SessionEvent::Accept);
    controller
        .lock()
        .attach_connection(&id, &[SessionState::Answering], connection)
        .map_err(|_| "attach failed")
        .unwrap();

    (controller, engine, id)
}

fn receive_candidate(controller: &Mutex<PeerSessionController>, n: usize) -> Vec<Effect> {
    controller
        .lock()
        .handle_event(SessionEvent::ReceiveCandidate {
            candidate: candidate(n),
        })
        .effects
}

async fn run_effects(effects: Vec<Effect>) {
    for effect in effects {
        if let Effect::ApplyCandidate {
            negotiation,
            candidate,
        } = effect
        {
            negotiation::apply_candidate(&negotiation, candidate).await;
        }
    }
}

#[tokio::test]
async fn test_buffered_candidates_flush_right_after_remote_description() {
    let (controller, engine, id) = incoming_with_connection().await;

    assert!(receive_candidate(&controller, 1).is_empty());
    assert!(receive_candidate(&controller, 2).is_empty());

    let negotiation = controller.lock().negotiation(&id).unwrap();
    let offer = controller.lock().remote_offer(&id).unwrap();
    let flushed = negotiation::apply_remote_description(&controller, &negotiation, offer)
        .await
        .unwrap();
    assert_eq!(flushed, 2);

    // Now applied directly
    let effects = receive_candidate(&controller, 3);
    assert!(matches!(effects.as_slice(), [Effect::ApplyCandidate { .. }]));
    run_effects(effects).await;

    let connection = engine.last_connection().unwrap();
    assert_eq!(
        connection.applied_candidates(),
        vec![candidate(1).candidate, candidate(2).candidate, candidate(3).candidate]
    );
    assert_eq!(
        connection.operations()[0],
        MockOp::SetRemoteDescription(SdpType::Offer)
    );
}

#[tokio::test]
async fn test_candidate_arriving_during_remote_apply_keeps_order() {
    let (controller, engine, id) = incoming_with_connection().await;
    receive_candidate(&controller, 1);

    engine.hold_remote_descriptions();
    let negotiation = controller.lock().negotiation(&id).unwrap();
    let offer = controller.lock().remote_offer(&id).unwrap();
    let apply = {
        let controller = controller.clone();
        let negotiation = negotiation.clone();
        tokio::spawn(async move {
            negotiation::apply_remote_description(&controller, &negotiation, offer).await
        })
    };

    engine.remote_description_started().await;
    // Still buffered: the engine has not accepted the description yet
    assert!(receive_candidate(&controller, 2).is_empty());

    engine.release_remote_descriptions();
    assert_eq!(apply.await.unwrap().unwrap(), 2);

    run_effects(receive_candidate(&controller, 3)).await;

    assert_eq!(
        engine.last_connection().unwrap().applied_candidates(),
        vec![candidate(1).candidate, candidate(2).candidate, candidate(3).candidate]
    );
}

#[tokio::test]
#[traced_test]
async fn test_rejected_candidate_is_skipped() {
    let (controller, engine, id) = incoming_with_connection().await;
    engine.reject_candidates_containing(Some("10.0.0.2 "));
    for n in 1..=3 {
        receive_candidate(&controller, n);
    }

    let negotiation = controller.lock().negotiation(&id).unwrap();
    let offer = controller.lock().remote_offer(&id).unwrap();
    negotiation::apply_remote_description(&controller, &negotiation, offer)
        .await
        .unwrap();

    assert_eq!(
        engine.last_connection().unwrap().applied_candidates(),
        vec![candidate(1).candidate, candidate(3).candidate]
    );
    assert!(logs_contain("Skipping remote candidate"));
}

#[tokio::test]
async fn test_remote_apply_for_ended_session_reports_stale() {
    let (controller, _engine, id) = incoming_with_connection().await;
    let negotiation = controller.lock().negotiation(&id).unwrap();
    let offer = controller.lock().remote_offer(&id).unwrap();

    let teardown = controller.lock().end_session(EndReason::LocalHangUp);
    drop(teardown);

    let err = negotiation::apply_remote_description(&controller, &negotiation, offer)
        .await
        .unwrap_err();
    assert!(err.is_stale());
}

#[tokio::test]
async fn test_answer_effect_applies_remote_description_for_caller() {
    let mut controller = PeerSessionController::new(Default::default());
    let id = controller
        .handle_event(start_outgoing(MediaKind::Voice))
        .session_id
        .unwrap();
    let controller = Mutex::new(controller);

    let engine = MockEngine::new();
    let (sink, mut events) = channel_sink(id);
    let connection = engine
        .create_connection(&IceConfig::default(), sink)
        .await
        .unwrap();
    let offer = connection.create_offer().await.unwrap();
    connection.set_local_description(offer).await.unwrap();
    controller
        .lock()
        .attach_connection(&id, &[SessionState::Offering], connection)
        .map_err(|_| "attach failed")
        .unwrap();

    receive_candidate(&controller, 7);
    let effects = controller
        .lock()
        .handle_event(SessionEvent::ReceiveAnswer {
            description: SessionDescription::answer("v=0 bob"),
        })
        .effects;

    for effect in effects {
        if let Effect::ApplyRemoteDescription {
            negotiation,
            description,
        } = effect
        {
            negotiation::apply_remote_description(&controller, &negotiation, description)
                .await
                .unwrap();
        }
    }

    let mock = engine.last_connection().unwrap();
    assert_eq!(mock.applied_candidates(), vec![candidate(7).candidate]);

    // The mock reports connected once both descriptions are set
    let mut saw_connected = false;
    while let Ok((session_id, event)) = events.try_recv() {
        assert_eq!(session_id, id);
        let dispatch = controller.lock().handle_engine_event(&session_id, event);
        saw_connected |= dispatch.next == SessionState::Connected;
    }
    assert!(saw_connected);
    assert!(controller.lock().snapshot().unwrap().remote_stream.is_some());
}

proptest! {
    /// Whatever the split between candidates that arrive before and after the
    /// remote description, they are applied exactly once in arrival order.
    #[test]
    fn prop_candidates_applied_in_arrival_order(before in 0usize..8, after in 0usize..8) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let (controller, engine, id) = incoming_with_connection().await;

            for n in 0..before {
                prop_assert!(receive_candidate(&controller, n).is_empty());
            }

            let negotiation = controller.lock().negotiation(&id).unwrap();
            let offer = controller.lock().remote_offer(&id).unwrap();
            let flushed = negotiation::apply_remote_description(&controller, &negotiation, offer)
                .await
                .unwrap();
            prop_assert_eq!(flushed, before);

            for n in before..before + after {
                run_effects(receive_candidate(&controller, n)).await;
            }

            let expected: Vec<String> = (0..before + after).map(|n| candidate(n).candidate).collect();
            prop_assert_eq!(engine.last_connection().unwrap().applied_candidates(), expected);
            Ok(())
        })?;
    }
}
