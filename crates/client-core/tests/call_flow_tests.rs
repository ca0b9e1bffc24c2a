//! End-to-end call flows between in-process orchestrators

mod common;

use std::sync::Arc;

use common::*;
use pretty_assertions::assert_eq;
use rtcall_client_core::{CallConfig, CallError, CallEvent, CallNotice};
use rtcall_session_core::{EndReason, GlarePolicy, MockOp, RecordDirection, SessionState};
use rtcall_signal_core::{
    channel_name, InMemorySignalHub, MediaKind, PeerId, SdpType, SignalEnvelope, SignalMessage,
    SignalTransport,
};
use tracing_test::traced_test;

#[tokio::test]
async fn test_call_is_offered_answered_and_connected() {
    let hub = Arc::new(InMemorySignalHub::new());
    let alice = client(&hub, "alice").await;
    let bob = client(&hub, "bob").await;
    let mut bob_events = bob.subscribe_events();

    let session_id = alice
        .start_call(PeerId::from("bob"), MediaKind::Video)
        .await
        .unwrap();

    assert_eq!(alice.state(), SessionState::Offering);
    let active = alice.view().active_call.expect("alice shows the call");
    assert_eq!(active.session_id, session_id);
    assert_eq!(active.status, "Calling...");
    assert_eq!(active.display_name, "Bob");
    assert!(!active.is_incoming);
    assert!(alice.view().is_video_on);

    let history = alice.call_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].direction, RecordDirection::Outgoing);
    assert_eq!(history[0].peer_id, PeerId::from("bob"));
    assert_eq!(sent_to(&hub, "bob").first().map(String::as_str), Some("offer"));

    eventually("bob to ring", || bob.view().incoming_call.is_some()).await;
    let incoming = bob.view().incoming_call.unwrap();
    assert_eq!(incoming.display_name, "Alice");
    assert_eq!(incoming.media_kind, MediaKind::Video);
    assert!(drain(&mut bob_events)
        .iter()
        .any(|e| matches!(e, CallEvent::IncomingCall { peer_id, .. } if peer_id.as_str() == "alice")));

    bob.accept_incoming().await.unwrap();
    assert!(matches!(
        bob.state(),
        SessionState::Connecting | SessionState::Connected
    ));
    assert!(bob.view().incoming_call.is_none());
    assert!(bob.view().active_call.unwrap().is_incoming);
    assert_eq!(count_sent(&hub, "alice", "answer"), 1);

    eventually("alice to connect", || alice.state() == SessionState::Connected).await;
    eventually("bob to connect", || bob.state() == SessionState::Connected).await;
    assert_eq!(alice.view().active_call.unwrap().status, "Connected");
    assert!(alice.session_snapshot().unwrap().remote_stream.is_some());

    let bob_history = bob.call_history();
    assert_eq!(bob_history[0].direction, RecordDirection::Incoming);
    assert_eq!(bob_history[0].peer_id, PeerId::from("alice"));
}

#[tokio::test]
async fn test_candidates_reach_both_connections() {
    let hub = Arc::new(InMemorySignalHub::new());
    let (alice, bob) = connected_pair(&hub).await;
    settle().await;

    // Each mock connection gathers one local candidate; the other side applies it
    let alice_pc = alice.engine.last_connection().unwrap();
    let bob_pc = bob.engine.last_connection().unwrap();
    assert_eq!(alice_pc.applied_candidates().len(), 1);
    assert_eq!(bob_pc.applied_candidates().len(), 1);
    assert!(bob_pc.applied_candidates()[0].contains("pc-1"));

    // The offer always precedes alice's candidate on bob's channel
    let sent = sent_to(&hub, "bob");
    let offer_at = sent.iter().position(|t| t == "offer").unwrap();
    let candidate_at = sent.iter().position(|t| t == "ice-candidate").unwrap();
    assert!(offer_at < candidate_at);
}

#[tokio::test]
async fn test_offer_during_call_is_dropped_without_reply() {
    let hub = Arc::new(InMemorySignalHub::new());
    let (alice, _bob) = connected_pair(&hub).await;
    let carol = client(&hub, "carol").await;
    let session_before = alice.session_snapshot().unwrap().id;

    carol
        .start_call(PeerId::from("alice"), MediaKind::Voice)
        .await
        .unwrap();
    settle().await;

    let snapshot = alice.session_snapshot().unwrap();
    assert_eq!(snapshot.id, session_before);
    assert_eq!(snapshot.peer_id, PeerId::from("bob"));
    assert_eq!(alice.state(), SessionState::Connected);
    assert!(alice.view().incoming_call.is_none());
    assert!(sent_to(&hub, "carol").is_empty(), "carol gets no response");
    assert_eq!(carol.state(), SessionState::Offering);
}

#[tokio::test]
async fn test_busy_policy_tells_the_second_caller() {
    let hub = Arc::new(InMemorySignalHub::new());
    let alice = client_with(
        &hub,
        "alice",
        CallConfig::new().with_glare_policy(GlarePolicy::RespondBusy),
    )
    .await;
    let bob = client(&hub, "bob").await;
    let carol = client(&hub, "carol").await;

    bob.start_call(PeerId::from("alice"), MediaKind::Voice).await.unwrap();
    eventually("alice to ring", || alice.view().incoming_call.is_some()).await;
    alice.accept_incoming().await.unwrap();

    let mut carol_events = carol.subscribe_events();
    carol
        .start_call(PeerId::from("alice"), MediaKind::Voice)
        .await
        .unwrap();

    eventually("carol to give up", || carol.state() == SessionState::Ended).await;
    assert_eq!(
        carol.session_snapshot().unwrap().end_reason,
        Some(EndReason::Busy)
    );
    assert!(drain(&mut carol_events).contains(&CallEvent::Notice(CallNotice::PeerBusy {
        peer_id: PeerId::from("alice")
    })));
    assert_eq!(alice.session_snapshot().unwrap().peer_id, PeerId::from("bob"));
    assert_eq!(carol.devices.live_tracks(), 0);
}

#[tokio::test]
async fn test_caller_hangs_up_before_answer() {
    let hub = Arc::new(InMemorySignalHub::new());
    let alice = client(&hub, "alice").await;
    let bob = client(&hub, "bob").await;
    let mut alice_events = alice.subscribe_events();

    alice
        .start_call(PeerId::from("bob"), MediaKind::Voice)
        .await
        .unwrap();
    eventually("bob to ring", || bob.view().incoming_call.is_some()).await;

    alice.end_call().await;

    assert_eq!(alice.state(), SessionState::Ended);
    assert_eq!(count_sent(&hub, "bob", "hang-up"), 1);
    assert_eq!(alice.devices.live_tracks(), 0);
    assert!(alice.engine.last_connection().unwrap().is_closed());
    assert!(!alice.view().has_call());
    assert!(drain(&mut alice_events).iter().any(|e| matches!(
        e,
        CallEvent::CallEnded { reason: EndReason::LocalHangUp, final_state: SessionState::Ended, .. }
    )));

    eventually("bob to stop ringing", || bob.view().incoming_call.is_none()).await;
    assert_eq!(bob.state(), SessionState::Ended);
    eventually("bob's missed call", || {
        bob.call_history()
            .first()
            .map(|r| r.direction == RecordDirection::Missed)
            .unwrap_or(false)
    })
    .await;
}

#[tokio::test]
async fn test_denied_media_on_accept_ends_without_answer() {
    let hub = Arc::new(InMemorySignalHub::new());
    let alice = client(&hub, "alice").await;
    let bob = client(&hub, "bob").await;
    bob.devices.deny_access("camera blocked");
    let mut bob_events = bob.subscribe_events();

    alice
        .start_call(PeerId::from("bob"), MediaKind::Video)
        .await
        .unwrap();
    eventually("bob to ring", || bob.view().incoming_call.is_some()).await;

    let err = bob.accept_incoming().await.unwrap_err();
    assert!(matches!(err, CallError::MediaAccessDenied { .. }));
    assert_eq!(bob.state(), SessionState::Ended);
    assert!(!bob.view().has_call());
    assert_eq!(count_sent(&hub, "alice", "answer"), 0);
    assert_eq!(bob.engine.connection_count(), 0);

    let events = drain(&mut bob_events);
    assert!(events
        .iter()
        .any(|e| matches!(e, CallEvent::Notice(CallNotice::AcceptFailed { .. }))));

    eventually("alice to hear the hang-up", || alice.state() == SessionState::Ended).await;
    assert_eq!(alice.devices.live_tracks(), 0);
}

#[tokio::test]
async fn test_denied_media_on_start_keeps_optimistic_record() {
    let hub = Arc::new(InMemorySignalHub::new());
    let alice = client(&hub, "alice").await;
    alice.devices.deny_access("microphone blocked");

    let err = alice
        .start_call(PeerId::from("bob"), MediaKind::Voice)
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::MediaAccessDenied { .. }));
    assert_eq!(alice.state(), SessionState::Ended);
    assert_eq!(alice.engine.connection_count(), 0);
    assert_eq!(alice.call_history()[0].direction, RecordDirection::Outgoing);
    assert!(!sent_to(&hub, "bob").contains(&"offer".to_string()));
}

#[tokio::test]
async fn test_repeated_end_call_releases_once() {
    let hub = Arc::new(InMemorySignalHub::new());
    let (alice, bob) = connected_pair(&hub).await;

    futures::join!(alice.end_call(), alice.end_call());
    alice.end_call().await;

    assert_eq!(count_sent(&hub, "bob", "hang-up"), 1);
    assert!(!alice.devices.any_double_stop());
    assert_eq!(alice.devices.live_tracks(), 0);
    let pc = alice.engine.last_connection().unwrap();
    assert_eq!(pc.close_count(), 1);

    eventually("bob to hear the hang-up", || bob.state() == SessionState::Ended).await;
    assert_eq!(
        bob.session_snapshot().unwrap().end_reason,
        Some(EndReason::RemoteHangUp)
    );
    assert_eq!(bob.devices.live_tracks(), 0);
    assert_eq!(count_sent(&hub, "alice", "hang-up"), 0);
}

#[tokio::test]
async fn test_end_call_during_media_acquisition_discards_media() {
    let hub = Arc::new(InMemorySignalHub::new());
    let alice = client(&hub, "alice").await;
    alice.devices.hold_acquisitions();

    let calling = {
        let orchestrator = alice.orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .start_call(PeerId::from("bob"), MediaKind::Video)
                .await
        })
    };
    alice.devices.request_started().await;
    assert_eq!(alice.state(), SessionState::Offering);

    alice.end_call().await;
    alice.devices.open_gate();

    let result = calling.await.unwrap();
    assert_eq!(result, Err(CallError::Cancelled));
    assert_eq!(alice.state(), SessionState::Ended);
    assert_eq!(alice.devices.issued_tracks().len(), 2);
    assert_eq!(alice.devices.live_tracks(), 0);
    assert!(!alice.session_snapshot().unwrap().has_local_media);
    assert_eq!(alice.engine.connection_count(), 0);
    assert!(!alice.devices.any_double_stop());
}

#[tokio::test]
async fn test_answer_after_call_ended_is_ignored() {
    let hub = Arc::new(InMemorySignalHub::new());
    let alice = client(&hub, "alice").await;

    alice
        .start_call(PeerId::from("bob"), MediaKind::Voice)
        .await
        .unwrap();
    alice.end_call().await;

    let late_answer = SignalEnvelope::new(
        Some(PeerId::from("bob")),
        SignalMessage::Answer {
            sdp: rtcall_signal_core::SessionDescription::answer("v=0 late"),
        },
    );
    hub.publish(
        &channel_name(&PeerId::from("alice")),
        late_answer.to_payload().unwrap(),
    )
    .await
    .unwrap();
    settle().await;

    assert_eq!(alice.state(), SessionState::Ended);
    let ops = alice.engine.last_connection().unwrap().operations();
    assert!(!ops.contains(&MockOp::SetRemoteDescription(SdpType::Answer)));
}

#[tokio::test]
async fn test_unknown_peer_is_refused_before_media() {
    let hub = Arc::new(InMemorySignalHub::new());
    let alice = client(&hub, "alice").await;

    let err = alice
        .start_call(PeerId::from("mallory"), MediaKind::Voice)
        .await
        .unwrap_err();

    assert_eq!(err, CallError::PeerUnknown { peer: PeerId::from("mallory") });
    assert_eq!(alice.devices.acquisition_count(), 0);
    assert_eq!(alice.state(), SessionState::Idle);
    assert!(alice.call_history().is_empty());
}

#[tokio::test]
#[traced_test]
async fn test_offer_from_unknown_caller_is_ignored() {
    let hub = Arc::new(InMemorySignalHub::new());
    let alice = client(&hub, "alice").await;
    let mallory = client(&hub, "mallory").await;

    // Mallory knows alice, alice does not know mallory
    mallory
        .start_call(PeerId::from("alice"), MediaKind::Voice)
        .await
        .unwrap();
    settle().await;

    assert_eq!(alice.state(), SessionState::Idle);
    assert!(alice.view().incoming_call.is_none());
    assert!(logs_contain("Ignoring offer from unknown caller mallory"));
}

#[tokio::test]
async fn test_messages_from_other_senders_do_not_touch_the_call() {
    let hub = Arc::new(InMemorySignalHub::new());
    let (alice, _bob) = connected_pair(&hub).await;

    let spoofed = SignalEnvelope::new(Some(PeerId::from("carol")), SignalMessage::HangUp);
    hub.publish(
        &channel_name(&PeerId::from("alice")),
        spoofed.to_payload().unwrap(),
    )
    .await
    .unwrap();
    settle().await;

    assert_eq!(alice.state(), SessionState::Connected);
    assert!(alice.devices.live_tracks() > 0);
}

#[tokio::test]
async fn test_second_call_while_busy_is_refused() {
    let hub = Arc::new(InMemorySignalHub::new());
    let alice = client(&hub, "alice").await;

    let first = alice
        .start_call(PeerId::from("bob"), MediaKind::Voice)
        .await
        .unwrap();
    let err = alice
        .start_call(PeerId::from("carol"), MediaKind::Voice)
        .await
        .unwrap_err();

    assert_eq!(err, CallError::AlreadyInCall);
    assert_eq!(alice.session_snapshot().unwrap().id, first);
    assert_eq!(alice.devices.acquisition_count(), 1);
}

#[tokio::test]
async fn test_reject_records_missed_call_and_hangs_up() {
    let hub = Arc::new(InMemorySignalHub::new());
    let alice = client(&hub, "alice").await;
    let bob = client(&hub, "bob").await;

    alice
        .start_call(PeerId::from("bob"), MediaKind::Video)
        .await
        .unwrap();
    eventually("bob to ring", || bob.view().incoming_call.is_some()).await;

    bob.reject_incoming().await;

    assert_eq!(bob.state(), SessionState::Ended);
    assert_eq!(
        bob.session_snapshot().unwrap().end_reason,
        Some(EndReason::Rejected)
    );
    assert_eq!(bob.call_history()[0].direction, RecordDirection::Missed);
    assert_eq!(bob.devices.acquisition_count(), 0);
    eventually("alice to hear the rejection", || alice.state() == SessionState::Ended).await;
    assert_eq!(alice.devices.live_tracks(), 0);

    // Nothing left to reject or end
    bob.reject_incoming().await;
    bob.end_call().await;
    assert_eq!(count_sent(&hub, "alice", "hang-up"), 1);
}

#[tokio::test]
async fn test_engine_failure_fails_the_call_without_hang_up() {
    let hub = Arc::new(InMemorySignalHub::new());
    let (alice, bob) = connected_pair(&hub).await;
    let mut alice_events = alice.subscribe_events();
    let hang_ups_before = count_sent(&hub, "bob", "hang-up");

    alice.engine.last_connection().unwrap().emit(
        rtcall_session_core::EngineEvent::ConnectionStateChanged(
            rtcall_session_core::ConnectionState::Failed,
        ),
    );
    eventually("alice to fail", || alice.state() == SessionState::Failed).await;

    let events = drain(&mut alice_events);
    assert!(events.contains(&CallEvent::Notice(CallNotice::ConnectionFailed {
        peer_id: PeerId::from("bob")
    })));
    assert!(events.iter().any(|e| matches!(
        e,
        CallEvent::CallEnded { final_state: SessionState::Failed, reason: EndReason::ConnectionFailed, .. }
    )));
    assert_eq!(alice.devices.live_tracks(), 0);
    assert_eq!(count_sent(&hub, "bob", "hang-up"), hang_ups_before);
    assert_eq!(bob.state(), SessionState::Connected);
}

#[tokio::test]
async fn test_reconnecting_call_recovers() {
    let hub = Arc::new(InMemorySignalHub::new());
    let (alice, _bob) = connected_pair(&hub).await;
    let pc = alice.engine.last_connection().unwrap();

    pc.emit(rtcall_session_core::EngineEvent::ConnectionStateChanged(
        rtcall_session_core::ConnectionState::Disconnected,
    ));
    eventually("alice to reconnect", || alice.state() == SessionState::Reconnecting).await;
    assert_eq!(alice.view().active_call.unwrap().status, "Reconnecting...");

    pc.emit(rtcall_session_core::EngineEvent::ConnectionStateChanged(
        rtcall_session_core::ConnectionState::Connected,
    ));
    eventually("alice to recover", || alice.state() == SessionState::Connected).await;
}

#[tokio::test]
async fn test_offer_failure_fails_setup_and_notifies_peer() {
    let hub = Arc::new(InMemorySignalHub::new());
    let alice = client(&hub, "alice").await;
    alice.engine.fail_offers(true);
    let mut alice_events = alice.subscribe_events();

    let err = alice
        .start_call(PeerId::from("bob"), MediaKind::Voice)
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::Negotiation { .. }));
    assert_eq!(alice.state(), SessionState::Failed);
    assert_eq!(alice.devices.live_tracks(), 0);
    assert!(alice.engine.last_connection().unwrap().is_closed());
    assert_eq!(count_sent(&hub, "bob", "hang-up"), 1);
    assert!(drain(&mut alice_events)
        .iter()
        .any(|e| matches!(e, CallEvent::Notice(CallNotice::SetupFailed { .. }))));
}

#[tokio::test]
async fn test_accept_without_ringing_call() {
    let hub = Arc::new(InMemorySignalHub::new());
    let bob = client(&hub, "bob").await;
    assert_eq!(bob.accept_incoming().await, Err(CallError::NoIncomingCall));
}

#[tokio::test]
async fn test_new_call_after_previous_one_ended() {
    let hub = Arc::new(InMemorySignalHub::new());
    let (alice, bob) = connected_pair(&hub).await;
    alice.end_call().await;
    eventually("bob to hang up", || bob.state() == SessionState::Ended).await;

    let second = bob
        .start_call(PeerId::from("alice"), MediaKind::Voice)
        .await
        .unwrap();
    eventually("alice to ring again", || alice.view().incoming_call.is_some()).await;
    alice.accept_incoming().await.unwrap();
    eventually("bob connected again", || bob.state() == SessionState::Connected).await;

    assert_eq!(bob.session_snapshot().unwrap().id, second);
    assert_eq!(alice.engine.connection_count(), 2);
    assert!(alice.engine.connections()[0].is_closed());
}
