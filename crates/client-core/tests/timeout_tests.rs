//! Ring and answer timeouts, driven by tokio's paused clock

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use pretty_assertions::assert_eq;
use rtcall_client_core::{CallConfig, CallEvent, CallNotice};
use rtcall_session_core::{EndReason, RecordDirection, SessionState};
use rtcall_signal_core::{InMemorySignalHub, MediaKind, PeerId};

#[tokio::test(start_paused = true)]
async fn test_unanswered_incoming_call_stops_ringing() {
    let hub = Arc::new(InMemorySignalHub::new());
    let alice = client(&hub, "alice").await;
    let bob = client_with(
        &hub,
        "bob",
        CallConfig::new().with_ring_timeout(Duration::from_secs(30)),
    )
    .await;

    alice
        .start_call(PeerId::from("bob"), MediaKind::Voice)
        .await
        .unwrap();
    eventually("bob to ring", || bob.view().incoming_call.is_some()).await;

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(bob.state(), SessionState::RingingLocal);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(bob.state(), SessionState::Ended);
    assert_eq!(
        bob.session_snapshot().unwrap().end_reason,
        Some(EndReason::RingTimeout)
    );
    assert!(bob.view().incoming_call.is_none());
    assert_eq!(bob.call_history()[0].direction, RecordDirection::Missed);

    // The caller is not told; its own answer timeout decides
    assert_eq!(count_sent(&hub, "alice", "hang-up"), 0);
    assert_eq!(alice.state(), SessionState::Offering);
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_outgoing_call_gives_up() {
    let hub = Arc::new(InMemorySignalHub::new());
    let alice = client_with(
        &hub,
        "alice",
        CallConfig::new().with_answer_timeout(Duration::from_secs(20)),
    )
    .await;
    let bob = client(&hub, "bob").await;
    let mut alice_events = alice.subscribe_events();

    alice
        .start_call(PeerId::from("bob"), MediaKind::Video)
        .await
        .unwrap();
    eventually("bob to ring", || bob.view().incoming_call.is_some()).await;

    tokio::time::sleep(Duration::from_secs(21)).await;

    assert_eq!(alice.state(), SessionState::Ended);
    assert_eq!(
        alice.session_snapshot().unwrap().end_reason,
        Some(EndReason::AnswerTimeout)
    );
    assert_eq!(alice.devices.live_tracks(), 0);
    assert!(alice.engine.last_connection().unwrap().is_closed());
    assert!(drain(&mut alice_events).contains(&CallEvent::Notice(CallNotice::NoAnswer {
        peer_id: PeerId::from("bob")
    })));

    assert_eq!(count_sent(&hub, "bob", "hang-up"), 1);
    eventually("bob to stop ringing", || bob.state() == SessionState::Ended).await;
    assert_eq!(bob.call_history()[0].direction, RecordDirection::Missed);
}

#[tokio::test(start_paused = true)]
async fn test_timeouts_do_not_fire_once_answered() {
    let hub = Arc::new(InMemorySignalHub::new());
    let timeouts = CallConfig::new()
        .with_ring_timeout(Duration::from_secs(30))
        .with_answer_timeout(Duration::from_secs(30));
    let alice = client_with(&hub, "alice", timeouts.clone()).await;
    let bob = client_with(&hub, "bob", timeouts).await;

    alice
        .start_call(PeerId::from("bob"), MediaKind::Voice)
        .await
        .unwrap();
    eventually("bob to ring", || bob.view().incoming_call.is_some()).await;

    tokio::time::sleep(Duration::from_secs(10)).await;
    bob.accept_incoming().await.unwrap();
    eventually("alice to connect", || alice.state() == SessionState::Connected).await;

    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(alice.state(), SessionState::Connected);
    assert_eq!(bob.state(), SessionState::Connected);
    assert_eq!(count_sent(&hub, "alice", "hang-up"), 0);
    assert_eq!(count_sent(&hub, "bob", "hang-up"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_of_an_old_call_leaves_the_next_one_alone() {
    let hub = Arc::new(InMemorySignalHub::new());
    let alice = client_with(
        &hub,
        "alice",
        CallConfig::new().with_answer_timeout(Duration::from_secs(20)),
    )
    .await;
    let _bob = client(&hub, "bob").await;
    let _carol = client(&hub, "carol").await;

    alice
        .start_call(PeerId::from("bob"), MediaKind::Voice)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(15)).await;
    alice.end_call().await;

    let second = alice
        .start_call(PeerId::from("carol"), MediaKind::Voice)
        .await
        .unwrap();

    // The first call's timer expires here and must not touch the second
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(alice.session_snapshot().unwrap().id, second);
    assert!(alice.state() != SessionState::Ended);
    assert_eq!(count_sent(&hub, "carol", "hang-up"), 0);

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(alice.state(), SessionState::Ended);
    assert_eq!(
        alice.session_snapshot().unwrap().end_reason,
        Some(EndReason::AnswerTimeout)
    );
}
