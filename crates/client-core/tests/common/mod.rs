//! Shared fixtures for client-core integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use rtcall_client_core::{
    CallConfig, CallEvent, CallOrchestrator, InMemoryCallHistory, StaticDirectory,
};
use rtcall_media_core::MockMediaDevices;
use rtcall_session_core::{MockEngine, SessionState};
use rtcall_signal_core::{channel_name, InMemorySignalHub, PeerId, SignalEnvelope};
use tokio::sync::broadcast;

/// One orchestrator plus handles on its in-memory collaborators
pub struct TestClient {
    pub id: PeerId,
    pub orchestrator: CallOrchestrator,
    pub devices: Arc<MockMediaDevices>,
    pub engine: Arc<MockEngine>,
    pub history: Arc<InMemoryCallHistory>,
}

impl std::ops::Deref for TestClient {
    type Target = CallOrchestrator;

    fn deref(&self) -> &CallOrchestrator {
        &self.orchestrator
    }
}

impl TestClient {
    pub fn state(&self) -> SessionState {
        self.orchestrator.session_state()
    }
}

pub fn directory() -> Arc<StaticDirectory> {
    Arc::new(
        StaticDirectory::new()
            .with_peer("alice", "Alice")
            .with_peer("bob", "Bob")
            .with_peer("carol", "Carol"),
    )
}

pub async fn client(hub: &Arc<InMemorySignalHub>, name: &str) -> TestClient {
    client_with(hub, name, CallConfig::default()).await
}

pub async fn client_with(hub: &Arc<InMemorySignalHub>, name: &str, config: CallConfig) -> TestClient {
    let devices = Arc::new(MockMediaDevices::new());
    let engine = Arc::new(MockEngine::new());
    let history = Arc::new(InMemoryCallHistory::new());
    let orchestrator = CallOrchestrator::builder()
        .config(config)
        .transport(hub.clone())
        .media_devices(devices.clone())
        .engine(engine.clone())
        .history_store(history.clone())
        .directory(directory())
        .identity(PeerId::from(name))
        .build()
        .await
        .expect("orchestrator builds");

    TestClient {
        id: PeerId::from(name),
        orchestrator,
        devices,
        engine,
        history,
    }
}

/// Poll `condition` until it holds, failing the test after two seconds
pub async fn eventually<F>(what: &str, condition: F)
where
    F: Fn() -> bool,
{
    let reached = tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "timed out waiting for {}", what);
}

/// Give every event loop time to drain its queue
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Wire types published to `peer`'s channel, in order
pub fn sent_to(hub: &InMemorySignalHub, peer: &str) -> Vec<String> {
    hub.published_to(&channel_name(&PeerId::from(peer)))
        .into_iter()
        .filter_map(|v| v["type"].as_str().map(str::to_string))
        .collect()
}

pub fn count_sent(hub: &InMemorySignalHub, peer: &str, kind: &str) -> usize {
    sent_to(hub, peer).iter().filter(|t| *t == kind).count()
}

/// Decoded envelopes published to `peer`'s channel
pub fn envelopes_to(hub: &InMemorySignalHub, peer: &str) -> Vec<SignalEnvelope> {
    hub.published_to(&channel_name(&PeerId::from(peer)))
        .into_iter()
        .filter_map(|v| SignalEnvelope::from_payload(v).ok())
        .collect()
}

/// Everything currently buffered on an event receiver
pub fn drain(events: &mut broadcast::Receiver<CallEvent>) -> Vec<CallEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

/// Alice calls Bob and Bob answers; returns once both are connected
pub async fn connected_pair(hub: &Arc<InMemorySignalHub>) -> (TestClient, TestClient) {
    let alice = client(hub, "alice").await;
    let bob = client(hub, "bob").await;

    alice
        .start_call(PeerId::from("bob"), rtcall_signal_core::MediaKind::Video)
        .await
        .expect("call starts");
    eventually("bob to ring", || bob.view().incoming_call.is_some()).await;
    bob.accept_incoming().await.expect("bob accepts");

    eventually("alice to connect", || alice.state() == SessionState::Connected).await;
    eventually("bob to connect", || bob.state() == SessionState::Connected).await;
    (alice, bob)
}
