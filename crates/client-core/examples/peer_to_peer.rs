//! Two in-process clients calling each other
//!
//! Alice calls Bob over the in-memory signaling hub, Bob answers, they talk
//! for a moment and Alice hangs up. Run with:
//!
//! ```sh
//! RUST_LOG=debug cargo run -p rtcall-client-core --example peer_to_peer
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rtcall_client_core::logging::{log_welcome, setup_logging, LoggingConfig};
use rtcall_client_core::{CallEvent, CallOrchestrator, InMemoryCallHistory, StaticDirectory};
use rtcall_media_core::MockMediaDevices;
use rtcall_session_core::{MockEngine, SessionState};
use rtcall_signal_core::{InMemorySignalHub, MediaKind, PeerId};
use tracing::Level;

async fn client(
    name: &str,
    hub: Arc<InMemorySignalHub>,
    directory: Arc<StaticDirectory>,
) -> Result<CallOrchestrator> {
    CallOrchestrator::builder()
        .transport(hub)
        .media_devices(Arc::new(MockMediaDevices::new()))
        .engine(Arc::new(MockEngine::new()))
        .history_store(Arc::new(InMemoryCallHistory::new()))
        .directory(directory)
        .identity(PeerId::from(name))
        .build()
        .await
        .with_context(|| format!("building client for {}", name))
}

#[tokio::main]
async fn main() -> Result<()> {
    let logging = LoggingConfig::new(Level::INFO, "peer_to_peer").with_spans();
    setup_logging(&logging)?;
    log_welcome(&logging.app_name, env!("CARGO_PKG_VERSION"));

    let hub = Arc::new(InMemorySignalHub::new());
    let directory = Arc::new(
        StaticDirectory::new()
            .with_peer("alice", "Alice")
            .with_peer("bob", "Bob"),
    );

    let alice = client("alice", hub.clone(), directory.clone()).await?;
    let bob = client("bob", hub.clone(), directory.clone()).await?;

    // Bob picks up as soon as the phone rings
    let mut bob_events = bob.subscribe_events();
    let answering = {
        let bob = bob.clone();
        tokio::spawn(async move {
            while let Ok(event) = bob_events.recv().await {
                if let CallEvent::IncomingCall { display_name, media_kind, .. } = event {
                    println!("Bob: incoming {} call from {}", media_kind, display_name);
                    return bob.accept_incoming().await;
                }
            }
            Ok(())
        })
    };

    alice.start_call(PeerId::from("bob"), MediaKind::Video).await?;
    answering.await??;

    let mut alice_view = alice.subscribe_view();
    tokio::time::timeout(
        Duration::from_secs(5),
        alice_view.wait_for(|view| {
            view.active_call.as_ref().map(|call| call.state) == Some(SessionState::Connected)
        }),
    )
    .await
    .context("call never connected")??;
    println!("Alice: {}", alice.view().active_call.map(|c| c.status).unwrap_or_default());

    println!("Alice: muted = {}", alice.toggle_mute());
    println!("Alice: speaker = {}", alice.toggle_speaker().await);
    tokio::time::sleep(Duration::from_millis(200)).await;

    alice.end_call().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    for record in alice.call_history() {
        println!("Alice history: {} {} call with {}", record.direction, record.media_kind, record.peer_id);
    }
    for record in bob.call_history() {
        println!("Bob history: {} {} call with {}", record.direction, record.media_kind, record.peer_id);
    }

    alice.shutdown().await;
    bob.shutdown().await;
    Ok(())
}
