//! # rtcall-client-core
//!
//! High-level call client for rtcall. One [`CallOrchestrator`] per signed-in
//! user places, answers, rejects and ends peer-to-peer voice and video
//! calls, keeps the call history, and exposes a [`CallView`] for a UI.
//!
//! The crate sits on top of the rest of the stack:
//!
//! ```text
//!            ┌────────────────────────────┐
//!            │     rtcall-client-core     │  CallOrchestrator, history, view
//!            └──────┬──────────────┬──────┘
//!                   ▼              ▼
//!  ┌──────────────────────┐  ┌──────────────────────┐
//!  │ rtcall-session-core  │  │  rtcall-media-core   │
//!  │ session state table  │  │  local media, output │
//!  └──────────┬───────────┘  └──────────────────────┘
//!             ▼
//!  ┌──────────────────────┐
//!  │  rtcall-signal-core  │  offer / answer / candidates / hang-up
//!  └──────────────────────┘
//! ```
//!
//! Everything platform specific is injected: the pub/sub transport, capture
//! devices, the peer connection engine, the history store and the peer
//! directory. In-memory versions of all of them ship with the workspace, so
//! two orchestrators can call each other inside one process:
//!
//! ```rust
//! use std::sync::Arc;
//! use rtcall_client_core::{CallOrchestrator, StaticDirectory};
//! use rtcall_media_core::MockMediaDevices;
//! use rtcall_session_core::{MockEngine, SessionState};
//! use rtcall_signal_core::{InMemorySignalHub, MediaKind, PeerId};
//!
//! # tokio_test::block_on(async {
//! let hub = Arc::new(InMemorySignalHub::new());
//! let directory = Arc::new(StaticDirectory::new().with_peer("alice", "Alice").with_peer("bob", "Bob"));
//!
//! let mut clients = Vec::new();
//! for name in ["alice", "bob"] {
//!     let client = CallOrchestrator::builder()
//!         .transport(hub.clone())
//!         .media_devices(Arc::new(MockMediaDevices::new()))
//!         .engine(Arc::new(MockEngine::new()))
//!         .directory(directory.clone())
//!         .identity(PeerId::from(name))
//!         .build()
//!         .await
//!         .unwrap();
//!     clients.push(client);
//! }
//! let (alice, bob) = (&clients[0], &clients[1]);
//!
//! let mut bob_view = bob.subscribe_view();
//! alice.start_call(PeerId::from("bob"), MediaKind::Video).await.unwrap();
//! bob_view.wait_for(|v| v.incoming_call.is_some()).await.unwrap();
//!
//! bob.accept_incoming().await.unwrap();
//! let mut alice_view = alice.subscribe_view();
//! alice_view
//!     .wait_for(|v| v.active_call.as_ref().map(|c| c.state) == Some(SessionState::Connected))
//!     .await
//!     .unwrap();
//! # })
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod history;
pub mod logging;
pub mod orchestrator;

pub use config::CallConfig;
pub use directory::{PeerDirectory, PeerProfile, StaticDirectory};
pub use error::{CallError, CallResult};
pub use events::{ActiveCallView, CallEvent, CallNotice, CallView, IncomingCallView, NoticeLevel};
pub use history::{CallHistoryStore, CallRecord, InMemoryCallHistory};
pub use logging::{setup_logging, LoggingConfig};
pub use orchestrator::{CallOrchestrator, CallOrchestratorBuilder};

/// Common imports for applications
pub mod prelude {
    pub use crate::{
        CallConfig, CallError, CallEvent, CallNotice, CallOrchestrator, CallResult, CallView,
        PeerProfile, StaticDirectory,
    };
    pub use rtcall_session_core::{EndReason, GlarePolicy, SessionState};
    pub use rtcall_signal_core::{MediaKind, PeerId};
}
