//! Builder for [`CallOrchestrator`]
//!
//! The orchestrator has no ambient singletons: the signaling transport,
//! capture devices, peer engine, history store and peer directory are all
//! injected here. Only the history store and the directory have defaults
//! (an in-memory store and an empty directory); the rest are required.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use rtcall_client_core::{CallConfig, CallOrchestrator, StaticDirectory};
//! use rtcall_media_core::MockMediaDevices;
//! use rtcall_session_core::{GlarePolicy, MockEngine};
//! use rtcall_signal_core::InMemorySignalHub;
//!
//! # tokio_test::block_on(async {
//! let orchestrator = CallOrchestrator::builder()
//!     .transport(Arc::new(InMemorySignalHub::new()))
//!     .media_devices(Arc::new(MockMediaDevices::new()))
//!     .engine(Arc::new(MockEngine::new()))
//!     .directory(Arc::new(StaticDirectory::new().with_peer("bob", "Bob")))
//!     .with_config(|c| c
//!         .with_glare_policy(GlarePolicy::RespondBusy)
//!         .with_ring_timeout(Duration::from_secs(30)))
//!     .build()
//!     .await
//!     .expect("Failed to build orchestrator");
//!
//! // Nobody is signed in until an identity is supplied
//! assert!(orchestrator.local_identity().is_none());
//! # })
//! ```

use parking_lot::{Mutex, RwLock};
use rtcall_media_core::{MediaController, MediaDevices};
use rtcall_session_core::{PeerEngine, PeerSessionController};
use rtcall_signal_core::{PeerId, SignalChannel, SignalTransport};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, Mutex as AsyncMutex};
use tracing::info;

use super::event_loop::run_event_loop;
use super::{CallOrchestrator, Inner};
use crate::config::CallConfig;
use crate::directory::{PeerDirectory, StaticDirectory};
use crate::error::{CallError, CallResult};
use crate::events::CallView;
use crate::history::{CallHistoryStore, InMemoryCallHistory};

/// Fluent builder for [`CallOrchestrator`]
#[derive(Default)]
pub struct CallOrchestratorBuilder {
    config: CallConfig,
    transport: Option<Arc<dyn SignalTransport>>,
    devices: Option<Arc<dyn MediaDevices>>,
    engine: Option<Arc<dyn PeerEngine>>,
    history_store: Option<Arc<dyn CallHistoryStore>>,
    directory: Option<Arc<dyn PeerDirectory>>,
    identity: Option<PeerId>,
}

impl CallOrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: CallConfig) -> Self {
        self.config = config;
        self
    }

    /// Adjust the configuration in place
    pub fn with_config<F>(mut self, f: F) -> Self
    where
        F: FnOnce(CallConfig) -> CallConfig,
    {
        self.config = f(self.config);
        self
    }

    /// Pub/sub primitive carrying the signaling messages (required)
    pub fn transport(mut self, transport: Arc<dyn SignalTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Capture and output devices (required)
    pub fn media_devices(mut self, devices: Arc<dyn MediaDevices>) -> Self {
        self.devices = Some(devices);
        self
    }

    /// Peer connection engine (required)
    pub fn engine(mut self, engine: Arc<dyn PeerEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn history_store(mut self, store: Arc<dyn CallHistoryStore>) -> Self {
        self.history_store = Some(store);
        self
    }

    pub fn directory(mut self, directory: Arc<dyn PeerDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Sign in as `identity` right after building
    pub fn identity(mut self, identity: PeerId) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Validate the configuration, start the event loop and sign in if an
    /// identity was given
    ///
    /// Must be called from within a tokio runtime.
    pub async fn build(self) -> CallResult<CallOrchestrator> {
        self.config.validate()?;

        let transport = self
            .transport
            .ok_or_else(|| CallError::config("a signaling transport is required"))?;
        let devices = self
            .devices
            .ok_or_else(|| CallError::config("media devices are required"))?;
        let engine = self
            .engine
            .ok_or_else(|| CallError::config("a peer engine is required"))?;
        let history_store: Arc<dyn CallHistoryStore> = match self.history_store {
            Some(store) => store,
            None => Arc::new(InMemoryCallHistory::new()),
        };
        let directory: Arc<dyn PeerDirectory> = match self.directory {
            Some(directory) => directory,
            None => Arc::new(StaticDirectory::new()),
        };

        let media = MediaController::new(devices)
            .with_video_placeholder(self.config.voice_video_placeholder);
        let controller = PeerSessionController::new(self.config.glare_policy);
        let (inbound, inbound_rx) = mpsc::unbounded_channel();
        let (view, _) = watch::channel(CallView::default());
        let (events, _) = broadcast::channel(self.config.event_capacity);

        let inner = Arc::new(Inner {
            config: self.config,
            signal: SignalChannel::new(transport),
            media,
            engine,
            history_store,
            directory,
            controller: Mutex::new(controller),
            identity: RwLock::new(None),
            subscription: AsyncMutex::new(None),
            peer_profile: Mutex::new(None),
            history: RwLock::new(Vec::new()),
            inbound,
            view,
            events,
            event_loop: Mutex::new(None),
        });

        let task = tokio::spawn(run_event_loop(Arc::downgrade(&inner), inbound_rx));
        *inner.event_loop.lock() = Some(task);
        info!("Call orchestrator started");

        let orchestrator = CallOrchestrator { inner };
        if let Some(identity) = self.identity {
            orchestrator.on_auth_state_changed(Some(identity)).await?;
        }
        Ok(orchestrator)
    }
}
