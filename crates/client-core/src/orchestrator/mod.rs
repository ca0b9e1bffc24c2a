//! Call orchestrator
//!
//! The [`CallOrchestrator`] is the public face of the call stack. It wires
//! the signaling channel, the media controller, the peer engine and the
//! peer session controller together and exposes the handful of operations
//! a call screen needs.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       CallOrchestrator                       │
//! │  start_call / accept_incoming / reject_incoming / end_call   │
//! │  toggle_mute / toggle_video / toggle_speaker / history       │
//! └──────────┬──────────────────────────────┬────────────────────┘
//!            │ caller's task                │ event loop task
//!            ▼                              ▼
//! ┌──────────────────────┐      ┌─────────────────────────────────┐
//! │ MediaController      │      │ InboundEvent queue (mpsc)       │
//! │ PeerEngine           │      │   ◀── SignalChannel handler     │
//! └──────────┬───────────┘      │   ◀── EngineEventSink           │
//!            │                  └───────────────┬─────────────────┘
//!            ▼                                  ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │   PeerSessionController (parking_lot::Mutex, never awaited)  │
//! │   event ──▶ transition table ──▶ state + effects             │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                ▼
//!            effects: send signal, apply description/candidate,
//!            write call record, update CallView, tear down
//! ```
//!
//! Every inbound signaling message and engine report is serialized onto one
//! queue and handled by a single task. Public operations run on the
//! caller's task; each of their suspension points is followed by a check
//! that the session they started for is still the live one, so a call that
//! was ended meanwhile never gets resources attached to it.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rtcall_client_core::{CallOrchestrator, InMemoryCallHistory, StaticDirectory};
//! use rtcall_media_core::MockMediaDevices;
//! use rtcall_session_core::MockEngine;
//! use rtcall_signal_core::{InMemorySignalHub, MediaKind, PeerId};
//!
//! # tokio_test::block_on(async {
//! let hub = Arc::new(InMemorySignalHub::new());
//! let alice = CallOrchestrator::builder()
//!     .transport(hub.clone())
//!     .media_devices(Arc::new(MockMediaDevices::new()))
//!     .engine(Arc::new(MockEngine::new()))
//!     .history_store(Arc::new(InMemoryCallHistory::new()))
//!     .directory(Arc::new(StaticDirectory::new().with_peer("bob", "Bob")))
//!     .identity(PeerId::from("alice"))
//!     .build()
//!     .await
//!     .expect("orchestrator");
//!
//! alice.start_call(PeerId::from("bob"), MediaKind::Voice).await.expect("call");
//! assert!(alice.view().active_call.is_some());
//! alice.end_call().await;
//! assert!(alice.view().active_call.is_none());
//! # })
//! ```

mod account;
mod builder;
mod calls;
mod controls;
mod event_loop;

pub use builder::CallOrchestratorBuilder;

use parking_lot::{Mutex, RwLock};
use rtcall_media_core::MediaController;
use rtcall_session_core::{
    CallDirection, PeerEngine, PeerSessionController, RecordDirection, SessionId, SessionSnapshot,
    SessionState,
};
use rtcall_signal_core::{MediaKind, PeerId, SignalChannel, SignalSubscription};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::config::CallConfig;
use crate::directory::{PeerDirectory, PeerProfile};
use crate::error::CallResult;
use crate::events::{ActiveCallView, CallEvent, CallNotice, CallView, IncomingCallView};
use crate::history::{CallHistoryStore, CallRecord};
use event_loop::InboundEvent;

/// Single-call orchestrator for one signed-in user
///
/// Cheap to clone; all clones drive the same state.
#[derive(Clone)]
pub struct CallOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    config: CallConfig,
    signal: SignalChannel,
    media: MediaController,
    engine: Arc<dyn PeerEngine>,
    history_store: Arc<dyn CallHistoryStore>,
    directory: Arc<dyn PeerDirectory>,
    controller: Mutex<PeerSessionController>,
    identity: RwLock<Option<PeerId>>,
    /// Held for the whole of an auth state change
    subscription: AsyncMutex<Option<SignalSubscription>>,
    /// Profile of the peer of the current session
    peer_profile: Mutex<Option<(SessionId, PeerProfile)>>,
    /// Newest-first cache of the store
    history: RwLock<Vec<CallRecord>>,
    inbound: mpsc::UnboundedSender<InboundEvent>,
    view: watch::Sender<CallView>,
    events: broadcast::Sender<CallEvent>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.event_loop.lock().take() {
            task.abort();
        }
    }
}

impl CallOrchestrator {
    pub fn builder() -> CallOrchestratorBuilder {
        CallOrchestratorBuilder::new()
    }

    /// Place a call to `peer`
    ///
    /// Returns once the offer has been sent. The call then progresses on
    /// its own; watch [`subscribe_view`](Self::subscribe_view) or
    /// [`subscribe_events`](Self::subscribe_events) for the outcome.
    pub async fn start_call(&self, peer: PeerId, kind: MediaKind) -> CallResult<SessionId> {
        self.inner.start_call(peer, kind).await
    }

    /// Pick up the ringing incoming call
    pub async fn accept_incoming(&self) -> CallResult<()> {
        self.inner.accept_incoming().await
    }

    /// Decline the ringing incoming call; a no-op if nothing is ringing
    pub async fn reject_incoming(&self) {
        self.inner.reject_incoming().await
    }

    /// Hang up whatever call is in progress; a no-op when idle
    pub async fn end_call(&self) {
        self.inner.end_call().await
    }

    /// Flip the microphone; returns the new muted flag
    pub fn toggle_mute(&self) -> bool {
        self.inner.toggle_mute()
    }

    /// Flip the camera; returns whether video is now on
    pub fn toggle_video(&self) -> bool {
        self.inner.toggle_video()
    }

    /// Switch between speaker and earpiece; returns the new speaker flag
    pub async fn toggle_speaker(&self) -> bool {
        self.inner.toggle_speaker().await
    }

    /// Sign in (`Some`) or out (`None`)
    ///
    /// Signing in opens the signaling channel for the identity and loads
    /// the call history. Signing out ends any call, closes the channel and
    /// forgets the cached history.
    pub async fn on_auth_state_changed(&self, identity: Option<PeerId>) -> CallResult<()> {
        self.inner.on_auth_state_changed(identity).await
    }

    /// Cached call history, newest first
    pub fn call_history(&self) -> Vec<CallRecord> {
        self.inner.history.read().clone()
    }

    /// Reload the call history from the store
    pub async fn refresh_history(&self) -> CallResult<Vec<CallRecord>> {
        self.inner.refresh_history().await
    }

    /// Write a call record and prepend it to the cache
    pub async fn add_call_record(
        &self,
        peer: &PeerId,
        direction: RecordDirection,
        kind: MediaKind,
    ) -> CallResult<CallRecord> {
        self.inner.add_call_record(peer, direction, kind).await
    }

    /// Delete every call record of the signed-in user
    pub async fn clear_history(&self) -> CallResult<()> {
        self.inner.clear_history().await
    }

    /// Current UI state
    pub fn view(&self) -> CallView {
        self.inner.view.borrow().clone()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<CallView> {
        self.inner.view.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CallEvent> {
        self.inner.events.subscribe()
    }

    /// Identity the signaling channel is open for
    pub fn local_identity(&self) -> Option<PeerId> {
        self.inner.identity()
    }

    /// State of the current (or last) session
    pub fn session_state(&self) -> SessionState {
        self.inner.controller.lock().current_state()
    }

    pub fn session_snapshot(&self) -> Option<SessionSnapshot> {
        self.inner.controller.lock().snapshot()
    }

    pub fn config(&self) -> &CallConfig {
        &self.inner.config
    }

    /// Sign out and stop the event loop
    pub async fn shutdown(&self) {
        if let Err(e) = self.inner.on_auth_state_changed(None).await {
            warn!("Error while signing out during shutdown: {}", e);
        }
        if let Some(task) = self.inner.event_loop.lock().take() {
            task.abort();
        }
    }
}

impl Inner {
    fn identity(&self) -> Option<PeerId> {
        self.identity.read().clone()
    }

    fn emit(&self, event: CallEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    fn notify(&self, notice: CallNotice) {
        self.emit(CallEvent::Notice(notice));
    }

    fn remember_peer(&self, session_id: SessionId, profile: PeerProfile) {
        *self.peer_profile.lock() = Some((session_id, profile));
    }

    fn display_name(&self, session_id: &SessionId, peer: &PeerId) -> String {
        match self.peer_profile.lock().as_ref() {
            Some((id, profile)) if id == session_id => profile.display_name.clone(),
            _ => peer.to_string(),
        }
    }

    /// Rebuild the call part of the view from the session
    fn refresh_view(&self) {
        let snapshot = self
            .controller
            .lock()
            .snapshot()
            .filter(|s| s.state.is_active());

        let (active_call, incoming_call) = match snapshot {
            Some(s) if s.state == SessionState::RingingLocal => {
                let incoming = IncomingCallView {
                    session_id: s.id,
                    display_name: self.display_name(&s.id, &s.peer_id),
                    peer_id: s.peer_id,
                    media_kind: s.media_kind,
                };
                (None, Some(incoming))
            }
            Some(s) => {
                let active = ActiveCallView {
                    session_id: s.id,
                    display_name: self.display_name(&s.id, &s.peer_id),
                    peer_id: s.peer_id,
                    media_kind: s.media_kind,
                    is_incoming: s.direction == CallDirection::Incoming,
                    state: s.state,
                    status: s.status_text.to_string(),
                };
                (Some(active), None)
            }
            None => (None, None),
        };

        self.view.send_modify(|view| {
            view.active_call = active_call;
            view.incoming_call = incoming_call;
        });
    }
}
