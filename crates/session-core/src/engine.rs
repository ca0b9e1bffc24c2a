//! Peer engine contract
//!
//! The engine is the WebRTC-equivalent that actually produces and applies
//! session descriptions, gathers candidates and moves media. The session
//! layer only drives it; everything the engine reports back arrives as an
//! [`EngineEvent`] through the [`EngineEventSink`] the connection was
//! created with.

use async_trait::async_trait;
use rtcall_media_core::{LocalMediaHandle, TrackKind};
use rtcall_signal_core::{IceCandidate, SessionDescription};
use std::fmt;
use std::sync::Arc;

use crate::error::EngineResult;
use crate::types::{ConnectionState, IceConfig, SessionId};

/// Media stream received from the peer
///
/// Owned by the engine. Sessions only keep a weak reference to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub id: String,
    pub track_kinds: Vec<TrackKind>,
}

/// Something the engine reports about one connection
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A local connectivity candidate was gathered
    LocalCandidate(IceCandidate),
    /// The peer's media stream became available
    RemoteTrack(Arc<RemoteStream>),
    /// Connectivity changed
    ConnectionStateChanged(ConnectionState),
}

/// Where a connection delivers its events, tagged with the owning session
#[derive(Clone)]
pub struct EngineEventSink {
    session_id: SessionId,
    deliver: Arc<dyn Fn(SessionId, EngineEvent) + Send + Sync>,
}

impl EngineEventSink {
    pub fn new(
        session_id: SessionId,
        deliver: Arc<dyn Fn(SessionId, EngineEvent) + Send + Sync>,
    ) -> Self {
        Self {
            session_id,
            deliver,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn emit(&self, event: EngineEvent) {
        (self.deliver)(self.session_id, event);
    }
}

impl fmt::Debug for EngineEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineEventSink")
            .field("session_id", &self.session_id)
            .finish()
    }
}

/// Factory for peer connections
#[async_trait]
pub trait PeerEngine: Send + Sync {
    async fn create_connection(
        &self,
        config: &IceConfig,
        events: EngineEventSink,
    ) -> EngineResult<Arc<dyn PeerConnection>>;
}

/// One peer-to-peer connection
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Attach every local track for sending
    async fn add_local_media(&self, media: &LocalMediaHandle) -> EngineResult<()>;

    async fn create_offer(&self) -> EngineResult<SessionDescription>;

    async fn create_answer(&self) -> EngineResult<SessionDescription>;

    async fn set_local_description(&self, description: SessionDescription) -> EngineResult<()>;

    async fn set_remote_description(&self, description: SessionDescription) -> EngineResult<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> EngineResult<()>;

    /// Close the connection and stop all transceivers
    fn close(&self) -> EngineResult<()>;
}
