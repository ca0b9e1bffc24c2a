//! Call session record and the teardown it produces

use rtcall_media_core::{LocalMediaHandle, MediaController};
use rtcall_signal_core::{IceCandidate, MediaKind, PeerId, SessionDescription};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tracing::{debug, error, info};

use crate::engine::{PeerConnection, RemoteStream};
use crate::types::{CallDirection, EndReason, SessionId, SessionState};

/// One call attempt, from creation to teardown
pub struct CallSession {
    pub id: SessionId,
    /// Our own identity at the time the session started
    pub local_id: PeerId,
    pub peer_id: PeerId,
    pub direction: CallDirection,
    pub media_kind: MediaKind,
    pub state: SessionState,
    pub local_description: Option<SessionDescription>,
    pub remote_description: Option<SessionDescription>,
    /// Whether the engine has accepted the remote description
    pub remote_description_applied: bool,
    /// Candidates received before the remote description was applied
    pub pending_remote_candidates: VecDeque<IceCandidate>,
    /// Candidates gathered before our offer or answer went out
    pub pending_local_candidates: Vec<IceCandidate>,
    pub local_media: Option<LocalMediaHandle>,
    pub remote_stream: Option<Weak<RemoteStream>>,
    pub connection: Option<Arc<dyn PeerConnection>>,
    /// Serializes remote description and candidate application
    pub negotiation_lock: Arc<AsyncMutex<()>>,
    /// Set once teardown has started
    pub ending: bool,
    /// Incoming call was picked up
    pub accepted: bool,
    /// Engine reported connected before the answer went out
    pub connected_early: bool,
    pub end_reason: Option<EndReason>,
}

impl CallSession {
    pub fn outgoing(local_id: PeerId, peer_id: PeerId, media_kind: MediaKind) -> Self {
        Self::new(local_id, peer_id, CallDirection::Outgoing, media_kind)
    }

    pub fn incoming(
        local_id: PeerId,
        peer_id: PeerId,
        media_kind: MediaKind,
        offer: SessionDescription,
    ) -> Self {
        let mut session = Self::new(local_id, peer_id, CallDirection::Incoming, media_kind);
        session.remote_description = Some(offer);
        session
    }

    fn new(
        local_id: PeerId,
        peer_id: PeerId,
        direction: CallDirection,
        media_kind: MediaKind,
    ) -> Self {
        Self {
            id: SessionId::new(),
            local_id,
            peer_id,
            direction,
            media_kind,
            state: SessionState::Idle,
            local_description: None,
            remote_description: None,
            remote_description_applied: false,
            pending_remote_candidates: VecDeque::new(),
            pending_local_candidates: Vec::new(),
            local_media: None,
            remote_stream: None,
            connection: None,
            negotiation_lock: Arc::new(AsyncMutex::new(())),
            ending: false,
            accepted: false,
            connected_early: false,
            end_reason: None,
        }
    }

    pub fn status_text(&self) -> &'static str {
        self.state.status_text()
    }

    /// Whether the session still belongs to a live call
    pub fn is_live(&self) -> bool {
        !self.ending && !self.state.is_terminal()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            peer_id: self.peer_id.clone(),
            direction: self.direction,
            media_kind: self.media_kind,
            state: self.state,
            status_text: self.status_text(),
            accepted: self.accepted,
            has_local_media: self.local_media.is_some(),
            has_connection: self.connection.is_some(),
            remote_stream: self.remote_stream.as_ref().and_then(Weak::upgrade),
            end_reason: self.end_reason.clone(),
        }
    }

    /// Negotiation handle, if a connection is attached
    pub fn negotiation(&self) -> Option<Negotiation> {
        self.connection.as_ref().map(|connection| Negotiation {
            session_id: self.id,
            connection: connection.clone(),
            lock: self.negotiation_lock.clone(),
        })
    }

    /// Move every resource out and mark the session as ending
    pub(crate) fn take_for_teardown(&mut self, reason: EndReason) -> Teardown {
        self.ending = true;
        self.state = reason.final_state();
        self.end_reason = Some(reason.clone());

        let local_media = self.local_media.take();
        let connection = self.connection.take();
        let remote_stream = self.remote_stream.take();
        self.local_description = None;
        self.remote_description = None;
        self.remote_description_applied = false;
        self.pending_remote_candidates.clear();
        self.pending_local_candidates.clear();

        Teardown {
            session_id: self.id,
            peer_id: self.peer_id.clone(),
            direction: self.direction,
            media_kind: self.media_kind,
            final_state: self.state,
            reason,
            accepted: self.accepted,
            local_media,
            remote_stream,
            connection,
        }
    }
}

impl fmt::Debug for CallSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSession")
            .field("id", &self.id)
            .field("peer_id", &self.peer_id)
            .field("direction", &self.direction)
            .field("media_kind", &self.media_kind)
            .field("state", &self.state)
            .field("pending_remote_candidates", &self.pending_remote_candidates.len())
            .field("ending", &self.ending)
            .finish()
    }
}

/// Read-only view of the current session
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub peer_id: PeerId,
    pub direction: CallDirection,
    pub media_kind: MediaKind,
    pub state: SessionState,
    pub status_text: &'static str,
    pub accepted: bool,
    pub has_local_media: bool,
    pub has_connection: bool,
    pub remote_stream: Option<Arc<RemoteStream>>,
    pub end_reason: Option<EndReason>,
}

/// Access to a session's connection for negotiation steps
#[derive(Clone)]
pub struct Negotiation {
    pub session_id: SessionId,
    pub connection: Arc<dyn PeerConnection>,
    lock: Arc<AsyncMutex<()>>,
}

impl Negotiation {
    /// Hold the per-session negotiation lock
    pub async fn lock(&self) -> AsyncMutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl fmt::Debug for Negotiation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Negotiation")
            .field("session_id", &self.session_id)
            .finish()
    }
}

/// Resources taken out of an ending session
///
/// Produced at most once per session. Executing it releases the local media
/// first, then closes the connection.
pub struct Teardown {
    pub session_id: SessionId,
    pub peer_id: PeerId,
    pub direction: CallDirection,
    pub media_kind: MediaKind,
    pub final_state: SessionState,
    pub reason: EndReason,
    pub accepted: bool,
    local_media: Option<LocalMediaHandle>,
    remote_stream: Option<Weak<RemoteStream>>,
    connection: Option<Arc<dyn PeerConnection>>,
}

impl Teardown {
    /// Incoming call that ended without being picked up
    pub fn is_missed(&self) -> bool {
        self.direction == CallDirection::Incoming && !self.accepted
    }

    /// Release media and close the connection
    pub fn execute(mut self, media: &MediaController) -> TeardownSummary {
        let media_released = match self.local_media.take() {
            Some(handle) => media.release(&handle),
            None => false,
        };
        self.remote_stream = None;

        let connection_closed = match self.connection.take() {
            Some(connection) => match connection.close() {
                Ok(()) => true,
                Err(e) => {
                    error!("Failed to close connection of {}: {}", self.session_id, e);
                    false
                }
            },
            None => false,
        };

        info!(
            "Session {} with {} torn down ({}): media released {}, connection closed {}",
            self.session_id, self.peer_id, self.reason, media_released, connection_closed
        );

        TeardownSummary {
            session_id: self.session_id,
            peer_id: self.peer_id.clone(),
            direction: self.direction,
            media_kind: self.media_kind,
            final_state: self.final_state,
            missed: self.is_missed(),
            reason: self.reason.clone(),
            media_released,
            connection_closed,
        }
    }
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Teardown")
            .field("session_id", &self.session_id)
            .field("reason", &self.reason)
            .field("has_media", &self.local_media.is_some())
            .field("has_connection", &self.connection.is_some())
            .finish()
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        if self.local_media.is_some() || self.connection.is_some() {
            debug!("Teardown for {} dropped without being executed", self.session_id);
        }
    }
}

/// What a teardown did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownSummary {
    pub session_id: SessionId,
    pub peer_id: PeerId,
    pub direction: CallDirection,
    pub media_kind: MediaKind,
    pub final_state: SessionState,
    pub reason: EndReason,
    pub missed: bool,
    pub media_released: bool,
    pub connection_closed: bool,
}
