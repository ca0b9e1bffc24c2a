//! Scriptable in-memory peer engine for tests and demos
//!
//! Descriptions are fake SDP text, candidates are generated on
//! `set_local_description`, and a connection reports itself connected as
//! soon as both descriptions are in place (unless auto-connect is off).
//! Every operation is logged so tests can check ordering.

use async_trait::async_trait;
use parking_lot::Mutex;
use rtcall_media_core::{LocalMediaHandle, TrackKind};
use rtcall_signal_core::{IceCandidate, SdpType, SessionDescription};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tracing::debug;
use uuid::Uuid;

use crate::engine::{EngineEvent, EngineEventSink, PeerConnection, PeerEngine, RemoteStream};
use crate::error::{EngineError, EngineResult};
use crate::types::{ConnectionState, IceConfig};

/// One operation performed on a [`MockConnection`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOp {
    AddLocalMedia(Uuid),
    CreateOffer,
    CreateAnswer,
    SetLocalDescription(SdpType),
    SetRemoteDescription(SdpType),
    AddIceCandidate(String),
    Close,
}

#[derive(Debug, Clone)]
struct MockSettings {
    auto_connect: bool,
    local_candidates: usize,
    fail_connections: bool,
    fail_offers: bool,
    fail_answers: bool,
    fail_remote_descriptions: bool,
    reject_candidates_containing: Option<String>,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            auto_connect: true,
            local_candidates: 1,
            fail_connections: false,
            fail_offers: false,
            fail_answers: false,
            fail_remote_descriptions: false,
            reject_candidates_containing: None,
        }
    }
}

struct Shared {
    settings: Mutex<MockSettings>,
    remote_gate: watch::Sender<bool>,
    remote_started: Notify,
}

/// In-memory [`PeerEngine`]
pub struct MockEngine {
    shared: Arc<Shared>,
    connections: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockEngine {
    pub fn new() -> Self {
        let (remote_gate, _) = watch::channel(true);
        Self {
            shared: Arc::new(Shared {
                settings: Mutex::new(MockSettings::default()),
                remote_gate,
                remote_started: Notify::new(),
            }),
            connections: Mutex::new(Vec::new()),
        }
    }

    /// Report connected once both descriptions are applied
    pub fn set_auto_connect(&self, enabled: bool) {
        self.shared.settings.lock().auto_connect = enabled;
    }

    /// Local candidates gathered per `set_local_description`
    pub fn set_local_candidates(&self, count: usize) {
        self.shared.settings.lock().local_candidates = count;
    }

    pub fn fail_connections(&self, fail: bool) {
        self.shared.settings.lock().fail_connections = fail;
    }

    pub fn fail_offers(&self, fail: bool) {
        self.shared.settings.lock().fail_offers = fail;
    }

    pub fn fail_answers(&self, fail: bool) {
        self.shared.settings.lock().fail_answers = fail;
    }

    pub fn fail_remote_descriptions(&self, fail: bool) {
        self.shared.settings.lock().fail_remote_descriptions = fail;
    }

    /// Reject remote candidates whose text contains `pattern`
    pub fn reject_candidates_containing(&self, pattern: Option<&str>) {
        self.shared.settings.lock().reject_candidates_containing = pattern.map(str::to_string);
    }

    /// Park `set_remote_description` calls until released
    pub fn hold_remote_descriptions(&self) {
        self.shared.remote_gate.send_replace(false);
    }

    pub fn release_remote_descriptions(&self) {
        self.shared.remote_gate.send_replace(true);
    }

    /// Resolves once a `set_remote_description` call has started
    pub async fn remote_description_started(&self) {
        self.shared.remote_started.notified().await;
    }

    pub fn connections(&self) -> Vec<Arc<MockConnection>> {
        self.connections.lock().clone()
    }

    pub fn last_connection(&self) -> Option<Arc<MockConnection>> {
        self.connections.lock().last().cloned()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerEngine for MockEngine {
    async fn create_connection(
        &self,
        config: &IceConfig,
        events: EngineEventSink,
    ) -> EngineResult<Arc<dyn PeerConnection>> {
        if self.shared.settings.lock().fail_connections {
            return Err(EngineError::connection_creation("scripted connection failure"));
        }

        let mut connections = self.connections.lock();
        let connection = Arc::new(MockConnection {
            id: format!("pc-{}", connections.len() + 1),
            shared: self.shared.clone(),
            sink: events,
            ice_servers: config.ice_servers.len(),
            local: Mutex::new(None),
            remote: Mutex::new(None),
            remote_stream: Mutex::new(None),
            ops: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            close_count: AtomicUsize::new(0),
        });
        debug!(
            "Mock engine created {} for {}",
            connection.id,
            connection.sink.session_id()
        );
        connections.push(connection.clone());
        Ok(connection)
    }
}

/// In-memory [`PeerConnection`]
pub struct MockConnection {
    id: String,
    shared: Arc<Shared>,
    sink: EngineEventSink,
    ice_servers: usize,
    local: Mutex<Option<SessionDescription>>,
    remote: Mutex<Option<SessionDescription>>,
    remote_stream: Mutex<Option<Arc<RemoteStream>>>,
    ops: Mutex<Vec<MockOp>>,
    connected: AtomicBool,
    closed: AtomicBool,
    close_count: AtomicUsize,
}

impl MockConnection {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of ICE servers the connection was configured with
    pub fn ice_server_count(&self) -> usize {
        self.ice_servers
    }

    /// Inject an engine event as if the engine produced it
    pub fn emit(&self, event: EngineEvent) {
        self.sink.emit(event);
    }

    pub fn operations(&self) -> Vec<MockOp> {
        self.ops.lock().clone()
    }

    /// Remote candidates applied successfully, in order
    pub fn applied_candidates(&self) -> Vec<String> {
        self.ops
            .lock()
            .iter()
            .filter_map(|op| match op {
                MockOp::AddIceCandidate(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn local_description(&self) -> Option<SessionDescription> {
        self.local.lock().clone()
    }

    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.remote.lock().clone()
    }

    /// The stream this connection handed out, kept alive by the engine
    pub fn remote_stream(&self) -> Option<Arc<RemoteStream>> {
        self.remote_stream.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    fn record(&self, op: MockOp) {
        self.ops.lock().push(op);
    }

    fn ensure_open(&self) -> EngineResult<()> {
        if self.is_closed() {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }

    fn fake_description(&self, sdp_type: SdpType) -> SessionDescription {
        let sdp = format!(
            "v=0\r\no=- {} 1 IN IP4 127.0.0.1\r\ns=mock {:?}\r\nt=0 0\r\n",
            self.id, sdp_type
        );
        SessionDescription { sdp_type, sdp }
    }

    fn maybe_connect(&self) {
        if !self.shared.settings.lock().auto_connect {
            return;
        }
        let ready = self.local.lock().is_some() && self.remote.lock().is_some();
        if !ready || self.connected.swap(true, Ordering::SeqCst) {
            return;
        }

        let stream = Arc::new(RemoteStream {
            id: format!("{}-remote", self.id),
            track_kinds: vec![TrackKind::Audio, TrackKind::Video],
        });
        *self.remote_stream.lock() = Some(stream.clone());
        self.sink.emit(EngineEvent::RemoteTrack(stream));
        self.sink
            .emit(EngineEvent::ConnectionStateChanged(ConnectionState::Connecting));
        self.sink
            .emit(EngineEvent::ConnectionStateChanged(ConnectionState::Connected));
    }
}

#[async_trait]
impl PeerConnection for MockConnection {
    async fn add_local_media(&self, media: &LocalMediaHandle) -> EngineResult<()> {
        self.ensure_open()?;
        self.record(MockOp::AddLocalMedia(media.id()));
        Ok(())
    }

    async fn create_offer(&self) -> EngineResult<SessionDescription> {
        self.ensure_open()?;
        if self.shared.settings.lock().fail_offers {
            return Err(EngineError::negotiation("scripted offer failure"));
        }
        self.record(MockOp::CreateOffer);
        Ok(self.fake_description(SdpType::Offer))
    }

    async fn create_answer(&self) -> EngineResult<SessionDescription> {
        self.ensure_open()?;
        if self.shared.settings.lock().fail_answers {
            return Err(EngineError::negotiation("scripted answer failure"));
        }
        if self.remote.lock().is_none() {
            return Err(EngineError::negotiation("no remote offer to answer"));
        }
        self.record(MockOp::CreateAnswer);
        Ok(self.fake_description(SdpType::Answer))
    }

    async fn set_local_description(&self, description: SessionDescription) -> EngineResult<()> {
        self.ensure_open()?;
        self.record(MockOp::SetLocalDescription(description.sdp_type));
        *self.local.lock() = Some(description);

        let count = self.shared.settings.lock().local_candidates;
        for index in 0..count {
            let candidate = IceCandidate::new(format!(
                "candidate:{}{} 1 udp 2122260223 192.0.2.{} {} typ host",
                self.id,
                index,
                index + 1,
                50000 + index
            ))
            .with_mid("0", 0);
            self.sink.emit(EngineEvent::LocalCandidate(candidate));
        }

        self.maybe_connect();
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> EngineResult<()> {
        self.shared.remote_started.notify_one();
        let mut gate = self.shared.remote_gate.subscribe();
        let opened = gate.wait_for(|open| *open).await.is_ok();
        if !opened {
            return Err(EngineError::negotiation("engine shut down"));
        }

        self.ensure_open()?;
        if self.shared.settings.lock().fail_remote_descriptions {
            return Err(EngineError::negotiation("scripted remote description failure"));
        }
        self.record(MockOp::SetRemoteDescription(description.sdp_type));
        *self.remote.lock() = Some(description);
        self.maybe_connect();
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> EngineResult<()> {
        self.ensure_open()?;
        if self.remote.lock().is_none() {
            return Err(EngineError::candidate("remote description not set"));
        }
        let rejected = self
            .shared
            .settings
            .lock()
            .reject_candidates_containing
            .as_deref()
            .map(|pattern| candidate.candidate.contains(pattern))
            .unwrap_or(false);
        if rejected {
            return Err(EngineError::candidate(format!(
                "scripted rejection of {}",
                candidate.candidate
            )));
        }
        self.record(MockOp::AddIceCandidate(candidate.candidate));
        Ok(())
    }

    fn close(&self) -> EngineResult<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }
        self.record(MockOp::Close);
        debug!("Mock connection {} closed", self.id);
        Ok(())
    }
}
