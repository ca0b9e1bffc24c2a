//! Memory-backed capture devices for tests and demos
//!
//! Nothing here touches real hardware. Every track handed out is remembered
//! so tests can check that each one was stopped exactly once, and
//! acquisitions can be held at a gate to model a permission prompt the user
//! has not answered yet.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tracing::debug;

use crate::device::{MediaDevices, MediaTrack};
use crate::error::{MediaError, MediaResult};
use crate::types::{DeviceKind, MediaConstraints, MediaDeviceInfo, TrackKind};

/// A capture track that only records what was done to it
#[derive(Debug)]
pub struct MockTrack {
    id: String,
    kind: TrackKind,
    enabled: AtomicBool,
    stopped: AtomicBool,
    stop_count: AtomicUsize,
}

impl MockTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            kind,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
            stop_count: AtomicUsize::new(0),
        }
    }

    /// How many times `stop` was called
    pub fn stop_count(&self) -> usize {
        self.stop_count.load(Ordering::SeqCst)
    }
}

impl MediaTrack for MockTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stop_count.fetch_add(1, Ordering::SeqCst);
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct MockState {
    denied: Option<String>,
    has_microphone: bool,
    has_camera: bool,
    output_selection: bool,
    outputs: Vec<MediaDeviceInfo>,
    routed: Vec<String>,
}

/// Scriptable [`MediaDevices`] backend
pub struct MockMediaDevices {
    state: Mutex<MockState>,
    issued: Mutex<Vec<Arc<MockTrack>>>,
    requests: AtomicUsize,
    gate: watch::Sender<bool>,
    request_started: Notify,
}

impl MockMediaDevices {
    /// A backend with a microphone, a camera, and a default plus a
    /// loudspeaker output
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            state: Mutex::new(MockState {
                denied: None,
                has_microphone: true,
                has_camera: true,
                output_selection: true,
                outputs: vec![
                    MediaDeviceInfo::new("default", "Default - Earpiece", DeviceKind::AudioOutput),
                    MediaDeviceInfo::new("out-speaker", "Built-in Speaker", DeviceKind::AudioOutput),
                ],
                routed: Vec::new(),
            }),
            issued: Mutex::new(Vec::new()),
            requests: AtomicUsize::new(0),
            gate,
            request_started: Notify::new(),
        }
    }

    /// Refuse every capture request as if the user blocked the prompt
    pub fn deny_access(&self, reason: impl Into<String>) {
        self.state.lock().denied = Some(reason.into());
    }

    pub fn allow_access(&self) {
        self.state.lock().denied = None;
    }

    pub fn set_camera_present(&self, present: bool) {
        self.state.lock().has_camera = present;
    }

    pub fn set_microphone_present(&self, present: bool) {
        self.state.lock().has_microphone = present;
    }

    pub fn set_output_selection_supported(&self, supported: bool) {
        self.state.lock().output_selection = supported;
    }

    pub fn set_outputs(&self, outputs: Vec<MediaDeviceInfo>) {
        self.state.lock().outputs = outputs;
    }

    /// Park every capture request until [`open_gate`](Self::open_gate)
    pub fn hold_acquisitions(&self) {
        self.gate.send_replace(false);
    }

    pub fn open_gate(&self) {
        self.gate.send_replace(true);
    }

    /// Resolves once a capture request has reached the backend
    pub async fn request_started(&self) {
        self.request_started.notified().await;
    }

    /// Number of capture requests made so far
    pub fn acquisition_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Every track handed out so far
    pub fn issued_tracks(&self) -> Vec<Arc<MockTrack>> {
        self.issued.lock().clone()
    }

    /// Tracks that were handed out and are still capturing
    pub fn live_tracks(&self) -> usize {
        self.issued.lock().iter().filter(|t| !t.is_stopped()).count()
    }

    /// Whether any handed-out track was stopped more than once
    pub fn any_double_stop(&self) -> bool {
        self.issued.lock().iter().any(|t| t.stop_count() > 1)
    }

    /// Output device ids routed to, in order
    pub fn routed_outputs(&self) -> Vec<String> {
        self.state.lock().routed.clone()
    }
}

impl Default for MockMediaDevices {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaDevices for MockMediaDevices {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> MediaResult<Vec<Arc<dyn MediaTrack>>> {
        let request = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        self.request_started.notify_one();

        let mut gate = self.gate.subscribe();
        let opened = gate.wait_for(|open| *open).await.is_ok();
        if !opened {
            return Err(MediaError::platform("capture gate closed"));
        }

        let (denied, has_microphone, has_camera) = {
            let state = self.state.lock();
            (state.denied.clone(), state.has_microphone, state.has_camera)
        };

        if let Some(reason) = denied {
            return Err(MediaError::access_denied(reason));
        }
        if constraints.audio && !has_microphone {
            return Err(MediaError::device_unavailable("no microphone found"));
        }
        if constraints.video && !has_camera {
            return Err(MediaError::device_unavailable("no camera found"));
        }

        let mut tracks: Vec<Arc<MockTrack>> = Vec::new();
        if constraints.audio {
            tracks.push(Arc::new(MockTrack::new(format!("mic-{}", request), TrackKind::Audio)));
        }
        if constraints.video {
            tracks.push(Arc::new(MockTrack::new(format!("cam-{}", request), TrackKind::Video)));
        }
        debug!("Mock capture request {} produced {} tracks", request, tracks.len());

        self.issued.lock().extend(tracks.iter().cloned());
        Ok(tracks
            .into_iter()
            .map(|t| t as Arc<dyn MediaTrack>)
            .collect())
    }

    async fn enumerate_devices(&self) -> MediaResult<Vec<MediaDeviceInfo>> {
        let state = self.state.lock();
        let mut devices = Vec::new();
        if state.has_microphone {
            devices.push(MediaDeviceInfo::new("mic", "Built-in Microphone", DeviceKind::AudioInput));
        }
        if state.has_camera {
            devices.push(MediaDeviceInfo::new("cam", "Built-in Camera", DeviceKind::VideoInput));
        }
        devices.extend(state.outputs.iter().cloned());
        Ok(devices)
    }

    fn supports_output_selection(&self) -> bool {
        self.state.lock().output_selection
    }

    async fn set_output_device(&self, device_id: &str) -> MediaResult<()> {
        let mut state = self.state.lock();
        if !state.output_selection {
            return Err(MediaError::unsupported("set_output_device"));
        }
        state.routed.push(device_id.to_string());
        Ok(())
    }
}
