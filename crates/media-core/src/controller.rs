//! Media controller
//!
//! Policy layer over a [`MediaDevices`] backend: what to capture for a call,
//! how mute and camera toggles map onto track enablement, and where remote
//! audio is routed.

use rtcall_signal_core::MediaKind;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::device::{MediaDevices, MediaTrack};
use crate::error::{MediaError, MediaResult};
use crate::handle::LocalMediaHandle;
use crate::types::{DeviceKind, DeviceSelection, MediaConstraints, TrackKind};

/// Device id most platforms use for the default output
const DEFAULT_OUTPUT_ID: &str = "default";

/// Acquires, toggles, routes and releases local media
pub struct MediaController {
    devices: Arc<dyn MediaDevices>,
    video_placeholder: bool,
}

impl MediaController {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            devices,
            video_placeholder: false,
        }
    }

    /// Also capture a (disabled) camera track for voice calls
    pub fn with_video_placeholder(mut self, enabled: bool) -> Self {
        self.video_placeholder = enabled;
        self
    }

    /// Capture local media for a call of `kind`
    ///
    /// The microphone is mandatory. Voice calls keep any captured camera
    /// track disabled.
    pub async fn acquire_local_media(&self, kind: MediaKind) -> MediaResult<LocalMediaHandle> {
        let constraints = MediaConstraints::for_call(kind, self.video_placeholder);
        debug!("Requesting local media {:?} for {} call", constraints, kind);

        let tracks = self.devices.get_user_media(&constraints).await?;

        let has_audio = tracks.iter().any(|t| t.kind() == TrackKind::Audio);
        let has_video = tracks.iter().any(|t| t.kind() == TrackKind::Video);
        if !has_audio || (kind.wants_video() && !has_video) {
            let missing = if has_audio { "camera" } else { "microphone" };
            stop_all(&tracks);
            warn!("Capture backend returned no {} track", missing);
            return Err(MediaError::device_unavailable(format!("no {} available", missing)));
        }

        if !kind.wants_video() {
            for track in tracks.iter().filter(|t| t.kind() == TrackKind::Video) {
                track.set_enabled(false);
            }
        }

        let handle = LocalMediaHandle::new(kind, tracks);
        info!(
            "Acquired local media {} ({} tracks) for {} call",
            handle.id(),
            handle.tracks().len(),
            kind
        );
        Ok(handle)
    }

    /// Flip the microphone; returns the new muted state
    pub fn toggle_audio_enabled(&self, handle: &LocalMediaHandle) -> bool {
        let enabled = toggle_kind(handle, TrackKind::Audio);
        debug!("Microphone {}", if enabled { "unmuted" } else { "muted" });
        !enabled
    }

    /// Flip the camera; returns whether video is now on
    pub fn toggle_video_enabled(&self, handle: &LocalMediaHandle) -> bool {
        let enabled = toggle_kind(handle, TrackKind::Video);
        debug!("Camera {}", if enabled { "on" } else { "off" });
        enabled
    }

    /// Route remote audio to the loudspeaker or back to the default output
    ///
    /// Returns [`DeviceSelection::Unsupported`] on platforms that cannot
    /// choose an output; that is a notice for the user, not a failure.
    pub async fn select_output_device(&self, prefer_speaker: bool) -> MediaResult<DeviceSelection> {
        if !self.devices.supports_output_selection() {
            info!("Output device selection is not supported on this platform");
            return Ok(DeviceSelection::Unsupported);
        }

        let outputs: Vec<_> = self
            .devices
            .enumerate_devices()
            .await?
            .into_iter()
            .filter(|d| d.kind == DeviceKind::AudioOutput)
            .collect();

        let speaker = outputs.iter().find(|d| d.looks_like_speaker());
        let default = outputs.iter().find(|d| d.device_id == DEFAULT_OUTPUT_ID);

        let target = match (prefer_speaker, speaker) {
            (true, Some(speaker)) => Some(speaker),
            _ => default,
        };

        let (device_id, label) = match target {
            Some(device) => (device.device_id.clone(), Some(device.label.clone())),
            None => (String::new(), None),
        };

        self.devices.set_output_device(&device_id).await?;

        let speaker = target.map(|d| d.looks_like_speaker()).unwrap_or(false);
        info!(
            "Routed call audio to {} (speaker: {})",
            label.as_deref().unwrap_or("platform default"),
            speaker
        );
        Ok(DeviceSelection::Selected {
            device_id,
            label,
            speaker,
        })
    }

    /// Stop every track of `handle`
    ///
    /// Safe to call any number of times; returns true only for the call that
    /// actually released the tracks.
    pub fn release(&self, handle: &LocalMediaHandle) -> bool {
        let released = handle.release_tracks();
        if released {
            info!("Released local media {}", handle.id());
        } else {
            debug!("Local media {} was already released", handle.id());
        }
        released
    }
}

fn stop_all(tracks: &[Arc<dyn MediaTrack>]) {
    for track in tracks {
        if !track.is_stopped() {
            track.stop();
        }
    }
}

/// Flip every track of `kind` and return the new enabled state
fn toggle_kind(handle: &LocalMediaHandle, kind: TrackKind) -> bool {
    if handle.is_released() {
        return false;
    }
    let currently = handle.tracks_of(kind).any(|t| t.is_enabled());
    let next = !currently;
    let mut touched = false;
    for track in handle.tracks_of(kind) {
        track.set_enabled(next);
        touched = true;
    }
    touched && next
}
