//! Device and track descriptors

use rtcall_signal_core::MediaKind;
use std::fmt;

/// Kind of a single capture track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// What to ask the capture backend for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl MediaConstraints {
    /// Constraints for a call of `kind`
    ///
    /// The microphone is always requested. The camera is requested for video
    /// calls, and for voice calls only when `video_placeholder` is set.
    pub fn for_call(kind: MediaKind, video_placeholder: bool) -> Self {
        Self {
            audio: true,
            video: kind.wants_video() || video_placeholder,
        }
    }
}

/// Kind of an enumerated device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    AudioInput,
    AudioOutput,
    VideoInput,
}

/// An enumerated media device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDeviceInfo {
    pub device_id: String,
    pub label: String,
    pub kind: DeviceKind,
}

impl MediaDeviceInfo {
    pub fn new(device_id: impl Into<String>, label: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            device_id: device_id.into(),
            label: label.into(),
            kind,
        }
    }

    /// Whether the label suggests a loudspeaker
    pub fn looks_like_speaker(&self) -> bool {
        self.label.to_lowercase().contains("speaker")
    }
}

/// Outcome of an output routing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelection {
    /// Output was routed to `device_id`
    ///
    /// An empty id means the platform's own default route.
    Selected {
        device_id: String,
        label: Option<String>,
        speaker: bool,
    },
    /// This platform cannot choose an output device
    Unsupported,
}

impl DeviceSelection {
    pub fn is_supported(&self) -> bool {
        !matches!(self, DeviceSelection::Unsupported)
    }
}
