//! Local media for rtcall calls
//!
//! `rtcall-media-core` owns the local side of a call's media: acquiring the
//! microphone (and camera for video calls), flipping track enablement for
//! mute and camera-off, routing the remote audio to an output device, and
//! releasing every capture track exactly once when the call is over.
//!
//! Capture devices are reached through the [`MediaDevices`] trait so the
//! controller runs unchanged against a platform backend or the memory-backed
//! [`MockMediaDevices`] used in tests.
//!
//! ```no_run
//! use std::sync::Arc;
//! use rtcall_media_core::{MediaController, MockMediaDevices};
//! use rtcall_signal_core::MediaKind;
//!
//! # async fn example() -> rtcall_media_core::MediaResult<()> {
//! let devices = Arc::new(MockMediaDevices::new());
//! let controller = MediaController::new(devices);
//!
//! let handle = controller.acquire_local_media(MediaKind::Video).await?;
//! let muted = controller.toggle_audio_enabled(&handle);
//! assert!(muted);
//! controller.release(&handle);
//! # Ok(())
//! # }
//! ```

pub mod controller;
pub mod device;
pub mod error;
pub mod handle;
pub mod mock;
pub mod types;

pub use controller::MediaController;
pub use device::{MediaDevices, MediaTrack};
pub use error::{MediaError, MediaResult};
pub use handle::LocalMediaHandle;
pub use mock::{MockMediaDevices, MockTrack};
pub use types::{DeviceKind, DeviceSelection, MediaConstraints, MediaDeviceInfo, TrackKind};

/// Commonly used types
pub mod prelude {
    pub use crate::{
        DeviceSelection, LocalMediaHandle, MediaController, MediaDevices, MediaError,
        MediaResult, MediaTrack, TrackKind,
    };
}
