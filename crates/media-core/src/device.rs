//! Capture backend contract
//!
//! A backend hands out tracks; the [`MediaController`](crate::MediaController)
//! owns the policy of which tracks to ask for and when to stop them.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::MediaResult;
use crate::types::{MediaConstraints, MediaDeviceInfo, TrackKind};

/// One live capture track
pub trait MediaTrack: Send + Sync {
    fn id(&self) -> &str;

    fn kind(&self) -> TrackKind;

    fn is_enabled(&self) -> bool;

    /// Enable or disable the track without renegotiating
    fn set_enabled(&self, enabled: bool);

    /// Stop capturing and release the underlying device
    fn stop(&self);

    fn is_stopped(&self) -> bool;
}

/// Platform capture and output routing
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Open capture tracks matching `constraints`
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> MediaResult<Vec<Arc<dyn MediaTrack>>>;

    /// List every capture and output device known to the platform
    async fn enumerate_devices(&self) -> MediaResult<Vec<MediaDeviceInfo>>;

    /// Whether [`set_output_device`](Self::set_output_device) is available
    fn supports_output_selection(&self) -> bool;

    /// Route remote audio to `device_id` (empty for the platform default)
    async fn set_output_device(&self, device_id: &str) -> MediaResult<()>;
}
