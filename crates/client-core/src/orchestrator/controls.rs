//! In-call controls: microphone, camera and audio output

use rtcall_media_core::{DeviceSelection, MediaError};
use tracing::{debug, info, warn};

use super::Inner;
use crate::events::CallNotice;

impl Inner {
    pub(super) fn toggle_mute(&self) -> bool {
        let Some(handle) = self.controller.lock().local_media() else {
            debug!("No local media to mute");
            return self.view.borrow().is_muted;
        };
        let muted = self.media.toggle_audio_enabled(&handle);
        self.view.send_modify(|view| view.is_muted = muted);
        muted
    }

    pub(super) fn toggle_video(&self) -> bool {
        let Some(handle) = self.controller.lock().local_media() else {
            debug!("No local media to toggle video on");
            return self.view.borrow().is_video_on;
        };
        let video_on = self.media.toggle_video_enabled(&handle);
        self.view.send_modify(|view| view.is_video_on = video_on);
        video_on
    }

    /// Flip between speaker and earpiece
    ///
    /// Where output routing is unsupported the flag still flips so the UI
    /// reflects the user's choice, and a notice explains that nothing was
    /// rerouted. Routing failures leave the flag unchanged.
    pub(super) async fn toggle_speaker(&self) -> bool {
        let speaker_on = !self.view.borrow().is_speaker_on;

        match self.media.select_output_device(speaker_on).await {
            Ok(DeviceSelection::Selected { device_id, .. }) => {
                debug!("Speaker {} via output {:?}", speaker_on, device_id);
                self.view.send_modify(|view| view.is_speaker_on = speaker_on);
                speaker_on
            }
            Ok(DeviceSelection::Unsupported) | Err(MediaError::Unsupported { .. }) => {
                info!("Audio output selection is not supported here");
                self.notify(CallNotice::SpeakerUnsupported);
                self.view.send_modify(|view| view.is_speaker_on = speaker_on);
                speaker_on
            }
            Err(e) => {
                warn!("Failed to switch audio output: {}", e);
                self.notify(CallNotice::OutputRoutingFailed {
                    reason: e.to_string(),
                });
                !speaker_on
            }
        }
    }
}
