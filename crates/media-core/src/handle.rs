//! Exclusive handle to a set of local capture tracks

use rtcall_signal_core::MediaKind;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::device::MediaTrack;
use crate::types::TrackKind;

struct HandleInner {
    id: Uuid,
    kind: MediaKind,
    tracks: Vec<Arc<dyn MediaTrack>>,
    released: AtomicBool,
}

/// Local media captured for one call
///
/// Clones share the same tracks. Releasing through any clone releases them
/// all, and only the first release stops anything.
#[derive(Clone)]
pub struct LocalMediaHandle {
    inner: Arc<HandleInner>,
}

impl LocalMediaHandle {
    pub(crate) fn new(kind: MediaKind, tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: Uuid::new_v4(),
                kind,
                tracks,
                released: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Kind of call this media was captured for
    pub fn media_kind(&self) -> MediaKind {
        self.inner.kind
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.inner.tracks
    }

    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &Arc<dyn MediaTrack>> {
        self.inner.tracks.iter().filter(move |t| t.kind() == kind)
    }

    pub fn has_video(&self) -> bool {
        self.tracks_of(TrackKind::Video).next().is_some()
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }

    /// Stop every track; returns false if the handle was already released
    pub(crate) fn release_tracks(&self) -> bool {
        if self.inner.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        for track in &self.inner.tracks {
            if !track.is_stopped() {
                track.stop();
            }
        }
        true
    }

    /// Whether two handles refer to the same capture
    pub fn same_as(&self, other: &LocalMediaHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for LocalMediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalMediaHandle")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("tracks", &self.inner.tracks.len())
            .field("released", &self.is_released())
            .finish()
    }
}
