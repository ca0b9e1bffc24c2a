//! Call history records and the store they live in
//!
//! The orchestrator writes one [`CallRecord`] per call attempt through the
//! [`CallHistoryStore`] data-access interface and keeps a newest-first cache
//! for the UI. Records outlive the session that produced them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rtcall_session_core::RecordDirection;
use rtcall_signal_core::{MediaKind, PeerId};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::error::{CallError, CallResult};

/// One entry of the call history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: Uuid,
    /// The other party of the call
    pub peer_id: PeerId,
    pub direction: RecordDirection,
    pub media_kind: MediaKind,
    pub created_at: DateTime<Utc>,
}

impl CallRecord {
    pub fn new(peer_id: PeerId, direction: RecordDirection, media_kind: MediaKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer_id,
            direction,
            media_kind,
            created_at: Utc::now(),
        }
    }

    pub fn is_missed(&self) -> bool {
        self.direction == RecordDirection::Missed
    }
}

/// Persistent storage for call records of the signed-in user
#[async_trait]
pub trait CallHistoryStore: Send + Sync {
    /// All records, newest first
    async fn fetch_call_history(&self) -> CallResult<Vec<CallRecord>>;

    /// Store a new record and return it as persisted
    async fn insert_call_record(
        &self,
        peer_id: &PeerId,
        direction: RecordDirection,
        media_kind: MediaKind,
    ) -> CallResult<CallRecord>;

    async fn delete_all_call_records(&self) -> CallResult<()>;
}

/// Memory-backed [`CallHistoryStore`] for tests and demos
pub struct InMemoryCallHistory {
    records: RwLock<Vec<CallRecord>>,
    failing: AtomicBool,
}

impl InMemoryCallHistory {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every operation fail with a storage error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Records currently stored, newest first
    pub fn records(&self) -> Vec<CallRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn check(&self) -> CallResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CallError::storage("history store unavailable"))
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryCallHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallHistoryStore for InMemoryCallHistory {
    async fn fetch_call_history(&self) -> CallResult<Vec<CallRecord>> {
        self.check()?;
        Ok(self.records())
    }

    async fn insert_call_record(
        &self,
        peer_id: &PeerId,
        direction: RecordDirection,
        media_kind: MediaKind,
    ) -> CallResult<CallRecord> {
        self.check()?;
        let record = CallRecord::new(peer_id.clone(), direction, media_kind);
        self.records.write().insert(0, record.clone());
        Ok(record)
    }

    async fn delete_all_call_records(&self) -> CallResult<()> {
        self.check()?;
        self.records.write().clear();
        Ok(())
    }
}
