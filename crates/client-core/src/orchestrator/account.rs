//! Sign-in state and call history

use rtcall_session_core::{RecordDirection, SessionEvent};
use rtcall_signal_core::{MediaKind, PeerId};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::Inner;
use crate::error::{CallError, CallResult};
use crate::events::{CallEvent, CallNotice};
use crate::history::CallRecord;

impl Inner {
    #[instrument(skip(self))]
    pub(super) async fn on_auth_state_changed(
        self: &Arc<Self>,
        identity: Option<PeerId>,
    ) -> CallResult<()> {
        let mut subscription = self.subscription.lock().await;
        let current = self.identity();
        if current == identity && (identity.is_none() || subscription.is_some()) {
            debug!("Auth state unchanged");
            return Ok(());
        }

        // A call belongs to the identity that placed or received it
        if self.end_with(SessionEvent::SignedOut).await {
            info!("Ended call of {:?} on auth change", current);
        }

        match identity {
            Some(identity) => {
                *self.identity.write() = Some(identity.clone());
                match self.signal.subscribe(&identity, self.signal_handler()).await {
                    Ok(opened) => *subscription = Some(opened),
                    Err(e) => {
                        *subscription = None;
                        *self.identity.write() = None;
                        return Err(e.into());
                    }
                }
                info!("Signed in as {}", identity);

                self.history.write().clear();
                if let Err(e) = self.refresh_history().await {
                    warn!("Could not load call history for {}: {}", identity, e);
                }
                Ok(())
            }
            None => {
                if let Some(opened) = subscription.take() {
                    if let Err(e) = self.signal.unsubscribe(opened).await {
                        warn!("Failed to close signaling channel: {}", e);
                    }
                }
                *self.identity.write() = None;
                self.history.write().clear();
                self.emit(CallEvent::HistoryChanged);
                info!("Signed out");
                Ok(())
            }
        }
    }

    pub(super) async fn refresh_history(&self) -> CallResult<Vec<CallRecord>> {
        if self.identity().is_none() {
            return Err(CallError::NotSignedIn);
        }

        self.view.send_modify(|view| view.history_loading = true);
        let fetched = self.history_store.fetch_call_history().await;
        self.view.send_modify(|view| view.history_loading = false);

        match fetched {
            Ok(records) => {
                debug!("Loaded {} call records", records.len());
                *self.history.write() = records.clone();
                self.emit(CallEvent::HistoryChanged);
                Ok(records)
            }
            Err(e) => {
                self.notify(CallNotice::HistoryUnavailable {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    pub(super) async fn add_call_record(
        &self,
        peer: &PeerId,
        direction: RecordDirection,
        kind: MediaKind,
    ) -> CallResult<CallRecord> {
        if self.identity().is_none() {
            return Err(CallError::NotSignedIn);
        }

        let record = self
            .history_store
            .insert_call_record(peer, direction, kind)
            .await?;
        debug!("Recorded {} {} call with {}", direction, kind, peer);
        self.history.write().insert(0, record.clone());
        self.emit(CallEvent::HistoryChanged);
        Ok(record)
    }

    pub(super) async fn clear_history(&self) -> CallResult<()> {
        if self.identity().is_none() {
            return Err(CallError::NotSignedIn);
        }

        self.history_store.delete_all_call_records().await?;
        self.history.write().clear();
        self.emit(CallEvent::HistoryChanged);
        info!("Call history cleared");
        Ok(())
    }
}
