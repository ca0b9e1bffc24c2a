//! Call setup and termination flows
//!
//! `start_call` and `accept_incoming` are the only flows that await on
//! hardware and the engine. Each await is followed by a re-check through the
//! controller: media and connections are attached only to the session they
//! were obtained for, and only while it is still in the expected state.
//! Anything obtained for a session that has moved on is released right
//! here.

use rtcall_media_core::LocalMediaHandle;
use rtcall_session_core::{
    negotiation, CallDirection, EngineResult, PeerConnection, SessionEvent, SessionId,
    SessionState,
};
use rtcall_signal_core::{MediaKind, PeerId, SessionDescription};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::Inner;
use crate::error::{CallError, CallResult};
use crate::events::CallNotice;

impl Inner {
    #[instrument(skip(self))]
    pub(super) async fn start_call(
        self: &Arc<Self>,
        peer: PeerId,
        kind: MediaKind,
    ) -> CallResult<SessionId> {
        let local = self.identity().ok_or(CallError::NotSignedIn)?;
        if peer == local {
            return Err(CallError::peer_unknown(&peer));
        }
        let profile = self
            .directory
            .lookup(&peer)
            .await
            .ok_or_else(|| CallError::peer_unknown(&peer))?;

        let dispatch = {
            let mut controller = self.controller.lock();
            if controller.is_busy() {
                return Err(CallError::AlreadyInCall);
            }
            controller.handle_event(SessionEvent::StartOutgoing {
                local,
                peer,
                media_kind: kind,
            })
        };
        let Some(session_id) = dispatch.session_id.filter(|_| dispatch.handled) else {
            return Err(CallError::AlreadyInCall);
        };

        self.remember_peer(session_id, profile);
        self.view.send_modify(|view| {
            view.is_muted = false;
            view.is_video_on = kind.wants_video();
        });
        self.run_effects(dispatch).await;

        let handle = self
            .acquire_media(session_id, SessionState::Offering, kind, CallDirection::Outgoing)
            .await?;
        let connection = self
            .open_connection(session_id, SessionState::Offering)
            .await?;

        let offer = match create_offer(&connection, &handle).await {
            Ok(offer) => offer,
            Err(e) => return Err(self.fail_setup(session_id, e.into()).await),
        };

        let dispatch = self
            .controller
            .lock()
            .handle_event_for(&session_id, SessionEvent::LocalDescriptionReady { description: offer });
        if !dispatch.handled {
            return Err(CallError::Cancelled);
        }
        self.run_effects(dispatch).await;

        info!("Offer sent for {}", session_id);
        Ok(session_id)
    }

    #[instrument(skip(self))]
    pub(super) async fn accept_incoming(self: &Arc<Self>) -> CallResult<()> {
        let (session_id, kind, dispatch) = {
            let mut controller = self.controller.lock();
            let ringing = controller
                .snapshot()
                .filter(|s| s.state == SessionState::RingingLocal);
            let Some(ringing) = ringing else {
                return Err(CallError::NoIncomingCall);
            };
            (
                ringing.id,
                ringing.media_kind,
                controller.handle_event(SessionEvent::Accept),
            )
        };
        if !dispatch.handled {
            return Err(CallError::NoIncomingCall);
        }

        self.view.send_modify(|view| {
            view.is_muted = false;
            view.is_video_on = kind.wants_video();
        });
        self.run_effects(dispatch).await;

        let handle = self
            .acquire_media(session_id, SessionState::Answering, kind, CallDirection::Incoming)
            .await?;
        let connection = self
            .open_connection(session_id, SessionState::Answering)
            .await?;

        if let Err(e) = connection.add_local_media(&handle).await {
            return Err(self.fail_setup(session_id, e.into()).await);
        }

        let (offer, negotiation) = {
            let controller = self.controller.lock();
            (
                controller.remote_offer(&session_id),
                controller.negotiation(&session_id),
            )
        };
        let (Some(offer), Some(negotiation)) = (offer, negotiation) else {
            return Err(CallError::Cancelled);
        };

        match negotiation::apply_remote_description(&self.controller, &negotiation, offer).await {
            Ok(flushed) => debug!("Applied offer for {} ({} buffered candidates)", session_id, flushed),
            Err(e) if e.is_stale() => return Err(CallError::Cancelled),
            Err(e) => return Err(self.fail_setup(session_id, e.into()).await),
        }

        let answer = match create_answer(&connection).await {
            Ok(answer) => answer,
            Err(e) => return Err(self.fail_setup(session_id, e.into()).await),
        };

        let dispatch = self
            .controller
            .lock()
            .handle_event_for(&session_id, SessionEvent::LocalDescriptionReady { description: answer });
        if !dispatch.handled {
            return Err(CallError::Cancelled);
        }
        self.run_effects(dispatch).await;

        info!("Answer sent for {}", session_id);
        Ok(())
    }

    #[instrument(skip(self))]
    pub(super) async fn reject_incoming(self: &Arc<Self>) {
        let dispatch = {
            let mut controller = self.controller.lock();
            if !controller.is_busy() || controller.current_state() != SessionState::RingingLocal {
                debug!("No ringing call to reject");
                return;
            }
            controller.handle_event(SessionEvent::Reject)
        };
        self.run_effects(dispatch).await;
    }

    #[instrument(skip(self))]
    pub(super) async fn end_call(self: &Arc<Self>) {
        self.end_with(SessionEvent::LocalHangUp).await;
    }

    /// End the live session with `event`, if there is one
    pub(super) async fn end_with(self: &Arc<Self>, event: SessionEvent) -> bool {
        let dispatch = self.controller.lock().handle_event(event);
        if !dispatch.handled {
            debug!("No call in progress");
            return false;
        }
        self.run_effects(dispatch).await;
        true
    }

    /// Acquire local media for `session_id` and attach it
    async fn acquire_media(
        self: &Arc<Self>,
        session_id: SessionId,
        expected: SessionState,
        kind: MediaKind,
        direction: CallDirection,
    ) -> CallResult<LocalMediaHandle> {
        let handle = match self.media.acquire_local_media(kind).await {
            Ok(handle) => handle,
            Err(e) => {
                let reason = e.to_string();
                let notice = match direction {
                    CallDirection::Outgoing => CallNotice::StartFailed {
                        reason: reason.clone(),
                    },
                    CallDirection::Incoming => CallNotice::AcceptFailed {
                        reason: reason.clone(),
                    },
                };
                return Err(self
                    .abort_setup(session_id, SessionEvent::MediaUnavailable { reason }, e.into(), notice)
                    .await);
            }
        };

        let attached = self
            .controller
            .lock()
            .attach_local_media(&session_id, &[expected], handle.clone());
        if let Err(handle) = attached {
            info!("Session {} ended while acquiring media, releasing it", session_id);
            self.media.release(&handle);
            return Err(CallError::Cancelled);
        }
        Ok(handle)
    }

    /// Create a peer connection for `session_id` and attach it
    async fn open_connection(
        self: &Arc<Self>,
        session_id: SessionId,
        expected: SessionState,
    ) -> CallResult<Arc<dyn PeerConnection>> {
        let connection = match self
            .engine
            .create_connection(&self.config.ice, self.engine_sink(session_id))
            .await
        {
            Ok(connection) => connection,
            Err(e) => return Err(self.fail_setup(session_id, e.into()).await),
        };

        let attached = self
            .controller
            .lock()
            .attach_connection(&session_id, &[expected], connection.clone());
        if let Err(connection) = attached {
            info!("Session {} ended while connecting, closing connection", session_id);
            if let Err(e) = connection.close() {
                debug!("Closing unused connection failed: {}", e);
            }
            return Err(CallError::Cancelled);
        }
        Ok(connection)
    }

    /// Engine failure during setup: `Failed`, notice, teardown
    async fn fail_setup(self: &Arc<Self>, session_id: SessionId, error: CallError) -> CallError {
        let reason = error.to_string();
        self.abort_setup(
            session_id,
            SessionEvent::SetupFailed {
                reason: reason.clone(),
            },
            error,
            CallNotice::SetupFailed { reason },
        )
        .await
    }

    /// Funnel a setup failure through the normal teardown
    ///
    /// If the session already ended on its own, the failure is just a
    /// consequence of that and the caller sees `Cancelled`.
    async fn abort_setup(
        self: &Arc<Self>,
        session_id: SessionId,
        event: SessionEvent,
        error: CallError,
        notice: CallNotice,
    ) -> CallError {
        let dispatch = self.controller.lock().handle_event_for(&session_id, event);
        if !dispatch.handled {
            debug!("Session {} ended before its setup failure ({})", session_id, error);
            return CallError::Cancelled;
        }

        warn!("Call setup for {} failed: {}", session_id, error);
        self.notify(notice);
        self.run_effects(dispatch).await;
        error
    }
}

async fn create_offer(
    connection: &Arc<dyn PeerConnection>,
    media: &LocalMediaHandle,
) -> EngineResult<SessionDescription> {
    connection.add_local_media(media).await?;
    let offer = connection.create_offer().await?;
    connection.set_local_description(offer.clone()).await?;
    Ok(offer)
}

async fn create_answer(connection: &Arc<dyn PeerConnection>) -> EngineResult<SessionDescription> {
    let answer = connection.create_answer().await?;
    connection.set_local_description(answer.clone()).await?;
    Ok(answer)
}
