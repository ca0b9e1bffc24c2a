//! Inbound event loop and effect execution
//!
//! Signaling messages and engine reports land on one unbounded queue and
//! are handled here one at a time. Every dispatch the controller produces,
//! whether it came from this loop, a public operation or a timer, has its
//! effects carried out by [`Inner::run_effects`].

use rtcall_session_core::{
    negotiation, Dispatch, Effect, EndReason, EngineEvent, EngineEventSink, RecordDirection,
    SessionEvent, SessionId, SessionState, Teardown,
};
use rtcall_signal_core::{MediaKind, PeerId, SignalEnvelope, SignalHandler, SignalMessage};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::Inner;
use crate::events::{CallEvent, CallNotice};

/// Work item for the event loop
#[derive(Debug)]
pub(super) enum InboundEvent {
    Signal(SignalEnvelope),
    Engine(SessionId, EngineEvent),
}

pub(super) async fn run_event_loop(
    inner: Weak<Inner>,
    mut inbound: mpsc::UnboundedReceiver<InboundEvent>,
) {
    while let Some(event) = inbound.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match event {
            InboundEvent::Signal(envelope) => inner.handle_signal(envelope).await,
            InboundEvent::Engine(session_id, event) => {
                let dispatch = inner.controller.lock().handle_engine_event(&session_id, event);
                inner.run_effects(dispatch).await;
            }
        }
    }
    debug!("Call event loop stopped");
}

impl Inner {
    /// Handler installed on the signaling channel
    pub(super) fn signal_handler(&self) -> SignalHandler {
        let inbound = self.inbound.clone();
        Arc::new(move |envelope: SignalEnvelope| {
            if inbound.send(InboundEvent::Signal(envelope)).is_err() {
                debug!("Event loop gone, dropping signaling message");
            }
        })
    }

    /// Sink handed to the engine for one session's connection
    pub(super) fn engine_sink(&self, session_id: SessionId) -> EngineEventSink {
        let inbound = self.inbound.clone();
        EngineEventSink::new(
            session_id,
            Arc::new(move |session_id, event| {
                if inbound.send(InboundEvent::Engine(session_id, event)).is_err() {
                    debug!("Event loop gone, dropping engine event for {}", session_id);
                }
            }),
        )
    }

    async fn handle_signal(self: &Arc<Self>, envelope: SignalEnvelope) {
        let sender = envelope.sender;
        match envelope.message {
            SignalMessage::Offer {
                sdp,
                caller_id,
                media_kind,
            } => {
                if sender.as_ref().map(|s| *s != caller_id).unwrap_or(false) {
                    warn!(
                        "Dropping offer claiming to be from {} but sent by {:?}",
                        caller_id, sender
                    );
                    return;
                }
                let Some(local) = self.identity() else {
                    debug!("Ignoring offer from {} while signed out", caller_id);
                    return;
                };
                let Some(profile) = self.directory.lookup(&caller_id).await else {
                    info!("Ignoring offer from unknown caller {}", caller_id);
                    return;
                };

                let dispatch = self.controller.lock().handle_event(SessionEvent::ReceiveOffer {
                    local,
                    from: caller_id,
                    description: sdp,
                    media_kind,
                });
                if let (true, Some(session_id)) = (dispatch.handled, dispatch.session_id) {
                    self.remember_peer(session_id, profile);
                }
                self.run_effects(dispatch).await;
            }
            message => {
                let kind = message.kind();
                let event = match message {
                    SignalMessage::Answer { sdp } => SessionEvent::ReceiveAnswer { description: sdp },
                    SignalMessage::IceCandidate { candidate } => {
                        SessionEvent::ReceiveCandidate { candidate }
                    }
                    SignalMessage::HangUp => SessionEvent::ReceiveHangUp,
                    SignalMessage::Busy => SessionEvent::ReceiveBusy,
                    SignalMessage::Offer { .. } => return,
                };

                let dispatch = {
                    let mut controller = self.controller.lock();
                    if controller.accepts_sender(sender.as_ref()) {
                        Some(controller.handle_event(event))
                    } else {
                        None
                    }
                };
                match dispatch {
                    Some(dispatch) => self.run_effects(dispatch).await,
                    None => debug!("Dropping {} from {:?}: not part of the current call", kind, sender),
                }
            }
        }
    }

    /// Carry out a dispatch's effects, plus any follow-up dispatches they cause
    pub(super) async fn run_effects(self: &Arc<Self>, dispatch: Dispatch) {
        let mut pending = VecDeque::from([dispatch]);
        while let Some(mut dispatch) = pending.pop_front() {
            // Release resources only after the rest of the dispatch went out
            let teardown = dispatch.take_teardown();
            for effect in dispatch.effects {
                if let Some(follow_up) = self.run_effect(effect).await {
                    pending.push_back(follow_up);
                }
            }
            if let Some(teardown) = teardown {
                self.finish_teardown(teardown).await;
            }
        }
    }

    async fn run_effect(self: &Arc<Self>, effect: Effect) -> Option<Dispatch> {
        match effect {
            Effect::SendSignal { to, message } => {
                self.signal.send(&to, message).await;
                None
            }
            Effect::ApplyRemoteDescription {
                negotiation,
                description,
            } => {
                let session_id = negotiation.session_id;
                match negotiation::apply_remote_description(&self.controller, &negotiation, description)
                    .await
                {
                    Ok(_) => None,
                    Err(e) if e.is_stale() => {
                        debug!("Answer for {} arrived after the call ended", session_id);
                        None
                    }
                    Err(e) => {
                        warn!("Failed to apply remote description for {}: {}", session_id, e);
                        let reason = e.to_string();
                        let dispatch = self.controller.lock().handle_event_for(
                            &session_id,
                            SessionEvent::SetupFailed {
                                reason: reason.clone(),
                            },
                        );
                        if dispatch.handled {
                            self.notify(CallNotice::SetupFailed { reason });
                        }
                        Some(dispatch)
                    }
                }
            }
            Effect::ApplyCandidate {
                negotiation,
                candidate,
            } => {
                negotiation::apply_candidate(&negotiation, candidate).await;
                None
            }
            Effect::RecordCall {
                peer_id,
                direction,
                media_kind,
            } => {
                self.record_call(&peer_id, direction, media_kind).await;
                None
            }
            Effect::StateChanged { session_id, from, to } => {
                self.on_state_changed(session_id, from, to);
                None
            }
            Effect::Teardown(teardown) => {
                self.finish_teardown(teardown).await;
                None
            }
        }
    }

    fn on_state_changed(self: &Arc<Self>, session_id: SessionId, from: SessionState, to: SessionState) {
        self.refresh_view();
        self.emit(CallEvent::StateChanged {
            session_id,
            from,
            to,
        });

        match to {
            SessionState::RingingLocal => {
                let incoming = self.view.borrow().incoming_call.clone();
                if let Some(incoming) = incoming {
                    self.emit(CallEvent::IncomingCall {
                        session_id,
                        peer_id: incoming.peer_id,
                        display_name: incoming.display_name,
                        media_kind: incoming.media_kind,
                    });
                }
                if let Some(timeout) = self.config.ring_timeout() {
                    self.schedule_timeout(session_id, timeout, SessionEvent::RingTimeout);
                }
            }
            SessionState::Offering if from == SessionState::Idle => {
                if let Some(timeout) = self.config.answer_timeout() {
                    self.schedule_timeout(session_id, timeout, SessionEvent::AnswerTimeout);
                }
            }
            _ => {}
        }
    }

    /// Feed `event` to session `session_id` after `after`, if it still exists
    fn schedule_timeout(self: &Arc<Self>, session_id: SessionId, after: Duration, event: SessionEvent) {
        let inner = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let dispatch = inner.controller.lock().handle_event_for(&session_id, event);
            if dispatch.handled {
                info!("Session {} timed out after {:?}", session_id, after);
                inner.run_effects(dispatch).await;
            }
        });
    }

    /// Release a finished session's resources and tell the UI
    async fn finish_teardown(self: &Arc<Self>, teardown: Teardown) {
        let summary = teardown.execute(&self.media);

        if summary.missed {
            self.record_call(&summary.peer_id, RecordDirection::Missed, summary.media_kind)
                .await;
        }

        match summary.reason {
            EndReason::ConnectionFailed => self.notify(CallNotice::ConnectionFailed {
                peer_id: summary.peer_id.clone(),
            }),
            EndReason::Busy => self.notify(CallNotice::PeerBusy {
                peer_id: summary.peer_id.clone(),
            }),
            EndReason::AnswerTimeout => self.notify(CallNotice::NoAnswer {
                peer_id: summary.peer_id.clone(),
            }),
            _ => {}
        }

        {
            let mut profile = self.peer_profile.lock();
            if profile.as_ref().map(|(id, _)| *id == summary.session_id).unwrap_or(false) {
                *profile = None;
            }
        }
        self.refresh_view();
        self.view.send_modify(|view| view.is_speaker_on = false);

        self.emit(CallEvent::CallEnded {
            session_id: summary.session_id,
            peer_id: summary.peer_id,
            final_state: summary.final_state,
            reason: summary.reason,
        });
    }

    /// Write a call record; failures are reported but never affect the call
    pub(super) async fn record_call(&self, peer: &PeerId, direction: RecordDirection, kind: MediaKind) {
        if let Err(e) = self.add_call_record(peer, direction, kind).await {
            warn!("Failed to record {} call with {}: {}", direction, peer, e);
            self.notify(CallNotice::HistoryUnavailable {
                reason: e.to_string(),
            });
        }
    }
}
