//! Peer session controller
//!
//! Owns the single call session of this client and turns every input
//! (local commands, inbound signals, engine reports, timers) into a state
//! change plus a list of [`Effect`]s for the caller to perform. The
//! controller itself never awaits: it is meant to live behind a short-held
//! lock, with the effects executed outside of it.

use rtcall_media_core::LocalMediaHandle;
use rtcall_signal_core::{IceCandidate, MediaKind, PeerId, SessionDescription, SignalMessage};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::engine::{EngineEvent, PeerConnection, RemoteStream};
use crate::events::SessionEvent;
use crate::session::{CallSession, Negotiation, SessionSnapshot, Teardown};
use crate::state_table::{Action, EventType, TransitionTable, MASTER_TABLE};
use crate::types::{
    ConnectionState, EndReason, GlarePolicy, RecordDirection, SessionId, SessionState,
};

/// Work the caller must carry out after a dispatch
#[derive(Debug)]
pub enum Effect {
    /// Best-effort signaling send
    SendSignal { to: PeerId, message: SignalMessage },
    /// Apply the peer's description, then flush buffered candidates
    ApplyRemoteDescription {
        negotiation: Negotiation,
        description: SessionDescription,
    },
    /// Apply one remote candidate
    ApplyCandidate {
        negotiation: Negotiation,
        candidate: IceCandidate,
    },
    /// Write a call history entry
    RecordCall {
        peer_id: PeerId,
        direction: RecordDirection,
        media_kind: MediaKind,
    },
    StateChanged {
        session_id: SessionId,
        from: SessionState,
        to: SessionState,
    },
    /// Release the session's resources
    Teardown(Teardown),
}

/// Result of feeding one event to the controller
#[derive(Debug)]
pub struct Dispatch {
    /// Session the event was applied to
    pub session_id: Option<SessionId>,
    pub previous: SessionState,
    pub next: SessionState,
    /// Whether a table transition was taken
    pub handled: bool,
    pub effects: Vec<Effect>,
}

impl Dispatch {
    fn ignored(session_id: Option<SessionId>, state: SessionState) -> Self {
        Self {
            session_id,
            previous: state,
            next: state,
            handled: false,
            effects: Vec::new(),
        }
    }

    /// Take the teardown out of the effects, if any
    pub fn take_teardown(&mut self) -> Option<Teardown> {
        let position = self
            .effects
            .iter()
            .position(|e| matches!(e, Effect::Teardown(_)))?;
        match self.effects.remove(position) {
            Effect::Teardown(teardown) => Some(teardown),
            _ => None,
        }
    }

    /// Signals this dispatch wants sent, in order
    pub fn signals(&self) -> impl Iterator<Item = (&PeerId, &SignalMessage)> {
        self.effects.iter().filter_map(|e| match e {
            Effect::SendSignal { to, message } => Some((to, message)),
            _ => None,
        })
    }
}

/// State machine over the one call session this client may have
pub struct PeerSessionController {
    session: Option<CallSession>,
    glare_policy: GlarePolicy,
    table: Arc<TransitionTable>,
}

impl PeerSessionController {
    pub fn new(glare_policy: GlarePolicy) -> Self {
        Self {
            session: None,
            glare_policy,
            table: MASTER_TABLE.clone(),
        }
    }

    /// Use a custom transition table
    pub fn with_table(mut self, table: Arc<TransitionTable>) -> Self {
        self.table = table;
        self
    }

    pub fn glare_policy(&self) -> GlarePolicy {
        self.glare_policy
    }

    pub fn session(&self) -> Option<&CallSession> {
        self.session.as_ref()
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.session.as_ref().map(CallSession::snapshot)
    }

    /// State of the most recent session, `Idle` if there never was one
    pub fn current_state(&self) -> SessionState {
        self.session
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(SessionState::Idle)
    }

    fn live_session(&self) -> Option<&CallSession> {
        self.session.as_ref().filter(|s| s.is_live())
    }

    fn live_session_mut(&mut self, id: &SessionId) -> Option<&mut CallSession> {
        self.session
            .as_mut()
            .filter(|s| s.id == *id && s.is_live())
    }

    /// Whether a call is in progress
    pub fn is_busy(&self) -> bool {
        self.live_session().is_some()
    }

    pub fn active_session_id(&self) -> Option<SessionId> {
        self.live_session().map(|s| s.id)
    }

    pub fn active_peer(&self) -> Option<&PeerId> {
        self.live_session().map(|s| &s.peer_id)
    }

    /// Whether `id` is still the live session and in one of `states`
    pub fn is_current(&self, id: &SessionId, states: &[SessionState]) -> bool {
        self.live_session()
            .map(|s| s.id == *id && states.contains(&s.state))
            .unwrap_or(false)
    }

    /// Whether a non-offer message from `sender` belongs to the live session
    ///
    /// Messages without a sender are attributed to the current peer.
    pub fn accepts_sender(&self, sender: Option<&PeerId>) -> bool {
        match (self.live_session(), sender) {
            (Some(session), Some(sender)) => session.peer_id == *sender,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Local media of the live session
    pub fn local_media(&self) -> Option<LocalMediaHandle> {
        self.live_session().and_then(|s| s.local_media.clone())
    }

    /// Stored offer of the live incoming session
    pub fn remote_offer(&self, id: &SessionId) -> Option<SessionDescription> {
        self.live_session()
            .filter(|s| s.id == *id)
            .and_then(|s| s.remote_description.clone())
    }

    pub fn negotiation(&self, id: &SessionId) -> Option<Negotiation> {
        self.live_session()
            .filter(|s| s.id == *id)
            .and_then(CallSession::negotiation)
    }

    /// Attach media obtained across an await
    ///
    /// Hands the handle back if the session is gone or has moved on, so the
    /// caller can release it.
    pub fn attach_local_media(
        &mut self,
        id: &SessionId,
        expected: &[SessionState],
        handle: LocalMediaHandle,
    ) -> Result<(), LocalMediaHandle> {
        match self.live_session_mut(id) {
            Some(session) if expected.contains(&session.state) && session.local_media.is_none() => {
                debug!("Attached local media {} to {}", handle.id(), id);
                session.local_media = Some(handle);
                Ok(())
            }
            _ => Err(handle),
        }
    }

    /// Attach a connection obtained across an await
    ///
    /// Hands the connection back if the session is gone or has moved on.
    pub fn attach_connection(
        &mut self,
        id: &SessionId,
        expected: &[SessionState],
        connection: Arc<dyn PeerConnection>,
    ) -> Result<(), Arc<dyn PeerConnection>> {
        match self.live_session_mut(id) {
            Some(session) if expected.contains(&session.state) && session.connection.is_none() => {
                debug!("Attached peer connection to {}", id);
                session.connection = Some(connection);
                Ok(())
            }
            _ => Err(connection),
        }
    }

    /// Record that the engine accepted the remote description
    ///
    /// Returns the buffered candidates, in arrival order, for the caller to
    /// apply while still holding the negotiation lock. `None` if the session
    /// is no longer live.
    pub fn mark_remote_applied(&mut self, id: &SessionId) -> Option<Vec<IceCandidate>> {
        let session = self.live_session_mut(id)?;
        session.remote_description_applied = true;
        let pending: Vec<_> = session.pending_remote_candidates.drain(..).collect();
        if !pending.is_empty() {
            debug!("Flushing {} buffered candidates for {}", pending.len(), id);
        }
        Some(pending)
    }

    /// Keep a weak reference to the peer's stream
    pub fn set_remote_stream(&mut self, id: &SessionId, stream: &Arc<RemoteStream>) -> bool {
        match self.live_session_mut(id) {
            Some(session) => {
                session.remote_stream = Some(Arc::downgrade(stream));
                true
            }
            None => false,
        }
    }

    /// Feed an event addressed to a specific session
    ///
    /// Timers and async completions use this so they cannot affect a later
    /// session.
    pub fn handle_event_for(&mut self, id: &SessionId, event: SessionEvent) -> Dispatch {
        if self.live_session().map(|s| s.id != *id).unwrap_or(true) {
            debug!("Dropping {:?} for stale session {}", event.event_type(), id);
            return Dispatch::ignored(self.active_session_id(), self.current_state());
        }
        self.handle_event(event)
    }

    /// Feed an engine report for session `id`
    pub fn handle_engine_event(&mut self, id: &SessionId, event: EngineEvent) -> Dispatch {
        let state = self.current_state();
        let Some(session) = self.live_session_mut(id) else {
            debug!("Dropping engine event for stale session {}", id);
            return Dispatch::ignored(None, state);
        };

        match event {
            EngineEvent::LocalCandidate(candidate) => {
                let mut dispatch = Dispatch::ignored(Some(*id), state);
                if session.local_description.is_none() {
                    // The peer cannot use candidates before our description
                    session.pending_local_candidates.push(candidate);
                    return dispatch;
                }
                dispatch.effects.push(Effect::SendSignal {
                    to: session.peer_id.clone(),
                    message: SignalMessage::IceCandidate { candidate },
                });
                dispatch
            }
            EngineEvent::RemoteTrack(stream) => {
                debug!("Remote stream {} available for {}", stream.id, id);
                session.remote_stream = Some(Arc::downgrade(&stream));
                Dispatch::ignored(Some(*id), state)
            }
            EngineEvent::ConnectionStateChanged(connection_state) => match connection_state {
                ConnectionState::Connected => self.handle_event(SessionEvent::EngineConnected),
                ConnectionState::Disconnected => {
                    self.handle_event(SessionEvent::EngineDisconnected)
                }
                ConnectionState::Failed => self.handle_event(SessionEvent::EngineFailed),
                other => {
                    debug!("Connection of {} is {:?}", id, other);
                    Dispatch::ignored(Some(*id), state)
                }
            },
        }
    }

    /// Dispatch one event against the transition table
    pub fn handle_event(&mut self, event: SessionEvent) -> Dispatch {
        let event_type = event.event_type();
        let creates_session = matches!(
            event_type,
            EventType::StartOutgoing | EventType::ReceiveOffer
        );

        let state = match &self.session {
            Some(session) if session.is_live() => session.state,
            Some(session) if !creates_session => session.state,
            _ => SessionState::Idle,
        };
        let session_id = self.session.as_ref().map(|s| s.id);

        if event_type == EventType::ReceiveOffer && state.is_active() {
            return self.resolve_glare(event, state, session_id);
        }

        let Some(transition) = self.table.get(state, event_type).cloned() else {
            debug!("Ignoring {:?} in state {:?}", event_type, state);
            return Dispatch::ignored(session_id, state);
        };

        let mut effects = Vec::new();
        for action in &transition.actions {
            self.execute_action(action, &event, &mut effects);
        }

        let session = match self.session.as_mut() {
            Some(session) => session,
            None => return Dispatch::ignored(None, state),
        };
        let previous = if creates_session {
            SessionState::Idle
        } else {
            state
        };
        if let Some(next) = transition.next_state {
            if !session.state.is_terminal() {
                session.state = next;
            }
        }
        let next = session.state;
        let id = session.id;
        if next != previous {
            info!("Session {} {:?} -> {:?} on {:?}", id, previous, next, event_type);
            effects.push(Effect::StateChanged {
                session_id: id,
                from: previous,
                to: next,
            });
        }

        let mut dispatch = Dispatch {
            session_id: Some(id),
            previous,
            next,
            handled: true,
            effects,
        };

        // An engine that connected before the answer went out completes now
        if next == SessionState::Connecting && session.connected_early {
            session.connected_early = false;
            let chained = self.handle_event(SessionEvent::EngineConnected);
            dispatch.next = chained.next;
            dispatch.effects.extend(chained.effects);
        }

        dispatch
    }

    fn resolve_glare(
        &self,
        event: SessionEvent,
        state: SessionState,
        session_id: Option<SessionId>,
    ) -> Dispatch {
        let mut dispatch = Dispatch::ignored(session_id, state);
        let SessionEvent::ReceiveOffer { from, .. } = event else {
            return dispatch;
        };

        match self.glare_policy {
            GlarePolicy::Drop => {
                info!("Ignoring offer from {} while a call is {:?}", from, state);
            }
            GlarePolicy::RespondBusy => {
                info!("Answering offer from {} with busy while a call is {:?}", from, state);
                dispatch.effects.push(Effect::SendSignal {
                    to: from,
                    message: SignalMessage::Busy,
                });
            }
        }
        dispatch
    }

    fn execute_action(&mut self, action: &Action, event: &SessionEvent, effects: &mut Vec<Effect>) {
        match action {
            Action::CreateOutgoingSession => {
                if let SessionEvent::StartOutgoing {
                    local,
                    peer,
                    media_kind,
                } = event
                {
                    let session = CallSession::outgoing(local.clone(), peer.clone(), *media_kind);
                    info!("Created outgoing {} session {} to {}", media_kind, session.id, peer);
                    self.session = Some(session);
                }
            }
            Action::CreateIncomingSession => {
                if let SessionEvent::ReceiveOffer {
                    local,
                    from,
                    description,
                    media_kind,
                } = event
                {
                    let session = CallSession::incoming(
                        local.clone(),
                        from.clone(),
                        *media_kind,
                        description.clone(),
                    );
                    info!("Created incoming {} session {} from {}", media_kind, session.id, from);
                    self.session = Some(session);
                }
            }
            Action::Teardown => {
                if let Some(teardown) = self.end_session(event.end_reason()) {
                    effects.push(Effect::Teardown(teardown));
                }
            }
            _ => {
                let Some(session) = self.session.as_mut().filter(|s| s.is_live()) else {
                    return;
                };
                execute_session_action(session, action, event, effects);
            }
        }
    }

    /// End the live session, whatever its state
    ///
    /// Only the first call for a session returns the [`Teardown`]; repeated
    /// or concurrent calls get `None` and must release nothing.
    pub fn end_session(&mut self, reason: EndReason) -> Option<Teardown> {
        let session = self.session.as_mut()?;
        if !session.is_live() {
            debug!("Session {} is already ending", session.id);
            return None;
        }
        info!("Ending session {} with {} ({})", session.id, session.peer_id, reason);
        Some(session.take_for_teardown(reason))
    }
}

fn execute_session_action(
    session: &mut CallSession,
    action: &Action,
    event: &SessionEvent,
    effects: &mut Vec<Effect>,
) {
    match action {
        Action::RecordCall(direction) => effects.push(Effect::RecordCall {
            peer_id: session.peer_id.clone(),
            direction: *direction,
            media_kind: session.media_kind,
        }),
        Action::MarkAccepted => session.accepted = true,
        Action::StoreLocalDescription => {
            if let SessionEvent::LocalDescriptionReady { description } = event {
                session.local_description = Some(description.clone());
            }
        }
        Action::SendOffer => {
            if let SessionEvent::LocalDescriptionReady { description } = event {
                effects.push(Effect::SendSignal {
                    to: session.peer_id.clone(),
                    message: SignalMessage::Offer {
                        sdp: description.clone(),
                        caller_id: session.local_id.clone(),
                        media_kind: session.media_kind,
                    },
                });
                flush_local_candidates(session, effects);
            }
        }
        Action::SendAnswer => {
            if let SessionEvent::LocalDescriptionReady { description } = event {
                effects.push(Effect::SendSignal {
                    to: session.peer_id.clone(),
                    message: SignalMessage::Answer {
                        sdp: description.clone(),
                    },
                });
                flush_local_candidates(session, effects);
            }
        }
        Action::ApplyRemoteAnswer => {
            if let SessionEvent::ReceiveAnswer { description } = event {
                session.remote_description = Some(description.clone());
                match session.negotiation() {
                    Some(negotiation) => effects.push(Effect::ApplyRemoteDescription {
                        negotiation,
                        description: description.clone(),
                    }),
                    None => warn!("Answer for {} arrived before its connection", session.id),
                }
            }
        }
        Action::QueueOrApplyCandidate => {
            if let SessionEvent::ReceiveCandidate { candidate } = event {
                match session.negotiation() {
                    Some(negotiation) if session.remote_description_applied => {
                        effects.push(Effect::ApplyCandidate {
                            negotiation,
                            candidate: candidate.clone(),
                        })
                    }
                    _ => {
                        session.pending_remote_candidates.push_back(candidate.clone());
                        debug!(
                            "Buffered remote candidate for {} ({} pending)",
                            session.id,
                            session.pending_remote_candidates.len()
                        );
                    }
                }
            }
        }
        Action::NoteEarlyConnect => session.connected_early = true,
        Action::SendHangUp => effects.push(Effect::SendSignal {
            to: session.peer_id.clone(),
            message: SignalMessage::HangUp,
        }),
        Action::CreateOutgoingSession | Action::CreateIncomingSession | Action::Teardown => {}
    }
}

fn flush_local_candidates(session: &mut CallSession, effects: &mut Vec<Effect>) {
    for candidate in session.pending_local_candidates.drain(..) {
        effects.push(Effect::SendSignal {
            to: session.peer_id.clone(),
            message: SignalMessage::IceCandidate { candidate },
        });
    }
}
