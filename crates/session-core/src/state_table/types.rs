use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::types::{RecordDirection, SessionState};

/// Payload-free event kind used as part of the table key
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum EventType {
    StartOutgoing,
    ReceiveOffer,
    Accept,
    Reject,
    LocalDescriptionReady,
    ReceiveAnswer,
    ReceiveCandidate,
    EngineConnected,
    EngineDisconnected,
    EngineFailed,
    ReceiveHangUp,
    ReceiveBusy,
    LocalHangUp,
    RingTimeout,
    AnswerTimeout,
    MediaUnavailable,
    SetupFailed,
    SignedOut,
}

/// Key for looking up transitions in the state table
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct StateKey {
    pub state: SessionState,
    pub event: EventType,
}

impl StateKey {
    pub fn new(state: SessionState, event: EventType) -> Self {
        Self { state, event }
    }
}

/// Actions executed while taking a transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Start a fresh outgoing session from the event payload
    CreateOutgoingSession,
    /// Start a fresh incoming session and store the offer
    CreateIncomingSession,
    /// Write a call history entry
    RecordCall(RecordDirection),
    /// Incoming call was picked up
    MarkAccepted,
    StoreLocalDescription,
    SendOffer,
    SendAnswer,
    /// Store the answer and hand it to the engine
    ApplyRemoteAnswer,
    /// Buffer the candidate until the remote description is applied
    QueueOrApplyCandidate,
    /// Engine reported connected before our answer went out
    NoteEarlyConnect,
    /// Best-effort hang-up to the known peer
    SendHangUp,
    /// Release every resource of the session
    Teardown,
}

/// What happens when an event occurs in a state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Actions to execute, in order
    pub actions: Vec<Action>,

    /// Next state (if changing)
    pub next_state: Option<SessionState>,
}

impl Transition {
    pub fn to(next_state: SessionState, actions: Vec<Action>) -> Self {
        Self {
            actions,
            next_state: Some(next_state),
        }
    }

    /// Transition that runs actions but keeps the current state
    pub fn stay(actions: Vec<Action>) -> Self {
        Self {
            actions,
            next_state: None,
        }
    }
}

/// Every legal transition of a call session
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    transitions: HashMap<StateKey, Transition>,
    /// Transitions that apply to any live (non-idle, non-terminal) state
    wildcard_transitions: HashMap<EventType, Transition>,
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, state: SessionState, event: EventType, transition: Transition) {
        self.transitions.insert(StateKey::new(state, event), transition);
    }

    /// Insert a transition that applies to every live state
    pub fn insert_wildcard(&mut self, event: EventType, transition: Transition) {
        self.wildcard_transitions.insert(event, transition);
    }

    /// Look up the transition for `event` in `state`
    ///
    /// Exact entries win over wildcards. Wildcards never match `Idle` or a
    /// terminal state, so nothing can leave `Ended` or `Failed`.
    pub fn get(&self, state: SessionState, event: EventType) -> Option<&Transition> {
        if let Some(transition) = self.transitions.get(&StateKey::new(state, event)) {
            return Some(transition);
        }
        if state.is_active() {
            return self.wildcard_transitions.get(&event);
        }
        None
    }

    pub fn has_transition(&self, state: SessionState, event: EventType) -> bool {
        self.get(state, event).is_some()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len() + self.wildcard_transitions.len()
    }

    /// Collect all states referenced in this table
    pub fn collect_used_states(&self) -> HashSet<SessionState> {
        let mut states = HashSet::new();
        for (key, transition) in &self.transitions {
            states.insert(key.state);
            if let Some(next) = transition.next_state {
                states.insert(next);
            }
        }
        for transition in self.wildcard_transitions.values() {
            if let Some(next) = transition.next_state {
                states.insert(next);
            }
        }
        states
    }

    /// States reachable from `Idle` by following exact and wildcard entries
    pub fn reachable_states(&self) -> HashSet<SessionState> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([SessionState::Idle]);
        while let Some(state) = queue.pop_front() {
            if !seen.insert(state) {
                continue;
            }
            let exact = self
                .transitions
                .iter()
                .filter(|(key, _)| key.state == state)
                .map(|(_, t)| t);
            let wild = self
                .wildcard_transitions
                .values()
                .filter(|_| state.is_active());
            for transition in exact.chain(wild) {
                if let Some(next) = transition.next_state {
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for key in self.transitions.keys() {
            if key.state.is_terminal() {
                errors.push(format!(
                    "Terminal state {:?} has an exit on {:?}",
                    key.state, key.event
                ));
            }
        }

        for state in self.collect_used_states() {
            if state.is_terminal() {
                continue;
            }
            let has_exact_exit = self.transitions.keys().any(|k| k.state == state);
            let has_wildcard_exit = state.is_active() && !self.wildcard_transitions.is_empty();
            if !has_exact_exit && !has_wildcard_exit {
                errors.push(format!("State {:?} has no exit transitions", state));
            }
        }

        let reachable = self.reachable_states();
        for state in self.collect_used_states() {
            if !reachable.contains(&state) {
                errors.push(format!("State {:?} is unreachable from Idle", state));
            }
        }

        let exact = self.transitions.iter().map(|(k, t)| (format!("{:?}", k.state), k.event, t));
        let wild = self
            .wildcard_transitions
            .iter()
            .map(|(event, t)| ("*".to_string(), *event, t));
        for (state, event, transition) in exact.chain(wild) {
            let tears_down = transition.actions.contains(&Action::Teardown);
            let ends = transition.next_state.map(|s| s.is_terminal()).unwrap_or(false);
            if tears_down != ends {
                errors.push(format!(
                    "Transition {} on {:?} must tear down exactly when it ends the session",
                    state, event
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
