//! Data-driven transition table for call sessions
//!
//! Every legal (state, event) pair is listed here once. The controller never
//! branches on state directly; it looks the pair up and runs the actions.

pub mod types;

pub use types::*;

use lazy_static::lazy_static;
use std::sync::Arc;

use crate::types::{RecordDirection, SessionState};

lazy_static! {
    /// The master transition table, single source of truth for the controller
    pub static ref MASTER_TABLE: Arc<TransitionTable> = Arc::new(build_master_table());
}

fn build_master_table() -> TransitionTable {
    let table = default_table();
    if let Err(errors) = table.validate() {
        tracing::error!("Session transition table is inconsistent: {:?}", errors);
    }
    tracing::debug!(
        "Built session transition table with {} entries",
        table.transition_count()
    );
    table
}

/// The built-in transition table
pub fn default_table() -> TransitionTable {
    use Action::*;
    use SessionState::*;

    let mut table = TransitionTable::new();

    // Outgoing call
    table.insert(
        Idle,
        EventType::StartOutgoing,
        Transition::to(
            Offering,
            vec![CreateOutgoingSession, RecordCall(RecordDirection::Outgoing)],
        ),
    );
    table.insert(
        Offering,
        EventType::LocalDescriptionReady,
        Transition::stay(vec![StoreLocalDescription, SendOffer]),
    );
    table.insert(
        Offering,
        EventType::ReceiveAnswer,
        Transition::to(Connecting, vec![ApplyRemoteAnswer]),
    );
    table.insert(
        Offering,
        EventType::AnswerTimeout,
        Transition::to(Ended, vec![SendHangUp, Teardown]),
    );

    // Incoming call
    table.insert(
        Idle,
        EventType::ReceiveOffer,
        Transition::to(RingingLocal, vec![CreateIncomingSession]),
    );
    table.insert(
        RingingLocal,
        EventType::Accept,
        Transition::to(
            Answering,
            vec![MarkAccepted, RecordCall(RecordDirection::Incoming)],
        ),
    );
    table.insert(
        RingingLocal,
        EventType::Reject,
        Transition::to(Ended, vec![SendHangUp, Teardown]),
    );
    table.insert(
        RingingLocal,
        EventType::RingTimeout,
        Transition::to(Ended, vec![Teardown]),
    );
    table.insert(
        Answering,
        EventType::LocalDescriptionReady,
        Transition::to(Connecting, vec![StoreLocalDescription, SendAnswer]),
    );
    table.insert(
        Answering,
        EventType::EngineConnected,
        Transition::stay(vec![NoteEarlyConnect]),
    );

    // Candidates stream in any live state
    for state in [Offering, RingingLocal, Answering, Connecting, Connected, Reconnecting] {
        table.insert(
            state,
            EventType::ReceiveCandidate,
            Transition::stay(vec![QueueOrApplyCandidate]),
        );
    }

    // Connectivity
    table.insert(Connecting, EventType::EngineConnected, Transition::to(Connected, vec![]));
    table.insert(Connected, EventType::EngineDisconnected, Transition::to(Reconnecting, vec![]));
    table.insert(Reconnecting, EventType::EngineConnected, Transition::to(Connected, vec![]));
    for state in [Offering, Answering, Connecting, Connected, Reconnecting] {
        table.insert(state, EventType::EngineFailed, Transition::to(Failed, vec![Teardown]));
    }

    // Termination from any live state
    table.insert_wildcard(EventType::ReceiveHangUp, Transition::to(Ended, vec![Teardown]));
    table.insert_wildcard(EventType::ReceiveBusy, Transition::to(Ended, vec![Teardown]));
    table.insert_wildcard(
        EventType::LocalHangUp,
        Transition::to(Ended, vec![SendHangUp, Teardown]),
    );
    table.insert_wildcard(
        EventType::SignedOut,
        Transition::to(Ended, vec![SendHangUp, Teardown]),
    );
    table.insert_wildcard(
        EventType::MediaUnavailable,
        Transition::to(Ended, vec![SendHangUp, Teardown]),
    );
    table.insert_wildcard(
        EventType::SetupFailed,
        Transition::to(Failed, vec![SendHangUp, Teardown]),
    );

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ALL_STATES: [SessionState; 9] = [
        SessionState::Idle,
        SessionState::Offering,
        SessionState::RingingLocal,
        SessionState::Answering,
        SessionState::Connecting,
        SessionState::Connected,
        SessionState::Reconnecting,
        SessionState::Ended,
        SessionState::Failed,
    ];

    const ALL_EVENTS: [EventType; 18] = [
        EventType::StartOutgoing,
        EventType::ReceiveOffer,
        EventType::Accept,
        EventType::Reject,
        EventType::LocalDescriptionReady,
        EventType::ReceiveAnswer,
        EventType::ReceiveCandidate,
        EventType::EngineConnected,
        EventType::EngineDisconnected,
        EventType::EngineFailed,
        EventType::ReceiveHangUp,
        EventType::ReceiveBusy,
        EventType::LocalHangUp,
        EventType::RingTimeout,
        EventType::AnswerTimeout,
        EventType::MediaUnavailable,
        EventType::SetupFailed,
        EventType::SignedOut,
    ];

    #[test]
    fn test_default_table_is_valid() {
        assert_eq!(default_table().validate(), Ok(()));
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        let table = default_table();
        for state in [SessionState::Ended, SessionState::Failed] {
            for event in ALL_EVENTS {
                assert!(
                    !table.has_transition(state, event),
                    "{:?} must not react to {:?}",
                    state,
                    event
                );
            }
        }
    }

    #[test]
    fn test_every_state_is_reachable() {
        let reachable = default_table().reachable_states();
        for state in ALL_STATES {
            assert!(reachable.contains(&state), "{:?} unreachable", state);
        }
    }

    #[test]
    fn test_idle_only_creates_sessions() {
        let table = default_table();
        let handled: Vec<_> = ALL_EVENTS
            .iter()
            .copied()
            .filter(|e| table.has_transition(SessionState::Idle, *e))
            .collect();
        assert_eq!(handled, vec![EventType::StartOutgoing, EventType::ReceiveOffer]);
    }

    #[test]
    fn test_exact_entry_wins_over_wildcard() {
        let table = default_table();
        let reject = table.get(SessionState::RingingLocal, EventType::Reject).unwrap();
        assert_eq!(reject.next_state, Some(SessionState::Ended));

        let failed = table.get(SessionState::Connected, EventType::EngineFailed).unwrap();
        assert_eq!(failed.next_state, Some(SessionState::Failed));
        assert!(failed.actions.contains(&Action::Teardown));
        assert!(!failed.actions.contains(&Action::SendHangUp));
    }

    #[test]
    fn test_hang_up_reaches_every_live_state() {
        let table = default_table();
        for state in ALL_STATES.iter().filter(|s| s.is_active()) {
            let t = table.get(*state, EventType::ReceiveHangUp).unwrap();
            assert_eq!(t.next_state, Some(SessionState::Ended));
        }
    }

    #[test]
    fn test_validate_flags_exit_from_terminal_state() {
        let mut table = default_table();
        table.insert(
            SessionState::Ended,
            EventType::ReceiveAnswer,
            Transition::to(SessionState::Connecting, vec![]),
        );
        let errors = table.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("Terminal state Ended")));
    }

    #[test]
    fn test_master_table_matches_default() {
        assert_eq!(MASTER_TABLE.transition_count(), default_table().transition_count());
    }
}
