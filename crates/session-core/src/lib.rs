//! Peer session layer for rtcall
//!
//! This crate holds the heart of the call stack: the state machine of one
//! peer-to-peer call. It decides which signal to send, when a remote
//! description or candidate may be applied, and which resources to release
//! when the call ends, without performing any I/O itself.
//!
//! # Architecture
//!
//! ```text
//!  local commands ─┐
//!  inbound signals ─┼─► PeerSessionController::handle_event ─► Dispatch { next, effects }
//!  engine events  ─┤         │
//!  timers         ─┘         └─ MASTER_TABLE (state, event) -> transition
//! ```
//!
//! The caller (normally `rtcall-client-core`) executes the effects: sends
//! signals, applies descriptions through [`negotiation`], records history,
//! and runs the [`Teardown`] a terminating transition yields.
//!
//! # Example
//!
//! ```
//! use rtcall_session_core::{GlarePolicy, PeerSessionController, SessionEvent, SessionState};
//! use rtcall_signal_core::{MediaKind, PeerId};
//!
//! let mut controller = PeerSessionController::new(GlarePolicy::Drop);
//! let dispatch = controller.handle_event(SessionEvent::StartOutgoing {
//!     local: PeerId::from("alice"),
//!     peer: PeerId::from("bob"),
//!     media_kind: MediaKind::Voice,
//! });
//! assert_eq!(dispatch.next, SessionState::Offering);
//!
//! // Nothing can happen to a session once it has ended
//! controller.handle_event(SessionEvent::LocalHangUp);
//! let late = controller.handle_event(SessionEvent::ReceiveHangUp);
//! assert!(!late.handled);
//! ```

pub mod controller;
pub mod engine;
pub mod error;
pub mod events;
pub mod mock;
pub mod negotiation;
pub mod session;
pub mod state_table;
pub mod types;

pub use controller::{Dispatch, Effect, PeerSessionController};
pub use engine::{EngineEvent, EngineEventSink, PeerConnection, PeerEngine, RemoteStream};
pub use error::{EngineError, EngineResult, SessionError, SessionResult};
pub use events::SessionEvent;
pub use mock::{MockConnection, MockEngine, MockOp};
pub use session::{CallSession, Negotiation, SessionSnapshot, Teardown, TeardownSummary};
pub use state_table::{Action, EventType, StateKey, Transition, TransitionTable, MASTER_TABLE};
pub use types::{
    CallDirection, ConnectionState, EndReason, GlarePolicy, IceConfig, IceServer,
    RecordDirection, SessionId, SessionState,
};
