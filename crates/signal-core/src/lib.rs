//! Signaling layer for the rtcall stack
//!
//! This crate wraps an external publish/subscribe primitive (one channel per
//! user identity) and turns its opaque payloads into a typed set of call
//! signaling messages. Everything above this crate only ever sees
//! [`SignalMessage`] values; malformed payloads are dropped here.
//!
//! # Layers
//!
//! ```text
//! ┌──────────────────────────┐
//! │      SignalChannel       │  subscribe / send / unsubscribe
//! │  (typed, validated)      │
//! └────────────┬─────────────┘
//!              │ serde_json::Value
//! ┌────────────▼─────────────┐
//! │   dyn SignalTransport    │  external pub/sub (at-most-once)
//! └──────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rtcall_signal_core::{InMemorySignalHub, PeerId, SignalChannel, SignalEnvelope, SignalMessage};
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! runtime.block_on(async {
//!     let hub = Arc::new(InMemorySignalHub::new());
//!     let alice = SignalChannel::new(hub.clone());
//!     let bob = SignalChannel::new(hub.clone());
//!
//!     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!     let _sub = bob
//!         .subscribe(&PeerId::from("bob"), Arc::new(move |envelope: SignalEnvelope| {
//!             let _ = tx.send(envelope);
//!         }))
//!         .await
//!         .unwrap();
//!
//!     alice.send(&PeerId::from("bob"), SignalMessage::HangUp).await;
//!     assert_eq!(rx.recv().await.unwrap().message, SignalMessage::HangUp);
//! });
//! ```

pub mod channel;
pub mod error;
pub mod memory;
pub mod message;
pub mod transport;
pub mod types;

pub use channel::{SignalChannel, SignalHandler, SignalSubscription};
pub use error::{SignalError, SignalResult};
pub use memory::InMemorySignalHub;
pub use message::{SignalEnvelope, SignalMessage};
pub use transport::{channel_name, PayloadHandler, SignalTransport, SubscriptionId};
pub use types::{IceCandidate, MediaKind, PeerId, SdpType, SessionDescription};

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        channel_name, IceCandidate, InMemorySignalHub, MediaKind, PeerId, SdpType,
        SessionDescription, SignalChannel, SignalEnvelope, SignalError, SignalMessage,
        SignalResult, SignalSubscription, SignalTransport,
    };
}
