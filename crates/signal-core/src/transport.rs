//! Contract of the external publish/subscribe primitive
//!
//! The transport knows nothing about calls. It delivers an opaque payload to
//! every current subscriber of a named channel, at most once per publish,
//! with no ordering guarantee across channels.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::SignalResult;
use crate::types::PeerId;

/// Callback invoked with every payload delivered on a subscribed channel
pub type PayloadHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Identifier of one transport-level subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of the inbound signaling channel for a user
pub fn channel_name(user: &PeerId) -> String {
    format!("signaling:{}", user)
}

/// External pub/sub primitive the signaling channel is built on
#[async_trait]
pub trait SignalTransport: Send + Sync {
    /// Start delivering payloads published on `channel` to `handler`
    async fn subscribe(&self, channel: &str, handler: PayloadHandler) -> SignalResult<SubscriptionId>;

    /// Publish a payload to all current subscribers of `channel`
    ///
    /// Success means the payload was handed to the transport, not that
    /// anyone received it.
    async fn publish(&self, channel: &str, payload: Value) -> SignalResult<()>;

    /// Stop a subscription
    async fn unsubscribe(&self, id: SubscriptionId) -> SignalResult<()>;
}
