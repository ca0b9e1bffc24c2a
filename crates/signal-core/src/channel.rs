//! Typed signaling channel built on top of a [`SignalTransport`]
//!
//! One `SignalChannel` belongs to one local identity at a time. Subscribing
//! again (for example after the signed-in user changes) replaces the
//! previous subscription instead of adding a second one, so a payload is
//! never delivered twice to the same client.

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::SignalResult;
use crate::message::{SignalEnvelope, SignalMessage};
use crate::transport::{channel_name, PayloadHandler, SignalTransport, SubscriptionId};
use crate::types::PeerId;

/// Callback invoked with every validated inbound message
pub type SignalHandler = Arc<dyn Fn(SignalEnvelope) + Send + Sync>;

/// Handle to an open inbound channel
///
/// Consumed by [`SignalChannel::unsubscribe`], so it can only be released once.
#[derive(Debug)]
pub struct SignalSubscription {
    id: SubscriptionId,
    owner: PeerId,
}

impl SignalSubscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Identity whose channel this subscription listens on
    pub fn owner(&self) -> &PeerId {
        &self.owner
    }
}

#[derive(Debug, Clone)]
struct ActiveSubscription {
    owner: PeerId,
    id: SubscriptionId,
}

/// Signaling adapter: validated inbound delivery and best-effort sends
pub struct SignalChannel {
    transport: Arc<dyn SignalTransport>,
    active: Mutex<Option<ActiveSubscription>>,
}

impl SignalChannel {
    pub fn new(transport: Arc<dyn SignalTransport>) -> Self {
        Self {
            transport,
            active: Mutex::new(None),
        }
    }

    /// Open the inbound channel addressed to `self_id`
    ///
    /// Any previous subscription held by this channel is released first.
    pub async fn subscribe(
        &self,
        self_id: &PeerId,
        handler: SignalHandler,
    ) -> SignalResult<SignalSubscription> {
        let previous = self.active.lock().take();
        if let Some(previous) = previous {
            info!(
                "Replacing signaling subscription for {} with one for {}",
                previous.owner, self_id
            );
            if let Err(e) = self.transport.unsubscribe(previous.id).await {
                warn!("Failed to release previous signaling subscription: {}", e);
            }
        }

        let channel = channel_name(self_id);
        let decode_channel = channel.clone();
        let decoder: PayloadHandler = Arc::new(move |payload: Value| {
            match SignalEnvelope::from_payload(payload) {
                Ok(envelope) => {
                    debug!(
                        "Received {} on {} (sender: {:?})",
                        envelope.message.kind(),
                        decode_channel,
                        envelope.sender
                    );
                    handler(envelope);
                }
                Err(e) => warn!("Dropping signaling payload on {}: {}", decode_channel, e),
            }
        });

        let id = self.transport.subscribe(&channel, decoder).await?;
        *self.active.lock() = Some(ActiveSubscription {
            owner: self_id.clone(),
            id,
        });
        info!("Subscribed to {}", channel);

        Ok(SignalSubscription {
            id,
            owner: self_id.clone(),
        })
    }

    /// Best-effort delivery of `message` to `target`'s channel
    ///
    /// The message is stamped with the currently subscribed identity. Delivery
    /// failures are logged and otherwise ignored; the call protocol never
    /// depends on a send being acknowledged.
    pub async fn send(&self, target: &PeerId, message: SignalMessage) {
        let sender = self.local_identity();
        let kind = message.kind();
        let envelope = SignalEnvelope::new(sender, message);

        let payload = match envelope.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode {} for {}: {}", kind, target, e);
                return;
            }
        };

        match self.transport.publish(&channel_name(target), payload).await {
            Ok(()) => debug!("Sent {} to {}", kind, target),
            Err(e) => warn!("Failed to send {} to {}: {}", kind, target, e),
        }
    }

    /// Release the inbound channel
    ///
    /// A handle that was already replaced by a newer subscription is a no-op.
    pub async fn unsubscribe(&self, subscription: SignalSubscription) -> SignalResult<()> {
        let current = {
            let mut active = self.active.lock();
            match active.as_ref() {
                Some(current) if current.id == subscription.id => active.take(),
                _ => None,
            }
        };

        match current {
            Some(current) => {
                self.transport.unsubscribe(current.id).await?;
                info!("Unsubscribed from {}", channel_name(&current.owner));
                Ok(())
            }
            None => {
                debug!(
                    "Signaling subscription {} for {} is no longer active",
                    subscription.id, subscription.owner
                );
                Ok(())
            }
        }
    }

    /// Identity of the currently open inbound channel, if any
    pub fn local_identity(&self) -> Option<PeerId> {
        self.active.lock().as_ref().map(|active| active.owner.clone())
    }

    pub fn is_subscribed(&self) -> bool {
        self.active.lock().is_some()
    }
}
