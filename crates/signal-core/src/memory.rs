//! In-process pub/sub hub
//!
//! Memory-based implementation of [`SignalTransport`] for tests and demos.
//! Every publish is delivered synchronously to the handlers subscribed at
//! that moment and recorded in a per-channel log.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use tracing::trace;

use crate::error::{SignalError, SignalResult};
use crate::transport::{PayloadHandler, SignalTransport, SubscriptionId};

/// Shared in-memory signaling hub
pub struct InMemorySignalHub {
    /// Subscribers keyed by channel name
    channels: DashMap<String, Vec<(SubscriptionId, PayloadHandler)>>,
    /// Every payload ever published, per channel
    published: DashMap<String, Vec<Value>>,
    /// Channels whose publishes are silently lost
    lossy: Mutex<HashSet<String>>,
}

impl InMemorySignalHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            published: DashMap::new(),
            lossy: Mutex::new(HashSet::new()),
        }
    }

    /// Payloads published to `channel` so far, in publish order
    pub fn published_to(&self, channel: &str) -> Vec<Value> {
        self.published
            .get(channel)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Number of live subscriptions on `channel`
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map(|entry| entry.value().len())
            .unwrap_or(0)
    }

    /// Drop (or stop dropping) everything published to `channel`
    pub fn set_lossy(&self, channel: &str, lossy: bool) {
        let mut set = self.lossy.lock();
        if lossy {
            set.insert(channel.to_string());
        } else {
            set.remove(channel);
        }
    }
}

impl Default for InMemorySignalHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalTransport for InMemorySignalHub {
    async fn subscribe(&self, channel: &str, handler: PayloadHandler) -> SignalResult<SubscriptionId> {
        let id = SubscriptionId::new();
        self.channels
            .entry(channel.to_string())
            .or_default()
            .push((id, handler));
        trace!("Hub subscription {} on {}", id, channel);
        Ok(id)
    }

    async fn publish(&self, channel: &str, payload: Value) -> SignalResult<()> {
        self.published
            .entry(channel.to_string())
            .or_default()
            .push(payload.clone());

        if self.lossy.lock().contains(channel) {
            trace!("Hub dropped payload on lossy channel {}", channel);
            return Ok(());
        }

        // Clone the handlers out so none of them runs while the map is locked
        let handlers: Vec<PayloadHandler> = self
            .channels
            .get(channel)
            .map(|entry| entry.value().iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();

        for handler in handlers {
            handler(payload.clone());
        }
        Ok(())
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> SignalResult<()> {
        let mut removed = false;
        for mut entry in self.channels.iter_mut() {
            let before = entry.value().len();
            entry.value_mut().retain(|(sub_id, _)| *sub_id != id);
            removed |= entry.value().len() != before;
        }

        if removed {
            Ok(())
        } else {
            Err(SignalError::transport(format!("unknown subscription {}", id)))
        }
    }
}
