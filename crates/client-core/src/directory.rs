//! Directory of users this client may call or be called by

use async_trait::async_trait;
use dashmap::DashMap;
use rtcall_signal_core::PeerId;
use serde::{Deserialize, Serialize};

/// Public profile of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerProfile {
    pub id: PeerId,
    pub display_name: String,
}

impl PeerProfile {
    pub fn new(id: impl Into<PeerId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Resolves peer identities to profiles
///
/// Outgoing calls to unknown peers are refused, and offers from unknown
/// callers are ignored.
#[async_trait]
pub trait PeerDirectory: Send + Sync {
    async fn lookup(&self, id: &PeerId) -> Option<PeerProfile>;
}

/// Fixed, in-memory [`PeerDirectory`]
#[derive(Debug, Default)]
pub struct StaticDirectory {
    peers: DashMap<PeerId, PeerProfile>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with_peer(self, id: impl Into<PeerId>, display_name: impl Into<String>) -> Self {
        self.insert(PeerProfile::new(id, display_name));
        self
    }

    pub fn insert(&self, profile: PeerProfile) {
        self.peers.insert(profile.id.clone(), profile);
    }

    pub fn remove(&self, id: &PeerId) -> Option<PeerProfile> {
        self.peers.remove(id).map(|(_, profile)| profile)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[async_trait]
impl PeerDirectory for StaticDirectory {
    async fn lookup(&self, id: &PeerId) -> Option<PeerProfile> {
        self.peers.get(id).map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_known_and_unknown() {
        let directory = StaticDirectory::new().with_peer("bob", "Bob");
        assert_eq!(
            directory.lookup(&PeerId::from("bob")).await.map(|p| p.display_name),
            Some("Bob".to_string())
        );
        assert!(directory.lookup(&PeerId::from("mallory")).await.is_none());

        directory.remove(&PeerId::from("bob"));
        assert!(directory.is_empty());
    }
}
