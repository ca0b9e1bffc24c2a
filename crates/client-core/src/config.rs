//! Call orchestrator configuration
//!
//! [`CallConfig`] holds everything the orchestrator needs that is not an
//! injected collaborator: ICE servers, the glare policy, optional ring and
//! answer timeouts and a few tuning knobs. It can be built in code with the
//! `with_*` methods or loaded from YAML.
//!
//! ```yaml
//! ice:
//!   ice_servers:
//!     - urls: ["stun:stun.l.google.com:19302"]
//! glare_policy: respond_busy
//! ring_timeout_ms: 30000
//! ```

use rtcall_session_core::{GlarePolicy, IceConfig, IceServer};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{CallError, CallResult};

/// Default capacity of the [`CallEvent`](crate::CallEvent) broadcast channel
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Configuration for a [`CallOrchestrator`](crate::CallOrchestrator)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Servers handed to the peer engine for every connection
    pub ice: IceConfig,

    /// What to do with an offer that arrives during a call
    pub glare_policy: GlarePolicy,

    /// End an unanswered incoming call after this many milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ring_timeout_ms: Option<u64>,

    /// End an outgoing call nobody answered after this many milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_timeout_ms: Option<u64>,

    /// Capacity of the event broadcast channel
    pub event_capacity: usize,

    /// Request a (disabled) camera track for voice calls too
    pub voice_video_placeholder: bool,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            ice: IceConfig::default(),
            glare_policy: GlarePolicy::default(),
            ring_timeout_ms: None,
            answer_timeout_ms: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            voice_video_placeholder: false,
        }
    }
}

impl CallConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the ICE server list
    pub fn with_ice_servers(mut self, servers: Vec<IceServer>) -> Self {
        self.ice.ice_servers = servers;
        self
    }

    /// Append one ICE server to the list
    pub fn with_ice_server(mut self, server: IceServer) -> Self {
        self.ice.ice_servers.push(server);
        self
    }

    pub fn with_glare_policy(mut self, policy: GlarePolicy) -> Self {
        self.glare_policy = policy;
        self
    }

    pub fn with_ring_timeout(mut self, timeout: Duration) -> Self {
        self.ring_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_answer_timeout(mut self, timeout: Duration) -> Self {
        self.answer_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn with_video_placeholder(mut self, enabled: bool) -> Self {
        self.voice_video_placeholder = enabled;
        self
    }

    pub fn ring_timeout(&self) -> Option<Duration> {
        self.ring_timeout_ms.map(Duration::from_millis)
    }

    pub fn answer_timeout(&self) -> Option<Duration> {
        self.answer_timeout_ms.map(Duration::from_millis)
    }

    /// Check the configuration for values the orchestrator cannot use
    pub fn validate(&self) -> CallResult<()> {
        for server in &self.ice.ice_servers {
            if server.urls.is_empty() {
                return Err(CallError::config("ICE server without any URL"));
            }
            for url in &server.urls {
                let is_turn = url.starts_with("turn:") || url.starts_with("turns:");
                if !is_turn && !url.starts_with("stun:") {
                    return Err(CallError::config(format!(
                        "ICE server URL must use stun:, turn: or turns:, got {}",
                        url
                    )));
                }
                if is_turn && (server.username.is_none() || server.credential.is_none()) {
                    return Err(CallError::config(format!(
                        "TURN server {} needs a username and a credential",
                        url
                    )));
                }
            }
        }

        if self.ring_timeout_ms == Some(0) {
            return Err(CallError::config("ring_timeout_ms must be greater than zero"));
        }
        if self.answer_timeout_ms == Some(0) {
            return Err(CallError::config("answer_timeout_ms must be greater than zero"));
        }
        if self.event_capacity == 0 {
            return Err(CallError::config("event_capacity must be greater than zero"));
        }
        Ok(())
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> CallResult<Self> {
        let config: CallConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> CallResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            CallError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn to_yaml(&self) -> CallResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
