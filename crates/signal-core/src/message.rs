//! Call signaling messages
//!
//! The wire shape is a flat JSON object tagged by `type`:
//!
//! ```json
//! { "type": "offer", "sdp": { "type": "offer", "sdp": "v=0..." }, "callerId": "alice", "mediaKind": "video", "senderId": "alice" }
//! { "type": "answer", "sdp": { "type": "answer", "sdp": "v=0..." } }
//! { "type": "ice-candidate", "candidate": { "candidate": "candidate:1 1 udp ..." } }
//! { "type": "hang-up" }
//! ```
//!
//! `senderId` is optional on every message. Older clients send the media
//! kind as `callType`; it is accepted as an alias.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SignalError, SignalResult};
use crate::types::{IceCandidate, MediaKind, PeerId, SessionDescription};

/// Sender identity field carried alongside every message
const SENDER_FIELD: &str = "senderId";

/// Typed signaling message exchanged between two call peers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalMessage {
    /// Initiate a session
    #[serde(rename_all = "camelCase")]
    Offer {
        sdp: SessionDescription,
        caller_id: PeerId,
        #[serde(alias = "callType")]
        media_kind: MediaKind,
    },
    /// Accept and complete negotiation
    Answer { sdp: SessionDescription },
    /// Streamed connectivity candidate
    IceCandidate { candidate: IceCandidate },
    /// Terminate the session unconditionally
    HangUp,
    /// The callee already has a call in progress
    Busy,
}

impl SignalMessage {
    /// Wire name of this message, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            SignalMessage::Offer { .. } => "offer",
            SignalMessage::Answer { .. } => "answer",
            SignalMessage::IceCandidate { .. } => "ice-candidate",
            SignalMessage::HangUp => "hang-up",
            SignalMessage::Busy => "busy",
        }
    }
}

/// A signaling message together with the identity that sent it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalEnvelope {
    /// Sender identity, when the remote client supplied one
    pub sender: Option<PeerId>,
    pub message: SignalMessage,
}

impl SignalEnvelope {
    pub fn new(sender: Option<PeerId>, message: SignalMessage) -> Self {
        Self { sender, message }
    }

    /// Identity this message claims to come from
    ///
    /// Offers always name their caller, so that takes precedence over the
    /// optional sender field.
    pub fn claimed_sender(&self) -> Option<&PeerId> {
        match &self.message {
            SignalMessage::Offer { caller_id, .. } => Some(caller_id),
            _ => self.sender.as_ref(),
        }
    }

    /// Encode into the opaque payload handed to the transport
    pub fn to_payload(&self) -> SignalResult<Value> {
        let mut value = serde_json::to_value(&self.message)?;
        if let (Some(sender), Value::Object(map)) = (&self.sender, &mut value) {
            map.insert(SENDER_FIELD.to_string(), Value::String(sender.0.clone()));
        }
        Ok(value)
    }

    /// Validate and decode an opaque payload delivered by the transport
    pub fn from_payload(payload: Value) -> SignalResult<Self> {
        let mut map: Map<String, Value> = match payload {
            Value::Object(map) => map,
            other => {
                return Err(SignalError::malformed(format!(
                    "expected a JSON object, got {}",
                    json_type_name(&other)
                )))
            }
        };

        let sender = match map.remove(SENDER_FIELD) {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) if !id.is_empty() => Some(PeerId(id)),
            Some(other) => {
                return Err(SignalError::malformed(format!(
                    "{} must be a non-empty string, got {}",
                    SENDER_FIELD,
                    json_type_name(&other)
                )))
            }
        };

        if !map.contains_key("type") {
            return Err(SignalError::malformed("missing `type` field"));
        }

        let message: SignalMessage = serde_json::from_value(Value::Object(map))
            .map_err(|e| SignalError::malformed(e.to_string()))?;

        Ok(Self { sender, message })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
