//! Envelope model for the realtime channel.
//!
//! Every message on the socket is an [`Envelope`]: a closed [`MessageKind`]
//! tag, an opaque JSON payload, the sender id and an RFC 3339 timestamp.
//!
//! DESIGN
//! ======
//! The kind set is closed. Consumers dispatch with an exhaustive `match`
//! instead of comparing type strings, and a frame carrying a type outside
//! the set is rejected at decode time rather than delivered. Payloads stay
//! flexible (`serde_json::Value`); the typed views at the bottom of this
//! module decode only the fields the feature handles read.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Error returned by [`decode_envelope`] and [`encode_envelope`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text was not a JSON envelope.
    #[error("failed to decode envelope: {0}")]
    Json(#[from] serde_json::Error),
    /// The `type` field names a kind outside [`MessageKind`].
    #[error("unknown message type: {0}")]
    UnknownKind(String),
}

// =============================================================================
// MESSAGE KIND
// =============================================================================

/// Tag of a realtime message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    CallStarted,
    CallEnded,
    CallUpdated,
    LeadCreated,
    LeadUpdated,
    LeadDeleted,
    UserJoined,
    UserLeft,
    Notification,
    WebrtcOffer,
    WebrtcAnswer,
    WebrtcIceCandidate,
}

impl MessageKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::CallStarted,
        Self::CallEnded,
        Self::CallUpdated,
        Self::LeadCreated,
        Self::LeadUpdated,
        Self::LeadDeleted,
        Self::UserJoined,
        Self::UserLeft,
        Self::Notification,
        Self::WebrtcOffer,
        Self::WebrtcAnswer,
        Self::WebrtcIceCandidate,
    ];

    /// Wire name of the kind, e.g. `"user_joined"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CallStarted => "call_started",
            Self::CallEnded => "call_ended",
            Self::CallUpdated => "call_updated",
            Self::LeadCreated => "lead_created",
            Self::LeadUpdated => "lead_updated",
            Self::LeadDeleted => "lead_deleted",
            Self::UserJoined => "user_joined",
            Self::UserLeft => "user_left",
            Self::Notification => "notification",
            Self::WebrtcOffer => "webrtc_offer",
            Self::WebrtcAnswer => "webrtc_answer",
            Self::WebrtcIceCandidate => "webrtc_ice_candidate",
        }
    }

    /// Parse a wire name. Returns `None` for anything outside the closed set.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw)
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| CodecError::UnknownKind(s.to_owned()))
    }
}

// =============================================================================
// ENVELOPE
// =============================================================================

/// A single message on the realtime channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Arbitrary JSON payload. `null` when the sender omitted it.
    #[serde(default)]
    pub payload: Value,
    /// Sender identifier.
    #[serde(rename = "userId", default)]
    pub user_id: String,
    /// RFC 3339 send time, as produced by the sender.
    #[serde(default)]
    pub timestamp: String,
}

impl Envelope {
    /// Build an envelope stamped with the current time.
    pub fn new(kind: MessageKind, payload: Value, user_id: impl Into<String>) -> Self {
        Self { kind, payload, user_id: user_id.into(), timestamp: now_rfc3339() }
    }

    /// Decode the payload into a typed view.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the payload does not have the expected shape.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }

    /// A string field of an object payload. Absent and mistyped fields read as `None`.
    #[must_use]
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// True only when the payload carries `key: true`.
    #[must_use]
    pub fn payload_flag(&self, key: &str) -> bool {
        self.payload.get(key).and_then(Value::as_bool) == Some(true)
    }
}

/// Outbound message as handed to `send` before the connection completes it.
///
/// `user_id` and `timestamp` are optional; the connection fills them in.
#[derive(Clone, Debug, PartialEq)]
pub struct OutboundMessage {
    pub kind: MessageKind,
    pub payload: Value,
    pub user_id: Option<String>,
    pub timestamp: Option<String>,
}

impl OutboundMessage {
    #[must_use]
    pub fn new(kind: MessageKind, payload: Value) -> Self {
        Self { kind, payload, user_id: None, timestamp: None }
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Complete the message into an envelope, stamping missing fields.
    #[must_use]
    pub fn into_envelope(self, default_user_id: &str) -> Envelope {
        Envelope {
            kind: self.kind,
            payload: self.payload,
            user_id: self.user_id.unwrap_or_else(|| default_user_id.to_owned()),
            timestamp: self.timestamp.unwrap_or_else(now_rfc3339),
        }
    }
}

/// Encode an envelope as a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode_envelope(envelope: &Envelope) -> Result<String, CodecError> {
    Ok(serde_json::to_string(envelope)?)
}

/// Decode a JSON text frame into an envelope.
///
/// # Errors
///
/// Returns [`CodecError::UnknownKind`] when `type` is outside the closed set,
/// and [`CodecError::Json`] for malformed text or a missing `type`.
pub fn decode_envelope(text: &str) -> Result<Envelope, CodecError> {
    let raw: Value = serde_json::from_str(text)?;
    if let Some(kind) = raw.get("type").and_then(Value::as_str) {
        if MessageKind::parse(kind).is_none() {
            return Err(CodecError::UnknownKind(kind.to_owned()));
        }
    }
    Ok(serde_json::from_value(raw)?)
}

/// Current UTC time as an RFC 3339 string.
#[must_use]
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

// =============================================================================
// TYPED PAYLOAD VIEWS
// =============================================================================

/// Payload of the `call_*` kinds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallPayload {
    #[serde(default, alias = "id")]
    pub call_id: String,
    #[serde(default)]
    pub lead_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub duration: Option<u64>,
}

/// Payload of the `lead_*` kinds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPayload {
    #[serde(default, alias = "id")]
    pub lead_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Payload of the `webrtc_*` signaling kinds.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalPayload {
    #[serde(default)]
    pub call_id: Option<String>,
    /// When set, only this user should act on the signal.
    #[serde(default)]
    pub target_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<Value>,
}

#[cfg(test)]
#[path = "envelope_test.rs"]
mod tests;
