//! Wire envelope for client messages.
//!
//! ```json
//! { "fromUserId": "alice", "toUserId": "bob", "...": "passed through" }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{RelayError, RelayResult};

/// A client message as relayed between connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Sender, always stamped by the relay
    #[serde(rename = "fromUserId", default)]
    pub from_user_id: String,

    /// Recipient of a directed send
    #[serde(rename = "toUserId", default, skip_serializing_if = "Option::is_none")]
    pub to_user_id: Option<String>,

    /// Application fields, untouched
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Envelope {
    /// Parse raw inbound text.
    ///
    /// Anything other than a JSON object is rejected.
    pub fn parse(raw: &str) -> RelayResult<Self> {
        if is_blank(raw) {
            return Err(RelayError::EmptyMessage);
        }
        Ok(serde_json::from_str(raw)?)
    }

    /// Overwrite the sender with the relay-known identity.
    pub fn stamp_sender(&mut self, sender_id: &str) {
        self.from_user_id = sender_id.to_owned();
    }

    /// Recipient of a directed send, if one was named.
    pub fn recipient(&self) -> Option<&str> {
        self.to_user_id.as_deref().filter(|id| !is_blank(id))
    }

    /// Serialize back to wire text.
    pub fn to_text(&self) -> RelayResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Empty or whitespace only.
pub fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}
