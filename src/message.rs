//! Wire envelope exchanged on room topics.
//!
//! Field names are PascalCase and the payload travels as base64, matching
//! the JSON every other client on a room topic emits.

use ds::{short_id, PeerId};
use serde::{Deserialize, Serialize};

use crate::MessageError;

/// The envelope every peer publishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Human text, or a command line when it starts with `/`.
    #[serde(rename = "Message")]
    pub message: String,
    /// Destination short id; empty means everyone in the room.
    #[serde(rename = "To", default)]
    pub to: String,
    #[serde(rename = "Payload", default, with = "base64_bytes")]
    pub payload: Vec<u8>,
    #[serde(rename = "SenderID", default)]
    pub sender_id: String,
    #[serde(rename = "SenderNick", default)]
    pub sender_nick: String,
}

impl ChatMessage {
    pub fn new(
        message: impl Into<String>,
        to: impl Into<String>,
        payload: Vec<u8>,
        sender_id: &PeerId,
        sender_nick: &str,
    ) -> Self {
        Self {
            message: message.into(),
            to: to.into(),
            payload,
            sender_id: sender_id.to_string(),
            sender_nick: sender_nick.to_string(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        serde_json::to_vec(self).map_err(MessageError::Encode)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, MessageError> {
        serde_json::from_slice(bytes).map_err(MessageError::Decode)
    }

    /// Short form of the sender's identity, used as the reply address.
    pub fn sender(&self) -> &str {
        short_id(&self.sender_id)
    }

    pub fn has_payload(&self) -> bool {
        !self.payload.is_empty()
    }
}

/// Structured payload extracted from a [`ChatMessage`] for the data inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatData {
    pub data: Vec<u8>,
    pub sender_nick: String,
}

impl ChatData {
    /// Payload bytes as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

impl From<&ChatMessage> for ChatData {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            data: msg.payload.clone(),
            sender_nick: msg.sender_nick.clone(),
        }
    }
}

/// Versioned structured payloads carried in [`ChatMessage::payload`].
pub mod payload {
    pub mod v1 {
        use serde::{Deserialize, Serialize};

        use crate::MessageError;

        /// Answer to a `/fetch` request.
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "PascalCase")]
        pub struct FetchPayload {
            pub tag: String,
            pub data: String,
        }

        impl FetchPayload {
            /// Stand-in lookup: the tag is echoed back upper-cased.
            pub fn lookup(addr: &str) -> Self {
                Self {
                    tag: addr.to_string(),
                    data: addr.to_uppercase(),
                }
            }

            pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
                serde_json::to_vec(self).map_err(MessageError::Encode)
            }

            pub fn decode(bytes: &[u8]) -> Result<Self, MessageError> {
                serde_json::from_slice(bytes).map_err(MessageError::Decode)
            }
        }
    }
}

/// Encoded `/fetch` answer for `addr`.
pub fn sample_fetch(addr: &str) -> Result<Vec<u8>, MessageError> {
    payload::v1::FetchPayload::lookup(addr).encode()
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    /// Accepts a base64 string or `null`.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
