use serde::{Deserialize, Serialize};

use crate::PeerId;

/// Wire frames exchanged between a peer and the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelayFrame {
    /// First frame a peer sends: who it is.
    Hello { peer: PeerId },
    Join { topic: String },
    Leave { topic: String },
    Publish {
        topic: String,
        #[serde(with = "base64_data")]
        data: Vec<u8>,
    },
    /// Relay to peer: a message published on a topic the peer joined.
    Deliver {
        topic: String,
        from: PeerId,
        #[serde(with = "base64_data")]
        data: Vec<u8>,
    },
    /// Relay to peer: current membership of a topic.
    Members { topic: String, peers: Vec<PeerId> },
}

impl RelayFrame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

mod base64_data {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_are_tagged_by_type() {
        let frame = RelayFrame::Join {
            topic: "chat-room:akumuji".to_string(),
        };
        assert_eq!(
            frame.to_json().unwrap(),
            r#"{"type":"Join","topic":"chat-room:akumuji"}"#
        );
    }

    #[test]
    fn test_data_travels_as_base64() {
        let frame = RelayFrame::Deliver {
            topic: "t".to_string(),
            from: PeerId::from("alice"),
            data: b"hello bob".to_vec(),
        };
        let json = frame.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"type":"Deliver","topic":"t","from":"alice","data":"aGVsbG8gYm9i"}"#
        );
        assert_eq!(RelayFrame::from_json(&json).unwrap(), frame);
    }

    #[test]
    fn test_numeric_data_is_rejected() {
        assert!(
            RelayFrame::from_json(r#"{"type":"Publish","topic":"t","data":[104,105]}"#).is_err()
        );
    }

    #[test]
    fn test_unknown_frame_type_is_rejected() {
        assert!(RelayFrame::from_json(r#"{"type":"Shout","topic":"x"}"#).is_err());
    }
}
