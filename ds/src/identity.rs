use std::fmt::Display;

use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};

/// Number of trailing characters kept by [`short_id`].
pub const SHORT_ID_LEN: usize = 8;

const ID_PREFIX: &str = "12D3KooW";
const ID_BODY_LEN: usize = 44;
const BASE58: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Substrate-assigned peer identity. Opaque to the chat core apart from its
/// short form, which is used as an addressing token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh base58 identity shaped like an ed25519 libp2p id.
    pub fn random() -> Self {
        let mut rng = thread_rng();
        let body: String = (0..ID_BODY_LEN)
            .map(|_| BASE58[rng.gen_range(0..BASE58.len())] as char)
            .collect();
        Self(format!("{ID_PREFIX}{body}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last [`SHORT_ID_LEN`] characters of the identity.
    pub fn short(&self) -> &str {
        short_id(&self.0)
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PeerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Short form of a full identity string: its last [`SHORT_ID_LEN`] characters,
/// or the whole string when it is shorter than that.
pub fn short_id(id: &str) -> &str {
    let len = id.chars().count();
    if len <= SHORT_ID_LEN {
        return id;
    }
    match id.char_indices().nth(len - SHORT_ID_LEN) {
        Some((idx, _)) => &id[idx..],
        None => id,
    }
}
