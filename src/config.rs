use std::{path::Path, time::Duration};

use ds::PeerId;
use serde::{Deserialize, Serialize};

use crate::{
    command::COMMAND_SIGIL, discovery::DiscoverySettings, identity::default_nick,
    room::RoomSettings, room::CHAT_ROOM_BUF_SIZE, ConfigError,
};

pub const DEFAULT_ROOM: &str = "akumuji";
pub const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:8919";

/// Chat client configuration, loadable from TOML. Missing keys fall back to
/// their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Empty means `$USER-<short id>`.
    pub nick: String,
    pub room: String,
    pub debug: bool,
    /// Colour sender nicks on the terminal.
    pub color: bool,
    pub inbox_capacity: usize,
    pub discovery_interval_secs: u64,
    pub bootstrap_peers: Vec<String>,
    pub relay_url: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            nick: String::new(),
            room: DEFAULT_ROOM.to_string(),
            debug: false,
            color: true,
            inbox_capacity: CHAT_ROOM_BUF_SIZE,
            discovery_interval_secs: 5,
            bootstrap_peers: Vec::new(),
            relay_url: None,
        }
    }
}

impl ChatConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject settings that cannot be used for a session. A nick starting with
    /// the command sigil would turn every `/iam` answer into a command.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nick.trim_start().starts_with(COMMAND_SIGIL) {
            return Err(ConfigError::InvalidNick(self.nick.clone()));
        }
        Ok(())
    }

    pub fn nick_for(&self, peer: &PeerId) -> String {
        if self.nick.is_empty() {
            default_nick(peer)
        } else {
            self.nick.clone()
        }
    }

    pub fn relay_url(&self) -> &str {
        self.relay_url.as_deref().unwrap_or(DEFAULT_RELAY_URL)
    }

    pub fn discovery(&self) -> DiscoverySettings {
        DiscoverySettings {
            interval: Duration::from_secs(self.discovery_interval_secs.max(1)),
            bootstrap_peers: self.bootstrap_peers.clone(),
        }
    }

    pub fn room_settings(&self, peer: &PeerId) -> RoomSettings {
        RoomSettings {
            nick: self.nick_for(peer),
            home: self.room.clone(),
            inbox_capacity: self.inbox_capacity.max(1),
            discovery: self.discovery(),
        }
    }
}
