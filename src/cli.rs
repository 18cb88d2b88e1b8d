use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ChatConfig;

#[derive(Parser, Debug)]
#[command(version, about = "Group chat rooms over a pubsub relay", long_about = None)]
pub struct Args {
    /// Verbose logging
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub chat: ChatArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(clap::Args, Debug, Default)]
pub struct ChatArgs {
    /// Nickname shown to others
    #[arg(long)]
    pub nick: Option<String>,

    /// Room to join at startup
    #[arg(long)]
    pub room: Option<String>,

    /// Relay websocket url
    #[arg(short = 'r', long)]
    pub relay: Option<String>,

    /// Peer ids to dial before discovery starts
    #[arg(long = "bootstrap")]
    pub bootstrap: Vec<String>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run a relay that peers connect through
    Relay {
        #[arg(short = 'l', long, default_value_t = ds::relay::DEFAULT_RELAY_PORT)]
        listen: u16,
    },
}

impl Args {
    /// Layer command line flags over `config`.
    pub fn apply(&self, config: &mut ChatConfig) {
        if self.debug {
            config.debug = true;
        }
        if let Some(nick) = &self.chat.nick {
            config.nick = nick.clone();
        }
        if let Some(room) = &self.chat.room {
            config.room = room.clone();
        }
        if let Some(relay) = &self.chat.relay {
            config.relay_url = Some(relay.clone());
        }
        if !self.chat.bootstrap.is_empty() {
            config.bootstrap_peers = self.chat.bootstrap.clone();
        }
    }
}
