//! Chat rooms over a publish/subscribe substrate.
//!
//! Every participant is an equal peer. Messages are JSON envelopes
//! ([`message::ChatMessage`]) published to a room topic; lines starting with
//! `/` are commands, some of which remote peers may trigger and answer with a
//! reply addressed back to the sender.

pub mod cli;
pub mod command;
pub mod config;
pub mod console;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod help;
pub mod identity;
pub mod message;
pub mod presentation;
pub mod read_loop;
pub mod room;
pub mod session;

pub use error::{ChatError, CommandError, ConfigError, MessageError, RoomError};
