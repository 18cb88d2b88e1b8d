//! WebSocket relay substrate.
//!
//! A single relay process fans topic traffic out to connected peers. Peers
//! speak [`RelayFrame`] JSON over a WebSocket; [`serve`] runs the hub and
//! [`RelayPubSub`] is the peer side implementing [`crate::PubSub`].

mod client;
mod frame;
mod server;

pub use client::RelayPubSub;
pub use frame::RelayFrame;
pub use server::serve;

/// Port the relay listens on unless told otherwise.
pub const DEFAULT_RELAY_PORT: u16 = 8919;
