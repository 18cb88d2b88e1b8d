//! Delivery service: the publish/subscribe substrate the chat core talks to.
//!
//! The core only needs four things from the network: join a topic, publish
//! bytes to it, receive the next message from it and list who else is on it.
//! [`PubSub`] captures that surface; [`memory`] and [`relay`] provide the
//! in-process and WebSocket-relay implementations.

mod error;
mod identity;
pub mod memory;
pub mod relay;
mod transport;

pub use error::DeliveryServiceError;
pub use identity::{short_id, PeerId, SHORT_ID_LEN};
pub use memory::{MemoryNetwork, MemoryPubSub};
pub use relay::RelayPubSub;
pub use transport::{InboundPacket, PubSub, Subscription, Topic, TopicPublisher};
