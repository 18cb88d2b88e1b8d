//! Transport-agnostic topic handles shared by every substrate.
//!
//! A substrate hands out [`Topic`] handles from [`PubSub::join`]. Each handle
//! publishes through a [`TopicPublisher`] and fans inbound packets out to any
//! number of [`Subscription`]s over a `tokio::sync::broadcast` channel.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{DeliveryServiceError, PeerId};

/// A message received from a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPacket {
    pub payload: Vec<u8>,
    pub topic: String,
    /// Identity of the peer that published the packet.
    pub from: PeerId,
    /// Receive time, milliseconds since the unix epoch.
    pub timestamp: i64,
}

impl InboundPacket {
    pub fn new(payload: Vec<u8>, topic: &str, from: PeerId) -> Self {
        Self {
            payload,
            topic: topic.to_string(),
            from,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Outbound half of a substrate: push bytes onto a named topic.
#[async_trait]
pub trait TopicPublisher: Send + Sync + 'static {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), DeliveryServiceError>;
}

/// The network surface the chat core depends on.
#[async_trait]
pub trait PubSub: Send + Sync + 'static {
    fn local_peer_id(&self) -> &PeerId;

    /// Join `topic` and return a handle to it. Joining the same topic again
    /// returns another handle sharing the same inbound stream.
    async fn join(&self, topic: &str) -> Result<Topic, DeliveryServiceError>;

    /// Stop being a member of `topic`. Other peers no longer list us there.
    /// Outstanding handles are left to their owner to close.
    async fn leave(&self, topic: &str) -> Result<(), DeliveryServiceError>;

    /// Become a member of `topic` again after [`PubSub::leave`], keeping the
    /// handles already returned by [`PubSub::join`].
    async fn rejoin(&self, topic: &str) -> Result<(), DeliveryServiceError>;

    /// Peers currently known to be on `topic`, excluding the local peer.
    async fn list_peers(&self, topic: &str) -> Vec<PeerId>;

    /// Establish a connection to a peer address. Used by peer discovery.
    async fn connect(&self, peer_address: &str) -> Result<(), DeliveryServiceError>;
}

/// Handle to a joined topic. Cheap to clone.
#[derive(Clone)]
pub struct Topic {
    name: String,
    publisher: Arc<dyn TopicPublisher>,
    inbound: broadcast::Sender<InboundPacket>,
    closed: CancellationToken,
}

impl Topic {
    /// Build a handle. `closed` is cancelled by the substrate when the topic
    /// can no longer deliver, which ends every subscription derived from it.
    pub fn new(
        name: &str,
        publisher: Arc<dyn TopicPublisher>,
        inbound: broadcast::Sender<InboundPacket>,
        closed: CancellationToken,
    ) -> Self {
        Self {
            name: name.to_string(),
            publisher,
            inbound,
            closed,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Publish `payload` and return the id assigned to the message.
    pub async fn publish(&self, payload: Vec<u8>) -> Result<String, DeliveryServiceError> {
        if self.is_closed() {
            return Err(DeliveryServiceError::PublishError(format!(
                "topic {} is closed",
                self.name
            )));
        }
        let id = Uuid::new_v4().to_string();
        self.publisher.publish(&self.name, payload).await?;
        debug!("Published message {id} on {}", self.name);
        Ok(id)
    }

    /// Start receiving packets published on this topic from now on.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            topic: self.name.clone(),
            rx: self.inbound.subscribe(),
            closed: self.closed.child_token(),
        }
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Ordered stream of packets from one topic.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    rx: broadcast::Receiver<InboundPacket>,
    closed: CancellationToken,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next packet. Fails with
    /// [`DeliveryServiceError::SubscriptionClosed`] once the subscription is
    /// cancelled or the topic goes away; packets dropped because this reader
    /// fell behind are skipped with a warning.
    pub async fn next(&mut self) -> Result<InboundPacket, DeliveryServiceError> {
        loop {
            tokio::select! {
                biased;
                _ = self.closed.cancelled() => {
                    return Err(DeliveryServiceError::SubscriptionClosed(self.topic.clone()));
                }
                res = self.rx.recv() => match res {
                    Ok(packet) => return Ok(packet),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Subscription to {} lagged, {skipped} packets lost", self.topic);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(DeliveryServiceError::SubscriptionClosed(self.topic.clone()));
                    }
                },
            }
        }
    }

    /// Token that ends this subscription when cancelled. Lets the owner stop
    /// a reader that has moved the subscription into its own task.
    pub fn closer(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}
