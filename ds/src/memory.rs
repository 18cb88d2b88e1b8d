//! In-process substrate.
//!
//! A [`MemoryNetwork`] is a shared hub: every [`MemoryPubSub`] created from it
//! sees the same topics. A publish is delivered to every subscriber of the
//! topic, the publisher included, so self-filtering stays the reader's job
//! exactly as on a real gossip network.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use log::{debug, info};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

use crate::{DeliveryServiceError, InboundPacket, PeerId, PubSub, Topic, TopicPublisher};

/// Per-topic broadcast buffer.
pub const MEMORY_TOPIC_CAPACITY: usize = 256;

struct TopicState {
    inbound: broadcast::Sender<InboundPacket>,
    members: BTreeSet<PeerId>,
    joins: usize,
    closed: CancellationToken,
}

impl TopicState {
    fn new() -> Self {
        let (inbound, _) = broadcast::channel(MEMORY_TOPIC_CAPACITY);
        Self {
            inbound,
            members: BTreeSet::new(),
            joins: 0,
            closed: CancellationToken::new(),
        }
    }
}

#[derive(Default)]
struct NetworkState {
    topics: HashMap<String, TopicState>,
    peers: HashSet<PeerId>,
}

/// Shared in-memory hub.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    inner: Arc<RwLock<NetworkState>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new peer with a random identity.
    pub async fn peer(&self) -> MemoryPubSub {
        self.peer_with_id(PeerId::random()).await
    }

    pub async fn peer_with_id(&self, id: PeerId) -> MemoryPubSub {
        self.inner.write().await.peers.insert(id.clone());
        debug!("Peer {id} attached to memory network");
        MemoryPubSub {
            network: self.clone(),
            id,
        }
    }

    /// How many times any peer has joined `topic`.
    pub async fn join_count(&self, topic: &str) -> usize {
        self.inner
            .read()
            .await
            .topics
            .get(topic)
            .map(|t| t.joins)
            .unwrap_or(0)
    }

    /// Tear `topic` down. Every outstanding subscription ends and every
    /// handle refuses further publishes.
    pub async fn close_topic(&self, topic: &str) {
        if let Some(state) = self.inner.write().await.topics.remove(topic) {
            state.closed.cancel();
            info!("Memory topic {topic} closed");
        }
    }
}

/// One peer's view of a [`MemoryNetwork`].
#[derive(Clone)]
pub struct MemoryPubSub {
    network: MemoryNetwork,
    id: PeerId,
}

struct MemoryPublisher {
    network: MemoryNetwork,
    from: PeerId,
}

#[async_trait]
impl TopicPublisher for MemoryPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), DeliveryServiceError> {
        let state = self.network.inner.read().await;
        let topic_state = state
            .topics
            .get(topic)
            .ok_or_else(|| DeliveryServiceError::PublishError(format!("no such topic {topic}")))?;
        let packet = InboundPacket::new(payload, topic, self.from.clone());
        if topic_state.inbound.send(packet).is_err() {
            debug!("No subscribers on {topic}, message dropped");
        }
        Ok(())
    }
}

#[async_trait]
impl PubSub for MemoryPubSub {
    fn local_peer_id(&self) -> &PeerId {
        &self.id
    }

    async fn join(&self, topic: &str) -> Result<Topic, DeliveryServiceError> {
        let mut state = self.network.inner.write().await;
        let topic_state = state
            .topics
            .entry(topic.to_string())
            .or_insert_with(TopicState::new);
        topic_state.members.insert(self.id.clone());
        topic_state.joins += 1;
        debug!("{} joined {topic}", self.id);

        let publisher = Arc::new(MemoryPublisher {
            network: self.network.clone(),
            from: self.id.clone(),
        });
        Ok(Topic::new(
            topic,
            publisher,
            topic_state.inbound.clone(),
            topic_state.closed.clone(),
        ))
    }

    async fn leave(&self, topic: &str) -> Result<(), DeliveryServiceError> {
        let mut state = self.network.inner.write().await;
        if let Some(topic_state) = state.topics.get_mut(topic) {
            if topic_state.members.remove(&self.id) {
                debug!("{} left {topic}", self.id);
            }
        }
        Ok(())
    }

    async fn rejoin(&self, topic: &str) -> Result<(), DeliveryServiceError> {
        let mut state = self.network.inner.write().await;
        let topic_state = state.topics.get_mut(topic).ok_or_else(|| {
            DeliveryServiceError::SubscribeError(format!("no such topic {topic}"))
        })?;
        topic_state.members.insert(self.id.clone());
        debug!("{} is back in {topic}", self.id);
        Ok(())
    }

    async fn list_peers(&self, topic: &str) -> Vec<PeerId> {
        let state = self.network.inner.read().await;
        state
            .topics
            .get(topic)
            .map(|t| t.members.iter().filter(|p| **p != self.id).cloned().collect())
            .unwrap_or_default()
    }

    async fn connect(&self, peer_address: &str) -> Result<(), DeliveryServiceError> {
        let peer = PeerId::from(peer_address);
        if self.network.inner.read().await.peers.contains(&peer) {
            Ok(())
        } else {
            Err(DeliveryServiceError::ConnectError(format!(
                "unknown peer {peer_address}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber_including_self() {
        let network = MemoryNetwork::new();
        let alice = network.peer().await;
        let bob = network.peer().await;

        let a_topic = alice.join("room").await.unwrap();
        let b_topic = bob.join("room").await.unwrap();
        let mut a_sub = a_topic.subscribe();
        let mut b_sub = b_topic.subscribe();

        a_topic.publish(b"hello".to_vec()).await.unwrap();

        let at_bob = b_sub.next().await.unwrap();
        assert_eq!(at_bob.payload, b"hello");
        assert_eq!(&at_bob.from, alice.local_peer_id());
        let at_alice = a_sub.next().await.unwrap();
        assert_eq!(&at_alice.from, alice.local_peer_id());
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let network = MemoryNetwork::new();
        let alice = network.peer().await;
        let bob = network.peer().await;

        let a_topic = alice.join("one").await.unwrap();
        let b_topic = bob.join("two").await.unwrap();
        let mut b_sub = b_topic.subscribe();

        a_topic.publish(b"x".to_vec()).await.unwrap();
        b_topic.publish(b"y".to_vec()).await.unwrap();

        assert_eq!(b_sub.next().await.unwrap().payload, b"y");
    }

    #[tokio::test]
    async fn test_list_peers_excludes_self() {
        let network = MemoryNetwork::new();
        let alice = network.peer().await;
        let bob = network.peer().await;
        let carol = network.peer().await;
        alice.join("room").await.unwrap();
        bob.join("room").await.unwrap();
        carol.join("elsewhere").await.unwrap();

        assert_eq!(alice.list_peers("room").await, vec![bob.local_peer_id().clone()]);
        assert!(alice.list_peers("missing").await.is_empty());
    }

    #[tokio::test]
    async fn test_leave_and_rejoin_only_touch_membership() {
        let network = MemoryNetwork::new();
        let alice = network.peer().await;
        let bob = network.peer().await;
        alice.join("room").await.unwrap();
        bob.join("room").await.unwrap();

        bob.leave("room").await.unwrap();
        bob.leave("missing").await.unwrap();

        assert!(alice.list_peers("room").await.is_empty());
        assert_eq!(network.join_count("room").await, 2);

        bob.rejoin("room").await.unwrap();
        assert_eq!(alice.list_peers("room").await, vec![bob.local_peer_id().clone()]);
        assert_eq!(network.join_count("room").await, 2);
        assert!(matches!(
            bob.rejoin("missing").await,
            Err(DeliveryServiceError::SubscribeError(_))
        ));
    }

    #[tokio::test]
    async fn test_join_count_tracks_every_join() {
        let network = MemoryNetwork::new();
        let alice = network.peer().await;
        alice.join("room").await.unwrap();
        alice.join("room").await.unwrap();

        assert_eq!(network.join_count("room").await, 2);
        assert_eq!(network.join_count("other").await, 0);
    }

    #[tokio::test]
    async fn test_connect_only_to_known_peers() {
        let network = MemoryNetwork::new();
        let alice = network.peer().await;
        let bob = network.peer().await;

        assert!(alice.connect(bob.local_peer_id().as_str()).await.is_ok());
        assert!(matches!(
            alice.connect("nobody").await,
            Err(DeliveryServiceError::ConnectError(_))
        ));
    }

    #[tokio::test]
    async fn test_close_topic_ends_subscriptions() {
        let network = MemoryNetwork::new();
        let alice = network.peer().await;
        let topic = alice.join("room").await.unwrap();
        let mut sub = topic.subscribe();

        network.close_topic("room").await;

        assert!(matches!(
            sub.next().await,
            Err(DeliveryServiceError::SubscriptionClosed(_))
        ));
        assert!(topic.publish(b"late".to_vec()).await.is_err());
    }
}
