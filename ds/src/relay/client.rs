use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use futures_util::{SinkExt, Stream, StreamExt};
use log::{debug, info, warn};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, protocol::Message},
};
use tokio_util::sync::CancellationToken;

use crate::{
    relay::RelayFrame, DeliveryServiceError, InboundPacket, PeerId, PubSub, Topic, TopicPublisher,
};

const TOPIC_CAPACITY: usize = 256;

struct RelayTopic {
    inbound: broadcast::Sender<InboundPacket>,
    members: Vec<PeerId>,
}

type TopicMap = Arc<RwLock<HashMap<String, RelayTopic>>>;

/// Peer side of the relay substrate.
pub struct RelayPubSub {
    id: PeerId,
    outbound: mpsc::UnboundedSender<Message>,
    topics: TopicMap,
    closed: CancellationToken,
}

impl RelayPubSub {
    /// Connect to the relay at `url` (e.g. `ws://127.0.0.1:8919`) as `id`.
    pub async fn connect(url: &str, id: PeerId) -> Result<Self, DeliveryServiceError> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| DeliveryServiceError::ConnectError(format!("{url}: {e}")))?;
        info!("Connected to relay at {url} as {id}");
        let (mut write, read) = ws_stream.split();
        let (outbound, mut receiver) = mpsc::unbounded_channel::<Message>();
        let closed = CancellationToken::new();
        let topics = TopicMap::default();

        let writer_closed = closed.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_closed.cancelled() => break,
                    message = receiver.recv() => match message {
                        Some(message) => {
                            if let Err(e) = write.send(message).await {
                                warn!("Error sending to relay: {e}");
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            let _ = write.close().await;
            writer_closed.cancel();
        });

        tokio::spawn(pump_inbound(read, topics.clone(), closed.clone()));

        let client = Self {
            id,
            outbound,
            topics,
            closed,
        };
        client.send_frame(&RelayFrame::Hello {
            peer: client.id.clone(),
        })?;
        Ok(client)
    }

    fn send_frame(&self, frame: &RelayFrame) -> Result<(), DeliveryServiceError> {
        send_frame(&self.outbound, frame)
    }

    /// Drop the relay connection. Every topic handle and subscription closes.
    pub fn shutdown(&self) {
        self.closed.cancel();
    }

    pub fn is_connected(&self) -> bool {
        !self.closed.is_cancelled()
    }
}

impl Drop for RelayPubSub {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

fn send_frame(
    outbound: &mpsc::UnboundedSender<Message>,
    frame: &RelayFrame,
) -> Result<(), DeliveryServiceError> {
    let json = frame
        .to_json()
        .map_err(|e| DeliveryServiceError::Other(e.into()))?;
    outbound
        .send(Message::Text(json))
        .map_err(|_| DeliveryServiceError::PublishError("relay connection closed".to_string()))
}

async fn pump_inbound<S>(mut read: S, topics: TopicMap, closed: CancellationToken)
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let message = tokio::select! {
            _ = closed.cancelled() => break,
            message = read.next() => message,
        };
        let text = match message {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!("Relay read error: {e}");
                break;
            }
        };
        match RelayFrame::from_json(&text) {
            Ok(RelayFrame::Deliver { topic, from, data }) => {
                if let Some(t) = topics.read().await.get(&topic) {
                    if t.inbound.send(InboundPacket::new(data, &topic, from)).is_err() {
                        debug!("No local subscribers on {topic}");
                    }
                }
            }
            Ok(RelayFrame::Members { topic, peers }) => {
                if let Some(t) = topics.write().await.get_mut(&topic) {
                    t.members = peers;
                }
            }
            Ok(frame) => debug!("Ignoring unexpected relay frame {frame:?}"),
            Err(e) => warn!("Dropping malformed relay frame: {e}"),
        }
    }
    info!("Relay connection closed");
    closed.cancel();
}

struct RelayPublisher {
    outbound: mpsc::UnboundedSender<Message>,
}

#[async_trait]
impl TopicPublisher for RelayPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), DeliveryServiceError> {
        send_frame(
            &self.outbound,
            &RelayFrame::Publish {
                topic: topic.to_string(),
                data: payload,
            },
        )
    }
}

#[async_trait]
impl PubSub for RelayPubSub {
    fn local_peer_id(&self) -> &PeerId {
        &self.id
    }

    async fn join(&self, topic: &str) -> Result<Topic, DeliveryServiceError> {
        if !self.is_connected() {
            return Err(DeliveryServiceError::SubscribeError(format!(
                "relay connection closed, cannot join {topic}"
            )));
        }
        let inbound = {
            let mut topics = self.topics.write().await;
            let entry = topics
                .entry(topic.to_string())
                .or_insert_with(|| RelayTopic {
                    inbound: broadcast::channel(TOPIC_CAPACITY).0,
                    members: Vec::new(),
                });
            entry.inbound.clone()
        };
        self.send_frame(&RelayFrame::Join {
            topic: topic.to_string(),
        })
        .map_err(|e| DeliveryServiceError::SubscribeError(e.to_string()))?;

        let publisher = Arc::new(RelayPublisher {
            outbound: self.outbound.clone(),
        });
        Ok(Topic::new(
            topic,
            publisher,
            inbound,
            self.closed.child_token(),
        ))
    }

    async fn leave(&self, topic: &str) -> Result<(), DeliveryServiceError> {
        if let Some(t) = self.topics.write().await.get_mut(topic) {
            t.members.clear();
        }
        if !self.is_connected() {
            debug!("Relay connection closed, {topic} already left");
            return Ok(());
        }
        self.send_frame(&RelayFrame::Leave {
            topic: topic.to_string(),
        })
    }

    async fn rejoin(&self, topic: &str) -> Result<(), DeliveryServiceError> {
        if !self.topics.read().await.contains_key(topic) {
            return Err(DeliveryServiceError::SubscribeError(format!(
                "{topic} was never joined"
            )));
        }
        self.send_frame(&RelayFrame::Join {
            topic: topic.to_string(),
        })
        .map_err(|e| DeliveryServiceError::SubscribeError(e.to_string()))
    }

    async fn list_peers(&self, topic: &str) -> Vec<PeerId> {
        self.topics
            .read()
            .await
            .get(topic)
            .map(|t| t.members.iter().filter(|p| **p != self.id).cloned().collect())
            .unwrap_or_default()
    }

    async fn connect(&self, peer_address: &str) -> Result<(), DeliveryServiceError> {
        let peer = PeerId::from(peer_address);
        let known = self
            .topics
            .read()
            .await
            .values()
            .any(|t| t.members.contains(&peer));
        if known {
            Ok(())
        } else {
            Err(DeliveryServiceError::ConnectError(format!(
                "{peer_address} is not reachable through the relay"
            )))
        }
    }
}
