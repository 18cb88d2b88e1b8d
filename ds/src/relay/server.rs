use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{mpsc, Mutex},
};
use tokio_tungstenite::{accept_async, tungstenite::protocol::Message};
use tokio_util::sync::CancellationToken;

use crate::{relay::RelayFrame, DeliveryServiceError, PeerId};

type Tx = mpsc::UnboundedSender<Message>;

#[derive(Default)]
struct RelayState {
    peers: HashMap<PeerId, Tx>,
    topics: HashMap<String, BTreeSet<PeerId>>,
}

type SharedState = Arc<Mutex<RelayState>>;

impl RelayState {
    fn send(&self, peer: &PeerId, frame: &RelayFrame) {
        let Some(tx) = self.peers.get(peer) else {
            return;
        };
        match frame.to_json() {
            Ok(json) => {
                if tx.send(Message::Text(json)).is_err() {
                    debug!("Writer for {peer} is gone");
                }
            }
            Err(e) => error!("Failed to encode relay frame: {e}"),
        }
    }

    fn deliver(&self, topic: &str, from: &PeerId, data: Vec<u8>) {
        let Some(members) = self.topics.get(topic) else {
            debug!("Publish on {topic} with no members");
            return;
        };
        let frame = RelayFrame::Deliver {
            topic: topic.to_string(),
            from: from.clone(),
            data,
        };
        for member in members {
            self.send(member, &frame);
        }
    }

    fn announce_members(&self, topic: &str) {
        let Some(members) = self.topics.get(topic) else {
            return;
        };
        let frame = RelayFrame::Members {
            topic: topic.to_string(),
            peers: members.iter().cloned().collect(),
        };
        for member in members {
            self.send(member, &frame);
        }
    }

    /// Returns whether `peer` was a member of `topic`.
    fn leave_topic(&mut self, topic: &str, peer: &PeerId) -> bool {
        let Some(members) = self.topics.get_mut(topic) else {
            return false;
        };
        let was_member = members.remove(peer);
        if members.is_empty() {
            self.topics.remove(topic);
        }
        was_member
    }

    fn remove_peer(&mut self, peer: &PeerId) -> Vec<String> {
        self.peers.remove(peer);
        let left: Vec<String> = self
            .topics
            .iter_mut()
            .filter_map(|(topic, members)| members.remove(peer).then(|| topic.clone()))
            .collect();
        self.topics.retain(|_, members| !members.is_empty());
        left
    }
}

/// Run the relay on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    shutdown: CancellationToken,
) -> Result<(), DeliveryServiceError> {
    info!("Relay listening on {}", listener.local_addr()?);
    let state = SharedState::default();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Relay shutting down");
                break;
            }
            accepted = listener.accept() => {
                let (stream, addr) = accepted?;
                let state = state.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(state, stream).await {
                        warn!("Relay connection {addr} ended with error: {e}");
                    }
                });
            }
        }
    }

    Ok(())
}

async fn handle_connection(state: SharedState, stream: TcpStream) -> Result<(), DeliveryServiceError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| DeliveryServiceError::ConnectError(e.to_string()))?;
    let (mut write, mut read) = ws_stream.split();
    let (sender, mut receiver) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(message) = receiver.recv().await {
            if let Err(e) = write.send(message).await {
                debug!("Error sending relay frame: {e}");
                break;
            }
        }
    });

    let mut peer: Option<PeerId> = None;
    while let Some(message) = read.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("Relay read error: {e}");
                break;
            }
        };
        let frame = match RelayFrame::from_json(&text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping malformed relay frame: {e}");
                continue;
            }
        };

        match frame {
            RelayFrame::Hello { peer: id } if peer.is_none() => {
                state.lock().await.peers.insert(id.clone(), sender.clone());
                info!("{id} connected");
                peer = Some(id);
            }
            RelayFrame::Join { topic } => {
                let Some(id) = &peer else {
                    debug!("Join before hello, ignored");
                    continue;
                };
                let mut st = state.lock().await;
                st.topics.entry(topic.clone()).or_default().insert(id.clone());
                debug!("{id} joined {topic}");
                st.announce_members(&topic);
            }
            RelayFrame::Leave { topic } => {
                let Some(id) = &peer else {
                    debug!("Leave before hello, ignored");
                    continue;
                };
                let mut st = state.lock().await;
                if st.leave_topic(&topic, id) {
                    debug!("{id} left {topic}");
                    st.announce_members(&topic);
                }
            }
            RelayFrame::Publish { topic, data } => {
                let Some(id) = &peer else {
                    debug!("Publish before hello, ignored");
                    continue;
                };
                state.lock().await.deliver(&topic, id, data);
            }
            frame => debug!("Ignoring unexpected relay frame {frame:?}"),
        }
    }

    if let Some(id) = peer {
        let mut st = state.lock().await;
        for topic in st.remove_peer(&id) {
            st.announce_members(&topic);
        }
        info!("{id} disconnected");
    }
    writer.abort();
    Ok(())
}
