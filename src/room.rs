//! Room session: the active room, its read loop and the home-room cache.

use std::sync::Arc;

use ds::{PeerId, PubSub, Topic};
use log::{debug, info, warn};
use tokio::{
    sync::{mpsc, RwLock},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    discovery::{self, DiscoverySettings},
    message::{ChatData, ChatMessage},
    read_loop::{ReadLoop, ReadLoopState},
    RoomError,
};

pub const TOPIC_PREFIX: &str = "chat-room:";
/// Capacity of each inbox.
pub const CHAT_ROOM_BUF_SIZE: usize = 128;

/// Topic name for a room.
pub fn topic_name(room: &str) -> String {
    format!("{TOPIC_PREFIX}{room}")
}

/// Receiving ends of one room's inboxes, handed to the presentation sink.
#[derive(Debug)]
pub struct Inboxes {
    pub room: String,
    pub messages: mpsc::Receiver<ChatMessage>,
    pub data: mpsc::Receiver<ChatData>,
}

pub(crate) struct InboxSenders {
    pub(crate) messages: mpsc::Sender<ChatMessage>,
    pub(crate) data: mpsc::Sender<ChatData>,
}

fn inbox_pair(room: &str, capacity: usize) -> (InboxSenders, Inboxes) {
    let (msg_tx, msg_rx) = mpsc::channel(capacity);
    let (data_tx, data_rx) = mpsc::channel(capacity);
    (
        InboxSenders {
            messages: msg_tx,
            data: data_tx,
        },
        Inboxes {
            room: room.to_string(),
            messages: msg_rx,
            data: data_rx,
        },
    )
}

/// New inboxes are announced here every time the active room changes.
pub type InboxFeed = mpsc::UnboundedReceiver<Inboxes>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSettings {
    pub nick: String,
    /// Room joined at startup and returned to by `/home`.
    pub home: String,
    pub inbox_capacity: usize,
    pub discovery: DiscoverySettings,
}

struct ActiveRoom {
    name: String,
    topic: Topic,
    subscription: CancellationToken,
    discovery: CancellationToken,
    read_loop: JoinHandle<ReadLoopState>,
}

impl ActiveRoom {
    /// The topic is open and the reader is still pulling from it.
    fn is_live(&self) -> bool {
        !self.topic.is_closed() && !self.read_loop.is_finished()
    }

    fn leave(self) -> JoinHandle<ReadLoopState> {
        self.subscription.cancel();
        self.discovery.cancel();
        self.read_loop
    }
}

#[derive(Default)]
struct RoomState {
    active: Option<ActiveRoom>,
    home_topic: Option<Topic>,
    generation: u64,
}

struct RoomInner<P> {
    pubsub: Arc<P>,
    self_id: PeerId,
    settings: RoomSettings,
    state: RwLock<RoomState>,
    quit: CancellationToken,
    feed: mpsc::UnboundedSender<Inboxes>,
}

/// Handle to the chat session. Cheap to clone.
pub struct ChatRoom<P: PubSub> {
    inner: Arc<RoomInner<P>>,
}

impl<P: PubSub> Clone for ChatRoom<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: PubSub> ChatRoom<P> {
    /// Create a session that has not joined any room yet. The returned feed
    /// yields the inboxes of every room joined from now on.
    pub fn new(pubsub: Arc<P>, settings: RoomSettings) -> (Self, InboxFeed) {
        let (feed, feed_rx) = mpsc::unbounded_channel();
        let self_id = pubsub.local_peer_id().clone();
        let room = Self {
            inner: Arc::new(RoomInner {
                pubsub,
                self_id,
                settings,
                state: RwLock::new(RoomState::default()),
                quit: CancellationToken::new(),
                feed,
            }),
        };
        (room, feed_rx)
    }

    pub fn self_id(&self) -> &PeerId {
        &self.inner.self_id
    }

    pub fn short_id(&self) -> &str {
        self.inner.self_id.short()
    }

    pub fn nick(&self) -> &str {
        &self.inner.settings.nick
    }

    pub fn home(&self) -> &str {
        &self.inner.settings.home
    }

    pub async fn current_room(&self) -> Option<String> {
        self.inner
            .state
            .read()
            .await
            .active
            .as_ref()
            .map(|a| a.name.clone())
    }

    /// Number of room switches performed so far.
    pub async fn generation(&self) -> u64 {
        self.inner.state.read().await.generation
    }

    /// Switch to `room`.
    ///
    /// Joining the room we are already in does nothing while its topic is
    /// still open. Joining the home room reuses the topic handle obtained the
    /// first time instead of joining the substrate again, unless that handle
    /// has been closed; only its membership is restored. On a switch the
    /// previous room's reader and discovery are stopped, its membership is
    /// dropped and fresh inboxes are sent down the feed.
    pub async fn join(&self, room: &str) -> Result<(), RoomError> {
        let mut state = self.inner.state.write().await;
        if state.active.as_ref().is_some_and(|a| a.name == room && a.is_live()) {
            debug!("Already in {room}");
            return Ok(());
        }
        if state.home_topic.as_ref().is_some_and(Topic::is_closed) {
            warn!("Home topic {} was closed, joining it again", topic_name(self.home()));
            state.home_topic = None;
        }

        let is_home = room == self.home();
        let topic = match (&state.home_topic, is_home) {
            (Some(home), true) => {
                info!("Back home in {room}");
                self.inner
                    .pubsub
                    .rejoin(home.name())
                    .await
                    .map_err(RoomError::Subscription)?;
                home.clone()
            }
            _ => self
                .inner
                .pubsub
                .join(&topic_name(room))
                .await
                .map_err(RoomError::Subscription)?,
        };
        if is_home && state.home_topic.is_none() {
            state.home_topic = Some(topic.clone());
        }

        if let Some(previous) = state.active.take() {
            debug!("Leaving {}", previous.name);
            let left = previous.topic.clone();
            // the reader notices its closed subscription and exits on its own
            drop(previous.leave());
            if left.name() != topic.name() {
                self.leave_topic(&left).await;
            }
        }

        let subscription = topic.subscribe();
        let subscription_closer = subscription.closer();
        let (senders, inboxes) = inbox_pair(room, self.inner.settings.inbox_capacity);
        let reader = ReadLoop::new(
            topic.clone(),
            subscription,
            self.inner.self_id.clone(),
            self.nick().to_string(),
            senders,
        );
        let read_loop = tokio::spawn(reader.run());

        let discovery = CancellationToken::new();
        discovery::spawn(
            self.inner.pubsub.clone(),
            topic.name().to_string(),
            self.inner.settings.discovery.clone(),
            discovery.clone(),
        );

        state.active = Some(ActiveRoom {
            name: room.to_string(),
            topic,
            subscription: subscription_closer,
            discovery,
            read_loop,
        });
        state.generation += 1;
        info!("Joined {room} as {}", self.nick());

        if self.inner.feed.send(inboxes).is_err() {
            debug!("Nobody is listening for the inboxes of {room}");
        }
        Ok(())
    }

    /// Publish a message in the active room and return its id.
    pub async fn publish(&self, text: &str, to: &str, payload: Vec<u8>) -> Result<String, RoomError> {
        let topic = {
            let state = self.inner.state.read().await;
            state
                .active
                .as_ref()
                .map(|a| a.topic.clone())
                .ok_or(RoomError::NotJoined)?
        };
        let msg = ChatMessage::new(text, to, payload, &self.inner.self_id, self.nick());
        topic.publish(msg.encode()?).await.map_err(RoomError::Publish)
    }

    /// Other peers currently in the active room.
    pub async fn list_members(&self) -> Vec<PeerId> {
        let Some(room) = self.current_room().await else {
            return Vec::new();
        };
        self.inner.pubsub.list_peers(&topic_name(&room)).await
    }

    /// Whether the active room still has a running reader on an open topic.
    pub async fn is_reading(&self) -> bool {
        self.inner
            .state
            .read()
            .await
            .active
            .as_ref()
            .is_some_and(ActiveRoom::is_live)
    }

    async fn leave_topic(&self, topic: &Topic) {
        if topic.is_closed() {
            return;
        }
        if let Err(e) = self.inner.pubsub.leave(topic.name()).await {
            warn!("Failed to leave {}: {e}", topic.name());
        }
    }

    /// Ask every consumer of the session to stop.
    pub fn quit(&self) {
        info!("Quit requested");
        self.inner.quit.cancel();
    }

    pub fn quit_signal(&self) -> CancellationToken {
        self.inner.quit.clone()
    }

    /// Leave the active room and wait for its reader to stop.
    pub async fn shutdown(&self) -> Option<ReadLoopState> {
        let (active, home) = {
            let mut state = self.inner.state.write().await;
            (state.active.take()?, state.home_topic.take())
        };
        let topic = active.topic.clone();
        let reader = active.leave();
        self.leave_topic(&topic).await;
        if let Some(home) = home.filter(|home| home.name() != topic.name()) {
            self.leave_topic(&home).await;
        }
        match reader.await {
            Ok(state) => Some(state),
            Err(e) => {
                debug!("Read loop task failed: {e}");
                None
            }
        }
    }
}
