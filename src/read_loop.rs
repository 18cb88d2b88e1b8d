//! Per-room reader: decode, filter, answer remote commands, fan out.

use ds::{InboundPacket, PeerId, Subscription, Topic};
use log::{debug, error, info, warn};

use crate::{
    command,
    dispatcher::{handle_command, DispatchContext, Outcome, Pending},
    identity::is_addressed_to,
    message::{ChatData, ChatMessage},
    room::InboxSenders,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadLoopState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    Malformed,
    OwnMessage,
    NotAddressedToUs,
}

/// What to do with one inbound packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Discard(DiscardReason),
    /// A command remote peers may not trigger. Reported, then dropped.
    InvalidCommand(String),
    /// A whitelisted remote command; dispatch it and reply to the sender.
    Command(ChatMessage),
    Broadcast(ChatMessage),
    /// Plain message carrying a payload: goes to both inboxes.
    BroadcastWithData(ChatMessage, ChatData),
}

pub fn route(packet: &InboundPacket, self_id: &PeerId) -> Route {
    let msg = match ChatMessage::decode(&packet.payload) {
        Ok(msg) => msg,
        Err(e) => {
            debug!("Skipping packet from {}: {e}", packet.from);
            return Route::Discard(DiscardReason::Malformed);
        }
    };
    if packet.from == *self_id || msg.sender_id == self_id.as_str() {
        return Route::Discard(DiscardReason::OwnMessage);
    }
    if !is_addressed_to(&msg.to, self_id) {
        return Route::Discard(DiscardReason::NotAddressedToUs);
    }
    if command::is_command(&msg.message) {
        let (verb, _) = command::split(&msg.message);
        if !command::is_remote_command(verb) {
            return Route::InvalidCommand(msg.message);
        }
        return Route::Command(msg);
    }
    if msg.has_payload() {
        let data = ChatData::from(&msg);
        return Route::BroadcastWithData(msg, data);
    }
    Route::Broadcast(msg)
}

pub struct ReadLoop {
    topic: Topic,
    subscription: Subscription,
    self_id: PeerId,
    nick: String,
    inbox: InboxSenders,
    state: ReadLoopState,
}

impl ReadLoop {
    pub(crate) fn new(
        topic: Topic,
        subscription: Subscription,
        self_id: PeerId,
        nick: String,
        inbox: InboxSenders,
    ) -> Self {
        Self {
            topic,
            subscription,
            self_id,
            nick,
            inbox,
            state: ReadLoopState::Running,
        }
    }

    pub fn state(&self) -> ReadLoopState {
        self.state
    }

    /// Run until the subscription ends or nobody reads the inboxes anymore.
    /// Dropping the loop closes both inboxes, which tells the sink the room
    /// is over.
    pub async fn run(mut self) -> ReadLoopState {
        info!("Reading {}", self.topic.name());
        while self.state == ReadLoopState::Running {
            match self.subscription.next().await {
                Ok(packet) => {
                    if !self.handle_packet(&packet).await {
                        debug!("Inboxes for {} dropped", self.topic.name());
                        self.state = ReadLoopState::Stopped;
                    }
                }
                Err(e) => {
                    info!("Stopped reading {}: {e}", self.topic.name());
                    self.state = ReadLoopState::Stopped;
                }
            }
        }
        self.state
    }

    /// Returns false once the inbox receivers are gone.
    async fn handle_packet(&self, packet: &InboundPacket) -> bool {
        match route(packet, &self.self_id) {
            Route::Discard(reason) => {
                debug!("Discarding packet from {}: {reason:?}", packet.from);
                true
            }
            Route::InvalidCommand(text) => {
                warn!("invalid command : {:?}", text.trim_end());
                true
            }
            Route::Command(msg) => {
                self.reply(&msg).await;
                true
            }
            Route::Broadcast(msg) => self.inbox.messages.send(msg).await.is_ok(),
            Route::BroadcastWithData(msg, data) => {
                self.inbox.messages.send(msg).await.is_ok()
                    && self.inbox.data.send(data).await.is_ok()
            }
        }
    }

    async fn reply(&self, msg: &ChatMessage) {
        let mut pending = Pending::new(msg.message.clone(), String::new());
        let ctx = DispatchContext {
            nick: &self.nick,
            short_id: self.self_id.short(),
        };
        let payload = match handle_command(&mut pending, &ctx) {
            Ok(Outcome::Publish(payload)) => payload,
            Ok(Outcome::Local(action)) => {
                debug!("Ignoring local action {action:?} requested by {}", msg.sender());
                return;
            }
            Err(e) => {
                warn!("handlecommands error: {e}");
                return;
            }
        };

        let reply = ChatMessage::new(pending.text, msg.sender(), payload, &self.self_id, &self.nick);
        let bytes = match reply.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to encode reply: {e}");
                return;
            }
        };
        if let Err(e) = self.topic.publish(bytes).await {
            error!("publish error: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn me() -> PeerId {
        PeerId::new("12D3KooWlocalpeer1111aaaa")
    }

    fn them() -> PeerId {
        PeerId::new("12D3KooWremotepeer222bbbb")
    }

    fn packet_from(from: &PeerId, msg: &ChatMessage) -> InboundPacket {
        InboundPacket::new(msg.encode().unwrap(), "chat-room:test", from.clone())
    }

    fn msg(text: &str, to: &str, payload: &[u8]) -> ChatMessage {
        ChatMessage::new(text, to, payload.to_vec(), &them(), "bob")
    }

    #[test]
    fn test_malformed_packet_is_discarded() {
        let packet = InboundPacket::new(b"{oops".to_vec(), "t", them());
        assert_eq!(route(&packet, &me()), Route::Discard(DiscardReason::Malformed));
    }

    #[test]
    fn test_own_packet_is_discarded() {
        let own = ChatMessage::new("hi\n", "", Vec::new(), &me(), "me");
        assert_eq!(
            route(&packet_from(&me(), &own), &me()),
            Route::Discard(DiscardReason::OwnMessage)
        );
    }

    #[test]
    fn test_addressing() {
        let to_other = msg("psst\n", "zzzzzzzz", b"");
        assert_eq!(
            route(&packet_from(&them(), &to_other), &me()),
            Route::Discard(DiscardReason::NotAddressedToUs)
        );

        // a substring of our id is not our id
        let partial = msg("psst\n", "aaaa", b"");
        assert_eq!(
            route(&packet_from(&them(), &partial), &me()),
            Route::Discard(DiscardReason::NotAddressedToUs)
        );

        let to_me = msg("psst\n", me().short(), b"");
        assert_eq!(
            route(&packet_from(&them(), &to_me), &me()),
            Route::Broadcast(to_me)
        );
    }

    #[test]
    fn test_remote_commands_are_whitelisted() {
        let fetch = msg("/fetch x\n", "", b"");
        assert_eq!(route(&packet_from(&them(), &fetch), &me()), Route::Command(fetch));

        for text in ["/quit\n", "/peers\n", "/in abc\n", "/bogus\n"] {
            let m = msg(text, "", b"");
            assert_eq!(
                route(&packet_from(&them(), &m), &me()),
                Route::InvalidCommand(text.to_string())
            );
        }
    }

    #[test]
    fn test_payload_goes_to_both_inboxes() {
        let m = msg("check the json payload\n", "", b"{\"Tag\":\"x\"}");
        match route(&packet_from(&them(), &m), &me()) {
            Route::BroadcastWithData(got, data) => {
                assert_eq!(got, m);
                assert_eq!(data.data, b"{\"Tag\":\"x\"}");
                assert_eq!(data.sender_nick, "bob");
            }
            other => panic!("unexpected route {other:?}"),
        }
    }
}
