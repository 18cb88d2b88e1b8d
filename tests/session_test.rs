//! Whole sessions: console in, presentation out.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use ds::{DeliveryServiceError, MemoryNetwork, PeerId, PubSub, Topic};
use room_chat::{
    config::ChatConfig,
    discovery::DiscoverySettings,
    presentation::SinkExit,
    room::{ChatRoom, RoomSettings, CHAT_ROOM_BUF_SIZE},
    session, ChatError, ConfigError, RoomError,
};
use tokio::{
    io::{duplex, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream},
    time::timeout,
};

const WAIT: Duration = Duration::from_secs(2);

fn alice_config() -> ChatConfig {
    ChatConfig {
        nick: "alice".to_string(),
        color: false,
        discovery_interval_secs: 1,
        ..Default::default()
    }
}

async fn read_until(reader: &mut DuplexStream, needle: &str) -> String {
    let mut seen = String::new();
    timeout(WAIT, async {
        let mut buf = [0u8; 1024];
        while !seen.contains(needle) {
            let n = reader.read(&mut buf).await.unwrap();
            assert!(n > 0, "output ended early");
            seen.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
    })
    .await
    .expect("timed out waiting for output");
    seen
}

#[tokio::test]
async fn test_session_round_trip() {
    let network = MemoryNetwork::new();
    let alice = Arc::new(network.peer().await);
    let (mut keys, input) = duplex(1024);
    let (console_out, mut console_screen) = duplex(64 * 1024);
    let (sink_out, mut screen) = duplex(64 * 1024);

    let config = alice_config();
    let running = tokio::spawn(async move {
        session::run(alice, &config, BufReader::new(input), console_out, sink_out).await
    });

    let (bob, mut bob_feed) = ChatRoom::new(
        Arc::new(network.peer().await),
        RoomSettings {
            nick: "bob".to_string(),
            home: "akumuji".to_string(),
            inbox_capacity: CHAT_ROOM_BUF_SIZE,
            discovery: DiscoverySettings::default(),
        },
    );
    bob.join("akumuji").await.unwrap();
    let mut bob_in = bob_feed.recv().await.unwrap();

    read_until(&mut console_screen, "Welcome").await;
    bob.publish("hi alice\n", "", Vec::new()).await.unwrap();
    read_until(&mut screen, "bob: hi alice\n").await;

    keys.write_all(b"/bogus\nhello bob\n").await.unwrap();
    read_until(&mut console_screen, r#"unknown command: "/bogus""#).await;
    let got = timeout(WAIT, bob_in.messages.recv()).await.unwrap().unwrap();
    assert_eq!(got.message, "hello bob\n");
    assert_eq!(got.sender_nick, "alice");

    keys.write_all(b"/quit\n").await.unwrap();
    let exit = timeout(WAIT, running).await.unwrap().unwrap().unwrap();
    assert_eq!(exit, SinkExit::Quit);
}

#[tokio::test]
async fn test_session_ends_with_input() {
    let network = MemoryNetwork::new();
    let alice = Arc::new(network.peer().await);
    let (keys, input) = duplex(1024);
    let (console_out, _console_screen) = duplex(64 * 1024);
    let (sink_out, _screen) = duplex(64 * 1024);
    drop(keys);

    let exit = timeout(
        WAIT,
        session::run(alice, &alice_config(), BufReader::new(input), console_out, sink_out),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(exit, SinkExit::Quit);
}

// ─────────────────────────── Failing substrate ───────────────────────────

struct Unreachable {
    id: PeerId,
    attempts: Mutex<Vec<String>>,
}

#[async_trait]
impl PubSub for Unreachable {
    fn local_peer_id(&self) -> &PeerId {
        &self.id
    }

    async fn join(&self, topic: &str) -> Result<Topic, DeliveryServiceError> {
        self.attempts.lock().unwrap().push(topic.to_string());
        Err(DeliveryServiceError::SubscribeError("no route".to_string()))
    }

    async fn leave(&self, _topic: &str) -> Result<(), DeliveryServiceError> {
        Ok(())
    }

    async fn rejoin(&self, topic: &str) -> Result<(), DeliveryServiceError> {
        Err(DeliveryServiceError::SubscribeError(topic.to_string()))
    }

    async fn list_peers(&self, _topic: &str) -> Vec<PeerId> {
        Vec::new()
    }

    async fn connect(&self, peer_address: &str) -> Result<(), DeliveryServiceError> {
        Err(DeliveryServiceError::ConnectError(peer_address.to_string()))
    }
}

#[tokio::test]
async fn test_failed_first_join_is_fatal() {
    let pubsub = Arc::new(Unreachable {
        id: PeerId::random(),
        attempts: Mutex::new(Vec::new()),
    });
    let (_keys, input) = duplex(16);
    let (console_out, _console_screen) = duplex(1024);
    let (sink_out, _screen) = duplex(1024);

    let res = session::run(
        pubsub.clone(),
        &alice_config(),
        BufReader::new(input),
        console_out,
        sink_out,
    )
    .await;

    assert!(matches!(
        res,
        Err(ChatError::Room(RoomError::Subscription(_)))
    ));
    assert_eq!(
        *pubsub.attempts.lock().unwrap(),
        vec!["chat-room:akumuji".to_string()]
    );
}

#[tokio::test]
async fn test_command_like_nick_is_refused() {
    let pubsub = Arc::new(Unreachable {
        id: PeerId::random(),
        attempts: Mutex::new(Vec::new()),
    });
    let config = ChatConfig {
        nick: "/iam".to_string(),
        ..alice_config()
    };
    let (_keys, input) = duplex(16);
    let (console_out, _console_screen) = duplex(1024);
    let (sink_out, _screen) = duplex(1024);

    let res = session::run(
        pubsub.clone(),
        &config,
        BufReader::new(input),
        console_out,
        sink_out,
    )
    .await;

    assert!(matches!(
        res,
        Err(ChatError::Config(ConfigError::InvalidNick(_)))
    ));
    assert!(pubsub.attempts.lock().unwrap().is_empty());
}
