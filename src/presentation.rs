//! Presentation sink: renders whatever the active room's inboxes yield.

use log::debug;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;

use crate::{
    message::{ChatData, ChatMessage},
    room::InboxFeed,
};

const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkExit {
    Quit,
    /// The session is gone and no inbox is left to read.
    Closed,
}

pub struct PresentationSink<W> {
    feed: InboxFeed,
    quit: CancellationToken,
    output: W,
    color: bool,
}

async fn recv_from<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl<W: AsyncWrite + Unpin> PresentationSink<W> {
    pub fn new(feed: InboxFeed, quit: CancellationToken, output: W, color: bool) -> Self {
        Self {
            feed,
            quit,
            output,
            color,
        }
    }

    pub async fn run(&mut self) -> std::io::Result<SinkExit> {
        let mut feed_open = true;
        let mut messages: Option<mpsc::Receiver<ChatMessage>> = None;
        let mut data: Option<mpsc::Receiver<ChatData>> = None;

        loop {
            if !feed_open && messages.is_none() && data.is_none() {
                return Ok(SinkExit::Closed);
            }
            tokio::select! {
                biased;
                _ = self.quit.cancelled() => return Ok(SinkExit::Quit),
                inboxes = self.feed.recv(), if feed_open => match inboxes {
                    Some(inboxes) => {
                        debug!("Showing room {}", inboxes.room);
                        messages = Some(inboxes.messages);
                        data = Some(inboxes.data);
                    }
                    None => feed_open = false,
                },
                msg = recv_from(&mut messages), if messages.is_some() => match msg {
                    Some(msg) => self.show_message(&msg).await?,
                    None => {
                        debug!("Message inbox closed");
                        messages = None;
                    }
                },
                item = recv_from(&mut data), if data.is_some() => match item {
                    Some(item) => self.show_data(&item).await?,
                    None => data = None,
                },
            }
        }
    }

    fn nick(&self, nick: &str) -> String {
        if self.color {
            format!("{GREEN}{nick}{RESET}")
        } else {
            nick.to_string()
        }
    }

    async fn show_message(&mut self, msg: &ChatMessage) -> std::io::Result<()> {
        let line = format!("{}: {}", self.nick(&msg.sender_nick), msg.message);
        self.write(&line).await
    }

    async fn show_data(&mut self, item: &ChatData) -> std::io::Result<()> {
        let line = format!("{}: {}\n", self.nick(&item.sender_nick), item.text());
        self.write(&line).await
    }

    async fn write(&mut self, text: &str) -> std::io::Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::Inboxes;

    fn feed_with(room: &str) -> (
        mpsc::UnboundedSender<Inboxes>,
        mpsc::Sender<ChatMessage>,
        mpsc::Sender<ChatData>,
        InboxFeed,
    ) {
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        let (msg_tx, msg_rx) = mpsc::channel(8);
        let (data_tx, data_rx) = mpsc::channel(8);
        feed_tx
            .send(Inboxes {
                room: room.to_string(),
                messages: msg_rx,
                data: data_rx,
            })
            .unwrap();
        (feed_tx, msg_tx, data_tx, feed_rx)
    }

    fn message(nick: &str, text: &str) -> ChatMessage {
        ChatMessage {
            message: text.to_string(),
            sender_nick: nick.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_renders_messages_and_data_until_closed() {
        let (feed_tx, msg_tx, data_tx, feed) = feed_with("lobby");
        msg_tx.send(message("bob", "hi\n")).await.unwrap();
        data_tx
            .send(ChatData {
                data: b"{\"Tag\":\"x\"}".to_vec(),
                sender_nick: "bob".to_string(),
            })
            .await
            .unwrap();
        drop((feed_tx, msg_tx, data_tx));

        let mut sink = PresentationSink::new(feed, CancellationToken::new(), Vec::new(), false);
        assert_eq!(sink.run().await.unwrap(), SinkExit::Closed);

        let out = String::from_utf8(sink.into_output()).unwrap();
        assert!(out.contains("bob: hi\n"));
        assert!(out.contains("bob: {\"Tag\":\"x\"}\n"));
    }

    #[tokio::test]
    async fn test_quit_ends_the_wait() {
        let (_feed_tx, _msg_tx, _data_tx, feed) = feed_with("lobby");
        let quit = CancellationToken::new();
        let mut sink = PresentationSink::new(feed, quit.clone(), Vec::new(), false);

        quit.cancel();
        assert_eq!(sink.run().await.unwrap(), SinkExit::Quit);
    }

    #[tokio::test]
    async fn test_colored_nick() {
        let (_feed_tx, msg_tx, _data_tx, feed) = feed_with("lobby");
        let quit = CancellationToken::new();
        let mut sink = PresentationSink::new(feed, quit.clone(), Vec::new(), true);
        msg_tx.send(message("bob", "hey\n")).await.unwrap();

        let stop = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            quit.cancel();
        });
        sink.run().await.unwrap();
        stop.await.unwrap();

        let out = String::from_utf8(sink.into_output()).unwrap();
        assert_eq!(out, "\x1b[32mbob\x1b[0m: hey\n");
    }

    #[tokio::test]
    async fn test_switching_rooms_replaces_inboxes() {
        let (feed_tx, old_msg_tx, _old_data_tx, feed) = feed_with("lobby");
        let quit = CancellationToken::new();
        let mut sink = PresentationSink::new(feed, quit.clone(), Vec::new(), false);

        let (new_msg_tx, new_msg_rx) = mpsc::channel(8);
        let (_new_data_tx, new_data_rx) = mpsc::channel::<ChatData>(8);
        let runner = tokio::spawn(async move {
            let exit = sink.run().await.unwrap();
            (exit, sink.into_output())
        });

        old_msg_tx.send(message("bob", "in lobby\n")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        feed_tx
            .send(Inboxes {
                room: "kitchen".to_string(),
                messages: new_msg_rx,
                data: new_data_rx,
            })
            .unwrap();
        new_msg_tx.send(message("carol", "in kitchen\n")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        quit.cancel();

        let (exit, out) = runner.await.unwrap();
        assert_eq!(exit, SinkExit::Quit);
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out, "bob: in lobby\ncarol: in kitchen\n");
    }
}
