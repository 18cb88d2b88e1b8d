//! Console producer: turns typed lines into commands or published messages.

use ds::PubSub;
use log::{debug, error, info};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    command,
    dispatcher::{handle_command, DispatchContext, LocalAction, Outcome, Pending, INJECT_TEXT},
    help::get_help,
    room::ChatRoom,
};

/// What happened to one input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Published,
    /// Handled locally, nothing published.
    Local,
    /// Command rejected; the error was shown to the user.
    Rejected,
    /// Publishing failed; the error was shown to the user.
    Failed,
    Ignored,
}

pub struct ConsoleProducer<P: PubSub, W> {
    room: ChatRoom<P>,
    output: W,
}

impl<P, W> ConsoleProducer<P, W>
where
    P: PubSub,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(room: ChatRoom<P>, output: W) -> Self {
        Self { room, output }
    }

    /// Read lines until input ends or the session quits.
    pub async fn run<R>(mut self, input: R) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        let quit = self.room.quit_signal();
        let mut lines = input.lines();
        loop {
            let line = tokio::select! {
                _ = quit.cancelled() => break,
                line = lines.next_line() => line?,
            };
            match line {
                Some(line) => {
                    self.process_line(&format!("{line}\n")).await?;
                }
                None => {
                    info!("Console input closed");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Handle one newline-terminated line.
    pub async fn process_line(&mut self, line: &str) -> std::io::Result<LineOutcome> {
        if line.trim().is_empty() {
            return Ok(LineOutcome::Ignored);
        }

        let mut pending = Pending::new(line, "");
        let mut payload = Vec::new();
        if command::is_command(line) {
            let ctx = DispatchContext {
                nick: self.room.nick(),
                short_id: self.room.short_id(),
            };
            match handle_command(&mut pending, &ctx) {
                Ok(Outcome::Publish(bytes)) => payload = bytes,
                Ok(Outcome::Local(action)) => {
                    self.perform(action).await?;
                    return Ok(LineOutcome::Local);
                }
                Err(e) => {
                    self.say(&format!("{e}\n")).await?;
                    return Ok(LineOutcome::Rejected);
                }
            }
        }

        match self.room.publish(&pending.text, &pending.to, payload).await {
            Ok(id) => {
                debug!("Published {id}");
                Ok(LineOutcome::Published)
            }
            Err(e) => {
                error!("publish error: {e}");
                self.say(&format!("publish error: {e}\n")).await?;
                Ok(LineOutcome::Failed)
            }
        }
    }

    async fn perform(&mut self, action: LocalAction) -> std::io::Result<()> {
        match action {
            LocalAction::ListPeers => {
                let members = self.room.list_members().await;
                if members.is_empty() {
                    self.say("no peers in this room yet\n").await?;
                }
                for peer in members {
                    self.say(&format!("{peer}\n")).await?;
                }
            }
            LocalAction::Quit => self.room.quit(),
            LocalAction::Help(topic) => {
                self.say(&format!("{}\n", get_help(&topic))).await?;
            }
            LocalAction::Join(room) => self.switch(&room).await?,
            LocalAction::Home => {
                let home = self.room.home().to_string();
                self.switch(&home).await?;
            }
            LocalAction::Inject(peer) => {
                if let Err(e) = self.room.publish(INJECT_TEXT, &peer, Vec::new()).await {
                    error!("publish error: {e}");
                    self.say(&format!("publish error: {e}\n")).await?;
                }
            }
        }
        Ok(())
    }

    async fn switch(&mut self, room: &str) -> std::io::Result<()> {
        match self.room.join(room).await {
            Ok(()) => self.say(&format!("now in {room}\n")).await,
            Err(e) => {
                error!("join chat error: {e}");
                self.say(&format!("join chat error: {e}\n")).await
            }
        }
    }

    async fn say(&mut self, text: &str) -> std::io::Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await
    }

    pub fn into_output(self) -> W {
        self.output
    }
}
