//! Command semantics.
//!
//! [`dispatch`] is pure: it rewrites the pending `(text, to)` pair and says
//! what should happen next. Publishing and local side effects are left to
//! the caller, so the same table serves console input and remote commands.

use crate::{command::ParsedCommand, message::sample_fetch, CommandError};

pub const FETCH_ACK: &str = "check the json payload\n";
pub const WHO_BROADCAST: &str = "/to all /iam\n";
pub const INJECT_TEXT: &str = "/fetch that stuff produced elsewhere\n";
/// Destination token meaning "everyone in the room".
pub const BROADCAST_ALIAS: &str = "all";

/// Text and destination of the message about to be published.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pending {
    pub text: String,
    pub to: String,
}

impl Pending {
    pub fn new(text: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            to: to.into(),
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.to.is_empty()
    }
}

/// Identity the dispatcher speaks as.
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    pub nick: &'a str,
    pub short_id: &'a str,
}

/// Side effects only the local console may perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalAction {
    ListPeers,
    Quit,
    Help(String),
    Join(String),
    Home,
    /// Ask peer `to` to run a `/fetch`.
    Inject(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Publish the rewritten pending message with this payload.
    Publish(Vec<u8>),
    /// Nothing to publish; run the action locally.
    Local(LocalAction),
}

impl Outcome {
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Outcome::Publish(payload) => Some(payload),
            Outcome::Local(_) => None,
        }
    }
}

pub fn dispatch(
    cmd: &ParsedCommand,
    pending: &mut Pending,
    ctx: &DispatchContext<'_>,
) -> Result<Outcome, CommandError> {
    match cmd.verb.as_str() {
        "/fetch" => {
            let payload = sample_fetch(&cmd.rest)?;
            pending.text = FETCH_ACK.to_string();
            Ok(Outcome::Publish(payload))
        }
        "/to" => {
            let (addr, text) = crate::command::split(&cmd.rest);
            pending.to = if addr == BROADCAST_ALIAS {
                String::new()
            } else {
                addr.to_string()
            };
            pending.text = format!("{text}\n");
            Ok(Outcome::Publish(Vec::new()))
        }
        "/who" => {
            pending.text = WHO_BROADCAST.to_string();
            Ok(Outcome::Publish(Vec::new()))
        }
        "/iam" => {
            pending.text = format!("{} = {}\n", ctx.nick, ctx.short_id);
            Ok(Outcome::Publish(Vec::new()))
        }
        "/peers" => Ok(Outcome::Local(LocalAction::ListPeers)),
        "/quit" | "/q" => Ok(Outcome::Local(LocalAction::Quit)),
        "/help" | "/h" => Ok(Outcome::Local(LocalAction::Help(cmd.rest.clone()))),
        "/join" => match cmd.arg(0) {
            Some(room) => Ok(Outcome::Local(LocalAction::Join(room.to_string()))),
            None => Err(CommandError::MissingArgument(cmd.verb.clone())),
        },
        "/home" => Ok(Outcome::Local(LocalAction::Home)),
        "/in" => match cmd.arg(0) {
            Some(peer) => Ok(Outcome::Local(LocalAction::Inject(peer.to_string()))),
            None => Err(CommandError::MissingArgument(cmd.verb.clone())),
        },
        other => Err(CommandError::UnknownCommand(other.to_string())),
    }
}

/// Parse `pending.text` as a command and dispatch it.
pub fn handle_command(
    pending: &mut Pending,
    ctx: &DispatchContext<'_>,
) -> Result<Outcome, CommandError> {
    let cmd = ParsedCommand::parse(&pending.text)?;
    dispatch(&cmd, pending, ctx)
}
