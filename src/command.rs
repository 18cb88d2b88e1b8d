//! Command line grammar: `/verb rest-of-line`.

use crate::{message::ChatMessage, CommandError};

pub const COMMAND_SIGIL: char = '/';

/// Verbs a remote peer may trigger on us.
pub const REMOTE_COMMANDS: [&str; 4] = ["/fetch", "/to", "/who", "/iam"];

/// Verbs only the local user may run.
pub const LOCAL_COMMANDS: [&str; 8] = [
    "/peers", "/quit", "/q", "/help", "/h", "/join", "/home", "/in",
];

pub fn is_command(line: &str) -> bool {
    line.starts_with(COMMAND_SIGIL)
}

pub fn is_remote_command(verb: &str) -> bool {
    REMOTE_COMMANDS.contains(&verb)
}

pub fn is_local_command(verb: &str) -> bool {
    LOCAL_COMMANDS.contains(&verb)
}

pub fn is_known_command(verb: &str) -> bool {
    is_remote_command(verb) || is_local_command(verb)
}

/// Split a line into its first token and the remainder.
///
/// A single trailing newline is dropped, the split happens at the first
/// whitespace run and leading whitespace of the remainder is trimmed.
pub fn split(line: &str) -> (&str, &str) {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);
    match line.find(char::is_whitespace) {
        Some(idx) => (&line[..idx], line[idx..].trim_start()),
        None => (line, ""),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCommand {
    pub verb: String,
    pub args: Vec<String>,
    /// Everything after the verb, verbatim apart from leading whitespace.
    pub rest: String,
    pub sender_id: String,
    pub sender_nick: String,
}

impl ParsedCommand {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        if !is_command(line) {
            return Err(CommandError::NotACommand);
        }
        let (verb, rest) = split(line);
        Ok(Self {
            verb: verb.to_string(),
            args: rest.split_whitespace().map(str::to_string).collect(),
            rest: rest.to_string(),
            ..Default::default()
        })
    }

    /// Parse the text of a received envelope, keeping who sent it.
    pub fn from_message(msg: &ChatMessage) -> Result<Self, CommandError> {
        let mut cmd = Self::parse(&msg.message)?;
        cmd.sender_id = msg.sender_id.clone();
        cmd.sender_nick = msg.sender_nick.clone();
        Ok(cmd)
    }

    pub fn arg(&self, idx: usize) -> Option<&str> {
        self.args.get(idx).map(String::as_str)
    }

    pub fn is_remote(&self) -> bool {
        is_remote_command(&self.verb)
    }
}
