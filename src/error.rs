use ds::DeliveryServiceError;

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Failed to decode chat message: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("Failed to encode chat message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Errors produced while parsing or dispatching a command line.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The verb is not in the command table.
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),
    /// The line does not start with the command sigil.
    #[error("not a command")]
    NotACommand,
    #[error("{0} needs an argument")]
    MissingArgument(String),
    #[error(transparent)]
    Payload(#[from] MessageError),
}

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("Failed to join room topic: {0}")]
    Subscription(#[source] DeliveryServiceError),
    #[error("Failed to publish: {0}")]
    Publish(#[source] DeliveryServiceError),
    #[error(transparent)]
    Encode(#[from] MessageError),
    #[error("Not joined to any room")]
    NotJoined,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Nick {0:?} would be read as a command")]
    InvalidNick(String),
}

/// Top-level error for a chat session.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    DeliveryService(#[from] DeliveryServiceError),
    #[error("Problem from std::io library: {0}")]
    Io(#[from] std::io::Error),
}
