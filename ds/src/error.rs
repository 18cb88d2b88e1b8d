/// Errors originating from the delivery service layer.
///
/// String payloads carry the underlying transport error message. Callers
/// should treat them as opaque diagnostic text, not match on their content.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryServiceError {
    #[error("Subscribe to topic error: {0}")]
    SubscribeError(String),
    #[error("Publish message error: {0}")]
    PublishError(String),
    #[error("Connect peer error: {0}")]
    ConnectError(String),
    #[error("Subscription to {0} closed")]
    SubscriptionClosed(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("An unknown error occurred: {0}")]
    Other(anyhow::Error),
}
