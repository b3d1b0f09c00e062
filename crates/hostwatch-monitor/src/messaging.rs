//! Messaging surface contract used by the delivery sink.
//!
//! The chat backend is injected behind [`Messenger`]; the sink only needs
//! send and delete.

use std::fmt;

use async_trait::async_trait;

/// Identifier of a sent message, as assigned by the messaging surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Destination conversation for status messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatTarget(pub i64);

impl fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rendering hint for outbound text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    Plain,
    Html,
}

/// Errors from messaging operations.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Failed to send message: {reason}")]
    SendFailed { reason: String },

    #[error("Failed to delete message {message_id}: {reason}")]
    DeleteFailed { message_id: i64, reason: String },
}

/// Send/delete surface of the chat backend.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send `text` to `target`, returning the new message's id.
    async fn send(
        &self,
        target: ChatTarget,
        text: &str,
        format: MessageFormat,
    ) -> Result<MessageId, DeliveryError>;

    /// Delete a previously sent message.
    async fn delete(&self, target: ChatTarget, message_id: MessageId)
    -> Result<(), DeliveryError>;
}
