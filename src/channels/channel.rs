//! Channel trait and message types shared by all transports.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use uuid::Uuid;

use crate::error::ChannelError;

/// A line of user input received on a channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: Uuid,
    /// Channel the message arrived on, e.g. "cli".
    pub channel: String,
    /// Sender identity within the channel; one conversation per sender.
    pub sender: String,
    pub content: String,
    pub received_at: chrono::DateTime<chrono::Utc>,
}

impl IncomingMessage {
    pub fn new(channel: &str, sender: &str, content: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.to_string(),
            sender: sender.to_string(),
            content: content.to_string(),
            received_at: chrono::Utc::now(),
        }
    }

    /// Key identifying the conversation this message belongs to.
    pub fn conversation_key(&self) -> (String, String) {
        (self.channel.clone(), self.sender.clone())
    }
}

/// Text to deliver back to a sender.
#[derive(Debug, Clone)]
pub struct OutgoingResponse {
    pub content: String,
}

impl OutgoingResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A bidirectional message transport.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Begin receiving messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Deliver a response to the sender of `msg`.
    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_key_pairs_channel_and_sender() {
        let msg = IncomingMessage::new("cli", "local-user", "bonjour");
        assert_eq!(msg.conversation_key(), ("cli".to_string(), "local-user".to_string()));
        assert_eq!(msg.content, "bonjour");
    }
}
