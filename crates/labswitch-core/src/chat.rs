use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ChatError;
use crate::ids::ChatId;

/// Who sent an inbound message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub id: i64,
    /// Display handle. Absent when the user never configured one.
    pub username: Option<String>,
}

impl Sender {
    /// The display handle, if it is present and non-empty.
    pub fn handle(&self) -> Option<&str> {
        self.username.as_deref().filter(|u| !u.is_empty())
    }
}

/// A text message received from the chat platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    pub sender: Sender,
    pub text: String,
}

/// Messaging platform primitives used by the dispatcher.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Long-poll for the next batch of inbound messages. An empty batch means
    /// the poll timed out with nothing new.
    async fn next_batch(&self) -> Result<Vec<InboundMessage>, ChatError>;

    async fn send(&self, chat_id: ChatId, text: &str) -> Result<(), ChatError>;

    /// Leave (disengage from) a chat.
    async fn leave(&self, chat_id: ChatId) -> Result<(), ChatError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_present() {
        let sender = Sender { id: 1, username: Some("alice".into()) };
        assert_eq!(sender.handle(), Some("alice"));
    }

    #[test]
    fn empty_handle_is_missing() {
        let sender = Sender { id: 1, username: Some(String::new()) };
        assert_eq!(sender.handle(), None);
        let sender = Sender { id: 1, username: None };
        assert_eq!(sender.handle(), None);
    }
}
