//! Chat channel boundary.
//!
//! The channel store persists each ticket as one structured message in a
//! chat channel, and mentors in that channel can drive transitions by
//! reacting to the messages. This module is the seam: the operations the
//! store needs from a channel, the reaction event feed, and the in-memory
//! channel used by dev mode and tests.

pub mod memory;
pub mod reactions;

pub use memory::InMemoryChatChannel;
pub use reactions::ReactionBridge;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::types::Result;

/// The field map rendered into one chat message. Ordered so rendered
/// messages are stable.
pub type MessageFields = BTreeMap<String, String>;

/// One message from a history scan.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: String,
    pub fields: MessageFields,
}

/// A reaction being added to or removed from a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub message_id: String,
    pub chat_user_id: String,
    pub emote: String,
    pub added: bool,
}

#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// Post a new message; returns the channel-assigned message id.
    async fn post(&self, fields: &MessageFields) -> Result<String>;

    /// Fetch a message's fields. `Ok(None)` when the message is gone.
    async fn fetch(&self, message_id: &str) -> Result<Option<MessageFields>>;

    /// Replace a message's fields.
    async fn edit(&self, message_id: &str, fields: &MessageFields) -> Result<()>;

    /// Most recent messages, newest first, capped at `limit`.
    async fn history(&self, limit: usize) -> Result<Vec<ChatMessage>>;

    async fn healthy(&self) -> bool;
}
