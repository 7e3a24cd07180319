//! In-memory chat channel.
//!
//! Message ids are a plain counter, so the first ticket in a dev run is
//! ticket "0". Reactions pushed through [`InMemoryChatChannel::push_reaction`]
//! come out of the receiver handed to the reaction bridge, same as a real
//! channel's gateway events would.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

use crate::chat::{ChatChannel, ChatMessage, MessageFields, ReactionEvent};
use crate::types::{HelplineError, Result};

pub struct InMemoryChatChannel {
    messages: DashMap<String, MessageFields>,
    order: Mutex<Vec<String>>,
    next_id: AtomicU64,
    reaction_tx: mpsc::UnboundedSender<ReactionEvent>,
    reaction_rx: Mutex<Option<mpsc::UnboundedReceiver<ReactionEvent>>>,
}

impl InMemoryChatChannel {
    pub fn new() -> Self {
        let (reaction_tx, reaction_rx) = mpsc::unbounded_channel();
        Self {
            messages: DashMap::new(),
            order: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            reaction_tx,
            reaction_rx: Mutex::new(Some(reaction_rx)),
        }
    }

    /// Inject a reaction, as the channel gateway would.
    pub fn push_reaction(&self, event: ReactionEvent) {
        let _ = self.reaction_tx.send(event);
    }

    /// The reaction feed. Yields once; the bridge owns it afterwards.
    pub fn take_reactions(&self) -> Option<mpsc::UnboundedReceiver<ReactionEvent>> {
        self.reaction_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Default for InMemoryChatChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ChatChannel for InMemoryChatChannel {
    async fn post(&self, fields: &MessageFields) -> Result<String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        self.messages.insert(id.clone(), fields.clone());
        self.order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id.clone());
        Ok(id)
    }

    async fn fetch(&self, message_id: &str) -> Result<Option<MessageFields>> {
        Ok(self.messages.get(message_id).map(|entry| entry.clone()))
    }

    async fn edit(&self, message_id: &str, fields: &MessageFields) -> Result<()> {
        match self.messages.get_mut(message_id) {
            Some(mut entry) => {
                *entry = fields.clone();
                Ok(())
            }
            None => Err(HelplineError::Chat(format!(
                "edit of unknown message {}",
                message_id
            ))),
        }
    }

    async fn history(&self, limit: usize) -> Result<Vec<ChatMessage>> {
        let order = self.order.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(order
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| {
                self.messages.get(id).map(|fields| ChatMessage {
                    id: id.clone(),
                    fields: fields.clone(),
                })
            })
            .collect())
    }

    async fn healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(status: &str) -> MessageFields {
        let mut map = MessageFields::new();
        map.insert("status".to_string(), status.to_string());
        map
    }

    #[tokio::test]
    async fn post_fetch_edit_round_trip() {
        let chat = InMemoryChatChannel::new();

        let id = chat.post(&fields("requested")).await.unwrap();
        assert_eq!(id, "0");
        assert_eq!(
            chat.fetch(&id).await.unwrap().unwrap()["status"],
            "requested"
        );

        chat.edit(&id, &fields("responding")).await.unwrap();
        assert_eq!(
            chat.fetch(&id).await.unwrap().unwrap()["status"],
            "responding"
        );

        assert!(chat.fetch("99").await.unwrap().is_none());
        assert!(chat.edit("99", &fields("requested")).await.is_err());
    }

    #[tokio::test]
    async fn history_is_newest_first_and_capped() {
        let chat = InMemoryChatChannel::new();
        for status in ["a", "b", "c"] {
            chat.post(&fields(status)).await.unwrap();
        }

        let recent = chat.history(2).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[tokio::test]
    async fn reactions_flow_through_the_taken_receiver() {
        let chat = InMemoryChatChannel::new();
        let mut reactions = chat.take_reactions().unwrap();
        assert!(chat.take_reactions().is_none());

        chat.push_reaction(ReactionEvent {
            message_id: "0".to_string(),
            chat_user_id: "chat-1".to_string(),
            emote: "👌".to_string(),
            added: true,
        });

        let event = reactions.recv().await.unwrap();
        assert_eq!(event.message_id, "0");
        assert!(event.added);
    }
}
