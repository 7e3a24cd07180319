//! Reaction-to-transition bridge.
//!
//! In the channel backend a mentor can work the queue from inside the chat
//! client: reacting to a ticket message with the claim emote claims it,
//! removing that reaction unclaims, and the complete emote completes. The
//! bridge resolves the reacting chat identity to a registered mentor and
//! feeds the resulting event through the store like any other caller, so
//! the same guards apply.
//!
//! Only watched messages are considered. The watch set is seeded from the
//! startup history scan and kept current from the hub: created and open
//! tickets are watched, terminal ones dropped.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::chat::ReactionEvent;
use crate::hub::{NotificationHub, Subscription};
use crate::mentors::MentorRegistry;
use crate::store::{TicketStore, TransitionResult};
use crate::ticket::TicketEvent;

pub struct ReactionBridge {
    store: Arc<dyn TicketStore>,
    mentors: Arc<dyn MentorRegistry>,
    watched: Arc<DashMap<String, ()>>,
    claim_emote: String,
    complete_emote: String,
}

impl ReactionBridge {
    pub fn new(
        store: Arc<dyn TicketStore>,
        mentors: Arc<dyn MentorRegistry>,
        claim_emote: String,
        complete_emote: String,
    ) -> Self {
        Self {
            store,
            mentors,
            watched: Arc::new(DashMap::new()),
            claim_emote,
            complete_emote,
        }
    }

    /// Keep the watch set in sync with the hub: new tickets are watched,
    /// terminal ones dropped. The returned receipts are usually kept for
    /// the life of the process.
    pub fn attach(&self, hub: &NotificationHub) -> Vec<Subscription> {
        let watched = Arc::clone(&self.watched);
        let on_added = hub.subscribe_added(move |ticket| {
            watched.insert(ticket.id.clone(), ());
        });

        let watched = Arc::clone(&self.watched);
        let on_updated = hub.subscribe_all_updates(move |ticket| {
            if ticket.status.is_terminal() {
                watched.remove(&ticket.id);
            } else {
                watched.insert(ticket.id.clone(), ());
            }
        });

        vec![on_added, on_updated]
    }

    /// Watch a recovered ticket (startup history scan).
    pub fn watch(&self, ticket_id: &str) {
        self.watched.insert(ticket_id.to_string(), ());
    }

    /// Drain reaction events until the channel closes.
    pub fn spawn(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<ReactionEvent>,
    ) -> JoinHandle<()> {
        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                bridge.handle(event).await;
            }
            debug!("Reaction feed closed");
        })
    }

    /// Map one reaction to a ticket event and run it. Reactions from
    /// strangers, on unwatched messages, or with unmapped emotes are
    /// dropped quietly; so are guard refusals, the reaction may simply
    /// have raced another mentor.
    pub async fn handle(&self, event: ReactionEvent) {
        if !self.watched.contains_key(&event.message_id) {
            return;
        }

        let mentor = match self.mentors.get_by_chat_id(&event.chat_user_id).await {
            Ok(Some(mentor)) => mentor,
            Ok(None) => {
                debug!(
                    "Ignoring reaction on ticket {} from unknown chat user {}",
                    event.message_id, event.chat_user_id
                );
                return;
            }
            Err(e) => {
                warn!("Mentor lookup for reaction failed: {}", e);
                return;
            }
        };

        let ticket_event = if event.added && event.emote == self.claim_emote {
            TicketEvent::Claim(mentor.mentor_ref())
        } else if event.added && event.emote == self.complete_emote {
            TicketEvent::Complete {
                mentor_id: mentor.user_id.clone(),
            }
        } else if !event.added && event.emote == self.claim_emote {
            TicketEvent::Unclaim {
                mentor_id: mentor.user_id.clone(),
            }
        } else {
            return;
        };

        match self.store.transition(&event.message_id, ticket_event).await {
            Ok(TransitionResult::Updated(ticket)) => {
                info!(
                    "Reaction by {} moved ticket {} to {}",
                    mentor.name, ticket.id, ticket.status
                );
            }
            Ok(TransitionResult::Rejected(_)) | Ok(TransitionResult::NotFound) => {
                debug!("Reaction on ticket {} had no effect", event.message_id);
            }
            Err(e) => {
                warn!("Reaction transition on ticket {} failed: {}", event.message_id, e);
            }
        }
    }
}
