//! Chat-channel ticket store.
//!
//! Each ticket lives as one structured message in a chat channel: the
//! message's field map carries the full ticket state plus a `rev` counter,
//! and every transition re-renders the message in place. The channel is
//! the database; a restarted service recovers open tickets by scanning
//! recent history.
//!
//! Chat APIs have no conditional edit, so writers are serialized per
//! ticket id inside the process. The `rev` counter makes lost updates
//! visible in the channel history when debugging, it is not a guard.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

use crate::chat::{ChatChannel, MessageFields};
use crate::directory::UserDirectory;
use crate::hub::NotificationHub;
use crate::store::{TicketCreate, TicketStore, TransitionResult};
use crate::ticket::{MentorRef, Ticket, TicketEvent, TicketStatus};
use crate::types::Result;

pub struct ChannelTicketStore {
    chat: Arc<dyn ChatChannel>,
    hub: Arc<NotificationHub>,
    directory: Arc<dyn UserDirectory>,
    writers: DashMap<String, Arc<Mutex<()>>>,
    history_limit: usize,
}

impl ChannelTicketStore {
    pub fn new(
        chat: Arc<dyn ChatChannel>,
        hub: Arc<NotificationHub>,
        directory: Arc<dyn UserDirectory>,
        history_limit: usize,
    ) -> Self {
        Self {
            chat,
            hub,
            directory,
            writers: DashMap::new(),
            history_limit,
        }
    }

    fn writer(&self, ticket_id: &str) -> Arc<Mutex<()>> {
        self.writers
            .entry(ticket_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[async_trait::async_trait]
impl TicketStore for ChannelTicketStore {
    async fn create(&self, args: TicketCreate) -> Result<Option<Ticket>> {
        let user = match self.directory.lookup(&args.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(
                    "Directory lookup for {} failed, refusing ticket: {}",
                    args.user_id, e
                );
                return Ok(None);
            }
        };

        // The message id becomes the ticket id, so the ticket is rendered
        // without one and patched after the post.
        let mut ticket = args.into_ticket(String::new(), &user, Utc::now());
        let id = self.chat.post(&render_fields(&ticket, 0)).await?;
        ticket.id = id;

        self.hub.publish_created(&ticket);
        Ok(Some(ticket))
    }

    async fn get(&self, ticket_id: &str) -> Result<Option<Ticket>> {
        let Some(fields) = self.chat.fetch(ticket_id).await? else {
            return Ok(None);
        };
        match parse_ticket(ticket_id, &fields) {
            Some(ticket) => Ok(Some(ticket)),
            None => {
                warn!("Message {} is not a parseable ticket", ticket_id);
                Ok(None)
            }
        }
    }

    async fn transition(
        &self,
        ticket_id: &str,
        event: TicketEvent,
    ) -> Result<TransitionResult> {
        let lock = self.writer(ticket_id);
        let _guard = lock.lock().await;

        let Some(fields) = self.chat.fetch(ticket_id).await? else {
            return Ok(TransitionResult::NotFound);
        };
        let Some(current) = parse_ticket(ticket_id, &fields) else {
            warn!("Message {} is not a parseable ticket", ticket_id);
            return Ok(TransitionResult::NotFound);
        };

        let Some(next) = current.apply(&event, Utc::now()) else {
            return Ok(TransitionResult::Rejected(current));
        };

        let rev = parse_rev(&fields) + 1;
        self.chat.edit(ticket_id, &render_fields(&next, rev)).await?;
        self.hub.publish_updated(&next);

        if next.status.is_terminal() {
            self.writers.remove(ticket_id);
        }
        Ok(TransitionResult::Updated(next))
    }

    async fn open_tickets(&self) -> Result<Vec<Ticket>> {
        let messages = self.chat.history(self.history_limit).await?;
        let mut open: Vec<Ticket> = messages
            .iter()
            .filter_map(|message| parse_ticket(&message.id, &message.fields))
            .filter(|ticket| !ticket.status.is_terminal())
            .collect();
        open.sort_by_key(|ticket| ticket.created);
        Ok(open)
    }

    async fn healthy(&self) -> bool {
        self.chat.healthy().await
    }

    fn backend(&self) -> &'static str {
        "channel"
    }
}

// ==== Message rendering ====

fn render_fields(ticket: &Ticket, rev: u64) -> MessageFields {
    let mut fields = MessageFields::new();
    fields.insert("status".to_string(), ticket.status.as_str().to_string());
    fields.insert("userId".to_string(), ticket.user_id.clone());
    fields.insert("userName".to_string(), ticket.user_name.clone());
    fields.insert("created".to_string(), ticket.created.to_rfc3339());
    fields.insert("rev".to_string(), rev.to_string());

    let optional = [
        ("lang", &ticket.lang),
        ("desc", &ticket.desc),
        ("session", &ticket.session),
        ("sessionId", &ticket.session_id),
        ("sessionUrl", &ticket.session_url),
        ("sessionWebUrl", &ticket.session_web_url),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            fields.insert(key.to_string(), value.clone());
        }
    }

    if let Some(mentor) = &ticket.mentor {
        fields.insert("mentorId".to_string(), mentor.id.clone());
        fields.insert("mentorName".to_string(), mentor.name.clone());
    }
    if let Some(claimed) = ticket.claimed {
        fields.insert("claimed".to_string(), claimed.to_rfc3339());
    }
    if let Some(completed) = ticket.completed {
        fields.insert("completed".to_string(), completed.to_rfc3339());
    }
    if let Some(canceled) = ticket.canceled {
        fields.insert("canceled".to_string(), canceled.to_rfc3339());
    }

    fields
}

fn parse_ticket(id: &str, fields: &MessageFields) -> Option<Ticket> {
    let status = TicketStatus::parse(fields.get("status")?)?;
    let user_id = fields.get("userId")?.clone();
    let user_name = fields.get("userName")?.clone();
    let created = parse_time(fields.get("created")?)?;

    let mentor = match (fields.get("mentorId"), fields.get("mentorName")) {
        (Some(mentor_id), Some(mentor_name)) => Some(MentorRef {
            id: mentor_id.clone(),
            name: mentor_name.clone(),
        }),
        _ => None,
    };

    Some(Ticket {
        id: id.to_string(),
        status,
        user_id,
        user_name,
        lang: fields.get("lang").cloned(),
        desc: fields.get("desc").cloned(),
        session: fields.get("session").cloned(),
        session_id: fields.get("sessionId").cloned(),
        session_url: fields.get("sessionUrl").cloned(),
        session_web_url: fields.get("sessionWebUrl").cloned(),
        mentor,
        created,
        claimed: fields.get("claimed").and_then(|v| parse_time(v)),
        completed: fields.get("completed").and_then(|v| parse_time(v)),
        canceled: fields.get("canceled").and_then(|v| parse_time(v)),
    })
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn parse_rev(fields: &MessageFields) -> u64 {
    fields
        .get("rev")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}
