//! Ticket persistence.
//!
//! Two interchangeable backends sit behind [`TicketStore`]: MongoDB
//! documents with optimistic locking, and ticket state rendered into chat
//! messages. Every store runs events through the shared guarded transition
//! and publishes to the notification hub only after the write landed, so
//! subscribers never see state the store could still lose.

pub mod channel;
pub mod mongo;

pub use channel::ChannelTicketStore;
pub use mongo::MongoTicketStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::directory::DirectoryUser;
use crate::ticket::{Ticket, TicketEvent, TicketStatus};
use crate::types::Result;

/// Arguments for opening a ticket. Only the user id is required; the rest
/// is optional context shown to mentors. Any client-supplied display name
/// is ignored, the directory is authoritative.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TicketCreate {
    pub user_id: String,
    pub lang: Option<String>,
    pub desc: Option<String>,
    pub session: Option<String>,
    pub session_id: Option<String>,
    pub session_url: Option<String>,
    pub session_web_url: Option<String>,
}

impl TicketCreate {
    /// Build the initial ticket for a resolved mentee. Empty metadata
    /// strings are normalized to absent here so both backends agree.
    pub fn into_ticket(
        self,
        id: String,
        mentee: &DirectoryUser,
        created: DateTime<Utc>,
    ) -> Ticket {
        Ticket {
            id,
            status: TicketStatus::Requested,
            user_id: mentee.id.clone(),
            user_name: mentee.name.clone(),
            lang: scrub(self.lang),
            desc: scrub(self.desc),
            session: scrub(self.session),
            session_id: scrub(self.session_id),
            session_url: scrub(self.session_url),
            session_web_url: scrub(self.session_web_url),
            mentor: None,
            created,
            claimed: None,
            completed: None,
            canceled: None,
        }
    }
}

fn scrub(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// What a transition request came back as. Guard refusals are values, not
/// errors: the caller usually just reports the unchanged snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionResult {
    /// The event applied; the new snapshot was persisted and published.
    Updated(Ticket),
    /// The guard refused (or a concurrent writer won); the snapshot is the
    /// current persisted state.
    Rejected(Ticket),
    NotFound,
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Resolve the mentee against the directory and persist a new
    /// requested ticket. `Ok(None)` when the user cannot be resolved; a
    /// directory fault counts as a miss on this path.
    async fn create(&self, args: TicketCreate) -> Result<Option<Ticket>>;

    async fn get(&self, ticket_id: &str) -> Result<Option<Ticket>>;

    /// Run one event through the guarded transition.
    async fn transition(&self, ticket_id: &str, event: TicketEvent)
        -> Result<TransitionResult>;

    /// Open (requested or responding) tickets, oldest first.
    async fn open_tickets(&self) -> Result<Vec<Ticket>>;

    async fn healthy(&self) -> bool;

    fn backend(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mentee() -> DirectoryUser {
        DirectoryUser {
            id: "U-1".to_string(),
            name: "Bo".to_string(),
        }
    }

    #[test]
    fn into_ticket_starts_requested_with_directory_identity() {
        let args: TicketCreate =
            serde_urlencoded::from_str("userId=U-1&lang=en&desc=stuck+on+login").unwrap();
        let ticket = args.into_ticket("T-1".to_string(), &mentee(), Utc::now());

        assert_eq!(ticket.status, TicketStatus::Requested);
        assert_eq!(ticket.user_id, "U-1");
        assert_eq!(ticket.user_name, "Bo");
        assert_eq!(ticket.lang.as_deref(), Some("en"));
        assert_eq!(ticket.desc.as_deref(), Some("stuck on login"));
        assert!(ticket.mentor.is_none());
    }

    #[test]
    fn empty_metadata_strings_become_absent() {
        let args: TicketCreate =
            serde_urlencoded::from_str("userId=U-1&lang=&session=&desc=help").unwrap();
        let ticket = args.into_ticket("T-1".to_string(), &mentee(), Utc::now());

        assert!(ticket.lang.is_none());
        assert!(ticket.session.is_none());
        assert_eq!(ticket.desc.as_deref(), Some("help"));
    }

    #[test]
    fn client_supplied_usernames_are_dropped() {
        // Legacy clients send a username field; it is not part of the
        // create arguments and the directory name wins.
        let args: TicketCreate =
            serde_urlencoded::from_str("userId=U-1&username=Impostor").unwrap();
        let ticket = args.into_ticket("T-1".to_string(), &mentee(), Utc::now());
        assert_eq!(ticket.user_name, "Bo");
    }

    #[test]
    fn create_args_parse_from_json_too() {
        let args: TicketCreate =
            serde_json::from_str(r#"{"userId":"U-1","sessionId":"S-9"}"#).unwrap();
        assert_eq!(args.user_id, "U-1");
        assert_eq!(args.session_id.as_deref(), Some("S-9"));
        assert!(args.lang.is_none());
    }
}
