//! Ticket document schema
//!
//! Stores the ticket state machine plus a numeric `lock` used for
//! optimistic concurrency: transitions replace the document conditioned on
//! the lock value they read, so two racing writers cannot both win.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::ticket::{MentorRef, Ticket, TicketStatus};
use crate::types::{HelplineError, Result};

/// Collection name for tickets
pub const TICKET_COLLECTION: &str = "tickets";

/// Ticket document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TicketDoc {
    /// MongoDB document ID; its hex form is the public ticket id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    pub status: TicketStatus,

    /// Bumped on every write, checked by conditional replaces
    pub lock: i64,

    pub user_id: String,
    pub user_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_web_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentor_name: Option<String>,

    pub created: bson::DateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed: Option<bson::DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bson::DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canceled: Option<bson::DateTime>,

    /// Set when the ticket reaches a terminal state; the retention TTL
    /// index expires documents on this field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<bson::DateTime>,
}

impl TicketDoc {
    /// Build the document form of a ticket. The id is parsed back from the
    /// ticket's hex id; a ticket that has not been inserted yet (empty id)
    /// gets no `_id` and MongoDB assigns one.
    pub fn from_ticket(ticket: &Ticket, lock: i64) -> Self {
        Self {
            _id: ObjectId::parse_str(&ticket.id).ok(),
            status: ticket.status,
            lock,
            user_id: ticket.user_id.clone(),
            user_name: ticket.user_name.clone(),
            lang: ticket.lang.clone(),
            desc: ticket.desc.clone(),
            session: ticket.session.clone(),
            session_id: ticket.session_id.clone(),
            session_url: ticket.session_url.clone(),
            session_web_url: ticket.session_web_url.clone(),
            mentor_id: ticket.mentor.as_ref().map(|m| m.id.clone()),
            mentor_name: ticket.mentor.as_ref().map(|m| m.name.clone()),
            created: bson::DateTime::from_chrono(ticket.created),
            claimed: ticket.claimed.map(bson::DateTime::from_chrono),
            completed: ticket.completed.map(bson::DateTime::from_chrono),
            canceled: ticket.canceled.map(bson::DateTime::from_chrono),
            closed_at: ticket.terminal_at().map(bson::DateTime::from_chrono),
        }
    }

    pub fn to_ticket(&self) -> Result<Ticket> {
        let id = self
            ._id
            .ok_or_else(|| HelplineError::Database("Ticket document missing _id".into()))?;

        let mentor = match (&self.mentor_id, &self.mentor_name) {
            (Some(mentor_id), Some(mentor_name)) => Some(MentorRef {
                id: mentor_id.clone(),
                name: mentor_name.clone(),
            }),
            _ => None,
        };

        Ok(Ticket {
            id: id.to_hex(),
            status: self.status,
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
            lang: self.lang.clone(),
            desc: self.desc.clone(),
            session: self.session.clone(),
            session_id: self.session_id.clone(),
            session_url: self.session_url.clone(),
            session_web_url: self.session_web_url.clone(),
            mentor,
            created: self.created.to_chrono(),
            claimed: self.claimed.map(|d| d.to_chrono()),
            completed: self.completed.map(|d| d.to_chrono()),
            canceled: self.canceled.map(|d| d.to_chrono()),
        })
    }
}

impl IntoIndexes for TicketDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Open-ticket queries filter on status and sort by created
            (
                doc! { "status": 1, "created": 1 },
                Some(
                    IndexOptions::builder()
                        .name("status_created_index".to_string())
                        .build(),
                ),
            ),
            // Per-mentor open ticket lookups
            (
                doc! { "mentor_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("mentor_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::TicketEvent;
    use chrono::{DateTime as ChronoDateTime, Utc};

    fn whole_millis_now() -> ChronoDateTime<Utc> {
        // bson::DateTime has millisecond precision; keep fixtures exact
        ChronoDateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn ticket() -> Ticket {
        Ticket {
            id: ObjectId::new().to_hex(),
            status: TicketStatus::Requested,
            user_id: "U-1".to_string(),
            user_name: "Bo".to_string(),
            lang: Some("en".to_string()),
            desc: None,
            session: None,
            session_id: Some("S-9".to_string()),
            session_url: None,
            session_web_url: None,
            mentor: None,
            created: whole_millis_now(),
            claimed: None,
            completed: None,
            canceled: None,
        }
    }

    #[test]
    fn document_round_trip_preserves_the_ticket() {
        let original = ticket();
        let doc = TicketDoc::from_ticket(&original, 3);
        assert_eq!(doc.lock, 3);

        let back = doc.to_ticket().unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn unsaved_tickets_serialize_without_an_id() {
        let mut t = ticket();
        t.id = String::new();
        let doc = TicketDoc::from_ticket(&t, 0);
        assert!(doc._id.is_none());

        let bson = bson::to_document(&doc).unwrap();
        assert!(!bson.contains_key("_id"));
    }

    #[test]
    fn terminal_tickets_carry_a_closed_at_anchor() {
        let t = ticket();
        assert!(TicketDoc::from_ticket(&t, 0).closed_at.is_none());

        let canceled = t.apply(&TicketEvent::Cancel, whole_millis_now()).unwrap();
        let doc = TicketDoc::from_ticket(&canceled, 1);
        assert_eq!(doc.closed_at, doc.canceled);
        assert!(doc.closed_at.is_some());
    }

    #[test]
    fn mentor_pair_maps_to_a_mentor_ref() {
        let claimed = ticket()
            .apply(
                &TicketEvent::Claim(MentorRef {
                    id: "M-1".to_string(),
                    name: "Ava".to_string(),
                }),
                whole_millis_now(),
            )
            .unwrap();
        let doc = TicketDoc::from_ticket(&claimed, 1);
        assert_eq!(doc.mentor_id.as_deref(), Some("M-1"));
        assert_eq!(doc.mentor_name.as_deref(), Some("Ava"));

        let back = doc.to_ticket().unwrap();
        assert_eq!(back.mentor, claimed.mentor);
    }

    #[test]
    fn missing_id_is_a_database_error() {
        let mut t = ticket();
        t.id = String::new();
        let doc = TicketDoc::from_ticket(&t, 0);
        assert!(doc.to_ticket().is_err());
    }
}
