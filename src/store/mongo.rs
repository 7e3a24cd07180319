//! MongoDB ticket store.
//!
//! Tickets are documents; concurrency is optimistic. Every document
//! carries a numeric `lock` that each write bumps, and transitions replace
//! the document conditioned on the lock value they read. No in-process
//! lock is taken, so the scheme holds across multiple service instances
//! sharing one database.

use bson::{doc, oid::ObjectId};
use chrono::Utc;
use mongodb::options::IndexOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::db::schemas::{TicketDoc, TICKET_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::directory::UserDirectory;
use crate::hub::NotificationHub;
use crate::store::{TicketCreate, TicketStore, TransitionResult};
use crate::ticket::{Ticket, TicketEvent};
use crate::types::Result;

pub struct MongoTicketStore {
    client: MongoClient,
    tickets: MongoCollection<TicketDoc>,
    hub: Arc<NotificationHub>,
    directory: Arc<dyn UserDirectory>,
}

impl MongoTicketStore {
    pub async fn new(
        client: &MongoClient,
        hub: Arc<NotificationHub>,
        directory: Arc<dyn UserDirectory>,
        retention: Duration,
    ) -> Result<Self> {
        let tickets = client.collection::<TicketDoc>(TICKET_COLLECTION).await?;

        // Terminal tickets age out; the TTL window is deployment
        // configuration, so the index is built here rather than in the
        // schema.
        tickets
            .create_index(
                doc! { "closed_at": 1 },
                Some(
                    IndexOptions::builder()
                        .expire_after(retention)
                        .name("closed_at_ttl".to_string())
                        .build(),
                ),
            )
            .await?;

        Ok(Self {
            client: client.clone(),
            tickets,
            hub,
            directory,
        })
    }
}

#[async_trait::async_trait]
impl TicketStore for MongoTicketStore {
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

        let mut ticket = args.into_ticket(String::new(), &user, Utc::now());
        let id = self
            .tickets
            .insert_one(&TicketDoc::from_ticket(&ticket, 0))
            .await?;
        ticket.id = id.to_hex();

        self.hub.publish_created(&ticket);
        Ok(Some(ticket))
    }

    async fn get(&self, ticket_id: &str) -> Result<Option<Ticket>> {
        let Ok(oid) = ObjectId::parse_str(ticket_id) else {
            return Ok(None);
        };
        match self.tickets.find_one(doc! { "_id": oid }).await? {
            Some(existing) => Ok(Some(existing.to_ticket()?)),
            None => Ok(None),
        }
    }

    async fn transition(
        &self,
        ticket_id: &str,
        event: TicketEvent,
    ) -> Result<TransitionResult> {
        let Ok(oid) = ObjectId::parse_str(ticket_id) else {
            return Ok(TransitionResult::NotFound);
        };

        // Read, apply the guard, replace conditioned on the lock we read.
        // One retry absorbs a single racing writer.
        for _ in 0..2 {
            let Some(existing) = self.tickets.find_one(doc! { "_id": oid }).await? else {
                return Ok(TransitionResult::NotFound);
            };
            let current = existing.to_ticket()?;
            let Some(next) = current.apply(&event, Utc::now()) else {
                return Ok(TransitionResult::Rejected(current));
            };

            let replacement = TicketDoc::from_ticket(&next, existing.lock + 1);
            let result = self
                .tickets
                .replace_one(doc! { "_id": oid, "lock": existing.lock }, &replacement)
                .await?;
            if result.modified_count == 1 {
                self.hub.publish_updated(&next);
                return Ok(TransitionResult::Updated(next));
            }
        }

        // Conflicted twice; whatever is stored now is the answer.
        match self.tickets.find_one(doc! { "_id": oid }).await? {
            Some(existing) => Ok(TransitionResult::Rejected(existing.to_ticket()?)),
            None => Ok(TransitionResult::NotFound),
        }
    }

    async fn open_tickets(&self) -> Result<Vec<Ticket>> {
        let docs = self
            .tickets
            .find_many(doc! { "status": { "$in": ["requested", "responding"] } })
            .await?;
        let mut open = Vec::with_capacity(docs.len());
        for existing in &docs {
            open.push(existing.to_ticket()?);
        }
        open.sort_by_key(|ticket| ticket.created);
        Ok(open)
    }

    async fn healthy(&self) -> bool {
        self.client.ping().await.is_ok()
    }

    fn backend(&self) -> &'static str {
        "mongo"
    }
}
