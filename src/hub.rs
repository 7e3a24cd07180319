//! In-process ticket notification hub.
//!
//! Three feeds: ticket-added (fired once per created ticket), all-updates
//! (every state change on every ticket), and per-ticket (state changes for
//! one ticket id). Stores publish after persisting; sessions subscribe.
//!
//! Handlers are plain sync callbacks. Fan-out snapshots the handler set
//! before invoking, so a handler may subscribe or unsubscribe (itself
//! included) without deadlocking the publish, and a subscriber added while
//! an event is in flight does not receive that event.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::ticket::Ticket;

type Handler = Arc<dyn Fn(&Ticket) + Send + Sync>;

/// Opaque receipt for one subscription. Dropping it does not unsubscribe;
/// hand it back to [`NotificationHub::unsubscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    target: Target,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Added(u64),
    AllUpdates(u64),
    Ticket(String, u64),
}

#[derive(Default)]
pub struct NotificationHub {
    added: DashMap<u64, Handler>,
    updates: DashMap<u64, Handler>,
    tickets: DashMap<String, BTreeMap<u64, Handler>>,
    next_id: AtomicU64,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hear about every newly created ticket.
    pub fn subscribe_added<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Ticket) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.added.insert(id, Arc::new(handler));
        Subscription {
            target: Target::Added(id),
        }
    }

    /// Hear about every state change on every ticket.
    pub fn subscribe_all_updates<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Ticket) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.updates.insert(id, Arc::new(handler));
        Subscription {
            target: Target::AllUpdates(id),
        }
    }

    /// Hear about state changes on one ticket.
    pub fn subscribe_ticket<F>(&self, ticket_id: &str, handler: F) -> Subscription
    where
        F: Fn(&Ticket) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.tickets
            .entry(ticket_id.to_string())
            .or_default()
            .insert(id, Arc::new(handler));
        Subscription {
            target: Target::Ticket(ticket_id.to_string(), id),
        }
    }

    /// Remove a subscription. Unknown or already-removed receipts are
    /// ignored.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        match &subscription.target {
            Target::Added(id) => {
                self.added.remove(id);
            }
            Target::AllUpdates(id) => {
                self.updates.remove(id);
            }
            Target::Ticket(ticket_id, id) => {
                let now_empty = match self.tickets.get_mut(ticket_id) {
                    Some(mut handlers) => {
                        handlers.remove(id);
                        handlers.is_empty()
                    }
                    None => false,
                };
                // Entry guard is released above; re-check emptiness so a
                // racing subscribe is not thrown away.
                if now_empty {
                    self.tickets.remove_if(ticket_id, |_, handlers| handlers.is_empty());
                }
            }
        }
    }

    /// Notify the ticket-added feed of a newly persisted ticket.
    pub fn publish_created(&self, ticket: &Ticket) {
        for handler in self.snapshot_added() {
            handler(ticket);
        }
    }

    /// Notify the all-updates feed and the ticket's own feed of a state
    /// change.
    pub fn publish_updated(&self, ticket: &Ticket) {
        for handler in self.snapshot_updates() {
            handler(ticket);
        }
        for handler in self.snapshot_ticket(&ticket.id) {
            handler(ticket);
        }
    }

    fn snapshot_added(&self) -> Vec<Handler> {
        self.added.iter().map(|entry| entry.value().clone()).collect()
    }

    fn snapshot_updates(&self) -> Vec<Handler> {
        self.updates.iter().map(|entry| entry.value().clone()).collect()
    }

    fn snapshot_ticket(&self, ticket_id: &str) -> Vec<Handler> {
        self.tickets
            .get(ticket_id)
            .map(|handlers| handlers.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::{TicketEvent, TicketStatus};
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn ticket(id: &str) -> Ticket {
        Ticket {
            id: id.to_string(),
            status: TicketStatus::Requested,
            user_id: "U-1".to_string(),
            user_name: "Bo".to_string(),
            lang: None,
            desc: None,
            session: None,
            session_id: None,
            session_url: None,
            session_web_url: None,
            mentor: None,
            created: Utc::now(),
            claimed: None,
            completed: None,
            canceled: None,
        }
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&Ticket) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let cloned = Arc::clone(&count);
        (count, move |_: &Ticket| {
            cloned.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn added_feed_sees_created_tickets_only() {
        let hub = NotificationHub::new();
        let (created, on_created) = counter();
        let _sub = hub.subscribe_added(on_created);

        hub.publish_created(&ticket("T-1"));
        hub.publish_updated(&ticket("T-1"));

        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn per_ticket_feed_is_isolated_by_id() {
        let hub = NotificationHub::new();
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = hub.subscribe_ticket("T-1", move |t| {
            sink.lock().unwrap().push(t.id.clone());
        });

        hub.publish_updated(&ticket("T-1"));
        hub.publish_updated(&ticket("T-2"));
        hub.publish_updated(&ticket("T-1"));

        assert_eq!(*seen.lock().unwrap(), vec!["T-1", "T-1"]);
    }

    #[test]
    fn all_updates_feed_hears_every_ticket() {
        let hub = NotificationHub::new();
        let (updates, on_update) = counter();
        let _sub = hub.subscribe_all_updates(on_update);

        hub.publish_updated(&ticket("T-1"));
        hub.publish_updated(&ticket("T-2"));

        assert_eq!(updates.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn every_subscriber_on_a_ticket_is_notified() {
        let hub = NotificationHub::new();
        let (first, on_first) = counter();
        let (second, on_second) = counter();
        let _a = hub.subscribe_ticket("T-1", on_first);
        let _b = hub.subscribe_ticket("T-1", on_second);

        hub.publish_updated(&ticket("T-1"));

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_leaves_other_subscribers_intact() {
        let hub = NotificationHub::new();
        let (first, on_first) = counter();
        let (second, on_second) = counter();
        let a = hub.subscribe_ticket("T-1", on_first);
        let b = hub.subscribe_ticket("T-1", on_second);

        hub.unsubscribe(&a);
        hub.publish_updated(&ticket("T-1"));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        // Removing in the other order as well.
        hub.unsubscribe(&b);
        hub.publish_updated(&ticket("T-1"));
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn double_unsubscribe_is_harmless() {
        let hub = NotificationHub::new();
        let (count, on_update) = counter();
        let sub = hub.subscribe_all_updates(on_update);

        hub.unsubscribe(&sub);
        hub.unsubscribe(&sub);
        hub.publish_updated(&ticket("T-1"));

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn resubscribing_after_unsubscribe_delivers_again() {
        let hub = NotificationHub::new();
        let (count, on_update) = counter();
        let sub = hub.subscribe_ticket("T-1", on_update);
        hub.unsubscribe(&sub);

        let (count_again, on_update_again) = counter();
        let _sub = hub.subscribe_ticket("T-1", on_update_again);
        hub.publish_updated(&ticket("T-1"));

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(count_again.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let hub = NotificationHub::new();
        hub.publish_created(&ticket("T-1"));
        hub.publish_updated(&ticket("T-1"));
    }

    #[test]
    fn handler_may_unsubscribe_itself_during_fan_out() {
        let hub = Arc::new(NotificationHub::new());
        let (count, _) = counter();

        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let hub_in_handler = Arc::clone(&hub);
        let slot_in_handler = Arc::clone(&slot);
        let count_in_handler = Arc::clone(&count);
        let sub = hub.subscribe_ticket("T-1", move |_| {
            count_in_handler.fetch_add(1, Ordering::SeqCst);
            if let Some(receipt) = slot_in_handler.lock().unwrap().take() {
                hub_in_handler.unsubscribe(&receipt);
            }
        });
        *slot.lock().unwrap() = Some(sub);

        // First publish runs the handler once (it removes itself mid
        // fan-out); the second finds nothing.
        hub.publish_updated(&ticket("T-1"));
        hub.publish_updated(&ticket("T-1"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn transitioned_snapshots_flow_through_untouched() {
        let hub = NotificationHub::new();
        let seen: Arc<Mutex<Vec<TicketStatus>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = hub.subscribe_ticket("T-1", move |t| {
            sink.lock().unwrap().push(t.status);
        });

        let t = ticket("T-1");
        let canceled = t.apply(&TicketEvent::Cancel, Utc::now()).unwrap();
        hub.publish_updated(&canceled);

        assert_eq!(*seen.lock().unwrap(), vec![TicketStatus::Canceled]);
    }
}
