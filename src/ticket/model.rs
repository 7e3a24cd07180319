//! Ticket state machine.
//!
//! A ticket is the unit of work in the helpline: a mentee's request for
//! help, the mentor who answered it, and the timestamps that tell the
//! story. All state changes go through [`Ticket::apply`], a pure guarded
//! transition shared by every store backend. A guard failure is not an
//! error; it returns `None` and the caller reports the unchanged snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a ticket.
///
/// requested -> responding -> completed
///     |    <-      |
///     +----> canceled <----+
///
/// `completed` and `canceled` are terminal: no event moves a ticket out of
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Requested,
    Responding,
    Completed,
    Canceled,
}

impl TicketStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Completed | TicketStatus::Canceled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Requested => "requested",
            TicketStatus::Responding => "responding",
            TicketStatus::Completed => "completed",
            TicketStatus::Canceled => "canceled",
        }
    }

    pub fn parse(value: &str) -> Option<TicketStatus> {
        match value {
            "requested" => Some(TicketStatus::Requested),
            "responding" => Some(TicketStatus::Responding),
            "completed" => Some(TicketStatus::Completed),
            "canceled" => Some(TicketStatus::Canceled),
            _ => None,
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mentor currently attached to a ticket, as recorded on the ticket
/// itself. Kept small on purpose: the registry owns the full mentor record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentorRef {
    pub id: String,
    pub name: String,
}

/// A help request and everything that has happened to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    /// Store-assigned identifier. Opaque to the domain: an ObjectId hex
    /// string for the mongo backend, a chat message id for the channel
    /// backend.
    pub id: String,
    pub status: TicketStatus,
    pub user_id: String,
    pub user_name: String,
    pub lang: Option<String>,
    pub desc: Option<String>,
    pub session: Option<String>,
    pub session_id: Option<String>,
    pub session_url: Option<String>,
    pub session_web_url: Option<String>,
    pub mentor: Option<MentorRef>,
    pub created: DateTime<Utc>,
    pub claimed: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,
    pub canceled: Option<DateTime<Utc>>,
}

/// Requested state changes. Mentor-scoped events carry the acting mentor so
/// the guard can check them against the mentor on file.
#[derive(Debug, Clone, PartialEq)]
pub enum TicketEvent {
    /// Take ownership of an unclaimed ticket.
    Claim(MentorRef),
    /// Release a claim and put the ticket back in the queue.
    Unclaim { mentor_id: String },
    /// Mark a claimed ticket as resolved.
    Complete { mentor_id: String },
    /// Withdraw the request. No actor guard: mentees cancel their own
    /// tickets and the session layer scoped the socket to one ticket.
    Cancel,
}

impl Ticket {
    /// Apply `event`, returning the successor ticket or `None` when the
    /// guard refuses. Terminal tickets refuse everything, which also makes
    /// repeated completes/cancels harmless.
    pub fn apply(&self, event: &TicketEvent, now: DateTime<Utc>) -> Option<Ticket> {
        match event {
            TicketEvent::Claim(mentor) if self.status == TicketStatus::Requested => {
                let mut next = self.clone();
                next.status = TicketStatus::Responding;
                next.mentor = Some(mentor.clone());
                next.claimed = Some(now);
                Some(next)
            }
            TicketEvent::Unclaim { mentor_id }
                if self.status == TicketStatus::Responding && self.is_mentor(mentor_id) =>
            {
                let mut next = self.clone();
                next.status = TicketStatus::Requested;
                next.mentor = None;
                next.claimed = None;
                Some(next)
            }
            TicketEvent::Complete { mentor_id }
                if self.status == TicketStatus::Responding && self.is_mentor(mentor_id) =>
            {
                let mut next = self.clone();
                next.status = TicketStatus::Completed;
                next.completed = Some(now);
                Some(next)
            }
            TicketEvent::Cancel if !self.status.is_terminal() => {
                let mut next = self.clone();
                next.status = TicketStatus::Canceled;
                // The claim timestamp stays as history; the mentor snapshot
                // does not survive into a canceled ticket.
                next.mentor = None;
                next.canceled = Some(now);
                Some(next)
            }
            _ => None,
        }
    }

    /// When the ticket reached a terminal state, if it has.
    pub fn terminal_at(&self) -> Option<DateTime<Utc>> {
        self.completed.or(self.canceled)
    }

    fn is_mentor(&self, mentor_id: &str) -> bool {
        self.mentor.as_ref().is_some_and(|m| m.id == mentor_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mentor() -> MentorRef {
        MentorRef {
            id: "M-1".to_string(),
            name: "Ava".to_string(),
        }
    }

    fn requested() -> Ticket {
        Ticket {
            id: "T-1".to_string(),
            status: TicketStatus::Requested,
            user_id: "U-1".to_string(),
            user_name: "Bo".to_string(),
            lang: Some("en".to_string()),
            desc: Some("lost in the tutorial".to_string()),
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

    /// Every ticket the machine can produce must satisfy: mentor is present
    /// exactly in responding/completed, and at most one terminal timestamp
    /// is set, matching the status.
    fn assert_consistent(ticket: &Ticket) {
        match ticket.status {
            TicketStatus::Requested => {
                assert!(ticket.mentor.is_none());
                assert!(ticket.claimed.is_none());
            }
            TicketStatus::Responding => {
                assert!(ticket.mentor.is_some());
                assert!(ticket.claimed.is_some());
            }
            TicketStatus::Completed => {
                assert!(ticket.mentor.is_some());
                assert!(ticket.completed.is_some());
                assert!(ticket.canceled.is_none());
            }
            TicketStatus::Canceled => {
                assert!(ticket.mentor.is_none());
                assert!(ticket.canceled.is_some());
                assert!(ticket.completed.is_none());
            }
        }
    }

    #[test]
    fn claim_moves_requested_to_responding() {
        let now = Utc::now();
        let ticket = requested();
        let next = ticket.apply(&TicketEvent::Claim(mentor()), now).unwrap();
        assert_eq!(next.status, TicketStatus::Responding);
        assert_eq!(next.mentor.as_ref().unwrap().name, "Ava");
        assert_eq!(next.claimed, Some(now));
        assert_consistent(&next);
    }

    #[test]
    fn claim_refused_when_already_claimed() {
        let ticket = requested();
        let claimed = ticket.apply(&TicketEvent::Claim(mentor()), Utc::now()).unwrap();
        let other = MentorRef {
            id: "M-2".to_string(),
            name: "Cy".to_string(),
        };
        assert!(claimed.apply(&TicketEvent::Claim(other), Utc::now()).is_none());
    }

    #[test]
    fn unclaim_restores_requested_and_clears_claim() {
        let ticket = requested();
        let claimed = ticket.apply(&TicketEvent::Claim(mentor()), Utc::now()).unwrap();
        let back = claimed
            .apply(
                &TicketEvent::Unclaim {
                    mentor_id: "M-1".to_string(),
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(back.status, TicketStatus::Requested);
        assert!(back.mentor.is_none());
        assert!(back.claimed.is_none());
        assert_consistent(&back);
    }

    #[test]
    fn unclaim_refused_for_other_mentor() {
        let ticket = requested();
        let claimed = ticket.apply(&TicketEvent::Claim(mentor()), Utc::now()).unwrap();
        let refused = claimed.apply(
            &TicketEvent::Unclaim {
                mentor_id: "M-2".to_string(),
            },
            Utc::now(),
        );
        assert!(refused.is_none());
    }

    #[test]
    fn complete_requires_claiming_mentor() {
        let ticket = requested();
        let claimed = ticket.apply(&TicketEvent::Claim(mentor()), Utc::now()).unwrap();

        assert!(claimed
            .apply(
                &TicketEvent::Complete {
                    mentor_id: "M-2".to_string()
                },
                Utc::now()
            )
            .is_none());

        let done = claimed
            .apply(
                &TicketEvent::Complete {
                    mentor_id: "M-1".to_string(),
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(done.status, TicketStatus::Completed);
        // Completion keeps the mentor and claim time on record.
        assert!(done.mentor.is_some());
        assert!(done.claimed.is_some());
        assert_consistent(&done);
    }

    #[test]
    fn complete_refused_without_claim() {
        let ticket = requested();
        assert!(ticket
            .apply(
                &TicketEvent::Complete {
                    mentor_id: "M-1".to_string()
                },
                Utc::now()
            )
            .is_none());
    }

    #[test]
    fn cancel_from_requested() {
        let ticket = requested();
        let gone = ticket.apply(&TicketEvent::Cancel, Utc::now()).unwrap();
        assert_eq!(gone.status, TicketStatus::Canceled);
        assert!(gone.canceled.is_some());
        assert_consistent(&gone);
    }

    #[test]
    fn cancel_from_responding_clears_mentor_keeps_claim_time() {
        let ticket = requested();
        let claimed = ticket.apply(&TicketEvent::Claim(mentor()), Utc::now()).unwrap();
        let claim_time = claimed.claimed;
        let gone = claimed.apply(&TicketEvent::Cancel, Utc::now()).unwrap();
        assert_eq!(gone.status, TicketStatus::Canceled);
        assert!(gone.mentor.is_none());
        assert_eq!(gone.claimed, claim_time);
        assert_consistent(&gone);
    }

    #[test]
    fn terminal_states_refuse_everything() {
        let ticket = requested();
        let claimed = ticket.apply(&TicketEvent::Claim(mentor()), Utc::now()).unwrap();
        let done = claimed
            .apply(
                &TicketEvent::Complete {
                    mentor_id: "M-1".to_string(),
                },
                Utc::now(),
            )
            .unwrap();
        let canceled = ticket.apply(&TicketEvent::Cancel, Utc::now()).unwrap();

        for terminal in [&done, &canceled] {
            assert!(terminal.apply(&TicketEvent::Claim(mentor()), Utc::now()).is_none());
            assert!(terminal
                .apply(
                    &TicketEvent::Unclaim {
                        mentor_id: "M-1".to_string()
                    },
                    Utc::now()
                )
                .is_none());
            assert!(terminal
                .apply(
                    &TicketEvent::Complete {
                        mentor_id: "M-1".to_string()
                    },
                    Utc::now()
                )
                .is_none());
            assert!(terminal.apply(&TicketEvent::Cancel, Utc::now()).is_none());
        }
    }

    #[test]
    fn terminal_at_reflects_the_one_terminal_timestamp() {
        let ticket = requested();
        assert!(ticket.terminal_at().is_none());

        let canceled = ticket.apply(&TicketEvent::Cancel, Utc::now()).unwrap();
        assert_eq!(canceled.terminal_at(), canceled.canceled);

        let claimed = ticket.apply(&TicketEvent::Claim(mentor()), Utc::now()).unwrap();
        let done = claimed
            .apply(
                &TicketEvent::Complete {
                    mentor_id: "M-1".to_string(),
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(done.terminal_at(), done.completed);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            TicketStatus::Requested,
            TicketStatus::Responding,
            TicketStatus::Completed,
            TicketStatus::Canceled,
        ] {
            assert_eq!(TicketStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TicketStatus::parse("resolved"), None);
    }
}
