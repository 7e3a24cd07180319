//! Database schemas for Helpline
//!
//! Defines MongoDB document structures for tickets and mentors.

mod mentor;
mod ticket;

pub use mentor::{MentorDoc, MENTOR_COLLECTION};
pub use ticket::{TicketDoc, TICKET_COLLECTION};
