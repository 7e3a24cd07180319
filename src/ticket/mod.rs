//! Ticket domain model and wire representations.

pub mod dto;
pub mod model;

pub use dto::{MentorTicketDto, PayloadFormat, TicketDto};
pub use model::{MentorRef, Ticket, TicketEvent, TicketStatus};
