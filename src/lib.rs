//! Helpline - mentor helpline ticket gateway
//!
//! Helpline gives mentees a live line to a pool of mentors. A mentee opens
//! a ticket, mentors see it instantly over their queue socket, one claims
//! it, and both sides follow the ticket through to completion.
//!
//! ## Services
//!
//! - **Tickets**: REST and WebSocket access to the ticket queue
//! - **Hub**: in-process fan-out of ticket changes to live sessions
//! - **Stores**: interchangeable persistence, MongoDB or a chat channel
//! - **Mentors**: roster, access tokens, chat reaction bridge
//! - **Directory**: external user verification with cached service tokens

pub mod chat;
pub mod config;
pub mod db;
pub mod directory;
pub mod hub;
pub mod mentors;
pub mod routes;
pub mod server;
pub mod session;
pub mod store;
pub mod ticket;
pub mod types;

pub use config::Args;
pub use hub::{NotificationHub, Subscription};
pub use server::{run, AppState};
pub use types::{HelplineError, Result};
