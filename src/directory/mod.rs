//! User directory access.
//!
//! Tickets and mentor records never trust client-supplied display names;
//! every user id is resolved against the platform directory. Production
//! talks to the directory REST API, dev mode and tests use the in-memory
//! [`StaticDirectory`].

pub mod api;
pub mod memory;
pub mod token_cache;

pub use api::{ApiUserDirectory, Credentials};
pub use memory::StaticDirectory;
pub use token_cache::{CachedToken, SingleFlightTokenCache};

use async_trait::async_trait;

use crate::types::Result;

/// A resolved directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    pub id: String,
    pub name: String,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve a user id. `Ok(None)` means the directory does not know the
    /// id; transport faults are `Err` and the ticket-create path downgrades
    /// them to a miss.
    async fn lookup(&self, user_id: &str) -> Result<Option<DirectoryUser>>;

    async fn healthy(&self) -> bool;
}
