//! Mentor registry.
//!
//! Mentors are authorized by an admin, at which point they receive an
//! opaque access token. The token is the only credential the mentor
//! surfaces accept; revoking access just clears it. Registry storage
//! follows the ticket store backend: MongoDB in production, in-memory for
//! the channel backend and dev mode.

pub mod memory;
pub mod mongo;
pub mod token;

pub use memory::InMemoryMentorRegistry;
pub use mongo::MongoMentorRegistry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ticket::MentorRef;
use crate::types::Result;

/// A registered mentor. `token` is None for mentors whose access was
/// revoked; `chat_user_id` links reactions in the chat channel back to the
/// mentor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mentor {
    pub user_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_user_id: Option<String>,
}

impl Mentor {
    pub fn mentor_ref(&self) -> MentorRef {
        MentorRef {
            id: self.user_id.clone(),
            name: self.name.clone(),
        }
    }

    /// Roster/self view. Tokens never appear here.
    pub fn to_dto(&self) -> MentorDto {
        MentorDto {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            token: None,
        }
    }

    /// The one response that carries the token: the admin's authorize
    /// call, so it can be handed to the mentor.
    pub fn to_authorized_dto(&self) -> MentorDto {
        MentorDto {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            token: self.token.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MentorDto {
    pub user_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[async_trait]
pub trait MentorRegistry: Send + Sync {
    /// All registered mentors, revoked ones included.
    async fn roster(&self) -> Result<Vec<Mentor>>;

    /// Resolve an access token. Empty tokens never match.
    async fn get_by_token(&self, token: &str) -> Result<Option<Mentor>>;

    /// Resolve a chat identity (reaction events carry those).
    async fn get_by_chat_id(&self, chat_user_id: &str) -> Result<Option<Mentor>>;

    /// Grant mentor access. The user id must resolve in the directory
    /// (`Ok(None)` when it does not). An existing mentor keeps their
    /// token; one whose token was revoked gets a fresh one.
    async fn authorize(&self, user_id: &str) -> Result<Option<Mentor>>;

    /// Revoke access by clearing the token. `Ok(None)` for unknown ids.
    async fn unauthorize(&self, user_id: &str) -> Result<Option<Mentor>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_dto_never_serializes_a_token() {
        let mentor = Mentor {
            user_id: "M-1".to_string(),
            name: "Ava".to_string(),
            token: Some("super-secret".to_string()),
            chat_user_id: None,
        };

        let roster = serde_json::to_string(&mentor.to_dto()).unwrap();
        assert!(!roster.contains("super-secret"));
        assert!(roster.contains("\"userId\":\"M-1\""));

        let authorized = serde_json::to_string(&mentor.to_authorized_dto()).unwrap();
        assert!(authorized.contains("\"token\":\"super-secret\""));
    }
}
