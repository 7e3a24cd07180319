//! Mentor document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::mentors::Mentor;

/// Collection name for mentors
pub const MENTOR_COLLECTION: &str = "mentors";

/// Mentor document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MentorDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Directory user id; the public identity of the mentor
    pub user_id: String,

    /// Display name as resolved from the directory at authorization time
    pub name: String,

    /// Access token; None once revoked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Chat identity for reaction handling (channel backend)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_user_id: Option<String>,

    pub created_at: bson::DateTime,
}

impl MentorDoc {
    pub fn from_mentor(mentor: &Mentor) -> Self {
        Self {
            _id: None,
            user_id: mentor.user_id.clone(),
            name: mentor.name.clone(),
            token: mentor.token.clone(),
            chat_user_id: mentor.chat_user_id.clone(),
            created_at: bson::DateTime::now(),
        }
    }

    pub fn to_mentor(&self) -> Mentor {
        Mentor {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            token: self.token.clone(),
            chat_user_id: self.chat_user_id.clone(),
        }
    }
}

impl IntoIndexes for MentorDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // One registry entry per directory user
            (
                doc! { "user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("user_id_unique".to_string())
                        .build(),
                ),
            ),
            // Token lookups on every mentor request; sparse because
            // revoked mentors have no token
            (
                doc! { "token": 1 },
                Some(
                    IndexOptions::builder()
                        .sparse(true)
                        .name("token_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentor_round_trip() {
        let mentor = Mentor {
            user_id: "M-1".to_string(),
            name: "Ava".to_string(),
            token: Some("tok".to_string()),
            chat_user_id: Some("chat-1".to_string()),
        };
        let doc = MentorDoc::from_mentor(&mentor);
        assert!(doc._id.is_none());

        let back = doc.to_mentor();
        assert_eq!(back.user_id, mentor.user_id);
        assert_eq!(back.token, mentor.token);
        assert_eq!(back.chat_user_id, mentor.chat_user_id);
    }

    #[test]
    fn revoked_token_is_omitted_from_the_document() {
        let mentor = Mentor {
            user_id: "M-1".to_string(),
            name: "Ava".to_string(),
            token: None,
            chat_user_id: None,
        };
        let bson = bson::to_document(&MentorDoc::from_mentor(&mentor)).unwrap();
        assert!(!bson.contains_key("token"));
    }
}
