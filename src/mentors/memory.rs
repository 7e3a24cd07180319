//! In-memory mentor registry.
//!
//! Used by the channel backend and dev mode. Optionally seeded from a JSON
//! file (an array of mentor records) so a dev setup can have working
//! mentor tokens without an admin round trip.

use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;

use crate::directory::UserDirectory;
use crate::mentors::{token, Mentor, MentorRegistry};
use crate::types::{HelplineError, Result};

pub struct InMemoryMentorRegistry {
    directory: Arc<dyn UserDirectory>,
    mentors: DashMap<String, Mentor>,
}

impl InMemoryMentorRegistry {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            directory,
            mentors: DashMap::new(),
        }
    }

    pub fn from_file(path: &Path, directory: Arc<dyn UserDirectory>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let seeded: Vec<Mentor> = serde_json::from_str(&raw).map_err(|e| {
            HelplineError::Config(format!("mentors file {} is invalid: {}", path.display(), e))
        })?;
        let registry = Self::new(directory);
        for mentor in seeded {
            registry.mentors.insert(mentor.user_id.clone(), mentor);
        }
        Ok(registry)
    }

    #[cfg(test)]
    pub fn insert(&self, mentor: Mentor) {
        self.mentors.insert(mentor.user_id.clone(), mentor);
    }
}

#[async_trait::async_trait]
impl MentorRegistry for InMemoryMentorRegistry {
    async fn roster(&self) -> Result<Vec<Mentor>> {
        let mut mentors: Vec<Mentor> =
            self.mentors.iter().map(|entry| entry.value().clone()).collect();
        mentors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(mentors)
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<Mentor>> {
        if token.is_empty() {
            return Ok(None);
        }
        Ok(self
            .mentors
            .iter()
            .find(|entry| entry.value().token.as_deref() == Some(token))
            .map(|entry| entry.value().clone()))
    }

    async fn get_by_chat_id(&self, chat_user_id: &str) -> Result<Option<Mentor>> {
        Ok(self
            .mentors
            .iter()
            .find(|entry| entry.value().chat_user_id.as_deref() == Some(chat_user_id))
            .map(|entry| entry.value().clone()))
    }

    async fn authorize(&self, user_id: &str) -> Result<Option<Mentor>> {
        // The id must still resolve in the directory, even for a mentor we
        // already know.
        let Some(user) = self.directory.lookup(user_id).await? else {
            return Ok(None);
        };

        let mut entry = self
            .mentors
            .entry(user.id.clone())
            .or_insert_with(|| Mentor {
                user_id: user.id.clone(),
                name: user.name.clone(),
                token: None,
                chat_user_id: None,
            });
        if entry.token.is_none() {
            entry.token = Some(token::access_token());
        }
        Ok(Some(entry.clone()))
    }

    async fn unauthorize(&self, user_id: &str) -> Result<Option<Mentor>> {
        match self.mentors.get_mut(user_id) {
            Some(mut mentor) => {
                mentor.token = None;
                Ok(Some(mentor.clone()))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;

    fn registry() -> InMemoryMentorRegistry {
        let directory = StaticDirectory::new();
        directory.insert("M-1", "Ava");
        InMemoryMentorRegistry::new(Arc::new(directory))
    }

    #[tokio::test]
    async fn authorize_requires_a_directory_hit() {
        let registry = registry();
        assert!(registry.authorize("nobody").await.unwrap().is_none());
        assert!(registry.roster().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn authorize_issues_a_token_once() {
        let registry = registry();

        let first = registry.authorize("M-1").await.unwrap().unwrap();
        let token = first.token.clone().unwrap();
        assert_eq!(first.name, "Ava");
        assert_eq!(token.len(), 107);

        // Authorizing again keeps the existing token.
        let second = registry.authorize("M-1").await.unwrap().unwrap();
        assert_eq!(second.token.as_deref(), Some(token.as_str()));

        let by_token = registry.get_by_token(&token).await.unwrap().unwrap();
        assert_eq!(by_token.user_id, "M-1");
    }

    #[tokio::test]
    async fn unauthorize_revokes_and_reauthorize_rotates() {
        let registry = registry();
        let token = registry
            .authorize("M-1")
            .await
            .unwrap()
            .unwrap()
            .token
            .unwrap();

        let revoked = registry.unauthorize("M-1").await.unwrap().unwrap();
        assert!(revoked.token.is_none());
        assert!(registry.get_by_token(&token).await.unwrap().is_none());

        // Revoked mentors stay on the roster.
        assert_eq!(registry.roster().await.unwrap().len(), 1);

        let fresh = registry.authorize("M-1").await.unwrap().unwrap();
        assert_ne!(fresh.token.as_deref(), Some(token.as_str()));
        assert!(fresh.token.is_some());
    }

    #[tokio::test]
    async fn unauthorize_unknown_mentor_is_a_miss() {
        let registry = registry();
        assert!(registry.unauthorize("M-9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_token_never_authenticates() {
        let registry = registry();
        registry.insert(Mentor {
            user_id: "M-2".to_string(),
            name: "Cy".to_string(),
            token: None,
            chat_user_id: None,
        });
        assert!(registry.get_by_token("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn chat_id_resolution() {
        let registry = registry();
        registry.insert(Mentor {
            user_id: "M-2".to_string(),
            name: "Cy".to_string(),
            token: Some("tok".to_string()),
            chat_user_id: Some("chat-77".to_string()),
        });

        let hit = registry.get_by_chat_id("chat-77").await.unwrap().unwrap();
        assert_eq!(hit.user_id, "M-2");
        assert!(registry.get_by_chat_id("chat-00").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn seed_file_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "helpline-mentors-{}.json",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(
            &path,
            r#"[{"userId":"M-1","name":"Ava","token":"seed-token","chatUserId":"chat-1"}]"#,
        )
        .unwrap();

        let directory = StaticDirectory::new();
        let registry =
            InMemoryMentorRegistry::from_file(&path, Arc::new(directory)).unwrap();
        std::fs::remove_file(&path).ok();

        let seeded = registry.get_by_token("seed-token").await.unwrap().unwrap();
        assert_eq!(seeded.user_id, "M-1");
        assert_eq!(seeded.chat_user_id.as_deref(), Some("chat-1"));
    }
}
