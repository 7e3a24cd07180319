//! MongoDB-backed mentor registry.
//!
//! Same contract as the in-memory registry, persisted in the `mentors`
//! collection next to the ticket documents.

use bson::doc;
use std::sync::Arc;

use crate::db::schemas::{MentorDoc, MENTOR_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::directory::UserDirectory;
use crate::mentors::{token, Mentor, MentorRegistry};
use crate::types::Result;

pub struct MongoMentorRegistry {
    mentors: MongoCollection<MentorDoc>,
    directory: Arc<dyn UserDirectory>,
}

impl MongoMentorRegistry {
    pub async fn new(client: &MongoClient, directory: Arc<dyn UserDirectory>) -> Result<Self> {
        Ok(Self {
            mentors: client.collection(MENTOR_COLLECTION).await?,
            directory,
        })
    }
}

#[async_trait::async_trait]
impl MentorRegistry for MongoMentorRegistry {
    async fn roster(&self) -> Result<Vec<Mentor>> {
        let mut mentors: Vec<Mentor> = self
            .mentors
            .find_many(doc! {})
            .await?
            .iter()
            .map(MentorDoc::to_mentor)
            .collect();
        mentors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(mentors)
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<Mentor>> {
        if token.is_empty() {
            return Ok(None);
        }
        Ok(self
            .mentors
            .find_one(doc! { "token": token })
            .await?
            .map(|d| d.to_mentor()))
    }

    async fn get_by_chat_id(&self, chat_user_id: &str) -> Result<Option<Mentor>> {
        Ok(self
            .mentors
            .find_one(doc! { "chat_user_id": chat_user_id })
            .await?
            .map(|d| d.to_mentor()))
    }

    async fn authorize(&self, user_id: &str) -> Result<Option<Mentor>> {
        let Some(user) = self.directory.lookup(user_id).await? else {
            return Ok(None);
        };

        if let Some(existing) = self.mentors.find_one(doc! { "user_id": &user.id }).await? {
            let mut mentor = existing.to_mentor();
            if mentor.token.is_none() {
                let fresh = token::access_token();
                self.mentors
                    .update_one(
                        doc! { "user_id": &user.id },
                        doc! { "$set": { "token": &fresh } },
                    )
                    .await?;
                mentor.token = Some(fresh);
            }
            return Ok(Some(mentor));
        }

        let mentor = Mentor {
            user_id: user.id.clone(),
            name: user.name,
            token: Some(token::access_token()),
            chat_user_id: None,
        };
        self.mentors
            .insert_one(&MentorDoc::from_mentor(&mentor))
            .await?;
        Ok(Some(mentor))
    }

    async fn unauthorize(&self, user_id: &str) -> Result<Option<Mentor>> {
        let Some(existing) = self.mentors.find_one(doc! { "user_id": user_id }).await? else {
            return Ok(None);
        };
        self.mentors
            .update_one(
                doc! { "user_id": user_id },
                doc! { "$unset": { "token": "" } },
            )
            .await?;
        let mut mentor = existing.to_mentor();
        mentor.token = None;
        Ok(Some(mentor))
    }
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running MongoDB instance; the
    // registry contract itself is exercised against the in-memory
    // implementation in mentors::memory.
}
