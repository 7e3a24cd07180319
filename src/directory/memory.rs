//! In-memory user directory for dev mode and tests.

use dashmap::DashMap;

use crate::directory::{DirectoryUser, UserDirectory};
use crate::types::Result;

/// Seeded map of known users. In permissive mode unknown ids resolve to
/// themselves, which is what dev mode wants when no directory is running.
#[derive(Default)]
pub struct StaticDirectory {
    users: DashMap<String, String>,
    permissive: bool,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn permissive() -> Self {
        Self {
            users: DashMap::new(),
            permissive: true,
        }
    }

    pub fn insert(&self, user_id: &str, name: &str) {
        self.users.insert(user_id.to_string(), name.to_string());
    }
}

#[async_trait::async_trait]
impl UserDirectory for StaticDirectory {
    async fn lookup(&self, user_id: &str) -> Result<Option<DirectoryUser>> {
        if let Some(name) = self.users.get(user_id) {
            return Ok(Some(DirectoryUser {
                id: user_id.to_string(),
                name: name.clone(),
            }));
        }
        if self.permissive && !user_id.is_empty() {
            return Ok(Some(DirectoryUser {
                id: user_id.to_string(),
                name: user_id.to_string(),
            }));
        }
        Ok(None)
    }

    async fn healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_lookup_and_miss() {
        let dir = StaticDirectory::new();
        dir.insert("U-1", "Bo");

        let hit = dir.lookup("U-1").await.unwrap().unwrap();
        assert_eq!(hit.name, "Bo");
        assert!(dir.lookup("U-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn permissive_mode_echoes_unknown_ids() {
        let dir = StaticDirectory::permissive();
        let hit = dir.lookup("anyone").await.unwrap().unwrap();
        assert_eq!(hit.id, "anyone");
        assert_eq!(hit.name, "anyone");
        assert!(dir.lookup("").await.unwrap().is_none());
    }
}
