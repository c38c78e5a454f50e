//! In-process stores for tests and ephemeral runs.

use super::{DocumentStore, StorageError, UserStore};
use crate::auth::UserRecord;
use crate::documents::DocumentRecord;
use async_trait::async_trait;
use std::cmp::Reverse;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// [`DocumentStore`] backed by a map guarded by an async lock.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    records: RwLock<HashMap<String, DocumentRecord>>,
}

impl MemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether no records are stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, record: &DocumentRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(StorageError::Conflict("document".into()));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Option<DocumentRecord>, StorageError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<DocumentRecord>, StorageError> {
        let mut owned: Vec<DocumentRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|record| record.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| {
            Reverse(a.created_at)
                .cmp(&Reverse(b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(owned)
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.records.write().await.remove(id).is_some())
    }
}

/// [`UserStore`] backed by a vector guarded by an async lock.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<UserRecord>>,
}

impl MemoryUserStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: &UserRecord) -> Result<(), StorageError> {
        let mut users = self.users.write().await;
        if users
            .iter()
            .any(|existing| existing.email == user.email || existing.username == user.username)
        {
            return Err(StorageError::Conflict("user".into()));
        }
        users.push(user.clone());
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StorageError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, StorageError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|user| user.id == id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::timestamp_now;

    #[tokio::test]
    async fn usernames_are_unique_too() {
        let store = MemoryUserStore::new();
        let user = UserRecord {
            id: "u1".into(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "hash".into(),
            created_at: timestamp_now(),
        };
        store.insert(&user).await.expect("insert");

        let same_name = UserRecord {
            id: "u2".into(),
            email: "other@example.com".into(),
            ..user
        };
        assert!(matches!(
            store.insert(&same_name).await,
            Err(StorageError::Conflict(_))
        ));
        assert!(store.find_by_id("u2").await.expect("find").is_none());
    }
}
