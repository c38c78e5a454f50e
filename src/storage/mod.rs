//! Persistence seams for document records, user accounts, and raw upload bytes.
//!
//! Each concern is a trait so the services can run against SQLite and the filesystem in
//! production and against in-memory doubles in tests.

pub mod blob;
pub mod memory;
pub mod sqlite;

use crate::auth::UserRecord;
use crate::documents::DocumentRecord;
use crate::extraction::MediaKind;
use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

pub use blob::FsBlobStore;
pub use memory::{MemoryDocumentStore, MemoryUserStore};
pub use sqlite::{SqliteDocumentStore, SqliteUserStore};

/// Errors raised by any storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database driver failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Filesystem access failed.
    #[error("blob storage error: {0}")]
    Io(#[from] std::io::Error),
    /// A uniqueness constraint was violated.
    #[error("{0} already exists")]
    Conflict(String),
    /// A stored value could not be decoded.
    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

/// Durable store of [`DocumentRecord`]s. Every operation touches a single record.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist a fully populated record.
    async fn insert(&self, record: &DocumentRecord) -> Result<(), StorageError>;
    /// Fetch a record by id regardless of owner.
    async fn find(&self, id: &str) -> Result<Option<DocumentRecord>, StorageError>;
    /// All records owned by `owner_id`, newest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<DocumentRecord>, StorageError>;
    /// Remove a record; returns whether it existed.
    async fn delete(&self, id: &str) -> Result<bool, StorageError>;
}

/// Durable store of user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist a new account; duplicate emails or usernames yield [`StorageError::Conflict`].
    async fn insert(&self, user: &UserRecord) -> Result<(), StorageError>;
    /// Look up an account by its normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StorageError>;
    /// Look up an account by id.
    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, StorageError>;
}

/// Addressable store of raw upload bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write bytes under a freshly generated key and return that key.
    async fn put(&self, kind: MediaKind, bytes: &[u8]) -> Result<String, StorageError>;
    /// Remove the bytes at `location`; an already absent blob counts as removed.
    async fn delete(&self, location: &str) -> Result<(), StorageError>;
    /// Whether bytes are present at `location`.
    async fn exists(&self, location: &str) -> Result<bool, StorageError>;
}

/// Current UTC time at the microsecond precision the stores persist.
pub fn timestamp_now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}

pub(crate) fn to_micros(timestamp: OffsetDateTime) -> i64 {
    (timestamp.unix_timestamp_nanos() / 1_000) as i64
}

pub(crate) fn from_micros(micros: i64) -> Result<OffsetDateTime, StorageError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(micros) * 1_000)
        .map_err(|err| StorageError::Corrupt(format!("timestamp {micros}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_survive_micro_precision_storage() {
        let now = timestamp_now();
        assert_eq!(from_micros(to_micros(now)).expect("decode"), now);
        assert_eq!(now.nanosecond() % 1_000, 0);
    }
}
