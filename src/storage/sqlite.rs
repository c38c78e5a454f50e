//! SQLite-backed record stores.

use super::{DocumentStore, StorageError, UserStore, from_micros, to_micros};
use crate::auth::UserRecord;
use crate::documents::{DocumentRecord, SummaryStatus};
use crate::extraction::ExtractionStatus;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL,
        file_name TEXT NOT NULL,
        storage_location TEXT NOT NULL,
        media_type TEXT NOT NULL,
        size_bytes INTEGER NOT NULL,
        extracted_text TEXT NOT NULL,
        text_status TEXT NOT NULL,
        summary TEXT NOT NULL,
        summary_status TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents (owner_id, created_at DESC)",
];

/// Open a connection pool, creating the database file when missing.
pub async fn connect(database_url: &str) -> Result<SqlitePool, StorageError> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = if database_url.contains(":memory:") {
        // Every in-memory connection is its own database; keep exactly one alive.
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?
    };
    Ok(pool)
}

/// Create the tables and indexes if they do not exist yet.
pub async fn migrate(pool: &SqlitePool) -> Result<(), StorageError> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!("Database schema is up to date");
    Ok(())
}

fn conflict_or(err: sqlx::Error, what: &str) -> StorageError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StorageError::Conflict(what.to_string())
        }
        _ => StorageError::Database(err),
    }
}

/// [`DocumentStore`] over the `documents` table.
#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Wrap an already migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn document_from_row(row: &SqliteRow) -> Result<DocumentRecord, StorageError> {
    let text_status: String = row.try_get("text_status")?;
    let summary_status: String = row.try_get("summary_status")?;
    let size_bytes: i64 = row.try_get("size_bytes")?;
    Ok(DocumentRecord {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        file_name: row.try_get("file_name")?,
        storage_location: row.try_get("storage_location")?,
        media_type: row.try_get("media_type")?,
        size_bytes: u64::try_from(size_bytes)
            .map_err(|_| StorageError::Corrupt(format!("negative size {size_bytes}")))?,
        extracted_text: row.try_get("extracted_text")?,
        text_status: ExtractionStatus::parse(&text_status)
            .ok_or_else(|| StorageError::Corrupt(format!("text status `{text_status}`")))?,
        summary: row.try_get("summary")?,
        summary_status: SummaryStatus::parse(&summary_status)
            .ok_or_else(|| StorageError::Corrupt(format!("summary status `{summary_status}`")))?,
        created_at: from_micros(row.try_get("created_at")?)?,
        updated_at: from_micros(row.try_get("updated_at")?)?,
    })
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn insert(&self, record: &DocumentRecord) -> Result<(), StorageError> {
        let size_bytes = i64::try_from(record.size_bytes)
            .map_err(|_| StorageError::Corrupt(format!("size {} too large", record.size_bytes)))?;
        sqlx::query(
            r#"
            INSERT INTO documents (id, owner_id, file_name, storage_location, media_type,
                                   size_bytes, extracted_text, text_status, summary,
                                   summary_status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.owner_id)
        .bind(&record.file_name)
        .bind(&record.storage_location)
        .bind(&record.media_type)
        .bind(size_bytes)
        .bind(&record.extracted_text)
        .bind(record.text_status.as_str())
        .bind(&record.summary)
        .bind(record.summary_status.as_str())
        .bind(to_micros(record.created_at))
        .bind(to_micros(record.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|err| conflict_or(err, "document"))?;
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Option<DocumentRecord>, StorageError> {
        sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(document_from_row)
            .transpose()
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<DocumentRecord>, StorageError> {
        sqlx::query("SELECT * FROM documents WHERE owner_id = ? ORDER BY created_at DESC, id")
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(document_from_row)
            .collect()
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// [`UserStore`] over the `users` table.
#[derive(Debug, Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    /// Wrap an already migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &SqliteRow) -> Result<UserRecord, StorageError> {
    Ok(UserRecord {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        created_at: from_micros(row.try_get("created_at")?)?,
    })
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn insert(&self, user: &UserRecord) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(to_micros(user.created_at))
        .execute(&self.pool)
        .await
        .map_err(|err| conflict_or(err, "user"))?;
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StorageError> {
        sqlx::query("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, StorageError> {
        sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::timestamp_now;
    use time::Duration;

    async fn pool() -> SqlitePool {
        let pool = connect("sqlite::memory:").await.expect("connect");
        migrate(&pool).await.expect("migrate");
        pool
    }

    fn record(id: &str, owner: &str, age_secs: i64) -> DocumentRecord {
        let created_at = timestamp_now() - Duration::seconds(age_secs);
        DocumentRecord {
            id: id.into(),
            owner_id: owner.into(),
            file_name: format!("{id}.txt"),
            storage_location: format!("document-{id}.txt"),
            media_type: "text/plain".into(),
            size_bytes: 5,
            extracted_text: "hello".into(),
            text_status: ExtractionStatus::Extracted,
            summary: "Not enough text or unsupported file type for AI summarization.".into(),
            summary_status: SummaryStatus::Skipped,
            created_at,
            updated_at: created_at,
        }
    }

    #[tokio::test]
    async fn documents_round_trip_and_list_newest_first() {
        let store = SqliteDocumentStore::new(pool().await);
        let older = record("older", "alice", 60);
        let newer = record("newer", "alice", 0);
        store.insert(&older).await.expect("insert older");
        store.insert(&newer).await.expect("insert newer");
        store.insert(&record("other", "bob", 0)).await.expect("insert other");

        assert_eq!(store.find("older").await.expect("find"), Some(older.clone()));
        let listed = store.list_by_owner("alice").await.expect("list");
        assert_eq!(listed, vec![newer, older]);
        assert!(store.find("missing").await.expect("find").is_none());
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_existed() {
        let store = SqliteDocumentStore::new(pool().await);
        store.insert(&record("doc", "alice", 0)).await.expect("insert");
        assert!(store.delete("doc").await.expect("delete"));
        assert!(!store.delete("doc").await.expect("delete again"));
        assert!(store.find("doc").await.expect("find").is_none());
    }

    #[tokio::test]
    async fn duplicate_users_conflict() {
        let store = SqliteUserStore::new(pool().await);
        let user = UserRecord {
            id: "u1".into(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "$argon2id$stub".into(),
            created_at: timestamp_now(),
        };
        store.insert(&user).await.expect("insert");

        let duplicate = UserRecord {
            id: "u2".into(),
            username: "alice2".into(),
            ..user.clone()
        };
        let error = store.insert(&duplicate).await.expect_err("duplicate email");
        assert!(matches!(error, StorageError::Conflict(_)));

        assert_eq!(
            store.find_by_email("alice@example.com").await.expect("find"),
            Some(user.clone())
        );
        assert_eq!(store.find_by_id("u1").await.expect("find"), Some(user));
    }

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let pool = pool().await;
        migrate(&pool).await.expect("second migrate");
    }
}
