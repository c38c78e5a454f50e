//! Account registration, login, and bearer-token authentication.

/// Argon2 password hashing.
pub mod password;
/// HS256 bearer token issuing and validation.
pub mod token;

use crate::storage::{StorageError, UserStore, timestamp_now};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;

pub use token::TokenIssuer;

/// A stored account. Accounts are never updated after registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Opaque identifier; used as the document owner id.
    pub id: String,
    /// Display name, unique.
    pub username: String,
    /// Lowercased email, unique; the login key.
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Registration time.
    pub created_at: OffsetDateTime,
}

/// Public view of an authenticated account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Account id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Display name.
    pub username: String,
    /// Login email.
    pub email: String,
}

impl From<&UserRecord> for Identity {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

/// An identity together with a freshly issued bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// Account the token was issued for.
    #[serde(flatten)]
    pub identity: Identity,
    /// Bearer token.
    pub token: String,
}

/// Failures of account operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),
    /// Email or username already registered.
    #[error("User already exists")]
    UserExists,
    /// Unknown email or wrong password.
    #[error("Invalid email or password")]
    InvalidCredentials,
    /// Missing, invalid, or expired bearer token, or a token for a deleted account.
    #[error("Not authorized, {0}")]
    Unauthorized(&'static str),
    /// The user store failed.
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
    /// Hashing or signing failed.
    #[error("internal authentication failure: {0}")]
    Internal(String),
}

/// Account operations exposed to the HTTP layer.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Create an account and sign it in.
    async fn register(&self, username: &str, email: &str, password: &str)
    -> Result<Session, AuthError>;
    /// Sign in with email and password.
    async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError>;
    /// Resolve a bearer token to the account it was issued for.
    async fn authenticate(&self, token: &str) -> Result<Identity, AuthError>;
}

/// [`AuthApi`] backed by a [`UserStore`] and a [`TokenIssuer`].
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: TokenIssuer,
}

impl AuthService {
    /// Assemble the service.
    pub fn new(users: Arc<dyn UserStore>, tokens: TokenIssuer) -> Self {
        Self { users, tokens }
    }

    fn session(&self, user: &UserRecord) -> Result<Session, AuthError> {
        let token = self
            .tokens
            .issue(&user.id)
            .map_err(|err| AuthError::Internal(err.to_string()))?;
        Ok(Session {
            identity: Identity::from(user),
            token,
        })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl AuthApi for AuthService {
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let username = username.trim();
        let email = normalize_email(email);
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation("Please enter all fields".into()));
        }
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::UserExists);
        }

        let secret = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || password::hash_password(&secret))
            .await
            .map_err(|err| AuthError::Internal(err.to_string()))?
            .map_err(|err| AuthError::Internal(err.to_string()))?;

        let user = UserRecord {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            email,
            password_hash,
            created_at: timestamp_now(),
        };
        match self.users.insert(&user).await {
            Ok(()) => {}
            Err(StorageError::Conflict(_)) => return Err(AuthError::UserExists),
            Err(err) => return Err(err.into()),
        }

        tracing::info!(user_id = %user.id, "Registered user");
        self.session(&user)
    }

    async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation("Please enter all fields".into()));
        }
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let hash = user.password_hash.clone();
        let candidate = password.to_string();
        let matches =
            tokio::task::spawn_blocking(move || password::verify_password(&hash, &candidate))
                .await
                .map_err(|err| AuthError::Internal(err.to_string()))?;
        if !matches {
            tracing::debug!(user_id = %user.id, "Rejected login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        self.session(&user)
    }

    async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let user_id = self
            .tokens
            .verify(token)
            .map_err(|_| AuthError::Unauthorized("token failed"))?;
        let user = self
            .users
            .find_by_id(&user_id)
            .await?
            .ok_or(AuthError::Unauthorized("user not found"))?;
        Ok(Identity::from(&user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryUserStore;

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(MemoryUserStore::new()),
            TokenIssuer::new("test-secret", 30),
        )
    }

    #[tokio::test]
    async fn register_then_login_and_authenticate() {
        let auth = service();
        let registered = auth
            .register("alice", " Alice@Example.com ", "hunter22")
            .await
            .expect("register");
        assert_eq!(registered.identity.email, "alice@example.com");

        let session = auth
            .login("alice@example.com", "hunter22")
            .await
            .expect("login");
        assert_eq!(session.identity, registered.identity);

        let identity = auth.authenticate(&session.token).await.expect("token");
        assert_eq!(identity.username, "alice");
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let auth = service();
        auth.register("alice", "alice@example.com", "pw")
            .await
            .expect("first");
        assert!(matches!(
            auth.register("alice2", "ALICE@example.com", "pw").await,
            Err(AuthError::UserExists)
        ));
        assert!(matches!(
            auth.register("alice", "other@example.com", "pw").await,
            Err(AuthError::UserExists)
        ));
    }

    #[tokio::test]
    async fn blank_fields_are_rejected() {
        let auth = service();
        let error = auth
            .register("  ", "a@example.com", "pw")
            .await
            .expect_err("blank username");
        assert_eq!(error.to_string(), "Please enter all fields");
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let auth = service();
        auth.register("alice", "alice@example.com", "right")
            .await
            .expect("register");
        let wrong = auth
            .login("alice@example.com", "wrong")
            .await
            .expect_err("wrong password");
        let unknown = auth
            .login("bob@example.com", "right")
            .await
            .expect_err("unknown email");
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert!(matches!(wrong, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn tokens_for_unknown_users_are_rejected() {
        let auth = service();
        let token = TokenIssuer::new("test-secret", 30)
            .issue("ghost")
            .expect("issue");
        assert!(matches!(
            auth.authenticate(&token).await,
            Err(AuthError::Unauthorized(_))
        ));
        assert!(matches!(
            auth.authenticate("garbage").await,
            Err(AuthError::Unauthorized(_))
        ));
    }
}
