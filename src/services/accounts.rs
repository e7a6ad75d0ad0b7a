// SPDX-License-Identifier: MIT

//! Local account lifecycle: registration, password login, and session
//! refresh. Token minting is delegated to the session authority; the
//! refresh token is handed back separately so the caller can place it in
//! a cookie rather than the response body.

use crate::db::CredentialStore;
use crate::error::AppError;
use crate::models::User;
use crate::services::password::{hash_password, verify_password};
use crate::services::session::{SessionAuthority, TokenKind};
use std::collections::HashMap;
use std::sync::Arc;

/// A freshly minted access/refresh pair.
#[derive(Debug)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    sessions: SessionAuthority,
}

impl AccountService {
    pub fn new(store: Arc<dyn CredentialStore>, sessions: SessionAuthority) -> Self {
        Self { store, sessions }
    }

    /// Create a local account with a password.
    pub async fn register(
        &self,
        username: &str,
        email: Option<&str>,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<User, AppError> {
        validate_username(username)?;
        validate_password(password)?;

        // Check-then-insert: only username uniqueness is atomic (it is the
        // document id). Two concurrent registrations with the same email can
        // both pass this check; the duplicate is tolerated, and OAuth linking
        // resolves such an email to its first stored match.
        if let Some(email) = email {
            if self.store.find_by_email(email).await?.is_some() {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: hash_password(password)?,
            email: email.map(String::from),
            full_name: full_name.map(String::from),
            avatar: None,
            social_credentials: HashMap::new(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let created = self.store.insert(&user).await.map_err(|e| match e {
            AppError::Conflict(_) => AppError::Conflict("Username already taken".to_string()),
            other => other,
        })?;

        tracing::info!(username = %created.username, "Registered local account");
        Ok(created)
    }

    /// Verify a password and mint a session pair.
    ///
    /// Unknown username and wrong password are indistinguishable to the
    /// caller; only a store outage surfaces differently.
    pub async fn login(&self, username: &str, password: &str) -> Result<(User, SessionTokens), AppError> {
        let user = self
            .store
            .find_by_username(username)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(password, &user.password_hash) {
            return Err(AppError::Unauthorized);
        }

        let tokens = self.mint(&user)?;
        tracing::info!(username = %user.username, "Password login");
        Ok((user, tokens))
    }

    /// Trade a valid refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<(User, String), AppError> {
        let claims = self.sessions.verify(refresh_token, TokenKind::Refresh)?;

        let user = self
            .store
            .find_by_username(&claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let access_token = self.sessions.issue_access_token(&user)?;
        Ok((user, access_token))
    }

    pub fn mint(&self, user: &User) -> Result<SessionTokens, AppError> {
        Ok(SessionTokens {
            access_token: self.sessions.issue_access_token(user)?,
            refresh_token: self.sessions.issue_refresh_token(user)?,
        })
    }
}

fn validate_username(username: &str) -> Result<(), AppError> {
    let len = username.chars().count();
    if !(3..=50).contains(&len) {
        return Err(AppError::BadRequest(
            "Username must be 3-50 characters".to_string(),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(AppError::BadRequest(
            "Username may only contain letters, digits, and underscores".to_string(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AppError> {
    let len = password.chars().count();
    if !(6..=128).contains(&len) {
        return Err(AppError::BadRequest(
            "Password must be 6-128 characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn service() -> (Arc<MemoryStore>, AccountService) {
        let store = Arc::new(MemoryStore::new());
        let sessions = SessionAuthority::new(b"test_auth_secret_32_bytes_min!!!".to_vec(), 30, 7);
        (store.clone(), AccountService::new(store, sessions))
    }

    #[tokio::test]
    async fn register_then_login_roundtrip() {
        let (_, accounts) = service();

        accounts
            .register("alice", Some("alice@example.com"), "secret1", None)
            .await
            .unwrap();

        let (user, tokens) = accounts.login("alice", "secret1").await.unwrap();
        assert_eq!(user.username, "alice");
        assert!(!tokens.access_token.is_empty());
        assert_ne!(tokens.access_token, tokens.refresh_token);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_identical() {
        let (_, accounts) = service();
        accounts
            .register("alice", None, "secret1", None)
            .await
            .unwrap();

        let wrong = accounts.login("alice", "wrong-password").await.unwrap_err();
        let unknown = accounts.login("nobody", "secret1").await.unwrap_err();
        assert!(matches!(wrong, AppError::Unauthorized));
        assert!(matches!(unknown, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn duplicate_username_and_email_conflict() {
        let (_, accounts) = service();
        accounts
            .register("alice", Some("alice@example.com"), "secret1", None)
            .await
            .unwrap();

        let username = accounts
            .register("alice", Some("other@example.com"), "secret1", None)
            .await
            .unwrap_err();
        assert!(matches!(username, AppError::Conflict(_)));

        let email = accounts
            .register("alice2", Some("alice@example.com"), "secret1", None)
            .await
            .unwrap_err();
        assert!(matches!(email, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn invalid_username_and_short_password_rejected() {
        let (_, accounts) = service();

        let bad_name = accounts
            .register("a!", None, "secret1", None)
            .await
            .unwrap_err();
        assert!(matches!(bad_name, AppError::BadRequest(_)));

        let short = accounts
            .register("alice", None, "short", None)
            .await
            .unwrap_err();
        assert!(matches!(short, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn refresh_yields_new_access_token() {
        let (_, accounts) = service();
        accounts
            .register("alice", None, "secret1", None)
            .await
            .unwrap();
        let (_, tokens) = accounts.login("alice", "secret1").await.unwrap();

        let (user, access) = accounts.refresh(&tokens.refresh_token).await.unwrap();
        assert_eq!(user.username, "alice");
        assert_ne!(access, tokens.access_token);

        // An access token is not accepted on the refresh path.
        let err = accounts.refresh(&tokens.access_token).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }
}
