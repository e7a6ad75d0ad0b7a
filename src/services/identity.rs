// SPDX-License-Identifier: MIT

//! Link-or-create identity resolution for OAuth logins.
//!
//! A verified upstream identity either attaches to the existing user with
//! the same email or materializes a new user with a synthesized username.
//! Username collisions are resolved with numeric suffixes, re-checking the
//! email after every insert conflict so two concurrent logins for the same
//! new email converge on a single user.

use crate::db::{CredentialStore, ProfileUpdate};
use crate::error::AppError;
use crate::models::{Platform, SocialCredential, User, VerifiedIdentity};
use crate::services::password::{generate_unusable_password, hash_password};
use std::collections::HashMap;
use std::sync::Arc;

/// Bound on suffix probing before giving up on username synthesis.
const MAX_USERNAME_ATTEMPTS: usize = 50;

pub struct IdentityResolver {
    store: Arc<dyn CredentialStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Resolve a verified upstream identity to a local user and attach the
    /// platform credential to it.
    pub async fn link_or_create(
        &self,
        identity: &VerifiedIdentity,
        platform: Platform,
        credential: SocialCredential,
    ) -> Result<User, AppError> {
        let email = identity
            .email
            .as_deref()
            .ok_or(AppError::MissingUpstreamAttribute("email"))?;

        if let Some(existing) = self.store.find_by_email(email).await? {
            tracing::info!(username = %existing.username, %platform, "Linking credential to existing user");
            return self.link(&existing, identity, platform, credential).await;
        }

        self.create_user(identity, email, platform, credential).await
    }

    /// Attach the credential and backfill profile fields the user record is
    /// still missing.
    async fn link(
        &self,
        existing: &User,
        identity: &VerifiedIdentity,
        platform: Platform,
        credential: SocialCredential,
    ) -> Result<User, AppError> {
        let fields = ProfileUpdate {
            email: None,
            full_name: existing
                .full_name
                .is_none()
                .then(|| identity.name.clone())
                .flatten(),
            avatar: existing
                .avatar
                .is_none()
                .then(|| identity.avatar.clone())
                .flatten(),
        };

        if fields.full_name.is_some() || fields.avatar.is_some() {
            self.store.update_profile(&existing.username, fields).await?;
        }

        self.store
            .set_social_credential(&existing.username, platform, credential)
            .await
    }

    async fn create_user(
        &self,
        identity: &VerifiedIdentity,
        email: &str,
        platform: Platform,
        credential: SocialCredential,
    ) -> Result<User, AppError> {
        let base = synthesize_username(email, identity.name.as_deref());
        let password_hash = hash_password(&generate_unusable_password())?;

        let mut suffix = 0usize;
        for _ in 0..MAX_USERNAME_ATTEMPTS {
            let candidate = if suffix == 0 {
                base.clone()
            } else {
                format!("{}_{}", base, suffix)
            };

            let user = User {
                id: uuid::Uuid::new_v4().to_string(),
                username: candidate.clone(),
                password_hash: password_hash.clone(),
                email: Some(email.to_string()),
                full_name: identity.name.clone(),
                avatar: identity.avatar.clone(),
                social_credentials: HashMap::from([(platform, credential.clone())]),
                created_at: chrono::Utc::now().to_rfc3339(),
            };

            match self.store.insert(&user).await {
                Ok(created) => {
                    tracing::info!(username = %created.username, %platform, "Created user from verified identity");
                    return Ok(created);
                }
                Err(AppError::Conflict(_)) => {
                    // The winner of the race may be a concurrent login for
                    // this very email; link to it instead of probing on.
                    if let Some(existing) = self.store.find_by_email(email).await? {
                        tracing::info!(
                            username = %existing.username,
                            %platform,
                            "Lost creation race, linking to concurrently created user"
                        );
                        return self.link(&existing, identity, platform, credential).await;
                    }
                    suffix += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::Conflict(format!(
            "Could not find a free username for {}",
            base
        )))
    }
}

/// Derive a username candidate from the email local part, falling back to
/// the display name. Lowercased, restricted to [a-z0-9_], padded to the
/// minimum length, capped at 30 characters.
fn synthesize_username(email: &str, name: Option<&str>) -> String {
    let raw = email
        .split('@')
        .next()
        .filter(|local| !local.is_empty())
        .map(String::from)
        .or_else(|| name.map(String::from))
        .unwrap_or_else(|| "user".to_string());

    let mut cleaned: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect();

    if cleaned.len() < 3 {
        cleaned = format!("user_{}", cleaned);
    }
    cleaned.truncate(30);
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::GoogleCredential;

    fn google_credential() -> SocialCredential {
        SocialCredential::Google(GoogleCredential {
            access_token: "ya29.test".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expires_at: chrono::Utc::now().to_rfc3339(),
            scopes: vec!["openid".to_string()],
        })
    }

    fn identity(email: &str) -> VerifiedIdentity {
        VerifiedIdentity {
            email: Some(email.to_string()),
            name: Some("Test Person".to_string()),
            avatar: None,
        }
    }

    #[test]
    fn username_synthesis_sanitizes_and_pads() {
        assert_eq!(synthesize_username("jane.doe@example.com", None), "janedoe");
        assert_eq!(
            synthesize_username("@example.com", Some("Jane Doe")),
            "jane_doe"
        );
        assert_eq!(synthesize_username("ab@example.com", None), "user_ab");
        let long = synthesize_username(
            "a_very_long_local_part_exceeding_the_cap@example.com",
            None,
        );
        assert_eq!(long.len(), 30);
    }

    #[tokio::test]
    async fn missing_email_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let resolver = IdentityResolver::new(store);

        let anonymous = VerifiedIdentity {
            email: None,
            name: Some("No Email".to_string()),
            avatar: None,
        };
        let err = resolver
            .link_or_create(&anonymous, Platform::Google, google_credential())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingUpstreamAttribute("email")));
    }

    #[tokio::test]
    async fn new_email_creates_user_with_credential() {
        let store = Arc::new(MemoryStore::new());
        let resolver = IdentityResolver::new(store.clone());

        let user = resolver
            .link_or_create(&identity("fresh@example.com"), Platform::Google, google_credential())
            .await
            .unwrap();

        assert_eq!(user.username, "fresh");
        assert!(user.social_credentials.contains_key(&Platform::Google));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn existing_email_links_instead_of_creating() {
        let store = Arc::new(MemoryStore::new());
        let resolver = IdentityResolver::new(store.clone());

        resolver
            .link_or_create(&identity("alice@example.com"), Platform::Google, google_credential())
            .await
            .unwrap();
        let linked = resolver
            .link_or_create(&identity("alice@example.com"), Platform::Google, google_credential())
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(linked.username, "alice");
    }

    #[tokio::test]
    async fn taken_username_gets_numeric_suffix() {
        let store = Arc::new(MemoryStore::new());
        let resolver = IdentityResolver::new(store.clone());

        // Same local part, different emails.
        resolver
            .link_or_create(&identity("sam@one.example"), Platform::Google, google_credential())
            .await
            .unwrap();
        let second = resolver
            .link_or_create(&identity("sam@two.example"), Platform::Google, google_credential())
            .await
            .unwrap();

        assert_eq!(second.username, "sam_1");
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_logins_for_same_new_email_converge() {
        let store = Arc::new(MemoryStore::new());
        let resolver = Arc::new(IdentityResolver::new(store.clone()));

        let first = identity("race@example.com");
        let second = identity("race@example.com");
        let (a, b) = tokio::join!(
            resolver.link_or_create(&first, Platform::Google, google_credential()),
            resolver.link_or_create(&second, Platform::Google, google_credential()),
        );

        let a = a.unwrap();
        let b = b.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(a.username, b.username);
    }
}
