// SPDX-License-Identifier: MIT

//! In-memory credential store for tests and local development.

use crate::db::{CredentialStore, ProfileUpdate};
use crate::error::AppError;
use crate::models::{Platform, SocialCredential, User};
use async_trait::async_trait;
use dashmap::DashMap;

/// DashMap-backed store keyed by username. Insert uses the entry API so
/// concurrent duplicate inserts observe the same conflict a real store
/// would report.
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, User>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.get(username).map(|u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.value().email.as_deref() == Some(email))
            .map(|entry| entry.value().clone()))
    }

    async fn insert(&self, user: &User) -> Result<User, AppError> {
        match self.users.entry(user.username.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "Username {} already exists",
                user.username
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(user.clone());
                Ok(user.clone())
            }
        }
    }

    async fn update_profile(
        &self,
        username: &str,
        fields: ProfileUpdate,
    ) -> Result<User, AppError> {
        let mut entry = self
            .users
            .get_mut(username)
            .ok_or_else(|| AppError::NotFound(format!("User {}", username)))?;

        if let Some(email) = fields.email {
            entry.email = Some(email);
        }
        if let Some(full_name) = fields.full_name {
            entry.full_name = Some(full_name);
        }
        if let Some(avatar) = fields.avatar {
            entry.avatar = Some(avatar);
        }

        Ok(entry.clone())
    }

    async fn set_social_credential(
        &self,
        username: &str,
        platform: Platform,
        credential: SocialCredential,
    ) -> Result<User, AppError> {
        let mut entry = self
            .users
            .get_mut(username)
            .ok_or_else(|| AppError::NotFound(format!("User {}", username)))?;

        entry.social_credentials.insert(platform, credential);
        Ok(entry.clone())
    }
}
