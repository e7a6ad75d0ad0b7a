// SPDX-License-Identifier: MIT

//! Credential store layer.
//!
//! All mutations are single-document and atomic, keyed by username; nothing
//! here needs multi-document transactions.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{Platform, SocialCredential, User};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
}

/// Profile fields that may be updated after creation.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
}

/// Persistence abstraction for user records and their embedded per-platform
/// credential blobs.
///
/// `Ok(None)` from the lookups means "no such user"; store outages surface as
/// `Err(AppError::Store)` and must never be collapsed into a miss.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Create a user. Fails with `AppError::Conflict` if the username is
    /// already taken (create-if-absent semantics, safe under races).
    async fn insert(&self, user: &User) -> Result<User, AppError>;

    /// Update optional profile fields on an existing user.
    async fn update_profile(&self, username: &str, fields: ProfileUpdate)
        -> Result<User, AppError>;

    /// Replace the credential blob for one platform, whole-blob, in a single
    /// atomic write to the user's document.
    async fn set_social_credential(
        &self,
        username: &str,
        platform: Platform,
        credential: SocialCredential,
    ) -> Result<User, AppError>;
}
