// SPDX-License-Identifier: MIT

//! Firestore-backed credential store.
//!
//! Users are stored one document per user in the `users` collection, keyed by
//! username, so create-if-absent document ids give us case-sensitive username
//! uniqueness without a transaction.

use crate::db::{collections, CredentialStore, ProfileUpdate};
use crate::error::AppError;
use crate::models::{Platform, SocialCredential, User};
use async_trait::async_trait;

/// Firestore credential store client.
#[derive(Clone)]
pub struct FirestoreStore {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Store(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| AppError::Store(format!("Failed to connect to Firestore Emulator: {}", e)))?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a disconnected store for testing (offline mode).
    ///
    /// All operations return a `Store` error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Store("Store not connected (offline mode)".to_string()))
    }

    async fn get_required(&self, username: &str) -> Result<User, AppError> {
        self.find_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", username)))
    }

    async fn put(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.username)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;
        Ok(())
    }
}

/// A duplicate create surfaces as gRPC ALREADY_EXISTS, which the client
/// reports as a data conflict. Map it to `Conflict` so racing callers can
/// retry with another username candidate; everything else is a store fault.
fn map_insert_error(username: &str, e: firestore::errors::FirestoreError) -> AppError {
    match e {
        firestore::errors::FirestoreError::DataConflictError(_) => {
            AppError::Conflict(format!("Username {} already exists", username))
        }
        other => AppError::Store(other.to_string()),
    }
}

#[async_trait]
impl CredentialStore for FirestoreStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(username)
            .await
            .map_err(|e| AppError::Store(e.to_string()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let email = email.to_string();
        let mut users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field("email").eq(email.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        Ok(users.pop())
    }

    async fn insert(&self, user: &User) -> Result<User, AppError> {
        let result = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::USERS)
            .document_id(&user.username)
            .object(user)
            .execute::<User>()
            .await;

        result.map_err(|e| map_insert_error(&user.username, e))
    }

    async fn update_profile(
        &self,
        username: &str,
        fields: ProfileUpdate,
    ) -> Result<User, AppError> {
        let mut user = self.get_required(username).await?;

        if let Some(email) = fields.email {
            user.email = Some(email);
        }
        if let Some(full_name) = fields.full_name {
            user.full_name = Some(full_name);
        }
        if let Some(avatar) = fields.avatar {
            user.avatar = Some(avatar);
        }

        self.put(&user).await?;
        Ok(user)
    }

    async fn set_social_credential(
        &self,
        username: &str,
        platform: Platform,
        credential: SocialCredential,
    ) -> Result<User, AppError> {
        let mut user = self.get_required(username).await?;
        user.social_credentials.insert(platform, credential);
        self.put(&user).await?;

        tracing::debug!(username, %platform, "Stored credential blob");
        Ok(user)
    }
}
