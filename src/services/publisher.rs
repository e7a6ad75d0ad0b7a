// SPDX-License-Identifier: MIT

//! Platform-polymorphic publishing dispatcher.
//!
//! Routes uploads and stats lookups to the right platform adapter after
//! making sure a usable credential exists. Google token refreshes run under
//! a per-user-per-platform lock, and a refreshed blob is persisted to the
//! store before any dependent API call uses it, so a crash between refresh
//! and call never strands a revoked-but-unsaved token.

use crate::db::CredentialStore;
use crate::error::AppError;
use crate::models::{
    FacebookCredential, GoogleCredential, Platform, SocialCredential, User, VideoStats,
    VideoUploadRequest,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const FILE_FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Outcome of a successful upload.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UploadOutcome {
    pub platform: Platform,
    pub url: String,
}

pub struct Publisher {
    store: Arc<dyn CredentialStore>,
    google: Arc<crate::services::google::GoogleOAuth>,
    facebook: Arc<crate::services::facebook::FacebookGraph>,
    youtube: Arc<crate::services::youtube::YouTubeClient>,
    http: reqwest::Client,
    refresh_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Publisher {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        google: Arc<crate::services::google::GoogleOAuth>,
        facebook: Arc<crate::services::facebook::FacebookGraph>,
        youtube: Arc<crate::services::youtube::YouTubeClient>,
    ) -> Self {
        Self {
            store,
            google,
            facebook,
            youtube,
            http: reqwest::Client::builder()
                .timeout(FILE_FETCH_TIMEOUT)
                .build()
                .unwrap_or_default(),
            refresh_locks: DashMap::new(),
        }
    }

    // ─── Upload ──────────────────────────────────────────────────────────────

    pub async fn upload(
        &self,
        user: &User,
        request: &VideoUploadRequest,
    ) -> Result<UploadOutcome, AppError> {
        let url = match request.platform {
            Platform::Google => {
                let access_token = self.ensure_google_token(user).await?;
                let bytes = self.fetch_file(&request.file_url).await?;
                self.youtube
                    .upload_video(&access_token, request, bytes)
                    .await?
            }
            Platform::Facebook => {
                let credential = facebook_credential(user)?;

                let page_id = request.page_id.as_deref().ok_or_else(|| {
                    AppError::BadRequest("page_id is required for Facebook uploads".to_string())
                })?;
                let page = credential
                    .page(page_id)
                    .ok_or_else(|| AppError::NotFound(format!("Facebook page {}", page_id)))?
                    .clone();

                self.facebook.validate(credential).await?;
                self.facebook.upload_video(&page, request).await?
            }
        };

        tracing::info!(username = %user.username, platform = %request.platform, %url, "Video published");
        Ok(UploadOutcome {
            platform: request.platform,
            url,
        })
    }

    // ─── Stats ───────────────────────────────────────────────────────────────

    pub async fn stats(
        &self,
        user: &User,
        platform: Platform,
        video_id: &str,
    ) -> Result<VideoStats, AppError> {
        match platform {
            Platform::Google => {
                let access_token = self.ensure_google_token(user).await?;
                self.youtube.video_stats(&access_token, video_id).await
            }
            Platform::Facebook => {
                let credential = facebook_credential(user)?;
                let access_token = self.facebook.validate(credential).await?;
                self.facebook.video_stats(&access_token, video_id).await
            }
        }
    }

    // ─── Credential Handling ─────────────────────────────────────────────────

    /// Produce a currently valid Google access token for the user.
    ///
    /// Runs under a per-user lock so concurrent requests do not race the
    /// single-use refresh exchange. The user is re-read inside the lock in
    /// case another request already refreshed, and a refreshed blob is
    /// written back before the token is handed out.
    async fn ensure_google_token(&self, user: &User) -> Result<String, AppError> {
        google_credential(user)?;

        let lock = self
            .refresh_locks
            .entry(format!("{}:google", user.username))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let current = self
            .store
            .find_by_username(&user.username)
            .await?
            .ok_or(AppError::Unauthorized)?;
        let credential = google_credential(&current)?;

        let (refreshed, changed) = self.google.validate_or_refresh(credential).await?;

        if changed {
            self.store
                .set_social_credential(
                    &user.username,
                    Platform::Google,
                    SocialCredential::Google(refreshed.clone()),
                )
                .await?;
            tracing::info!(username = %user.username, "Persisted refreshed Google credential");
        }

        Ok(refreshed.access_token)
    }

    /// Download the source file for re-upload to a platform that takes raw
    /// bytes instead of a URL.
    async fn fetch_file(&self, file_url: &str) -> Result<Vec<u8>, AppError> {
        let response = self
            .http
            .get(file_url)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Source file fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Source file fetch returned {}",
                response.status()
            )));
        }

        Ok(response
            .bytes()
            .await
            .map_err(|e| AppError::Upstream(format!("Source file read failed: {}", e)))?
            .to_vec())
    }
}

fn google_credential(user: &User) -> Result<&GoogleCredential, AppError> {
    match user.credential(Platform::Google) {
        Some(SocialCredential::Google(credential)) => Ok(credential),
        _ => Err(AppError::CredentialsUnavailable(Platform::Google)),
    }
}

fn facebook_credential(user: &User) -> Result<&FacebookCredential, AppError> {
    match user.credential(Platform::Facebook) {
        Some(SocialCredential::Facebook(credential)) => Ok(credential),
        _ => Err(AppError::CredentialsUnavailable(Platform::Facebook)),
    }
}
