// SPDX-License-Identifier: MIT

//! Facebook Graph API adapter.
//!
//! Handles:
//! - OAuth dialog URL and code exchange (short-lived token extended to
//!   long-lived, best-effort)
//! - Managed Page discovery with page-scoped tokens
//! - Token validity checks via the debug_token endpoint
//! - Page video publishing and stats aggregation
//!
//! Facebook long-lived tokens cannot be refreshed programmatically; an
//! invalid or expired token always means a fresh OAuth round-trip.

use crate::error::AppError;
use crate::models::{
    FacebookCredential, FacebookPage, Platform, VerifiedIdentity, VideoStats, VideoUploadRequest,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

const DIALOG_URL: &str = "https://www.facebook.com/v23.0/dialog/oauth";
const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com/v23.0";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const UPLOAD_HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Fixed scope list: page management plus video publishing.
const SCOPES: &[&str] = &[
    "email",
    "public_profile",
    "pages_manage_posts",
    "pages_read_engagement",
    "publish_video",
    "pages_show_list",
];

/// The fixed reaction vocabulary counted by the stats aggregation.
const REACTION_TYPES: &[&str] = &["LIKE", "LOVE", "WOW", "HAHA", "SAD", "ANGRY"];

/// Facebook Graph API client.
pub struct FacebookGraph {
    http: reqwest::Client,
    upload_http: reqwest::Client,
    app_id: String,
    app_secret: String,
    redirect_uri: String,
    graph_url: String,
}

impl FacebookGraph {
    pub fn new(app_id: String, app_secret: String, redirect_uri: String) -> Self {
        Self {
            http: client_with_timeout(DEFAULT_HTTP_TIMEOUT),
            upload_http: client_with_timeout(UPLOAD_HTTP_TIMEOUT),
            app_id,
            app_secret,
            redirect_uri,
            graph_url: DEFAULT_GRAPH_URL.to_string(),
        }
    }

    /// Point the adapter at an alternate Graph endpoint (for tests).
    pub fn with_graph_url(mut self, graph_url: String) -> Self {
        self.graph_url = graph_url;
        self
    }

    // ─── Authorization URL ───────────────────────────────────────────────────

    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&scope={}&response_type=code&state={}",
            DIALOG_URL,
            urlencoding::encode(&self.app_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&SCOPES.join(",")),
            state,
        )
    }

    // ─── Code Exchange ───────────────────────────────────────────────────────

    /// Exchange an authorization code for a verified identity and a
    /// credential blob holding the long-lived token and managed Pages.
    pub async fn exchange_code(
        &self,
        code: &str,
    ) -> Result<(VerifiedIdentity, FacebookCredential), AppError> {
        let token: AccessTokenResponse = self
            .get_json(
                &format!("{}/oauth/access_token", self.graph_url),
                &[
                    ("client_id", self.app_id.as_str()),
                    ("redirect_uri", self.redirect_uri.as_str()),
                    ("client_secret", self.app_secret.as_str()),
                    ("code", code),
                ],
            )
            .await?;

        // Best effort: a failed extension falls back to the short-lived
        // token rather than failing the whole login.
        let access_token = self.extend_token(&token.access_token).await;

        let profile: ProfileResponse = self
            .get_json(
                &format!("{}/me", self.graph_url),
                &[
                    ("fields", "id,name,email,picture"),
                    ("access_token", access_token.as_str()),
                ],
            )
            .await?;

        let pages = self.fetch_pages(&access_token).await?;

        let identity = VerifiedIdentity {
            email: profile.email,
            name: profile.name,
            avatar: profile.picture.and_then(|p| p.data).map(|d| d.url),
        };

        let credential = FacebookCredential {
            access_token,
            facebook_id: profile.id,
            pages,
        };

        tracing::info!(
            facebook_id = %credential.facebook_id,
            pages = credential.pages.len(),
            "Facebook code exchange complete"
        );

        Ok((identity, credential))
    }

    /// Extend a short-lived token to a long-lived one, falling back to the
    /// input token on any failure.
    async fn extend_token(&self, short_token: &str) -> String {
        let result: Result<AccessTokenResponse, AppError> = self
            .get_json(
                &format!("{}/oauth/access_token", self.graph_url),
                &[
                    ("grant_type", "fb_exchange_token"),
                    ("client_id", self.app_id.as_str()),
                    ("client_secret", self.app_secret.as_str()),
                    ("fb_exchange_token", short_token),
                ],
            )
            .await;

        match result {
            Ok(extended) => extended.access_token,
            Err(e) => {
                tracing::warn!(error = %e, "Long-lived token extension failed, using short-lived token");
                short_token.to_string()
            }
        }
    }

    /// Fetch the Pages the user manages, each with its page-scoped token.
    async fn fetch_pages(&self, access_token: &str) -> Result<Vec<FacebookPage>, AppError> {
        let response: PagesResponse = self
            .get_json(
                &format!("{}/me/accounts", self.graph_url),
                &[
                    ("fields", "id,name,access_token"),
                    ("access_token", access_token),
                ],
            )
            .await?;

        Ok(response.data)
    }

    // ─── Validity Check ──────────────────────────────────────────────────────

    /// Check the stored token against the debug_token endpoint using
    /// app-level credentials. Returns the usable token.
    ///
    /// There is no silent refresh path: invalid or expired means the caller
    /// must redo the OAuth flow.
    pub async fn validate(&self, credential: &FacebookCredential) -> Result<String, AppError> {
        let app_token = format!("{}|{}", self.app_id, self.app_secret);

        let response = self
            .http
            .get(format!("{}/debug_token", self.graph_url))
            .query(&[
                ("input_token", credential.access_token.as_str()),
                ("access_token", app_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Facebook debug_token failed: {}", e)))?;

        if response.status().is_server_error() {
            return Err(AppError::Upstream(format!(
                "Facebook debug_token returned {}",
                response.status()
            )));
        }

        let body: DebugTokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Invalid debug_token response: {}", e)))?;

        let is_valid = body
            .data
            .as_ref()
            .map(|d| d.is_valid)
            .unwrap_or(false);

        if body.error.is_some() || !is_valid {
            tracing::warn!("Facebook token invalid or expired");
            return Err(AppError::ReAuthenticationRequired(Platform::Facebook));
        }

        Ok(credential.access_token.clone())
    }

    // ─── Video Publishing ────────────────────────────────────────────────────

    /// Post a remotely hosted video to a Page's /videos edge.
    ///
    /// Returns the canonical facebook.com URL for the new video.
    pub async fn upload_video(
        &self,
        page: &FacebookPage,
        request: &VideoUploadRequest,
    ) -> Result<String, AppError> {
        let mut form: Vec<(&str, String)> = vec![
            ("title", request.title.clone()),
            ("description", request.description.clone()),
            ("file_url", request.file_url.clone()),
            ("access_token", page.access_token.clone()),
        ];

        if !request.tags.is_empty() {
            form.push(("tags", request.tags.join(",")));
        }

        let response = self
            .upload_http
            .post(format!("{}/{}/videos", self.graph_url, page.id))
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Facebook video upload failed: {}", e)))?;

        let status = response.status();
        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Invalid Facebook upload response: {}", e)))?;

        if let Some(error) = body.error {
            tracing::warn!(status = %status, message = %error.message, "Facebook upload rejected");
            return Err(AppError::Upstream(format!(
                "Facebook upload error: {}",
                error.message
            )));
        }

        let video_id = body.id.ok_or_else(|| {
            AppError::Upstream("Facebook upload returned no video id".to_string())
        })?;

        tracing::info!(page_id = %page.id, video_id = %video_id, "Video published to Facebook");

        Ok(format!("https://www.facebook.com/{}", video_id))
    }

    // ─── Stats Aggregation ───────────────────────────────────────────────────

    /// Aggregate video stats from several Graph edges.
    ///
    /// Only the primary basic-info call can fail the operation. Reaction,
    /// comment, and share sub-calls each degrade to zero on failure.
    pub async fn video_stats(
        &self,
        access_token: &str,
        video_id: &str,
    ) -> Result<VideoStats, AppError> {
        let info = self.fetch_video_info(access_token, video_id).await?;

        let (reactions, comment_count, share_count) = futures_util::join!(
            self.fetch_reactions(access_token, video_id),
            self.fetch_summary_count(access_token, video_id, "comments"),
            self.fetch_summary_count(access_token, video_id, "sharedposts"),
        );

        let like_count = reactions.get("LIKE").copied().unwrap_or(0);

        Ok(VideoStats {
            platform: Platform::Facebook,
            video_id: video_id.to_string(),
            url: info
                .permalink_url
                .map(|p| format!("https://www.facebook.com{}", p))
                .unwrap_or_else(|| format!("https://www.facebook.com/{}", video_id)),
            title: info.title.unwrap_or_default(),
            view_count: info.views.unwrap_or(0),
            like_count,
            comment_count,
            share_count,
            reactions,
            published_at: info.created_time,
        })
    }

    /// Primary basic-info call; its failure fails the whole stats request.
    async fn fetch_video_info(
        &self,
        access_token: &str,
        video_id: &str,
    ) -> Result<VideoInfoResponse, AppError> {
        let response = self
            .http
            .get(format!("{}/{}", self.graph_url, video_id))
            .query(&[
                ("fields", "id,title,created_time,permalink_url,views"),
                ("access_token", access_token),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Facebook video info failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Video {}", video_id)));
        }

        let body: VideoInfoEnvelope = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Invalid Facebook video info: {}", e)))?;

        if let Some(error) = body.error {
            // Graph reports missing objects as code 100 on a 400 status.
            if error.code == Some(100) {
                return Err(AppError::NotFound(format!("Video {}", video_id)));
            }
            return Err(AppError::Upstream(format!(
                "Facebook video info error: {}",
                error.message
            )));
        }

        Ok(VideoInfoResponse {
            title: body.title,
            created_time: body.created_time,
            permalink_url: body.permalink_url,
            views: body.views,
        })
    }

    /// Per-reaction-type counts across the fixed vocabulary. A failed
    /// sub-call leaves that reaction at zero.
    async fn fetch_reactions(&self, access_token: &str, video_id: &str) -> BTreeMap<String, u64> {
        let mut counts = BTreeMap::new();

        for reaction in REACTION_TYPES {
            let count = self
                .fetch_reaction_count(access_token, video_id, reaction)
                .await
                .unwrap_or_else(|e| {
                    tracing::debug!(reaction, error = %e, "Reaction count degraded to zero");
                    0
                });
            counts.insert(reaction.to_string(), count);
        }

        counts
    }

    async fn fetch_reaction_count(
        &self,
        access_token: &str,
        video_id: &str,
        reaction: &str,
    ) -> Result<u64, AppError> {
        let body: SummaryEnvelope = self
            .get_json(
                &format!("{}/{}/reactions", self.graph_url, video_id),
                &[
                    ("type", reaction),
                    ("summary", "total_count"),
                    ("limit", "0"),
                    ("access_token", access_token),
                ],
            )
            .await?;

        Ok(body.summary.map(|s| s.total_count).unwrap_or(0))
    }

    /// Summary total for an edge (comments, sharedposts); zero on failure.
    async fn fetch_summary_count(&self, access_token: &str, video_id: &str, edge: &str) -> u64 {
        let result: Result<SummaryEnvelope, AppError> = self
            .get_json(
                &format!("{}/{}/{}", self.graph_url, video_id, edge),
                &[
                    ("summary", "total_count"),
                    ("limit", "0"),
                    ("access_token", access_token),
                ],
            )
            .await;

        match result {
            Ok(body) => body.summary.map(|s| s.total_count).unwrap_or(0),
            Err(e) => {
                tracing::debug!(edge, error = %e, "Edge count degraded to zero");
                0
            }
        }
    }

    // ─── Helpers ─────────────────────────────────────────────────────────────

    /// GET with query params, surfacing Graph `error` envelopes as Upstream.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Facebook request failed: {}", e)))?;

        let status = response.status();
        let raw = response
            .bytes()
            .await
            .map_err(|e| AppError::Upstream(format!("Facebook response read failed: {}", e)))?;

        if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(&raw) {
            if let Some(error) = envelope.error {
                return Err(AppError::Upstream(format!(
                    "Facebook API error: {}",
                    error.message
                )));
            }
        }

        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "Facebook API returned {}",
                status
            )));
        }

        serde_json::from_slice(&raw)
            .map_err(|e| AppError::Upstream(format!("Invalid Facebook JSON: {}", e)))
    }
}

fn client_with_timeout(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    id: String,
    name: Option<String>,
    email: Option<String>,
    picture: Option<PictureField>,
}

#[derive(Debug, Deserialize)]
struct PictureField {
    data: Option<PictureData>,
}

#[derive(Debug, Deserialize)]
struct PictureData {
    url: String,
}

#[derive(Debug, Deserialize)]
struct PagesResponse {
    #[serde(default)]
    data: Vec<FacebookPage>,
}

#[derive(Debug, Deserialize)]
struct DebugTokenResponse {
    data: Option<DebugTokenData>,
    error: Option<GraphError>,
}

#[derive(Debug, Deserialize)]
struct DebugTokenData {
    #[serde(default)]
    is_valid: bool,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: Option<String>,
    error: Option<GraphError>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<GraphError>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
    code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct VideoInfoEnvelope {
    title: Option<String>,
    created_time: Option<String>,
    permalink_url: Option<String>,
    views: Option<u64>,
    error: Option<GraphError>,
}

struct VideoInfoResponse {
    title: Option<String>,
    created_time: Option<String>,
    permalink_url: Option<String>,
    views: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    summary: Option<SummaryCount>,
}

#[derive(Debug, Deserialize)]
struct SummaryCount {
    total_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_url_includes_publishing_scopes() {
        let facebook = FacebookGraph::new(
            "app-id".into(),
            "app-secret".into(),
            "http://localhost:8080/auth/facebook/callback".into(),
        );

        let url = facebook.authorization_url("signed-state");
        assert!(url.starts_with(DIALOG_URL));
        assert!(url.contains("pages_manage_posts"));
        assert!(url.contains("publish_video"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("state=signed-state"));
    }

    #[test]
    fn reaction_vocabulary_is_fixed() {
        assert_eq!(
            REACTION_TYPES,
            &["LIKE", "LOVE", "WOW", "HAHA", "SAD", "ANGRY"]
        );
    }
}
