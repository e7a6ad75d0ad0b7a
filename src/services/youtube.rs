// SPDX-License-Identifier: MIT

//! YouTube Data API v3 adapter.
//!
//! Uploads use the resumable protocol: an initiation POST carrying the
//! video metadata returns a session URI in the Location header, then the
//! video bytes go up in a single PUT. Stats come from the videos endpoint
//! with the statistics and snippet parts.

use crate::error::AppError;
use crate::models::{Platform, VideoStats, VideoUploadRequest};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos";
const DEFAULT_API_URL: &str = "https://www.googleapis.com/youtube/v3";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const UPLOAD_HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// YouTube Data API client.
pub struct YouTubeClient {
    http: reqwest::Client,
    upload_http: reqwest::Client,
    upload_url: String,
    api_url: String,
}

impl Default for YouTubeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl YouTubeClient {
    pub fn new() -> Self {
        Self {
            http: client_with_timeout(DEFAULT_HTTP_TIMEOUT),
            upload_http: client_with_timeout(UPLOAD_HTTP_TIMEOUT),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    /// Point the client at alternate endpoints (for tests).
    pub fn with_endpoints(mut self, upload_url: String, api_url: String) -> Self {
        self.upload_url = upload_url;
        self.api_url = api_url;
        self
    }

    // ─── Upload ──────────────────────────────────────────────────────────────

    /// Resumable upload of a video already fetched into memory.
    ///
    /// Returns the canonical watch URL for the new video.
    pub async fn upload_video(
        &self,
        access_token: &str,
        request: &VideoUploadRequest,
        bytes: Vec<u8>,
    ) -> Result<String, AppError> {
        let metadata = json!({
            "snippet": {
                "title": request.title,
                "description": request.description,
                "tags": request.tags,
            },
            "status": {
                "privacyStatus": request.privacy_status,
                "selfDeclaredMadeForKids": false,
            },
        });

        let initiation = self
            .upload_http
            .post(&self.upload_url)
            .query(&[
                ("uploadType", "resumable"),
                ("part", "snippet,status"),
            ])
            .bearer_auth(access_token)
            .json(&metadata)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("YouTube upload initiation failed: {}", e)))?;

        let status = initiation.status();
        if !status.is_success() {
            let body = initiation.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "YouTube upload initiation rejected");
            return Err(AppError::Upstream(format!(
                "YouTube upload initiation returned {}",
                status
            )));
        }

        let session_uri = initiation
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .ok_or_else(|| {
                AppError::Upstream("YouTube upload initiation returned no session URI".to_string())
            })?;

        let upload = self
            .upload_http
            .put(&session_uri)
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_TYPE, "video/*")
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("YouTube byte upload failed: {}", e)))?;

        let status = upload.status();
        if !status.is_success() {
            let body = upload.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "YouTube byte upload rejected");
            return Err(AppError::Upstream(format!(
                "YouTube byte upload returned {}",
                status
            )));
        }

        let created: VideoResource = upload
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Invalid YouTube upload response: {}", e)))?;

        tracing::info!(video_id = %created.id, "Video published to YouTube");

        Ok(format!("https://www.youtube.com/watch?v={}", created.id))
    }

    // ─── Stats ───────────────────────────────────────────────────────────────

    /// Fetch view, like, and comment counts for one video.
    ///
    /// A well-formed response with an empty items list means the video does
    /// not exist (or is not visible to the token).
    pub async fn video_stats(
        &self,
        access_token: &str,
        video_id: &str,
    ) -> Result<VideoStats, AppError> {
        let response = self
            .http
            .get(format!("{}/videos", self.api_url))
            .query(&[("part", "statistics,snippet"), ("id", video_id)])
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("YouTube stats request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "YouTube stats returned {}",
                status
            )));
        }

        let body: VideoListResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Invalid YouTube stats response: {}", e)))?;

        let item = body
            .items
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("Video {}", video_id)))?;

        let statistics = item.statistics.unwrap_or_default();
        let snippet = item.snippet.unwrap_or_default();

        Ok(VideoStats {
            platform: Platform::Google,
            video_id: video_id.to_string(),
            url: format!("https://www.youtube.com/watch?v={}", video_id),
            title: snippet.title.unwrap_or_default(),
            view_count: parse_count(statistics.view_count),
            like_count: parse_count(statistics.like_count),
            comment_count: parse_count(statistics.comment_count),
            share_count: 0,
            reactions: BTreeMap::new(),
            published_at: snippet.published_at,
        })
    }
}

/// YouTube serializes statistics counters as decimal strings.
fn parse_count(value: Option<String>) -> u64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

fn client_with_timeout(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoListItem>,
}

#[derive(Debug, Deserialize)]
struct VideoListItem {
    statistics: Option<VideoStatistics>,
    snippet: Option<VideoSnippet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
    like_count: Option<String>,
    comment_count: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: Option<String>,
    published_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_strings_parse_to_u64() {
        assert_eq!(parse_count(Some("12345".to_string())), 12345);
        assert_eq!(parse_count(Some("not-a-number".to_string())), 0);
        assert_eq!(parse_count(None), 0);
    }

    #[test]
    fn endpoint_override_replaces_defaults() {
        let client = YouTubeClient::new()
            .with_endpoints("http://127.0.0.1:9999/upload".into(), "http://127.0.0.1:9999/api".into());
        assert_eq!(client.upload_url, "http://127.0.0.1:9999/upload");
        assert_eq!(client.api_url, "http://127.0.0.1:9999/api");
    }
}
