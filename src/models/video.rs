// SPDX-License-Identifier: MIT

//! Video publishing request and stats DTOs.

use crate::models::Platform;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_privacy() -> String {
    "private".to_string()
}

/// Request to publish a video to a platform.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoUploadRequest {
    pub platform: Platform,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_privacy")]
    pub privacy_status: String,
    /// Remotely hosted media file to publish
    pub file_url: String,
    /// Target Facebook Page. Required when `platform` is `facebook`;
    /// ignored for YouTube.
    #[serde(default)]
    pub page_id: Option<String>,
}

/// Aggregated per-video statistics, normalized across platforms.
#[derive(Debug, Clone, Serialize)]
pub struct VideoStats {
    pub platform: Platform,
    pub video_id: String,
    pub url: String,
    pub title: String,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub share_count: u64,
    /// Per-reaction-type counts (Facebook only; empty for YouTube)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub reactions: BTreeMap<String, u64>,
    pub published_at: Option<String>,
}
