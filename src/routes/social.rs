// SPDX-License-Identifier: MIT

//! Authenticated social publishing routes.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::{Platform, User, VideoStats, VideoUploadRequest};
use crate::routes::auth::UserResponse;
use crate::services::UploadOutcome;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(me))
        .route("/social/videos", post(upload_video))
        .route(
            "/social/videos/{platform}/{video_id}/stats",
            get(video_stats),
        )
}

/// Current user's profile.
async fn me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let user = load_user(&state, &auth).await?;
    Ok(Json(UserResponse::from(&user)))
}

/// Publish a video to the platform named in the request body.
async fn upload_video(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<VideoUploadRequest>,
) -> Result<Json<UploadOutcome>> {
    let user = load_user(&state, &auth).await?;

    tracing::info!(
        username = %user.username,
        platform = %body.platform,
        title = %body.title,
        "Upload requested"
    );

    let outcome = state.publisher.upload(&user, &body).await?;
    Ok(Json(outcome))
}

/// Fetch aggregated stats for a published video.
async fn video_stats(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path((platform, video_id)): Path<(String, String)>,
) -> Result<Json<VideoStats>> {
    let platform = Platform::from_str(&platform)?;
    let user = load_user(&state, &auth).await?;

    let stats = state.publisher.stats(&user, platform, &video_id).await?;
    Ok(Json(stats))
}

/// Tokens can outlive their user; a missing record means the session is no
/// longer valid.
async fn load_user(state: &Arc<AppState>, auth: &AuthUser) -> Result<User> {
    state
        .store
        .find_by_username(&auth.username)
        .await?
        .ok_or(AppError::Unauthorized)
}
