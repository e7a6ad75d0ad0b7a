// SPDX-License-Identifier: MIT

//! Account and OAuth authentication routes.
//!
//! Access tokens travel in JSON response bodies and are presented back in
//! the Authorization header. Refresh tokens only ever live in an HttpOnly
//! cookie scoped to /auth, so script code never sees them.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{Platform, SocialCredential, User};
use crate::services::oauth_state::{sign_state, verify_state};
use crate::services::SessionTokens;
use crate::AppState;

const REFRESH_COOKIE: &str = "refresh_token";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/google", get(google_start))
        .route("/auth/google/callback", get(google_callback))
        .route("/auth/facebook", get(facebook_start))
        .route("/auth/facebook/callback", get(facebook_callback))
}

// ─── Local Accounts ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterRequest {
    username: String,
    password: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
}

/// Public view of a user record.
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
    pub linked_platforms: Vec<Platform>,
    pub created_at: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        let mut linked_platforms: Vec<Platform> =
            user.social_credentials.keys().copied().collect();
        linked_platforms.sort_by_key(|p| p.to_string());
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            avatar: user.avatar.clone(),
            linked_platforms,
            created_at: user.created_at.clone(),
        }
    }
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(axum::http::StatusCode, Json<UserResponse>)> {
    let user = state
        .accounts
        .register(
            &body.username,
            body.email.as_deref(),
            &body.password,
            body.full_name.as_deref(),
        )
        .await?;

    Ok((axum::http::StatusCode::CREATED, Json(UserResponse::from(&user))))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<TokenResponse>)> {
    let (_, tokens) = state.accounts.login(&body.username, &body.password).await?;

    let jar = jar.add(refresh_cookie(&state, &tokens));
    Ok((jar, Json(token_response(&state, tokens))))
}

/// Trade the refresh cookie for a new access token.
async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<TokenResponse>> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(AppError::Unauthorized)?;

    let (_, access_token) = state.accounts.refresh(&token).await?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: state.sessions.access_ttl_secs(),
    }))
}

/// Clear the refresh cookie. Access tokens simply age out.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Json<serde_json::Value>) {
    let mut removal = Cookie::new(REFRESH_COOKIE, "");
    removal.set_path("/auth");
    removal.set_http_only(true);
    removal.set_same_site(SameSite::Strict);
    removal.set_secure(cookie_secure(&state));
    removal.set_max_age(time::Duration::ZERO);

    (jar.add(removal), Json(serde_json::json!({"status": "logged_out"})))
}

// ─── OAuth Flows ─────────────────────────────────────────────────────────────

/// Query parameters for starting an OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Frontend URL to redirect back to after OAuth completes.
    #[serde(default)]
    redirect_uri: Option<String>,
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

async fn google_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
) -> Result<Redirect> {
    let oauth_state = signed_start_state(&state, params)?;
    let auth_url = state.google.authorization_url(&oauth_state);

    tracing::info!("Starting Google OAuth flow");
    Ok(Redirect::temporary(&auth_url))
}

async fn facebook_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
) -> Result<Redirect> {
    let oauth_state = signed_start_state(&state, params)?;
    let auth_url = state.facebook.authorization_url(&oauth_state);

    tracing::info!("Starting Facebook OAuth flow");
    Ok(Redirect::temporary(&auth_url))
}

async fn google_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    let frontend_url = callback_frontend_url(&state, params.state.as_deref());

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Google");
        return Ok((jar, Redirect::temporary(&format!("{}?error={}", frontend_url, error))));
    }
    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let (identity, credential) = state.google.exchange_code(&code).await?;
    let user = state
        .identity
        .link_or_create(&identity, Platform::Google, SocialCredential::Google(credential))
        .await?;

    finish_oauth_login(&state, jar, &frontend_url, &user)
}

async fn facebook_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    let frontend_url = callback_frontend_url(&state, params.state.as_deref());

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Facebook");
        return Ok((jar, Redirect::temporary(&format!("{}?error={}", frontend_url, error))));
    }
    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let (identity, credential) = state.facebook.exchange_code(&code).await?;
    let user = state
        .identity
        .link_or_create(
            &identity,
            Platform::Facebook,
            SocialCredential::Facebook(credential),
        )
        .await?;

    finish_oauth_login(&state, jar, &frontend_url, &user)
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn signed_start_state(state: &Arc<AppState>, params: AuthStartParams) -> Result<String> {
    let frontend_url = params
        .redirect_uri
        .unwrap_or_else(|| state.config.frontend_url.clone());

    sign_state(&frontend_url, &state.config.oauth_state_key)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("OAuth state signing failed")))
}

/// Recover the frontend URL from the state parameter, falling back to the
/// configured default when the state is missing or tampered.
fn callback_frontend_url(state: &Arc<AppState>, oauth_state: Option<&str>) -> String {
    oauth_state
        .and_then(|s| verify_state(s, &state.config.oauth_state_key))
        .unwrap_or_else(|| {
            tracing::warn!("Invalid or missing OAuth state, falling back to default frontend URL");
            state.config.frontend_url.clone()
        })
}

/// Mint a session pair, set the refresh cookie, and bounce to the frontend
/// with the access token.
fn finish_oauth_login(
    state: &Arc<AppState>,
    jar: CookieJar,
    frontend_url: &str,
    user: &User,
) -> Result<(CookieJar, Redirect)> {
    let tokens = state.accounts.mint(user)?;

    tracing::info!(username = %user.username, "OAuth login complete");

    let redirect_url = format!("{}/callback?token={}", frontend_url, tokens.access_token);
    let jar = jar.add(refresh_cookie(state, &tokens));
    Ok((jar, Redirect::temporary(&redirect_url)))
}

fn cookie_secure(state: &Arc<AppState>) -> bool {
    let frontend = &state.config.frontend_url;
    !(frontend.starts_with("http://localhost") || frontend.starts_with("http://127.0.0.1"))
}

fn refresh_cookie(state: &Arc<AppState>, tokens: &SessionTokens) -> Cookie<'static> {
    let mut cookie = Cookie::new(REFRESH_COOKIE, tokens.refresh_token.clone());
    cookie.set_path("/auth");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_secure(cookie_secure(state));
    cookie.set_max_age(time::Duration::seconds(state.sessions.refresh_ttl_secs()));
    cookie
}

fn token_response(state: &Arc<AppState>, tokens: SessionTokens) -> TokenResponse {
    TokenResponse {
        access_token: tokens.access_token,
        token_type: "bearer".to_string(),
        expires_in: state.sessions.access_ttl_secs(),
    }
}
