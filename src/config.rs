// SPDX-License-Identifier: MIT

//! Application configuration loaded from environment variables.
//!
//! Secrets are read once at startup and cached in memory; in production the
//! deployment platform injects them as environment variables.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Non-sensitive ---
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// GCP project ID (Firestore credential store)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,

    // --- Session tokens ---
    /// HMAC signing secret for session tokens (raw bytes)
    pub auth_secret: Vec<u8>,
    /// Access token lifetime in minutes
    pub access_ttl_minutes: i64,
    /// Refresh token lifetime in days
    pub refresh_ttl_days: i64,
    /// HMAC key for signing OAuth `state` parameters
    pub oauth_state_key: Vec<u8>,

    // --- Google OAuth ---
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_uri: String,

    // --- Facebook OAuth ---
    pub facebook_app_id: String,
    pub facebook_app_secret: String,
    pub facebook_redirect_uri: String,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            auth_secret: b"test_auth_secret_32_bytes_min!!!".to_vec(),
            access_ttl_minutes: 30,
            refresh_ttl_days: 7,
            oauth_state_key: b"test_oauth_state_key".to_vec(),
            google_client_id: "test-google-client-id".to_string(),
            google_client_secret: "test-google-secret".to_string(),
            google_redirect_uri: "http://localhost:8080/auth/google/callback".to_string(),
            facebook_app_id: "test-facebook-app-id".to_string(),
            facebook_app_secret: "test-facebook-secret".to_string(),
            facebook_redirect_uri: "http://localhost:8080/auth/facebook/callback".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            auth_secret: env::var("AUTH_SECRET")
                .map_err(|_| ConfigError::Missing("AUTH_SECRET"))?
                .into_bytes(),
            access_ttl_minutes: parse_env_i64("ACCESS_TOKEN_TTL_MINUTES", 30)?,
            refresh_ttl_days: parse_env_i64("REFRESH_TOKEN_TTL_DAYS", 7)?,
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map_err(|_| ConfigError::Missing("OAUTH_STATE_KEY"))?
                .into_bytes(),

            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_ID"))?,
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_SECRET"))?,
            google_redirect_uri: env::var("GOOGLE_REDIRECT_URI")
                .map_err(|_| ConfigError::Missing("GOOGLE_REDIRECT_URI"))?,

            facebook_app_id: env::var("FACEBOOK_APP_ID")
                .map_err(|_| ConfigError::Missing("FACEBOOK_APP_ID"))?,
            facebook_app_secret: env::var("FACEBOOK_APP_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("FACEBOOK_APP_SECRET"))?,
            facebook_redirect_uri: env::var("FACEBOOK_REDIRECT_URI")
                .map_err(|_| ConfigError::Missing("FACEBOOK_REDIRECT_URI"))?,
        })
    }
}

fn parse_env_i64(name: &'static str, default: i64) -> Result<i64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
