// SPDX-License-Identifier: MIT

//! Crosspost: identity, credential lifecycle, and cross-platform video
//! publishing for a media-generation backend.
//!
//! This crate provides local password sessions, Google and Facebook OAuth
//! linking, and a publishing dispatcher that routes uploads and stats
//! lookups to YouTube and Facebook Pages.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::CredentialStore;
use services::{
    AccountService, FacebookGraph, GoogleOAuth, IdentityResolver, Publisher, SessionAuthority,
    YouTubeClient,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn CredentialStore>,
    pub sessions: SessionAuthority,
    pub accounts: AccountService,
    pub identity: IdentityResolver,
    pub google: Arc<GoogleOAuth>,
    pub facebook: Arc<FacebookGraph>,
    pub publisher: Publisher,
}

impl AppState {
    /// Wire up all services over a store and configuration.
    pub fn new(config: Config, store: Arc<dyn CredentialStore>) -> Self {
        let sessions = SessionAuthority::new(
            config.auth_secret.clone(),
            config.access_ttl_minutes,
            config.refresh_ttl_days,
        );

        let google = Arc::new(GoogleOAuth::new(
            config.google_client_id.clone(),
            config.google_client_secret.clone(),
            config.google_redirect_uri.clone(),
        ));
        let facebook = Arc::new(FacebookGraph::new(
            config.facebook_app_id.clone(),
            config.facebook_app_secret.clone(),
            config.facebook_redirect_uri.clone(),
        ));
        let youtube = Arc::new(YouTubeClient::new());

        Self {
            accounts: AccountService::new(store.clone(), sessions.clone()),
            identity: IdentityResolver::new(store.clone()),
            publisher: Publisher::new(
                store.clone(),
                google.clone(),
                facebook.clone(),
                youtube,
            ),
            sessions,
            google,
            facebook,
            config,
            store,
        }
    }
}
