// SPDX-License-Identifier: MIT

use crosspost::config::Config;
use crosspost::db::MemoryStore;
use crosspost::routes::create_router;
use crosspost::AppState;
use std::sync::Arc;

/// Create a test app over an in-memory store with default test config.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with_config(Config::default())
}

/// Create a test app with a custom config (frontend URL, TTLs).
#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> (axum::Router, Arc<AppState>) {
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState::new(config, store));
    (create_router(state.clone()), state)
}
