// SPDX-License-Identifier: MIT

//! Refresh cookie attribute tests.
//!
//! The refresh token lives only in an HttpOnly cookie scoped to /auth; these
//! tests pin the attributes for localhost and production-style frontends.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use crosspost::config::Config;
use serde_json::json;
use tower::ServiceExt;

mod common;

fn set_cookie_headers(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

fn find_cookie(headers: &[String], name: &str) -> String {
    headers
        .iter()
        .find(|value| value.starts_with(&format!("{name}=")))
        .cloned()
        .unwrap_or_else(|| panic!("missing Set-Cookie header for {name}: {headers:?}"))
}

async fn register_and_login(app: &Router) -> Response {
    let register = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"username": "alice", "password": "secret1"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(register.status(), StatusCode::CREATED);

    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"username": "alice", "password": "secret1"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn login_cookie_attributes_localhost() {
    let (app, state) = common::create_test_app();

    let response = register_and_login(&app).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookie_headers(&response);
    let refresh = find_cookie(&cookies, "refresh_token");

    assert!(refresh.contains("Path=/auth"));
    assert!(refresh.contains("HttpOnly"));
    assert!(refresh.contains("SameSite=Strict"));
    assert!(refresh.contains(&format!("Max-Age={}", state.sessions.refresh_ttl_secs())));
    // Localhost frontend: no Secure so the cookie works over plain http.
    assert!(!refresh.contains("Secure"));
}

#[tokio::test]
async fn login_cookie_is_secure_for_https_frontend() {
    let config = Config {
        frontend_url: "https://app.example.com".to_string(),
        ..Config::default()
    };
    let (app, _) = common::create_test_app_with_config(config);

    let response = register_and_login(&app).await;
    let cookies = set_cookie_headers(&response);
    let refresh = find_cookie(&cookies, "refresh_token");

    assert!(refresh.contains("Secure"));
    assert!(refresh.contains("HttpOnly"));
    assert!(refresh.contains("SameSite=Strict"));
}

#[tokio::test]
async fn logout_clears_refresh_cookie() {
    let (app, _) = common::create_test_app();
    register_and_login(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/logout")
                .header(header::COOKIE, "refresh_token=whatever")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookie_headers(&response);
    let removal = find_cookie(&cookies, "refresh_token");
    assert!(removal.contains("Max-Age=0"));
    assert!(removal.contains("Path=/auth"));
}

#[tokio::test]
async fn refresh_without_cookie_is_unauthorized() {
    let (app, _) = common::create_test_app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
