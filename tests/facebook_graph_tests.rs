// SPDX-License-Identifier: MIT

//! Facebook Graph adapter tests against a local mock server.
//!
//! Pins the degradation contract for stats aggregation: the basic-info call
//! is authoritative, every secondary count falls back to zero on failure.

use crosspost::error::AppError;
use crosspost::models::{FacebookCredential, Platform};
use crosspost::services::FacebookGraph;
use mockito::Matcher;

fn graph(server: &mockito::Server) -> FacebookGraph {
    FacebookGraph::new(
        "app-id".to_string(),
        "app-secret".to_string(),
        "http://localhost:8080/auth/facebook/callback".to_string(),
    )
    .with_graph_url(server.url())
}

fn credential() -> FacebookCredential {
    FacebookCredential {
        access_token: "user-token".to_string(),
        facebook_id: "1234".to_string(),
        pages: vec![],
    }
}

#[tokio::test]
async fn invalid_token_requires_reauthentication() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/debug_token")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("input_token".into(), "user-token".into()),
            Matcher::UrlEncoded("access_token".into(), "app-id|app-secret".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data":{"is_valid":false,"error":{"code":190,"message":"expired"}}}"#)
        .create_async()
        .await;

    let graph = graph(&server);
    let err = graph.validate(&credential()).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::ReAuthenticationRequired(Platform::Facebook)
    ));
    mock.assert_async().await;
}

#[tokio::test]
async fn valid_token_passes_through() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/debug_token")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data":{"is_valid":true,"app_id":"app-id"}}"#)
        .create_async()
        .await;

    let graph = graph(&server);
    let token = graph.validate(&credential()).await.unwrap();
    assert_eq!(token, "user-token");
}

#[tokio::test]
async fn debug_token_outage_is_upstream_not_reauth() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/debug_token")
        .match_query(Matcher::Any)
        .with_status(502)
        .create_async()
        .await;

    let graph = graph(&server);
    let err = graph.validate(&credential()).await.unwrap_err();
    assert!(matches!(err, AppError::Upstream(_)));
}

#[tokio::test]
async fn stats_degrade_secondary_failures_to_zero() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", "/vid123")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"id":"vid123","title":"Launch video","created_time":"2026-08-01T12:00:00+0000",
                "permalink_url":"/reel/vid123","views":420}"#,
        )
        .create_async()
        .await;

    // All six reaction types hit the same edge with a different type param.
    server
        .mock("GET", "/vid123/reactions")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data":[],"summary":{"total_count":7}}"#)
        .expect_at_least(6)
        .create_async()
        .await;

    // Comments edge is down; the count must degrade to zero.
    server
        .mock("GET", "/vid123/comments")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    server
        .mock("GET", "/vid123/sharedposts")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data":[],"summary":{"total_count":3}}"#)
        .create_async()
        .await;

    let graph = graph(&server);
    let stats = graph.video_stats("user-token", "vid123").await.unwrap();

    assert_eq!(stats.platform, Platform::Facebook);
    assert_eq!(stats.title, "Launch video");
    assert_eq!(stats.view_count, 420);
    assert_eq!(stats.url, "https://www.facebook.com/reel/vid123");
    assert_eq!(stats.like_count, 7);
    assert_eq!(stats.comment_count, 0);
    assert_eq!(stats.share_count, 3);
    assert_eq!(stats.reactions.len(), 6);
    assert_eq!(stats.reactions.get("ANGRY"), Some(&7));
}

#[tokio::test]
async fn stats_primary_failure_fails_the_call() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/vid404")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;

    let graph = graph(&server);
    let err = graph.video_stats("user-token", "vid404").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
