//! Integration tests for the bulk provisioning trigger.

mod common;

use axum::http::StatusCode;
use common::{body_bytes, body_json, TestApp};
use toolz_vcs::memory::VcsCall;

fn project_keys(calls: &[VcsCall]) -> Vec<String> {
    calls
        .iter()
        .filter_map(|c| match c {
            VcsCall::CreateProject { key, .. } => Some(key.clone()),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Test: valid request is accepted with an empty body and provisions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn provisioning_request_is_accepted_and_runs() {
    let app = TestApp::new();

    let response = app
        .get("/repositories?prefix=LOAD&repositories=2&projects=3")
        .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(body_bytes(response).await.is_empty());

    app.drain().await;

    let calls = app.vcs.calls();
    let keys = project_keys(&calls);
    assert_eq!(keys.len(), 3);
    for (i, key) in keys.iter().enumerate() {
        assert!(key.starts_with("LOAD-"), "unexpected key {key}");
        assert!(key.ends_with(&i.to_string()), "unexpected key {key}");
    }
    let repositories = calls
        .iter()
        .filter(|c| matches!(c, VcsCall::CreateRepository { .. }))
        .count();
    assert_eq!(repositories, 6);
    assert!(calls.iter().all(|c| c.user_id() == 1));
    assert!(app.state.registry.is_empty());
}

// ---------------------------------------------------------------------------
// Test: legacy REST path is served too
// ---------------------------------------------------------------------------

#[tokio::test]
async fn legacy_path_is_accepted() {
    let app = TestApp::new();

    let response = app
        .get("/rest/toolz/1.0/repositories?prefix=OLD&repositories=1&projects=1")
        .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    app.drain().await;
    assert_eq!(app.vcs.calls().len(), 2);
}

// ---------------------------------------------------------------------------
// Test: zero counts are accepted and make no calls
// ---------------------------------------------------------------------------

#[tokio::test]
async fn zero_projects_make_no_calls() {
    let app = TestApp::new();

    let response = app
        .get("/repositories?prefix=LOAD&repositories=5&projects=0")
        .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    app.drain().await;
    assert!(app.vcs.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Test: empty prefix fails validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_prefix_is_rejected() {
    let app = TestApp::new();

    let response = app
        .get("/repositories?prefix=&repositories=1&projects=1")
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(app.state.registry.is_empty());
}

// ---------------------------------------------------------------------------
// Test: missing or non-numeric counts are rejected
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_counts_are_rejected() {
    let app = TestApp::new();

    let missing = app.get("/repositories?prefix=LOAD&projects=1").await;
    let negative = app
        .get("/repositories?prefix=LOAD&repositories=-1&projects=1")
        .await;

    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    assert_eq!(negative.status(), StatusCode::BAD_REQUEST);
    app.drain().await;
    assert!(app.vcs.calls().is_empty());
}
