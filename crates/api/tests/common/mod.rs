#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use toolz_api::config::{ServerConfig, VcsBackendKind};
use toolz_api::router::build_app_router;
use toolz_api::state::AppState;
use toolz_core::identity::Identity;
use toolz_pipeline::HookKeys;
use toolz_vcs::memory::InMemoryVcs;

pub const TEST_SECRET: &str = "test-webhook-secret";

/// Build a test `ServerConfig` against the in-memory backend.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        vcs_backend: VcsBackendKind::Memory,
        vcs_base_url: "http://localhost:7990".to_string(),
        vcs_request_timeout_secs: 60,
        system_user: Identity::new(1, "admin"),
        dispatcher_pool_size: 4,
        hook_keys: HookKeys::default(),
        webhook_secret: None,
    }
}

/// Application under test plus handles to inspect it.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub vcs: Arc<InMemoryVcs>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let vcs = Arc::new(InMemoryVcs::new());
        let state = AppState::with_vcs(config, vcs.clone());
        let router = build_app_router(state.clone());
        Self { router, state, vcs }
    }

    pub fn with_secret() -> Self {
        let mut config = test_config();
        config.webhook_secret = Some(TEST_SECRET.to_string());
        Self::with_config(config)
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(
            Request::builder()
                .method(Method::GET)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: &serde_json::Value) -> Response {
        self.post_raw(uri, body.to_string(), None).await
    }

    pub async fn post_raw(&self, uri: &str, body: String, signature: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header("x-hub-signature", signature);
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    /// Wait for every queued background task and job to finish.
    pub async fn drain(&self) {
        self.state.shutdown().await;
    }
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn repository_json(name: &str) -> serde_json::Value {
    serde_json::json!({
        "id": 11,
        "slug": name.to_lowercase(),
        "name": name,
        "scmId": "git",
        "project": { "id": 3, "key": "LOAD", "name": "Load" },
    })
}

pub fn branch_change(display_id: &str) -> serde_json::Value {
    serde_json::json!({
        "ref": {
            "id": format!("refs/heads/{display_id}"),
            "displayId": display_id,
            "type": "BRANCH",
        },
        "refId": format!("refs/heads/{display_id}"),
        "fromHash": "0000000000000000000000000000000000000000",
        "toHash": "1111111111111111111111111111111111111111",
        "type": "ADD",
    })
}

pub fn refs_changed(repository: &str, changes: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({
        "eventKey": "repo:refs_changed",
        "repository": repository_json(repository),
        "changes": changes,
    })
}
