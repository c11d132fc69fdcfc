#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use issuefleet_core::command::{CommandRequest, CommandResult};
use issuefleet_core::types::DbId;
use issuefleet_db::models::node::Node;
use sqlx::PgPool;
use tower::ServiceExt;

use issuefleet_api::config::ServerConfig;
use issuefleet_api::executor::{ExecutorError, NodeExecutor};
use issuefleet_api::router::build_app_router;
use issuefleet_api::state::AppState;

/// Registration key seeded into every test app.
pub const TEST_REGISTRATION_KEY: &str = "test-registration-key";

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        heartbeat_period_secs: 30,
        offline_timeout_multiplier: 3,
        node_agent_port: 8007,
        node_command_timeout_secs: 300,
        registration_key: Some(TEST_REGISTRATION_KEY.to_string()),
        public_server_url: "http://fleet.test:8000".to_string(),
        node_agent_image: "issuefleet/node-agent:test".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Scripted node executor
// ---------------------------------------------------------------------------

/// What the fake node answers to the next command.
#[derive(Debug, Clone)]
pub enum Scripted {
    Exit { code: i32, stderr: String },
    Unreachable,
    Timeout,
}

impl Scripted {
    pub fn ok() -> Self {
        Scripted::Exit {
            code: 0,
            stderr: String::new(),
        }
    }

    pub fn fail(code: i32, stderr: &str) -> Self {
        Scripted::Exit {
            code,
            stderr: stderr.to_string(),
        }
    }
}

/// [`NodeExecutor`] that records every request and replays scripted answers.
///
/// Once the script runs out every command succeeds with exit code 0.
#[derive(Default)]
pub struct FakeExecutor {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<(DbId, CommandRequest)>>,
}

impl FakeExecutor {
    pub fn scripted(answers: impl IntoIterator<Item = Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(answers.into_iter().collect()),
            requests: Mutex::default(),
        })
    }

    /// Requests received so far, as `(node_id, request)`.
    pub fn requests(&self) -> Vec<(DbId, CommandRequest)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl NodeExecutor for FakeExecutor {
    async fn execute(
        &self,
        node: &Node,
        request: &CommandRequest,
        timeout: Duration,
    ) -> Result<CommandResult, ExecutorError> {
        self.requests
            .lock()
            .unwrap()
            .push((node.id, request.clone()));
        let answer = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(Scripted::ok);

        match answer {
            Scripted::Exit { code, stderr } => Ok(CommandResult {
                command: request.command.clone(),
                args: request.args.clone(),
                exit_code: code,
                stdout: if code == 0 { "ok".to_string() } else { String::new() },
                stderr,
                duration_ms: 12,
            }),
            Scripted::Unreachable => Err(ExecutorError::Agent {
                status: 503,
                body: "agent shutting down".to_string(),
            }),
            Scripted::Timeout => Err(ExecutorError::Timeout {
                secs: timeout.as_secs(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// App builders
// ---------------------------------------------------------------------------

/// Build the full application router, with a fake executor whose commands
/// always succeed.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with_executor(pool, Arc::new(FakeExecutor::default()))
}

/// Build the full application router around the given executor.
///
/// Uses the same [`build_app_router`] as `main.rs`, so tests exercise the
/// production middleware stack (CORS, request ID, timeout, tracing, panic
/// recovery).
pub fn build_test_app_with_executor(pool: PgPool, executor: Arc<FakeExecutor>) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        executor,
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// GET with extra request headers, e.g. the caller context headers.
pub async fn get_with_headers(app: Router, uri: &str, headers: &[(&str, &str)]) -> Response<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, json_request(Method::POST, uri, body)).await
}

/// POST without a body.
pub async fn post(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn put_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, json_request(Method::PUT, uri, body)).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// Send a request on behalf of `owner_id`, with an optional JSON body.
pub async fn as_owner(
    app: Router,
    method: Method,
    uri: &str,
    owner_id: i64,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-owner-id", owner_id.to_string());
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    };
    send(app, request.unwrap()).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Create a node through the API and bring it live with an idle heartbeat.
pub async fn live_node(pool: &PgPool, name: &str) -> i64 {
    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/nodes",
        serde_json::json!({"name": name, "ip": "10.0.0.5"}),
    )
    .await;
    let id = body_json(response).await["data"]["id"].as_i64().unwrap();

    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/nodes/heartbeat",
        serde_json::json!({"node_id": id, "status": "idle"}),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    id
}

/// Create an issue through the API and return its id.
pub async fn create_issue(pool: &PgPool, body: serde_json::Value) -> i64 {
    let response = post_json(build_test_app(pool.clone()), "/api/v1/issues", body).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}
