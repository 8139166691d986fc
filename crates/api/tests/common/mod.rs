#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use hdlbridge_api::auth::jwt::JwtConfig;
use hdlbridge_api::config::ServerConfig;
use hdlbridge_api::engine::artifacts::{ArtifactLocator, PgArtifactLocator};
use hdlbridge_api::engine::build_service::{BuildService, BuildServiceError};
use hdlbridge_api::engine::dispatcher::{DispatchSettings, JobDispatcher, JobRequest};
use hdlbridge_api::router::build_app_router;
use hdlbridge_api::state::AppState;
use hdlbridge_broker::config::BrokerConfig;
use hdlbridge_broker::memory::MemoryBroker;
use hdlbridge_broker::NotificationMessage;
use hdlbridge_storage::{MemoryObjectStore, StorageConfig};
use http_body_util::BodyExt;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

pub const QUEUE: &str = "build_notifications";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 60,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 30,
        },
        broker: BrokerConfig::default(),
        storage: StorageConfig::default(),
        build_service_url: "http://build.invalid/process-verilog/".to_string(),
        job_wait_timeout: Duration::from_secs(30),
        job_poll_slice: Duration::from_secs(1),
    }
}

/// A pool that never connects unless a query runs. For tests whose
/// collaborators are all faked.
pub fn lazy_pool() -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(1))
        .connect_lazy("postgres://hdlbridge@localhost/unused")
        .unwrap()
}

/// Router plus handles on the in-process collaborators behind it.
pub struct TestApp {
    pub router: Router,
    pub broker: MemoryBroker,
    pub dispatcher: Arc<JobDispatcher>,
    pub storage: Arc<MemoryObjectStore>,
    pub shutdown: CancellationToken,
}

/// Full app over a real database: artifacts resolve through Postgres and
/// every build completes with status `done`.
pub fn build_test_app(pool: PgPool) -> TestApp {
    let broker = MemoryBroker::new();
    let locator = Arc::new(PgArtifactLocator::new(pool.clone()));
    let build = ScriptedBuildService::completing(&broker, "done");
    build_test_app_with(pool, locator, broker, build, Duration::from_secs(30))
}

pub fn build_test_app_with(
    pool: PgPool,
    locator: Arc<dyn ArtifactLocator>,
    broker: MemoryBroker,
    build: ScriptedBuildService,
    wait_timeout: Duration,
) -> TestApp {
    let config = test_config();
    let shutdown = CancellationToken::new();
    let storage = Arc::new(MemoryObjectStore::new());

    let dispatcher = Arc::new(JobDispatcher::new(
        Arc::new(broker.clone()),
        locator,
        Arc::new(build),
        DispatchSettings {
            queue: QUEUE.to_string(),
            wait_timeout,
            poll_slice: Duration::from_secs(1),
        },
        shutdown.clone(),
    ));

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        dispatcher: Arc::clone(&dispatcher),
        storage: storage.clone(),
    };

    TestApp {
        router: build_app_router(state, &config),
        broker,
        dispatcher,
        storage,
        shutdown,
    }
}

// ---------------------------------------------------------------------------
// Collaborator doubles
// ---------------------------------------------------------------------------

/// Resolves job ids from a fixed map.
#[derive(Default)]
pub struct StaticLocator {
    urls: HashMap<String, String>,
}

impl StaticLocator {
    pub fn with(job_id: &str, url: &str) -> Arc<Self> {
        Arc::new(Self {
            urls: HashMap::from([(job_id.to_string(), url.to_string())]),
        })
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ArtifactLocator for StaticLocator {
    async fn find_source_url(&self, job_id: &str) -> Result<Option<String>, sqlx::Error> {
        Ok(self.urls.get(job_id).cloned())
    }

    async fn update_status(&self, _job_id: &str, _status: &str) -> Result<(), sqlx::Error> {
        Ok(())
    }
}

/// Build service double. Answers every trigger the same way and, when
/// configured, publishes the completion notification for the job.
pub struct ScriptedBuildService {
    broker: MemoryBroker,
    reply: Result<serde_json::Value, u16>,
    completes_with: Option<&'static str>,
    pub requests: Mutex<Vec<JobRequest>>,
}

impl ScriptedBuildService {
    /// Accepts the job and never reports completion.
    pub fn silent(broker: &MemoryBroker) -> Self {
        Self {
            broker: broker.clone(),
            reply: Ok(serde_json::json!({"message": "accepted"})),
            completes_with: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Accepts the job and publishes a notification with `status`.
    pub fn completing(broker: &MemoryBroker, status: &'static str) -> Self {
        Self {
            completes_with: Some(status),
            ..Self::silent(broker)
        }
    }

    /// Fails every trigger with HTTP `status`.
    pub fn failing(broker: &MemoryBroker, status: u16) -> Self {
        Self {
            reply: Err(status),
            ..Self::silent(broker)
        }
    }
}

#[async_trait]
impl BuildService for ScriptedBuildService {
    async fn trigger(&self, request: &JobRequest) -> Result<serde_json::Value, BuildServiceError> {
        self.requests.lock().unwrap().push(request.clone());

        let value = match &self.reply {
            Ok(value) => value.clone(),
            Err(status) => {
                return Err(BuildServiceError::ApiError {
                    status: *status,
                    body: "Service Unavailable".into(),
                })
            }
        };

        if let Some(status) = self.completes_with {
            let stem = request.job_id.trim_end_matches(".v");
            self.broker.publish_notification(
                QUEUE,
                &NotificationMessage {
                    file: request.job_id.clone(),
                    status: status.to_string(),
                    path: format!("/out/{stem}.gds"),
                },
            );
        }
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, Body::empty(), None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), Body::empty(), None).await
}

pub async fn post_empty(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::POST, uri, None, Body::empty(), None).await
}

pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    send(
        app,
        Method::POST,
        uri,
        None,
        Body::from(json.to_string()),
        Some("application/json"),
    )
    .await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), Body::empty(), None).await
}

/// Upload `contents` as the multipart `file` field.
pub async fn upload_file(
    app: Router,
    token: &str,
    filename: &str,
    contents: &str,
) -> Response<Body> {
    const BOUNDARY: &str = "hdlbridge-test-boundary";
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         {contents}\r\n\
         --{BOUNDARY}--\r\n"
    );
    send(
        app,
        Method::POST,
        "/api/v1/artifacts",
        Some(token),
        Body::from(body),
        Some(&format!("multipart/form-data; boundary={BOUNDARY}")),
    )
    .await
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Body,
    content_type: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}
