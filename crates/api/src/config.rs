use std::time::Duration;

use hdlbridge_broker::config::BrokerConfig;
use hdlbridge_storage::StorageConfig;

use crate::auth::jwt::JwtConfig;

/// Default build-service endpoint.
pub const DEFAULT_BUILD_SERVICE_URL: &str = "http://0.0.0.0:8000/process-verilog/";

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `60`). Must exceed the
    /// job wait budget or `/process` requests are cut off with 408 first.
    pub request_timeout_secs: u64,
    pub jwt: JwtConfig,
    pub broker: BrokerConfig,
    pub storage: StorageConfig,
    /// Endpoint that starts a build for `{"blob_url": ...}`.
    pub build_service_url: String,
    /// How long `/process` waits for the completion notification.
    pub job_wait_timeout: Duration,
    /// Upper bound on each broker drain while waiting.
    pub job_poll_slice: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                                       |
    /// |-------------------------|-----------------------------------------------|
    /// | `HOST`                  | `0.0.0.0`                                     |
    /// | `PORT`                  | `3000`                                        |
    /// | `CORS_ORIGINS`          | `http://localhost:3000,http://localhost:3001` |
    /// | `REQUEST_TIMEOUT_SECS`  | `60`                                          |
    /// | `BUILD_SERVICE_URL`     | `http://0.0.0.0:8000/process-verilog/`        |
    /// | `JOB_WAIT_TIMEOUT_SECS` | `30`                                          |
    /// | `JOB_POLL_SLICE_MS`     | `1000`                                        |
    ///
    /// JWT, broker and storage settings are read by their own `from_env`.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://localhost:3001".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let build_service_url = std::env::var("BUILD_SERVICE_URL")
            .unwrap_or_else(|_| DEFAULT_BUILD_SERVICE_URL.into());

        let job_wait_timeout_secs: u64 = std::env::var("JOB_WAIT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("JOB_WAIT_TIMEOUT_SECS must be a valid u64");

        let job_poll_slice_ms: u64 = std::env::var("JOB_POLL_SLICE_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("JOB_POLL_SLICE_MS must be a valid u64");

        if job_wait_timeout_secs >= request_timeout_secs {
            tracing::warn!(
                job_wait_timeout_secs,
                request_timeout_secs,
                "Job wait budget is not shorter than the request timeout",
            );
        }

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            jwt: JwtConfig::from_env(),
            broker: BrokerConfig::from_env(),
            storage: StorageConfig::from_env(),
            build_service_url,
            job_wait_timeout: Duration::from_secs(job_wait_timeout_secs),
            job_poll_slice: Duration::from_millis(job_poll_slice_ms),
        }
    }
}
