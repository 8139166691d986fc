use std::sync::Arc;

use hdlbridge_storage::ObjectStore;

use crate::config::ServerConfig;
use crate::engine::dispatcher::JobDispatcher;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything heavy sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: hdlbridge_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Trigger-and-wait orchestrator; owns the correlation registry.
    pub dispatcher: Arc<JobDispatcher>,
    /// Blob storage for uploaded design files.
    pub storage: Arc<dyn ObjectStore>,
}
