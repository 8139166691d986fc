use std::net::SocketAddr;
use std::sync::Arc;

use hdlbridge_api::config::ServerConfig;
use hdlbridge_api::engine::artifacts::PgArtifactLocator;
use hdlbridge_api::engine::build_service::BuildServiceApi;
use hdlbridge_api::engine::dispatcher::{DispatchSettings, JobDispatcher};
use hdlbridge_api::router::build_app_router;
use hdlbridge_api::state::AppState;
use hdlbridge_broker::amqp::AmqpConnector;
use hdlbridge_storage::S3ObjectStore;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "hdlbridge_api=debug,hdlbridge_broker=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        broker = %config.broker.redacted_url(),
        queue = %config.broker.queue,
        build_service = %config.build_service_url,
        wait_timeout_secs = config.job_wait_timeout.as_secs(),
        "Loaded server configuration",
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = hdlbridge_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    hdlbridge_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    hdlbridge_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Object storage ---
    let storage = Arc::new(S3ObjectStore::connect(&config.storage).await);

    // --- Job dispatcher ---
    // Cancelled on shutdown so in-flight waits end instead of holding the drain.
    let shutdown = CancellationToken::new();
    let dispatcher = Arc::new(JobDispatcher::new(
        Arc::new(AmqpConnector::new(config.broker.clone())),
        Arc::new(PgArtifactLocator::new(pool.clone())),
        Arc::new(BuildServiceApi::new(config.build_service_url.clone())),
        DispatchSettings {
            queue: config.broker.queue.clone(),
            wait_timeout: config.job_wait_timeout,
            poll_slice: config.job_poll_slice,
        },
        shutdown.clone(),
    ));

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        dispatcher: Arc::clone(&dispatcher),
        storage,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal_token.cancel();
        })
        .await
        .expect("Server error");

    tracing::info!(
        pending_waits = dispatcher.registry().len(),
        "Graceful shutdown complete",
    );
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
