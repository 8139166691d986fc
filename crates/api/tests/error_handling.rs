//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no server needed.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use hdlbridge_api::engine::build_service::BuildServiceError;
use hdlbridge_api::engine::dispatcher::DispatchError;
use hdlbridge_api::error::AppError;
use hdlbridge_broker::BrokerError;
use hdlbridge_core::error::CoreError;
use hdlbridge_storage::StorageError;
use http_body_util::BodyExt;

/// Helper: convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

async fn dispatch(err: DispatchError) -> (StatusCode, serde_json::Value) {
    error_to_response(AppError::Dispatch(err)).await
}

#[tokio::test]
async fn not_found_error_returns_404() {
    let (status, json) = error_to_response(CoreError::not_found("Artifact", "design.v").into()).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Artifact 'design.v' not found");
}

#[tokio::test]
async fn validation_error_returns_400() {
    let (status, json) =
        error_to_response(CoreError::Validation("Filename must not be empty".into()).into()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn internal_error_returns_500_and_sanitizes_message() {
    let (status, json) =
        error_to_response(AppError::InternalError("secret connection string".into())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

#[tokio::test]
async fn dispatch_not_found_returns_404() {
    let (status, json) = dispatch(DispatchError::NotFound("design.v".into())).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn dispatch_conflict_returns_409() {
    let (status, json) = dispatch(DispatchError::Conflict("design.v".into())).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
}

#[tokio::test]
async fn dispatch_upstream_returns_502_without_leaking_body() {
    let (status, json) = dispatch(DispatchError::Upstream(BuildServiceError::ApiError {
        status: 503,
        body: "traceback: internal path /srv/build".into(),
    }))
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["code"], "UPSTREAM_ERROR");
    assert_eq!(json["error"], "Failed to process the file");
}

#[tokio::test]
async fn dispatch_broker_failure_returns_500() {
    let (status, json) = dispatch(DispatchError::BrokerUnavailable(BrokerError::Unavailable(
        "Connection to amqp://***@localhost:5672/%2F failed".into(),
    )))
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "BROKER_UNAVAILABLE");
    assert_eq!(json["error"], "Message broker unavailable");
}

#[tokio::test]
async fn dispatch_timeout_returns_504() {
    let (status, json) = dispatch(DispatchError::Timeout {
        job_id: "design.v".into(),
        waited: Duration::from_secs(30),
    })
    .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json["code"], "TIMEOUT");
}

#[tokio::test]
async fn dispatch_cancelled_returns_503() {
    let (status, json) = dispatch(DispatchError::Cancelled("design.v".into())).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn dispatch_store_failure_returns_500() {
    let (status, json) = dispatch(DispatchError::Store(sqlx::Error::PoolTimedOut)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
}

#[tokio::test]
async fn missing_stored_object_returns_404() {
    let (status, json) =
        error_to_response(StorageError::NotFound("uploads/1/design.v".into()).into()).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}
