//! HTTP client for the external build service.
//!
//! The service accepts `POST {url}` with `{"blob_url": ...}` and answers
//! with a JSON object describing the accepted job. Completion is reported
//! later, out of band, on the notification queue.

use async_trait::async_trait;

use super::dispatcher::JobRequest;

/// Errors from the build-service call.
#[derive(Debug, thiserror::Error)]
pub enum BuildServiceError {
    /// The HTTP request itself failed (network, DNS, TLS, decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Build service error ({status}): {body}")]
    ApiError {
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response whose body was not a JSON object.
    #[error("Build service returned a non-object body: {0}")]
    UnexpectedBody(String),
}

/// Starts a build for a stored source file.
#[async_trait]
pub trait BuildService: Send + Sync {
    /// Trigger the build and return the service's JSON object response.
    async fn trigger(&self, request: &JobRequest) -> Result<serde_json::Value, BuildServiceError>;
}

/// [`BuildService`] over HTTP via [`reqwest`].
pub struct BuildServiceApi {
    client: reqwest::Client,
    url: String,
}

impl BuildServiceApi {
    /// * `url` - full endpoint, e.g. `http://host:8000/process-verilog/`.
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    // ---- private helpers ----

    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, BuildServiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(BuildServiceError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl BuildService for BuildServiceApi {
    async fn trigger(&self, request: &JobRequest) -> Result<serde_json::Value, BuildServiceError> {
        let body = serde_json::json!({ "blob_url": request.source_url });

        let response = self.client.post(&self.url).json(&body).send().await?;
        let response = Self::ensure_success(response).await?;
        let value: serde_json::Value = response.json().await?;

        require_object(value)
    }
}

/// Accept only a JSON object as a build-service response.
pub fn require_object(value: serde_json::Value) -> Result<serde_json::Value, BuildServiceError> {
    if value.is_object() {
        Ok(value)
    } else {
        Err(BuildServiceError::UnexpectedBody(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn object_body_is_accepted() {
        let value = json!({"job": "accepted"});
        assert_eq!(require_object(value.clone()).unwrap(), value);
    }

    #[test]
    fn non_object_bodies_are_rejected() {
        assert_matches!(
            require_object(json!(["accepted"])),
            Err(BuildServiceError::UnexpectedBody(_))
        );
        assert_matches!(
            require_object(json!("ok")),
            Err(BuildServiceError::UnexpectedBody(body)) if body == "\"ok\""
        );
    }
}
