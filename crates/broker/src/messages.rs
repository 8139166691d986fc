//! Completion notifications published by the build pipeline.
//!
//! The pipeline publishes JSON objects of the shape
//! `{"file": "...", "status": "...", "path": "..."}`. Payloads arrive from
//! outside the trust boundary, so decoding is strict: unknown fields,
//! missing fields, non-string values and an empty `file` are all rejected.

use serde::{Deserialize, Serialize};

/// A build completion event for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationMessage {
    /// Job identifier (the uploaded filename) the event belongs to.
    pub file: String,
    /// Pipeline-defined status, e.g. `"done"` or `"failed"`.
    pub status: String,
    /// Location of the produced output.
    pub path: String,
}

/// Reasons a raw payload was refused.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Not valid JSON, or JSON not matching the notification schema.
    #[error("Malformed notification: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Schema-valid but semantically unusable.
    #[error("Invalid notification: {0}")]
    Invalid(&'static str),
}

/// Decode and validate a raw broker payload.
pub fn parse_notification(payload: &[u8]) -> Result<NotificationMessage, NotificationError> {
    let message: NotificationMessage = serde_json::from_slice(payload)?;
    if message.file.trim().is_empty() {
        return Err(NotificationError::Invalid("file must not be empty"));
    }
    Ok(message)
}
