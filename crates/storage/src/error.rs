/// Errors raised by object stores.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object '{0}' not found")]
    NotFound(String),

    /// The backing service rejected or failed the request.
    #[error("Storage backend error: {0}")]
    Backend(String),
}
