//! Object storage for uploaded design files.
//!
//! [`ObjectStore`] is the seam the API layer depends on. [`S3ObjectStore`]
//! backs it with any S3-compatible service; [`MemoryObjectStore`] keeps
//! objects in process for tests.

pub mod config;
pub mod error;
pub mod memory;
pub mod s3;

pub use config::StorageConfig;
pub use error::StorageError;
pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

use async_trait::async_trait;

/// A stored object and its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Key/value blob storage with public URLs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `bytes` under `key`, replacing any existing object.
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StorageError>;

    /// Read the object under `key`.
    async fn get(&self, key: &str) -> Result<StoredObject, StorageError>;

    /// Delete the object under `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// The URL at which `key` is reachable by the build service.
    fn public_url(&self, key: &str) -> String;
}

/// Object key for a user's upload: `uploads/{user_id}/{filename}`.
pub fn upload_key(user_id: i64, filename: &str) -> String {
    format!("uploads/{user_id}/{filename}")
}
