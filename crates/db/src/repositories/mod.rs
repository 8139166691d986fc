//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod artifact_repo;
pub mod user_repo;

pub use artifact_repo::ArtifactRepo;
pub use user_repo::UserRepo;
