//! Entity structs and DTOs.
//!
//! Each submodule contains a `FromRow` entity matching the database row,
//! a `Serialize` response type where the row holds secrets, and the
//! create DTO used for inserts.

pub mod artifact;
pub mod user;
