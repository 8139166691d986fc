//! Domain primitives shared by every hdlbridge crate.
//!
//! - [`error`] -- the domain error enum mapped to HTTP statuses by the API.
//! - [`types`] -- primary key and timestamp aliases.
//! - [`credentials`] -- password, name and filename rules enforced at the edge.

pub mod credentials;
pub mod error;
pub mod types;
