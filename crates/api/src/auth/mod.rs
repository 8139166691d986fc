//! Authentication primitives.
//!
//! - [`password`] -- Argon2id hashing and verification for passwords and
//!   security answers.
//! - [`jwt`] -- JWT access-token generation and validation.

pub mod jwt;
pub mod password;
