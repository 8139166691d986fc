pub mod artifacts;
pub mod auth;
pub mod jobs;
