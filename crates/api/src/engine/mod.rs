//! Job engine: resolves artifacts, triggers builds and bridges the
//! asynchronous completion notification back into the request.
//!
//! - [`artifacts`] -- document-store lookups behind [`artifacts::ArtifactLocator`].
//! - [`build_service`] -- HTTP client for the external build service.
//! - [`dispatcher`] -- [`dispatcher::JobDispatcher`], the per-request orchestrator.

pub mod artifacts;
pub mod build_service;
pub mod dispatcher;
