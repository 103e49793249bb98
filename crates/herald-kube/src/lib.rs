//! Kubernetes implementation of [`herald_core::source::EventSource`].
//!
//! Lists `core/v1` events straight from the API server with a service
//! account token. Each fetch is a full, paginated list; deduplication is the
//! engine's job.

pub mod error;
pub mod source;
pub mod wire;

pub use error::{Error, Result};
pub use source::{KubeConfig, KubeEventSource};
