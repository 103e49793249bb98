//! The `EventSource` trait: where domain events come from.

use std::future::Future;

use crate::{Result, event::DomainEvent};

/// Produces a finite batch of events per call.
///
/// Connectivity and authentication problems are reported as
/// [`Error::Transient`](crate::Error::Transient); the caller simply tries
/// again on its next tick.
pub trait EventSource: Send + Sync {
  fn fetch(&self) -> impl Future<Output = Result<Vec<DomainEvent>>> + Send + '_;
}
