//! Error types for `herald-core`.
//!
//! One taxonomy is shared by the store, the collaborators, and the engine so
//! callers can tell a retry-next-tick failure from a lifecycle rejection
//! without downcasting.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::report::{LifecycleState, TrackedObjectId};

#[derive(Debug, Error)]
pub enum Error {
  /// The event source or the notification surface is temporarily
  /// unreachable. Retried on the next tick.
  #[error("transient failure: {0}")]
  Transient(String),

  /// A collaborator call did not finish within the configured timeout.
  #[error("{call} timed out after {after:?}")]
  Timeout { call: &'static str, after: Duration },

  /// An open report already exists for this tracked object.
  #[error("an open report already exists for tracked object {0}")]
  Conflict(TrackedObjectId),

  #[error("report not found: {0}")]
  ReportNotFound(Uuid),

  #[error("report {report_id} is {state}; cannot {action}")]
  InvalidState {
    report_id: Uuid,
    state:     LifecycleState,
    action:    &'static str,
  },

  /// Rendering or transport failure on the notification surface.
  #[error("notification sink error: {0}")]
  Sink(String),

  /// A mutation would have produced a record that breaks a report
  /// invariant. Only the current operation is aborted.
  #[error("report invariant violated: {0}")]
  Invariant(String),
}

impl Error {
  /// Whether the failure is expected to clear up on its own by the next
  /// poll cycle.
  pub fn is_transient(&self) -> bool {
    matches!(
      self,
      Self::Transient(_) | Self::Timeout { .. } | Self::Sink(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
