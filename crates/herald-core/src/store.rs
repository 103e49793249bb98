//! The `ReportStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `herald-store-memory`).
//! The engine and the HTTP layer depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  Result,
  report::{Report, TrackedObjectId},
};

/// Abstraction over the authoritative copy of every report.
///
/// Callers receive owned clones; the only way to change a stored report is
/// through [`put`](ReportStore::put), [`mutate`](ReportStore::mutate) and
/// [`remove`](ReportStore::remove), each atomic with respect to its key.
///
/// All methods return `Send` futures so one store can be shared by the
/// reconciliation task, the staleness task, and the HTTP handlers.
pub trait ReportStore: Send + Sync {
  /// Insert a new report.
  ///
  /// Fails with [`Error::Conflict`](crate::Error::Conflict) if an active or
  /// acknowledged report already exists for the same tracked object.
  fn put(&self, report: Report) -> impl Future<Output = Result<()>> + Send + '_;

  /// The open report for `id`, or a deleted one that has not been removed
  /// yet. `None` if neither exists.
  fn get_by_tracked_object_id<'a>(
    &'a self,
    id: &'a TrackedObjectId,
  ) -> impl Future<Output = Result<Option<Report>>> + Send + 'a;

  fn get_by_report_id(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Report>>> + Send + '_;

  /// Snapshot of all active and acknowledged reports, oldest first.
  fn list_active(&self) -> impl Future<Output = Result<Vec<Report>>> + Send + '_;

  /// Atomically apply `update` to the stored report and return the result.
  ///
  /// If `update` fails, nothing is written and its error is returned. The
  /// edited record is validated with
  /// [`check_transition`](crate::report::check_transition) before it is
  /// persisted, and `last_updated_at` is stamped by the store.
  fn mutate<F>(
    &self,
    id: Uuid,
    update: F,
  ) -> impl Future<Output = Result<Report>> + Send + '_
  where
    F: FnOnce(&mut Report) -> Result<()> + Send + 'static;

  /// Drop a deleted report. Fails with
  /// [`Error::InvalidState`](crate::Error::InvalidState) if it is still open.
  fn remove(&self, id: Uuid) -> impl Future<Output = Result<()>> + Send + '_;
}
