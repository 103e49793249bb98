//! The reconciliation core of Herald.
//!
//! - [`engine`] turns batches of domain events into reports and messages.
//! - [`staleness`] re-checks existing reports against the notification
//!   surface.
//! - [`scheduler`] runs both on independent cadences.
//! - [`service`] wires the three together behind a start/stop handle.
//!
//! Every collaborator call made from this crate is bounded by a timeout so a
//! hung chat server or API server cannot stall a task forever.

pub mod config;
pub mod engine;
pub mod scheduler;
pub mod service;
pub mod staleness;

pub use config::{Cadences, EngineConfig};
pub use engine::{AcknowledgeOutcome, Decision, Evaluation, ReconciliationEngine};
pub use service::{ErrorHook, Herald, HeraldHandle};
pub use staleness::{StalenessReconciler, Sweep};

use std::{future::Future, time::Duration};

use herald_core::{
  Error, Result, notice::Notice, report::Report, sink::NotificationSink, store::ReportStore,
};

/// How many times [`publish`] chases a report that keeps moving.
const PUBLISH_ROUNDS: usize = 3;

/// Run a collaborator call, giving up after `after`.
pub(crate) async fn bounded<T>(
  after: Duration,
  call: &'static str,
  fut: impl Future<Output = Result<T>>,
) -> Result<T> {
  tokio::time::timeout(after, fut)
    .await
    .map_err(|_| Error::Timeout { call, after })?
}

/// Show `report` on its message, then keep the message in step with the
/// store.
///
/// Writers render outside the store lock, so a slow update can land after a
/// newer one and show an older state. After each push the report is read
/// again and, while it is still open and renders differently, pushed again.
/// Whatever is left over after the last round is repaired by the next
/// staleness sweep.
pub(crate) async fn publish<S, N>(
  store: &S,
  sink: &N,
  after: Duration,
  mut report: Report,
) -> Result<()>
where
  S: ReportStore,
  N: NotificationSink,
{
  let Some(message_id) = report.message_id.clone() else {
    return Ok(());
  };

  for round in 0..PUBLISH_ROUNDS {
    let notice = Notice::for_report(&report);
    bounded(after, "sink.update", sink.update(&message_id, &notice)).await?;

    match store.get_by_report_id(report.report_id).await? {
      Some(latest) if latest.state.is_open() && Notice::for_report(&latest) != notice => {
        tracing::debug!(
          report_id = %report.report_id,
          round,
          state = %latest.state,
          "report moved while its message was updated; pushing again"
        );
        report = latest;
      }
      _ => return Ok(()),
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests;
