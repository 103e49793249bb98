//! [`StalenessReconciler`]: the second pass, over reports rather than
//! events.
//!
//! A report whose message was deleted by a human is retracted entirely. An
//! active report that has not been written for a while gets its message
//! re-rendered as a heartbeat. Any open report whose message no longer
//! matches its stored state is re-rendered too, which repairs updates that
//! failed or landed out of order during evaluation.

use std::{sync::Arc, time::Duration};

use chrono::{TimeDelta, Utc};
use herald_core::{
  Error, Result,
  notice::Notice,
  report::{LifecycleState, Report},
  sink::NotificationSink,
  store::ReportStore,
};
use uuid::Uuid;

use crate::{EngineConfig, bounded, publish};

/// What a sweep did with one report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
  /// The message is gone; the report was deleted and removed.
  Retracted,
  /// The message was re-rendered from the stored report.
  Refreshed,
  /// The message exists and nothing needed doing.
  Unchanged,
}

/// Summary of one [`StalenessReconciler::sweep`].
#[derive(Debug, Default)]
pub struct Sweep {
  pub checked:  Vec<(Uuid, Check)>,
  pub failures: Vec<Error>,
}

impl Sweep {
  pub fn retracted(&self) -> usize { self.count(Check::Retracted) }

  pub fn refreshed(&self) -> usize { self.count(Check::Refreshed) }

  fn count(&self, check: Check) -> usize {
    self.checked.iter().filter(|(_, c)| *c == check).count()
  }
}

pub struct StalenessReconciler<S, N> {
  store:        Arc<S>,
  sink:         Arc<N>,
  call_timeout: Duration,
}

impl<S, N> StalenessReconciler<S, N>
where
  S: ReportStore,
  N: NotificationSink,
{
  pub fn new(store: Arc<S>, sink: Arc<N>, config: &EngineConfig) -> Self {
    Self { store, sink, call_timeout: config.call_timeout }
  }

  /// Check every open report against the notification surface.
  ///
  /// Active reports whose last write is at least `refresh_interval` old are
  /// re-rendered. Other open reports are re-rendered only when their message
  /// shows something other than the stored state.
  pub async fn sweep(&self, refresh_interval: Duration) -> Sweep {
    let mut out = Sweep::default();

    let reports = match self.store.list_active().await {
      Ok(reports) => reports,
      Err(e) => {
        out.failures.push(e);
        return out;
      }
    };

    let refresh = TimeDelta::from_std(refresh_interval).unwrap_or(TimeDelta::MAX);

    for report in reports {
      let report_id = report.report_id;
      match self.check(report, refresh).await {
        Ok(Some(check)) => out.checked.push((report_id, check)),
        Ok(None) => {}
        Err(e) => {
          tracing::warn!(%report_id, error = %e, "staleness check failed");
          out.failures.push(e);
        }
      }
    }

    out
  }

  /// `Ok(None)` when the report has never been posted and there is nothing
  /// to compare against.
  async fn check(&self, report: Report, refresh: TimeDelta) -> Result<Option<Check>> {
    let Some(message_id) = report.message_id.clone() else {
      return Ok(None);
    };

    let posted = bounded(self.call_timeout, "sink.read", self.sink.read(&message_id)).await?;
    let Some(posted) = posted else {
      self.retract(report.report_id).await?;
      tracing::info!(
        report_id = %report.report_id,
        object = %report.tracked_object_id,
        %message_id,
        "message deleted; report retracted"
      );
      return Ok(Some(Check::Retracted));
    };

    let due = report.state == LifecycleState::Active
      && Utc::now() - report.last_updated_at >= refresh;
    if !due && posted == Notice::for_report(&report) {
      return Ok(Some(Check::Unchanged));
    }

    // Render from the latest record, not the snapshot: an evaluation may
    // have re-affirmed the report since the sweep started.
    let latest = match self.store.get_by_report_id(report.report_id).await? {
      Some(latest) if latest.state.is_open() => latest,
      _ => return Ok(Some(Check::Unchanged)),
    };
    let (report_id, state, times) = (latest.report_id, latest.state, latest.report_times);
    publish(&*self.store, &*self.sink, self.call_timeout, latest).await?;

    if state == LifecycleState::Active {
      match self
        .store
        .mutate(report_id, |r| r.require(LifecycleState::Active, "refresh"))
        .await
      {
        Ok(_) | Err(Error::InvalidState { .. } | Error::ReportNotFound(_)) => {}
        Err(e) => return Err(e),
      }
    }

    if due {
      tracing::debug!(%report_id, times, "heartbeat pushed");
    } else {
      tracing::info!(%report_id, %state, "message drifted from report; re-rendered");
    }
    Ok(Some(Check::Refreshed))
  }

  async fn retract(&self, report_id: Uuid) -> Result<()> {
    match self.store.mutate(report_id, Report::retire).await {
      Ok(_) => {}
      // Someone else retired it first; removal below is still ours to do.
      Err(Error::InvalidState { state: LifecycleState::Deleted, .. }) => {}
      Err(Error::ReportNotFound(_)) => return Ok(()),
      Err(e) => return Err(e),
    }

    match self.store.remove(report_id).await {
      Ok(()) | Err(Error::ReportNotFound(_)) => Ok(()),
      Err(e) => Err(e),
    }
  }
}
