//! [`ReconciliationEngine`] decides, per event, whether to open a report,
//! re-affirm one, or leave it alone.
//!
//! The store's `put` conflict check and atomic `mutate` are the only
//! concurrency control; the engine never holds a report across awaits and
//! re-reads whenever a racing writer changed the picture underneath it.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use herald_core::{
  Error, Result,
  event::{DomainEvent, EventFilter},
  notice::Notice,
  report::{LifecycleState, Report},
  sink::NotificationSink,
  store::ReportStore,
};
use uuid::Uuid;

use crate::{EngineConfig, bounded, publish};

// ─── Results ─────────────────────────────────────────────────────────────────

/// What happened to one qualifying event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
  Created(Uuid),
  Reaffirmed(Uuid),
  /// The report is acknowledged; repeats are ignored.
  Frozen(Uuid),
}

/// Summary of one [`ReconciliationEngine::evaluate`] call.
///
/// Failures are collected rather than returned so that one bad event never
/// stops the rest of the batch.
#[derive(Debug, Default)]
pub struct Evaluation {
  pub skipped:   usize,
  pub decisions: Vec<Decision>,
  pub failures:  Vec<Error>,
}

impl Evaluation {
  pub fn created(&self) -> usize { self.count(|d| matches!(d, Decision::Created(_))) }

  pub fn reaffirmed(&self) -> usize { self.count(|d| matches!(d, Decision::Reaffirmed(_))) }

  pub fn frozen(&self) -> usize { self.count(|d| matches!(d, Decision::Frozen(_))) }

  fn count(&self, pred: impl Fn(&Decision) -> bool) -> usize {
    self.decisions.iter().filter(|d| pred(d)).count()
  }
}

/// Result of a successful acknowledgement.
#[derive(Debug)]
pub struct AcknowledgeOutcome {
  pub report:        Report,
  /// Set when the state change was stored but the message could not be
  /// updated to show it.
  pub display_error: Option<Error>,
}

enum Attempt {
  Done(Decision),
  /// Another writer got there first; look the object up again.
  Retry,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct ReconciliationEngine<S, N> {
  store:        Arc<S>,
  sink:         Arc<N>,
  call_timeout: Duration,
}

impl<S, N> Clone for ReconciliationEngine<S, N> {
  fn clone(&self) -> Self {
    Self {
      store:        Arc::clone(&self.store),
      sink:         Arc::clone(&self.sink),
      call_timeout: self.call_timeout,
    }
  }
}

impl<S, N> ReconciliationEngine<S, N>
where
  S: ReportStore,
  N: NotificationSink,
{
  pub fn new(store: Arc<S>, sink: Arc<N>, config: &EngineConfig) -> Self {
    Self { store, sink, call_timeout: config.call_timeout }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Reconcile a batch of events, in order, against the store.
  pub async fn evaluate(&self, events: &[DomainEvent], filter: &EventFilter) -> Evaluation {
    let mut out = Evaluation::default();

    for event in events {
      if let Err(why) = filter.check(event) {
        tracing::trace!(object = %event.tracked_object_id, reason = %event.reason, %why, "event skipped");
        out.skipped += 1;
        continue;
      }

      match self.reconcile(event, &mut out.failures).await {
        Ok(decision) => {
          tracing::debug!(object = %event.tracked_object_id, ?decision, "event reconciled");
          out.decisions.push(decision);
        }
        Err(e) => {
          tracing::warn!(object = %event.tracked_object_id, error = %e, "event not reconciled");
          out.failures.push(e);
        }
      }
    }

    out
  }

  /// Mark an active report as owned by `actor` and show that on its message.
  pub async fn acknowledge(&self, report_id: Uuid, actor: &str) -> Result<AcknowledgeOutcome> {
    let actor_owned = actor.to_owned();
    let at = Utc::now();
    let report = self
      .store
      .mutate(report_id, move |r| r.acknowledge(&actor_owned, at))
      .await?;

    tracing::info!(%report_id, object = %report.tracked_object_id, actor, "report acknowledged");

    let display_error =
      publish(&*self.store, &*self.sink, self.call_timeout, report.clone())
        .await
        .err();
    if let Some(e) = &display_error {
      tracing::warn!(%report_id, error = %e, "acknowledgement stored but message not updated");
    }

    Ok(AcknowledgeOutcome { report, display_error })
  }

  // ── Per-event steps ─────────────────────────────────────────────────────

  async fn reconcile(&self, event: &DomainEvent, soft: &mut Vec<Error>) -> Result<Decision> {
    // A racing writer can change the picture at most once between our
    // lookup and our write; a second miss is reported as a conflict.
    for _ in 0..2 {
      let existing = self
        .store
        .get_by_tracked_object_id(&event.tracked_object_id)
        .await?;

      let attempt = match existing {
        Some(r) if r.state == LifecycleState::Active => {
          self.reaffirm(r.report_id, event, soft).await?
        }
        Some(r) if r.state == LifecycleState::Acknowledged => {
          Attempt::Done(Decision::Frozen(r.report_id))
        }
        // Nothing yet, or only a deleted report awaiting removal.
        _ => self.create(event).await?,
      };

      if let Attempt::Done(decision) = attempt {
        return Ok(decision);
      }
    }

    Err(Error::Conflict(event.tracked_object_id.clone()))
  }

  async fn create(&self, event: &DomainEvent) -> Result<Attempt> {
    let mut report = Report::from_event(event, Utc::now());
    let notice = Notice::for_report(&report);

    // Nothing is stored unless the message exists; a failed post is simply
    // retried on the next cycle.
    let message_id =
      bounded(self.call_timeout, "sink.create", self.sink.create(&notice)).await?;
    report.message_id = Some(message_id.clone());
    let report_id = report.report_id;

    match self.store.put(report).await {
      Ok(()) => {
        tracing::info!(
          %report_id,
          object = %event.tracked_object_id,
          namespace = %event.namespace,
          reason = %event.reason,
          %message_id,
          "report created"
        );
        Ok(Attempt::Done(Decision::Created(report_id)))
      }
      Err(Error::Conflict(object)) => {
        tracing::warn!(%object, %message_id, "lost creation race; message left orphaned");
        Ok(Attempt::Retry)
      }
      Err(e) => {
        tracing::warn!(
          %report_id,
          object = %event.tracked_object_id,
          %message_id,
          error = %e,
          "report not stored; message left orphaned"
        );
        Err(e)
      }
    }
  }

  async fn reaffirm(
    &self,
    report_id: Uuid,
    event: &DomainEvent,
    soft: &mut Vec<Error>,
  ) -> Result<Attempt> {
    let latest = event.clone();
    let report = match self
      .store
      .mutate(report_id, move |r| r.reaffirm(&latest))
      .await
    {
      Ok(report) => report,
      Err(Error::InvalidState { state: LifecycleState::Acknowledged, .. }) => {
        return Ok(Attempt::Done(Decision::Frozen(report_id)));
      }
      Err(Error::InvalidState { .. } | Error::ReportNotFound(_)) => return Ok(Attempt::Retry),
      Err(e) => return Err(e),
    };

    // The counters stand even if the message cannot be updated; the next
    // staleness sweep re-renders it.
    if let Err(e) = publish(&*self.store, &*self.sink, self.call_timeout, report).await {
      tracing::warn!(%report_id, error = %e, "re-affirmed but message not updated");
      soft.push(e);
    }

    Ok(Attempt::Done(Decision::Reaffirmed(report_id)))
  }
}
