//! [`Herald`]: the engine, the staleness reconciler and the scheduler wired
//! together behind a start/stop handle.

use std::sync::Arc;

use herald_core::{
  Error, event::EventFilter, sink::NotificationSink, source::EventSource, store::ReportStore,
};

use crate::{
  Cadences, EngineConfig, ReconciliationEngine, StalenessReconciler, bounded,
  scheduler::Scheduler,
};

/// Callback for non-fatal failures (collaborator outages, lost races,
/// invariant violations). Called from the scheduler tasks; must not block.
pub type ErrorHook = Arc<dyn Fn(&Error) + Send + Sync>;

pub struct Herald<S, E, N> {
  store:    Arc<S>,
  source:   Arc<E>,
  sink:     Arc<N>,
  config:   EngineConfig,
  on_error: ErrorHook,
}

impl<S, E, N> Herald<S, E, N>
where
  S: ReportStore + 'static,
  E: EventSource + 'static,
  N: NotificationSink + 'static,
{
  pub fn new(store: Arc<S>, source: Arc<E>, sink: Arc<N>, config: EngineConfig) -> Self {
    Self {
      store,
      source,
      sink,
      config,
      on_error: Arc::new(|e: &Error| {
        tracing::warn!(error = %e, transient = e.is_transient(), "internal error");
      }),
    }
  }

  /// Replace the default (log-only) internal-error handler.
  pub fn on_internal_error<F>(mut self, hook: F) -> Self
  where
    F: Fn(&Error) + Send + Sync + 'static,
  {
    self.on_error = Arc::new(hook);
    self
  }

  /// An engine sharing this service's store and sink, for acknowledgement
  /// handlers.
  pub fn engine(&self) -> ReconciliationEngine<S, N> {
    ReconciliationEngine::new(Arc::clone(&self.store), Arc::clone(&self.sink), &self.config)
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Start the reconciliation and staleness tasks.
  pub fn start(&self, filter: EventFilter, cadences: Cadences) -> HeraldHandle {
    let mut scheduler = Scheduler::new();

    let engine = self.engine();
    let source = Arc::clone(&self.source);
    let filter = Arc::new(filter);
    let on_error = Arc::clone(&self.on_error);
    let call_timeout = self.config.call_timeout;
    scheduler.every("reconcile", cadences.reconcile, move || {
      let (engine, source, filter, on_error) =
        (engine.clone(), Arc::clone(&source), Arc::clone(&filter), Arc::clone(&on_error));
      async move {
        let events = match bounded(call_timeout, "source.fetch", source.fetch()).await {
          Ok(events) => events,
          Err(e) => {
            on_error(&e);
            return;
          }
        };

        let evaluation = engine.evaluate(&events, &filter).await;
        if !evaluation.decisions.is_empty() || !evaluation.failures.is_empty() {
          tracing::debug!(
            fetched = events.len(),
            skipped = evaluation.skipped,
            created = evaluation.created(),
            reaffirmed = evaluation.reaffirmed(),
            frozen = evaluation.frozen(),
            failed = evaluation.failures.len(),
            "reconcile pass finished"
          );
        }
        for e in &evaluation.failures {
          on_error(e);
        }
      }
    });

    let reconciler = Arc::new(StalenessReconciler::new(
      Arc::clone(&self.store),
      Arc::clone(&self.sink),
      &self.config,
    ));
    let on_error = Arc::clone(&self.on_error);
    let refresh = cadences.refresh;
    scheduler.every("sweep", cadences.sweep, move || {
      let (reconciler, on_error) = (Arc::clone(&reconciler), Arc::clone(&on_error));
      async move {
        let sweep = reconciler.sweep(refresh).await;
        if sweep.retracted() > 0 || sweep.refreshed() > 0 || !sweep.failures.is_empty() {
          tracing::debug!(
            checked = sweep.checked.len(),
            retracted = sweep.retracted(),
            refreshed = sweep.refreshed(),
            failed = sweep.failures.len(),
            "staleness sweep finished"
          );
        }
        for e in &sweep.failures {
          on_error(e);
        }
      }
    });

    HeraldHandle { scheduler }
  }
}

/// Running tasks of a started [`Herald`].
pub struct HeraldHandle {
  scheduler: Scheduler,
}

impl HeraldHandle {
  /// Stop both tasks once their current runs finish, and wait for them.
  pub async fn stop(self) { self.scheduler.stop().await; }
}
