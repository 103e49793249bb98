//! Periodic task runner with a shared cancellation signal.
//!
//! Each task loops `Idle → Running → Idle` on its own tokio task. A task is
//! never run concurrently with itself: its next tick is only awaited after
//! the current run finishes, and ticks that fired in the meantime are
//! skipped. Different tasks run fully independently of each other.

use std::{future::Future, time::Duration};

use tokio::{
  sync::watch,
  task::JoinHandle,
  time::{MissedTickBehavior, interval},
};

pub struct Scheduler {
  shutdown: watch::Sender<bool>,
  tasks:    Vec<(&'static str, JoinHandle<()>)>,
}

impl Default for Scheduler {
  fn default() -> Self { Self::new() }
}

impl Scheduler {
  pub fn new() -> Self {
    let (shutdown, _) = watch::channel(false);
    Self { shutdown, tasks: Vec::new() }
  }

  /// Spawn `run` every `period`, starting immediately.
  ///
  /// Cancellation is only observed between runs; a run in progress is
  /// allowed to finish (its collaborator calls carry their own timeouts).
  pub fn every<F, Fut>(&mut self, name: &'static str, period: Duration, mut run: F)
  where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    let mut shutdown = self.shutdown.subscribe();

    let handle = tokio::spawn(async move {
      let mut ticker = interval(period);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
      tracing::info!(task = name, ?period, "periodic task started");

      loop {
        tokio::select! {
          biased;
          // Also fires when the scheduler is dropped without `stop`.
          _ = shutdown.changed() => break,
          _ = ticker.tick() => {}
        }
        if *shutdown.borrow() {
          break;
        }
        run().await;
      }

      tracing::info!(task = name, "periodic task stopped");
    });

    self.tasks.push((name, handle));
  }

  /// Signal every task to stop after its current run.
  pub fn cancel(&self) { self.shutdown.send_replace(true); }

  pub fn is_cancelled(&self) -> bool { *self.shutdown.borrow() }

  /// Cancel and wait for every task to wind down.
  pub async fn stop(self) {
    self.cancel();
    for (name, handle) in self.tasks {
      if let Err(e) = handle.await {
        tracing::error!(task = name, error = %e, "periodic task panicked");
      }
    }
  }
}
