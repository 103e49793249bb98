//! Tunables for the engine and the scheduler.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Upper bound for every single event-source or sink call.
  pub call_timeout: Duration,
}

impl Default for EngineConfig {
  fn default() -> Self { Self { call_timeout: Duration::from_secs(10) } }
}

/// How often each periodic task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadences {
  /// Event fetch + evaluate.
  pub reconcile: Duration,
  /// Staleness sweep over existing reports.
  pub sweep:     Duration,
  /// Minimum age of an active report before a sweep re-renders it.
  pub refresh:   Duration,
}

impl Default for Cadences {
  fn default() -> Self {
    Self {
      reconcile: Duration::from_secs(5),
      sweep:     Duration::from_secs(30),
      refresh:   Duration::from_secs(30),
    }
  }
}
