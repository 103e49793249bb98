//! Domain events (the read-only input produced by an event source) and the
//! filter policy that decides which of them are worth reporting.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::report::TrackedObjectId;

/// Severity class as observed at the source.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
pub enum EventClass {
  #[default]
  Normal,
  Warning,
}

impl EventClass {
  pub fn is_alerting(self) -> bool { matches!(self, Self::Warning) }
}

/// One observation of a condition. Ephemeral; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEvent {
  pub tracked_object_id: TrackedObjectId,
  pub namespace:         String,
  pub reason:            String,
  /// Human-readable identity of the affected object, e.g. `Pod/web-0`.
  pub resource:          String,
  pub message:           String,
  pub occurrence_count:  u32,
  pub class:             EventClass,
  pub last_observed_at:  Option<DateTime<Utc>>,
}

// ─── Filter ──────────────────────────────────────────────────────────────────

/// Which events qualify for a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
  /// Event reasons to report on, e.g. `BackOff`, `FailedMount`.
  pub reasons:        BTreeSet<String>,
  /// Minimum source-side repeat count before an event is reported.
  #[serde(default = "default_min_occurrence")]
  pub min_occurrence: u32,
}

fn default_min_occurrence() -> u32 { 1 }

/// Why an event was passed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Rejection {
  NotAlerting,
  ReasonNotWatched,
  BelowThreshold,
}

impl EventFilter {
  pub fn new<I, S>(reasons: I, min_occurrence: u32) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      reasons: reasons.into_iter().map(Into::into).collect(),
      min_occurrence,
    }
  }

  /// Pure admission check; touches no state.
  pub fn check(&self, event: &DomainEvent) -> Result<(), Rejection> {
    if !event.class.is_alerting() {
      return Err(Rejection::NotAlerting);
    }
    if !self.reasons.contains(&event.reason) {
      return Err(Rejection::ReasonNotWatched);
    }
    if event.occurrence_count < self.min_occurrence {
      return Err(Rejection::BelowThreshold);
    }
    Ok(())
  }

  pub fn admits(&self, event: &DomainEvent) -> bool { self.check(event).is_ok() }
}
