//! Report: the unit of tracked state.
//!
//! A report follows one tracked object from the first qualifying event until
//! its chat message is deleted. Its lifecycle is an explicit state machine;
//! [`check_transition`] is the single place that decides which edits a
//! mutation may make.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{Error, Result, event::DomainEvent};

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Identity of the source condition being reported (a Kubernetes event UID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackedObjectId(pub String);

impl fmt::Display for TrackedObjectId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for TrackedObjectId {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for TrackedObjectId {
  fn from(s: String) -> Self { Self(s) }
}

/// Opaque reference to a message on the notification surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for MessageId {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for MessageId {
  fn from(s: String) -> Self { Self(s) }
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// The lifecycle stage of a report.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleState {
  /// Reported and still being re-affirmed by new events.
  Active,
  /// A human has taken ownership; counters are frozen.
  Acknowledged,
  /// The backing message is gone. Terminal.
  Deleted,
}

impl LifecycleState {
  /// Active and acknowledged reports count against the per-object
  /// uniqueness constraint; deleted ones do not.
  pub fn is_open(self) -> bool { !matches!(self, Self::Deleted) }

  /// Whether a record in `self` may be rewritten into `next`.
  pub fn can_become(self, next: Self) -> bool {
    use LifecycleState::*;
    matches!(
      (self, next),
      (Active, Active | Acknowledged | Deleted)
        | (Acknowledged, Acknowledged | Deleted)
    )
  }
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
  pub report_id:         Uuid,
  pub tracked_object_id: TrackedObjectId,
  /// `None` until the first post to the notification surface succeeds.
  pub message_id:        Option<MessageId>,
  pub namespace:         String,
  pub reason:            String,
  pub resource:          String,
  pub message:           String,
  /// Repeat count as reported by the event source itself.
  pub occurrence_count:  u32,
  /// How many times Herald has re-affirmed this report. Starts at 1.
  pub report_times:      u32,
  pub state:             LifecycleState,
  pub acknowledged_by:   Option<String>,
  pub acknowledged_at:   Option<DateTime<Utc>>,
  pub created_at:        DateTime<Utc>,
  /// Stamped by the store on every successful write.
  pub last_updated_at:   DateTime<Utc>,
}

impl Report {
  /// Build a fresh, unposted report for the first qualifying event of a
  /// tracked object. The report id is newly generated.
  pub fn from_event(event: &DomainEvent, now: DateTime<Utc>) -> Self {
    Self {
      report_id:         Uuid::new_v4(),
      tracked_object_id: event.tracked_object_id.clone(),
      message_id:        None,
      namespace:         event.namespace.clone(),
      reason:            event.reason.clone(),
      resource:          event.resource.clone(),
      message:           event.message.clone(),
      occurrence_count:  event.occurrence_count,
      report_times:      1,
      state:             LifecycleState::Active,
      acknowledged_by:   None,
      acknowledged_at:   None,
      created_at:        now,
      last_updated_at:   now,
    }
  }

  /// Re-affirm an active report with a newer matching event.
  ///
  /// Returns [`Error::InvalidState`] unless the report is active, so the
  /// caller can use it directly as a `mutate` update function.
  pub fn reaffirm(&mut self, event: &DomainEvent) -> Result<()> {
    self.require(LifecycleState::Active, "re-affirm")?;
    self.report_times = self.report_times.saturating_add(1);
    self.occurrence_count = event.occurrence_count;
    Ok(())
  }

  /// Hand the report to a human. Counters are frozen from here on.
  pub fn acknowledge(&mut self, actor: &str, at: DateTime<Utc>) -> Result<()> {
    self.require(LifecycleState::Active, "acknowledge")?;
    self.state = LifecycleState::Acknowledged;
    self.acknowledged_by = Some(actor.to_owned());
    self.acknowledged_at = Some(at);
    Ok(())
  }

  /// Mark the report as retracted because its message is gone.
  pub fn retire(&mut self) -> Result<()> {
    if !self.state.is_open() {
      return Err(self.invalid("retire"));
    }
    self.state = LifecycleState::Deleted;
    Ok(())
  }

  /// Fail with [`Error::InvalidState`] unless the report is in `state`.
  pub fn require(&self, state: LifecycleState, action: &'static str) -> Result<()> {
    if self.state == state { Ok(()) } else { Err(self.invalid(action)) }
  }

  fn invalid(&self, action: &'static str) -> Error {
    Error::InvalidState { report_id: self.report_id, state: self.state, action }
  }
}

// ─── Transition check ────────────────────────────────────────────────────────

/// Validate that `after` is a legal successor of `before`.
///
/// Stores call this after running a caller's update function and refuse to
/// persist the result with [`Error::Invariant`] when it fails.
pub fn check_transition(before: &Report, after: &Report) -> Result<()> {
  let violation = |what: &str| {
    Err(Error::Invariant(format!("report {}: {what}", before.report_id)))
  };

  if after.report_id != before.report_id {
    return violation("report id changed");
  }
  if after.tracked_object_id != before.tracked_object_id {
    return violation("tracked object id changed");
  }
  if after.created_at != before.created_at {
    return violation("creation time changed");
  }
  if !before.state.can_become(after.state) {
    return violation(&format!("illegal transition {} -> {}", before.state, after.state));
  }
  if after.report_times < before.report_times {
    return violation("report_times decreased");
  }
  if after.report_times == 0 {
    return violation("report_times is zero");
  }
  if let Some(old) = &before.message_id
    && after.message_id.as_ref() != Some(old)
  {
    return violation("message id re-pointed");
  }
  if before.state == LifecycleState::Acknowledged
    && (after.report_times != before.report_times
      || after.occurrence_count != before.occurrence_count)
  {
    return violation("counters changed after acknowledgement");
  }
  if before.acknowledged_by.is_some() && after.acknowledged_by != before.acknowledged_by {
    return violation("acknowledging actor changed");
  }
  if after.acknowledged_by.is_some() && after.state == LifecycleState::Active {
    return violation("acknowledging actor set on an active report");
  }
  Ok(())
}
