//! [`MemoryStore`]: the in-memory implementation of [`ReportStore`].

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use herald_core::{
  Error, Result,
  report::{Report, TrackedObjectId, check_transition},
  store::ReportStore,
};

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Inner {
  reports:   HashMap<Uuid, Report>,
  /// Latest report id per tracked object. Points at the open report when
  /// there is one; otherwise at a deleted report awaiting removal.
  by_object: HashMap<TrackedObjectId, Uuid>,
}

/// A report store held entirely in process memory.
///
/// Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryStore {
  inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// Number of records held, including deleted ones not yet removed.
  pub async fn len(&self) -> usize { self.inner.read().await.reports.len() }

  pub async fn is_empty(&self) -> bool { self.len().await == 0 }
}

// ─── ReportStore impl ────────────────────────────────────────────────────────

impl ReportStore for MemoryStore {
  async fn put(&self, report: Report) -> Result<()> {
    if !report.state.is_open() {
      return Err(Error::Invariant(format!(
        "report {} inserted in state {}",
        report.report_id, report.state
      )));
    }

    let mut inner = self.inner.write().await;

    if inner.reports.contains_key(&report.report_id) {
      return Err(Error::Invariant(format!(
        "report id {} is already taken",
        report.report_id
      )));
    }

    let open_exists = inner
      .by_object
      .get(&report.tracked_object_id)
      .and_then(|id| inner.reports.get(id))
      .is_some_and(|existing| existing.state.is_open());
    if open_exists {
      return Err(Error::Conflict(report.tracked_object_id));
    }

    tracing::trace!(report_id = %report.report_id, object = %report.tracked_object_id, "put report");
    inner
      .by_object
      .insert(report.tracked_object_id.clone(), report.report_id);
    inner.reports.insert(report.report_id, report);
    Ok(())
  }

  async fn get_by_tracked_object_id(&self, id: &TrackedObjectId) -> Result<Option<Report>> {
    let inner = self.inner.read().await;
    Ok(
      inner
        .by_object
        .get(id)
        .and_then(|report_id| inner.reports.get(report_id))
        .cloned(),
    )
  }

  async fn get_by_report_id(&self, id: Uuid) -> Result<Option<Report>> {
    Ok(self.inner.read().await.reports.get(&id).cloned())
  }

  async fn list_active(&self) -> Result<Vec<Report>> {
    let inner = self.inner.read().await;
    let mut active: Vec<Report> = inner
      .reports
      .values()
      .filter(|r| r.state.is_open())
      .cloned()
      .collect();
    active.sort_by(|a, b| {
      a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.report_id.cmp(&b.report_id))
    });
    Ok(active)
  }

  async fn mutate<F>(&self, id: Uuid, update: F) -> Result<Report>
  where
    F: FnOnce(&mut Report) -> Result<()> + Send + 'static,
  {
    let mut inner = self.inner.write().await;
    let current = inner.reports.get_mut(&id).ok_or(Error::ReportNotFound(id))?;

    let mut draft = current.clone();
    update(&mut draft)?;
    check_transition(current, &draft)?;
    draft.last_updated_at = Utc::now();

    *current = draft.clone();
    Ok(draft)
  }

  async fn remove(&self, id: Uuid) -> Result<()> {
    let mut inner = self.inner.write().await;
    let report = inner.reports.get(&id).ok_or(Error::ReportNotFound(id))?;

    if report.state.is_open() {
      return Err(Error::InvalidState {
        report_id: id,
        state:     report.state,
        action:    "remove",
      });
    }

    let object = report.tracked_object_id.clone();
    inner.reports.remove(&id);
    if inner.by_object.get(&object) == Some(&id) {
      inner.by_object.remove(&object);
    }
    Ok(())
  }
}
