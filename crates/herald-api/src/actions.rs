//! Handler for interactive message buttons.
//!
//! Mattermost calls `POST /actions/acknowledge` when someone presses the
//! "Acknowledge" button on a report. The request carries the pressing user
//! and the `context` object the button was created with.
//!
//! Rejections (unknown or already-closed report) are answered with `200` and
//! an ephemeral message, which Mattermost shows only to the user who
//! clicked; a non-2xx status would surface as an opaque error instead.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use herald_core::{Error, report::LifecycleState, sink::NotificationSink, store::ReportStore};
use herald_engine::ReconciliationEngine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ActionContext {
  pub report_id: Uuid,
}

/// The subset of Mattermost's integration request we rely on.
#[derive(Debug, Deserialize)]
pub struct ActionRequest {
  pub user_id:   String,
  #[serde(default)]
  pub user_name: Option<String>,
  pub context:   ActionContext,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ActionResponse {
  pub ephemeral_text: String,
}

impl ActionRequest {
  /// Prefer the human-readable name, falling back to the opaque id.
  fn actor(&self) -> &str {
    self
      .user_name
      .as_deref()
      .filter(|name| !name.trim().is_empty())
      .unwrap_or(&self.user_id)
  }
}

/// `POST /actions/acknowledge`
pub async fn acknowledge<S, N>(
  State(engine): State<ReconciliationEngine<S, N>>,
  request: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<ActionResponse>, ApiError>
where
  S: ReportStore,
  N: NotificationSink,
{
  let Json(request) = request.map_err(|e| ApiError::BadRequest(e.body_text()))?;
  let actor = request.actor();
  if actor.trim().is_empty() {
    return Err(ApiError::BadRequest("action request carries no user".into()));
  }

  let report_id = request.context.report_id;
  let text = match engine.acknowledge(report_id, actor).await {
    Ok(_) => format!("Report acknowledged by {actor}."),
    // A deleted report is waiting for removal; to the user it is gone.
    Err(
      Error::ReportNotFound(_)
      | Error::InvalidState { state: LifecycleState::Deleted, .. },
    ) => "This report no longer exists.".to_owned(),
    Err(Error::InvalidState { .. }) => "This report has already been acknowledged.".to_owned(),
    Err(e) => return Err(e.into()),
  };

  Ok(Json(ActionResponse { ephemeral_text: text }))
}
