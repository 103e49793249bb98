//! Handlers for `/reports` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/reports` | Active and acknowledged reports, oldest first |
//! | `GET`  | `/reports/:id` | 404 if not found |
//! | `POST` | `/reports/:id/acknowledge` | Body: `{"actor":"alice"}`; 409 unless active |

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
};
use herald_core::{report::Report, sink::NotificationSink, store::ReportStore};
use herald_engine::ReconciliationEngine;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /reports`
pub async fn list<S, N>(
  State(engine): State<ReconciliationEngine<S, N>>,
) -> Result<Json<Vec<Report>>, ApiError>
where
  S: ReportStore,
  N: NotificationSink,
{
  Ok(Json(engine.store().list_active().await?))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /reports/:id`
pub async fn get_one<S, N>(
  State(engine): State<ReconciliationEngine<S, N>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Report>, ApiError>
where
  S: ReportStore,
  N: NotificationSink,
{
  let report = engine
    .store()
    .get_by_report_id(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("report {id} not found")))?;
  Ok(Json(report))
}

// ─── Acknowledge ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AcknowledgeBody {
  pub actor: String,
}

/// `POST /reports/:id/acknowledge`, body: `{"actor":"alice"}`
///
/// Returns the acknowledged report. A failure to update the chat message is
/// logged but does not fail the request; the acknowledgement is stored.
pub async fn acknowledge<S, N>(
  State(engine): State<ReconciliationEngine<S, N>>,
  Path(id): Path<Uuid>,
  body: Result<Json<AcknowledgeBody>, JsonRejection>,
) -> Result<Json<Report>, ApiError>
where
  S: ReportStore,
  N: NotificationSink,
{
  let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
  let actor = body.actor.trim();
  if actor.is_empty() {
    return Err(ApiError::BadRequest("actor must not be empty".into()));
  }

  let outcome = engine.acknowledge(id, actor).await?;
  Ok(Json(outcome.report))
}
