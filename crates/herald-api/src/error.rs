//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The report exists but is not in a state that allows the request.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("internal error: {0}")]
  Internal(#[source] herald_core::Error),
}

impl From<herald_core::Error> for ApiError {
  fn from(e: herald_core::Error) -> Self {
    match e {
      herald_core::Error::ReportNotFound(id) => Self::NotFound(format!("report {id} not found")),
      herald_core::Error::InvalidState { .. } => Self::Conflict(e.to_string()),
      other => Self::Internal(other),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Internal(e) => {
        tracing::error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
