//! HTTP surface for Herald.
//!
//! Exposes an axum [`Router`] over a [`ReconciliationEngine`]: a read-only
//! view of open reports, an acknowledgement endpoint for operators, and the
//! callback Mattermost hits when the "Acknowledge" button is pressed.
//! Auth and TLS are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = herald_api::api_router(herald.engine().clone());
//! axum::serve(listener, app).await?;
//! ```

pub mod actions;
pub mod error;
pub mod reports;

use axum::{
  Router,
  routing::{get, post},
};
use herald_core::{sink::NotificationSink, store::ReportStore};
use herald_engine::ReconciliationEngine;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Build a fully-materialised API router around `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, N>(engine: ReconciliationEngine<S, N>) -> Router<()>
where
  S: ReportStore + 'static,
  N: NotificationSink + 'static,
{
  Router::new()
    .route("/healthz", get(healthz))
    // Reports
    .route("/reports", get(reports::list::<S, N>))
    .route("/reports/{id}", get(reports::get_one::<S, N>))
    .route("/reports/{id}/acknowledge", post(reports::acknowledge::<S, N>))
    // Interactive message callbacks
    .route("/actions/acknowledge", post(actions::acknowledge::<S, N>))
    .layer(TraceLayer::new_for_http())
    .with_state(engine)
}

async fn healthz() -> &'static str { "ok" }

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
  };

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use herald_core::{
    Error, Result,
    event::{DomainEvent, EventClass, EventFilter},
    notice::Notice,
    report::{LifecycleState, MessageId, Report},
    sink::NotificationSink,
    store::ReportStore,
  };
  use herald_engine::{EngineConfig, ReconciliationEngine};
  use herald_store_memory::MemoryStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use super::api_router;

  // ── Fixtures ────────────────────────────────────────────────────────────────

  #[derive(Default)]
  struct Channel {
    messages:     Mutex<HashMap<MessageId, Notice>>,
    fail_updates: bool,
  }

  impl NotificationSink for Channel {
    async fn create(&self, notice: &Notice) -> Result<MessageId> {
      let mut messages = self.messages.lock().unwrap();
      let id = MessageId(format!("post-{}", messages.len() + 1));
      messages.insert(id.clone(), notice.clone());
      Ok(id)
    }

    async fn read(&self, id: &MessageId) -> Result<Option<Notice>> {
      Ok(self.messages.lock().unwrap().get(id).cloned())
    }

    async fn update(&self, id: &MessageId, notice: &Notice) -> Result<()> {
      if self.fail_updates {
        return Err(Error::Sink("mattermost returned 502".into()));
      }
      self.messages.lock().unwrap().insert(id.clone(), notice.clone());
      Ok(())
    }
  }

  fn event(object: &str) -> DomainEvent {
    DomainEvent {
      tracked_object_id: object.into(),
      namespace:         "default".into(),
      reason:            "BackOff".into(),
      resource:          format!("Pod/{object}"),
      message:           "Back-off restarting failed container".into(),
      occurrence_count:  4,
      class:             EventClass::Warning,
      last_observed_at:  None,
    }
  }

  type Engine = ReconciliationEngine<MemoryStore, Channel>;

  fn engine_with(sink: Channel) -> Engine {
    ReconciliationEngine::new(
      Arc::new(MemoryStore::new()),
      Arc::new(sink),
      &EngineConfig::default(),
    )
  }

  /// An engine holding one freshly reported, active report.
  async fn reported(sink: Channel) -> (Engine, Report) {
    let engine = engine_with(sink);
    engine
      .evaluate(&[event("pod-A")], &EventFilter::new(["BackOff"], 1))
      .await;
    let report = engine.store().list_active().await.unwrap().remove(0);
    (engine, report)
  }

  async fn send(engine: &Engine, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
      Some(v) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    let resp = api_router(engine.clone())
      .oneshot(builder.body(body).unwrap())
      .await
      .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
  }

  // ── Reports ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn healthz_answers_ok() {
    let engine = engine_with(Channel::default());
    let (status, _) = send(&engine, "GET", "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
  }

  #[tokio::test]
  async fn list_returns_open_reports() {
    let (engine, report) = reported(Channel::default()).await;
    let (status, body) = send(&engine, "GET", "/reports", None).await;
    assert_eq!(status, StatusCode::OK);
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["report_id"], json!(report.report_id));
    assert_eq!(items[0]["state"], "active");
  }

  #[tokio::test]
  async fn get_unknown_report_is_404() {
    let engine = engine_with(Channel::default());
    let (status, body) = send(&engine, "GET", &format!("/reports/{}", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
  }

  #[tokio::test]
  async fn get_with_malformed_id_is_rejected() {
    let engine = engine_with(Channel::default());
    let (status, _) = send(&engine, "GET", "/reports/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn acknowledge_then_acknowledge_again_conflicts() {
    let (engine, report) = reported(Channel::default()).await;
    let uri = format!("/reports/{}/acknowledge", report.report_id);

    let (status, body) = send(&engine, "POST", &uri, Some(json!({ "actor": "alice" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "acknowledged");
    assert_eq!(body["acknowledged_by"], "alice");

    let (status, _) = send(&engine, "POST", &uri, Some(json!({ "actor": "bob" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let stored = engine.store().get_by_report_id(report.report_id).await.unwrap().unwrap();
    assert_eq!(stored.acknowledged_by.as_deref(), Some("alice"));
  }

  #[tokio::test]
  async fn acknowledge_with_blank_actor_is_400() {
    let (engine, report) = reported(Channel::default()).await;
    let uri = format!("/reports/{}/acknowledge", report.report_id);
    let (status, _) = send(&engine, "POST", &uri, Some(json!({ "actor": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let stored = engine.store().get_by_report_id(report.report_id).await.unwrap().unwrap();
    assert_eq!(stored.state, LifecycleState::Active);
  }

  #[tokio::test]
  async fn acknowledge_without_actor_field_is_400() {
    let (engine, report) = reported(Channel::default()).await;
    let uri = format!("/reports/{}/acknowledge", report.report_id);
    let (status, body) = send(&engine, "POST", &uri, Some(json!({ "who": "alice" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
  }

  #[tokio::test]
  async fn acknowledge_survives_a_failed_message_update() {
    let sink = Channel { fail_updates: true, ..Default::default() };
    let (engine, report) = reported(sink).await;
    let uri = format!("/reports/{}/acknowledge", report.report_id);
    let (status, body) = send(&engine, "POST", &uri, Some(json!({ "actor": "alice" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "acknowledged");
  }

  // ── Button callbacks ────────────────────────────────────────────────────────

  #[tokio::test]
  async fn button_press_acknowledges_as_the_user_name() {
    let (engine, report) = reported(Channel::default()).await;
    let payload = json!({
      "user_id": "u1x9",
      "user_name": "alice",
      "context": { "report_id": report.report_id },
    });

    let (status, body) = send(&engine, "POST", "/actions/acknowledge", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["ephemeral_text"].as_str().unwrap().contains("alice"));

    let stored = engine.store().get_by_report_id(report.report_id).await.unwrap().unwrap();
    assert_eq!(stored.acknowledged_by.as_deref(), Some("alice"));
  }

  #[tokio::test]
  async fn button_press_without_user_name_uses_the_user_id() {
    let (engine, report) = reported(Channel::default()).await;
    let payload = json!({ "user_id": "u1x9", "context": { "report_id": report.report_id } });

    let (status, _) = send(&engine, "POST", "/actions/acknowledge", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    let stored = engine.store().get_by_report_id(report.report_id).await.unwrap().unwrap();
    assert_eq!(stored.acknowledged_by.as_deref(), Some("u1x9"));
  }

  #[tokio::test]
  async fn second_button_press_gets_an_ephemeral_rejection() {
    let (engine, report) = reported(Channel::default()).await;
    engine.acknowledge(report.report_id, "alice").await.unwrap();

    let payload = json!({
      "user_id": "u2",
      "user_name": "bob",
      "context": { "report_id": report.report_id },
    });
    let (status, body) = send(&engine, "POST", "/actions/acknowledge", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["ephemeral_text"].as_str().unwrap().contains("already"));

    let stored = engine.store().get_by_report_id(report.report_id).await.unwrap().unwrap();
    assert_eq!(stored.acknowledged_by.as_deref(), Some("alice"));
  }

  #[tokio::test]
  async fn button_press_for_a_retracted_report_is_explained() {
    let engine = engine_with(Channel::default());
    let payload = json!({ "user_id": "u1", "context": { "report_id": Uuid::new_v4() } });
    let (status, body) = send(&engine, "POST", "/actions/acknowledge", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["ephemeral_text"].as_str().unwrap().contains("no longer exists"));
  }

  #[tokio::test]
  async fn button_press_for_a_deleted_report_is_explained() {
    let (engine, report) = reported(Channel::default()).await;
    engine
      .store()
      .mutate(report.report_id, |r| r.retire())
      .await
      .unwrap();

    let payload = json!({ "user_id": "u1", "context": { "report_id": report.report_id } });
    let (status, body) = send(&engine, "POST", "/actions/acknowledge", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    let text = body["ephemeral_text"].as_str().unwrap();
    assert!(text.contains("no longer exists"), "{text}");
  }

  #[tokio::test]
  async fn button_press_without_context_is_rejected() {
    let engine = engine_with(Channel::default());
    let (status, _) =
      send(&engine, "POST", "/actions/acknowledge", Some(json!({ "user_id": "u1" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn deleted_report_cannot_be_acknowledged_over_http() {
    let (engine, report) = reported(Channel::default()).await;
    engine
      .store()
      .mutate(report.report_id, |r| r.retire())
      .await
      .unwrap();

    let uri = format!("/reports/{}/acknowledge", report.report_id);
    let (status, _) = send(&engine, "POST", &uri, Some(json!({ "actor": "alice" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
  }
}
