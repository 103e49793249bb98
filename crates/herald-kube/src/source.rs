use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use herald_core::{event::DomainEvent, source::EventSource};
use reqwest::{Certificate, Client};

use crate::{
  error::{Error, Result},
  wire::EventList,
};

pub const SERVICE_ACCOUNT_TOKEN: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
pub const SERVICE_ACCOUNT_CA: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// Connection settings for the Kubernetes API server.
#[derive(Debug, Clone)]
pub struct KubeConfig {
  pub api_url:    String,
  /// Bearer token file. Re-read on every fetch so projected tokens can
  /// rotate underneath a running process.
  pub token_path: PathBuf,
  /// Extra root certificate (PEM). Ignored when the file does not exist.
  pub ca_path:    Option<PathBuf>,
  /// Restrict to one namespace; all namespaces when `None`.
  pub namespace:  Option<String>,
  pub page_size:  u32,
  pub timeout:    Duration,
}

impl Default for KubeConfig {
  fn default() -> Self {
    Self {
      api_url:    "https://kubernetes.default.svc".to_owned(),
      token_path: SERVICE_ACCOUNT_TOKEN.into(),
      ca_path:    Some(SERVICE_ACCOUNT_CA.into()),
      namespace:  None,
      page_size:  500,
      timeout:    Duration::from_secs(10),
    }
  }
}

/// Lists events from the API server on every [`EventSource::fetch`].
pub struct KubeEventSource {
  client: Client,
  config: KubeConfig,
}

impl KubeEventSource {
  pub fn new(config: KubeConfig) -> Result<Self> {
    let mut builder = Client::builder().timeout(config.timeout);

    if let Some(path) = config.ca_path.as_deref() {
      match load_certificate(path)? {
        Some(cert) => builder = builder.add_root_certificate(cert),
        None => tracing::warn!(
          path = %path.display(),
          "CA certificate not found; using system roots only"
        ),
      }
    }

    let client = builder.build().map_err(Error::Client)?;
    Ok(Self { client, config })
  }

  fn path(&self) -> String {
    match &self.config.namespace {
      Some(ns) => format!("/api/v1/namespaces/{ns}/events"),
      None => "/api/v1/events".to_owned(),
    }
  }

  async fn token(&self) -> Result<String> {
    let raw = tokio::fs::read_to_string(&self.config.token_path)
      .await
      .map_err(|source| Error::Io { path: self.config.token_path.clone(), source })?;
    Ok(raw.trim().to_owned())
  }

  /// `GET /api/v1[/namespaces/{ns}]/events`, following `continue` tokens
  /// until the list is exhausted.
  pub async fn list_events(&self) -> Result<Vec<DomainEvent>> {
    let token = self.token().await?;
    let path = self.path();
    let url = format!("{}{}", self.config.api_url.trim_end_matches('/'), path);

    let mut events = Vec::new();
    let mut dropped = 0usize;
    let mut pages = 0usize;
    let mut continue_token: Option<String> = None;

    loop {
      let mut query = vec![("limit", self.config.page_size.to_string())];
      if let Some(next) = &continue_token {
        query.push(("continue", next.clone()));
      }

      let resp = self
        .client
        .get(&url)
        .bearer_auth(&token)
        .query(&query)
        .send()
        .await
        .map_err(|source| Error::Transport { path: path.clone(), source })?;

      let status = resp.status();
      if !status.is_success() {
        return Err(Error::Status { path, status });
      }

      let list: EventList = resp
        .json()
        .await
        .map_err(|source| Error::Decode { path: path.clone(), source })?;
      pages += 1;

      for item in list.items {
        match item.into_domain() {
          Some(event) => events.push(event),
          None => dropped += 1,
        }
      }

      continue_token = list.metadata.continue_token.filter(|t| !t.is_empty());
      if continue_token.is_none() {
        break;
      }
    }

    tracing::debug!(events = events.len(), dropped, pages, "listed kubernetes events");
    Ok(events)
  }
}

fn load_certificate(path: &Path) -> Result<Option<Certificate>> {
  let pem = match std::fs::read(path) {
    Ok(pem) => pem,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
    Err(source) => return Err(Error::Io { path: path.to_owned(), source }),
  };
  Certificate::from_pem(&pem)
    .map(Some)
    .map_err(|source| Error::Certificate { path: path.to_owned(), source })
}

impl EventSource for KubeEventSource {
  async fn fetch(&self) -> herald_core::Result<Vec<DomainEvent>> {
    Ok(self.list_events().await?)
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
  };

  use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
  };
  use serde_json::{Value, json};

  use super::*;

  /// Requests seen by the fake API server: (authorization, query).
  type Seen = Arc<Mutex<Vec<(String, HashMap<String, String>)>>>;

  fn item(uid: &str, reason: &str) -> Value {
    json!({
      "metadata": { "uid": uid, "namespace": "shop" },
      "involvedObject": { "kind": "Pod", "name": uid },
      "reason": reason,
      "message": "m",
      "count": 2,
      "type": "Warning"
    })
  }

  /// Serves three events over two pages.
  async fn events(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
  ) -> Response {
    let auth = headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .unwrap_or_default()
      .to_owned();
    seen.lock().unwrap().push((auth.clone(), query.clone()));

    if !auth.starts_with("Bearer ") {
      return StatusCode::UNAUTHORIZED.into_response();
    }
    let body = match query.get("continue").map(String::as_str) {
      None => json!({
        "metadata": { "continue": "page-2" },
        "items": [item("a", "BackOff"), item("b", "Failed")]
      }),
      Some("page-2") => json!({ "metadata": {}, "items": [item("c", "BackOff")] }),
      Some(_) => return StatusCode::GONE.into_response(),
    };
    Json(body).into_response()
  }

  async fn serve(seen: Seen) -> String {
    let app = Router::new()
      .route("/api/v1/events", get(events))
      .route("/api/v1/namespaces/{ns}/events", get(events))
      .with_state(seen);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
  }

  fn token_file(contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("herald-token-{}", uuid::Uuid::new_v4()));
    std::fs::write(&path, contents).unwrap();
    path
  }

  fn source(api_url: String, token_path: PathBuf, namespace: Option<&str>) -> KubeEventSource {
    KubeEventSource::new(KubeConfig {
      api_url,
      token_path,
      ca_path: None,
      namespace: namespace.map(str::to_owned),
      page_size: 2,
      timeout: Duration::from_secs(5),
    })
    .unwrap()
  }

  #[tokio::test]
  async fn fetch_follows_continue_tokens() {
    let seen = Seen::default();
    let url = serve(seen.clone()).await;
    let source = source(url, token_file("s3cret\n"), None);

    let events = source.fetch().await.unwrap();
    let ids: Vec<_> = events.iter().map(|e| e.tracked_object_id.0.as_str()).collect();
    assert_eq!(ids, ["a", "b", "c"]);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, "Bearer s3cret");
    assert_eq!(seen[0].1.get("limit").map(String::as_str), Some("2"));
    assert_eq!(seen[1].1.get("continue").map(String::as_str), Some("page-2"));
  }

  #[tokio::test]
  async fn token_is_reread_on_every_fetch() {
    let seen = Seen::default();
    let url = serve(seen.clone()).await;
    let token_path = token_file("first");
    let source = source(url, token_path.clone(), Some("shop"));

    source.fetch().await.unwrap();
    std::fs::write(&token_path, "second").unwrap();
    source.fetch().await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.first().unwrap().0, "Bearer first");
    assert_eq!(seen.last().unwrap().0, "Bearer second");
  }

  #[tokio::test]
  async fn missing_token_is_transient() {
    let url = serve(Seen::default()).await;
    let source = source(url, std::env::temp_dir().join("herald-no-such-token"), None);
    let err = source.fetch().await.unwrap_err();
    assert!(matches!(err, herald_core::Error::Transient(_)));
  }

  #[tokio::test]
  async fn rejected_request_is_transient() {
    let url = serve(Seen::default()).await;
    let source = source(format!("{url}/nowhere"), token_file("t"), None);
    let err = source.fetch().await.unwrap_err();
    assert!(matches!(err, herald_core::Error::Transient(ref m) if m.contains("404")));
  }

  #[test]
  fn missing_ca_file_falls_back_to_system_roots() {
    let config = KubeConfig {
      ca_path: Some(std::env::temp_dir().join("herald-no-such-ca.crt")),
      ..KubeConfig::default()
    };
    assert!(KubeEventSource::new(config).is_ok());
  }
}
