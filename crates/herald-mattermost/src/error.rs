use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),

  /// The request never produced a response (DNS, connect, TLS, timeout).
  #[error("{method} {path} failed: {source}")]
  Transport {
    method: &'static str,
    path:   String,
    #[source]
    source: reqwest::Error,
  },

  #[error("{method} {path} → {status}")]
  Status {
    method: &'static str,
    path:   String,
    status: StatusCode,
  },

  #[error("decoding response of {path}: {source}")]
  Decode {
    path:   String,
    #[source]
    source: reqwest::Error,
  },
}

impl From<Error> for herald_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Transport { .. } => herald_core::Error::Transient(e.to_string()),
      other => herald_core::Error::Sink(other.to_string()),
    }
  }
}
