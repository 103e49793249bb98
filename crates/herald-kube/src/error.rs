use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),

  #[error("reading {}: {source}", path.display())]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid CA certificate in {}: {source}", path.display())]
  Certificate {
    path:   PathBuf,
    #[source]
    source: reqwest::Error,
  },

  #[error("GET {path} failed: {source}")]
  Transport {
    path:   String,
    #[source]
    source: reqwest::Error,
  },

  #[error("GET {path} → {status}")]
  Status { path: String, status: StatusCode },

  #[error("decoding event list from {path}: {source}")]
  Decode {
    path:   String,
    #[source]
    source: reqwest::Error,
  },
}

/// Every failure to list events is worth retrying on the next tick.
impl From<Error> for herald_core::Error {
  fn from(e: Error) -> Self { herald_core::Error::Transient(e.to_string()) }
}
