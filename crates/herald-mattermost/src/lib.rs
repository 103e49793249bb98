//! Mattermost implementation of [`herald_core::sink::NotificationSink`].
//!
//! Reports are posted to one channel as a single message attachment carrying
//! the notice fields and an "Acknowledge" button. The button calls back into
//! Herald's HTTP API at `{public_url}/actions/acknowledge`.

pub mod client;
pub mod error;
pub mod wire;

pub use client::{MattermostConfig, MattermostSink};
pub use error::{Error, Result};
