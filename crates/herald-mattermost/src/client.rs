//! Async HTTP client for the Mattermost REST v4 API.

use std::time::Duration;

use herald_core::{notice::Notice, report::MessageId, sink::NotificationSink};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;

use crate::{
  error::{Error, Result},
  wire::{self, Channel, Post, Props},
};

/// Connection settings for one Mattermost channel.
#[derive(Debug, Clone)]
pub struct MattermostConfig {
  /// Server base URL, e.g. `https://chat.example.com`.
  pub url:        String,
  /// Bot or personal access token.
  pub token:      String,
  pub team:       String,
  pub channel:    String,
  /// Externally reachable base URL of Herald's HTTP API; button presses
  /// are sent to `{public_url}/actions/acknowledge`.
  pub public_url: String,
  pub timeout:    Duration,
}

/// Posts reports to a Mattermost channel.
///
/// The channel id is resolved on first use and cached per instance; share
/// one sink behind an `Arc`.
pub struct MattermostSink {
  client:     Client,
  config:     MattermostConfig,
  channel_id: OnceCell<String>,
}

impl MattermostSink {
  pub fn new(config: MattermostConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(Error::Client)?;
    Ok(Self { client, config, channel_id: OnceCell::new() })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api/v4{}", self.config.url.trim_end_matches('/'), path)
  }

  fn action_url(&self) -> String {
    format!("{}/actions/acknowledge", self.config.public_url.trim_end_matches('/'))
  }

  async fn send(&self, method: &'static str, path: &str, req: RequestBuilder) -> Result<Response> {
    req
      .bearer_auth(&self.config.token)
      .send()
      .await
      .map_err(|source| Error::Transport { method, path: path.to_owned(), source })
  }

  fn check(method: &'static str, path: &str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
      Ok(resp)
    } else {
      Err(Error::Status { method, path: path.to_owned(), status })
    }
  }

  async fn decode<T: DeserializeOwned>(path: &str, resp: Response) -> Result<T> {
    resp
      .json()
      .await
      .map_err(|source| Error::Decode { path: path.to_owned(), source })
  }

  // ── Channel ───────────────────────────────────────────────────────────────

  /// `GET /api/v4/teams/name/{team}/channels/name/{channel}`, once.
  async fn channel_id(&self) -> Result<&str> {
    let id = self
      .channel_id
      .get_or_try_init(|| async {
        let path = format!(
          "/teams/name/{}/channels/name/{}",
          self.config.team, self.config.channel
        );
        let resp = self.send("GET", &path, self.client.get(self.url(&path))).await?;
        let channel: Channel = Self::decode(&path, Self::check("GET", &path, resp)?).await?;
        tracing::debug!(
          team = %self.config.team,
          channel = %self.config.channel,
          channel_id = %channel.id,
          "resolved mattermost channel"
        );
        Ok::<_, Error>(channel.id)
      })
      .await?;
    Ok(id.as_str())
  }

  fn post_body(&self, channel_id: &str, id: &str, notice: &Notice) -> Post {
    Post {
      id:         id.to_owned(),
      channel_id: channel_id.to_owned(),
      message:    String::new(),
      props:      Props { attachments: vec![wire::attachment(notice, &self.action_url())] },
      delete_at:  0,
    }
  }

  // ── Posts ─────────────────────────────────────────────────────────────────

  /// `POST /api/v4/posts`
  pub async fn create_post(&self, notice: &Notice) -> Result<MessageId> {
    let channel_id = self.channel_id().await?;
    let body = self.post_body(channel_id, "", notice);

    let path = "/posts";
    let resp = self
      .send("POST", path, self.client.post(self.url(path)).json(&body))
      .await?;
    let post: Post = Self::decode(path, Self::check("POST", path, resp)?).await?;
    Ok(MessageId(post.id))
  }

  /// `GET /api/v4/posts/{id}`; `None` once the post is gone.
  ///
  /// A post stripped of its attachment still counts as existing.
  pub async fn get_post(&self, id: &MessageId) -> Result<Option<Notice>> {
    let path = format!("/posts/{id}");
    let resp = self.send("GET", &path, self.client.get(self.url(&path))).await?;
    if resp.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }

    let post: Post = Self::decode(&path, Self::check("GET", &path, resp)?).await?;
    if post.delete_at > 0 {
      return Ok(None);
    }
    Ok(Some(wire::notice(&post)))
  }

  /// `PUT /api/v4/posts/{id}`
  pub async fn update_post(&self, id: &MessageId, notice: &Notice) -> Result<()> {
    let channel_id = self.channel_id().await?;
    let body = self.post_body(channel_id, &id.0, notice);

    let path = format!("/posts/{id}");
    let resp = self
      .send("PUT", &path, self.client.put(self.url(&path)).json(&body))
      .await?;
    Self::check("PUT", &path, resp)?;
    Ok(())
  }

  /// Post a one-off error message about Herald itself to the channel.
  pub async fn post_internal_error(&self, detail: &str) -> Result<()> {
    self.create_post(&Notice::internal_error(detail)).await?;
    Ok(())
  }
}

impl NotificationSink for MattermostSink {
  async fn create(&self, notice: &Notice) -> herald_core::Result<MessageId> {
    Ok(self.create_post(notice).await?)
  }

  async fn read(&self, id: &MessageId) -> herald_core::Result<Option<Notice>> {
    Ok(self.get_post(id).await?)
  }

  async fn update(&self, id: &MessageId, notice: &Notice) -> herald_core::Result<()> {
    Ok(self.update_post(id, notice).await?)
  }
}
