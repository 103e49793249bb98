//! Runtime configuration, deserialised from `herald.toml` and `HERALD__*`
//! environment variables.

use std::{
  net::SocketAddr,
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::{Context as _, ensure};
use config::{
  Config, Environment, File,
  builder::{ConfigBuilder, DefaultState},
};
use herald_core::event::EventFilter;
use herald_engine::{Cadences, EngineConfig};
use herald_kube::{
  KubeConfig,
  source::{SERVICE_ACCOUNT_CA, SERVICE_ACCOUNT_TOKEN},
};
use herald_mattermost::MattermostConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
  #[serde(default = "default_listen")]
  pub listen:     SocketAddr,
  /// Base URL under which Mattermost can reach this server.
  pub public_url: String,
  pub filter:     EventFilter,
  #[serde(default)]
  pub cadence:    CadenceSettings,
  pub mattermost: MattermostSettings,
  #[serde(default)]
  pub kubernetes: KubernetesSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceSettings {
  pub reconcile_secs:    u64,
  pub sweep_secs:        u64,
  pub refresh_secs:      u64,
  pub call_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MattermostSettings {
  pub url:                  String,
  #[serde(skip_serializing)]
  pub token:                String,
  pub team:                 String,
  pub channel:              String,
  /// Also post internal errors to the channel, not just the log.
  #[serde(default)]
  pub post_internal_errors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesSettings {
  pub api_url:    String,
  pub token_path: PathBuf,
  pub ca_path:    Option<PathBuf>,
  pub namespace:  Option<String>,
  pub page_size:  u32,
}

fn default_listen() -> SocketAddr { SocketAddr::from(([0, 0, 0, 0], 9090)) }

impl Default for CadenceSettings {
  fn default() -> Self {
    Self { reconcile_secs: 5, sweep_secs: 30, refresh_secs: 30, call_timeout_secs: 10 }
  }
}

impl Default for KubernetesSettings {
  fn default() -> Self {
    Self {
      api_url:    "https://kubernetes.default.svc".to_owned(),
      token_path: SERVICE_ACCOUNT_TOKEN.into(),
      ca_path:    Some(SERVICE_ACCOUNT_CA.into()),
      namespace:  None,
      page_size:  500,
    }
  }
}

// ─── Loading ──────────────────────────────────────────────────────────────────

impl Settings {
  /// Layer `HERALD__SECTION__KEY` environment variables over the (optional)
  /// TOML file at `path`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    Self::from_config(
      Config::builder()
        .add_source(File::from(path).required(false))
        .add_source(environment()),
    )
  }

  fn from_config(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
    let settings: Self = builder
      .build()
      .context("failed to read configuration")?
      .try_deserialize()
      .context("failed to deserialise settings")?;
    settings.validate()?;
    Ok(settings)
  }

  pub fn validate(&self) -> anyhow::Result<()> {
    ensure!(!self.filter.reasons.is_empty(), "filter.reasons must name at least one reason");
    ensure!(self.filter.min_occurrence >= 1, "filter.min_occurrence must be at least 1");

    let c = &self.cadence;
    for (key, secs) in [
      ("cadence.reconcile_secs", c.reconcile_secs),
      ("cadence.sweep_secs", c.sweep_secs),
      ("cadence.call_timeout_secs", c.call_timeout_secs),
    ] {
      ensure!(secs > 0, "{key} must be greater than zero");
    }

    ensure!(self.kubernetes.page_size > 0, "kubernetes.page_size must be greater than zero");
    for (key, value) in [
      ("public_url", &self.public_url),
      ("mattermost.url", &self.mattermost.url),
      ("mattermost.token", &self.mattermost.token),
      ("mattermost.team", &self.mattermost.team),
      ("mattermost.channel", &self.mattermost.channel),
    ] {
      ensure!(!value.trim().is_empty(), "{key} must not be empty");
    }
    Ok(())
  }

  // ── Derived component configs ─────────────────────────────────────────────

  pub fn cadences(&self) -> Cadences {
    Cadences {
      reconcile: Duration::from_secs(self.cadence.reconcile_secs),
      sweep:     Duration::from_secs(self.cadence.sweep_secs),
      refresh:   Duration::from_secs(self.cadence.refresh_secs),
    }
  }

  pub fn engine_config(&self) -> EngineConfig {
    EngineConfig { call_timeout: self.call_timeout() }
  }

  fn call_timeout(&self) -> Duration { Duration::from_secs(self.cadence.call_timeout_secs) }

  pub fn mattermost_config(&self) -> MattermostConfig {
    let m = &self.mattermost;
    MattermostConfig {
      url:        m.url.clone(),
      token:      m.token.clone(),
      team:       m.team.clone(),
      channel:    m.channel.clone(),
      public_url: self.public_url.clone(),
      timeout:    self.call_timeout(),
    }
  }

  pub fn kube_config(&self) -> KubeConfig {
    let k = &self.kubernetes;
    KubeConfig {
      api_url:    k.api_url.clone(),
      token_path: k.token_path.clone(),
      ca_path:    k.ca_path.clone(),
      namespace:  k.namespace.clone(),
      page_size:  k.page_size,
      timeout:    self.call_timeout(),
    }
  }
}

fn environment() -> Environment {
  Environment::with_prefix("HERALD")
    .separator("__")
    .list_separator(",")
    .with_list_parse_key("filter.reasons")
    .try_parsing(true)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use config::FileFormat;

  use super::*;

  const MINIMAL: &str = r#"
    public_url = "https://herald.example"

    [filter]
    reasons = ["BackOff", "FailedMount"]

    [mattermost]
    url = "https://chat.example"
    token = "t0k3n"
    team = "ops"
    channel = "alerts"
  "#;

  fn parse(toml: &str) -> anyhow::Result<Settings> {
    Settings::from_config(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
  }

  #[test]
  fn minimal_file_gets_defaults() {
    let s = parse(MINIMAL).unwrap();
    assert_eq!(s.listen, default_listen());
    assert_eq!(s.filter.min_occurrence, 1);
    assert_eq!(s.cadences(), Cadences::default());
    assert_eq!(s.engine_config().call_timeout, Duration::from_secs(10));
    assert_eq!(s.kubernetes.page_size, 500);
    assert!(!s.mattermost.post_internal_errors);

    let k = s.kube_config();
    assert_eq!(k.api_url, "https://kubernetes.default.svc");
    assert!(k.namespace.is_none());
    assert_eq!(s.mattermost_config().public_url, "https://herald.example");
  }

  #[test]
  fn empty_reasons_are_rejected() {
    let toml = MINIMAL.replace(r#"["BackOff", "FailedMount"]"#, "[]");
    assert!(parse(&toml).is_err());
  }

  #[test]
  fn zero_cadence_is_rejected() {
    let toml = format!("{MINIMAL}\n[cadence]\nsweep_secs = 0\n");
    let err = parse(&toml).unwrap_err();
    assert!(err.to_string().contains("cadence.sweep_secs"));
  }

  #[test]
  fn zero_refresh_is_allowed() {
    let toml = format!("{MINIMAL}\n[cadence]\nrefresh_secs = 0\n");
    assert_eq!(parse(&toml).unwrap().cadences().refresh, Duration::ZERO);
  }

  #[test]
  fn missing_mattermost_section_fails() {
    let toml = MINIMAL.split("[mattermost]").next().unwrap();
    assert!(parse(toml).is_err());
  }

  #[test]
  fn printed_settings_omit_the_token() {
    let s = parse(MINIMAL).unwrap();
    let json = serde_json::to_string(&s).unwrap();
    assert!(!json.contains("t0k3n"));
    assert!(json.contains("\"team\":\"ops\""));
  }
}
