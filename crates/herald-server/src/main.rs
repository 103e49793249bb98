//! herald server binary.
//!
//! Reads `herald.toml` (or the path specified with `--config`) plus
//! `HERALD__*` environment overrides, watches Kubernetes events, reports
//! them to Mattermost and serves the acknowledgement API over HTTP.
//!
//! # Checking a configuration
//!
//! ```text
//! herald --config herald.toml --check-config
//! ```

mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use herald_engine::Herald;
use herald_kube::KubeEventSource;
use herald_mattermost::MattermostSink;
use herald_store_memory::MemoryStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

#[derive(Parser)]
#[command(author, version, about = "Reports Kubernetes warning events to Mattermost")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "herald.toml")]
  config: PathBuf,

  /// Validate the configuration, print the effective settings and exit.
  #[arg(long)]
  check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = Settings::load(&cli.config)
    .with_context(|| format!("invalid configuration in {}", cli.config.display()))?;

  if cli.check_config {
    println!("{}", serde_json::to_string_pretty(&settings)?);
    return Ok(());
  }

  // Collaborators.
  let sink = Arc::new(
    MattermostSink::new(settings.mattermost_config()).context("failed to set up mattermost")?,
  );
  let source = Arc::new(
    KubeEventSource::new(settings.kube_config()).context("failed to set up kubernetes")?,
  );
  let store = Arc::new(MemoryStore::new());

  let mut herald = Herald::new(store, source, Arc::clone(&sink), settings.engine_config());
  if settings.mattermost.post_internal_errors {
    let sink = Arc::clone(&sink);
    herald = herald.on_internal_error(move |e| {
      tracing::warn!(error = %e, transient = e.is_transient(), "internal error");
      let sink = Arc::clone(&sink);
      let detail = e.to_string();
      tokio::spawn(async move {
        if let Err(e) = sink.post_internal_error(&detail).await {
          tracing::error!(error = %e, "failed to post internal error");
        }
      });
    });
  }

  let handle = herald.start(settings.filter.clone(), settings.cadences());
  tracing::info!(
    reasons = ?settings.filter.reasons,
    min_occurrence = settings.filter.min_occurrence,
    "watching events"
  );

  let app = herald_api::api_router(herald.engine());
  let listener = TcpListener::bind(settings.listen)
    .await
    .with_context(|| format!("failed to bind {}", settings.listen))?;
  tracing::info!("Listening on http://{}", settings.listen);

  let served = axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error");

  handle.stop().await;
  tracing::info!("stopped");
  served
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      tracing::error!(error = %e, "failed to listen for ctrl-c");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut signal) => {
        signal.recv().await;
      }
      Err(e) => {
        tracing::error!(error = %e, "failed to listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    () = ctrl_c => {},
    () = terminate => {},
  }
  tracing::info!("shutting down");
}
