//! Server wiring for the appraisal API: configuration and the layered router.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use appraisal_core::store::EvaluationStore;
use axum::{Router, body::Body, http::Request};
use chrono::FixedOffset;
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::{
  request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
  timeout::TimeoutLayer,
  trace::TraceLayer,
};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `APPRAISAL_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                 String,
  #[serde(default = "default_port")]
  pub port:                 u16,
  #[serde(default = "default_store_path")]
  pub store_path:           PathBuf,
  /// UTC offset used for "today", e.g. `+07:00`.
  #[serde(default = "default_utc_offset")]
  pub local_utc_offset:     String,
  #[serde(default = "default_request_timeout")]
  pub request_timeout_secs: u64,
  /// Store-level write deadline. Unset means no deadline.
  #[serde(default)]
  pub write_timeout_ms:     Option<u64>,
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("appraisal.db") }
fn default_utc_offset() -> String { "+07:00".to_owned() }
fn default_request_timeout() -> u64 { 30 }

impl ServerConfig {
  pub fn utc_offset(&self) -> anyhow::Result<FixedOffset> {
    self
      .local_utc_offset
      .parse::<FixedOffset>()
      .with_context(|| {
        format!("invalid local_utc_offset {:?}", self.local_utc_offset)
      })
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }

  pub fn write_timeout(&self) -> Option<Duration> {
    self.write_timeout_ms.map(Duration::from_millis)
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// The API router wrapped in request-id, tracing and timeout layers.
pub fn app<S>(store: Arc<S>, request_timeout: Duration) -> Router
where
  S: EvaluationStore + 'static,
{
  let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
    let request_id = req
      .headers()
      .get("x-request-id")
      .and_then(|v| v.to_str().ok())
      .unwrap_or("-");
    tracing::info_span!(
      "request",
      method = %req.method(),
      uri = %req.uri(),
      request_id,
    )
  });

  appraisal_api::api_router(store).layer(
    ServiceBuilder::new()
      .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
      .layer(trace)
      .layer(PropagateRequestIdLayer::x_request_id())
      .layer(TimeoutLayer::new(request_timeout)),
  )
}

#[cfg(test)]
mod tests {
  use appraisal_store_sqlite::SqliteStore;
  use axum::http::StatusCode;
  use tower::ServiceExt as _;

  use super::*;

  fn config_from(toml: &str) -> ServerConfig {
    config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_config_uses_defaults() {
    let cfg = config_from("");
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
    assert_eq!(cfg.write_timeout(), None);
    assert_eq!(cfg.utc_offset().unwrap().local_minus_utc(), 7 * 3600);
  }

  #[test]
  fn offsets_and_timeouts_are_read() {
    let cfg = config_from(
      "local_utc_offset = \"-03:30\"\nwrite_timeout_ms = 250\nport = 9000",
    );
    assert_eq!(cfg.utc_offset().unwrap().local_minus_utc(), -(3 * 3600 + 1800));
    assert_eq!(cfg.write_timeout(), Some(Duration::from_millis(250)));
    assert_eq!(cfg.port, 9000);
  }

  #[test]
  fn bad_offset_is_an_error() {
    let cfg = config_from("local_utc_offset = \"Bangkok\"");
    assert!(cfg.utc_offset().is_err());
  }

  #[tokio::test]
  async fn responses_carry_a_request_id() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let app = app(Arc::new(store), Duration::from_secs(5));

    let req = Request::builder()
      .uri("/healthz")
      .body(Body::empty())
      .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
  }
}
