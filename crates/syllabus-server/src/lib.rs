//! HTTP front end for the syllabus engine.
//!
//! Wraps [`syllabus_api::api_router`] with HTTP Basic authentication, a
//! role check per route, and request tracing.

pub mod auth;
pub mod error;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, middleware};
use serde::Deserialize;
use syllabus_engine::{DispatcherConfig, Engine, Store};
use tower_http::trace::TraceLayer;

use auth::{AccountConfig, Accounts};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  pub store_path: PathBuf,
  #[serde(default)]
  pub accounts:   Vec<AccountConfig>,
  #[serde(default)]
  pub dispatcher: DispatcherConfig,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the authenticated application router.
pub fn app<S: Store>(engine: Engine<S>, accounts: Vec<AccountConfig>) -> Router {
  let accounts = Arc::new(Accounts::new(accounts));
  syllabus_api::api_router(engine)
    .layer(middleware::from_fn_with_state(accounts, auth::authorize))
    .layer(TraceLayer::new_for_http())
}
