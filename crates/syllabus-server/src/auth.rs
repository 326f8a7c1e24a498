//! HTTP Basic authentication and per-route role checks.
//!
//! | Route | Roles |
//! |-------|-------|
//! | any `GET` | all |
//! | `POST /study-plan-items/{id}/complete` | all |
//! | every other mutation | `school_admin`, `teacher` |

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{Request, State},
  http::{HeaderMap, Method, header},
  middleware::Next,
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  SchoolAdmin,
  Teacher,
  Student,
}

/// One login accepted by the server.
#[derive(Clone, Deserialize)]
pub struct AccountConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub role:          Role,
}

/// The authenticated caller, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct Caller {
  pub username: String,
  pub role:     Role,
}

pub struct Accounts {
  accounts: Vec<AccountConfig>,
}

impl Accounts {
  pub fn new(accounts: Vec<AccountConfig>) -> Self { Self { accounts } }

  /// Verify Basic credentials from `headers` against the configured accounts.
  pub fn verify(&self, headers: &HeaderMap) -> Result<Caller, Error> {
    let header_val = headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .ok_or(Error::Unauthorized)?;

    let encoded = header_val
      .strip_prefix("Basic ")
      .ok_or(Error::Unauthorized)?;

    let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
    let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

    let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;

    let account = self
      .accounts
      .iter()
      .find(|a| a.username == username)
      .ok_or(Error::Unauthorized)?;

    let parsed_hash = PasswordHash::new(&account.password_hash)
      .map_err(|_| Error::Unauthorized)?;

    Argon2::default()
      .verify_password(password.as_bytes(), &parsed_hash)
      .map_err(|_| Error::Unauthorized)?;

    Ok(Caller { username: account.username.clone(), role: account.role })
  }
}

/// Whether `role` may call `method path`.
pub fn permits(role: Role, method: &Method, path: &str) -> bool {
  if method == Method::GET || method == Method::HEAD {
    return true;
  }
  let completes_item = path.starts_with("/study-plan-items/") && path.ends_with("/complete");
  completes_item || matches!(role, Role::SchoolAdmin | Role::Teacher)
}

/// Middleware: 401 without valid credentials, 403 when the role may not
/// call the route.
pub async fn authorize(
  State(accounts): State<Arc<Accounts>>,
  mut req: Request,
  next: Next,
) -> Result<Response, Error> {
  let caller = accounts.verify(req.headers())?;
  if !permits(caller.role, req.method(), req.uri().path()) {
    tracing::debug!(username = %caller.username, path = req.uri().path(), "role not permitted");
    return Err(Error::Forbidden);
  }
  req.extensions_mut().insert(caller);
  Ok(next.run(req).await)
}
