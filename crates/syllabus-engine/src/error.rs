//! Error type for `syllabus-engine`.
//!
//! Every error carries a [`Code`] so transports can map it without matching
//! on variants.

use serde::Serialize;
use strum::{AsRefStr, Display};
use syllabus_core::store::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// Coarse classification of an engine error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Code {
  NotFound,
  InvalidArgument,
  DeadlineExceeded,
  Internal,
}

/// One rejected row of an import payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
  /// 1-based data row; 0 when the problem is not tied to a row.
  pub row:     usize,
  pub message: String,
}

impl RowError {
  pub fn new(row: usize, message: impl Into<String>) -> Self {
    Self { row, message: message.into() }
  }
}

impl std::fmt::Display for RowError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "row {}: {}", self.row, self.message)
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  InvalidArgument(String),

  #[error("import rejected: {} invalid row(s)", .0.len())]
  InvalidRows(Vec<RowError>),

  #[error("malformed payload: {0}")]
  Payload(#[from] syllabus_csv::Error),

  #[error("import task {0} did not finish in time")]
  DeadlineExceeded(Uuid),

  #[error("{source}")]
  Store {
    code:   Code,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

impl Error {
  /// Wrap a backend error, classifying it by the domain rejection it
  /// carries.
  pub(crate) fn store<E: StoreError>(e: E) -> Self {
    let code = match e.domain() {
      Some(d) if d.is_not_found() => Code::NotFound,
      Some(d) if d.is_corrupt() => Code::Internal,
      Some(_) => Code::InvalidArgument,
      None => Code::Internal,
    };
    Self::Store { code, source: Box::new(e) }
  }

  pub fn code(&self) -> Code {
    match self {
      Self::NotFound(_) => Code::NotFound,
      Self::InvalidArgument(_) | Self::InvalidRows(_) | Self::Payload(_) => {
        Code::InvalidArgument
      }
      Self::DeadlineExceeded(_) => Code::DeadlineExceeded,
      Self::Store { code, .. } => *code,
    }
  }

  /// Per-row details of a rejected import; empty for other errors.
  pub fn row_errors(&self) -> &[RowError] {
    match self {
      Self::InvalidRows(rows) => rows,
      _ => &[],
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
