//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use syllabus_engine::{Code, RowError};
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Engine(#[from] syllabus_engine::Error),
}

impl ApiError {
  fn code(&self) -> Code {
    match self {
      ApiError::BadRequest(_) => Code::InvalidArgument,
      ApiError::Engine(e) => e.code(),
    }
  }
}

fn status(code: Code) -> StatusCode {
  match code {
    Code::NotFound => StatusCode::NOT_FOUND,
    Code::InvalidArgument => StatusCode::BAD_REQUEST,
    Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
    Code::Internal => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let code = self.code();
    let row_errors: &[RowError] = match &self {
      ApiError::Engine(e) => e.row_errors(),
      ApiError::BadRequest(_) => &[],
    };
    let body = json!({
      "error":      self.to_string(),
      "code":       code,
      "row_errors": row_errors,
    });
    (status(code), Json(body)).into_response()
  }
}
