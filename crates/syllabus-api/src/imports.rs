//! Handlers for bulk imports and their tasks.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/study-plans/import` | Body: [`ImportRequest`]; `payload` carries the CSV text |
//! | `GET`  | `/import-tasks/{id}` | Poll a background assignment task |

use axum::{
  Json,
  extract::{Path, State},
};
use syllabus_core::task::ImportTask;
use syllabus_engine::{Engine, ImportRequest, ImportResponse, Store};
use uuid::Uuid;

use crate::error::ApiError;

/// `POST /study-plans/import`
pub async fn import<S: Store>(
  State(engine): State<Engine<S>>,
  Json(body): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, ApiError> {
  Ok(Json(engine.import_study_plan(body).await?))
}

/// `GET /import-tasks/{id}`
pub async fn task<S: Store>(
  State(engine): State<Engine<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ImportTask>, ApiError> {
  Ok(Json(engine.get_import_task_status(id).await?))
}
