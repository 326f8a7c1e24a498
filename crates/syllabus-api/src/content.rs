//! Handlers for content mutation and hierarchy seeding.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/content/assignments` | Body: `[Assignment]`; `?sync=true` fans out before responding |
//! | `POST` | `/content/learning-objectives` | Body: `[LearningObjective]`; `?sync=true` as above |
//! | `POST` | `/books` | Body: `[Book]` |
//! | `POST` | `/chapters` | Body: `[Chapter]` |
//! | `POST` | `/books/{id}/chapters/{chapter_id}` | Attach a chapter to a book |
//! | `POST` | `/topics` | Body: `[Topic]` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use serde::{Deserialize, Serialize};
use syllabus_core::content::{Assignment, Book, Chapter, LearningObjective, Topic};
use syllabus_engine::{Engine, FanOutReport, Store};

use crate::error::ApiError;

// ─── Leaves ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct SyncParams {
  /// Deliver pending content events before responding.
  #[serde(default)]
  pub sync: bool,
}

#[derive(Debug, Serialize)]
pub struct AssignmentsUpserted {
  pub assignment_ids: Vec<String>,
  /// Present when `sync=true`.
  pub fan_out:        Option<FanOutReport>,
}

#[derive(Debug, Serialize)]
pub struct LearningObjectivesUpserted {
  pub lo_ids:  Vec<String>,
  pub fan_out: Option<FanOutReport>,
}

async fn flush_if<S: Store>(engine: &Engine<S>, sync: bool) -> Result<Option<FanOutReport>, ApiError> {
  if sync { Ok(Some(engine.flush_events().await?)) } else { Ok(None) }
}

/// `POST /content/assignments[?sync=true]`
pub async fn upsert_assignments<S: Store>(
  State(engine): State<Engine<S>>,
  Query(params): Query<SyncParams>,
  Json(body): Json<Vec<Assignment>>,
) -> Result<Json<AssignmentsUpserted>, ApiError> {
  let assignment_ids = engine.upsert_assignments(body).await?;
  let fan_out = flush_if(&engine, params.sync).await?;
  Ok(Json(AssignmentsUpserted { assignment_ids, fan_out }))
}

/// `POST /content/learning-objectives[?sync=true]`
pub async fn upsert_learning_objectives<S: Store>(
  State(engine): State<Engine<S>>,
  Query(params): Query<SyncParams>,
  Json(body): Json<Vec<LearningObjective>>,
) -> Result<Json<LearningObjectivesUpserted>, ApiError> {
  let lo_ids = engine.upsert_learning_objectives(body).await?;
  let fan_out = flush_if(&engine, params.sync).await?;
  Ok(Json(LearningObjectivesUpserted { lo_ids, fan_out }))
}

// ─── Hierarchy ───────────────────────────────────────────────────────────────

/// `POST /books`
pub async fn upsert_books<S: Store>(
  State(engine): State<Engine<S>>,
  Json(body): Json<Vec<Book>>,
) -> Result<StatusCode, ApiError> {
  engine.upsert_books(body).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /chapters`
pub async fn upsert_chapters<S: Store>(
  State(engine): State<Engine<S>>,
  Json(body): Json<Vec<Chapter>>,
) -> Result<StatusCode, ApiError> {
  engine.upsert_chapters(body).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /books/{id}/chapters/{chapter_id}`
pub async fn attach_chapter<S: Store>(
  State(engine): State<Engine<S>>,
  Path((book_id, chapter_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
  engine.attach_chapter(book_id, chapter_id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /topics`
pub async fn upsert_topics<S: Store>(
  State(engine): State<Engine<S>>,
  Json(body): Json<Vec<Topic>>,
) -> Result<StatusCode, ApiError> {
  engine.upsert_topics(body).await?;
  Ok(StatusCode::NO_CONTENT)
}
