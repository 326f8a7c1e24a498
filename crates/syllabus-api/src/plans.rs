//! Handlers for `/study-plans` and `/study-plan-items` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/courses/{id}/study-plans` | Live masters and copies bound to the course |
//! | `GET`    | `/study-plans/{id}` | Live plan |
//! | `DELETE` | `/study-plans/{id}` | Soft delete; a master takes its copies |
//! | `POST`   | `/study-plans/{id}/assign` | Body: `{"course_id"\|"class_id"\|"student_id": "..."}` |
//! | `GET`    | `/study-plans/{id}/items` | Live items in display order |
//! | `GET`    | `/study-plans/{id}/todo` | `?topic_ids=a,b` required; optional `kind`, `status` |
//! | `GET`    | `/study-plans/{id}/progress` | `?student_id` required |
//! | `POST`   | `/study-plan-items/{id}/complete` | Body: `{"completed": bool}` (default `true`) |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use syllabus_core::{
  content::LeafKind,
  plan::{PlanTarget, StudyPlan, StudyPlanItem},
};
use syllabus_engine::{Engine, Progress, Store, ToDoFilter, ToDoItem, ToDoStatus};
use uuid::Uuid;

use crate::error::ApiError;

// ─── Plans ───────────────────────────────────────────────────────────────────

/// `GET /courses/{id}/study-plans`
pub async fn by_course<S: Store>(
  State(engine): State<Engine<S>>,
  Path(course_id): Path<String>,
) -> Result<Json<Vec<StudyPlan>>, ApiError> {
  Ok(Json(engine.list_study_plans_by_course(course_id).await?))
}

/// `GET /study-plans/{id}`
pub async fn get_one<S: Store>(
  State(engine): State<Engine<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<StudyPlan>, ApiError> {
  Ok(Json(engine.get_study_plan(id).await?))
}

#[derive(Debug, Serialize)]
pub struct Deleted {
  pub deleted: usize,
}

/// `DELETE /study-plans/{id}`
pub async fn delete_one<S: Store>(
  State(engine): State<Engine<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Deleted>, ApiError> {
  let deleted = engine.delete_study_plan(id).await?;
  Ok(Json(Deleted { deleted }))
}

// ─── Assign ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Assigned {
  pub study_plan_id: Uuid,
  pub created:       bool,
  pub items_cloned:  usize,
}

/// `POST /study-plans/{id}/assign`: 201 when a copy was created, 200 when
/// the target already had one.
pub async fn assign<S: Store>(
  State(engine): State<Engine<S>>,
  Path(id): Path<Uuid>,
  Json(target): Json<PlanTarget>,
) -> Result<impl IntoResponse, ApiError> {
  if target.id().trim().is_empty() {
    return Err(ApiError::BadRequest("target id must not be empty".into()));
  }
  let outcome = engine.assign_study_plan(id, target).await?;
  let status = if outcome.created { StatusCode::CREATED } else { StatusCode::OK };
  Ok((
    status,
    Json(Assigned {
      study_plan_id: outcome.plan.study_plan_id,
      created:       outcome.created,
      items_cloned:  outcome.items_cloned,
    }),
  ))
}

// ─── Items ───────────────────────────────────────────────────────────────────

/// `GET /study-plans/{id}/items`
pub async fn items<S: Store>(
  State(engine): State<Engine<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<StudyPlanItem>>, ApiError> {
  Ok(Json(engine.list_study_plan_items(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ToDoParams {
  /// Comma-separated topic ids.
  pub topic_ids: String,
  pub kind:      Option<LeafKind>,
  #[serde(default)]
  pub status:    ToDoStatus,
}

/// `GET /study-plans/{id}/todo?topic_ids=a,b[&kind=...][&status=...]`
pub async fn todo<S: Store>(
  State(engine): State<Engine<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<ToDoParams>,
) -> Result<Json<Vec<ToDoItem>>, ApiError> {
  let topic_ids = params.topic_ids.split(',').map(str::to_owned).collect();
  let filter = ToDoFilter { kind: params.kind, status: params.status };
  Ok(Json(engine.list_todo_items_by_topics(topic_ids, id, filter).await?))
}

#[derive(Debug, Deserialize)]
pub struct ProgressParams {
  pub student_id: String,
}

/// `GET /study-plans/{id}/progress?student_id=...`
pub async fn progress<S: Store>(
  State(engine): State<Engine<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<ProgressParams>,
) -> Result<Json<Progress>, ApiError> {
  Ok(Json(engine.retrieve_study_plan_progress(id, params.student_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct CompleteBody {
  #[serde(default = "yes")]
  pub completed: bool,
}

fn yes() -> bool { true }

/// `POST /study-plan-items/{id}/complete`
pub async fn complete<S: Store>(
  State(engine): State<Engine<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<CompleteBody>,
) -> Result<Json<StudyPlanItem>, ApiError> {
  Ok(Json(engine.mark_item_completed(id, body.completed).await?))
}
