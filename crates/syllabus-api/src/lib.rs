//! JSON REST API for the syllabus engine.
//!
//! Exposes an axum [`Router`] backed by an [`Engine`] over any
//! [`Store`]. Auth, TLS, and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .merge(syllabus_api::api_router(engine.clone()))
//! ```

pub mod content;
pub mod error;
pub mod imports;
pub mod plans;

use axum::{
  Router,
  routing::{get, post},
};
use syllabus_engine::{Engine, Store};

pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S: Store>(engine: Engine<S>) -> Router<()> {
  Router::new()
    // Study plans
    .route("/courses/{id}/study-plans", get(plans::by_course::<S>))
    .route("/study-plans/import", post(imports::import::<S>))
    .route("/study-plans/{id}", get(plans::get_one::<S>).delete(plans::delete_one::<S>))
    .route("/study-plans/{id}/assign", post(plans::assign::<S>))
    .route("/study-plans/{id}/items", get(plans::items::<S>))
    .route("/study-plans/{id}/todo", get(plans::todo::<S>))
    .route("/study-plans/{id}/progress", get(plans::progress::<S>))
    .route("/study-plan-items/{id}/complete", post(plans::complete::<S>))
    // Import tasks
    .route("/import-tasks/{id}", get(imports::task::<S>))
    // Content
    .route("/content/assignments", post(content::upsert_assignments::<S>))
    .route(
      "/content/learning-objectives",
      post(content::upsert_learning_objectives::<S>),
    )
    .route("/books", post(content::upsert_books::<S>))
    .route("/chapters", post(content::upsert_chapters::<S>))
    .route("/books/{id}/chapters/{chapter_id}", post(content::attach_chapter::<S>))
    .route("/topics", post(content::upsert_topics::<S>))
    .with_state(engine)
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use serde_json::{Value, json};
  use syllabus_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  use super::*;

  async fn engine() -> Engine<SqliteStore> {
    Engine::new(SqliteStore::open_in_memory().await.unwrap())
  }

  async fn send(
    engine: &Engine<SqliteStore>,
    method: &str,
    uri:    &str,
    body:   Option<Value>,
  ) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
      Some(json) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    api_router(engine.clone()).oneshot(req).await.unwrap()
  }

  async fn json_body(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  /// book1 ⊃ chapter1 ⊃ topic1, seeded over HTTP.
  async fn seeded() -> Engine<SqliteStore> {
    let e = engine().await;
    let steps = [
      ("/books", json!([{ "book_id": "book1", "name": "Book 1" }])),
      ("/chapters", json!([{ "chapter_id": "chapter1", "name": "Chapter 1", "display_order": 1 }])),
      ("/books/book1/chapters/chapter1", Value::Null),
      (
        "/topics",
        json!([{ "topic_id": "topic1", "chapter_id": "chapter1", "name": "Topic 1", "display_order": 1 }]),
      ),
    ];
    for (uri, body) in steps {
      let body = (!body.is_null()).then_some(body);
      let resp = send(&e, "POST", uri, body).await;
      assert_eq!(resp.status(), StatusCode::NO_CONTENT, "{uri}");
    }
    e
  }

  fn csv(rows: &[&str]) -> String {
    let mut out = "ID,Book ID,Book name,Chapter ID,Chapter name,Topic ID,Topic name,\
                   Assignment/LO,Content ID,Name,Available from,Available until,Start time,Due time"
      .to_string();
    for r in rows {
      out.push('\n');
      out.push_str(r);
    }
    out
  }

  #[tokio::test]
  async fn import_assign_and_track_progress() {
    let e = seeded().await;

    let resp = send(
      &e,
      "POST",
      "/content/assignments",
      Some(json!([{ "assignment_id": "a1", "topic_id": "topic1", "name": "Essay" }])),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["assignment_ids"], json!(["a1"]));

    let resp = send(
      &e,
      "POST",
      "/study-plans/import",
      Some(json!({
        "course_id": "course1",
        "mode": "CREATE",
        "type": "COURSE",
        "payload": csv(&[",book1,Book 1,chapter1,Chapter 1,topic1,Topic 1,Assignment,a1,Essay,,,,"]),
      })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let imported = json_body(resp).await;
    assert!(imported["task_id"].is_null());
    let plan_id = imported["study_plan_id"].as_str().unwrap().to_string();

    let resp = send(
      &e,
      "POST",
      &format!("/study-plans/{plan_id}/assign"),
      Some(json!({ "student_id": "s1" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let copy_id = json_body(resp).await["study_plan_id"].as_str().unwrap().to_string();

    let resp = send(&e, "GET", "/courses/course1/study-plans", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let listed = json_body(resp).await;
    let mut listed: Vec<&str> = listed
      .as_array()
      .unwrap()
      .iter()
      .map(|p| p["study_plan_id"].as_str().unwrap())
      .collect();
    listed.sort();
    let mut expected = vec![plan_id.as_str(), copy_id.as_str()];
    expected.sort();
    assert_eq!(listed, expected);

    let resp = send(&e, "GET", &format!("/study-plans/{copy_id}/todo?topic_ids=topic1"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let todo = json_body(resp).await;
    assert_eq!(todo.as_array().unwrap().len(), 1);
    assert_eq!(todo[0]["status"], "active");
    let item_id = todo[0]["study_plan_item_id"].as_str().unwrap().to_string();

    let resp = send(
      &e,
      "POST",
      &format!("/study-plan-items/{item_id}/complete"),
      Some(json!({})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(
      &e,
      "GET",
      &format!("/study-plans/{plan_id}/progress?student_id=s1"),
      None,
    )
    .await;
    let progress = json_body(resp).await;
    assert_eq!(progress["completed_assignments"], 1);
    assert_eq!(progress["total_assignments"], 1);
    assert_eq!(progress["study_plan_id"], copy_id.as_str());
  }

  #[tokio::test]
  async fn sync_upsert_fans_out_before_responding() {
    let e = seeded().await;
    let resp = send(
      &e,
      "POST",
      "/study-plans/import",
      Some(json!({
        "course_id": "course1",
        "mode": "CREATE",
        "type": "COURSE",
        "payload": csv(&[]),
      })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(
      &e,
      "POST",
      "/content/learning-objectives?sync=true",
      Some(json!([{ "lo_id": "lo1", "topic_id": "topic1", "name": "Intro" }])),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["lo_ids"], json!(["lo1"]));
    assert_eq!(body["fan_out"]["events"], 1);
  }

  #[tokio::test]
  async fn invalid_rows_return_400_with_details() {
    let e = seeded().await;
    let resp = send(
      &e,
      "POST",
      "/study-plans/import",
      Some(json!({
        "course_id": "course1",
        "mode": "CREATE",
        "type": "COURSE",
        "payload": csv(&[",book1,Book 1,chapter1,Chapter 1,topic9,Topic 9,Assignment,a1,Essay,,,,"]),
      })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert_eq!(body["code"], "INVALID_ARGUMENT");
    assert_eq!(body["row_errors"][0]["row"], 1);
  }

  #[tokio::test]
  async fn unknown_plan_and_task_are_404() {
    let e = engine().await;
    let id = uuid::Uuid::new_v4();

    let resp = send(&e, "GET", &format!("/study-plans/{id}"), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(resp).await["code"], "NOT_FOUND");

    let resp = send(&e, "GET", &format!("/import-tasks/{id}"), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(&e, "GET", "/courses/nobody/study-plans", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!([]));

    let resp = send(
      &e,
      "POST",
      &format!("/study-plans/{id}/assign"),
      Some(json!({ "course_id": "course1" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn delete_then_get_is_404() {
    let e = seeded().await;
    e.upsert_assignments(vec![syllabus_core::content::Assignment {
      assignment_id: "a1".into(),
      topic_id:      "topic1".into(),
      name:          "Essay".into(),
      display_order: 1,
      instruction:   None,
      max_grade:     None,
      updated_at:    None,
    }])
    .await
    .unwrap();
    let imported = e
      .import_study_plan(
        serde_json::from_value(json!({
          "course_id": "course1",
          "mode": "CREATE",
          "type": "COURSE",
          "payload": csv(&[",book1,Book 1,chapter1,Chapter 1,topic1,Topic 1,Assignment,a1,Essay,,,,"]),
        }))
        .unwrap(),
      )
      .await
      .unwrap();
    let id = imported.study_plan_id;

    let resp = send(&e, "DELETE", &format!("/study-plans/{id}"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["deleted"], 1);

    let resp = send(&e, "GET", &format!("/study-plans/{id}/items"), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }
}
