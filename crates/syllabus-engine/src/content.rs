//! Content mutation entry points.
//!
//! Leaf upserts write the leaves and their outbox event together; the
//! resulting fan-out happens when the event is delivered.

use syllabus_core::{
  content::{Assignment, Book, Chapter, LearningObjective, Topic},
  event::ContentEvent,
};
use tracing::info;

use crate::{Engine, Error, Result, Store};

impl<S: Store> Engine<S> {
  pub async fn upsert_assignments(&self, assignments: Vec<Assignment>) -> Result<Vec<String>> {
    self
      .upsert_leaves(ContentEvent::AssignmentsUpserted { assignments })
      .await
  }

  pub async fn upsert_learning_objectives(
    &self,
    learning_objectives: Vec<LearningObjective>,
  ) -> Result<Vec<String>> {
    self
      .upsert_leaves(ContentEvent::LearningObjectivesUpserted { learning_objectives })
      .await
  }

  async fn upsert_leaves(&self, batch: ContentEvent) -> Result<Vec<String>> {
    if batch.is_empty() {
      return Err(Error::InvalidArgument("no content given".into()));
    }
    if batch.leaves().iter().any(|l| l.id().trim().is_empty()) {
      return Err(Error::InvalidArgument("content ids must not be empty".into()));
    }
    let ids = self.store.upsert_leaves(batch).await.map_err(Error::store)?;
    info!(count = ids.len(), "upserted content");
    Ok(ids)
  }

  // ── Hierarchy seeding ─────────────────────────────────────────────────────

  pub async fn upsert_books(&self, books: Vec<Book>) -> Result<()> {
    self.store.upsert_books(books).await.map_err(Error::store)
  }

  pub async fn upsert_chapters(&self, chapters: Vec<Chapter>) -> Result<()> {
    self.store.upsert_chapters(chapters).await.map_err(Error::store)
  }

  pub async fn attach_chapter(&self, book_id: String, chapter_id: String) -> Result<()> {
    self
      .store
      .attach_chapter(book_id, chapter_id)
      .await
      .map_err(Error::store)
  }

  pub async fn upsert_topics(&self, topics: Vec<Topic>) -> Result<()> {
    self.store.upsert_topics(topics).await.map_err(Error::store)
  }
}
