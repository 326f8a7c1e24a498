//! [`SqliteStore`] and its [`CurriculumStore`] implementation.
//!
//! Rejections detected inside a transaction are returned as
//! `Ok(Err(core_error))` from the connection closure so the transaction is
//! dropped (rolled back) and the domain error survives the round trip.

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use syllabus_core::{
  Error as DomainError,
  content::{Book, Chapter, ContentLeaf, LeafKind, Topic},
  event::ContentEvent,
  store::CurriculumStore,
  structure::{LeafRef, Placement},
};
use uuid::Uuid;

use crate::{
  Result,
  encode::{RawLeaf, RawTopic, encode_dt, encode_uuid},
  schema::SCHEMA,
};

pub(crate) type Domain<T> = syllabus_core::Result<T>;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A study plan store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// True when a live row with `id` exists in `table`.
pub(crate) fn live_row_exists(
  conn: &rusqlite::Connection,
  table: &str,
  id_column: &str,
  id: &str,
) -> rusqlite::Result<bool> {
  let sql =
    format!("SELECT 1 FROM {table} WHERE {id_column} = ?1 AND deleted_at IS NULL");
  Ok(
    conn
      .query_row(&sql, rusqlite::params![id], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}

fn require_ids<'a>(
  what: &'static str,
  ids: impl IntoIterator<Item = &'a str>,
) -> Domain<()> {
  if ids.into_iter().any(|id| id.trim().is_empty()) {
    return Err(DomainError::EmptyId(what));
  }
  Ok(())
}

// ─── CurriculumStore impl ────────────────────────────────────────────────────

impl CurriculumStore for SqliteStore {
  type Error = crate::Error;

  // ── Hierarchy seeding ─────────────────────────────────────────────────────

  async fn upsert_books(&self, books: Vec<Book>) -> Result<()> {
    require_ids("book", books.iter().map(|b| b.book_id.as_str()))?;
    let now = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for book in &books {
          tx.execute(
            "INSERT INTO books (book_id, name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT (book_id) DO UPDATE SET
               name = excluded.name, updated_at = excluded.updated_at, deleted_at = NULL",
            rusqlite::params![book.book_id, book.name, now],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn upsert_chapters(&self, chapters: Vec<Chapter>) -> Result<()> {
    require_ids("chapter", chapters.iter().map(|c| c.chapter_id.as_str()))?;
    let now = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for chapter in &chapters {
          tx.execute(
            "INSERT INTO chapters (chapter_id, name, display_order, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT (chapter_id) DO UPDATE SET
               name = excluded.name, display_order = excluded.display_order,
               updated_at = excluded.updated_at, deleted_at = NULL",
            rusqlite::params![chapter.chapter_id, chapter.name, chapter.display_order, now],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn attach_chapter(&self, book_id: String, chapter_id: String) -> Result<()> {
    let now = encode_dt(Utc::now());

    let outcome: Domain<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !live_row_exists(&tx, "books", "book_id", &book_id)? {
          return Ok(Err(DomainError::BookNotFound(book_id)));
        }
        if !live_row_exists(&tx, "chapters", "chapter_id", &chapter_id)? {
          return Ok(Err(DomainError::ChapterNotFound(chapter_id)));
        }
        tx.execute(
          "INSERT INTO books_chapters (book_id, chapter_id, created_at)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (book_id, chapter_id) DO UPDATE SET deleted_at = NULL",
          rusqlite::params![book_id, chapter_id, now],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    Ok(outcome?)
  }

  async fn upsert_topics(&self, topics: Vec<Topic>) -> Result<()> {
    require_ids("topic", topics.iter().map(|t| t.topic_id.as_str()))?;
    let now = encode_dt(Utc::now());

    let outcome: Domain<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for topic in topics {
          if !live_row_exists(&tx, "chapters", "chapter_id", &topic.chapter_id)? {
            return Ok(Err(DomainError::UnknownParent { kind: "chapter", id: topic.chapter_id }));
          }
          tx.execute(
            "INSERT INTO topics (topic_id, chapter_id, name, display_order, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT (topic_id) DO UPDATE SET
               chapter_id = excluded.chapter_id, name = excluded.name,
               display_order = excluded.display_order,
               updated_at = excluded.updated_at, deleted_at = NULL",
            rusqlite::params![
              topic.topic_id,
              topic.chapter_id,
              topic.name,
              topic.display_order,
              now
            ],
          )?;
        }
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    Ok(outcome?)
  }

  // ── Leaves ────────────────────────────────────────────────────────────────

  async fn upsert_leaves(&self, batch: ContentEvent) -> Result<Vec<String>> {
    let ids = batch.ids();
    require_ids("content", ids.iter().map(String::as_str))?;

    let leaves   = batch.leaves();
    let payload  = serde_json::to_string(&batch)?;
    let event_id = encode_uuid(Uuid::new_v4());
    let now      = encode_dt(Utc::now());

    let outcome: Domain<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for leaf in &leaves {
          let (table, id_column) = leaf_table(leaf.kind());
          if !live_row_exists(&tx, "topics", "topic_id", leaf.topic_id())? {
            return Ok(Err(DomainError::UnknownParent {
              kind: "topic",
              id:   leaf.topic_id().to_owned(),
            }));
          }

          let current_topic: Option<String> = tx
            .query_row(
              &format!("SELECT topic_id FROM {table} WHERE {id_column} = ?1"),
              rusqlite::params![leaf.id()],
              |r| r.get(0),
            )
            .optional()?;
          if let Some(current) = current_topic
            && current != leaf.topic_id()
          {
            return Ok(Err(DomainError::TopicChanged {
              kind: leaf.kind().into(),
              id: leaf.id().to_owned(),
              current,
              requested: leaf.topic_id().to_owned(),
            }));
          }

          match leaf {
            ContentLeaf::LearningObjective(lo) => {
              tx.execute(
                "INSERT INTO learning_objectives
                   (lo_id, topic_id, name, display_order, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT (lo_id) DO UPDATE SET
                   name = excluded.name, display_order = excluded.display_order,
                   updated_at = excluded.updated_at, deleted_at = NULL",
                rusqlite::params![lo.lo_id, lo.topic_id, lo.name, lo.display_order, now],
              )?;
            }
            ContentLeaf::Assignment(a) => {
              tx.execute(
                "INSERT INTO assignments
                   (assignment_id, topic_id, name, display_order, instruction, max_grade,
                    created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT (assignment_id) DO UPDATE SET
                   name = excluded.name, display_order = excluded.display_order,
                   instruction = excluded.instruction, max_grade = excluded.max_grade,
                   updated_at = excluded.updated_at, deleted_at = NULL",
                rusqlite::params![
                  a.assignment_id,
                  a.topic_id,
                  a.name,
                  a.display_order,
                  a.instruction,
                  a.max_grade,
                  now
                ],
              )?;
            }
          }
        }

        tx.execute(
          "INSERT INTO content_events (event_id, payload, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![event_id, payload, now],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    outcome?;

    tracing::debug!(count = ids.len(), "content leaves upserted");
    Ok(ids)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_topic(&self, topic_id: String) -> Result<Option<Topic>> {
    let raw: Option<RawTopic> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT topic_id, chapter_id, name, display_order FROM topics
               WHERE topic_id = ?1 AND deleted_at IS NULL",
              rusqlite::params![topic_id],
              |row| {
                Ok(RawTopic {
                  topic_id:      row.get(0)?,
                  chapter_id:    row.get(1)?,
                  name:          row.get(2)?,
                  display_order: row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    Ok(raw.map(RawTopic::into_topic))
  }

  async fn get_leaf(&self, leaf: LeafRef) -> Result<Option<ContentLeaf>> {
    let kind = leaf.kind();
    let sql = match kind {
      LeafKind::LearningObjective => {
        "SELECT lo_id, topic_id, name, display_order, NULL, NULL, updated_at
         FROM learning_objectives WHERE lo_id = ?1 AND deleted_at IS NULL"
      }
      LeafKind::Assignment => {
        "SELECT assignment_id, topic_id, name, display_order, instruction, max_grade, updated_at
         FROM assignments WHERE assignment_id = ?1 AND deleted_at IS NULL"
      }
    };
    let id = leaf.id().to_owned();

    let raw: Option<RawLeaf> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(sql, rusqlite::params![id], |row| {
              Ok(RawLeaf {
                id:            row.get(0)?,
                topic_id:      row.get(1)?,
                name:          row.get(2)?,
                display_order: row.get(3)?,
                instruction:   row.get(4)?,
                max_grade:     row.get(5)?,
                updated_at:    row.get(6)?,
              })
            })
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|r| match kind {
        LeafKind::LearningObjective => r.into_learning_objective(),
        LeafKind::Assignment => r.into_assignment(),
      })
      .transpose()
  }

  async fn placements_for_topic(&self, topic_id: String) -> Result<Vec<Placement>> {
    let placements = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT bc.book_id, t.chapter_id, t.topic_id
           FROM topics t
           JOIN chapters c        ON c.chapter_id = t.chapter_id AND c.deleted_at IS NULL
           JOIN books_chapters bc ON bc.chapter_id = t.chapter_id AND bc.deleted_at IS NULL
           JOIN books b           ON b.book_id = bc.book_id AND b.deleted_at IS NULL
           WHERE t.topic_id = ?1 AND t.deleted_at IS NULL
           ORDER BY bc.book_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![topic_id], |row| {
            Ok(Placement {
              book_id:    row.get(0)?,
              chapter_id: row.get(1)?,
              topic_id:   row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(placements)
  }
}

fn leaf_table(kind: LeafKind) -> (&'static str, &'static str) {
  match kind {
    LeafKind::LearningObjective => ("learning_objectives", "lo_id"),
    LeafKind::Assignment => ("assignments", "assignment_id"),
  }
}
