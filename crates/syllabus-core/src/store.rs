//! Storage traits: the content hierarchy, study plans, and the event outbox.
//!
//! The traits are implemented by storage backends (e.g.
//! `syllabus-store-sqlite`). The engine and HTTP layers depend on this
//! abstraction, not on any concrete backend.
//!
//! Every method returns a `Send` future so the traits can be used from a
//! multi-threaded tokio runtime. Composite writes (`create_copy`,
//! `sync_fan_out`, `apply_changes`, `upsert_leaves`) must be atomic.

use std::{future::Future, time::Duration};

use uuid::Uuid;

use crate::{
  content::{Book, Chapter, ContentLeaf, Topic},
  event::{ContentEvent, OutboxEvent},
  plan::{
    CopyOutcome, NewStudyPlan, NewStudyPlanItem, PlanChange, PlanTarget, StudyPlan,
    StudyPlanItem, SyncOutcome,
  },
  structure::{LeafRef, Placement},
  task::{ImportTask, TaskStatus},
};

/// Backend errors expose the domain rejection they wrap, if any, so callers
/// can classify them without knowing the backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn domain(&self) -> Option<&crate::Error>;
}

// ─── Content hierarchy ───────────────────────────────────────────────────────

/// Read access to the content hierarchy plus the authoring writes that feed
/// it. Leaf writes also append a [`ContentEvent`] to the outbox.
pub trait CurriculumStore: Send + Sync {
  type Error: StoreError;

  // ── Hierarchy seeding ─────────────────────────────────────────────────

  fn upsert_books(
    &self,
    books: Vec<Book>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn upsert_chapters(
    &self,
    chapters: Vec<Chapter>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Add `chapter_id` to `book_id`. Both must exist.
  fn attach_chapter(
    &self,
    book_id: String,
    chapter_id: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Every topic's chapter must exist.
  fn upsert_topics(
    &self,
    topics: Vec<Topic>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Leaves ────────────────────────────────────────────────────────────

  /// Insert or update every leaf in `batch` and append `batch` to the outbox,
  /// in one transaction. Returns the leaf ids in input order.
  ///
  /// Fails if a topic does not exist or if a leaf would move to another
  /// topic.
  fn upsert_leaves(
    &self,
    batch: ContentEvent,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn get_topic(
    &self,
    topic_id: String,
  ) -> impl Future<Output = Result<Option<Topic>, Self::Error>> + Send + '_;

  fn get_leaf(
    &self,
    leaf: LeafRef,
  ) -> impl Future<Output = Result<Option<ContentLeaf>, Self::Error>> + Send + '_;

  /// One placement per book containing the topic's chapter.
  fn placements_for_topic(
    &self,
    topic_id: String,
  ) -> impl Future<Output = Result<Vec<Placement>, Self::Error>> + Send + '_;
}

// ─── Study plans ─────────────────────────────────────────────────────────────

pub trait StudyPlanStore: CurriculumStore {
  // ── Plans ─────────────────────────────────────────────────────────────

  /// Create a master plan with `items` (flatten derived) and bind it to its
  /// course.
  fn create_master(
    &self,
    plan: NewStudyPlan,
    items: Vec<NewStudyPlanItem>,
  ) -> impl Future<Output = Result<StudyPlan, Self::Error>> + Send + '_;

  /// Retrieve a plan by id, deleted or not. Returns `None` if not found.
  fn get_study_plan(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<StudyPlan>, Self::Error>> + Send + '_;

  /// Live copies of `master_id`.
  fn list_copies(
    &self,
    master_id: Uuid,
  ) -> impl Future<Output = Result<Vec<StudyPlan>, Self::Error>> + Send + '_;

  /// The live copy of `master_id` bound to `target`, if any.
  fn find_copy(
    &self,
    master_id: Uuid,
    target: PlanTarget,
  ) -> impl Future<Output = Result<Option<StudyPlan>, Self::Error>> + Send + '_;

  /// Every live plan bound to `course_id`: masters through the course
  /// binding, copies through their course.
  fn bound_plans(
    &self,
    course_id: String,
  ) -> impl Future<Output = Result<Vec<StudyPlan>, Self::Error>> + Send + '_;

  /// Live master plans built on `book_id`.
  fn masters_for_book(
    &self,
    book_id: String,
  ) -> impl Future<Output = Result<Vec<StudyPlan>, Self::Error>> + Send + '_;

  /// Soft-delete a plan with its items. Deleting a master also deletes its
  /// copies. Returns the number of plans deleted.
  fn soft_delete_study_plan(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Duplication and propagation ───────────────────────────────────────

  /// Clone every live item of `master_id` into a new copy bound to
  /// `target`. Returns the existing copy unchanged when one is already
  /// bound.
  fn create_copy(
    &self,
    master_id: Uuid,
    target: PlanTarget,
  ) -> impl Future<Output = Result<CopyOutcome, Self::Error>> + Send + '_;

  /// Upsert `items` into `master_id` keyed on the content structure flatten,
  /// then mirror each live master item into every live copy. Existing rows
  /// only have their display order updated; soft-deleted rows stay deleted.
  fn sync_fan_out(
    &self,
    master_id: Uuid,
    items: Vec<NewStudyPlanItem>,
  ) -> impl Future<Output = Result<SyncOutcome, Self::Error>> + Send + '_;

  /// Apply every change in one transaction.
  fn apply_changes(
    &self,
    changes: Vec<PlanChange>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Items ─────────────────────────────────────────────────────────────

  /// Items of a plan ordered by display order.
  fn list_items(
    &self,
    study_plan_id: Uuid,
    include_deleted: bool,
  ) -> impl Future<Output = Result<Vec<StudyPlanItem>, Self::Error>> + Send + '_;

  /// Live items of a plan under any of `topic_ids`, ordered by chapter,
  /// topic, then item display order.
  fn list_items_by_topics(
    &self,
    study_plan_id: Uuid,
    topic_ids: Vec<String>,
  ) -> impl Future<Output = Result<Vec<StudyPlanItem>, Self::Error>> + Send + '_;

  fn set_item_completed(
    &self,
    item_id: Uuid,
    completed: bool,
  ) -> impl Future<Output = Result<StudyPlanItem, Self::Error>> + Send + '_;

  // ── Import tasks ──────────────────────────────────────────────────────

  fn create_task(
    &self,
    study_plan_id: Uuid,
  ) -> impl Future<Output = Result<ImportTask, Self::Error>> + Send + '_;

  fn update_task(
    &self,
    task_id: Uuid,
    status: TaskStatus,
    error_detail: Option<String>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_task(
    &self,
    task_id: Uuid,
  ) -> impl Future<Output = Result<Option<ImportTask>, Self::Error>> + Send + '_;
}

// ─── Outbox ──────────────────────────────────────────────────────────────────

/// The durable side of the content-change channel. Delivery is at least
/// once: an event leased by a consumer that never acknowledges it becomes
/// claimable again when the lease runs out.
pub trait EventOutbox: CurriculumStore {
  /// Lease up to `limit` undelivered events that have failed fewer than
  /// `max_attempts` times, oldest first.
  fn claim_events(
    &self,
    limit: usize,
    lease: Duration,
    max_attempts: u32,
  ) -> impl Future<Output = Result<Vec<OutboxEvent>, Self::Error>> + Send + '_;

  /// Mark an event delivered.
  fn ack_event(
    &self,
    event_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Record a failed delivery and release the lease.
  fn nack_event(
    &self,
    event_id: Uuid,
    error: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
