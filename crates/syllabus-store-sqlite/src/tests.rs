//! Integration tests for `SqliteStore` against an in-memory database.

use std::time::Duration;

use syllabus_core::{
  Error as DomainError,
  content::{Assignment, Book, Chapter, LearningObjective, Topic},
  event::ContentEvent,
  plan::{
    ItemInsert, ItemPatch, NewStudyPlan, NewStudyPlanItem, PlanChange, PlanTarget,
    ScheduleWindow, StudyPlan, StudyPlanType,
  },
  store::{CurriculumStore, EventOutbox, StoreError, StudyPlanStore},
  structure::{LeafRef, Placement},
  task::TaskStatus,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// book1 ⊃ chapter1; book2 ⊃ chapter1, chapter2, chapter3; book3 ⊃ chapter3.
/// topic1 ∈ chapter1, topic2 ∈ chapter2, topic3 ∈ chapter3.
async fn seeded() -> SqliteStore {
  let s = store().await;
  s.upsert_books(
    (1..=3)
      .map(|n| Book { book_id: format!("book{n}"), name: format!("Book {n}") })
      .collect(),
  )
  .await
  .unwrap();
  s.upsert_chapters(
    (1..=3)
      .map(|n| Chapter {
        chapter_id:    format!("chapter{n}"),
        name:          format!("Chapter {n}"),
        display_order: n,
      })
      .collect(),
  )
  .await
  .unwrap();
  for (book, chapter) in [
    ("book1", "chapter1"),
    ("book2", "chapter1"),
    ("book2", "chapter2"),
    ("book2", "chapter3"),
    ("book3", "chapter3"),
  ] {
    s.attach_chapter(book.into(), chapter.into()).await.unwrap();
  }
  s.upsert_topics(
    (1..=3)
      .map(|n| Topic {
        topic_id:      format!("topic{n}"),
        chapter_id:    format!("chapter{n}"),
        name:          format!("Topic {n}"),
        display_order: 1,
      })
      .collect(),
  )
  .await
  .unwrap();
  s
}

fn assignment(id: &str, topic: &str, order: i32) -> Assignment {
  Assignment {
    assignment_id: id.into(),
    topic_id:      topic.into(),
    name:          format!("Assignment {id}"),
    display_order: order,
    instruction:   None,
    max_grade:     None,
    updated_at:    None,
  }
}

fn item(book: &str, chapter: &str, topic: &str, leaf: LeafRef, order: i32) -> NewStudyPlanItem {
  NewStudyPlanItem {
    content_structure: Placement {
      book_id:    book.into(),
      chapter_id: chapter.into(),
      topic_id:   topic.into(),
    }
    .structure("course1", leaf),
    display_order:     order,
    window:            ScheduleWindow::default(),
  }
}

async fn master(s: &SqliteStore, book: &str, items: Vec<NewStudyPlanItem>) -> StudyPlan {
  s.create_master(
    NewStudyPlan {
      name:      format!("Plan for {book}"),
      plan_type: StudyPlanType::Course,
      course_id: "course1".into(),
      book_id:   book.into(),
    },
    items,
  )
  .await
  .unwrap()
}

fn domain(err: &crate::Error) -> &DomainError {
  err.domain().expect("domain error")
}

// ─── Content hierarchy ───────────────────────────────────────────────────────

#[tokio::test]
async fn topic_reachable_through_shared_chapter() {
  let s = seeded().await;

  let books = |ps: Vec<Placement>| ps.into_iter().map(|p| p.book_id).collect::<Vec<_>>();
  assert_eq!(books(s.placements_for_topic("topic1".into()).await.unwrap()), ["book1", "book2"]);
  assert_eq!(books(s.placements_for_topic("topic2".into()).await.unwrap()), ["book2"]);
  assert_eq!(books(s.placements_for_topic("topic3".into()).await.unwrap()), ["book2", "book3"]);
  assert!(s.placements_for_topic("missing".into()).await.unwrap().is_empty());
}

#[tokio::test]
async fn attach_chapter_requires_both_ends() {
  let s = seeded().await;
  let err = s.attach_chapter("nope".into(), "chapter1".into()).await.unwrap_err();
  assert!(matches!(domain(&err), DomainError::BookNotFound(_)));
  let err = s.attach_chapter("book1".into(), "nope".into()).await.unwrap_err();
  assert!(matches!(domain(&err), DomainError::ChapterNotFound(_)));
}

#[tokio::test]
async fn upsert_leaves_writes_rows_and_one_event() {
  let s = seeded().await;

  let ids = s
    .upsert_leaves(ContentEvent::AssignmentsUpserted {
      assignments: vec![assignment("a1", "topic1", 1), assignment("a2", "topic2", 2)],
    })
    .await
    .unwrap();
  assert_eq!(ids, ["a1", "a2"]);

  let leaf = s.get_leaf(LeafRef::Assignment("a2".into())).await.unwrap().unwrap();
  assert_eq!(leaf.topic_id(), "topic2");
  assert_eq!(leaf.display_order(), 2);
  assert!(s.get_leaf(LeafRef::LearningObjective("a2".into())).await.unwrap().is_none());

  let events = s.claim_events(10, Duration::from_secs(30), 5).await.unwrap();
  assert_eq!(events.len(), 1);
  assert_eq!(events[0].event.ids(), ["a1", "a2"]);
}

#[tokio::test]
async fn upsert_leaves_rejects_unknown_topic_without_side_effects() {
  let s = seeded().await;

  let err = s
    .upsert_leaves(ContentEvent::LearningObjectivesUpserted {
      learning_objectives: vec![
        LearningObjective {
          lo_id:         "lo1".into(),
          topic_id:      "topic1".into(),
          name:          "LO 1".into(),
          display_order: 1,
          updated_at:    None,
        },
        LearningObjective {
          lo_id:         "lo2".into(),
          topic_id:      "ghost".into(),
          name:          "LO 2".into(),
          display_order: 2,
          updated_at:    None,
        },
      ],
    })
    .await
    .unwrap_err();
  assert!(matches!(domain(&err), DomainError::UnknownParent { kind: "topic", id } if id == "ghost"));

  assert!(s.get_leaf(LeafRef::LearningObjective("lo1".into())).await.unwrap().is_none());
  assert!(s.claim_events(10, Duration::from_secs(30), 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn upsert_leaves_rejects_topic_move() {
  let s = seeded().await;
  s.upsert_leaves(ContentEvent::AssignmentsUpserted {
    assignments: vec![assignment("a1", "topic1", 1)],
  })
  .await
  .unwrap();

  let err = s
    .upsert_leaves(ContentEvent::AssignmentsUpserted {
      assignments: vec![assignment("a1", "topic2", 1)],
    })
    .await
    .unwrap_err();
  assert!(matches!(domain(&err), DomainError::TopicChanged { .. }));
}

// ─── Plans and duplication ───────────────────────────────────────────────────

#[tokio::test]
async fn create_master_binds_course_and_orders_items() {
  let s = seeded().await;
  let plan = master(
    &s,
    "book2",
    vec![
      item("book2", "chapter2", "topic2", LeafRef::Assignment("a2".into()), 2),
      item("book2", "chapter1", "topic1", LeafRef::Assignment("a1".into()), 1),
    ],
  )
  .await;

  assert!(plan.is_master());
  let items = s.list_items(plan.study_plan_id, false).await.unwrap();
  let orders: Vec<i32> = items.iter().map(|i| i.display_order).collect();
  assert_eq!(orders, [1, 2]);
  assert!(items[0].content_structure_flatten.contains("a1"));

  let bound = s.bound_plans("course1".into()).await.unwrap();
  assert_eq!(bound.len(), 1);
  assert_eq!(bound[0].study_plan_id, plan.study_plan_id);
}

#[tokio::test]
async fn create_copy_clones_items_and_is_idempotent() {
  let s = seeded().await;
  let plan = master(
    &s,
    "book1",
    (1..=3)
      .map(|n| item("book1", "chapter1", "topic1", LeafRef::Assignment(format!("a{n}")), n))
      .collect(),
  )
  .await;

  let target = PlanTarget::Student("student1".into());
  let first = s.create_copy(plan.study_plan_id, target.clone()).await.unwrap();
  assert!(first.created);
  assert_eq!(first.items_cloned, 3);
  assert_eq!(first.plan.master_study_plan_id, Some(plan.study_plan_id));
  assert_eq!(first.plan.target, Some(target.clone()));

  let master_items = s.list_items(plan.study_plan_id, false).await.unwrap();
  let copy_items = s.list_items(first.plan.study_plan_id, false).await.unwrap();
  assert_eq!(
    copy_items.iter().map(|i| i.display_order).collect::<Vec<_>>(),
    [1, 2, 3]
  );
  for (m, c) in master_items.iter().zip(&copy_items) {
    assert_eq!(c.copy_study_plan_item_id, Some(m.study_plan_item_id));
    assert_eq!(c.content_structure, m.content_structure);
  }

  let again = s.create_copy(plan.study_plan_id, target.clone()).await.unwrap();
  assert!(!again.created);
  assert_eq!(again.plan.study_plan_id, first.plan.study_plan_id);
  assert_eq!(s.list_copies(plan.study_plan_id).await.unwrap().len(), 1);

  let found = s.find_copy(plan.study_plan_id, target).await.unwrap().unwrap();
  assert_eq!(found.study_plan_id, first.plan.study_plan_id);
}

#[tokio::test]
async fn create_copy_requires_live_master() {
  let s = seeded().await;
  let err = s
    .create_copy(Uuid::new_v4(), PlanTarget::Course("course1".into()))
    .await
    .unwrap_err();
  assert!(matches!(domain(&err), DomainError::StudyPlanNotFound(_)));

  let plan = master(&s, "book1", vec![]).await;
  let copy = s
    .create_copy(plan.study_plan_id, PlanTarget::Class("class1".into()))
    .await
    .unwrap();
  let err = s
    .create_copy(copy.plan.study_plan_id, PlanTarget::Student("s1".into()))
    .await
    .unwrap_err();
  assert!(matches!(domain(&err), DomainError::NotAMaster(_)));
}

#[tokio::test]
async fn soft_delete_master_cascades_to_copies() {
  let s = seeded().await;
  let plan = master(
    &s,
    "book1",
    vec![item("book1", "chapter1", "topic1", LeafRef::Assignment("a1".into()), 1)],
  )
  .await;
  let copy = s
    .create_copy(plan.study_plan_id, PlanTarget::Student("s1".into()))
    .await
    .unwrap();

  assert_eq!(s.soft_delete_study_plan(plan.study_plan_id).await.unwrap(), 2);

  let gone = s.get_study_plan(copy.plan.study_plan_id).await.unwrap().unwrap();
  assert!(gone.deleted_at.is_some());
  assert!(s.list_items(copy.plan.study_plan_id, false).await.unwrap().is_empty());
  assert_eq!(s.list_items(copy.plan.study_plan_id, true).await.unwrap().len(), 1);
  assert!(s.masters_for_book("book1".into()).await.unwrap().is_empty());

  let err = s.soft_delete_study_plan(plan.study_plan_id).await.unwrap_err();
  assert!(matches!(domain(&err), DomainError::StudyPlanNotFound(_)));
}

// ─── Fan-out synchronisation ─────────────────────────────────────────────────

#[tokio::test]
async fn sync_fan_out_is_idempotent_and_reaches_copies() {
  let s = seeded().await;
  let plan = master(&s, "book1", vec![]).await;
  let copy = s
    .create_copy(plan.study_plan_id, PlanTarget::Course("course1".into()))
    .await
    .unwrap();

  let new = || vec![item("book1", "chapter1", "topic1", LeafRef::Assignment("a1".into()), 4)];

  let first = s.sync_fan_out(plan.study_plan_id, new()).await.unwrap();
  assert_eq!(first.master_items_created, 1);
  assert_eq!(first.copy_items_created, 1);

  let second = s.sync_fan_out(plan.study_plan_id, new()).await.unwrap();
  assert_eq!(second.master_items_created, 0);
  assert_eq!(second.copy_items_created, 0);
  assert_eq!(second.items_reordered, 0);

  let master_items = s.list_items(plan.study_plan_id, false).await.unwrap();
  let copy_items = s.list_items(copy.plan.study_plan_id, false).await.unwrap();
  assert_eq!(master_items.len(), 1);
  assert_eq!(copy_items.len(), 1);
  assert_eq!(copy_items[0].copy_study_plan_item_id, Some(master_items[0].study_plan_item_id));
}

#[tokio::test]
async fn sync_fan_out_updates_order_everywhere() {
  let s = seeded().await;
  let plan = master(
    &s,
    "book1",
    vec![
      item("book1", "chapter1", "topic1", LeafRef::Assignment("a1".into()), 1),
      item("book1", "chapter1", "topic1", LeafRef::Assignment("a2".into()), 2),
    ],
  )
  .await;
  let copy = s
    .create_copy(plan.study_plan_id, PlanTarget::Student("s1".into()))
    .await
    .unwrap();

  let outcome = s
    .sync_fan_out(
      plan.study_plan_id,
      vec![item("book1", "chapter1", "topic1", LeafRef::Assignment("a1".into()), 9)],
    )
    .await
    .unwrap();
  assert_eq!(outcome.items_reordered, 2);

  for plan_id in [plan.study_plan_id, copy.plan.study_plan_id] {
    let orders: Vec<(String, i32)> = s
      .list_items(plan_id, false)
      .await
      .unwrap()
      .into_iter()
      .map(|i| (i.content_structure.leaf.id().to_owned(), i.display_order))
      .collect();
    assert_eq!(orders, [("a2".to_owned(), 2), ("a1".to_owned(), 9)]);
  }
}

#[tokio::test]
async fn sync_fan_out_leaves_deleted_items_deleted() {
  let s = seeded().await;
  let plan = master(
    &s,
    "book1",
    vec![item("book1", "chapter1", "topic1", LeafRef::Assignment("a1".into()), 1)],
  )
  .await;
  let existing = s.list_items(plan.study_plan_id, false).await.unwrap();
  s.apply_changes(vec![PlanChange {
    study_plan_id: plan.study_plan_id,
    inserts:       vec![],
    updates:       vec![],
    deletions:     vec![existing[0].study_plan_item_id],
  }])
  .await
  .unwrap();

  let outcome = s
    .sync_fan_out(
      plan.study_plan_id,
      vec![item("book1", "chapter1", "topic1", LeafRef::Assignment("a1".into()), 1)],
    )
    .await
    .unwrap();
  assert_eq!(outcome.master_items_created, 0);
  assert!(s.list_items(plan.study_plan_id, false).await.unwrap().is_empty());
}

// ─── Change sets ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn apply_changes_is_all_or_nothing() {
  let s = seeded().await;
  let plan = master(
    &s,
    "book1",
    vec![item("book1", "chapter1", "topic1", LeafRef::Assignment("a1".into()), 1)],
  )
  .await;
  let existing = s.list_items(plan.study_plan_id, false).await.unwrap();

  let err = s
    .apply_changes(vec![
      PlanChange {
        study_plan_id: plan.study_plan_id,
        inserts:       vec![],
        updates:       vec![],
        deletions:     vec![existing[0].study_plan_item_id],
      },
      PlanChange {
        study_plan_id: Uuid::new_v4(),
        inserts:       vec![],
        updates:       vec![],
        deletions:     vec![],
      },
    ])
    .await
    .unwrap_err();
  assert!(matches!(domain(&err), DomainError::StudyPlanNotFound(_)));
  assert_eq!(s.list_items(plan.study_plan_id, false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn apply_changes_restores_and_inserts() {
  let s = seeded().await;
  let plan = master(
    &s,
    "book1",
    vec![item("book1", "chapter1", "topic1", LeafRef::Assignment("a1".into()), 1)],
  )
  .await;
  let a1 = s.list_items(plan.study_plan_id, false).await.unwrap().remove(0);
  s.apply_changes(vec![PlanChange {
    study_plan_id: plan.study_plan_id,
    inserts:       vec![],
    updates:       vec![],
    deletions:     vec![a1.study_plan_item_id],
  }])
  .await
  .unwrap();

  let a2 = item("book1", "chapter1", "topic1", LeafRef::Assignment("a2".into()), 1);
  let a2_id = Uuid::new_v4();
  s.apply_changes(vec![PlanChange {
    study_plan_id: plan.study_plan_id,
    inserts:       vec![ItemInsert {
      study_plan_item_id:      a2_id,
      content_structure:       a2.content_structure,
      display_order:           1,
      window:                  ScheduleWindow::default(),
      copy_study_plan_item_id: None,
    }],
    updates:       vec![ItemPatch {
      study_plan_item_id:      a1.study_plan_item_id,
      display_order:           2,
      window:                  ScheduleWindow::default(),
      copy_study_plan_item_id: None,
      restore:                 true,
    }],
    deletions:     vec![],
  }])
  .await
  .unwrap();

  let ids: Vec<Uuid> = s
    .list_items(plan.study_plan_id, false)
    .await
    .unwrap()
    .into_iter()
    .map(|i| i.study_plan_item_id)
    .collect();
  assert_eq!(ids, [a2_id, a1.study_plan_item_id]);
}

// ─── Items ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn items_by_topics_follow_chapter_then_topic_order() {
  let s = seeded().await;
  let plan = master(
    &s,
    "book2",
    vec![
      item("book2", "chapter3", "topic3", LeafRef::Assignment("a3".into()), 1),
      item("book2", "chapter1", "topic1", LeafRef::Assignment("a1".into()), 2),
      item("book2", "chapter2", "topic2", LeafRef::Assignment("a2".into()), 3),
    ],
  )
  .await;

  let leaves: Vec<String> = s
    .list_items_by_topics(plan.study_plan_id, vec!["topic3".into(), "topic1".into()])
    .await
    .unwrap()
    .into_iter()
    .map(|i| i.content_structure.leaf.id().to_owned())
    .collect();
  assert_eq!(leaves, ["a1", "a3"]);
}

#[tokio::test]
async fn completion_round_trip() {
  let s = seeded().await;
  let plan = master(
    &s,
    "book1",
    vec![item("book1", "chapter1", "topic1", LeafRef::Assignment("a1".into()), 1)],
  )
  .await;
  let id = s.list_items(plan.study_plan_id, false).await.unwrap()[0].study_plan_item_id;

  let done = s.set_item_completed(id, true).await.unwrap();
  assert!(done.completed_at.is_some());
  let again = s.set_item_completed(id, true).await.unwrap();
  assert_eq!(again.completed_at, done.completed_at);
  let undone = s.set_item_completed(id, false).await.unwrap();
  assert!(undone.completed_at.is_none());

  let err = s.set_item_completed(Uuid::new_v4(), true).await.unwrap_err();
  assert!(matches!(domain(&err), DomainError::ItemNotFound(_)));
}

// ─── Tasks ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn task_status_transitions() {
  let s = seeded().await;
  let plan = master(&s, "book1", vec![]).await;

  let task = s.create_task(plan.study_plan_id).await.unwrap();
  assert_eq!(task.status, TaskStatus::Pending);

  s.update_task(task.task_id, TaskStatus::Failed, Some("boom".into()))
    .await
    .unwrap();
  let fetched = s.get_task(task.task_id).await.unwrap().unwrap();
  assert_eq!(fetched.status, TaskStatus::Failed);
  assert_eq!(fetched.error_detail.as_deref(), Some("boom"));

  assert!(s.get_task(Uuid::new_v4()).await.unwrap().is_none());
  let err = s
    .update_task(Uuid::new_v4(), TaskStatus::Completed, None)
    .await
    .unwrap_err();
  assert!(matches!(domain(&err), DomainError::TaskNotFound(_)));
}

// ─── Outbox ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn leased_events_are_hidden_until_nacked() {
  let s = seeded().await;
  s.upsert_leaves(ContentEvent::AssignmentsUpserted {
    assignments: vec![assignment("a1", "topic1", 1)],
  })
  .await
  .unwrap();

  let lease = Duration::from_secs(60);
  let claimed = s.claim_events(10, lease, 3).await.unwrap();
  assert_eq!(claimed.len(), 1);
  assert!(s.claim_events(10, lease, 3).await.unwrap().is_empty());

  s.nack_event(claimed[0].event_id, "transient".into()).await.unwrap();
  let retried = s.claim_events(10, lease, 3).await.unwrap();
  assert_eq!(retried.len(), 1);
  assert_eq!(retried[0].attempts, 1);

  s.ack_event(retried[0].event_id).await.unwrap();
  s.nack_event(retried[0].event_id, "late".into()).await.unwrap();
  assert!(s.claim_events(10, Duration::ZERO, 3).await.unwrap().is_empty());
}

#[tokio::test]
async fn expired_lease_redelivers_and_attempts_cap_delivery() {
  let s = seeded().await;
  s.upsert_leaves(ContentEvent::AssignmentsUpserted {
    assignments: vec![assignment("a1", "topic1", 1)],
  })
  .await
  .unwrap();

  let first = s.claim_events(10, Duration::ZERO, 2).await.unwrap();
  assert_eq!(first.len(), 1);
  let redelivered = s.claim_events(10, Duration::ZERO, 2).await.unwrap();
  assert_eq!(redelivered.len(), 1);

  let id = first[0].event_id;
  s.nack_event(id, "one".into()).await.unwrap();
  s.nack_event(id, "two".into()).await.unwrap();
  assert!(s.claim_events(10, Duration::ZERO, 2).await.unwrap().is_empty());
}
