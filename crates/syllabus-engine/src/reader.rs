//! Read models over materialised study plan items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use syllabus_core::{
  content::LeafKind,
  plan::{PlanTarget, StudyPlan, StudyPlanItem},
};
use tracing::info;
use uuid::Uuid;

use crate::{Engine, Error, Result, Store};

// ─── To-do list ──────────────────────────────────────────────────────────────

/// Where an item stands relative to now.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ToDoStatus {
  /// Filter value matching every item.
  #[default]
  All,
  Active,
  Upcoming,
  Overdue,
  Completed,
}

impl ToDoStatus {
  /// Classify `item` at `now`. Never returns [`ToDoStatus::All`].
  pub fn of(item: &StudyPlanItem, now: DateTime<Utc>) -> Self {
    let window = &item.window;
    if item.completed_at.is_some() {
      Self::Completed
    } else if window.available_from.is_some_and(|t| t > now)
      || window.start_date.is_some_and(|t| t > now)
    {
      Self::Upcoming
    } else if window.end_date.is_some_and(|t| t < now) {
      Self::Overdue
    } else {
      Self::Active
    }
  }

  fn admits(self, status: ToDoStatus) -> bool { self == Self::All || self == status }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToDoFilter {
  #[serde(default)]
  pub kind:   Option<LeafKind>,
  #[serde(default)]
  pub status: ToDoStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToDoItem {
  #[serde(flatten)]
  pub item:   StudyPlanItem,
  pub kind:   LeafKind,
  pub status: ToDoStatus,
}

// ─── Progress ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
  /// The student's own plan the counts were taken from.
  pub study_plan_id:                 Uuid,
  pub student_id:                    String,
  pub completed_assignments:         usize,
  pub total_assignments:             usize,
  pub completed_learning_objectives: usize,
  pub total_learning_objectives:     usize,
}

// ─── Operations ──────────────────────────────────────────────────────────────

impl<S: Store> Engine<S> {
  /// A plan by id, deleted plans excluded.
  pub async fn get_study_plan(&self, id: Uuid) -> Result<StudyPlan> {
    self
      .store
      .get_study_plan(id)
      .await
      .map_err(Error::store)?
      .filter(StudyPlan::is_live)
      .ok_or_else(|| Error::NotFound(format!("study plan not found: {id}")))
  }

  pub async fn list_study_plan_items(&self, id: Uuid) -> Result<Vec<StudyPlanItem>> {
    self.get_study_plan(id).await?;
    self.store.list_items(id, false).await.map_err(Error::store)
  }

  /// Soft-delete a plan; a master takes its copies with it.
  pub async fn delete_study_plan(&self, id: Uuid) -> Result<usize> {
    self.get_study_plan(id).await?;
    let deleted = self
      .store
      .soft_delete_study_plan(id)
      .await
      .map_err(Error::store)?;
    info!(plan = %id, plans = deleted, "deleted study plan");
    Ok(deleted)
  }

  /// Live plans bound to `course_id`: its masters and every copy made
  /// within it.
  pub async fn list_study_plans_by_course(&self, course_id: String) -> Result<Vec<StudyPlan>> {
    let course_id = course_id.trim().to_owned();
    if course_id.is_empty() {
      return Err(Error::InvalidArgument("course_id must not be empty".into()));
    }
    self.store.bound_plans(course_id).await.map_err(Error::store)
  }

  /// Live items of `study_plan_id` under `topic_ids`, in chapter, topic,
  /// then item order.
  pub async fn list_todo_items_by_topics(
    &self,
    topic_ids:     Vec<String>,
    study_plan_id: Uuid,
    filter:        ToDoFilter,
  ) -> Result<Vec<ToDoItem>> {
    let topic_ids: Vec<String> = topic_ids
      .into_iter()
      .map(|t| t.trim().to_owned())
      .filter(|t| !t.is_empty())
      .collect();
    if topic_ids.is_empty() {
      return Err(Error::InvalidArgument("topic_ids must not be empty".into()));
    }
    self.get_study_plan(study_plan_id).await?;

    let now = Utc::now();
    let items = self
      .store
      .list_items_by_topics(study_plan_id, topic_ids)
      .await
      .map_err(Error::store)?;
    Ok(
      items
        .into_iter()
        .map(|item| ToDoItem {
          kind:   item.content_structure.leaf.kind(),
          status: ToDoStatus::of(&item, now),
          item,
        })
        .filter(|todo| filter.kind.is_none_or(|k| k == todo.kind))
        .filter(|todo| filter.status.admits(todo.status))
        .collect(),
    )
  }

  /// Completion counts over the copy of `study_plan_id` that belongs to
  /// `student_id`.
  pub async fn retrieve_study_plan_progress(
    &self,
    study_plan_id: Uuid,
    student_id:    String,
  ) -> Result<Progress> {
    let plan = self.get_study_plan(study_plan_id).await?;
    let target = PlanTarget::Student(student_id.clone());

    let own = if plan.target.as_ref() == Some(&target) {
      plan
    } else {
      self
        .store
        .find_copy(plan.master_id(), target)
        .await
        .map_err(Error::store)?
        .ok_or_else(|| {
          Error::NotFound(format!(
            "student {student_id} has no copy of study plan {study_plan_id}"
          ))
        })?
    };

    let items = self
      .store
      .list_items(own.study_plan_id, false)
      .await
      .map_err(Error::store)?;
    let mut progress = Progress {
      study_plan_id: own.study_plan_id,
      student_id,
      completed_assignments: 0,
      total_assignments: 0,
      completed_learning_objectives: 0,
      total_learning_objectives: 0,
    };
    for item in &items {
      let done = usize::from(item.completed_at.is_some());
      match item.content_structure.leaf.kind() {
        LeafKind::Assignment => {
          progress.total_assignments += 1;
          progress.completed_assignments += done;
        }
        LeafKind::LearningObjective => {
          progress.total_learning_objectives += 1;
          progress.completed_learning_objectives += done;
        }
      }
    }
    Ok(progress)
  }

  pub async fn mark_item_completed(&self, item_id: Uuid, completed: bool) -> Result<StudyPlanItem> {
    self
      .store
      .set_item_completed(item_id, completed)
      .await
      .map_err(Error::store)
  }
}
