//! Bulk study plan import.
//!
//! `CREATE` builds a new master plan from the payload rows and, when students
//! are listed, assigns it to each of them in a background task. `UPDATE`
//! diffs the rows against existing plans: masters (and through them every
//! copy) for `COURSE` imports, individual copies for `INDIVIDUAL` imports.
//! Either way every row is validated before anything is written, and all
//! writes of one import land in a single transaction.

use std::{
  collections::{HashMap, HashSet},
  time::Duration,
};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use syllabus_core::{
  content::Topic,
  plan::{NewStudyPlan, NewStudyPlanItem, PlanChange, PlanTarget, StudyPlan, StudyPlanItem,
    StudyPlanType},
  structure::{LeafRef, Placement},
  task::{ImportTask, TaskStatus},
};
use syllabus_csv::ImportRow;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
  Engine, Error, Result, RowError, Store,
  diff::{Slot, diff, mirror},
};

// ─── Request / response ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportMode {
  Create,
  Update,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportRequest {
  pub course_id:      String,
  pub mode:           ImportMode,
  #[serde(rename = "type")]
  pub plan_type:      StudyPlanType,
  /// Tabular payload; see [`syllabus_csv::HEADER`].
  pub payload:        String,
  /// Name of a created plan. Defaults to the book name of the first row.
  #[serde(default)]
  pub name:           Option<String>,
  /// Plans an `UPDATE` rewrites.
  #[serde(default)]
  pub study_plan_ids: Vec<Uuid>,
  /// Students a `CREATE` assigns the new plan to.
  #[serde(default)]
  pub student_ids:    Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportResponse {
  /// The created master, or the master of the first updated plan.
  pub study_plan_id: Uuid,
  /// Background assignment task; `None` when nothing was queued.
  pub task_id:       Option<Uuid>,
}

// ─── Row validation ──────────────────────────────────────────────────────────

fn row_error(e: syllabus_csv::Error) -> RowError {
  let row = e.row().unwrap_or(0);
  match e {
    syllabus_csv::Error::Cell { column, message, .. } => {
      RowError::new(row, format!("{column}: {message}"))
    }
    syllabus_csv::Error::ColumnCount { expected, found, .. } => {
      RowError::new(row, format!("expected {expected} columns, found {found}"))
    }
    other => RowError::new(row, other.to_string()),
  }
}

/// Memoised hierarchy lookups for one import.
struct Hierarchy<'a, S> {
  store:      &'a S,
  topics:     HashMap<String, Option<Topic>>,
  placements: HashMap<String, Vec<Placement>>,
}

impl<'a, S: Store> Hierarchy<'a, S> {
  fn new(store: &'a S) -> Self {
    Self { store, topics: HashMap::new(), placements: HashMap::new() }
  }

  /// The reason `row` does not fit the content hierarchy, if any.
  async fn check(&mut self, row: &ImportRow) -> Result<Option<String>> {
    if let Err(e) = row.window.validate() {
      return Ok(Some(e.to_string()));
    }

    if !self.topics.contains_key(&row.topic_id) {
      let topic = self
        .store
        .get_topic(row.topic_id.clone())
        .await
        .map_err(Error::store)?;
      self.topics.insert(row.topic_id.clone(), topic);
    }
    let Some(Some(topic)) = self.topics.get(&row.topic_id) else {
      return Ok(Some(format!("unknown topic {}", row.topic_id)));
    };
    if topic.chapter_id != row.chapter_id {
      return Ok(Some(format!(
        "topic {} is not in chapter {}",
        row.topic_id, row.chapter_id
      )));
    }

    if !self.placements.contains_key(&row.topic_id) {
      let found = self
        .store
        .placements_for_topic(row.topic_id.clone())
        .await
        .map_err(Error::store)?;
      self.placements.insert(row.topic_id.clone(), found);
    }
    let placement = row.placement();
    if !self
      .placements
      .get(&row.topic_id)
      .is_some_and(|all| all.contains(&placement))
    {
      return Ok(Some(format!(
        "chapter {} is not in book {}",
        row.chapter_id, row.book_id
      )));
    }

    match self.store.get_leaf(row.leaf()).await.map_err(Error::store)? {
      None => Ok(Some(format!("unknown {} {}", row.kind, row.content_id))),
      Some(leaf) if leaf.topic_id() != row.topic_id => Ok(Some(format!(
        "{} {} is not under topic {}",
        row.kind, row.content_id, row.topic_id
      ))),
      Some(_) => Ok(None),
    }
  }
}

impl<S: Store> Engine<S> {
  /// Decode `payload` and check every row against the hierarchy.
  async fn validated_rows(&self, payload: &str) -> Result<Vec<ImportRow>> {
    let decoded = syllabus_csv::parse(payload)?;
    if decoded.is_empty() {
      return Err(Error::InvalidArgument("payload contains no rows".into()));
    }

    let mut hierarchy = Hierarchy::new(self.store());
    let mut seen: HashSet<LeafRef> = HashSet::new();
    let mut book: Option<String> = None;
    let mut rows = Vec::with_capacity(decoded.len());
    let mut errors = Vec::new();

    for row in decoded {
      let row = match row {
        Ok(row) => row,
        Err(e) => {
          errors.push(row_error(e));
          continue;
        }
      };

      let book_id = book.get_or_insert_with(|| row.book_id.clone());
      if *book_id != row.book_id {
        errors.push(RowError::new(
          row.row_number,
          format!("book {} differs from book {} of the first row", row.book_id, book_id),
        ));
        continue;
      }
      if !seen.insert(row.leaf()) {
        errors.push(RowError::new(
          row.row_number,
          format!("{} {} is listed more than once", row.kind, row.content_id),
        ));
        continue;
      }
      if let Some(problem) = hierarchy.check(&row).await? {
        errors.push(RowError::new(row.row_number, problem));
        continue;
      }
      rows.push(row);
    }

    if errors.is_empty() { Ok(rows) } else { Err(Error::InvalidRows(errors)) }
  }
}

// ─── Import ──────────────────────────────────────────────────────────────────

impl<S: Store> Engine<S> {
  pub async fn import_study_plan(&self, req: ImportRequest) -> Result<ImportResponse> {
    if req.course_id.trim().is_empty() {
      return Err(Error::InvalidArgument("course_id must not be empty".into()));
    }
    match req.mode {
      ImportMode::Create => self.import_create(req).await,
      ImportMode::Update => self.import_update(req).await,
    }
  }

  async fn import_create(&self, req: ImportRequest) -> Result<ImportResponse> {
    let mut students: Vec<String> = Vec::new();
    for student in &req.student_ids {
      if student.trim().is_empty() {
        return Err(Error::InvalidArgument("student ids must not be empty".into()));
      }
      if !students.contains(student) {
        students.push(student.clone());
      }
    }

    let rows = self.validated_rows(&req.payload).await?;
    let Some(first) = rows.first() else {
      return Err(Error::InvalidArgument("payload contains no rows".into()));
    };
    let name = match req.name.as_deref().map(str::trim) {
      Some(name) if !name.is_empty() => name.to_owned(),
      _ if !first.book_name.is_empty() => first.book_name.clone(),
      _ => first.book_id.clone(),
    };
    let plan = NewStudyPlan {
      name,
      plan_type: req.plan_type,
      course_id: req.course_id.clone(),
      book_id:   first.book_id.clone(),
    };
    let items = rows
      .iter()
      .enumerate()
      .map(|(i, row)| NewStudyPlanItem {
        content_structure: row.placement().structure(&req.course_id, row.leaf()),
        display_order:     i32::try_from(i + 1).unwrap_or(i32::MAX),
        window:            row.window.clone(),
      })
      .collect();

    let master = self
      .store
      .create_master(plan, items)
      .await
      .map_err(Error::store)?;
    info!(
      plan = %master.study_plan_id,
      course = %master.course_id,
      book = %master.book_id,
      items = rows.len(),
      "imported study plan"
    );

    let task_id = if students.is_empty() {
      None
    } else {
      let task = self
        .store
        .create_task(master.study_plan_id)
        .await
        .map_err(Error::store)?;
      self.spawn_assignment(task.task_id, master.study_plan_id, students);
      Some(task.task_id)
    };

    Ok(ImportResponse { study_plan_id: master.study_plan_id, task_id })
  }

  async fn import_update(&self, req: ImportRequest) -> Result<ImportResponse> {
    let targets = self.update_targets(&req).await?;
    let rows = self.validated_rows(&req.payload).await?;

    let mut errors = Vec::new();
    for row in &rows {
      if let Some(plan) = targets.iter().find(|(p, _)| p.book_id != row.book_id) {
        errors.push(RowError::new(
          row.row_number,
          format!("book {} is not the book of study plan {}", row.book_id, plan.0.study_plan_id),
        ));
      }
    }

    let known: HashSet<Uuid> = targets
      .iter()
      .flat_map(|(_, items)| items)
      .flat_map(|i| [Some(i.study_plan_item_id), i.copy_study_plan_item_id])
      .flatten()
      .collect();
    for row in &rows {
      if let Some(id) = row.item_id
        && !known.contains(&id)
      {
        errors.push(RowError::new(
          row.row_number,
          format!("item {id} does not belong to the listed study plans"),
        ));
      }
    }
    if !errors.is_empty() {
      return Err(Error::InvalidRows(errors));
    }

    let (mut changes, copy_changes) = match req.plan_type {
      StudyPlanType::Course => self.course_changes(&targets, &rows).await?,
      StudyPlanType::Individual => (self.individual_changes(&targets, &rows).await?, Vec::new()),
    };
    changes.extend(copy_changes);
    changes.retain(|c| !c.is_empty());

    let touched = changes.len();
    self.store.apply_changes(changes).await.map_err(Error::store)?;

    let study_plan_id = targets
      .first()
      .map(|(p, _)| p.master_id())
      .ok_or_else(|| Error::InvalidArgument("study_plan_ids must not be empty".into()))?;
    info!(
      plan = %study_plan_id,
      course = %req.course_id,
      plans_changed = touched,
      "updated study plans from import"
    );
    Ok(ImportResponse { study_plan_id, task_id: None })
  }

  /// Resolve and check the plans named by an update, with all their items.
  async fn update_targets(
    &self,
    req: &ImportRequest,
  ) -> Result<Vec<(StudyPlan, Vec<StudyPlanItem>)>> {
    if req.study_plan_ids.is_empty() {
      return Err(Error::InvalidArgument(
        "study_plan_ids must not be empty for an update".into(),
      ));
    }

    let bound: HashMap<Uuid, StudyPlan> = self
      .store
      .bound_plans(req.course_id.clone())
      .await
      .map_err(Error::store)?
      .into_iter()
      .map(|p| (p.study_plan_id, p))
      .collect();

    let mut targets: Vec<(StudyPlan, Vec<StudyPlanItem>)> = Vec::new();
    for id in &req.study_plan_ids {
      if targets.iter().any(|(p, _)| p.study_plan_id == *id) {
        continue;
      }
      let Some(plan) = bound.get(id) else {
        return Err(Error::InvalidArgument(format!(
          "study plan {id} is not bound to course {}",
          req.course_id
        )));
      };
      match req.plan_type {
        StudyPlanType::Course if !plan.is_master() => {
          return Err(Error::InvalidArgument(format!(
            "study plan {id} is not a master study plan"
          )));
        }
        StudyPlanType::Individual if plan.is_master() => {
          return Err(Error::InvalidArgument(format!(
            "study plan {id} is not an individual study plan"
          )));
        }
        _ => {}
      }
      let items = self.store.list_items(*id, true).await.map_err(Error::store)?;
      targets.push((plan.clone(), items));
    }
    Ok(targets)
  }

  /// Diff each master, then make every copy mirror its master's new layout.
  async fn course_changes(
    &self,
    targets: &[(StudyPlan, Vec<StudyPlanItem>)],
    rows:    &[ImportRow],
  ) -> Result<(Vec<PlanChange>, Vec<PlanChange>)> {
    let mut master_changes = Vec::new();
    let mut copy_changes = Vec::new();

    for (plan, items) in targets {
      let slots: Vec<Slot> = rows
        .iter()
        .map(|row| Slot {
          row:       row.row_number,
          id:        row.item_id,
          link:      None,
          structure: row.placement().structure(&plan.course_id, row.leaf()),
          window:    row.window.clone(),
        })
        .collect();
      let master = diff(plan.study_plan_id, items, &slots).map_err(Error::InvalidRows)?;

      let mirrored = mirror(&master.layout);
      let copies = self
        .store
        .list_copies(plan.study_plan_id)
        .await
        .map_err(Error::store)?;
      for copy in copies {
        let copy_items = self
          .store
          .list_items(copy.study_plan_id, true)
          .await
          .map_err(Error::store)?;
        let change = diff(copy.study_plan_id, &copy_items, &mirrored)
          .map_err(Error::InvalidRows)?
          .change;
        copy_changes.push(change);
      }
      master_changes.push(master.change);
    }
    Ok((master_changes, copy_changes))
  }

  /// Diff each copy on its own; new rows must name content its master holds.
  async fn individual_changes(
    &self,
    targets: &[(StudyPlan, Vec<StudyPlanItem>)],
    rows:    &[ImportRow],
  ) -> Result<Vec<PlanChange>> {
    let mut changes = Vec::new();
    let mut errors = Vec::new();

    for (plan, items) in targets {
      let master_items: HashMap<String, Uuid> = self
        .store
        .list_items(plan.master_id(), false)
        .await
        .map_err(Error::store)?
        .into_iter()
        .map(|i| (i.content_structure_flatten, i.study_plan_item_id))
        .collect();

      let mut slots = Vec::with_capacity(rows.len());
      for row in rows {
        let structure = row.placement().structure(&plan.course_id, row.leaf());
        let link = master_items.get(&structure.flatten()).copied();
        if link.is_none() && row.item_id.is_none() {
          errors.push(RowError::new(
            row.row_number,
            format!(
              "{} {} is not part of master study plan {}",
              row.kind,
              row.content_id,
              plan.master_id()
            ),
          ));
          continue;
        }
        slots.push(Slot {
          row: row.row_number,
          id: row.item_id,
          link,
          structure,
          window: row.window.clone(),
        });
      }

      match diff(plan.study_plan_id, items, &slots) {
        Ok(d) => changes.push(d.change),
        Err(row_errors) => errors.extend(row_errors),
      }
    }

    if errors.is_empty() { Ok(changes) } else { Err(Error::InvalidRows(errors)) }
  }
}

// ─── Tasks ───────────────────────────────────────────────────────────────────

impl<S: Store> Engine<S> {
  pub async fn get_import_task_status(&self, task_id: Uuid) -> Result<ImportTask> {
    self
      .store
      .get_task(task_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(format!("import task not found: {task_id}")))
  }

  fn spawn_assignment(&self, task_id: Uuid, master_id: Uuid, students: Vec<String>) {
    let engine = self.clone();
    tokio::spawn(async move {
      let (status, detail) = match engine.run_assignment(task_id, master_id, students).await {
        Ok(assigned) => {
          info!(task = %task_id, plan = %master_id, students = assigned, "import task completed");
          (TaskStatus::Completed, None)
        }
        Err(e) => {
          warn!(task = %task_id, plan = %master_id, error = %e, "import task failed");
          (TaskStatus::Failed, Some(e.to_string()))
        }
      };
      if let Err(e) = engine.store.update_task(task_id, status, detail).await {
        error!(task = %task_id, "failed to record import task status: {e}");
      }
    });
  }

  async fn run_assignment(
    &self,
    task_id:   Uuid,
    master_id: Uuid,
    students:  Vec<String>,
  ) -> Result<usize> {
    self
      .store
      .update_task(task_id, TaskStatus::InProgress, None)
      .await
      .map_err(Error::store)?;
    let count = students.len();
    for student in students {
      self
        .assign_study_plan(master_id, PlanTarget::Student(student))
        .await?;
    }
    Ok(count)
  }
}

/// Poll `task_id` until it reaches a terminal status.
///
/// Checks up to `attempts` times, sleeping `interval` between checks, and
/// fails with a deadline error when the task is still running.
pub async fn wait_for_task<S: Store>(
  engine:   &Engine<S>,
  task_id:  Uuid,
  attempts: usize,
  interval: Duration,
) -> Result<ImportTask> {
  for attempt in 0..attempts {
    if attempt > 0 {
      tokio::time::sleep(interval).await;
    }
    let task = engine.get_import_task_status(task_id).await?;
    if task.status.is_terminal() {
      return Ok(task);
    }
  }
  Err(Error::DeadlineExceeded(task_id))
}
