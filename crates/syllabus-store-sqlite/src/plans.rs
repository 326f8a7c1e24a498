//! [`StudyPlanStore`] implementation: plans, items, duplication, fan-out
//! synchronisation, import change sets and import tasks.

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use syllabus_core::{
  Error as DomainError,
  plan::{
    CopyOutcome, ItemInsert, NewStudyPlan, NewStudyPlanItem, PlanChange, PlanTarget,
    StudyPlan, StudyPlanItem, SyncOutcome,
  },
  store::StudyPlanStore,
  task::{ImportTask, TaskStatus},
};
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    ITEM_COLUMNS, PLAN_COLUMNS, RawItem, RawPlan, RawTask, encode_dt, encode_opt_dt,
    encode_structure, encode_uuid, encode_window,
  },
  store::{Domain, SqliteStore, live_row_exists},
};

// ─── Encoded rows ────────────────────────────────────────────────────────────

/// An item with every column already encoded, ready to move into a
/// connection closure.
struct ItemRow {
  id:        String,
  structure: String,
  flatten:   String,
  topic_id:  String,
  order:     i32,
  window:    [Option<String>; 4],
  copy_of:   Option<String>,
}

impl ItemRow {
  fn from_new(item: &NewStudyPlanItem) -> Result<Self> {
    Ok(Self {
      id:        encode_uuid(Uuid::new_v4()),
      structure: encode_structure(&item.content_structure)?,
      flatten:   item.content_structure.flatten(),
      topic_id:  item.content_structure.topic_id.clone(),
      order:     item.display_order,
      window:    encode_window(&item.window),
      copy_of:   None,
    })
  }

  fn from_insert(item: &ItemInsert) -> Result<Self> {
    Ok(Self {
      id:        encode_uuid(item.study_plan_item_id),
      structure: encode_structure(&item.content_structure)?,
      flatten:   item.content_structure.flatten(),
      topic_id:  item.content_structure.topic_id.clone(),
      order:     item.display_order,
      window:    encode_window(&item.window),
      copy_of:   item.copy_study_plan_item_id.map(encode_uuid),
    })
  }

  fn insert(&self, conn: &rusqlite::Connection, plan_id: &str, now: &str) -> rusqlite::Result<()> {
    let [available_from, available_to, start_date, end_date] = &self.window;
    conn.execute(
      "INSERT INTO study_plan_items (
         study_plan_item_id, study_plan_id, content_structure, content_structure_flatten,
         topic_id, display_order, available_from, available_to, start_date, end_date,
         copy_study_plan_item_id, created_at, updated_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
      rusqlite::params![
        self.id,
        plan_id,
        self.structure,
        self.flatten,
        self.topic_id,
        self.order,
        available_from,
        available_to,
        start_date,
        end_date,
        self.copy_of,
        now,
      ],
    )?;
    Ok(())
  }
}

struct PatchRow {
  item_id: Uuid,
  id:      String,
  order:   i32,
  window:  [Option<String>; 4],
  copy_of: Option<String>,
  restore: bool,
}

struct ChangeRows {
  plan_uuid: Uuid,
  plan_id:   String,
  inserts:   Vec<ItemRow>,
  updates:   Vec<PatchRow>,
  deletions: Vec<String>,
}

// ─── Shared statements ───────────────────────────────────────────────────────

fn select_plan(
  conn: &rusqlite::Connection,
  plan_id: &str,
  live_only: bool,
) -> rusqlite::Result<Option<RawPlan>> {
  let filter = if live_only { "AND deleted_at IS NULL" } else { "" };
  conn
    .query_row(
      &format!("SELECT {PLAN_COLUMNS} FROM study_plans WHERE study_plan_id = ?1 {filter}"),
      rusqlite::params![plan_id],
      RawPlan::from_row,
    )
    .optional()
}

fn select_plans(
  conn: &rusqlite::Connection,
  where_clause: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<RawPlan>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {PLAN_COLUMNS} FROM study_plans WHERE {where_clause}
     ORDER BY created_at, study_plan_id"
  ))?;
  stmt
    .query_map(params, RawPlan::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()
}

/// A live master plan, or the reason there is none.
fn select_live_master(
  conn: &rusqlite::Connection,
  master_id: Uuid,
) -> rusqlite::Result<Domain<RawPlan>> {
  let Some(master) = select_plan(conn, &encode_uuid(master_id), true)? else {
    return Ok(Err(DomainError::StudyPlanNotFound(master_id)));
  };
  if master.master_study_plan_id.is_some() {
    return Ok(Err(DomainError::NotAMaster(master_id)));
  }
  Ok(Ok(master))
}

/// `(id, display_order, is_deleted)` of the item keyed by `flatten`.
fn item_by_flatten(
  conn: &rusqlite::Connection,
  plan_id: &str,
  flatten: &str,
) -> rusqlite::Result<Option<(String, i32, bool)>> {
  conn
    .query_row(
      "SELECT study_plan_item_id, display_order, deleted_at IS NOT NULL
       FROM study_plan_items
       WHERE study_plan_id = ?1 AND content_structure_flatten = ?2",
      rusqlite::params![plan_id, flatten],
      |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )
    .optional()
}

/// Clone one master item into `copy_id`, linking it back to its source.
fn clone_item(
  conn: &rusqlite::Connection,
  master_item_id: &str,
  copy_id: &str,
  now: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO study_plan_items (
       study_plan_item_id, study_plan_id, content_structure, content_structure_flatten,
       topic_id, display_order, available_from, available_to, start_date, end_date,
       copy_study_plan_item_id, created_at, updated_at
     )
     SELECT ?1, ?2, content_structure, content_structure_flatten,
            topic_id, display_order, available_from, available_to, start_date, end_date,
            study_plan_item_id, ?3, ?3
     FROM study_plan_items WHERE study_plan_item_id = ?4",
    rusqlite::params![encode_uuid(Uuid::new_v4()), copy_id, now, master_item_id],
  )?;
  Ok(())
}

fn select_item(conn: &rusqlite::Connection, item_id: &str) -> rusqlite::Result<Option<RawItem>> {
  conn
    .query_row(
      &format!("SELECT {ITEM_COLUMNS} FROM study_plan_items i WHERE i.study_plan_item_id = ?1"),
      rusqlite::params![item_id],
      RawItem::from_row,
    )
    .optional()
}

// ─── StudyPlanStore impl ─────────────────────────────────────────────────────

impl StudyPlanStore for SqliteStore {
  // ── Plans ─────────────────────────────────────────────────────────────────

  async fn create_master(
    &self,
    plan:  NewStudyPlan,
    items: Vec<NewStudyPlanItem>,
  ) -> Result<StudyPlan> {
    let now = Utc::now();
    let created = StudyPlan {
      study_plan_id:        Uuid::new_v4(),
      master_study_plan_id: None,
      name:                 plan.name,
      plan_type:            plan.plan_type,
      course_id:            plan.course_id,
      book_id:              plan.book_id,
      target:               None,
      created_at:           now,
      updated_at:           now,
      deleted_at:           None,
    };

    let rows = items.iter().map(ItemRow::from_new).collect::<Result<Vec<_>>>()?;
    let plan_id   = encode_uuid(created.study_plan_id);
    let name      = created.name.clone();
    let plan_type = created.plan_type.as_ref().to_owned();
    let course_id = created.course_id.clone();
    let book_id   = created.book_id.clone();
    let now_str   = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO study_plans (
             study_plan_id, name, study_plan_type, course_id, book_id, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
          rusqlite::params![plan_id, name, plan_type, course_id, book_id, now_str],
        )?;
        tx.execute(
          "INSERT INTO course_study_plans (course_id, study_plan_id, created_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![course_id, plan_id, now_str],
        )?;
        for row in &rows {
          row.insert(&tx, &plan_id, &now_str)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::debug!(study_plan_id = %created.study_plan_id, "master study plan created");
    Ok(created)
  }

  async fn get_study_plan(&self, id: Uuid) -> Result<Option<StudyPlan>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(select_plan(conn, &id_str, false)?))
      .await?;
    raw.map(RawPlan::into_plan).transpose()
  }

  async fn list_copies(&self, master_id: Uuid) -> Result<Vec<StudyPlan>> {
    let id_str = encode_uuid(master_id);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(select_plans(
          conn,
          "master_study_plan_id = ?1 AND deleted_at IS NULL",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    raws.into_iter().map(RawPlan::into_plan).collect()
  }

  async fn find_copy(&self, master_id: Uuid, target: PlanTarget) -> Result<Option<StudyPlan>> {
    let id_str = encode_uuid(master_id);
    let kind   = target.kind();
    let tid    = target.id().to_owned();
    let raws = self
      .conn
      .call(move |conn| {
        Ok(select_plans(
          conn,
          "master_study_plan_id = ?1 AND target_kind = ?2 AND target_id = ?3
           AND deleted_at IS NULL",
          rusqlite::params![id_str, kind, tid],
        )?)
      })
      .await?;
    raws.into_iter().next().map(RawPlan::into_plan).transpose()
  }

  async fn bound_plans(&self, course_id: String) -> Result<Vec<StudyPlan>> {
    let raws = self
      .conn
      .call(move |conn| {
        Ok(select_plans(
          conn,
          "deleted_at IS NULL AND (
             course_id = ?1
             OR study_plan_id IN (
               SELECT study_plan_id FROM course_study_plans
               WHERE course_id = ?1 AND deleted_at IS NULL))",
          rusqlite::params![course_id],
        )?)
      })
      .await?;
    raws.into_iter().map(RawPlan::into_plan).collect()
  }

  async fn masters_for_book(&self, book_id: String) -> Result<Vec<StudyPlan>> {
    let raws = self
      .conn
      .call(move |conn| {
        Ok(select_plans(
          conn,
          "book_id = ?1 AND master_study_plan_id IS NULL AND deleted_at IS NULL",
          rusqlite::params![book_id],
        )?)
      })
      .await?;
    raws.into_iter().map(RawPlan::into_plan).collect()
  }

  async fn soft_delete_study_plan(&self, id: Uuid) -> Result<usize> {
    let id_str = encode_uuid(id);
    let now    = encode_dt(Utc::now());

    let outcome: Domain<usize> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(plan) = select_plan(&tx, &id_str, true)? else {
          return Ok(Err(DomainError::StudyPlanNotFound(id)));
        };

        let mut doomed = vec![plan.study_plan_id];
        if plan.master_study_plan_id.is_none() {
          doomed.extend(
            select_plans(
              &tx,
              "master_study_plan_id = ?1 AND deleted_at IS NULL",
              rusqlite::params![id_str],
            )?
            .into_iter()
            .map(|p| p.study_plan_id),
          );
        }

        for plan_id in &doomed {
          tx.execute(
            "UPDATE study_plans SET deleted_at = ?2, updated_at = ?2
             WHERE study_plan_id = ?1 AND deleted_at IS NULL",
            rusqlite::params![plan_id, now],
          )?;
          tx.execute(
            "UPDATE study_plan_items SET deleted_at = ?2, updated_at = ?2
             WHERE study_plan_id = ?1 AND deleted_at IS NULL",
            rusqlite::params![plan_id, now],
          )?;
          for table in ["course_study_plans", "class_study_plans", "student_study_plans"] {
            tx.execute(
              &format!(
                "UPDATE {table} SET deleted_at = ?2
                 WHERE study_plan_id = ?1 AND deleted_at IS NULL"
              ),
              rusqlite::params![plan_id, now],
            )?;
          }
        }
        tx.commit()?;
        Ok(Ok(doomed.len()))
      })
      .await?;
    Ok(outcome?)
  }

  // ── Duplication and propagation ───────────────────────────────────────────

  async fn create_copy(&self, master_id: Uuid, target: PlanTarget) -> Result<CopyOutcome> {
    let master_str = encode_uuid(master_id);
    let copy_str   = encode_uuid(Uuid::new_v4());
    let kind       = target.kind();
    let target_id  = target.id().to_owned();
    let now        = encode_dt(Utc::now());

    let outcome: Domain<(RawPlan, bool, usize)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let master = match select_live_master(&tx, master_id)? {
          Ok(master) => master,
          Err(e) => return Ok(Err(e)),
        };

        let existing = select_plans(
          &tx,
          "master_study_plan_id = ?1 AND target_kind = ?2 AND target_id = ?3
           AND deleted_at IS NULL",
          rusqlite::params![master_str, kind, target_id],
        )?;
        if let Some(copy) = existing.into_iter().next() {
          return Ok(Ok((copy, false, 0)));
        }

        tx.execute(
          "INSERT INTO study_plans (
             study_plan_id, master_study_plan_id, name, study_plan_type, course_id, book_id,
             target_kind, target_id, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
          rusqlite::params![
            copy_str,
            master_str,
            master.name,
            master.study_plan_type,
            master.course_id,
            master.book_id,
            kind,
            target_id,
            now,
          ],
        )?;
        tx.execute(
          &format!(
            "INSERT INTO {kind}_study_plans ({kind}_id, study_plan_id, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT ({kind}_id, study_plan_id) DO UPDATE SET deleted_at = NULL"
          ),
          rusqlite::params![target_id, copy_str, now],
        )?;

        let master_items: Vec<String> = {
          let mut stmt = tx.prepare(
            "SELECT study_plan_item_id FROM study_plan_items
             WHERE study_plan_id = ?1 AND deleted_at IS NULL
             ORDER BY display_order, study_plan_item_id",
          )?;
          stmt
            .query_map(rusqlite::params![master_str], |r| r.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        for item_id in &master_items {
          clone_item(&tx, item_id, &copy_str, &now)?;
        }

        let copy = select_plan(&tx, &copy_str, true)?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(Ok((copy, true, master_items.len())))
      })
      .await?;

    let (raw, created, items_cloned) = outcome?;
    Ok(CopyOutcome { plan: raw.into_plan()?, created, items_cloned })
  }

  async fn sync_fan_out(
    &self,
    master_id: Uuid,
    items:     Vec<NewStudyPlanItem>,
  ) -> Result<SyncOutcome> {
    let rows       = items.iter().map(ItemRow::from_new).collect::<Result<Vec<_>>>()?;
    let master_str = encode_uuid(master_id);
    let now        = encode_dt(Utc::now());

    let outcome: Domain<SyncOutcome> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if let Err(e) = select_live_master(&tx, master_id)? {
          return Ok(Err(e));
        }
        let copies: Vec<String> = select_plans(
          &tx,
          "master_study_plan_id = ?1 AND deleted_at IS NULL",
          rusqlite::params![master_str],
        )?
        .into_iter()
        .map(|p| p.study_plan_id)
        .collect();

        let mut report = SyncOutcome::default();
        for row in &rows {
          let master_item_id = match item_by_flatten(&tx, &master_str, &row.flatten)? {
            None => {
              row.insert(&tx, &master_str, &now)?;
              report.master_items_created += 1;
              row.id.clone()
            }
            Some((_, _, true)) => continue,
            Some((id, order, false)) => {
              if order != row.order {
                reorder(&tx, &id, row.order, &now)?;
                report.items_reordered += 1;
              }
              id
            }
          };

          for copy_id in &copies {
            match item_by_flatten(&tx, copy_id, &row.flatten)? {
              None => {
                clone_item(&tx, &master_item_id, copy_id, &now)?;
                report.copy_items_created += 1;
              }
              Some((_, _, true)) => {}
              Some((id, order, false)) => {
                if order != row.order {
                  reorder(&tx, &id, row.order, &now)?;
                  report.items_reordered += 1;
                }
              }
            }
          }
        }
        tx.commit()?;
        Ok(Ok(report))
      })
      .await?;
    Ok(outcome?)
  }

  async fn apply_changes(&self, changes: Vec<PlanChange>) -> Result<()> {
    let encoded = changes
      .iter()
      .map(|change| {
        Ok(ChangeRows {
          plan_uuid: change.study_plan_id,
          plan_id:   encode_uuid(change.study_plan_id),
          inserts:   change.inserts.iter().map(ItemRow::from_insert).collect::<Result<_>>()?,
          updates:   change
            .updates
            .iter()
            .map(|p| PatchRow {
              item_id: p.study_plan_item_id,
              id:      encode_uuid(p.study_plan_item_id),
              order:   p.display_order,
              window:  encode_window(&p.window),
              copy_of: p.copy_study_plan_item_id.map(encode_uuid),
              restore: p.restore,
            })
            .collect(),
          deletions: change.deletions.iter().copied().map(encode_uuid).collect(),
        })
      })
      .collect::<Result<Vec<_>>>()?;
    let now = encode_dt(Utc::now());

    let outcome: Domain<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for change in &encoded {
          if !live_row_exists(&tx, "study_plans", "study_plan_id", &change.plan_id)? {
            return Ok(Err(DomainError::StudyPlanNotFound(change.plan_uuid)));
          }
          for item_id in &change.deletions {
            tx.execute(
              "UPDATE study_plan_items SET deleted_at = ?3, updated_at = ?3
               WHERE study_plan_item_id = ?1 AND study_plan_id = ?2 AND deleted_at IS NULL",
              rusqlite::params![item_id, change.plan_id, now],
            )?;
          }
          for patch in &change.updates {
            let [available_from, available_to, start_date, end_date] = &patch.window;
            let touched = tx.execute(
              "UPDATE study_plan_items SET
                 display_order = ?3,
                 available_from = ?4, available_to = ?5, start_date = ?6, end_date = ?7,
                 copy_study_plan_item_id = COALESCE(?8, copy_study_plan_item_id),
                 deleted_at = CASE WHEN ?9 THEN NULL ELSE deleted_at END,
                 updated_at = ?10
               WHERE study_plan_item_id = ?1 AND study_plan_id = ?2",
              rusqlite::params![
                patch.id,
                change.plan_id,
                patch.order,
                available_from,
                available_to,
                start_date,
                end_date,
                patch.copy_of,
                patch.restore,
                now,
              ],
            )?;
            if touched == 0 {
              return Ok(Err(DomainError::ItemNotFound(patch.item_id)));
            }
          }
          for row in &change.inserts {
            row.insert(&tx, &change.plan_id, &now)?;
          }
        }
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    Ok(outcome?)
  }

  // ── Items ─────────────────────────────────────────────────────────────────

  async fn list_items(
    &self,
    study_plan_id:   Uuid,
    include_deleted: bool,
  ) -> Result<Vec<StudyPlanItem>> {
    let id_str = encode_uuid(study_plan_id);
    let filter = if include_deleted { "" } else { "AND i.deleted_at IS NULL" };

    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ITEM_COLUMNS} FROM study_plan_items i
           WHERE i.study_plan_id = ?1 {filter}
           ORDER BY i.display_order, i.created_at, i.study_plan_item_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawItem::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawItem::into_item).collect()
  }

  async fn list_items_by_topics(
    &self,
    study_plan_id: Uuid,
    topic_ids:     Vec<String>,
  ) -> Result<Vec<StudyPlanItem>> {
    let id_str     = encode_uuid(study_plan_id);
    let topics_str = serde_json::to_string(&topic_ids)?;

    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ITEM_COLUMNS}
           FROM study_plan_items i
           LEFT JOIN topics t   ON t.topic_id = i.topic_id
           LEFT JOIN chapters c ON c.chapter_id = t.chapter_id
           WHERE i.study_plan_id = ?1
             AND i.deleted_at IS NULL
             AND i.topic_id IN (SELECT value FROM json_each(?2))
           ORDER BY c.display_order, t.display_order, i.display_order, i.study_plan_item_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str, topics_str], RawItem::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawItem::into_item).collect()
  }

  async fn set_item_completed(&self, item_id: Uuid, completed: bool) -> Result<StudyPlanItem> {
    let id_str = encode_uuid(item_id);
    let now    = Utc::now();
    let at     = encode_opt_dt(completed.then_some(now));
    let now    = encode_dt(now);

    let outcome: Domain<RawItem> = self
      .conn
      .call(move |conn| {
        let touched = conn.execute(
          "UPDATE study_plan_items SET
             completed_at = CASE WHEN ?2 IS NULL THEN NULL ELSE COALESCE(completed_at, ?2) END,
             updated_at = ?3
           WHERE study_plan_item_id = ?1 AND deleted_at IS NULL",
          rusqlite::params![id_str, at, now],
        )?;
        if touched == 0 {
          return Ok(Err(DomainError::ItemNotFound(item_id)));
        }
        match select_item(conn, &id_str)? {
          Some(raw) => Ok(Ok(raw)),
          None => Ok(Err(DomainError::ItemNotFound(item_id))),
        }
      })
      .await?;
    outcome?.into_item()
  }

  // ── Import tasks ──────────────────────────────────────────────────────────

  async fn create_task(&self, study_plan_id: Uuid) -> Result<ImportTask> {
    let now = Utc::now();
    let task = ImportTask {
      task_id: Uuid::new_v4(),
      study_plan_id,
      status: TaskStatus::Pending,
      error_detail: None,
      created_at: now,
      updated_at: now,
    };

    let task_str   = encode_uuid(task.task_id);
    let plan_str   = encode_uuid(study_plan_id);
    let status_str = task.status.as_ref().to_owned();
    let now_str    = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO import_tasks (task_id, study_plan_id, status, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?4)",
          rusqlite::params![task_str, plan_str, status_str, now_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(task)
  }

  async fn update_task(
    &self,
    task_id:      Uuid,
    status:       TaskStatus,
    error_detail: Option<String>,
  ) -> Result<()> {
    let task_str   = encode_uuid(task_id);
    let status_str = status.as_ref().to_owned();
    let now        = encode_dt(Utc::now());

    let touched = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE import_tasks SET status = ?2, error_detail = ?3, updated_at = ?4
           WHERE task_id = ?1",
          rusqlite::params![task_str, status_str, error_detail, now],
        )?)
      })
      .await?;
    if touched == 0 {
      return Err(DomainError::TaskNotFound(task_id).into());
    }
    Ok(())
  }

  async fn get_task(&self, task_id: Uuid) -> Result<Option<ImportTask>> {
    let task_str = encode_uuid(task_id);
    let raw: Option<RawTask> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT task_id, study_plan_id, status, error_detail, created_at, updated_at
               FROM import_tasks WHERE task_id = ?1",
              rusqlite::params![task_str],
              |row| {
                Ok(RawTask {
                  task_id:       row.get(0)?,
                  study_plan_id: row.get(1)?,
                  status:        row.get(2)?,
                  error_detail:  row.get(3)?,
                  created_at:    row.get(4)?,
                  updated_at:    row.get(5)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawTask::into_task).transpose()
  }
}

fn reorder(conn: &rusqlite::Connection, item_id: &str, order: i32, now: &str) -> rusqlite::Result<()> {
  conn.execute(
    "UPDATE study_plan_items SET display_order = ?2, updated_at = ?3
     WHERE study_plan_item_id = ?1",
    rusqlite::params![item_id, order, now],
  )?;
  Ok(())
}


