//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings so that they
//! compare correctly as text. Content structures are stored as compact JSON.
//! UUIDs are stored as hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use syllabus_core::{
  content::{Assignment, ContentLeaf, LearningObjective, Topic},
  event::OutboxEvent,
  plan::{PlanTarget, ScheduleWindow, StudyPlan, StudyPlanItem, StudyPlanType},
  structure::ContentStructure,
  task::{ImportTask, TaskStatus},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn encode_opt_dt(dt: Option<DateTime<Utc>>) -> Option<String> { dt.map(encode_dt) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

fn decode_enum<T: FromStr>(what: &'static str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| {
    Error::Core(syllabus_core::Error::UnknownDiscriminant {
      what,
      value: s.to_owned(),
    })
  })
}

pub fn encode_structure(cs: &ContentStructure) -> Result<String> {
  Ok(serde_json::to_string(cs)?)
}

// ─── Schedule window ─────────────────────────────────────────────────────────

/// The four window columns in table order.
pub fn encode_window(w: &ScheduleWindow) -> [Option<String>; 4] {
  [
    encode_opt_dt(w.available_from),
    encode_opt_dt(w.available_to),
    encode_opt_dt(w.start_date),
    encode_opt_dt(w.end_date),
  ]
}

// ─── Study plans ─────────────────────────────────────────────────────────────

pub const PLAN_COLUMNS: &str = "study_plan_id, master_study_plan_id, name, study_plan_type, \
   course_id, book_id, target_kind, target_id, created_at, updated_at, deleted_at";

/// Raw strings read directly from a `study_plans` row.
pub struct RawPlan {
  pub study_plan_id:        String,
  pub master_study_plan_id: Option<String>,
  pub name:                 String,
  pub study_plan_type:      String,
  pub course_id:            String,
  pub book_id:              String,
  pub target_kind:          Option<String>,
  pub target_id:            Option<String>,
  pub created_at:           String,
  pub updated_at:           String,
  pub deleted_at:           Option<String>,
}

impl RawPlan {
  /// Read a row selected with [`PLAN_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      study_plan_id:        row.get(0)?,
      master_study_plan_id: row.get(1)?,
      name:                 row.get(2)?,
      study_plan_type:      row.get(3)?,
      course_id:            row.get(4)?,
      book_id:              row.get(5)?,
      target_kind:          row.get(6)?,
      target_id:            row.get(7)?,
      created_at:           row.get(8)?,
      updated_at:           row.get(9)?,
      deleted_at:           row.get(10)?,
    })
  }

  pub fn into_plan(self) -> Result<StudyPlan> {
    let target = match (self.target_kind, self.target_id) {
      (Some(kind), Some(id)) => Some(PlanTarget::from_parts(&kind, id)?),
      _ => None,
    };
    Ok(StudyPlan {
      study_plan_id: decode_uuid(&self.study_plan_id)?,
      master_study_plan_id: decode_opt_uuid(self.master_study_plan_id.as_deref())?,
      name: self.name,
      plan_type: decode_enum::<StudyPlanType>("study plan type", &self.study_plan_type)?,
      course_id: self.course_id,
      book_id: self.book_id,
      target,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      deleted_at: decode_opt_dt(self.deleted_at.as_deref())?,
    })
  }
}

// ─── Study plan items ────────────────────────────────────────────────────────

pub const ITEM_COLUMNS: &str = "i.study_plan_item_id, i.study_plan_id, i.content_structure, \
   i.content_structure_flatten, i.display_order, i.available_from, i.available_to, \
   i.start_date, i.end_date, i.copy_study_plan_item_id, i.completed_at, i.created_at, \
   i.updated_at, i.deleted_at";

/// Raw strings read directly from a `study_plan_items` row.
pub struct RawItem {
  pub study_plan_item_id:        String,
  pub study_plan_id:             String,
  pub content_structure:         String,
  pub content_structure_flatten: String,
  pub display_order:             i32,
  pub available_from:            Option<String>,
  pub available_to:              Option<String>,
  pub start_date:                Option<String>,
  pub end_date:                  Option<String>,
  pub copy_study_plan_item_id:   Option<String>,
  pub completed_at:              Option<String>,
  pub created_at:                String,
  pub updated_at:                String,
  pub deleted_at:                Option<String>,
}

impl RawItem {
  /// Read a row selected with [`ITEM_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      study_plan_item_id:        row.get(0)?,
      study_plan_id:             row.get(1)?,
      content_structure:         row.get(2)?,
      content_structure_flatten: row.get(3)?,
      display_order:             row.get(4)?,
      available_from:            row.get(5)?,
      available_to:              row.get(6)?,
      start_date:                row.get(7)?,
      end_date:                  row.get(8)?,
      copy_study_plan_item_id:   row.get(9)?,
      completed_at:              row.get(10)?,
      created_at:                row.get(11)?,
      updated_at:                row.get(12)?,
      deleted_at:                row.get(13)?,
    })
  }

  pub fn into_item(self) -> Result<StudyPlanItem> {
    Ok(StudyPlanItem {
      study_plan_item_id:        decode_uuid(&self.study_plan_item_id)?,
      study_plan_id:             decode_uuid(&self.study_plan_id)?,
      content_structure:         serde_json::from_str(&self.content_structure)?,
      content_structure_flatten: self.content_structure_flatten,
      display_order:             self.display_order,
      window:                    ScheduleWindow {
        available_from: decode_opt_dt(self.available_from.as_deref())?,
        available_to:   decode_opt_dt(self.available_to.as_deref())?,
        start_date:     decode_opt_dt(self.start_date.as_deref())?,
        end_date:       decode_opt_dt(self.end_date.as_deref())?,
      },
      copy_study_plan_item_id:   decode_opt_uuid(self.copy_study_plan_item_id.as_deref())?,
      completed_at:              decode_opt_dt(self.completed_at.as_deref())?,
      created_at:                decode_dt(&self.created_at)?,
      updated_at:                decode_dt(&self.updated_at)?,
      deleted_at:                decode_opt_dt(self.deleted_at.as_deref())?,
    })
  }
}

// ─── Content ─────────────────────────────────────────────────────────────────

pub struct RawTopic {
  pub topic_id:      String,
  pub chapter_id:    String,
  pub name:          String,
  pub display_order: i32,
}

impl RawTopic {
  pub fn into_topic(self) -> Topic {
    Topic {
      topic_id:      self.topic_id,
      chapter_id:    self.chapter_id,
      name:          self.name,
      display_order: self.display_order,
    }
  }
}

/// A leaf row from either leaf table; the assignment-only columns are null
/// for learning objectives.
pub struct RawLeaf {
  pub id:            String,
  pub topic_id:      String,
  pub name:          String,
  pub display_order: i32,
  pub instruction:   Option<String>,
  pub max_grade:     Option<i32>,
  pub updated_at:    String,
}

impl RawLeaf {
  pub fn into_learning_objective(self) -> Result<ContentLeaf> {
    Ok(ContentLeaf::LearningObjective(LearningObjective {
      lo_id:         self.id,
      topic_id:      self.topic_id,
      name:          self.name,
      display_order: self.display_order,
      updated_at:    Some(decode_dt(&self.updated_at)?),
    }))
  }

  pub fn into_assignment(self) -> Result<ContentLeaf> {
    Ok(ContentLeaf::Assignment(Assignment {
      assignment_id: self.id,
      topic_id:      self.topic_id,
      name:          self.name,
      display_order: self.display_order,
      instruction:   self.instruction,
      max_grade:     self.max_grade,
      updated_at:    Some(decode_dt(&self.updated_at)?),
    }))
  }
}

// ─── Tasks and events ────────────────────────────────────────────────────────

pub struct RawTask {
  pub task_id:       String,
  pub study_plan_id: String,
  pub status:        String,
  pub error_detail:  Option<String>,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawTask {
  pub fn into_task(self) -> Result<ImportTask> {
    Ok(ImportTask {
      task_id:       decode_uuid(&self.task_id)?,
      study_plan_id: decode_uuid(&self.study_plan_id)?,
      status:        decode_enum::<TaskStatus>("task status", &self.status)?,
      error_detail:  self.error_detail,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawEvent {
  pub event_id:   String,
  pub payload:    String,
  pub attempts:   u32,
  pub created_at: String,
}

impl RawEvent {
  pub fn into_event(self) -> Result<OutboxEvent> {
    Ok(OutboxEvent {
      event_id:   decode_uuid(&self.event_id)?,
      event:      serde_json::from_str(&self.payload)?,
      attempts:   self.attempts,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
