//! Study plans, their items, and the change sets applied to them.
//!
//! A **master** plan has no `master_study_plan_id` and is bound to a book and a
//! course. A **copy** points at its master and is bound to one target (a
//! course, a class or a student). Rows are soft-deleted, never removed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result, structure::ContentStructure};

// ─── Plan ────────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StudyPlanType {
  Course,
  Individual,
}

/// The entity a copy study plan is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanTarget {
  #[serde(rename = "course_id")]
  Course(String),
  #[serde(rename = "class_id")]
  Class(String),
  #[serde(rename = "student_id")]
  Student(String),
}

impl PlanTarget {
  /// Column discriminant; also names the binding table (`<kind>_study_plans`).
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Course(_) => "course",
      Self::Class(_) => "class",
      Self::Student(_) => "student",
    }
  }

  pub fn id(&self) -> &str {
    match self {
      Self::Course(id) | Self::Class(id) | Self::Student(id) => id,
    }
  }

  pub fn from_parts(kind: &str, id: String) -> Result<Self> {
    match kind {
      "course" => Ok(Self::Course(id)),
      "class" => Ok(Self::Class(id)),
      "student" => Ok(Self::Student(id)),
      other => Err(Error::UnknownDiscriminant {
        what:  "plan target",
        value: other.to_owned(),
      }),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyPlan {
  pub study_plan_id:        Uuid,
  pub master_study_plan_id: Option<Uuid>,
  pub name:                 String,
  pub plan_type:            StudyPlanType,
  pub course_id:            String,
  pub book_id:              String,
  /// `None` on masters.
  pub target:               Option<PlanTarget>,
  pub created_at:           DateTime<Utc>,
  pub updated_at:           DateTime<Utc>,
  pub deleted_at:           Option<DateTime<Utc>>,
}

impl StudyPlan {
  pub fn is_master(&self) -> bool { self.master_study_plan_id.is_none() }

  pub fn is_live(&self) -> bool { self.deleted_at.is_none() }

  /// The id of the master this plan mirrors (itself when it is a master).
  pub fn master_id(&self) -> Uuid {
    self.master_study_plan_id.unwrap_or(self.study_plan_id)
  }
}

/// Input for creating a master study plan.
#[derive(Debug, Clone)]
pub struct NewStudyPlan {
  pub name:      String,
  pub plan_type: StudyPlanType,
  pub course_id: String,
  pub book_id:   String,
}

/// Result of assigning a master to a target.
#[derive(Debug, Clone)]
pub struct CopyOutcome {
  pub plan:         StudyPlan,
  /// `false` when a live copy for the same target already existed.
  pub created:      bool,
  pub items_cloned: usize,
}

// ─── Schedule window ─────────────────────────────────────────────────────────

/// The availability and due window of one study plan item. Every bound is
/// optional; an empty import cell resets a bound to null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
  pub available_from: Option<DateTime<Utc>>,
  pub available_to:   Option<DateTime<Utc>>,
  pub start_date:     Option<DateTime<Utc>>,
  pub end_date:       Option<DateTime<Utc>>,
}

impl ScheduleWindow {
  /// Reject windows whose bounds contradict each other.
  pub fn validate(&self) -> Result<()> {
    if let (Some(from), Some(to)) = (self.available_from, self.available_to)
      && to < from
    {
      return Err(Error::InvalidWindow(
        "available until must not be before available from".into(),
      ));
    }
    for (label, bound) in [("start time", self.start_date), ("due time", self.end_date)] {
      let Some(at) = bound else { continue };
      if self.available_from.is_some_and(|from| at < from)
        || self.available_to.is_some_and(|to| at > to)
      {
        return Err(Error::InvalidWindow(format!(
          "{label} must fall inside the availability window"
        )));
      }
    }
    if let (Some(start), Some(end)) = (self.start_date, self.end_date)
      && end < start
    {
      return Err(Error::InvalidWindow(
        "due time must not be before start time".into(),
      ));
    }
    Ok(())
  }
}

// ─── Items ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyPlanItem {
  pub study_plan_item_id:        Uuid,
  pub study_plan_id:             Uuid,
  pub content_structure:         ContentStructure,
  pub content_structure_flatten: String,
  pub display_order:             i32,
  #[serde(flatten)]
  pub window:                    ScheduleWindow,
  /// The master item this item was cloned from; `None` on master items.
  pub copy_study_plan_item_id:   Option<Uuid>,
  pub completed_at:              Option<DateTime<Utc>>,
  pub created_at:                DateTime<Utc>,
  pub updated_at:                DateTime<Utc>,
  pub deleted_at:                Option<DateTime<Utc>>,
}

impl StudyPlanItem {
  pub fn is_live(&self) -> bool { self.deleted_at.is_none() }
}

/// An item to be created by the store. The id and flatten are derived.
#[derive(Debug, Clone)]
pub struct NewStudyPlanItem {
  pub content_structure: ContentStructure,
  pub display_order:     i32,
  pub window:            ScheduleWindow,
}

/// What one fan-out transaction changed for one master and its copies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
  pub master_items_created: usize,
  pub copy_items_created:   usize,
  pub items_reordered:      usize,
}

// ─── Change sets ─────────────────────────────────────────────────────────────

/// A new item with a caller-chosen id, so copies created in the same change
/// set can link to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInsert {
  pub study_plan_item_id:      Uuid,
  pub content_structure:       ContentStructure,
  pub display_order:           i32,
  pub window:                  ScheduleWindow,
  pub copy_study_plan_item_id: Option<Uuid>,
}

/// An in-place change to an existing item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemPatch {
  pub study_plan_item_id:      Uuid,
  pub display_order:           i32,
  pub window:                  ScheduleWindow,
  /// Re-link to this master item when set.
  pub copy_study_plan_item_id: Option<Uuid>,
  /// Clear `deleted_at`.
  pub restore:                 bool,
}

/// Every change an import makes to one plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanChange {
  pub study_plan_id: Uuid,
  pub inserts:       Vec<ItemInsert>,
  pub updates:       Vec<ItemPatch>,
  pub deletions:     Vec<Uuid>,
}

impl PlanChange {
  pub fn is_empty(&self) -> bool {
    self.inserts.is_empty() && self.updates.is_empty() && self.deletions.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;

  use super::*;

  fn at(day: u32) -> Option<DateTime<Utc>> {
    Some(Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap())
  }

  #[test]
  fn empty_window_is_valid() {
    assert!(ScheduleWindow::default().validate().is_ok());
  }

  #[test]
  fn window_inside_availability_is_valid() {
    let w = ScheduleWindow {
      available_from: at(1),
      available_to:   at(30),
      start_date:     at(2),
      end_date:       at(10),
    };
    assert!(w.validate().is_ok());
  }

  #[test]
  fn availability_must_be_ordered() {
    let w = ScheduleWindow {
      available_from: at(10),
      available_to:   at(1),
      ..Default::default()
    };
    assert!(matches!(w.validate(), Err(Error::InvalidWindow(_))));
  }

  #[test]
  fn start_outside_availability_is_rejected() {
    let w = ScheduleWindow {
      available_from: at(5),
      start_date:     at(1),
      ..Default::default()
    };
    assert!(w.validate().is_err());
  }

  #[test]
  fn due_before_start_is_rejected() {
    let w = ScheduleWindow {
      start_date: at(10),
      end_date:   at(9),
      ..Default::default()
    };
    assert!(w.validate().is_err());
  }

  #[test]
  fn plan_target_serialises_as_single_key() {
    let json = serde_json::to_value(PlanTarget::Student("s1".into())).unwrap();
    assert_eq!(json, serde_json::json!({ "student_id": "s1" }));
    let back: PlanTarget =
      serde_json::from_value(serde_json::json!({ "class_id": "c9" })).unwrap();
    assert_eq!(back, PlanTarget::Class("c9".into()));
    assert_eq!(back.kind(), "class");
  }
}
