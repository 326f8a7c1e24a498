//! Import diffing.
//!
//! A plan's new layout is a list of [`Slot`]s in row order. Each slot is
//! matched against the plan's current items (deleted ones included):
//!
//! 1. by id, against the item id or the master item it was cloned from,
//! 2. else by link, against the master item it was cloned from,
//! 3. else by content structure flatten.
//!
//! Matched items are renumbered, re-windowed and revived as needed; unmatched
//! slots become inserts; live items no slot claimed are soft-deleted.

use std::collections::HashSet;

use syllabus_core::{
  plan::{ItemInsert, ItemPatch, PlanChange, ScheduleWindow, StudyPlanItem},
  structure::ContentStructure,
};
use uuid::Uuid;

use crate::RowError;

/// The desired state of one item.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
  /// Source row, for error reporting.
  pub row:       usize,
  pub id:        Option<Uuid>,
  /// Master item a copy item must mirror.
  pub link:      Option<Uuid>,
  pub structure: ContentStructure,
  pub window:    ScheduleWindow,
}

/// One item of the resulting layout.
#[derive(Debug, Clone)]
pub(crate) struct Placed {
  pub item_id:   Uuid,
  pub structure: ContentStructure,
  pub window:    ScheduleWindow,
}

#[derive(Debug)]
pub(crate) struct Diff {
  pub change: PlanChange,
  /// Live items in display order once `change` is applied.
  pub layout: Vec<Placed>,
}

/// Diff `items` (every item of `plan_id`, deleted or not) against `slots`.
///
/// Display orders are 1..N in slot order.
pub(crate) fn diff(
  plan_id: Uuid,
  items:   &[StudyPlanItem],
  slots:   &[Slot],
) -> Result<Diff, Vec<RowError>> {
  let mut change = PlanChange {
    study_plan_id: plan_id,
    inserts:       Vec::new(),
    updates:       Vec::new(),
    deletions:     Vec::new(),
  };
  let mut layout = Vec::with_capacity(slots.len());
  let mut claimed: HashSet<Uuid> = HashSet::new();
  let mut errors = Vec::new();

  for (position, slot) in slots.iter().enumerate() {
    let order = i32::try_from(position + 1).unwrap_or(i32::MAX);
    let flatten = slot.structure.flatten();

    let matched = match slot.id {
      Some(id) => items
        .iter()
        .find(|i| i.study_plan_item_id == id || i.copy_study_plan_item_id == Some(id)),
      None => None,
    }
    .or_else(|| {
      slot.link.and_then(|link| {
        items.iter().find(|i| i.copy_study_plan_item_id == Some(link))
      })
    })
    .or_else(|| items.iter().find(|i| i.content_structure_flatten == flatten));

    let Some(item) = matched else {
      let item_id = Uuid::new_v4();
      change.inserts.push(ItemInsert {
        study_plan_item_id:      item_id,
        content_structure:       slot.structure.clone(),
        display_order:           order,
        window:                  slot.window.clone(),
        copy_study_plan_item_id: slot.link,
      });
      layout.push(Placed {
        item_id,
        structure: slot.structure.clone(),
        window: slot.window.clone(),
      });
      continue;
    };

    if item.content_structure_flatten != flatten {
      errors.push(RowError::new(
        slot.row,
        format!("item {} holds different content", item.study_plan_item_id),
      ));
      continue;
    }
    if !claimed.insert(item.study_plan_item_id) {
      errors.push(RowError::new(
        slot.row,
        format!("item {} is listed more than once", item.study_plan_item_id),
      ));
      continue;
    }

    let relink = slot.link.filter(|link| item.copy_study_plan_item_id != Some(*link));
    let restore = !item.is_live();
    if restore || relink.is_some() || item.display_order != order || item.window != slot.window {
      change.updates.push(ItemPatch {
        study_plan_item_id:      item.study_plan_item_id,
        display_order:           order,
        window:                  slot.window.clone(),
        copy_study_plan_item_id: relink,
        restore,
      });
    }
    layout.push(Placed {
      item_id:   item.study_plan_item_id,
      structure: item.content_structure.clone(),
      window:    slot.window.clone(),
    });
  }

  if !errors.is_empty() {
    return Err(errors);
  }

  change.deletions = items
    .iter()
    .filter(|i| i.is_live() && !claimed.contains(&i.study_plan_item_id))
    .map(|i| i.study_plan_item_id)
    .collect();

  Ok(Diff { change, layout })
}

/// Slots that make a copy mirror `master_layout`.
pub(crate) fn mirror(master_layout: &[Placed]) -> Vec<Slot> {
  master_layout
    .iter()
    .enumerate()
    .map(|(i, placed)| Slot {
      row:       i + 1,
      id:        None,
      link:      Some(placed.item_id),
      structure: placed.structure.clone(),
      window:    placed.window.clone(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone as _, Utc};
  use syllabus_core::structure::{LeafRef, Placement};

  use super::*;

  fn structure(leaf: &str) -> ContentStructure {
    Placement {
      book_id:    "b1".into(),
      chapter_id: "c1".into(),
      topic_id:   "t1".into(),
    }
    .structure("course", LeafRef::Assignment(leaf.into()))
  }

  fn item(plan: Uuid, leaf: &str, order: i32, link: Option<Uuid>) -> StudyPlanItem {
    let s = structure(leaf);
    StudyPlanItem {
      study_plan_item_id:        Uuid::new_v4(),
      study_plan_id:             plan,
      content_structure_flatten: s.flatten(),
      content_structure:         s,
      display_order:             order,
      window:                    ScheduleWindow::default(),
      copy_study_plan_item_id:   link,
      completed_at:              None,
      created_at:                Utc::now(),
      updated_at:                Utc::now(),
      deleted_at:                None,
    }
  }

  fn slot(row: usize, id: Option<Uuid>, leaf: &str) -> Slot {
    Slot {
      row,
      id,
      link: None,
      structure: structure(leaf),
      window: ScheduleWindow::default(),
    }
  }

  #[test]
  fn omitted_rows_are_deleted_and_new_rows_inserted() {
    let plan = Uuid::new_v4();
    let a = item(plan, "a", 1, None);
    let b = item(plan, "b", 2, None);
    let items = vec![a.clone(), b.clone()];

    let d = diff(plan, &items, &[slot(1, Some(a.study_plan_item_id), "a"), slot(2, None, "c")])
      .unwrap();

    assert_eq!(d.change.deletions, vec![b.study_plan_item_id]);
    assert!(d.change.updates.is_empty());
    assert_eq!(d.change.inserts.len(), 1);
    assert_eq!(d.change.inserts[0].display_order, 2);
    assert_eq!(d.layout.len(), 2);
    assert_eq!(d.layout[1].item_id, d.change.inserts[0].study_plan_item_id);
  }

  #[test]
  fn moved_rows_are_renumbered() {
    let plan = Uuid::new_v4();
    let a = item(plan, "a", 1, None);
    let b = item(plan, "b", 2, None);
    let items = vec![a.clone(), b.clone()];

    let d = diff(plan, &items, &[
      slot(1, Some(b.study_plan_item_id), "b"),
      slot(2, Some(a.study_plan_item_id), "a"),
    ])
    .unwrap();

    let orders: Vec<(Uuid, i32)> = d
      .change
      .updates
      .iter()
      .map(|p| (p.study_plan_item_id, p.display_order))
      .collect();
    assert_eq!(orders, vec![(b.study_plan_item_id, 1), (a.study_plan_item_id, 2)]);
    assert!(d.change.deletions.is_empty());
  }

  #[test]
  fn window_changes_are_patched() {
    let plan = Uuid::new_v4();
    let mut a = item(plan, "a", 1, None);
    a.window.end_date = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

    let d = diff(plan, &[a.clone()], &[slot(1, Some(a.study_plan_item_id), "a")]).unwrap();
    assert_eq!(d.change.updates.len(), 1);
    assert_eq!(d.change.updates[0].window, ScheduleWindow::default());
  }

  #[test]
  fn deleted_item_with_same_content_is_revived() {
    let plan = Uuid::new_v4();
    let mut a = item(plan, "a", 1, None);
    a.deleted_at = Some(Utc::now());

    let d = diff(plan, &[a.clone()], &[slot(1, None, "a")]).unwrap();
    assert!(d.change.inserts.is_empty());
    assert!(d.change.updates[0].restore);
    assert_eq!(d.layout[0].item_id, a.study_plan_item_id);
  }

  #[test]
  fn id_pointing_at_other_content_is_rejected() {
    let plan = Uuid::new_v4();
    let a = item(plan, "a", 1, None);

    let errs = diff(plan, &[a.clone()], &[slot(3, Some(a.study_plan_item_id), "z")]).unwrap_err();
    assert_eq!(errs[0].row, 3);
  }

  #[test]
  fn copy_rows_match_on_master_item_id() {
    let copy = Uuid::new_v4();
    let master_item = Uuid::new_v4();
    let c = item(copy, "a", 1, Some(master_item));

    let d = diff(copy, &[c.clone()], &[slot(1, Some(master_item), "a")]).unwrap();
    assert!(d.change.updates.is_empty());
    assert_eq!(d.layout[0].item_id, c.study_plan_item_id);
  }

  #[test]
  fn mirror_links_inserts_to_master_items() {
    let master = Uuid::new_v4();
    let copy = Uuid::new_v4();
    let a = item(master, "a", 1, None);
    let b = item(master, "b", 2, None);
    let layout = vec![
      Placed { item_id: b.study_plan_item_id, structure: structure("b"), window: Default::default() },
      Placed { item_id: a.study_plan_item_id, structure: structure("a"), window: Default::default() },
    ];
    let copy_a = item(copy, "a", 1, Some(a.study_plan_item_id));

    let d = diff(copy, &[copy_a.clone()], &mirror(&layout)).unwrap();
    assert_eq!(d.change.inserts.len(), 1);
    assert_eq!(d.change.inserts[0].copy_study_plan_item_id, Some(b.study_plan_item_id));
    assert_eq!(d.change.inserts[0].display_order, 1);
    assert_eq!(d.change.updates[0].study_plan_item_id, copy_a.study_plan_item_id);
    assert_eq!(d.change.updates[0].display_order, 2);
  }
}
