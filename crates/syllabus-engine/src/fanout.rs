//! Content-change fan-out.
//!
//! A leaf under topic T lands in every master plan built on a book that
//! reaches T, and from each master into all of its live copies. Each master
//! is synchronised in its own transaction: a failing master is reported and
//! retried later without holding back the others.

use std::collections::HashMap;

use serde::Serialize;
use syllabus_core::{
  plan::{NewStudyPlanItem, ScheduleWindow, StudyPlan, SyncOutcome},
  store::StoreError as _,
  structure::{LeafRef, Placement},
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{Engine, Error, Result, Store};

/// What one fan-out pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FanOutReport {
  /// Outbox events consumed; zero for a direct [`Engine::fan_out`] call.
  pub events:        usize,
  pub master_items:  usize,
  pub copy_items:    usize,
  pub reordered:     usize,
  /// Masters whose transaction failed. Their event stays pending.
  pub failed_plans:  Vec<Uuid>,
  /// Events whose delivery or settlement errored.
  pub failed_events: Vec<Uuid>,
}

impl FanOutReport {
  pub fn is_clean(&self) -> bool { self.failed_plans.is_empty() && self.failed_events.is_empty() }

  pub(crate) fn absorb(&mut self, other: FanOutReport) {
    self.events += other.events;
    self.master_items += other.master_items;
    self.copy_items += other.copy_items;
    self.reordered += other.reordered;
    self.failed_plans.extend(other.failed_plans);
    self.failed_events.extend(other.failed_events);
  }

  fn record(&mut self, outcome: SyncOutcome) {
    self.master_items += outcome.master_items_created;
    self.copy_items += outcome.copy_items_created;
    self.reordered += outcome.items_reordered;
  }
}

impl<S: Store> Engine<S> {
  /// Materialise the named leaves into every master plan reaching their
  /// topics and every copy of those masters.
  ///
  /// Leaves are read back from the store, so a late redelivery writes the
  /// current display order; deleted leaves are skipped. Safe to repeat:
  /// items are keyed on their content structure, so a second pass only
  /// updates display orders that changed.
  pub async fn fan_out(&self, refs: &[LeafRef]) -> Result<FanOutReport> {
    let mut leaves = Vec::with_capacity(refs.len());
    for leaf_ref in refs {
      match self.store.get_leaf(leaf_ref.clone()).await.map_err(Error::store)? {
        Some(leaf) => leaves.push(leaf),
        None => debug!(leaf = leaf_ref.id(), "leaf no longer live, skipping"),
      }
    }

    let mut placements: HashMap<String, Vec<Placement>> = HashMap::new();
    let mut masters: HashMap<String, Vec<StudyPlan>> = HashMap::new();
    let mut batches: Vec<(Uuid, Vec<NewStudyPlanItem>)> = Vec::new();

    for leaf in &leaves {
      let topic_id = leaf.topic_id().to_owned();
      if !placements.contains_key(&topic_id) {
        let found = self
          .store
          .placements_for_topic(topic_id.clone())
          .await
          .map_err(Error::store)?;
        placements.insert(topic_id.clone(), found);
      }

      for placement in placements.get(&topic_id).into_iter().flatten() {
        if !masters.contains_key(&placement.book_id) {
          let found = self
            .store
            .masters_for_book(placement.book_id.clone())
            .await
            .map_err(Error::store)?;
          masters.insert(placement.book_id.clone(), found);
        }

        for master in masters.get(&placement.book_id).into_iter().flatten() {
          let item = NewStudyPlanItem {
            content_structure: placement.structure(&master.course_id, leaf.leaf_ref()),
            display_order:     leaf.display_order(),
            window:            ScheduleWindow::default(),
          };
          match batches.iter_mut().find(|(id, _)| *id == master.study_plan_id) {
            Some((_, items)) => items.push(item),
            None => batches.push((master.study_plan_id, vec![item])),
          }
        }
      }
    }

    let mut report = FanOutReport::default();
    for (master_id, items) in batches {
      debug!(master = %master_id, items = items.len(), "syncing master");
      match self.store.sync_fan_out(master_id, items).await {
        Ok(outcome) => report.record(outcome),
        Err(e) if e.domain().is_some_and(|d| d.is_not_found()) => {
          debug!(master = %master_id, "master deleted during fan-out, skipping");
        }
        Err(e) => {
          warn!(master = %master_id, error = %e, "fan-out failed for study plan");
          report.failed_plans.push(master_id);
        }
      }
    }
    Ok(report)
  }
}
