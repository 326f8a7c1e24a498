//! Study plan duplication: binding a copy of a master to a target.

use syllabus_core::plan::{CopyOutcome, PlanTarget};
use tracing::info;
use uuid::Uuid;

use crate::{Engine, Error, Result, Store};

impl<S: Store> Engine<S> {
  /// Copy every live item of `master_id` into a plan bound to `target`.
  ///
  /// Assigning the same master to the same target twice returns the
  /// existing copy.
  pub async fn assign_study_plan(
    &self,
    master_id: Uuid,
    target:    PlanTarget,
  ) -> Result<CopyOutcome> {
    let master = self
      .store
      .get_study_plan(master_id)
      .await
      .map_err(Error::store)?;
    if !master.as_ref().is_some_and(|p| p.is_live() && p.is_master()) {
      return Err(Error::NotFound(format!(
        "no live master study plan with id {master_id}"
      )));
    }

    let outcome = self
      .store
      .create_copy(master_id, target.clone())
      .await
      .map_err(Error::store)?;

    if outcome.created {
      info!(
        master = %master_id,
        copy = %outcome.plan.study_plan_id,
        target = target.kind(),
        target_id = target.id(),
        items = outcome.items_cloned,
        "assigned study plan"
      );
    }
    Ok(outcome)
  }
}
