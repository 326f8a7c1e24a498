//! Content-change notifications carried by the durable outbox.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  content::{Assignment, ContentLeaf, LearningObjective},
  structure::LeafRef,
};

/// A batch of leaves that were created or updated together.
///
/// The same value is both the input to a content upsert and the payload of
/// the notification that upsert emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentEvent {
  AssignmentsUpserted { assignments: Vec<Assignment> },
  LearningObjectivesUpserted { learning_objectives: Vec<LearningObjective> },
}

impl ContentEvent {
  pub fn leaves(&self) -> Vec<ContentLeaf> {
    match self {
      Self::AssignmentsUpserted { assignments } => {
        assignments.iter().cloned().map(ContentLeaf::from).collect()
      }
      Self::LearningObjectivesUpserted { learning_objectives } => learning_objectives
        .iter()
        .cloned()
        .map(ContentLeaf::from)
        .collect(),
    }
  }

  /// The leaves this batch names. Consumers re-read them rather than trust
  /// the payload, which may be older than the stored row.
  pub fn leaf_refs(&self) -> Vec<LeafRef> {
    match self {
      Self::AssignmentsUpserted { assignments } => assignments
        .iter()
        .map(|a| LeafRef::Assignment(a.assignment_id.clone()))
        .collect(),
      Self::LearningObjectivesUpserted { learning_objectives } => learning_objectives
        .iter()
        .map(|lo| LeafRef::LearningObjective(lo.lo_id.clone()))
        .collect(),
    }
  }

  pub fn ids(&self) -> Vec<String> {
    match self {
      Self::AssignmentsUpserted { assignments } => {
        assignments.iter().map(|a| a.assignment_id.clone()).collect()
      }
      Self::LearningObjectivesUpserted { learning_objectives } => learning_objectives
        .iter()
        .map(|lo| lo.lo_id.clone())
        .collect(),
    }
  }

  pub fn is_empty(&self) -> bool {
    match self {
      Self::AssignmentsUpserted { assignments } => assignments.is_empty(),
      Self::LearningObjectivesUpserted { learning_objectives } => {
        learning_objectives.is_empty()
      }
    }
  }
}

/// One delivery of an outbox row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEvent {
  pub event_id:   Uuid,
  pub event:      ContentEvent,
  /// Failed deliveries so far.
  pub attempts:   u32,
  pub created_at: DateTime<Utc>,
}
