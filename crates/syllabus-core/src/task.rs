//! Import tasks: handles for long-running bulk assignment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
  Pending,
  InProgress,
  Completed,
  Failed,
}

impl TaskStatus {
  /// True once the task will not change status again.
  pub fn is_terminal(self) -> bool { matches!(self, Self::Completed | Self::Failed) }
}

/// A pollable record of one background assignment job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportTask {
  pub task_id:       Uuid,
  pub study_plan_id: Uuid,
  pub status:        TaskStatus,
  pub error_detail:  Option<String>,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}
