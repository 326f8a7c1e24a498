//! Error types for `syllabus-core`.
//!
//! These are the domain rejections a storage backend may raise. Backends wrap
//! them in their own error type and expose them through
//! [`StoreError::domain`](crate::store::StoreError::domain).

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("study plan not found: {0}")]
  StudyPlanNotFound(Uuid),

  #[error("study plan {0} is not a master study plan")]
  NotAMaster(Uuid),

  #[error("study plan item not found: {0}")]
  ItemNotFound(Uuid),

  #[error("import task not found: {0}")]
  TaskNotFound(Uuid),

  #[error("chapter not found: {0}")]
  ChapterNotFound(String),

  #[error("book not found: {0}")]
  BookNotFound(String),

  #[error("references unknown {kind} {id}")]
  UnknownParent { kind: &'static str, id: String },

  #[error("{kind} {id} belongs to topic {current}, cannot move it to {requested}")]
  TopicChanged {
    kind:      &'static str,
    id:        String,
    current:   String,
    requested: String,
  },

  #[error("invalid schedule window: {0}")]
  InvalidWindow(String),

  #[error("empty identifier for {0}")]
  EmptyId(&'static str),

  #[error("unknown {what} discriminant: {value:?}")]
  UnknownDiscriminant { what: &'static str, value: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// True when the error names a record that does not exist.
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::StudyPlanNotFound(_)
        | Self::ItemNotFound(_)
        | Self::TaskNotFound(_)
        | Self::ChapterNotFound(_)
        | Self::BookNotFound(_)
    )
  }

  /// True when stored data could not be decoded.
  pub fn is_corrupt(&self) -> bool {
    matches!(self, Self::Serialization(_) | Self::UnknownDiscriminant { .. })
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
