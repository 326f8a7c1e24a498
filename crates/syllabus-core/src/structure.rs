//! Content structures: one placement of a leaf inside one book, projected for
//! one course.

use serde::{Deserialize, Serialize};

use crate::content::LeafKind;

/// Identifies a leaf by kind and id.
///
/// Serialised as a single `lo_id` or `assignment_id` key so that it can be
/// flattened into a [`ContentStructure`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeafRef {
  #[serde(rename = "lo_id")]
  LearningObjective(String),
  #[serde(rename = "assignment_id")]
  Assignment(String),
}

impl LeafRef {
  pub fn new(kind: LeafKind, id: impl Into<String>) -> Self {
    match kind {
      LeafKind::LearningObjective => Self::LearningObjective(id.into()),
      LeafKind::Assignment => Self::Assignment(id.into()),
    }
  }

  pub fn kind(&self) -> LeafKind {
    match self {
      Self::LearningObjective(_) => LeafKind::LearningObjective,
      Self::Assignment(_) => LeafKind::Assignment,
    }
  }

  pub fn id(&self) -> &str {
    match self {
      Self::LearningObjective(id) | Self::Assignment(id) => id,
    }
  }
}

/// Where a topic sits inside one book. A topic reachable through two books
/// has two placements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
  pub book_id:    String,
  pub chapter_id: String,
  pub topic_id:   String,
}

impl Placement {
  /// Project this placement for `course_id` and attach `leaf`.
  pub fn structure(&self, course_id: &str, leaf: LeafRef) -> ContentStructure {
    ContentStructure {
      course_id:  course_id.to_owned(),
      book_id:    self.book_id.clone(),
      chapter_id: self.chapter_id.clone(),
      topic_id:   self.topic_id.clone(),
      leaf,
    }
  }
}

/// Immutable tuple locating one content leaf within one book's hierarchy for
/// one course.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentStructure {
  pub course_id:  String,
  pub book_id:    String,
  pub chapter_id: String,
  pub topic_id:   String,
  #[serde(flatten)]
  pub leaf:       LeafRef,
}

impl ContentStructure {
  /// The denormalised search string stored next to every study plan item.
  ///
  /// Every id appears verbatim, so "does this item mention leaf X" is a plain
  /// substring test.
  pub fn flatten(&self) -> String {
    format!(
      "book::{}topic::{}chapter::{}course::{}{}::{}",
      self.book_id,
      self.topic_id,
      self.chapter_id,
      self.course_id,
      self.leaf.kind(),
      self.leaf.id(),
    )
  }

  pub fn placement(&self) -> Placement {
    Placement {
      book_id:    self.book_id.clone(),
      chapter_id: self.chapter_id.clone(),
      topic_id:   self.topic_id.clone(),
    }
  }
}
