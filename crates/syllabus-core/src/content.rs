//! The content hierarchy: books, chapters, topics and the leaves under them.
//!
//! A chapter may be shared by several books through the book/chapter bridge.
//! A topic belongs to exactly one chapter and is therefore reachable through
//! every book that contains that chapter. Leaves (learning objectives and
//! assignments) belong to exactly one topic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

use crate::structure::LeafRef;

// ─── Hierarchy nodes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
  pub book_id: String,
  pub name:    String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
  pub chapter_id:    String,
  pub name:          String,
  #[serde(default)]
  pub display_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
  pub topic_id:      String,
  pub chapter_id:    String,
  pub name:          String,
  #[serde(default)]
  pub display_order: i32,
}

// ─── Leaves ──────────────────────────────────────────────────────────────────

/// Discriminates the two kinds of content leaf.
///
/// The string form doubles as the key prefix inside a content structure
/// flatten (`lo::<id>` / `assignment::<id>`).
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeafKind {
  #[serde(rename = "lo")]
  #[strum(serialize = "lo")]
  LearningObjective,
  Assignment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningObjective {
  pub lo_id:         String,
  pub topic_id:      String,
  pub name:          String,
  #[serde(default)]
  pub display_order: i32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at:    Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
  pub assignment_id: String,
  pub topic_id:      String,
  pub name:          String,
  #[serde(default)]
  pub display_order: i32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub instruction:   Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_grade:     Option<i32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at:    Option<DateTime<Utc>>,
}

/// A content leaf of either kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentLeaf {
  LearningObjective(LearningObjective),
  Assignment(Assignment),
}

impl ContentLeaf {
  pub fn kind(&self) -> LeafKind {
    match self {
      Self::LearningObjective(_) => LeafKind::LearningObjective,
      Self::Assignment(_) => LeafKind::Assignment,
    }
  }

  pub fn id(&self) -> &str {
    match self {
      Self::LearningObjective(lo) => &lo.lo_id,
      Self::Assignment(a) => &a.assignment_id,
    }
  }

  pub fn topic_id(&self) -> &str {
    match self {
      Self::LearningObjective(lo) => &lo.topic_id,
      Self::Assignment(a) => &a.topic_id,
    }
  }

  pub fn name(&self) -> &str {
    match self {
      Self::LearningObjective(lo) => &lo.name,
      Self::Assignment(a) => &a.name,
    }
  }

  pub fn display_order(&self) -> i32 {
    match self {
      Self::LearningObjective(lo) => lo.display_order,
      Self::Assignment(a) => a.display_order,
    }
  }

  pub fn leaf_ref(&self) -> LeafRef { LeafRef::new(self.kind(), self.id()) }
}

impl From<LearningObjective> for ContentLeaf {
  fn from(lo: LearningObjective) -> Self { Self::LearningObjective(lo) }
}

impl From<Assignment> for ContentLeaf {
  fn from(a: Assignment) -> Self { Self::Assignment(a) }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  #[test]
  fn leaf_kind_string_forms() {
    assert_eq!(LeafKind::LearningObjective.to_string(), "lo");
    assert_eq!(LeafKind::Assignment.as_ref(), "assignment");
    assert_eq!(LeafKind::from_str("lo").unwrap(), LeafKind::LearningObjective);
    assert!(LeafKind::from_str("quiz").is_err());
  }

  #[test]
  fn content_leaf_is_tagged() {
    let leaf = ContentLeaf::from(Assignment {
      assignment_id: "a1".into(),
      topic_id:      "t1".into(),
      name:          "Essay".into(),
      display_order: 3,
      instruction:   None,
      max_grade:     Some(10),
      updated_at:    None,
    });
    let json = serde_json::to_value(&leaf).unwrap();
    assert_eq!(json["kind"], "assignment");
    assert_eq!(json["assignment_id"], "a1");
    assert_eq!(leaf.display_order(), 3);
    assert_eq!(leaf.leaf_ref().id(), "a1");
  }
}
