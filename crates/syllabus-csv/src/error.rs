//! Error types for the study plan tabular codec.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  #[error("payload is empty")]
  Empty,

  #[error("header column {column} must be {expected:?}, found {found:?}")]
  Header {
    column:   usize,
    expected: &'static str,
    found:    String,
  },

  #[error("row {row}: unterminated quoted field")]
  UnterminatedQuote { row: usize },

  #[error("row {row}: expected {expected} columns, found {found}")]
  ColumnCount {
    row:      usize,
    expected: usize,
    found:    usize,
  },

  #[error("row {row}, column {column:?}: {message}")]
  Cell {
    row:     usize,
    column:  &'static str,
    message: String,
  },
}

impl Error {
  /// The 1-based data row the error refers to, if any.
  pub fn row(&self) -> Option<usize> {
    match self {
      Self::UnterminatedQuote { row }
      | Self::ColumnCount { row, .. }
      | Self::Cell { row, .. } => Some(*row),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
