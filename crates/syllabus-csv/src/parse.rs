//! Record tokenizer and row decoder.
//!
//! Pipeline:
//!   raw &str
//!     └─ records()      → Vec<Vec<String>>
//!          ├─ check_header()
//!          └─ decode_row() → ImportRow

use chrono::{DateTime, Utc};
use syllabus_core::{content::LeafKind, plan::ScheduleWindow};
use uuid::Uuid;

use crate::{
  HEADER, ImportRow,
  error::{Error, Result},
};

// ─── Tokenizer ───────────────────────────────────────────────────────────────

/// Split `input` into records of cells.
///
/// Handles double-quoted cells (with `""` as an escaped quote), CRLF or LF
/// line endings and a leading byte-order mark. Blank lines are dropped.
pub(crate) fn records(input: &str) -> Result<Vec<Vec<String>>> {
  let input = input.strip_prefix('\u{feff}').unwrap_or(input);

  let mut records: Vec<Vec<String>> = Vec::new();
  let mut record: Vec<String> = Vec::new();
  let mut cell = String::new();
  let mut in_quotes = false;
  let mut chars = input.chars().peekable();

  while let Some(c) = chars.next() {
    if in_quotes {
      match c {
        '"' if chars.peek() == Some(&'"') => {
          chars.next();
          cell.push('"');
        }
        '"' => in_quotes = false,
        _ => cell.push(c),
      }
      continue;
    }

    match c {
      '"' => in_quotes = true,
      ',' => record.push(std::mem::take(&mut cell)),
      '\r' if chars.peek() == Some(&'\n') => {}
      '\n' => {
        record.push(std::mem::take(&mut cell));
        push_record(&mut records, std::mem::take(&mut record));
      }
      _ => cell.push(c),
    }
  }

  if in_quotes {
    return Err(Error::UnterminatedQuote { row: records.len() });
  }
  record.push(cell);
  push_record(&mut records, record);

  Ok(records)
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
  let blank = record.len() == 1 && record[0].trim().is_empty();
  if !blank {
    records.push(record);
  }
}

// ─── Header ──────────────────────────────────────────────────────────────────

fn normalise(title: &str) -> String {
  title
    .chars()
    .filter(|c| !c.is_whitespace())
    .flat_map(char::to_lowercase)
    .collect()
}

pub(crate) fn check_header(cells: &[String]) -> Result<()> {
  for (i, expected) in HEADER.iter().enumerate() {
    let found = cells.get(i).map(String::as_str).unwrap_or_default();
    if normalise(found) != normalise(expected) {
      return Err(Error::Header {
        column: i + 1,
        expected,
        found: found.trim().to_string(),
      });
    }
  }
  if let Some(extra) = cells.get(HEADER.len()) {
    return Err(Error::Header {
      column:   HEADER.len() + 1,
      expected: "",
      found:    extra.trim().to_string(),
    });
  }
  Ok(())
}

// ─── Row decoding ────────────────────────────────────────────────────────────

struct Cells {
  row:   usize,
  cells: std::vec::IntoIter<String>,
  index: usize,
}

impl Cells {
  /// Next cell, trimmed, together with its column title.
  fn next(&mut self) -> (&'static str, String) {
    let column = HEADER[self.index];
    self.index += 1;
    let value = self.cells.next().unwrap_or_default();
    (column, value.trim().to_string())
  }

  fn text(&mut self) -> String { self.next().1 }

  fn required(&mut self) -> Result<String> {
    let (column, value) = self.next();
    if value.is_empty() {
      return Err(self.cell_error(column, "must not be empty"));
    }
    Ok(value)
  }

  fn optional_uuid(&mut self) -> Result<Option<Uuid>> {
    let (column, value) = self.next();
    if value.is_empty() {
      return Ok(None);
    }
    Uuid::parse_str(&value)
      .map(Some)
      .map_err(|e| self.cell_error(column, format!("invalid id {value:?}: {e}")))
  }

  fn kind(&mut self) -> Result<LeafKind> {
    let (column, value) = self.next();
    match normalise(&value).as_str() {
      "learningobjective" | "lo" => Ok(LeafKind::LearningObjective),
      "assignment" => Ok(LeafKind::Assignment),
      _ => Err(self.cell_error(column, format!("unknown content type {value:?}"))),
    }
  }

  fn time(&mut self) -> Result<Option<DateTime<Utc>>> {
    let (column, value) = self.next();
    if value.is_empty() {
      return Ok(None);
    }
    DateTime::parse_from_rfc3339(&value)
      .map(|dt| Some(dt.with_timezone(&Utc)))
      .map_err(|e| self.cell_error(column, format!("invalid time {value:?}: {e}")))
  }

  fn cell_error(&self, column: &'static str, message: impl Into<String>) -> Error {
    Error::Cell { row: self.row, column, message: message.into() }
  }
}

pub(crate) fn decode_row(row: usize, cells: Vec<String>) -> Result<ImportRow> {
  if cells.len() != HEADER.len() {
    return Err(Error::ColumnCount {
      row,
      expected: HEADER.len(),
      found: cells.len(),
    });
  }

  let mut cells = Cells { row, cells: cells.into_iter(), index: 0 };

  let item_id      = cells.optional_uuid()?;
  let book_id      = cells.required()?;
  let book_name    = cells.text();
  let chapter_id   = cells.required()?;
  let chapter_name = cells.text();
  let topic_id     = cells.required()?;
  let topic_name   = cells.text();
  let kind         = cells.kind()?;
  let content_id   = cells.required()?;
  let name         = cells.text();

  let window = ScheduleWindow {
    available_from: cells.time()?,
    available_to:   cells.time()?,
    start_date:     cells.time()?,
    end_date:       cells.time()?,
  };

  Ok(ImportRow {
    row_number: row,
    item_id,
    book_id,
    book_name,
    chapter_id,
    chapter_name,
    topic_id,
    topic_name,
    kind,
    content_id,
    name,
    window,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tokenizes_quoted_newlines() {
    let recs = records("a,\"b\nc\",d\r\ne,f").unwrap();
    assert_eq!(recs, vec![
      vec!["a".to_string(), "b\nc".into(), "d".into()],
      vec!["e".to_string(), "f".into()],
    ]);
  }

  #[test]
  fn strips_byte_order_mark() {
    let recs = records("\u{feff}ID,x").unwrap();
    assert_eq!(recs[0][0], "ID");
  }

  #[test]
  fn header_rejects_extra_columns() {
    let mut cells: Vec<String> = HEADER.iter().map(|h| h.to_string()).collect();
    assert!(check_header(&cells).is_ok());
    cells.push("Extra".into());
    assert!(matches!(check_header(&cells), Err(Error::Header { column: 15, .. })));
  }

  #[test]
  fn kind_accepts_abbreviation() {
    let mut cells: Vec<String> = vec![String::new(); HEADER.len()];
    cells[1] = "b".into();
    cells[3] = "c".into();
    cells[5] = "t".into();
    cells[7] = " lo ".into();
    cells[8] = "x".into();
    let row = decode_row(3, cells).unwrap();
    assert_eq!(row.kind, LeafKind::LearningObjective);
    assert_eq!(row.row_number, 3);
  }
}
