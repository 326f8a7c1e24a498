//! Tabular study plan codec.
//!
//! Decodes the comma-separated study plan listing used by bulk imports into
//! typed [`ImportRow`]s. Pure synchronous; no HTTP or database dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! let payload = "ID,Book ID,Book name,Chapter ID,Chapter name,Topic ID,Topic name,\
//!   Assignment/LO,Content ID,Name,Available from,Available until,Start time,Due time\n\
//!   ,b1,Book,c1,Chapter,t1,Topic,Assignment,a1,Essay,,,,\n";
//! for row in syllabus_csv::parse(payload).unwrap() {
//!   let row = row.unwrap();
//!   println!("row {} -> {}", row.row_number, row.content_id);
//! }
//! ```

pub mod error;
mod parse;

pub use error::{Error, Result};
use syllabus_core::{
  content::LeafKind,
  plan::ScheduleWindow,
  structure::{LeafRef, Placement},
};
use uuid::Uuid;

// ─── Format ──────────────────────────────────────────────────────────────────

/// Column titles, in order. Matching is case- and whitespace-insensitive.
pub const HEADER: [&str; 14] = [
  "ID",
  "Book ID",
  "Book name",
  "Chapter ID",
  "Chapter name",
  "Topic ID",
  "Topic name",
  "Assignment/LO",
  "Content ID",
  "Name",
  "Available from",
  "Available until",
  "Start time",
  "Due time",
];

// ─── Public types ────────────────────────────────────────────────────────────

/// One decoded data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
  /// 1-based position among data rows (the header is not counted).
  pub row_number:   usize,
  /// Existing study plan item; `None` asks for a new item.
  pub item_id:      Option<Uuid>,
  pub book_id:      String,
  pub book_name:    String,
  pub chapter_id:   String,
  pub chapter_name: String,
  pub topic_id:     String,
  pub topic_name:   String,
  pub kind:         LeafKind,
  pub content_id:   String,
  pub name:         String,
  pub window:       ScheduleWindow,
}

impl ImportRow {
  pub fn leaf(&self) -> LeafRef { LeafRef::new(self.kind, self.content_id.clone()) }

  pub fn placement(&self) -> Placement {
    Placement {
      book_id:    self.book_id.clone(),
      chapter_id: self.chapter_id.clone(),
      topic_id:   self.topic_id.clone(),
    }
  }
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Decode a payload.
///
/// Structural problems (empty payload, bad header, unbalanced quotes) fail
/// the whole payload. Each data row is otherwise decoded independently; a
/// malformed row yields `Err(…)` in its position without aborting the rest.
pub fn parse(input: &str) -> Result<Vec<Result<ImportRow>>> {
  let mut records = parse::records(input)?.into_iter();
  let header = records.next().ok_or(Error::Empty)?;
  parse::check_header(&header)?;

  Ok(
    records
      .enumerate()
      .map(|(i, cells)| parse::decode_row(i + 1, cells))
      .collect(),
  )
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::{TimeZone as _, Utc};

  use super::*;

  const HEAD: &str = "ID,Book ID,Book name,Chapter ID,Chapter name,Topic ID,Topic name,\
                      Assignment/ LO,Content ID,Name,Available from,Available until,\
                      Start time,Due time";

  fn payload(rows: &[&str]) -> String {
    let mut out = String::from(HEAD);
    for row in rows {
      out.push_str("\r\n");
      out.push_str(row);
    }
    out
  }

  #[test]
  fn decodes_new_and_existing_rows() {
    let id = Uuid::new_v4();
    let input = payload(&[
      ",b1,Book 1,c1,Chapter 1,t1,Topic 1,Learning Objective,lo1,Intro,,,,",
      &format!(
        "{id},b1,Book 1,c1,Chapter 1,t1,Topic 1,Assignment,a1,\"Essay, part 1\",\
         2020-08-23T00:00:00-07:00,2020-09-23T00:00:00-07:00,,2020-09-01T00:00:00Z"
      ),
    ]);

    let rows: Vec<ImportRow> = parse(&input)
      .unwrap()
      .into_iter()
      .collect::<Result<_>>()
      .unwrap();
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].row_number, 1);
    assert_eq!(rows[0].item_id, None);
    assert_eq!(rows[0].kind, LeafKind::LearningObjective);
    assert_eq!(rows[0].window, ScheduleWindow::default());

    assert_eq!(rows[1].item_id, Some(id));
    assert_eq!(rows[1].kind, LeafKind::Assignment);
    assert_eq!(rows[1].name, "Essay, part 1");
    assert_eq!(
      rows[1].window.available_from,
      Some(Utc.with_ymd_and_hms(2020, 8, 23, 7, 0, 0).unwrap())
    );
    assert_eq!(rows[1].window.start_date, None);
    assert_eq!(rows[1].leaf(), LeafRef::Assignment("a1".into()));
  }

  #[test]
  fn header_is_checked() {
    let err = parse("ID,Book,Other\n,b1,x").unwrap_err();
    assert!(matches!(err, Error::Header { column: 2, .. }));
    assert_eq!(parse("").unwrap_err(), Error::Empty);
  }

  #[test]
  fn header_tolerates_case_and_spacing() {
    let head = HEADER.map(|h| h.to_uppercase()).join(" , ");
    assert!(parse(&head).unwrap().is_empty());
  }

  #[test]
  fn bad_rows_do_not_abort_good_ones() {
    let input = payload(&[
      "not-a-uuid,b1,B,c1,C,t1,T,Assignment,a1,A,,,,",
      ",b1,B,c1,C,t1,T,Quiz,q1,Q,,,,",
      ",b1,B,c1,C,t1,T,Assignment,a2,A,,,,",
      ",b1,B,c1,C,t1,T,Assignment,a3,A,yesterday,,,",
      ",b1,B,c1,C,t1,T,Assignment",
    ]);
    let rows = parse(&input).unwrap();
    assert_eq!(rows.len(), 5);
    assert!(matches!(rows[0], Err(Error::Cell { row: 1, column: "ID", .. })));
    assert!(matches!(rows[1], Err(Error::Cell { row: 2, column: "Assignment/LO", .. })));
    assert!(rows[2].is_ok());
    assert!(matches!(rows[3], Err(Error::Cell { row: 4, column: "Available from", .. })));
    assert!(matches!(rows[4], Err(Error::ColumnCount { row: 5, found: 8, .. })));
  }

  #[test]
  fn required_ids_must_be_present() {
    let rows = parse(&payload(&[",b1,B,,C,t1,T,Assignment,a1,A,,,,"])).unwrap();
    assert!(matches!(rows[0], Err(Error::Cell { column: "Chapter ID", .. })));
  }

  #[test]
  fn blank_lines_are_skipped_and_quotes_unescaped() {
    let input = payload(&["", ",b1,B,c1,C,t1,T,Assignment,a1,\"say \"\"hi\"\"\",,,,", ""]);
    let rows = parse(&input).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].as_ref().unwrap().name, "say \"hi\"");
  }

  #[test]
  fn unterminated_quote_fails_payload() {
    let err = parse(&payload(&[",b1,\"B,c1"])).unwrap_err();
    assert_eq!(err, Error::UnterminatedQuote { row: 1 });
  }
}
