//! [`EventOutbox`] implementation over the `content_events` table.
//!
//! A claim leases rows by setting `locked_until`. Rows whose lease has run
//! out are claimable again, which gives at-least-once delivery when a
//! consumer dies mid-event.

use std::time::Duration;

use chrono::Utc;
use syllabus_core::{event::OutboxEvent, store::EventOutbox};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{RawEvent, encode_dt, encode_uuid},
  store::SqliteStore,
};

impl EventOutbox for SqliteStore {
  async fn claim_events(
    &self,
    limit:        usize,
    lease:        Duration,
    max_attempts: u32,
  ) -> Result<Vec<OutboxEvent>> {
    let now = Utc::now();
    let lease = chrono::Duration::from_std(lease)
      .map_err(|e| Error::DateParse(format!("lease out of range: {e}")))?;
    let until = encode_dt(now + lease);
    let now = encode_dt(now);
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let raws = {
          let mut stmt = tx.prepare(
            "SELECT event_id, payload, attempts, created_at FROM content_events
             WHERE delivered_at IS NULL
               AND attempts < ?1
               AND (locked_until IS NULL OR locked_until <= ?2)
             ORDER BY created_at, rowid
             LIMIT ?3",
          )?;
          stmt
            .query_map(rusqlite::params![max_attempts, now, limit], |row| {
              Ok(RawEvent {
                event_id:   row.get(0)?,
                payload:    row.get(1)?,
                attempts:   row.get(2)?,
                created_at: row.get(3)?,
              })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        for raw in &raws {
          tx.execute(
            "UPDATE content_events SET locked_until = ?2 WHERE event_id = ?1",
            rusqlite::params![raw.event_id, until],
          )?;
        }
        tx.commit()?;
        Ok(raws)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }

  async fn ack_event(&self, event_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(event_id);
    let now    = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE content_events SET delivered_at = ?2, locked_until = NULL, last_error = NULL
           WHERE event_id = ?1",
          rusqlite::params![id_str, now],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn nack_event(&self, event_id: Uuid, error: String) -> Result<()> {
    let id_str = encode_uuid(event_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE content_events
           SET attempts = attempts + 1, locked_until = NULL, last_error = ?2
           WHERE event_id = ?1 AND delivered_at IS NULL",
          rusqlite::params![id_str, error],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
