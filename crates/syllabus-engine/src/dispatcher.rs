//! Outbox delivery.
//!
//! A poller claims pending content events at a fixed interval and hands them
//! to a fixed pool of workers over a bounded channel. Each worker runs the
//! fan-out for one event, then acknowledges it or records the failure so the
//! event is redelivered.

use std::{collections::HashSet, sync::Arc};

use syllabus_core::event::OutboxEvent;
use tokio::{
  sync::{Mutex, mpsc, watch},
  task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{Engine, Error, FanOutReport, Result, Store};

// ─── Delivery ────────────────────────────────────────────────────────────────

impl<S: Store> Engine<S> {
  /// Fan out one claimed event and settle it in the outbox.
  pub(crate) async fn deliver(&self, event: OutboxEvent) -> Result<FanOutReport> {
    if event.attempts > 0 {
      warn!(event = %event.event_id, attempts = event.attempts, "redelivering content event");
    }

    match self.fan_out(&event.event.leaf_refs()).await {
      Ok(mut report) => {
        report.events = 1;
        if report.is_clean() {
          self.store.ack_event(event.event_id).await.map_err(Error::store)?;
          debug!(
            event = %event.event_id,
            master_items = report.master_items,
            copy_items = report.copy_items,
            "content event delivered"
          );
        } else {
          let reason = format!("fan-out failed for {} study plan(s)", report.failed_plans.len());
          self.store.nack_event(event.event_id, reason).await.map_err(Error::store)?;
        }
        Ok(report)
      }
      Err(e) => {
        warn!(event = %event.event_id, error = %e, "content event failed");
        self
          .store
          .nack_event(event.event_id, e.to_string())
          .await
          .map_err(Error::store)?;
        Err(e)
      }
    }
  }

  /// Deliver every claimable event inline and report what changed.
  ///
  /// Stops after the first pass that leaves an event pending, so a failing
  /// event is attempted once per call rather than until it is dead-lettered.
  /// Failed events are listed in the report, not returned as an error; only
  /// a failed claim is.
  pub async fn flush_events(&self) -> Result<FanOutReport> {
    let mut report = FanOutReport::default();
    let mut seen = HashSet::new();

    loop {
      let events = self
        .store
        .claim_events(
          self.delivery.batch_size.max(1),
          self.delivery.lease(),
          self.delivery.max_attempts,
        )
        .await
        .map_err(Error::store)?;
      if events.is_empty() {
        break;
      }

      let mut pending = false;
      for event in events {
        let event_id = event.event_id;
        if !seen.insert(event_id) {
          pending = true;
          continue;
        }
        // The rest of the claim is still leased to us; settle it before
        // giving up on this pass.
        match self.deliver(event).await {
          Ok(delivered) => {
            pending |= !delivered.is_clean();
            report.absorb(delivered);
          }
          Err(e) => {
            warn!(event = %event_id, error = %e, "content event not delivered");
            pending = true;
            report.failed_events.push(event_id);
          }
        }
      }
      if pending {
        break;
      }
    }
    Ok(report)
  }
}

// ─── Dispatcher ──────────────────────────────────────────────────────────────

/// Background outbox consumer. Stops when [`Dispatcher::shutdown`] is called.
pub struct Dispatcher {
  shutdown: watch::Sender<bool>,
  tasks:    Vec<JoinHandle<()>>,
}

impl Dispatcher {
  /// Start the poller and `worker_count` workers on the current runtime.
  pub fn spawn<S: Store>(engine: Engine<S>) -> Self {
    let config = engine.delivery().clone();
    let worker_count = config.worker_count.max(1);
    let (shutdown, shutdown_rx) = watch::channel(false);
    let (event_tx, event_rx) = mpsc::channel::<OutboxEvent>(config.batch_size.max(1));
    let event_rx = Arc::new(Mutex::new(event_rx));

    info!(
      workers = worker_count,
      poll_ms = config.poll_interval_ms,
      "starting content event dispatcher"
    );

    let mut tasks = Vec::with_capacity(worker_count + 1);
    for worker_id in 0..worker_count {
      let engine = engine.clone();
      let event_rx = Arc::clone(&event_rx);
      tasks.push(tokio::spawn(async move {
        worker_task(worker_id, engine, event_rx).await;
      }));
    }
    tasks.push(tokio::spawn(poll_task(engine, event_tx, shutdown_rx)));

    Self { shutdown, tasks }
  }

  /// Stop polling, let workers finish queued events, and wait for them.
  pub async fn shutdown(self) {
    let _ = self.shutdown.send(true);
    for task in self.tasks {
      if let Err(e) = task.await {
        error!("dispatcher task panicked: {e}");
      }
    }
    info!("content event dispatcher stopped");
  }
}

async fn poll_task<S: Store>(
  engine:       Engine<S>,
  event_tx:     mpsc::Sender<OutboxEvent>,
  mut shutdown: watch::Receiver<bool>,
) {
  let config = engine.delivery().clone();
  let mut interval = tokio::time::interval(config.poll_interval());
  interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

  loop {
    tokio::select! {
      _ = shutdown.changed() => break,
      _ = interval.tick() => {}
    }

    let events = match engine
      .store()
      .claim_events(config.batch_size.max(1), config.lease(), config.max_attempts)
      .await
    {
      Ok(events) => events,
      Err(e) => {
        error!("failed to claim content events: {e}");
        continue;
      }
    };

    for event in events {
      if event_tx.send(event).await.is_err() {
        return;
      }
    }
  }
}

async fn worker_task<S: Store>(
  worker_id: usize,
  engine:    Engine<S>,
  event_rx:  Arc<Mutex<mpsc::Receiver<OutboxEvent>>>,
) {
  debug!("worker {worker_id} started");
  loop {
    let event = {
      let mut rx = event_rx.lock().await;
      match rx.recv().await {
        Some(event) => event,
        None => break,
      }
    };

    let event_id = event.event_id;
    if let Err(e) = engine.deliver(event).await {
      error!(worker = worker_id, event = %event_id, "delivery failed: {e}");
    }
  }
  debug!("worker {worker_id} shutting down (channel closed)");
}
