//! Study plan materialization and propagation.
//!
//! [`Engine`] wraps any backend implementing the `syllabus-core` storage
//! traits and provides the operations exposed to callers:
//!
//! - assigning a master study plan to a course, class or student,
//! - fanning new or reordered content out into every affected plan,
//! - bulk CSV imports that create or diff study plans,
//! - the to-do and progress read models.
//!
//! Fan-out is driven by the durable outbox. A [`Dispatcher`] drains it in
//! the background; [`Engine::flush_events`] drains it inline.

pub mod content;
pub mod dispatcher;
pub mod error;
pub mod fanout;
pub mod import;
pub mod reader;

mod assign;
mod diff;

use std::{sync::Arc, time::Duration};

use serde::Deserialize;
use syllabus_core::store::{EventOutbox, StudyPlanStore};

pub use dispatcher::Dispatcher;
pub use error::{Code, Error, Result, RowError};
pub use fanout::FanOutReport;
pub use import::{ImportMode, ImportRequest, ImportResponse, wait_for_task};
pub use reader::{Progress, ToDoFilter, ToDoItem, ToDoStatus};

/// Everything the engine needs from a backend.
pub trait Store: StudyPlanStore + EventOutbox + 'static {}

impl<T: StudyPlanStore + EventOutbox + 'static> Store for T {}

// ─── Configuration ───────────────────────────────────────────────────────────

/// Outbox delivery settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
  /// Workers consuming claimed events.
  pub worker_count:     usize,
  pub poll_interval_ms: u64,
  /// Events claimed per poll.
  pub batch_size:       usize,
  /// How long a claimed event stays invisible to other consumers.
  pub lease_ms:         u64,
  /// Failed deliveries after which an event is no longer claimed.
  pub max_attempts:     u32,
}

impl Default for DispatcherConfig {
  fn default() -> Self {
    Self {
      worker_count:     4,
      poll_interval_ms: 500,
      batch_size:       32,
      lease_ms:         30_000,
      max_attempts:     10,
    }
  }
}

impl DispatcherConfig {
  pub fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_ms) }

  pub fn lease(&self) -> Duration { Duration::from_millis(self.lease_ms) }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// The study plan engine. Cloning is cheap; clones share the backend.
pub struct Engine<S> {
  store:    Arc<S>,
  delivery: DispatcherConfig,
}

impl<S> Clone for Engine<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), delivery: self.delivery.clone() }
  }
}

impl<S: Store> Engine<S> {
  pub fn new(store: S) -> Self { Self::from_arc(Arc::new(store)) }

  pub fn from_arc(store: Arc<S>) -> Self {
    Self { store, delivery: DispatcherConfig::default() }
  }

  pub fn with_delivery(mut self, delivery: DispatcherConfig) -> Self {
    self.delivery = delivery;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn delivery(&self) -> &DispatcherConfig { &self.delivery }
}
