//! SQLite backend for the syllabus study plan engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Composite operations run inside a
//! single SQLite transaction.

mod encode;
mod outbox;
mod plans;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
