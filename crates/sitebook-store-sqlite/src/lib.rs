//! SQLite backend for the sitebook business store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Also home to the backup guard, which
//! snapshots the store file before anything mutates it.

mod encode;
mod schema;
mod store;

pub mod backup;
pub mod error;

pub use backup::{BackupOutcome, backup};
pub use error::{Error, Result};
pub use store::SqliteStore;
