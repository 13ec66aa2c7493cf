//! Error type for `sitebook-store-sqlite`.

use sitebook_core::diff::AppliedChanges;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] sitebook_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// A schema step failed. Steps before it stay applied.
  #[error(
    "schema step `{step}` failed after {} applied change(s): {source}",
    .applied.len()
  )]
  Ddl {
    step:      String,
    statement: String,
    applied:   AppliedChanges,
    #[source]
    source:    tokio_rusqlite::Error,
  },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
