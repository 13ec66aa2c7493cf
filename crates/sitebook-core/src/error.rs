//! Error types for `sitebook-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The store lacks structure an operation needs; run `migrate` first.
  #[error("store is not ready: {0}")]
  StoreNotReady(String),

  #[error("invalid batch size {0}: must be at least 1")]
  InvalidBatchSize(usize),

  #[error("invalid job status: {0:?}")]
  InvalidStatus(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
