//! The store traits.
//!
//! Implemented by storage backends (e.g. `sitebook-store-sqlite`). The
//! orchestration in [`pipeline`](crate::pipeline) and the `sitebook` binary
//! depend on these abstractions, not on any concrete backend.

use std::future::Future;

use crate::{
  diff::{AppliedChanges, SchemaDiff},
  job::JobRecord,
  live::LiveSchema,
  reconcile::{ReconcileAction, ReconcileSummary},
};

// ─── Schema ──────────────────────────────────────────────────────────────────

/// Structural access to a store.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait SchemaStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Read the current tables, columns and indexes. Never cached.
  fn introspect(
    &self,
  ) -> impl Future<Output = Result<LiveSchema, Self::Error>> + Send + '_;

  /// Execute the steps of `diff` in order, each in its own transaction.
  ///
  /// The first failing step aborts the remaining steps; steps already applied
  /// stay applied and are reported by the error.
  fn apply<'a>(
    &'a self,
    diff: &'a SchemaDiff,
  ) -> impl Future<Output = Result<AppliedChanges, Self::Error>> + Send + 'a;

  /// Row count of each named table, in the order given.
  fn row_counts<'a>(
    &'a self,
    tables: &'a [&'a str],
  ) -> impl Future<Output = Result<Vec<(String, u64)>, Self::Error>> + Send + 'a;
}

// ─── Jobs ────────────────────────────────────────────────────────────────────

/// Access to the `jobs` table of a converged store.
pub trait JobStore: SchemaStore {
  /// Every stored job, in insertion order.
  fn list_jobs(
    &self,
  ) -> impl Future<Output = Result<Vec<JobRecord>, Self::Error>> + Send + '_;

  /// Apply a reconciliation plan, committing every `batch_size` actions.
  ///
  /// An action that fails is rolled back on its own and counted as skipped;
  /// the rest of its batch still commits.
  fn apply_reconcile(
    &self,
    actions: Vec<ReconcileAction>,
    batch_size: usize,
  ) -> impl Future<Output = Result<ReconcileSummary, Self::Error>> + Send + '_;
}
