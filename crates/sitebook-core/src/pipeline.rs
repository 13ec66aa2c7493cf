//! Orchestration of a `migrate`, `verify` or `import` run over any store.
//!
//! Each function awaits one store call at a time; there is no concurrency
//! within a run.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
  Error, Result,
  candidate::CandidateJob,
  diff::{AppliedChanges, SchemaDiff, converge},
  job::present,
  merge::group_and_merge,
  reconcile::{JobIndex, JobNumbers, ReconcileSummary, reconcile},
  schema::{JOBS_TABLE, SchemaSpec},
  store::{JobStore, SchemaStore},
  verify::{Outcome, VerificationReport, verify},
};

/// Area label used in import reports for jobs without one.
pub const UNKNOWN_AREA: &str = "Unknown";

fn store_error<E>(e: E) -> Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  Error::Store(Box::new(e))
}

// ─── Convergence ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ConvergenceRun {
  pub diff:     SchemaDiff,
  pub applied:  AppliedChanges,
  pub report:   VerificationReport,
  pub dry_run:  bool,
}

/// Introspect, diff, apply (unless `dry_run`), then verify against a fresh
/// introspection.
pub async fn run_convergence<S: SchemaStore>(
  store: &S,
  target: &SchemaSpec,
  dry_run: bool,
) -> Result<ConvergenceRun> {
  let live = store.introspect().await.map_err(store_error)?;
  let diff = converge(&live, target);

  for missing in &diff.unaddable_columns {
    tracing::warn!(
      table = missing.table,
      column = missing.column.name,
      "column cannot be added to an existing table; leaving it missing"
    );
  }

  let applied = if dry_run || diff.is_empty() {
    tracing::info!(
      steps = diff.steps().len(),
      dry_run,
      "schema convergence planned"
    );
    AppliedChanges::default()
  } else {
    let applied = store.apply(&diff).await.map_err(store_error)?;
    tracing::info!(
      tables = applied.tables_created.len(),
      columns = applied.columns_added.len(),
      indexes = applied.indexes_created.len(),
      "schema convergence applied"
    );
    applied
  };

  let report = run_verify(store, target).await?;
  Ok(ConvergenceRun { diff, applied, report, dry_run })
}

/// Verify the store as it is now, with row counts for every present table.
pub async fn run_verify<S: SchemaStore>(
  store: &S,
  target: &SchemaSpec,
) -> Result<VerificationReport> {
  let live = store.introspect().await.map_err(store_error)?;
  let report = verify(&live, target);

  let present: Vec<&str> = report.present_tables().collect();
  let row_counts = store.row_counts(&present).await.map_err(store_error)?;
  let report = report.with_row_counts(row_counts);

  match report.outcome() {
    Outcome::Pass => tracing::info!("verification passed"),
    Outcome::Degraded => {
      for (table, column) in report.missing_columns() {
        tracing::warn!(table, column, "verification: column missing");
      }
    }
    Outcome::Fatal => {
      for table in report.missing_tables() {
        tracing::error!(table, "verification: table missing");
      }
    }
  }

  Ok(report)
}

// ─── Import ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportRun {
  pub input:     usize,
  pub excluded:  usize,
  pub merged:    usize,
  pub conflicts: usize,
  /// Merged records per area.
  pub by_area:   BTreeMap<String, usize>,
  pub summary:   ReconcileSummary,
  pub dry_run:   bool,
}

/// Merge `candidates` and upsert the result into the store's `jobs` table.
///
/// With `dry_run` the plan is computed against the stored jobs and counted
/// but nothing is written.
pub async fn run_import<S: JobStore>(
  store: &S,
  target: &SchemaSpec,
  candidates: Vec<CandidateJob>,
  batch_size: usize,
  dry_run: bool,
) -> Result<ImportRun> {
  if batch_size == 0 {
    return Err(Error::InvalidBatchSize(batch_size));
  }
  ensure_jobs_ready(store, target).await?;

  let outcome = group_and_merge(candidates);

  let mut by_area = BTreeMap::new();
  for merged in &outcome.merged {
    let area = present(&merged.job.area).unwrap_or(UNKNOWN_AREA);
    *by_area.entry(area.to_owned()).or_insert(0) += 1;
  }

  let index = JobIndex::new(store.list_jobs().await.map_err(store_error)?);
  let mut numbers = JobNumbers::seeded(index.job_numbers());
  let actions = reconcile(&outcome.merged, &index, &mut numbers);
  tracing::debug!(
    stored = index.len(),
    actions = actions.len(),
    "reconciliation planned"
  );

  let summary = if dry_run {
    ReconcileSummary::planned(&actions)
  } else {
    store
      .apply_reconcile(actions, batch_size)
      .await
      .map_err(store_error)?
  };

  tracing::info!(
    created = summary.created,
    updated = summary.updated,
    unchanged = summary.unchanged,
    skipped = summary.skipped,
    dry_run,
    "import finished"
  );

  Ok(ImportRun {
    input: outcome.input,
    excluded: outcome.excluded,
    merged: outcome.merged.len(),
    conflicts: outcome.conflict_count(),
    by_area,
    summary,
    dry_run,
  })
}

/// Fail unless the `jobs` table exists with every declared column.
async fn ensure_jobs_ready<S: SchemaStore>(
  store: &S,
  target: &SchemaSpec,
) -> Result<()> {
  let live = store.introspect().await.map_err(store_error)?;
  let Some(table) = live.table(JOBS_TABLE) else {
    return Err(Error::StoreNotReady(format!("table {JOBS_TABLE:?} is missing")));
  };

  let missing: Vec<&str> = target
    .table(JOBS_TABLE)
    .map(|spec| {
      spec
        .columns
        .iter()
        .filter(|c| !table.has_column(c.name))
        .map(|c| c.name)
        .collect()
    })
    .unwrap_or_default();

  if missing.is_empty() {
    Ok(())
  } else {
    Err(Error::StoreNotReady(format!(
      "table {JOBS_TABLE:?} is missing columns: {}",
      missing.join(", ")
    )))
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
