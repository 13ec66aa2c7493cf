//! [`SqliteStore`], the SQLite implementation of the store traits.

use std::path::Path;

use sitebook_core::{
  diff::{AppliedChanges, SchemaDiff},
  job::JobRecord,
  live::{LiveColumn, LiveSchema, LiveTable},
  reconcile::{ReconcileAction, ReconcileSummary},
  store::{JobStore, SchemaStore},
};

use crate::{
  Error, Result,
  encode::{RawJob, SELECT_JOBS, insert_job, update_job},
  schema::{quote, step_statements},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A business store backed by a single SQLite file.
///
/// Opening never changes the schema; that is the convergence engine's job.
/// The connection stays in SQLite's default rollback-journal mode so a copy
/// of the single file is a complete snapshot.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path`.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Ok(Self { conn })
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Ok(Self { conn })
  }

  /// Run arbitrary SQL. Used to seed hand-made stores in tests and by
  /// operators repairing a store.
  pub async fn execute_batch(&self, sql: impl Into<String>) -> Result<()> {
    let sql = sql.into();
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

fn read_live_schema(conn: &rusqlite::Connection) -> rusqlite::Result<LiveSchema> {
  let names: Vec<String> = conn
    .prepare(
      "SELECT name FROM sqlite_master
       WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
       ORDER BY rowid",
    )?
    .query_map([], |row| row.get(0))?
    .collect::<rusqlite::Result<_>>()?;

  let mut tables = Vec::with_capacity(names.len());
  for name in names {
    let columns = conn
      .prepare(&format!("PRAGMA table_info({})", quote(&name)))?
      .query_map([], |row| {
        Ok(LiveColumn {
          name:      row.get(1)?,
          decl_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
          not_null:  row.get::<_, i64>(3)? != 0,
        })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;

    let indexes = conn
      .prepare(&format!("PRAGMA index_list({})", quote(&name)))?
      .query_map([], |row| row.get(1))?
      .collect::<rusqlite::Result<Vec<String>>>()?;

    tables.push(LiveTable { name, columns, indexes });
  }

  Ok(LiveSchema { tables })
}

fn apply_action(
  conn: &rusqlite::Connection,
  action: &ReconcileAction,
) -> rusqlite::Result<()> {
  match action {
    ReconcileAction::Create(job) => insert_job(conn, job),
    ReconcileAction::Update { job_number, patch } => {
      update_job(conn, job_number, patch)
    }
    ReconcileAction::Unchanged { .. } => Ok(()),
  }
}

// ─── SchemaStore impl ────────────────────────────────────────────────────────

impl SchemaStore for SqliteStore {
  type Error = Error;

  async fn introspect(&self) -> Result<LiveSchema> {
    let live = self
      .conn
      .call(|conn| Ok(read_live_schema(conn)?))
      .await?;
    Ok(live)
  }

  async fn apply(&self, diff: &SchemaDiff) -> Result<AppliedChanges> {
    let mut applied = AppliedChanges::default();

    for step in diff.steps() {
      let statements = step_statements(&step);
      let statement = statements.join(";\n");
      tracing::debug!(%step, %statement, "applying schema step");

      let result = self
        .conn
        .call(move |conn| {
          let tx = conn.transaction()?;
          for sql in &statements {
            tx.execute_batch(sql)?;
          }
          tx.commit()?;
          Ok(())
        })
        .await;

      if let Err(source) = result {
        return Err(Error::Ddl {
          step: step.to_string(),
          statement,
          applied,
          source,
        });
      }

      tracing::info!(%step, "schema step applied");
      applied.record(&step);
    }

    Ok(applied)
  }

  async fn row_counts(&self, tables: &[&str]) -> Result<Vec<(String, u64)>> {
    let tables: Vec<String> = tables.iter().map(|t| t.to_string()).collect();

    let counts = self
      .conn
      .call(move |conn| {
        let mut counts = Vec::with_capacity(tables.len());
        for table in tables {
          let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote(&table)),
            [],
            |row| row.get(0),
          )?;
          counts.push((table, u64::try_from(count).unwrap_or_default()));
        }
        Ok(counts)
      })
      .await?;

    Ok(counts)
  }
}

// ─── JobStore impl ───────────────────────────────────────────────────────────

impl JobStore for SqliteStore {
  async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
    let raws: Vec<RawJob> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(SELECT_JOBS)?;
        let rows = stmt
          .query_map([], RawJob::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawJob::into_job).collect())
  }

  async fn apply_reconcile(
    &self,
    actions: Vec<ReconcileAction>,
    batch_size: usize,
  ) -> Result<ReconcileSummary> {
    if batch_size == 0 {
      return Err(sitebook_core::Error::InvalidBatchSize(batch_size).into());
    }

    let summary = self
      .conn
      .call(move |conn| {
        let mut summary = ReconcileSummary::default();

        for batch in actions.chunks(batch_size) {
          let mut tx = conn.transaction()?;
          for action in batch {
            let savepoint = tx.savepoint()?;
            match apply_action(&savepoint, action) {
              Ok(()) => {
                savepoint.commit()?;
                summary.count(action);
              }
              Err(e) => {
                // Dropping the savepoint rolls the action back.
                drop(savepoint);
                tracing::warn!(
                  job_number = action.job_number(),
                  error = %e,
                  "skipping job that could not be written"
                );
                summary.skipped += 1;
              }
            }
          }
          tx.commit()?;
          tracing::debug!(
            actions = batch.len(),
            written = summary.created + summary.updated,
            "committed reconcile batch"
          );
        }

        Ok(summary)
      })
      .await?;

    Ok(summary)
  }
}
