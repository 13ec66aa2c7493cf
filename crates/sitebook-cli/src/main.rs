//! `sitebook`: schema convergence and job import for the business store.
//!
//! # Usage
//!
//! ```
//! sitebook migrate --dry-run
//! sitebook verify --store ~/scaffolding_business.db
//! sitebook import jobs-2024.json jobs-2025.json --batch-size 50
//! ```
//!
//! Exit status: 0 when the store verifies (fully or degraded), 2 when a
//! table is missing, 1 on any other error.

mod report;
mod settings;

use std::{
  io::{self, Write as _},
  path::{Path, PathBuf},
  process::ExitCode,
};

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use settings::Settings;
use sitebook_core::{
  candidate::CandidateJob,
  pipeline::{run_convergence, run_import, run_verify},
  schema::BUSINESS_SCHEMA,
  verify::Outcome,
};
use sitebook_store_sqlite::{BackupOutcome, SqliteStore, backup};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "sitebook", author, version, about = "Business store migrations and job import")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, global = true, default_value = "sitebook.toml")]
  config: PathBuf,

  /// Store location; overrides `store_path` from the configuration.
  #[arg(long, global = true, value_name = "PATH")]
  store: Option<PathBuf>,

  /// Print the report as JSON.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Bring the store up to the current schema, then verify it.
  Migrate {
    /// Show what would change without touching the store.
    #[arg(long)]
    dry_run:        bool,
    /// Do not copy the store aside first.
    #[arg(long)]
    no_backup:      bool,
    /// Abort when the backup cannot be made.
    #[arg(long, conflicts_with = "no_backup")]
    require_backup: bool,
  },
  /// Check the store against the current schema without changing it.
  Verify,
  /// Merge candidate jobs from JSON files and upsert them into the store.
  Import {
    /// JSON arrays of candidate jobs, merged in the order given.
    #[arg(required = true, value_name = "FILE")]
    files:          Vec<PathBuf>,
    /// Plan the import without writing.
    #[arg(long)]
    dry_run:        bool,
    /// Do not copy the store aside first.
    #[arg(long)]
    no_backup:      bool,
    /// Abort when the backup cannot be made.
    #[arg(long, conflicts_with = "no_backup")]
    require_backup: bool,
    /// Actions committed per transaction; overrides `import_batch_size`.
    #[arg(long, value_name = "N")]
    batch_size:     Option<usize>,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  match run(cli).await {
    Ok(outcome) => exit_code(outcome),
    Err(e) => {
      tracing::error!("{e:#}");
      ExitCode::from(1)
    }
  }
}

fn exit_code(outcome: Outcome) -> ExitCode {
  match outcome {
    Outcome::Pass | Outcome::Degraded => ExitCode::SUCCESS,
    Outcome::Fatal => ExitCode::from(2),
  }
}

async fn run(cli: Cli) -> anyhow::Result<Outcome> {
  let mut settings = Settings::load(&cli.config)?;
  if let Some(store) = cli.store {
    settings.store_path = store;
  }
  let store_path = settings.store_path();
  let mut stdout = io::stdout().lock();

  match cli.command {
    Command::Migrate { dry_run, no_backup, require_backup } => {
      let backup = if dry_run || no_backup || !settings.backup {
        None
      } else {
        Some(guard(&store_path, require_backup || settings.require_backup).await?)
      };

      // A dry run must not leave an empty store file behind.
      let store = if dry_run && !store_path.exists() {
        SqliteStore::open_in_memory().await?
      } else {
        open(&store_path).await?
      };
      let run = run_convergence(&store, &BUSINESS_SCHEMA, dry_run)
        .await
        .context("schema convergence failed")?;

      if cli.json {
        report::migrate_json(&mut stdout, &run, backup.as_ref())?;
      } else {
        report::migrate_text(&mut stdout, &run, backup.as_ref())?;
      }
      Ok(run.report.outcome())
    }

    Command::Verify => {
      ensure_exists(&store_path)?;
      let store = open(&store_path).await?;
      let verification = run_verify(&store, &BUSINESS_SCHEMA)
        .await
        .context("verification failed")?;

      if cli.json {
        report::verify_json(&mut stdout, &verification)?;
      } else {
        report::verify_text(&mut stdout, &verification)?;
      }
      Ok(verification.outcome())
    }

    Command::Import { files, dry_run, no_backup, require_backup, batch_size } => {
      let batch_size = batch_size.unwrap_or(settings.import_batch_size);
      if batch_size == 0 {
        bail!("--batch-size must be at least 1");
      }
      ensure_exists(&store_path)?;
      let candidates = load_candidates(&files).await?;

      let backup = if dry_run || no_backup || !settings.backup {
        None
      } else {
        Some(guard(&store_path, require_backup || settings.require_backup).await?)
      };

      let store = open(&store_path).await?;
      let run = run_import(&store, &BUSINESS_SCHEMA, candidates, batch_size, dry_run)
        .await
        .context("import failed")?;

      if cli.json {
        report::import_json(&mut stdout, &run, backup.as_ref())?;
      } else {
        report::import_text(&mut stdout, &run, backup.as_ref())?;
      }
      stdout.flush()?;
      Ok(Outcome::Pass)
    }
  }
}

/// Back the store up; a failure only stops the run when `required`.
async fn guard(store_path: &Path, required: bool) -> anyhow::Result<BackupOutcome> {
  let outcome = backup(store_path).await;
  if required && let Some(error) = &outcome.error {
    bail!("backup required but failed: {error}");
  }
  Ok(outcome)
}

async fn open(store_path: &Path) -> anyhow::Result<SqliteStore> {
  SqliteStore::open(store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))
}

/// Opening a missing path would create an empty store, which only `migrate`
/// should do.
fn ensure_exists(store_path: &Path) -> anyhow::Result<()> {
  if !store_path.exists() {
    bail!("no store at {store_path:?}; run `sitebook migrate` first");
  }
  Ok(())
}

async fn load_candidates(files: &[PathBuf]) -> anyhow::Result<Vec<CandidateJob>> {
  let mut candidates = vec![];
  for file in files {
    let text = tokio::fs::read_to_string(file)
      .await
      .with_context(|| format!("failed to read {file:?}"))?;
    let batch: Vec<CandidateJob> = serde_json::from_str(&text)
      .with_context(|| format!("{file:?} is not a JSON array of candidate jobs"))?;
    tracing::debug!(file = %file.display(), candidates = batch.len(), "loaded candidates");
    candidates.extend(batch);
  }
  Ok(candidates)
}
