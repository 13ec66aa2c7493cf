//! Human-readable and JSON reports written to stdout.

use std::io::{self, Write};

use serde::Serialize;
use sitebook_core::{
  pipeline::{ConvergenceRun, ImportRun},
  verify::{Outcome, VerificationReport},
};
use sitebook_store_sqlite::BackupOutcome;

// ─── JSON ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct MigrateReport<'a> {
  backup:  Option<&'a BackupOutcome>,
  outcome: Outcome,
  #[serde(flatten)]
  run:     &'a ConvergenceRun,
}

#[derive(Serialize)]
struct VerifyReport<'a> {
  outcome: Outcome,
  #[serde(flatten)]
  report:  &'a VerificationReport,
}

#[derive(Serialize)]
struct ImportReport<'a> {
  backup: Option<&'a BackupOutcome>,
  #[serde(flatten)]
  run:    &'a ImportRun,
}

fn write_json(out: &mut impl Write, value: &impl Serialize) -> io::Result<()> {
  serde_json::to_writer_pretty(&mut *out, value)?;
  writeln!(out)
}

pub fn migrate_json(
  out: &mut impl Write,
  run: &ConvergenceRun,
  backup: Option<&BackupOutcome>,
) -> io::Result<()> {
  write_json(out, &MigrateReport { backup, outcome: run.report.outcome(), run })
}

pub fn verify_json(out: &mut impl Write, report: &VerificationReport) -> io::Result<()> {
  write_json(out, &VerifyReport { outcome: report.outcome(), report })
}

pub fn import_json(
  out: &mut impl Write,
  run: &ImportRun,
  backup: Option<&BackupOutcome>,
) -> io::Result<()> {
  write_json(out, &ImportReport { backup, run })
}

// ─── Text ────────────────────────────────────────────────────────────────────

fn write_backup(out: &mut impl Write, backup: Option<&BackupOutcome>) -> io::Result<()> {
  match backup {
    None => writeln!(out, "Backup: skipped"),
    Some(BackupOutcome { error: Some(error), .. }) => {
      writeln!(out, "Backup: FAILED ({error})")
    }
    Some(BackupOutcome { path: Some(path), .. }) => {
      writeln!(out, "Backup: {}", path.display())
    }
    Some(_) => writeln!(out, "Backup: no existing store"),
  }
}

pub fn migrate_text(
  out: &mut impl Write,
  run: &ConvergenceRun,
  backup: Option<&BackupOutcome>,
) -> io::Result<()> {
  write_backup(out, backup)?;

  let verb = if run.dry_run { "Would apply" } else { "Applied" };
  let steps = run.diff.steps();
  if steps.is_empty() {
    writeln!(out, "Schema is up to date")?;
  } else {
    writeln!(out, "{verb} {} schema step(s):", steps.len())?;
    for step in &steps {
      writeln!(out, "  + {step}")?;
    }
  }
  for missing in &run.diff.unaddable_columns {
    writeln!(
      out,
      "  ! {}.{} cannot be added to an existing table",
      missing.table, missing.column.name
    )?;
  }

  writeln!(out)?;
  verify_text(out, &run.report)
}

pub fn verify_text(out: &mut impl Write, report: &VerificationReport) -> io::Result<()> {
  writeln!(out, "Verification:")?;
  for table in &report.tables {
    if !table.present {
      writeln!(out, "  x {} MISSING", table.name)?;
      continue;
    }
    let rows = report
      .row_counts
      .iter()
      .find(|(name, _)| *name == table.name)
      .map_or(0, |(_, count)| *count);
    writeln!(out, "  ok {} ({rows} rows)", table.name)?;
    for column in &table.missing_columns {
      writeln!(out, "    x {}.{column} MISSING", table.name)?;
    }
    for mismatch in &table.type_mismatches {
      writeln!(
        out,
        "    ~ {}.{} declared {}, expected {}",
        table.name, mismatch.column, mismatch.found, mismatch.expected
      )?;
    }
    for index in &table.missing_indexes {
      writeln!(out, "    ~ index {index} missing")?;
    }
  }

  let verdict = match report.outcome() {
    Outcome::Pass => "PASS",
    Outcome::Degraded => "DEGRADED (missing columns)",
    Outcome::Fatal => "FATAL (missing tables)",
  };
  writeln!(out, "Result: {verdict}")
}

pub fn import_text(
  out: &mut impl Write,
  run: &ImportRun,
  backup: Option<&BackupOutcome>,
) -> io::Result<()> {
  write_backup(out, backup)?;

  writeln!(out, "Candidates: {}", run.input)?;
  writeln!(out, "  excluded (no usable date or address): {}", run.excluded)?;
  writeln!(out, "  unique jobs after merge: {}", run.merged)?;
  if run.conflicts > 0 {
    writeln!(out, "  descriptive conflicts (first value kept): {}", run.conflicts)?;
  }

  let heading = if run.dry_run { "Would import" } else { "Imported" };
  let summary = &run.summary;
  writeln!(out, "{heading}:")?;
  writeln!(out, "  new jobs:  {}", summary.created)?;
  writeln!(out, "  updated:   {}", summary.updated)?;
  writeln!(out, "  unchanged: {}", summary.unchanged)?;
  if summary.skipped > 0 {
    writeln!(out, "  skipped:   {}", summary.skipped)?;
  }

  if !run.by_area.is_empty() {
    writeln!(out, "By area:")?;
    for (area, count) in &run.by_area {
      writeln!(out, "  {area}: {count}")?;
    }
  }
  Ok(())
}
