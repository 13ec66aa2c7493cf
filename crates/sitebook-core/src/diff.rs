//! Convergence planning: live schema + target schema → additive diff.
//!
//! The diff only ever adds structure. Drops, renames and type changes are
//! never planned; a column whose declared type differs from the target is
//! left alone (the verification pass reports it).

use std::fmt;

use serde::Serialize;

use crate::{
  live::{LiveSchema, LiveTable},
  schema::{ColumnSpec, IndexSpec, SchemaSpec, TableSpec},
};

/// A column scheduled to be added to an existing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnAddition {
  pub table:  &'static str,
  pub column: ColumnSpec,
}

/// The additive difference between a live store and its target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaDiff {
  pub tables_to_create:  Vec<TableSpec>,
  pub columns_to_add:    Vec<ColumnAddition>,
  /// Declared indexes missing from tables that already exist.
  pub indexes_to_create: Vec<IndexSpec>,
  /// Missing columns SQLite cannot add after the fact. Never applied; they
  /// surface again in the verification report.
  pub unaddable_columns: Vec<ColumnAddition>,
}

impl SchemaDiff {
  /// True when there is nothing to apply.
  pub fn is_empty(&self) -> bool {
    self.tables_to_create.is_empty()
      && self.columns_to_add.is_empty()
      && self.indexes_to_create.is_empty()
  }

  /// The steps to execute, in apply order: table creates (declaration
  /// order), then column adds, then index creates.
  pub fn steps(&self) -> Vec<SchemaStep> {
    self
      .tables_to_create
      .iter()
      .copied()
      .map(SchemaStep::CreateTable)
      .chain(self.columns_to_add.iter().copied().map(SchemaStep::AddColumn))
      .chain(self.indexes_to_create.iter().copied().map(SchemaStep::CreateIndex))
      .collect()
  }
}

/// One independently retry-safe unit of schema change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SchemaStep {
  /// Create a table together with its declared indexes.
  CreateTable(TableSpec),
  AddColumn(ColumnAddition),
  CreateIndex(IndexSpec),
}

impl fmt::Display for SchemaStep {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SchemaStep::CreateTable(t) => write!(f, "create table {}", t.name),
      SchemaStep::AddColumn(a) => {
        write!(f, "add column {}.{}", a.table, a.column.name)
      }
      SchemaStep::CreateIndex(i) => {
        write!(f, "create index {} on {}", i.name, i.table)
      }
    }
  }
}

/// What an apply run actually changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppliedChanges {
  pub tables_created:  Vec<String>,
  pub columns_added:   Vec<(String, String)>,
  pub indexes_created: Vec<String>,
}

impl AppliedChanges {
  pub fn record(&mut self, step: &SchemaStep) {
    match step {
      SchemaStep::CreateTable(t) => self.tables_created.push(t.name.to_owned()),
      SchemaStep::AddColumn(a) => self
        .columns_added
        .push((a.table.to_owned(), a.column.name.to_owned())),
      SchemaStep::CreateIndex(i) => self.indexes_created.push(i.name.to_owned()),
    }
  }

  pub fn len(&self) -> usize {
    self.tables_created.len() + self.columns_added.len() + self.indexes_created.len()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Compute the additive diff that brings `live` up to `target`.
pub fn converge(live: &LiveSchema, target: &SchemaSpec) -> SchemaDiff {
  let mut diff = SchemaDiff::default();

  for table in target.tables {
    let Some(live_table) = live.table(table.name) else {
      diff.tables_to_create.push(*table);
      continue;
    };

    let mut added: Vec<&str> = vec![];
    for column in table.columns {
      if live_table.has_column(column.name) {
        continue;
      }
      let addition = ColumnAddition { table: table.name, column: *column };
      if column.is_addable() {
        added.push(column.name);
        diff.columns_to_add.push(addition);
      } else {
        diff.unaddable_columns.push(addition);
      }
    }

    for index in table.indexes {
      if !live_table.has_index(index.name)
        && index_columns_available(index, live_table, &added)
      {
        diff.indexes_to_create.push(*index);
      }
    }
  }

  diff
}

fn index_columns_available(
  index: &IndexSpec,
  live_table: &LiveTable,
  added: &[&str],
) -> bool {
  index.columns.iter().all(|c| {
    live_table.has_column(c) || added.iter().any(|a| a.eq_ignore_ascii_case(c))
  })
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    live::{LiveColumn, LiveTable},
    schema::{BUSINESS_SCHEMA, JOBS_TABLE},
  };

  /// A live table that matches the target table exactly.
  fn live_copy(table: &TableSpec) -> LiveTable {
    LiveTable {
      name:    table.name.to_owned(),
      columns: table
        .columns
        .iter()
        .map(|c| LiveColumn {
          name:      c.name.to_owned(),
          decl_type: c.sql_type.to_owned(),
          not_null:  !c.nullable,
        })
        .collect(),
      indexes: table.indexes.iter().map(|i| i.name.to_owned()).collect(),
    }
  }

  fn converged() -> LiveSchema {
    LiveSchema { tables: BUSINESS_SCHEMA.tables.iter().map(live_copy).collect() }
  }

  /// Simulate applying the diff to an in-memory live schema.
  fn apply_in_memory(live: &mut LiveSchema, diff: &SchemaDiff) {
    for step in diff.steps() {
      match step {
        SchemaStep::CreateTable(t) => live.tables.push(live_copy(&t)),
        SchemaStep::AddColumn(a) => {
          let table = live
            .tables
            .iter_mut()
            .find(|t| t.name == a.table)
            .unwrap();
          table.columns.push(LiveColumn {
            name:      a.column.name.to_owned(),
            decl_type: a.column.sql_type.to_owned(),
            not_null:  false,
          });
        }
        SchemaStep::CreateIndex(i) => {
          let table = live.tables.iter_mut().find(|t| t.name == i.table).unwrap();
          table.indexes.push(i.name.to_owned());
        }
      }
    }
  }

  #[test]
  fn empty_store_schedules_four_creates() {
    let diff = converge(&LiveSchema::default(), &BUSINESS_SCHEMA);
    let names: Vec<_> = diff.tables_to_create.iter().map(|t| t.name).collect();
    assert_eq!(names, ["jobs", "invoices", "inquiries", "vehicles"]);
    assert!(diff.columns_to_add.is_empty());
    assert!(diff.indexes_to_create.is_empty());
  }

  #[test]
  fn converged_store_has_empty_diff() {
    let diff = converge(&converged(), &BUSINESS_SCHEMA);
    assert!(diff.is_empty(), "unexpected diff: {diff:?}");
    assert!(diff.unaddable_columns.is_empty());
  }

  #[test]
  fn missing_truck_column_is_the_only_change() {
    let mut live = converged();
    let jobs = live.tables.iter_mut().find(|t| t.name == JOBS_TABLE).unwrap();
    jobs.columns.retain(|c| c.name != "truck");

    let diff = converge(&live, &BUSINESS_SCHEMA);
    assert!(diff.tables_to_create.is_empty());
    assert_eq!(diff.columns_to_add.len(), 1);
    assert_eq!(diff.columns_to_add[0].table, "jobs");
    assert_eq!(diff.columns_to_add[0].column.name, "truck");
  }

  #[test]
  fn column_presence_is_case_insensitive() {
    let mut live = converged();
    for table in &mut live.tables {
      table.name = table.name.to_uppercase();
      for column in &mut table.columns {
        column.name = column.name.to_lowercase();
      }
    }
    assert!(converge(&live, &BUSINESS_SCHEMA).is_empty());
  }

  #[test]
  fn adds_follow_column_declaration_order() {
    let mut live = converged();
    let jobs = live.tables.iter_mut().find(|t| t.name == JOBS_TABLE).unwrap();
    jobs.columns.retain(|c| !matches!(c.name.as_str(), "updatedAt" | "truck" | "area"));

    let diff = converge(&live, &BUSINESS_SCHEMA);
    let names: Vec<_> = diff.columns_to_add.iter().map(|a| a.column.name).collect();
    assert_eq!(names, ["area", "truck", "updatedAt"]);
  }

  #[test]
  fn missing_primary_key_is_unaddable() {
    let mut live = converged();
    let jobs = live.tables.iter_mut().find(|t| t.name == JOBS_TABLE).unwrap();
    jobs.columns.retain(|c| c.name != "id");

    let diff = converge(&live, &BUSINESS_SCHEMA);
    assert!(diff.is_empty());
    assert_eq!(diff.unaddable_columns.len(), 1);
    assert_eq!(diff.unaddable_columns[0].column.name, "id");
  }

  #[test]
  fn missing_index_on_existing_table_is_scheduled_after_its_column() {
    let mut live = converged();
    let jobs = live.tables.iter_mut().find(|t| t.name == JOBS_TABLE).unwrap();
    jobs.columns.retain(|c| c.name != "area");
    jobs.indexes.clear();

    let diff = converge(&live, &BUSINESS_SCHEMA);
    let steps = diff.steps();
    assert_eq!(steps.len(), 4);
    assert!(matches!(steps[0], SchemaStep::AddColumn(a) if a.column.name == "area"));
    let indexes: Vec<_> = diff.indexes_to_create.iter().map(|i| i.name).collect();
    assert_eq!(indexes, ["idx_jobs_status", "idx_jobs_dates", "idx_jobs_area"]);
  }

  #[test]
  fn unknown_tables_and_columns_are_left_alone() {
    let mut live = converged();
    live.tables.push(LiveTable {
      name:    "change_log".into(),
      columns: vec![LiveColumn {
        name:      "id".into(),
        decl_type: "INTEGER".into(),
        not_null:  false,
      }],
      indexes: vec![],
    });
    live.tables[0].columns.push(LiveColumn {
      name:      "legacyField".into(),
      decl_type: "TEXT".into(),
      not_null:  false,
    });

    assert!(converge(&live, &BUSINESS_SCHEMA).is_empty());
  }

  #[test]
  fn applying_twice_is_a_no_op() {
    let mut live = converged();
    live.tables.retain(|t| t.name != "vehicles");
    live.tables[0].columns.retain(|c| c.name != "driver" && c.name != "notes");

    let first = converge(&live, &BUSINESS_SCHEMA);
    assert!(!first.is_empty());
    apply_in_memory(&mut live, &first);
    let snapshot = live.clone();

    let second = converge(&live, &BUSINESS_SCHEMA);
    assert!(second.is_empty(), "second diff not empty: {second:?}");
    apply_in_memory(&mut live, &second);
    assert_eq!(live, snapshot);
  }

  #[test]
  fn applied_changes_record_every_step_kind() {
    let diff = converge(&LiveSchema::default(), &BUSINESS_SCHEMA);
    let mut applied = AppliedChanges::default();
    for step in diff.steps() {
      applied.record(&step);
    }
    assert_eq!(applied.tables_created.len(), 4);
    assert_eq!(applied.len(), 4);
    assert_eq!(
      SchemaStep::CreateTable(BUSINESS_SCHEMA.tables[0]).to_string(),
      "create table jobs"
    );
  }
}
