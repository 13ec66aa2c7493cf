//! Verification pass: the acceptance oracle for convergence.
//!
//! Works only from a freshly introspected [`LiveSchema`], never from what the
//! apply step claims to have done, so it also catches states the engine did
//! not anticipate (hand-edited tables, columns with unexpected types).

use serde::Serialize;

use crate::{live::LiveSchema, schema::SchemaSpec};

/// A column whose declared type differs from the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeMismatch {
  pub column:   String,
  pub expected: String,
  pub found:    String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCheck {
  pub name:            String,
  pub present:         bool,
  pub missing_columns: Vec<String>,
  /// Informational; never affects the outcome.
  pub type_mismatches: Vec<TypeMismatch>,
  /// Informational; never affects the outcome.
  pub missing_indexes: Vec<String>,
}

/// Overall verdict of a verification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
  Pass,
  /// Every table exists but some columns are missing; base operations work.
  Degraded,
  /// At least one table is missing.
  Fatal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
  pub tables:     Vec<TableCheck>,
  /// Rows per present table, for display only.
  pub row_counts: Vec<(String, u64)>,
}

impl VerificationReport {
  pub fn with_row_counts(mut self, row_counts: Vec<(String, u64)>) -> Self {
    self.row_counts = row_counts;
    self
  }

  pub fn outcome(&self) -> Outcome {
    if self.tables.iter().any(|t| !t.present) {
      Outcome::Fatal
    } else if self.tables.iter().any(|t| !t.missing_columns.is_empty()) {
      Outcome::Degraded
    } else {
      Outcome::Pass
    }
  }

  pub fn missing_tables(&self) -> impl Iterator<Item = &str> {
    self.tables.iter().filter(|t| !t.present).map(|t| t.name.as_str())
  }

  /// `(table, column)` for every missing column of a present table.
  pub fn missing_columns(&self) -> impl Iterator<Item = (&str, &str)> {
    self.tables.iter().filter(|t| t.present).flat_map(|t| {
      t.missing_columns.iter().map(move |c| (t.name.as_str(), c.as_str()))
    })
  }

  pub fn present_tables(&self) -> impl Iterator<Item = &str> {
    self.tables.iter().filter(|t| t.present).map(|t| t.name.as_str())
  }
}

/// Check `live` against every table and column of `target`.
///
/// Row counts are left empty; the store fills them in with
/// [`VerificationReport::with_row_counts`].
pub fn verify(live: &LiveSchema, target: &SchemaSpec) -> VerificationReport {
  let tables = target
    .tables
    .iter()
    .map(|spec| {
      let Some(table) = live.table(spec.name) else {
        return TableCheck {
          name:            spec.name.to_owned(),
          present:         false,
          missing_columns: spec.columns.iter().map(|c| c.name.to_owned()).collect(),
          type_mismatches: vec![],
          missing_indexes: spec.indexes.iter().map(|i| i.name.to_owned()).collect(),
        };
      };

      let mut missing_columns = vec![];
      let mut type_mismatches = vec![];
      for column in spec.columns {
        match table.column(column.name) {
          None => missing_columns.push(column.name.to_owned()),
          Some(found) if !found.decl_type.eq_ignore_ascii_case(column.sql_type) => {
            type_mismatches.push(TypeMismatch {
              column:   column.name.to_owned(),
              expected: column.sql_type.to_owned(),
              found:    found.decl_type.clone(),
            });
          }
          Some(_) => {}
        }
      }

      let missing_indexes = spec
        .indexes
        .iter()
        .filter(|i| !table.has_index(i.name))
        .map(|i| i.name.to_owned())
        .collect();

      TableCheck {
        name: spec.name.to_owned(),
        present: true,
        missing_columns,
        type_mismatches,
        missing_indexes,
      }
    })
    .collect();

  VerificationReport { tables, row_counts: vec![] }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    diff::converge,
    live::{LiveColumn, LiveTable},
    schema::{BUSINESS_SCHEMA, TableSpec},
  };

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

  #[test]
  fn converged_store_passes() {
    let report = verify(&converged(), &BUSINESS_SCHEMA);
    assert_eq!(report.outcome(), Outcome::Pass);
    assert_eq!(report.tables.len(), 4);
    assert!(report.tables.iter().all(|t| t.type_mismatches.is_empty()));
  }

  #[test]
  fn missing_table_is_fatal() {
    let mut live = converged();
    live.tables.retain(|t| t.name != "vehicles");

    let report = verify(&live, &BUSINESS_SCHEMA);
    assert_eq!(report.outcome(), Outcome::Fatal);
    assert_eq!(report.missing_tables().collect::<Vec<_>>(), ["vehicles"]);
  }

  #[test]
  fn absent_table_columns_are_not_listed_as_missing_columns() {
    let mut live = converged();
    live.tables.retain(|t| t.name != "vehicles");
    live.tables[0].columns.retain(|c| c.name != "truck");

    let report = verify(&live, &BUSINESS_SCHEMA);
    assert_eq!(report.missing_columns().collect::<Vec<_>>(), [("jobs", "truck")]);
  }

  #[test]
  fn missing_column_is_degraded() {
    let mut live = converged();
    live.tables[0].columns.retain(|c| c.name != "linkedInquiryId");

    let report = verify(&live, &BUSINESS_SCHEMA);
    assert_eq!(report.outcome(), Outcome::Degraded);
    assert_eq!(
      report.missing_columns().collect::<Vec<_>>(),
      [("jobs", "linkedInquiryId")]
    );
  }

  #[test]
  fn type_mismatch_is_reported_but_does_not_fail() {
    let mut live = converged();
    let value = live.tables[0]
      .columns
      .iter_mut()
      .find(|c| c.name == "value")
      .unwrap();
    value.decl_type = "TEXT".into();

    // The diff never touches types ...
    assert!(converge(&live, &BUSINESS_SCHEMA).is_empty());
    // ... but verification still sees it.
    let report = verify(&live, &BUSINESS_SCHEMA);
    assert_eq!(report.outcome(), Outcome::Pass);
    assert_eq!(
      report.tables[0].type_mismatches,
      [TypeMismatch {
        column:   "value".into(),
        expected: "REAL".into(),
        found:    "TEXT".into(),
      }]
    );
  }

  #[test]
  fn missing_index_is_informational() {
    let mut live = converged();
    live.tables[0].indexes.clear();

    let report = verify(&live, &BUSINESS_SCHEMA);
    assert_eq!(report.outcome(), Outcome::Pass);
    assert_eq!(report.tables[0].missing_indexes.len(), 3);
  }

  #[test]
  fn row_counts_never_change_the_outcome() {
    let report = verify(&LiveSchema::default(), &BUSINESS_SCHEMA)
      .with_row_counts(vec![("jobs".into(), 12)]);
    assert_eq!(report.outcome(), Outcome::Fatal);
    assert_eq!(report.present_tables().count(), 0);
  }
}
