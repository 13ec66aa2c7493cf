//! SQLite DDL rendering for the declarative schema.
//!
//! Every statement is idempotent (`IF NOT EXISTS`) except `ADD COLUMN`, which
//! is only ever planned for a column introspection found missing.

use sitebook_core::{
  diff::{ColumnAddition, SchemaStep},
  schema::{ColumnKey, ColumnSpec, DefaultExpr, IndexSpec, TableSpec},
};

/// Quote an identifier for SQLite, preserving its case.
pub fn quote(ident: &str) -> String { format!("\"{}\"", ident.replace('"', "\"\"")) }

fn default_sql(default: DefaultExpr) -> &'static str {
  match default {
    DefaultExpr::Literal(sql) => sql,
    DefaultExpr::CurrentTimestamp => "CURRENT_TIMESTAMP",
  }
}

/// Column definition as used inside `CREATE TABLE`.
fn column_def(column: &ColumnSpec) -> String {
  let mut def = format!("{} {}", quote(column.name), column.sql_type);
  match column.key {
    ColumnKey::PrimaryKey => def.push_str(" PRIMARY KEY AUTOINCREMENT"),
    ColumnKey::Unique => def.push_str(" UNIQUE"),
    ColumnKey::None => {}
  }
  if !column.nullable && column.key != ColumnKey::PrimaryKey {
    def.push_str(" NOT NULL");
  }
  if let Some(default) = column.default {
    def.push_str(" DEFAULT ");
    def.push_str(default_sql(default));
  }
  def
}

/// Column definition as accepted by `ALTER TABLE ... ADD COLUMN`.
///
/// SQLite rejects UNIQUE, non-constant defaults and NOT NULL without a
/// default on added columns, so those parts are left out.
fn added_column_def(column: &ColumnSpec) -> String {
  let mut def = format!("{} {}", quote(column.name), column.sql_type);
  match column.default {
    Some(default @ DefaultExpr::Literal(_)) => {
      if !column.nullable {
        def.push_str(" NOT NULL");
      }
      def.push_str(" DEFAULT ");
      def.push_str(default_sql(default));
    }
    Some(DefaultExpr::CurrentTimestamp) | None => {}
  }
  def
}

pub fn create_table_sql(table: &TableSpec) -> String {
  let columns: Vec<String> = table.columns.iter().map(column_def).collect();
  format!(
    "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
    quote(table.name),
    columns.join(",\n    ")
  )
}

pub fn add_column_sql(addition: &ColumnAddition) -> String {
  format!(
    "ALTER TABLE {} ADD COLUMN {}",
    quote(addition.table),
    added_column_def(&addition.column)
  )
}

pub fn create_index_sql(index: &IndexSpec) -> String {
  let columns: Vec<String> = index.columns.iter().map(|c| quote(c)).collect();
  format!(
    "CREATE {}INDEX IF NOT EXISTS {} ON {}({})",
    if index.unique { "UNIQUE " } else { "" },
    quote(index.name),
    quote(index.table),
    columns.join(", ")
  )
}

/// The statements executing one step, all inside one transaction.
pub fn step_statements(step: &SchemaStep) -> Vec<String> {
  match step {
    SchemaStep::CreateTable(table) => std::iter::once(create_table_sql(table))
      .chain(table.indexes.iter().map(create_index_sql))
      .collect(),
    SchemaStep::AddColumn(addition) => vec![add_column_sql(addition)],
    SchemaStep::CreateIndex(index) => vec![create_index_sql(index)],
  }
}

#[cfg(test)]
mod tests {
  use sitebook_core::schema::{BUSINESS_SCHEMA, JOBS_TABLE};

  use super::*;

  fn jobs() -> &'static TableSpec { BUSINESS_SCHEMA.table(JOBS_TABLE).unwrap() }

  fn addition(name: &str) -> ColumnAddition {
    let table = jobs();
    ColumnAddition { table: table.name, column: *table.column(name).unwrap() }
  }

  #[test]
  fn create_table_keeps_every_constraint() {
    let sql = create_table_sql(jobs());
    assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"jobs\" ("));
    assert!(sql.contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT,"));
    assert!(sql.contains("\"jobNumber\" TEXT UNIQUE NOT NULL,"));
    assert!(sql.contains("\"status\" TEXT DEFAULT 'pending',"));
    assert!(sql.contains("\"updatedAt\" TIMESTAMP DEFAULT CURRENT_TIMESTAMP\n"));
  }

  #[test]
  fn added_columns_drop_what_sqlite_refuses() {
    assert_eq!(
      add_column_sql(&addition("jobNumber")),
      "ALTER TABLE \"jobs\" ADD COLUMN \"jobNumber\" TEXT"
    );
    assert_eq!(
      add_column_sql(&addition("createdAt")),
      "ALTER TABLE \"jobs\" ADD COLUMN \"createdAt\" TIMESTAMP"
    );
    assert_eq!(
      add_column_sql(&addition("status")),
      "ALTER TABLE \"jobs\" ADD COLUMN \"status\" TEXT DEFAULT 'pending'"
    );
  }

  #[test]
  fn create_table_step_includes_its_indexes() {
    let statements = step_statements(&SchemaStep::CreateTable(*jobs()));
    assert_eq!(statements.len(), 4);
    assert_eq!(
      statements[2],
      "CREATE INDEX IF NOT EXISTS \"idx_jobs_dates\" ON \"jobs\"(\"startDate\", \"endDate\")"
    );
  }

  #[test]
  fn identifiers_are_quoted() {
    assert_eq!(quote("odd\"name"), "\"odd\"\"name\"");
  }
}
