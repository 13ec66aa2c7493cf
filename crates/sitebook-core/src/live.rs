//! The introspected, current shape of a store.
//!
//! A [`LiveSchema`] is read fresh from the store on every run and never
//! cached. Name lookups are ASCII-case-insensitive to match SQLite's
//! identifier rules.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveColumn {
  pub name:      String,
  /// Declared type as written in the table's DDL; may be empty.
  pub decl_type: String,
  pub not_null:  bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveTable {
  pub name:    String,
  pub columns: Vec<LiveColumn>,
  pub indexes: Vec<String>,
}

impl LiveTable {
  pub fn column(&self, name: &str) -> Option<&LiveColumn> {
    self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
  }

  pub fn has_column(&self, name: &str) -> bool { self.column(name).is_some() }

  pub fn has_index(&self, name: &str) -> bool {
    self.indexes.iter().any(|i| i.eq_ignore_ascii_case(name))
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LiveSchema {
  pub tables: Vec<LiveTable>,
}

impl LiveSchema {
  pub fn table(&self, name: &str) -> Option<&LiveTable> {
    self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
  }

  pub fn has_table(&self, name: &str) -> bool { self.table(name).is_some() }
}
