//! Declarative description of the store's target shape.
//!
//! [`BUSINESS_SCHEMA`] is the single source of truth for every table, column
//! and index the rest of the system depends on. It is consulted by the
//! convergence engine, the verification pass and the tests; nothing else
//! carries its own list of expected columns.

use serde::Serialize;

// ─── Column ──────────────────────────────────────────────────────────────────

/// Default value expression attached to a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "sql", rename_all = "snake_case")]
pub enum DefaultExpr {
  /// A constant SQL literal, e.g. `1` or `'pending'`.
  Literal(&'static str),
  /// The time the row was written. Not a constant, so SQLite refuses it on
  /// `ALTER TABLE ... ADD COLUMN`.
  CurrentTimestamp,
}

impl DefaultExpr {
  pub fn is_constant(self) -> bool { matches!(self, Self::Literal(_)) }
}

/// Key constraint carried by a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKey {
  #[default]
  None,
  /// `INTEGER PRIMARY KEY AUTOINCREMENT` row id.
  PrimaryKey,
  Unique,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
  pub name:     &'static str,
  pub sql_type: &'static str,
  pub default:  Option<DefaultExpr>,
  pub nullable: bool,
  pub key:      ColumnKey,
}

impl ColumnSpec {
  /// A nullable column without default or key.
  pub const fn new(name: &'static str, sql_type: &'static str) -> Self {
    Self { name, sql_type, default: None, nullable: true, key: ColumnKey::None }
  }

  pub const fn not_null(self) -> Self { Self { nullable: false, ..self } }

  pub const fn with_default(self, default: DefaultExpr) -> Self {
    Self { default: Some(default), ..self }
  }

  pub const fn primary_key(self) -> Self {
    Self { key: ColumnKey::PrimaryKey, nullable: false, ..self }
  }

  pub const fn unique(self) -> Self { Self { key: ColumnKey::Unique, ..self } }

  /// Whether the column can be added to an existing table at all.
  ///
  /// SQLite cannot add a primary key after the table exists.
  pub fn is_addable(&self) -> bool { self.key != ColumnKey::PrimaryKey }
}

// ─── Index ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexSpec {
  pub name:    &'static str,
  pub table:   &'static str,
  pub columns: &'static [&'static str],
  pub unique:  bool,
}

// ─── Table / schema ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableSpec {
  pub name:    &'static str,
  pub columns: &'static [ColumnSpec],
  pub indexes: &'static [IndexSpec],
}

impl TableSpec {
  /// Look up a column by name; SQLite identifiers are case-insensitive.
  pub fn column(&self, name: &str) -> Option<&'static ColumnSpec> {
    self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
  }
}

/// Ordered set of tables. Declaration order is also creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchemaSpec {
  pub tables: &'static [TableSpec],
}

impl SchemaSpec {
  pub fn table(&self, name: &str) -> Option<&'static TableSpec> {
    self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
  }

  pub fn table_names(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.tables.iter().map(|t| t.name)
  }
}

// ─── The business schema ─────────────────────────────────────────────────────

pub const JOBS_TABLE: &str = "jobs";
pub const INVOICES_TABLE: &str = "invoices";
pub const INQUIRIES_TABLE: &str = "inquiries";
pub const VEHICLES_TABLE: &str = "vehicles";

const fn text(name: &'static str) -> ColumnSpec { ColumnSpec::new(name, "TEXT") }

const fn integer(name: &'static str) -> ColumnSpec {
  ColumnSpec::new(name, "INTEGER")
}

const fn real(name: &'static str) -> ColumnSpec { ColumnSpec::new(name, "REAL") }

const fn flag(name: &'static str, default: &'static str) -> ColumnSpec {
  ColumnSpec::new(name, "BOOLEAN").with_default(DefaultExpr::Literal(default))
}

const fn timestamp(name: &'static str) -> ColumnSpec {
  ColumnSpec::new(name, "TIMESTAMP").with_default(DefaultExpr::CurrentTimestamp)
}

const ID: ColumnSpec = integer("id").primary_key();

const JOBS: TableSpec = TableSpec {
  name:    JOBS_TABLE,
  columns: &[
    ID,
    text("jobNumber").unique().not_null(),
    text("clientName").not_null(),
    text("location").not_null(),
    text("area"),
    text("jobType"),
    text("truck"),
    text("driver"),
    text("startDate"),
    text("endDate"),
    text("status").with_default(DefaultExpr::Literal("'pending'")),
    real("value"),
    integer("linkedInvoiceId"),
    integer("linkedInquiryId"),
    text("notes"),
    timestamp("createdAt"),
    timestamp("updatedAt"),
  ],
  indexes: &[
    IndexSpec {
      name:    "idx_jobs_status",
      table:   JOBS_TABLE,
      columns: &["status"],
      unique:  false,
    },
    IndexSpec {
      name:    "idx_jobs_dates",
      table:   JOBS_TABLE,
      columns: &["startDate", "endDate"],
      unique:  false,
    },
    IndexSpec {
      name:    "idx_jobs_area",
      table:   JOBS_TABLE,
      columns: &["area"],
      unique:  false,
    },
  ],
};

const INVOICES: TableSpec = TableSpec {
  name:    INVOICES_TABLE,
  columns: &[
    ID,
    text("invoiceNumber").unique().not_null(),
    text("clientName").not_null(),
    text("clientAddress"),
    text("clientPhone"),
    text("date").not_null(),
    text("status").with_default(DefaultExpr::Literal("'pending'")),
    text("items").not_null(),
    real("subtotal"),
    real("vat"),
    flag("vatApplied", "1"),
    real("total"),
    text("notes"),
    integer("linkedJobId"),
    timestamp("createdAt"),
  ],
  indexes: &[],
};

const INQUIRIES: TableSpec = TableSpec {
  name:    INQUIRIES_TABLE,
  columns: &[
    ID,
    text("name").not_null(),
    text("phone").not_null(),
    text("email"),
    text("location").not_null(),
    text("status").with_default(DefaultExpr::Literal("'new'")),
    text("date").not_null(),
    real("quoteAmount"),
    text("notes"),
    integer("linkedJobId"),
    timestamp("createdAt"),
  ],
  indexes: &[],
};

const VEHICLES: TableSpec = TableSpec {
  name:    VEHICLES_TABLE,
  columns: &[
    ID,
    text("registration").unique().not_null(),
    text("vehicleType").with_default(DefaultExpr::Literal("'car'")),
    text("ownerName").not_null(),
    text("insuranceName").not_null(),
    text("motDue"),
    text("taxDue").not_null(),
    text("tachoDue"),
    text("insuranceDue").not_null(),
    text("maintenanceDue"),
    flag("motActioned", "0"),
    flag("taxActioned", "0"),
    flag("tachoActioned", "0"),
    flag("insuranceActioned", "0"),
    flag("maintenanceActioned", "0"),
    timestamp("createdAt"),
  ],
  indexes: &[],
};

/// The target shape of the business store.
pub const BUSINESS_SCHEMA: SchemaSpec = SchemaSpec {
  tables: &[JOBS, INVOICES, INQUIRIES, VEHICLES],
};

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use super::*;

  #[test]
  fn business_schema_has_the_four_tables_in_order() {
    let names: Vec<_> = BUSINESS_SCHEMA.table_names().collect();
    assert_eq!(names, ["jobs", "invoices", "inquiries", "vehicles"]);
  }

  #[test]
  fn column_names_are_unique_per_table() {
    for table in BUSINESS_SCHEMA.tables {
      let mut seen = HashSet::new();
      for column in table.columns {
        assert!(
          seen.insert(column.name.to_ascii_lowercase()),
          "duplicate column {}.{}",
          table.name,
          column.name
        );
      }
    }
  }

  #[test]
  fn every_index_refers_to_declared_columns_of_its_table() {
    for table in BUSINESS_SCHEMA.tables {
      for index in table.indexes {
        assert_eq!(index.table, table.name);
        for column in index.columns {
          assert!(table.column(column).is_some(), "{}: {column}", index.name);
        }
      }
    }
  }

  #[test]
  fn jobs_table_carries_the_reconciled_fields() {
    let jobs = BUSINESS_SCHEMA.table("JOBS").unwrap();
    for name in [
      "jobNumber", "clientName", "location", "area", "jobType", "truck",
      "driver", "startDate", "endDate", "status", "value", "linkedInvoiceId",
      "linkedInquiryId", "notes", "createdAt", "updatedAt",
    ] {
      assert!(jobs.column(name).is_some(), "jobs.{name} missing");
    }
    assert_eq!(
      jobs.column("status").unwrap().default,
      Some(DefaultExpr::Literal("'pending'"))
    );
  }

  #[test]
  fn primary_keys_are_not_addable() {
    let jobs = BUSINESS_SCHEMA.table(JOBS_TABLE).unwrap();
    assert!(!jobs.column("id").unwrap().is_addable());
    assert!(jobs.column("jobNumber").unwrap().is_addable());
  }
}
