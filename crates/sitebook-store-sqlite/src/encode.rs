//! Decoding of `jobs` rows and the SQL behind job writes.
//!
//! Timestamps are written by SQLite itself (`CURRENT_TIMESTAMP`, i.e.
//! `YYYY-MM-DD HH:MM:SS` in UTC). Hand-edited rows may carry other formats,
//! or values of the wrong storage class in any column but `id`; those decode
//! to `None` rather than failing the whole read.

use chrono::{DateTime, NaiveDateTime};
use rusqlite::types::{Value, ValueRef};
use sitebook_core::job::{JobPatch, JobRecord, NewJob};

use crate::schema::quote;

const SQLITE_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";
const ISO_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S%.f";

// ─── Timestamps ──────────────────────────────────────────────────────────────

pub fn decode_timestamp(s: &str) -> Option<NaiveDateTime> {
  let s = s.trim();
  NaiveDateTime::parse_from_str(s, SQLITE_TIMESTAMP)
    .or_else(|_| NaiveDateTime::parse_from_str(s, ISO_TIMESTAMP))
    .ok()
    .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
}

// ─── Lenient columns ─────────────────────────────────────────────────────────

fn warn_unreadable(id: i64, column: &str, value: ValueRef<'_>) {
  tracing::warn!(id, column, kind = %value.data_type(), "ignoring unreadable job field");
}

fn text(row: &rusqlite::Row<'_>, id: i64, idx: usize) -> rusqlite::Result<Option<String>> {
  Ok(match row.get_ref(idx)? {
    ValueRef::Null => None,
    ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
    ValueRef::Integer(i) => Some(i.to_string()),
    ValueRef::Real(f) => Some(f.to_string()),
    blob @ ValueRef::Blob(_) => {
      warn_unreadable(id, row.as_ref().column_name(idx)?, blob);
      None
    }
  })
}

fn real(row: &rusqlite::Row<'_>, id: i64, idx: usize) -> rusqlite::Result<Option<f64>> {
  let value = row.get_ref(idx)?;
  let decoded = match value {
    ValueRef::Null => return Ok(None),
    ValueRef::Real(f) => Some(f),
    ValueRef::Integer(i) => Some(i as f64),
    ValueRef::Text(t) => std::str::from_utf8(t).ok().and_then(|t| t.trim().parse().ok()),
    ValueRef::Blob(_) => None,
  };
  if decoded.is_none() {
    warn_unreadable(id, row.as_ref().column_name(idx)?, value);
  }
  Ok(decoded)
}

fn integer(row: &rusqlite::Row<'_>, id: i64, idx: usize) -> rusqlite::Result<Option<i64>> {
  let value = row.get_ref(idx)?;
  let decoded = match value {
    ValueRef::Null => return Ok(None),
    ValueRef::Integer(i) => Some(i),
    ValueRef::Text(t) => std::str::from_utf8(t).ok().and_then(|t| t.trim().parse().ok()),
    ValueRef::Real(_) | ValueRef::Blob(_) => None,
  };
  if decoded.is_none() {
    warn_unreadable(id, row.as_ref().column_name(idx)?, value);
  }
  Ok(decoded)
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const SELECT_JOBS: &str = "SELECT id, jobNumber, clientName, location, area,
   jobType, truck, driver, startDate, endDate, status, value,
   linkedInvoiceId, linkedInquiryId, notes, createdAt, updatedAt
 FROM jobs ORDER BY id";

/// Values read directly from a `jobs` row.
pub struct RawJob {
  pub id:                i64,
  pub job_number:        Option<String>,
  pub client_name:       Option<String>,
  pub location:          Option<String>,
  pub area:              Option<String>,
  pub job_type:          Option<String>,
  pub truck:             Option<String>,
  pub driver:            Option<String>,
  pub start_date:        Option<String>,
  pub end_date:          Option<String>,
  pub status:            Option<String>,
  pub value:             Option<f64>,
  pub linked_invoice_id: Option<i64>,
  pub linked_inquiry_id: Option<i64>,
  pub notes:             Option<String>,
  pub created_at:        Option<String>,
  pub updated_at:        Option<String>,
}

impl RawJob {
  /// Read a row selected with [`SELECT_JOBS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    let id = row.get(0)?;
    Ok(Self {
      id,
      job_number:        text(row, id, 1)?,
      client_name:       text(row, id, 2)?,
      location:          text(row, id, 3)?,
      area:              text(row, id, 4)?,
      job_type:          text(row, id, 5)?,
      truck:             text(row, id, 6)?,
      driver:            text(row, id, 7)?,
      start_date:        text(row, id, 8)?,
      end_date:          text(row, id, 9)?,
      status:            text(row, id, 10)?,
      value:             real(row, id, 11)?,
      linked_invoice_id: integer(row, id, 12)?,
      linked_inquiry_id: integer(row, id, 13)?,
      notes:             text(row, id, 14)?,
      created_at:        text(row, id, 15)?,
      updated_at:        text(row, id, 16)?,
    })
  }

  pub fn into_job(self) -> JobRecord {
    let created_at = self.created_at.as_deref().and_then(decode_timestamp);
    let updated_at = self.updated_at.as_deref().and_then(decode_timestamp);

    JobRecord {
      id: self.id,
      job_number: self.job_number.unwrap_or_default(),
      client_name: self.client_name.unwrap_or_default(),
      location: self.location.unwrap_or_default(),
      area: self.area,
      job_type: self.job_type,
      truck: self.truck,
      driver: self.driver,
      start_date: self.start_date,
      end_date: self.end_date,
      status: self.status,
      value: self.value,
      linked_invoice_id: self.linked_invoice_id,
      linked_inquiry_id: self.linked_inquiry_id,
      notes: self.notes,
      created_at,
      updated_at,
    }
  }
}

// ─── Writes ──────────────────────────────────────────────────────────────────

pub fn insert_job(conn: &rusqlite::Connection, job: &NewJob) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO jobs (
       jobNumber, clientName, location, area, jobType,
       truck, driver, startDate, endDate, status, value, notes,
       createdAt, updatedAt
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
       CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
    rusqlite::params![
      job.job_number,
      job.client_name,
      job.location,
      job.area,
      job.job_type,
      job.truck,
      job.driver,
      job.start_date,
      job.end_date,
      job.status.as_str(),
      job.value,
      job.notes,
    ],
  )?;
  Ok(())
}

/// `SET` assignments and bound values for the fields a patch writes.
fn patch_assignments(patch: &JobPatch) -> Vec<(&'static str, Value)> {
  let text = |v: &Option<String>| v.clone().map(Value::Text);
  [
    ("area", text(&patch.area)),
    ("jobType", text(&patch.job_type)),
    ("truck", text(&patch.truck)),
    ("driver", text(&patch.driver)),
    ("endDate", text(&patch.end_date)),
    ("value", patch.value.map(Value::Real)),
    ("status", patch.status.map(|s| Value::Text(s.as_str().to_owned()))),
    ("notes", text(&patch.notes)),
  ]
  .into_iter()
  .filter_map(|(column, value)| Some((column, value?)))
  .collect()
}

/// Apply a patch to the job with `job_number`, refreshing `updatedAt`.
///
/// Fails with [`rusqlite::Error::QueryReturnedNoRows`] when no such job
/// exists.
pub fn update_job(
  conn: &rusqlite::Connection,
  job_number: &str,
  patch: &JobPatch,
) -> rusqlite::Result<()> {
  let assignments = patch_assignments(patch);

  let mut set: Vec<String> = assignments
    .iter()
    .enumerate()
    .map(|(i, (column, _))| format!("{} = ?{}", quote(column), i + 1))
    .collect();
  set.push("\"updatedAt\" = CURRENT_TIMESTAMP".to_owned());

  let sql = format!(
    "UPDATE jobs SET {} WHERE jobNumber = ?{}",
    set.join(", "),
    assignments.len() + 1
  );

  let params = assignments
    .into_iter()
    .map(|(_, value)| value)
    .chain(std::iter::once(Value::Text(job_number.to_owned())));

  match conn.execute(&sql, rusqlite::params_from_iter(params))? {
    0 => Err(rusqlite::Error::QueryReturnedNoRows),
    _ => Ok(()),
  }
}
