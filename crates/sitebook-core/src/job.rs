//! Job records as stored, inserted and patched.

use std::{fmt, str::FromStr};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::Error;

// ─── Status ──────────────────────────────────────────────────────────────────

/// The narrowed job status vocabulary.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
  #[default]
  Pending,
  Active,
  Completed,
}

impl JobStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      JobStatus::Pending => "pending",
      JobStatus::Active => "active",
      JobStatus::Completed => "completed",
    }
  }

  pub fn is_pending(self) -> bool { self == JobStatus::Pending }
}

impl fmt::Display for JobStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for JobStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "pending" => Ok(JobStatus::Pending),
      "active" => Ok(JobStatus::Active),
      "completed" => Ok(JobStatus::Completed),
      _ => Err(Error::InvalidStatus(s.to_owned())),
    }
  }
}

// ─── Stored record ───────────────────────────────────────────────────────────

/// A row of the `jobs` table.
///
/// Text columns are kept as stored; hand-edited stores may hold values outside
/// the narrowed vocabularies (e.g. a `cancelled` status).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
  pub id:                i64,
  pub job_number:        String,
  pub client_name:       String,
  pub location:          String,
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
  pub created_at:        Option<NaiveDateTime>,
  pub updated_at:        Option<NaiveDateTime>,
}

impl JobRecord {
  /// A missing or blank status counts as pending, matching the column
  /// default.
  pub fn is_pending(&self) -> bool {
    match present(&self.status) {
      None => true,
      Some(s) => s.eq_ignore_ascii_case(JobStatus::Pending.as_str()),
    }
  }
}

/// A job about to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewJob {
  pub job_number:  String,
  pub client_name: String,
  pub location:    String,
  pub area:        Option<String>,
  pub job_type:    Option<String>,
  pub truck:       Option<String>,
  pub driver:      Option<String>,
  pub start_date:  String,
  pub end_date:    Option<String>,
  pub status:      JobStatus,
  pub value:       f64,
  pub notes:       Option<String>,
}

/// Partial update of a stored job. `None` means "leave as stored".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobPatch {
  pub area:     Option<String>,
  pub job_type: Option<String>,
  pub truck:    Option<String>,
  pub driver:   Option<String>,
  pub end_date: Option<String>,
  pub value:    Option<f64>,
  pub status:   Option<JobStatus>,
  pub notes:    Option<String>,
}

impl JobPatch {
  pub fn is_empty(&self) -> bool { self.changed_fields().is_empty() }

  /// Names of the fields this patch writes.
  pub fn changed_fields(&self) -> Vec<&'static str> {
    let mut fields = vec![];
    if self.area.is_some() {
      fields.push("area");
    }
    if self.job_type.is_some() {
      fields.push("jobType");
    }
    if self.truck.is_some() {
      fields.push("truck");
    }
    if self.driver.is_some() {
      fields.push("driver");
    }
    if self.end_date.is_some() {
      fields.push("endDate");
    }
    if self.value.is_some() {
      fields.push("value");
    }
    if self.status.is_some() {
      fields.push("status");
    }
    if self.notes.is_some() {
      fields.push("notes");
    }
    fields
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// The trimmed value, or `None` when absent or blank.
pub fn present(value: &Option<String>) -> Option<&str> {
  value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Round to whole pence; non-finite and negative amounts become zero.
pub fn round_currency(value: f64) -> f64 {
  if value.is_finite() && value > 0.0 {
    (value * 100.0).round() / 100.0
  } else {
    0.0
  }
}
