//! Candidate job records handed over by the source parsers.
//!
//! Parsers are responsible for narrowing free text: `date` must already be an
//! ISO `YYYY-MM-DD` string (or null), `status` one of pending / active /
//! completed, and `price` a number defaulting to zero.

use serde::{Deserialize, Serialize};

use crate::job::{JobStatus, present};

/// Characters of the address kept in a generated client name.
const CLIENT_NAME_ADDRESS_CHARS: usize = 40;

/// A loosely-populated job extracted from one source row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CandidateJob {
  pub date:           Option<String>,
  pub address:        String,
  pub area:           Option<String>,
  pub job_type:       Option<String>,
  pub price:          f64,
  pub status:         JobStatus,
  pub fitter:         Option<String>,
  pub truck:          Option<String>,
  pub driver:         Option<String>,
  #[serde(alias = "time")]
  pub duration_weeks: Option<String>,
  pub finish_date:    Option<String>,
  pub builder:        Option<String>,
  pub phone:          Option<String>,
}

impl CandidateJob {
  /// Placeholder client name derived from the address.
  pub fn client_name(&self) -> String {
    let head: String = self
      .address
      .trim()
      .chars()
      .take(CLIENT_NAME_ADDRESS_CHARS)
      .collect();
    format!("Client at {head}...")
  }

  /// Free-text notes carrying the fields the `jobs` table has no column for.
  pub fn notes(&self) -> Option<String> {
    let mut parts = vec![];
    if let Some(fitter) = present(&self.fitter) {
      parts.push(format!("Fitter: {fitter}"));
    }
    if let Some(driver) = present(&self.driver) {
      parts.push(format!("Driver: {driver}"));
    }
    if let Some(weeks) = present(&self.duration_weeks)
      && weeks != "0"
    {
      parts.push(format!("Duration: {weeks} weeks"));
    }
    if let Some(builder) = present(&self.builder) {
      parts.push(format!("Builder: {builder}"));
    }
    if let Some(phone) = present(&self.phone) {
      parts.push(format!("Phone: {phone}"));
    }
    (!parts.is_empty()).then(|| parts.join(" | "))
  }
}
