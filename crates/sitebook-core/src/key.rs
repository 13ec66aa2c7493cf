//! Natural identity of a job: `(date, normalised address)`.
//!
//! Two records with equal keys are taken to describe the same physical job.
//! The same normalisation is applied to incoming candidates and to stored
//! jobs, so lookups in both directions agree.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::{candidate::CandidateJob, job::JobRecord};

const ISO_DATE: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RecordKey {
  date:    String,
  address: String,
}

impl RecordKey {
  /// Build a key; `None` when the date is not an ISO date or the address is
  /// empty after normalisation.
  pub fn new(date: &str, address: &str) -> Option<Self> {
    let date = normalize_date(date)?;
    let address = normalize_address(address);
    if address.is_empty() {
      return None;
    }
    Some(Self { date, address })
  }

  pub fn for_candidate(job: &CandidateJob) -> Option<Self> {
    Self::new(job.date.as_deref()?, &job.address)
  }

  pub fn for_stored(job: &JobRecord) -> Option<Self> {
    Self::new(job.start_date.as_deref()?, &job.location)
  }

  pub fn date(&self) -> &str { &self.date }

  pub fn address(&self) -> &str { &self.address }
}

impl fmt::Display for RecordKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}_{}", self.date, self.address)
  }
}

/// Canonical `YYYY-MM-DD` form of an ISO date, or `None` if it does not parse.
pub fn normalize_date(raw: &str) -> Option<String> {
  NaiveDate::parse_from_str(raw.trim(), ISO_DATE)
    .ok()
    .map(|d| d.format(ISO_DATE).to_string())
}

/// Lowercase, treat commas as whitespace, collapse whitespace runs, trim.
pub fn normalize_address(raw: &str) -> String {
  raw
    .to_lowercase()
    .replace(',', " ")
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn address_normalisation_ignores_case_spacing_and_commas() {
    assert_eq!(
      normalize_address("  1 Holdich   St,  PE3 6DH, "),
      "1 holdich st pe3 6dh"
    );
    assert_eq!(normalize_address("1 holdich st,pe3 6dh"), "1 holdich st pe3 6dh");
    assert_eq!(normalize_address("\t\n"), "");
  }

  #[test]
  fn equivalent_addresses_share_a_key() {
    let a = RecordKey::new("2024-09-10", "1 Holdich St").unwrap();
    let b = RecordKey::new("2024-09-10", "1 holdich  st").unwrap();
    assert_eq!(a, b);
    assert_eq!(a.to_string(), "2024-09-10_1 holdich st");
  }

  #[test]
  fn different_dates_are_different_jobs() {
    let a = RecordKey::new("2024-09-10", "1 Holdich St").unwrap();
    let b = RecordKey::new("2024-09-11", "1 Holdich St").unwrap();
    assert_ne!(a, b);
  }

  #[test]
  fn invalid_date_or_empty_address_has_no_key() {
    assert!(RecordKey::new("9/10/2024", "1 Holdich St").is_none());
    assert!(RecordKey::new("2024-02-30", "1 Holdich St").is_none());
    assert!(RecordKey::new("2024-09-10", " , ").is_none());

    let job = CandidateJob { address: "1 Holdich St".into(), ..Default::default() };
    assert!(RecordKey::for_candidate(&job).is_none());
  }

  #[test]
  fn date_is_trimmed() {
    assert_eq!(normalize_date(" 2024-09-01 ").as_deref(), Some("2024-09-01"));
  }
}
