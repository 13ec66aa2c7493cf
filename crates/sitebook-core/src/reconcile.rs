//! Upsert planning: merged candidates against the stored jobs.
//!
//! Planning is pure. [`reconcile`] turns merged records into a list of
//! [`ReconcileAction`]s that a [`JobStore`](crate::store::JobStore) applies in
//! batches.

use std::collections::HashMap;

use serde::Serialize;

use crate::{
  job::{JobPatch, JobRecord, NewJob, present, round_currency},
  key::{RecordKey, normalize_date},
  merge::MergedJob,
};

/// Smallest suffix a minted job number may carry.
const JOB_NUMBER_FLOOR: u64 = 10_000;
const JOB_NUMBER_DIGITS: usize = 6;
/// Suffixes at or above this are hand-entered noise and do not seed numbering.
const JOB_NUMBER_CEILING: u64 = 1_000_000_000_000;
const FALLBACK_PREFIX: &str = "JB";

const AREA_PREFIXES: &[(&str, &str)] = &[
  ("Peterborough", "PB"),
  ("Leicester", "LC"),
  ("London", "LD"),
  ("Birmingham", "BH"),
  ("Luton", "LT"),
  ("Builders", "BD"),
];

// ─── Stored job index ────────────────────────────────────────────────────────

/// Stored jobs keyed by the same [`RecordKey`] normalisation used for
/// candidates.
#[derive(Debug, Clone, Default)]
pub struct JobIndex {
  by_key:      HashMap<RecordKey, JobRecord>,
  job_numbers: Vec<String>,
}

impl JobIndex {
  /// Index stored jobs. On duplicate keys the first row wins; rows without a
  /// usable start date or location are not matchable but their job numbers
  /// still count towards numbering.
  pub fn new(jobs: Vec<JobRecord>) -> Self {
    let mut index = Self::default();
    for job in jobs {
      index.job_numbers.push(job.job_number.clone());
      let Some(key) = RecordKey::for_stored(&job) else { continue };
      if let Some(first) = index.by_key.get(&key) {
        tracing::debug!(
          key = %key,
          kept = %first.job_number,
          ignored = %job.job_number,
          "stored jobs share a key; matching against the first"
        );
        continue;
      }
      index.by_key.insert(key, job);
    }
    index
  }

  pub fn get(&self, key: &RecordKey) -> Option<&JobRecord> { self.by_key.get(key) }

  pub fn len(&self) -> usize { self.job_numbers.len() }

  pub fn is_empty(&self) -> bool { self.job_numbers.is_empty() }

  /// Every stored job number, including unmatchable rows.
  pub fn job_numbers(&self) -> impl Iterator<Item = &str> {
    self.job_numbers.iter().map(String::as_str)
  }
}

// ─── Job numbering ───────────────────────────────────────────────────────────

/// Mints job numbers above every suffix seen so far.
#[derive(Debug, Clone)]
pub struct JobNumbers {
  highest: Option<u64>,
}

impl JobNumbers {
  pub fn seeded<'a>(existing: impl IntoIterator<Item = &'a str>) -> Self {
    let highest = existing
      .into_iter()
      .filter_map(|job_number| {
        let suffix = numeric_suffix(job_number)?;
        if suffix >= JOB_NUMBER_CEILING {
          tracing::warn!(job_number, "job number suffix out of range; not used for numbering");
          return None;
        }
        Some(suffix)
      })
      .max();
    Self { highest }
  }

  /// The next job number for `area`: prefix plus a zero-padded suffix.
  pub fn mint(&mut self, area: Option<&str>) -> String {
    let next = self
      .highest
      .and_then(|highest| highest.checked_add(1))
      .map_or(JOB_NUMBER_FLOOR, |next| next.max(JOB_NUMBER_FLOOR));
    self.highest = Some(next);
    format!("{}{next:0width$}", area_prefix(area), width = JOB_NUMBER_DIGITS)
  }
}

/// Two-letter job number prefix for a service area.
pub fn area_prefix(area: Option<&str>) -> &'static str {
  let Some(area) = area.map(str::trim) else { return FALLBACK_PREFIX };
  AREA_PREFIXES
    .iter()
    .find(|(name, _)| name.eq_ignore_ascii_case(area))
    .map_or(FALLBACK_PREFIX, |(_, prefix)| prefix)
}

/// The trailing run of digits of a job number, if any.
pub fn numeric_suffix(job_number: &str) -> Option<u64> {
  let digits = job_number.len()
    - job_number
      .trim_end_matches(|c: char| c.is_ascii_digit())
      .len();
  if digits == 0 {
    return None;
  }
  job_number[job_number.len() - digits..].parse().ok()
}

// ─── Plan ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReconcileAction {
  Create(NewJob),
  Update { job_number: String, patch: JobPatch },
  /// Matched a stored job with nothing to write.
  Unchanged { job_number: String },
}

impl ReconcileAction {
  pub fn job_number(&self) -> &str {
    match self {
      ReconcileAction::Create(job) => &job.job_number,
      ReconcileAction::Update { job_number, .. }
      | ReconcileAction::Unchanged { job_number } => job_number,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
  pub created:   usize,
  pub updated:   usize,
  pub unchanged: usize,
  pub skipped:   usize,
}

impl ReconcileSummary {
  /// Counts a plan would produce if every action succeeded.
  pub fn planned(actions: &[ReconcileAction]) -> Self {
    let mut summary = Self::default();
    for action in actions {
      summary.count(action);
    }
    summary
  }

  pub fn count(&mut self, action: &ReconcileAction) {
    match action {
      ReconcileAction::Create(_) => self.created += 1,
      ReconcileAction::Update { .. } => self.updated += 1,
      ReconcileAction::Unchanged { .. } => self.unchanged += 1,
    }
  }

  pub fn total(&self) -> usize {
    self.created + self.updated + self.unchanged + self.skipped
  }
}

/// The partial update that brings `stored` up to date with `merged`.
///
/// Never clears a stored value, never lowers the value and never moves a
/// status back to pending. The client name is left alone.
pub fn plan_update(stored: &JobRecord, merged: &MergedJob) -> JobPatch {
  let job = &merged.job;
  let end_date = present(&job.finish_date).map(finish_date);
  let incoming_value = round_currency(job.price);

  JobPatch {
    area:     differing(present(&job.area), &stored.area),
    job_type: differing(present(&job.job_type), &stored.job_type),
    truck:    differing(present(&job.truck), &stored.truck),
    driver:   differing(present(&job.driver), &stored.driver),
    end_date: differing(end_date.as_deref(), &stored.end_date),
    notes:    differing(job.notes().as_deref(), &stored.notes),
    value:    (incoming_value > stored.value.unwrap_or(0.0))
      .then_some(incoming_value),
    status:   (!job.status.is_pending() && stored.is_pending())
      .then_some(job.status),
  }
}

fn differing(incoming: Option<&str>, stored: &Option<String>) -> Option<String> {
  let incoming = incoming?;
  (stored.as_deref() != Some(incoming)).then(|| incoming.to_owned())
}

/// ISO finish dates are normalised; anything else is kept as written.
fn finish_date(raw: &str) -> String {
  normalize_date(raw).unwrap_or_else(|| raw.to_owned())
}

fn new_job(merged: &MergedJob, numbers: &mut JobNumbers) -> NewJob {
  let job = &merged.job;
  let area = present(&job.area).map(str::to_owned);
  NewJob {
    job_number: numbers.mint(area.as_deref()),
    client_name: job.client_name(),
    location: job.address.trim().to_owned(),
    area,
    job_type: present(&job.job_type).map(str::to_owned),
    truck: present(&job.truck).map(str::to_owned),
    driver: present(&job.driver).map(str::to_owned),
    start_date: merged.key.date().to_owned(),
    end_date: present(&job.finish_date).map(finish_date),
    status: job.status,
    value: round_currency(job.price),
    notes: job.notes(),
  }
}

/// Plan one action per merged record, in input order.
///
/// A key that occurs twice in `merged` is only created once; the second
/// occurrence is planned against the job created for the first.
pub fn reconcile(
  merged: &[MergedJob],
  existing: &JobIndex,
  numbers: &mut JobNumbers,
) -> Vec<ReconcileAction> {
  let mut created: HashMap<&RecordKey, String> = HashMap::new();

  merged
    .iter()
    .map(|record| {
      if let Some(stored) = existing.get(&record.key) {
        let patch = plan_update(stored, record);
        let job_number = stored.job_number.clone();
        return if patch.is_empty() {
          ReconcileAction::Unchanged { job_number }
        } else {
          ReconcileAction::Update { job_number, patch }
        };
      }
      if let Some(job_number) = created.get(&record.key) {
        return ReconcileAction::Unchanged { job_number: job_number.clone() };
      }
      let job = new_job(record, numbers);
      created.insert(&record.key, job.job_number.clone());
      ReconcileAction::Create(job)
    })
    .collect()
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    candidate::CandidateJob,
    job::JobStatus,
    merge::{group_and_merge, merge_group, MergeGroup},
  };

  fn stored(job_number: &str, start_date: &str, location: &str) -> JobRecord {
    JobRecord {
      id:                1,
      job_number:        job_number.into(),
      client_name:       "Hand entered".into(),
      location:          location.into(),
      area:              Some("Peterborough".into()),
      job_type:          Some("u shape".into()),
      truck:             Some("T1".into()),
      driver:            None,
      start_date:        Some(start_date.into()),
      end_date:          None,
      status:            Some("pending".into()),
      value:             Some(1000.0),
      linked_invoice_id: None,
      linked_inquiry_id: None,
      notes:             None,
      created_at:        None,
      updated_at:        None,
    }
  }

  fn merged(job: CandidateJob) -> MergedJob {
    let key = RecordKey::for_candidate(&job).unwrap();
    merge_group(MergeGroup { key, members: vec![job] })
  }

  fn candidate(date: &str, address: &str) -> CandidateJob {
    CandidateJob {
      date: Some(date.into()),
      address: address.into(),
      area: Some("Peterborough".into()),
      job_type: Some("u shape".into()),
      ..Default::default()
    }
  }

  #[test]
  fn match_produces_partial_update() {
    let index = JobIndex::new(vec![stored("PB010123", "2024-09-10", "1 Holdich St")]);
    let incoming = merged(CandidateJob {
      truck: Some(String::new()),
      driver: Some("Karan".into()),
      price: 1200.0,
      status: JobStatus::Completed,
      ..candidate("2024-09-10", "1 holdich st")
    });

    let mut numbers = JobNumbers::seeded(index.job_numbers());
    let actions = reconcile(&[incoming], &index, &mut numbers);

    let [ReconcileAction::Update { job_number, patch }] = actions.as_slice() else {
      panic!("expected one update, got {actions:?}");
    };
    assert_eq!(job_number, "PB010123");
    assert_eq!(patch.truck, None);
    assert_eq!(patch.driver.as_deref(), Some("Karan"));
    assert_eq!(patch.value, Some(1200.0));
    assert_eq!(patch.status, Some(JobStatus::Completed));
    assert_eq!(patch.notes.as_deref(), Some("Driver: Karan"));
  }

  #[test]
  fn update_never_lowers_value_or_reverts_status() {
    let mut job = stored("PB010123", "2024-09-10", "1 Holdich St");
    job.status = Some("active".into());
    job.value = Some(1500.0);

    let incoming = merged(CandidateJob {
      price: 900.0,
      status: JobStatus::Completed,
      ..candidate("2024-09-10", "1 Holdich St")
    });

    let patch = plan_update(&job, &incoming);
    assert_eq!(patch.value, None);
    assert_eq!(patch.status, None);
    assert!(patch.is_empty());
  }

  #[test]
  fn null_value_and_blank_status_count_as_unset() {
    let mut job = stored("PB010123", "2024-09-10", "1 Holdich St");
    job.value = None;
    job.status = Some(" ".into());

    let incoming = merged(CandidateJob {
      price: 10.0,
      status: JobStatus::Active,
      ..candidate("2024-09-10", "1 Holdich St")
    });

    let patch = plan_update(&job, &incoming);
    assert_eq!(patch.value, Some(10.0));
    assert_eq!(patch.status, Some(JobStatus::Active));
  }

  #[test]
  fn identical_match_is_unchanged() {
    let index = JobIndex::new(vec![stored("PB010123", "2024-09-10", "1 Holdich St")]);
    let incoming = merged(CandidateJob {
      truck: Some("T1".into()),
      price: 1000.0,
      ..candidate("2024-09-10", "1 Holdich St")
    });

    let mut numbers = JobNumbers::seeded(index.job_numbers());
    let actions = reconcile(&[incoming], &index, &mut numbers);
    assert_eq!(
      actions,
      [ReconcileAction::Unchanged { job_number: "PB010123".into() }]
    );
  }

  #[test]
  fn new_jobs_get_numbers_above_every_stored_suffix() {
    let index = JobIndex::new(vec![
      stored("PB010123", "2024-09-10", "1 Holdich St"),
      stored("LD010999", "2024-09-11", "2 Strand"),
    ]);
    let outcome = group_and_merge(vec![
      CandidateJob { area: Some("London".into()), ..candidate("2024-10-01", "a") },
      CandidateJob { area: Some("Elsewhere".into()), ..candidate("2024-10-01", "b") },
    ]);

    let mut numbers = JobNumbers::seeded(index.job_numbers());
    let actions = reconcile(&outcome.merged, &index, &mut numbers);
    let numbers: Vec<_> = actions.iter().map(ReconcileAction::job_number).collect();
    assert_eq!(numbers, ["LD011000", "JB011001"]);
  }

  #[test]
  fn numbering_starts_at_the_floor() {
    let mut numbers = JobNumbers::seeded(["JB000042"]);
    assert_eq!(numbers.mint(Some("luton")), "LT010000");
    assert_eq!(numbers.mint(None), "JB010001");
  }

  #[test]
  fn out_of_range_suffixes_do_not_seed_numbering() {
    let mut numbers =
      JobNumbers::seeded(["JB18446744073709551615", "JB99999999999999999999", "PB010123"]);
    assert_eq!(numbers.mint(None), "JB010124");
    assert_eq!(numbers.mint(None), "JB010125");
  }

  #[test]
  fn new_job_carries_derived_fields() {
    let incoming = merged(CandidateJob {
      price: 850.0,
      fitter: Some("karan".into()),
      finish_date: Some("2024-10-20".into()),
      ..candidate("2024-10-01", "  7 Bridge St, Peterborough ")
    });

    let mut numbers = JobNumbers::seeded(std::iter::empty());
    let actions = reconcile(&[incoming], &JobIndex::default(), &mut numbers);
    let [ReconcileAction::Create(job)] = actions.as_slice() else {
      panic!("expected one create, got {actions:?}");
    };
    assert_eq!(job.job_number, "PB010000");
    assert_eq!(job.client_name, "Client at 7 Bridge St, Peterborough...");
    assert_eq!(job.location, "7 Bridge St, Peterborough");
    assert_eq!(job.start_date, "2024-10-01");
    assert_eq!(job.end_date.as_deref(), Some("2024-10-20"));
    assert_eq!(job.notes.as_deref(), Some("Fitter: karan"));
    assert_eq!(job.value, 850.0);
  }

  #[test]
  fn first_stored_row_wins_on_duplicate_keys() {
    let index = JobIndex::new(vec![
      stored("PB010001", "2024-09-10", "1 Holdich St"),
      stored("PB010002", "2024-09-10", "1 HOLDICH ST"),
    ]);
    let key = RecordKey::new("2024-09-10", "1 holdich st").unwrap();
    assert_eq!(index.get(&key).unwrap().job_number, "PB010001");
    assert_eq!(index.len(), 2);
  }

  #[test]
  fn suffix_parsing() {
    assert_eq!(numeric_suffix("PB010123"), Some(10123));
    assert_eq!(numeric_suffix("JB"), None);
    assert_eq!(numeric_suffix("manual-7"), Some(7));
  }

  #[test]
  fn summary_counts_planned_actions() {
    let actions = vec![
      ReconcileAction::Unchanged { job_number: "a".into() },
      ReconcileAction::Update { job_number: "b".into(), patch: JobPatch::default() },
    ];
    let summary = ReconcileSummary::planned(&actions);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.total(), 2);
  }
}
