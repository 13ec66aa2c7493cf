//! Grouping and merging of candidate jobs that describe the same physical job.
//!
//! Candidates are grouped by [`RecordKey`] in first-seen order, then each
//! group is folded left to right into one record according to
//! [`MERGE_RULES`]. Adding a field to the merge means adding a rule, not
//! another branch.

use std::collections::HashMap;

use serde::Serialize;

use crate::{
  candidate::CandidateJob,
  job::{present, round_currency},
  key::RecordKey,
};

// ─── Policy table ────────────────────────────────────────────────────────────

/// A candidate field subject to a merge rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeField {
  JobType,
  Area,
  Truck,
  Driver,
  Fitter,
  DurationWeeks,
  FinishDate,
  Builder,
  Phone,
  Price,
  Status,
}

impl MergeField {
  pub fn name(self) -> &'static str {
    match self {
      MergeField::JobType => "jobType",
      MergeField::Area => "area",
      MergeField::Truck => "truck",
      MergeField::Driver => "driver",
      MergeField::Fitter => "fitter",
      MergeField::DurationWeeks => "durationWeeks",
      MergeField::FinishDate => "finishDate",
      MergeField::Builder => "builder",
      MergeField::Phone => "phone",
      MergeField::Price => "price",
      MergeField::Status => "status",
    }
  }

  fn text(self, job: &CandidateJob) -> Option<&str> {
    match self {
      MergeField::JobType => present(&job.job_type),
      MergeField::Area => present(&job.area),
      MergeField::Truck => present(&job.truck),
      MergeField::Driver => present(&job.driver),
      MergeField::Fitter => present(&job.fitter),
      MergeField::DurationWeeks => present(&job.duration_weeks),
      MergeField::FinishDate => present(&job.finish_date),
      MergeField::Builder => present(&job.builder),
      MergeField::Phone => present(&job.phone),
      MergeField::Price | MergeField::Status => None,
    }
  }

  fn text_slot(self, job: &mut CandidateJob) -> Option<&mut Option<String>> {
    match self {
      MergeField::JobType => Some(&mut job.job_type),
      MergeField::Area => Some(&mut job.area),
      MergeField::Truck => Some(&mut job.truck),
      MergeField::Driver => Some(&mut job.driver),
      MergeField::Fitter => Some(&mut job.fitter),
      MergeField::DurationWeeks => Some(&mut job.duration_weeks),
      MergeField::FinishDate => Some(&mut job.finish_date),
      MergeField::Builder => Some(&mut job.builder),
      MergeField::Phone => Some(&mut job.phone),
      MergeField::Price | MergeField::Status => None,
    }
  }
}

/// How later group members combine with the record merged so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
  /// The first member's value stands; differing later values are conflicts.
  KeepFirst,
  /// The first non-empty value wins; later values are ignored once filled.
  FirstNonEmpty,
  /// The largest value wins.
  Maximum,
  /// The first non-pending status wins and is never reverted to pending.
  NonPendingWins,
}

/// The per-field merge policy.
pub const MERGE_RULES: &[(MergeField, MergePolicy)] = &[
  (MergeField::JobType, MergePolicy::KeepFirst),
  (MergeField::Area, MergePolicy::KeepFirst),
  (MergeField::Truck, MergePolicy::FirstNonEmpty),
  (MergeField::Driver, MergePolicy::FirstNonEmpty),
  (MergeField::Fitter, MergePolicy::FirstNonEmpty),
  (MergeField::DurationWeeks, MergePolicy::FirstNonEmpty),
  (MergeField::FinishDate, MergePolicy::FirstNonEmpty),
  (MergeField::Builder, MergePolicy::FirstNonEmpty),
  (MergeField::Phone, MergePolicy::FirstNonEmpty),
  (MergeField::Price, MergePolicy::Maximum),
  (MergeField::Status, MergePolicy::NonPendingWins),
];

// ─── Groups and results ──────────────────────────────────────────────────────

/// Candidates sharing one key, in source order. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeGroup {
  pub key:     RecordKey,
  pub members: Vec<CandidateJob>,
}

/// A `KeepFirst` field on which group members disagreed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldConflict {
  pub field:   MergeField,
  pub kept:    String,
  pub ignored: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedJob {
  pub key:       RecordKey,
  pub job:       CandidateJob,
  /// Number of candidates folded into this record.
  pub sources:   usize,
  pub conflicts: Vec<FieldConflict>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeOutcome {
  pub merged:   Vec<MergedJob>,
  pub input:    usize,
  /// Candidates without a usable date or address.
  pub excluded: usize,
}

impl MergeOutcome {
  pub fn conflict_count(&self) -> usize {
    self.merged.iter().map(|m| m.conflicts.len()).sum()
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Group candidates by key, preserving first-seen key order.
///
/// Returns the groups and the number of excluded candidates.
pub fn group(
  candidates: impl IntoIterator<Item = CandidateJob>,
) -> (Vec<MergeGroup>, usize) {
  let mut groups: Vec<MergeGroup> = vec![];
  let mut positions: HashMap<RecordKey, usize> = HashMap::new();
  let mut excluded = 0;

  for candidate in candidates {
    let Some(key) = RecordKey::for_candidate(&candidate) else {
      tracing::debug!(
        date = ?candidate.date,
        address = %candidate.address,
        "excluding candidate without a usable date or address"
      );
      excluded += 1;
      continue;
    };

    match positions.get(&key) {
      Some(&i) => groups[i].members.push(candidate),
      None => {
        positions.insert(key.clone(), groups.len());
        groups.push(MergeGroup { key, members: vec![candidate] });
      }
    }
  }

  (groups, excluded)
}

/// Fold a group into one record, applying [`MERGE_RULES`] member by member.
pub fn merge_group(group: MergeGroup) -> MergedJob {
  let MergeGroup { key, members } = group;
  let sources = members.len();
  let mut members = members.into_iter();
  let mut merged = members.next().unwrap_or_default();
  merged.price = round_currency(merged.price);
  let mut conflicts = vec![];

  for member in members {
    for &(field, policy) in MERGE_RULES {
      apply_rule(&mut merged, &member, field, policy, &mut conflicts);
    }
  }

  for conflict in &conflicts {
    tracing::warn!(
      key = %key,
      field = conflict.field.name(),
      kept = %conflict.kept,
      ignored = %conflict.ignored,
      "merged candidates disagree; keeping the first value"
    );
  }

  MergedJob { key, job: merged, sources, conflicts }
}

fn apply_rule(
  merged: &mut CandidateJob,
  member: &CandidateJob,
  field: MergeField,
  policy: MergePolicy,
  conflicts: &mut Vec<FieldConflict>,
) {
  match policy {
    MergePolicy::KeepFirst => {
      if let (Some(kept), Some(other)) = (field.text(merged), field.text(member))
        && !kept.eq_ignore_ascii_case(other)
      {
        conflicts.push(FieldConflict {
          field,
          kept:    kept.to_owned(),
          ignored: other.to_owned(),
        });
      }
    }
    MergePolicy::FirstNonEmpty => {
      let Some(incoming) = field.text(member) else { return };
      if field.text(merged).is_none()
        && let Some(slot) = field.text_slot(merged)
      {
        *slot = Some(incoming.to_owned());
      }
    }
    MergePolicy::Maximum => {
      if field == MergeField::Price {
        merged.price = merged.price.max(round_currency(member.price));
      }
    }
    MergePolicy::NonPendingWins => {
      if field == MergeField::Status
        && merged.status.is_pending()
        && !member.status.is_pending()
      {
        merged.status = member.status;
      }
    }
  }
}

/// Group candidates and merge every group; one record per key, in first-seen
/// key order.
pub fn group_and_merge(candidates: Vec<CandidateJob>) -> MergeOutcome {
  let input = candidates.len();
  let (groups, excluded) = group(candidates);
  let merged: Vec<MergedJob> = groups.into_iter().map(merge_group).collect();

  tracing::info!(
    input,
    excluded,
    merged = merged.len(),
    "merged candidate jobs"
  );

  MergeOutcome { merged, input, excluded }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
