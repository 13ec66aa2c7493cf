//! Timestamped sibling copies of the store file.
//!
//! A backup failure never stops a run by itself: it is reported in the
//! [`BackupOutcome`] and the caller decides whether to continue.

use std::{
  ffi::OsString,
  path::{Path, PathBuf},
};

use chrono::Local;
use serde::Serialize;

use crate::Result;

const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupOutcome {
  pub created: bool,
  pub path:    Option<PathBuf>,
  pub error:   Option<String>,
}

/// Copy the store at `store_path` to `<store_path>.backup_YYYYMMDD_HHMMSS`.
///
/// A missing store is not an error: there is nothing to lose yet.
pub async fn backup(store_path: &Path) -> BackupOutcome {
  let stamp = Local::now().format(STAMP_FORMAT).to_string();
  backup_stamped(store_path, &stamp).await
}

pub(crate) async fn backup_stamped(store_path: &Path, stamp: &str) -> BackupOutcome {
  match copy_to_sibling(store_path, stamp).await {
    Ok(None) => {
      tracing::info!(store = %store_path.display(), "no store file yet; skipping backup");
      BackupOutcome::default()
    }
    Ok(Some(path)) => {
      tracing::info!(backup = %path.display(), "store backed up");
      BackupOutcome { created: true, path: Some(path), error: None }
    }
    Err(e) => {
      tracing::warn!(store = %store_path.display(), error = %e, "backup failed");
      BackupOutcome { created: false, path: None, error: Some(e.to_string()) }
    }
  }
}

async fn copy_to_sibling(store_path: &Path, stamp: &str) -> Result<Option<PathBuf>> {
  if !tokio::fs::try_exists(store_path).await? {
    return Ok(None);
  }

  let target = free_backup_path(store_path, stamp).await?;
  tokio::fs::copy(store_path, &target).await?;
  Ok(Some(target))
}

/// `<store>.backup_<stamp>`, or `<store>.backup_<stamp>_N` for the first free
/// `N` when an earlier backup already took the name.
async fn free_backup_path(store_path: &Path, stamp: &str) -> Result<PathBuf> {
  let mut base = OsString::from(store_path.as_os_str());
  base.push(".backup_");
  base.push(stamp);

  let mut candidate = PathBuf::from(&base);
  let mut n = 1;
  while tokio::fs::try_exists(&candidate).await? {
    let mut name = base.clone();
    name.push(format!("_{n}"));
    candidate = PathBuf::from(name);
    n += 1;
  }
  Ok(candidate)
}
