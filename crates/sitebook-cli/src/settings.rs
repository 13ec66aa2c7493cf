//! Layered configuration: TOML file, then `SITEBOOK_*` environment
//! variables. Command-line flags are applied on top by `main`.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, ensure};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "SITEBOOK";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
  /// Location of the SQLite store; a leading `~` is expanded.
  pub store_path:        PathBuf,
  /// Reconcile actions committed per transaction.
  pub import_batch_size: usize,
  /// Copy the store aside before mutating it.
  pub backup:            bool,
  /// Abort when that copy fails instead of continuing with a warning.
  pub require_backup:    bool,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      store_path:        PathBuf::from("~/scaffolding_business.db"),
      import_batch_size: 100,
      backup:            true,
      require_backup:    false,
    }
  }
}

impl Settings {
  /// Read `config_path` (if it exists) and the environment.
  pub fn load(config_path: &Path) -> anyhow::Result<Self> {
    let settings: Settings = config::Config::builder()
      .add_source(config::File::from(config_path).required(false))
      .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise settings")?;

    settings.validate()?;
    Ok(settings)
  }

  pub fn validate(&self) -> anyhow::Result<()> {
    ensure!(
      self.import_batch_size >= 1,
      "import_batch_size must be at least 1, got {}",
      self.import_batch_size
    );
    Ok(())
  }

  /// The store path with `~` expanded.
  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
