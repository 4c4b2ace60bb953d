//! Runtime configuration.
//!
//! Defaults are overridden by an optional JSON file and then by `FC_*`
//! environment variables.

use crate::error::ConfigError;
use crate::flip::DEFAULT_MAX_FLIP_AGE_DAYS;
use crate::publish::MAX_FLIP_PAYLOAD_LEN;
use crate::session::DEFAULT_SUBMIT_GRACE_SECS;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings shared by the CLI and the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CeremonyConfig {
    /// JSON flip store.
    pub store_path: PathBuf,
    /// Per-epoch archive ledger.
    pub archive_path: PathBuf,
    /// Ceiling for the combined hex length of both payloads.
    pub max_payload_len: usize,
    /// Seconds cut from the short session when computing deadlines.
    pub submit_grace_secs: u64,
    /// Publishing-status poll cadence.
    pub poll_interval_ms: u64,
    /// Age after which untouched flips are pruned.
    pub max_flip_age_days: u64,
    /// Prune outdated flips whenever the store is listed.
    pub prune_on_load: bool,
}

impl Default for CeremonyConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("flips.json"),
            archive_path: PathBuf::from("flip_archive.json"),
            max_payload_len: MAX_FLIP_PAYLOAD_LEN,
            submit_grace_secs: DEFAULT_SUBMIT_GRACE_SECS,
            poll_interval_ms: 10_000,
            max_flip_age_days: DEFAULT_MAX_FLIP_AGE_DAYS,
            prune_on_load: true,
        }
    }
}

impl CeremonyConfig {
    /// Reads a JSON config file; absent keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|err| ConfigError::Parse(format!("{}: {err}", path.display())))
    }

    /// Defaults, then `FC_CONFIG` (if set), then individual `FC_*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match env::var("FC_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        base.with_overrides(|key| env::var(key).ok())
    }

    /// Applies overrides looked up by variable name.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("FC_STORE_PATH") {
            self.store_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("FC_ARCHIVE_PATH") {
            self.archive_path = PathBuf::from(path);
        }
        if let Some(value) = parse_number(&lookup, "FC_MAX_PAYLOAD_LEN")? {
            self.max_payload_len = value;
        }
        if let Some(value) = parse_number(&lookup, "FC_SUBMIT_GRACE_SECS")? {
            self.submit_grace_secs = value;
        }
        if let Some(value) = parse_number(&lookup, "FC_POLL_INTERVAL_MS")? {
            self.poll_interval_ms = value;
        }
        if let Some(value) = parse_number(&lookup, "FC_MAX_FLIP_AGE_DAYS")? {
            self.max_flip_age_days = value;
        }
        if let Some(value) = lookup("FC_PRUNE_ON_LOAD") {
            self.prune_on_load = parse_env_flag(&value);
        }
        Ok(self)
    }

    /// Grace period as a duration.
    pub fn submit_grace(&self) -> Duration {
        Duration::from_secs(self.submit_grace_secs)
    }

    /// Poll cadence as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn parse_number<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Parse(format!("{key} must be a non-negative integer, got {raw:?}"))),
        None => Ok(None),
    }
}

fn parse_env_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
