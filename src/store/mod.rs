//! Durable quota state.
//!
//! The whole registry's usage is written as one pretty-printed JSON array.
//! Writes are staged in a temporary file next to the target and published by
//! an atomic rename, so readers only ever see a complete snapshot. A staged
//! file that is never published is removed when it goes out of scope.

use crate::core::error::QuotaError;
use crate::core::window::ResetPeriod;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;
use tracing::debug;

/// Persisted usage of one provider.
///
/// Only `name`, `used_count` and `last_reset` are required when reading; the
/// capitalised aliases accept state files written by the earlier service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRecord {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "RequestCount")]
    pub used_count: u32,
    #[serde(alias = "LastReset")]
    pub last_reset: DateTime<Utc>,
    #[serde(default, alias = "RequestLimit")]
    pub quota_ceiling: u32,
    #[serde(default)]
    pub reset_period: ResetPeriod,
}

/// The state file at a fixed path.
#[derive(Debug)]
pub struct StateFile {
    path: PathBuf,
    // Generation of the newest snapshot published so far.
    published: Mutex<u64>,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            published: Mutex::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads all records from disk.
    ///
    /// A missing file is reported as `PersistenceMissing` so callers can tell
    /// a first start apart from a damaged file.
    pub fn load(&self) -> Result<Vec<ProviderRecord>, QuotaError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(QuotaError::PersistenceMissing(self.path.clone()));
            }
            Err(e) => {
                return Err(QuotaError::PersistenceReadFailed {
                    path: self.path.clone(),
                    reason: e.to_string(),
                });
            }
        };

        let records: Vec<ProviderRecord> =
            serde_json::from_str(&content).map_err(|e| QuotaError::PersistenceReadFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        debug!(path = %self.path.display(), records = records.len(), "Loaded quota state");
        Ok(records)
    }

    /// Publishes a snapshot taken at `generation`.
    ///
    /// Snapshots older than one already on disk are skipped and `Ok(false)` is
    /// returned, so a slow writer can never roll the file back.
    pub fn save(&self, generation: u64, records: &[ProviderRecord]) -> Result<bool, QuotaError> {
        let mut published = self.published.lock().unwrap_or_else(PoisonError::into_inner);
        if generation < *published {
            debug!(generation, published = *published, "Skipping stale quota snapshot");
            return Ok(false);
        }

        self.write_staged(records)
            .map_err(|source| QuotaError::PersistenceWriteFailed {
                path: self.path.clone(),
                source,
            })?;

        *published = generation;
        debug!(path = %self.path.display(), generation, "Saved quota state");
        Ok(true)
    }

    fn write_staged(&self, records: &[ProviderRecord]) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut staged = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(&mut staged);
            serde_json::to_writer_pretty(&mut writer, records)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        staged.as_file().sync_all()?;
        staged.persist(&self.path).map_err(|e| e.error)?;
        sync_dir(dir)
    }
}

/// Flushes the directory entry so a published rename survives a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
