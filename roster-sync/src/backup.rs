//! Pre-mutation LDIF snapshots.
//!
//! ## `snapshot_at` protocol
//!
//! 1. Search every entry under the base DN.
//! 2. Render LDIF and SHA-256 hash it.
//! 3. Load `<backup_dir>/last-snapshot.json`; skip if the digest matches.
//! 4. Write `<file>.tmp`, then rename to `roster-<timestamp>.ldif`.
//! 5. Save the new record with the same `.tmp` + rename pattern.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use roster_core::Dn;
use roster_directory::{ldif, Directory};

use crate::error::{io_err, SyncError};

pub const RECORD_FILE: &str = "last-snapshot.json";

/// On-disk record of the newest snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub written_at: DateTime<Utc>,
    pub file: PathBuf,
    pub sha256: String,
    pub entries: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotResult {
    Written { path: PathBuf, entries: usize },
    /// Directory content matches the newest snapshot; nothing written.
    Unchanged { path: PathBuf },
}

impl SnapshotResult {
    pub fn path(&self) -> &Path {
        match self {
            SnapshotResult::Written { path, .. } | SnapshotResult::Unchanged { path } => path,
        }
    }
}

pub fn record_path(backup_dir: &Path) -> PathBuf {
    backup_dir.join(RECORD_FILE)
}

/// Snapshot file name for a given instant.
pub fn snapshot_file_name(at: DateTime<Utc>) -> String {
    format!("roster-{}.ldif", at.format("%Y%m%dT%H%M%S%.3fZ"))
}

/// Load the newest snapshot record, if one exists.
pub fn load_record(backup_dir: &Path) -> Result<Option<SnapshotRecord>, SyncError> {
    let path = record_path(backup_dir);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Snapshot `base` into `backup_dir`, stamped with `now`.
pub fn snapshot_at(
    dir: &mut dyn Directory,
    base: &Dn,
    backup_dir: &Path,
    now: DateTime<Utc>,
) -> Result<SnapshotResult, SyncError> {
    let entries = dir.search(base, None)?;
    let content = ldif::render(&entries);
    let digest = hex::encode(Sha256::digest(content.as_bytes()));

    if let Some(record) = load_record(backup_dir)? {
        if record.sha256 == digest && backup_dir.join(&record.file).exists() {
            let path = backup_dir.join(&record.file);
            tracing::debug!("directory unchanged since snapshot {}", path.display());
            return Ok(SnapshotResult::Unchanged { path });
        }
    }

    std::fs::create_dir_all(backup_dir).map_err(|e| io_err(backup_dir, e))?;
    let file = PathBuf::from(snapshot_file_name(now));
    let path = backup_dir.join(&file);
    write_atomic(&path, content.as_bytes())?;

    let record = SnapshotRecord {
        written_at: now,
        file,
        sha256: digest,
        entries: entries.len(),
    };
    let json = serde_json::to_vec_pretty(&record)?;
    write_atomic(&record_path(backup_dir), &json)?;

    tracing::info!("wrote snapshot of {} entries: {}", entries.len(), path.display());
    Ok(SnapshotResult::Written {
        path,
        entries: entries.len(),
    })
}

/// [`snapshot_at`] stamped with the current time.
pub fn snapshot(
    dir: &mut dyn Directory,
    base: &Dn,
    backup_dir: &Path,
) -> Result<SnapshotResult, SyncError> {
    snapshot_at(dir, base, backup_dir, Utc::now())
}

fn write_atomic(path: &Path, content: &[u8]) -> Result<(), SyncError> {
    let tmp = PathBuf::from(format!("{}.tmp", path.display()));
    std::fs::write(&tmp, content).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}
