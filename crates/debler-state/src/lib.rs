//! Typed, atomically-persisted snapshots for debler.
//!
//! Sits on top of [`debler_storage`]'s raw blob backend: serializes a
//! typed value to JSON and writes it through the same
//! write-temp-then-rename path, so a crash mid-save never leaves a
//! truncated or half-written catalog snapshot on disk. [`debler_store`]
//! builds schema versioning on top of this; this crate doesn't know
//! anything about the catalog's shape.
//!
//! # Example
//!
//! ```
//! use debler_state::SnapshotStore;
//! use serde::{Serialize, Deserialize};
//! use std::path::Path;
//!
//! #[derive(Serialize, Deserialize, Debug, PartialEq)]
//! struct Counter { value: u32 }
//!
//! let store: SnapshotStore<Counter> = SnapshotStore::new(Path::new("/tmp/debler-state-example"), "counter.json");
//! store.save(&Counter { value: 1 }).expect("save");
//! assert_eq!(store.load().expect("load").value, 1);
//! ```

use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// An atomically-persisted, typed JSON snapshot at a fixed path.
#[derive(Debug, Clone)]
pub struct SnapshotStore<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> SnapshotStore<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(state_dir: &Path, file_name: &str) -> Self {
        Self {
            path: state_dir.join(file_name),
            _marker: PhantomData,
        }
    }

    /// Save `value` to disk: write to a sibling `.tmp` file, then rename
    /// over the real path. A reader never observes a partial write.
    pub fn save(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create state dir {}", parent.display()))?;
        }

        let tmp_path = self.path.with_extension("tmp");
        let json = serde_json::to_string_pretty(value).context("failed to serialize snapshot")?;
        fs::write(&tmp_path, json)
            .with_context(|| format!("failed to write snapshot file {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed to rename snapshot file to {}", self.path.display()))?;
        Ok(())
    }

    pub fn load(&self) -> Result<T> {
        if !self.path.exists() {
            return Err(anyhow::anyhow!("snapshot file not found: {}", self.path.display()));
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read snapshot file {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse snapshot JSON from {}", self.path.display()))
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn delete(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("failed to delete snapshot file {}", self.path.display()))?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Summary of one `build`/`rebuild` invocation, appended to an
/// append-only JSONL receipts log, mirroring the `Built N packages: S
/// successful, F failed` terminal summary line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReceipt {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub successful: Vec<String>,
    pub failed: Vec<String>,
    pub canceled: Vec<String>,
}

impl BuildReceipt {
    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len() + self.canceled.len()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Built {} packages: {} successful, {} failed",
            self.total(),
            self.successful.len(),
            self.failed.len()
        )
    }
}

pub fn receipts_path(state_dir: &Path) -> PathBuf {
    state_dir.join("receipts.jsonl")
}

pub fn append_receipt(state_dir: &Path, receipt: &BuildReceipt) -> Result<()> {
    let path = receipts_path(state_dir);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create state dir {}", parent.display()))?;
    }

    let line = serde_json::to_string(receipt).context("failed to serialize receipt")?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open receipts file {}", path.display()))?;

    use std::io::Write;
    writeln!(file, "{line}").with_context(|| format!("failed to write receipt to {}", path.display()))?;
    Ok(())
}
