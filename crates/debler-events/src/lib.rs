//! Append-only JSONL audit log for the revision lifecycle: scheduled,
//! claimed, finished, failed, and canceled transitions.
//!
//! The scheduler and builder both append to this log as a side effect of
//! normal operation; it is never the system of record (the catalog is),
//! but it gives operators a complete, replayable history of what happened
//! to a revision and when, which the catalog's snapshot overwrites on
//! every mutation.
//!
//! # Example
//!
//! ```
//! use debler_events::{EventLog, RevisionEvent, RevisionEventKind};
//! use chrono::Utc;
//!
//! let mut log = EventLog::new();
//! log.record(RevisionEvent {
//!     timestamp: Utc::now(),
//!     revision: "libfoo-rubygem@1.2.3-1".to_string(),
//!     kind: RevisionEventKind::Scheduled,
//! });
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use debler_types::ErrorClass;
use serde::{Deserialize, Serialize};

/// Default events file name.
pub const EVENTS_FILE: &str = "events.jsonl";

/// Get the events file path for a state directory.
pub fn events_path(state_dir: &Path) -> PathBuf {
    state_dir.join(EVENTS_FILE)
}

/// A single transition in a revision's lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RevisionEventKind {
    /// A new revision was enqueued for build (webhook trigger or `rebuild`).
    Scheduled { reason: String },
    /// A worker won the `claimed` compare-and-swap for this revision.
    Claimed { host: String },
    /// Build finished and the resulting `.deb`s were uploaded.
    Finished { duration_ms: u64 },
    /// Build failed.
    Failed { class: ErrorClass, message: String },
    /// An explicit or terminal-state transition canceled the revision
    /// before it was claimed.
    Canceled { reason: String },
}

/// One line of the audit log: a timestamped transition against a
/// specific revision, identified as `<package>@<version>-<revision>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionEvent {
    pub timestamp: DateTime<Utc>,
    pub revision: String,
    #[serde(flatten)]
    pub kind: RevisionEventKind,
}

/// In-memory accumulator of [`RevisionEvent`]s, flushed to a JSONL file.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<RevisionEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn record(&mut self, event: RevisionEvent) {
        self.events.push(event);
    }

    /// Write all recorded events to a file in JSONL format, appending to
    /// whatever is already there.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create events dir {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open events file {}", path.display()))?;

        let mut writer = std::io::BufWriter::new(file);
        for event in &self.events {
            let line = serde_json::to_string(event).context("failed to serialize event to JSON")?;
            writeln!(writer, "{line}").context("failed to write event line")?;
        }
        writer.flush().context("failed to flush events file")?;
        Ok(())
    }

    /// Read all events from a JSONL file. Returns an empty log if the
    /// file doesn't exist yet.
    pub fn read_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let file = File::open(path)
            .with_context(|| format!("failed to open events file {}", path.display()))?;
        let reader = BufReader::new(file);
        let mut events = Vec::new();

        for line in reader.lines() {
            let line = line.with_context(|| {
                format!("failed to read line from events file {}", path.display())
            })?;
            let event: RevisionEvent = serde_json::from_str(&line)
                .with_context(|| format!("failed to parse event JSON from line: {line}"))?;
            events.push(event);
        }

        Ok(Self { events })
    }

    /// Every recorded event for a given revision, in recorded order.
    pub fn events_for_revision(&self, revision: &str) -> Vec<&RevisionEvent> {
        self.events.iter().filter(|e| e.revision == revision).collect()
    }

    pub fn all_events(&self) -> &[RevisionEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
