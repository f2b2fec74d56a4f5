//! The streaming dequeue/claim/finalize build loop (§4.5).
//!
//! The loop never depends on the builder crate directly: it drives any
//! [`RevisionBuilder`] implementation, so `debler-builder` can sit above
//! this crate instead of the two forming a cycle (the same decoupling
//! [`debler_webhook::ReleaseScheduler`] uses on the intake side).
//!
//! Selection is *streaming*: in [`SelectionMode::Pending`] and
//! [`SelectionMode::Failed`] the next revision is re-fetched from the
//! catalog after every finalized build, so a revision scheduled mid-run
//! (typically by a concurrent webhook) is picked up without restarting,
//! and a revision claimed by a racing worker simply drops out of the next
//! fetch instead of being retried.
//!
//! # Example
//!
//! ```
//! use debler_catalog::Catalog;
//! use debler_scheduler::{RevisionBuilder, SchedulerConfig, SelectionMode, run_build_loop};
//! use debler_build_failure::BuildFail;
//! use debler_events::EventLog;
//! use debler_types::{Distribution, PackageConfig};
//! use tempfile::tempdir;
//!
//! struct AlwaysSucceeds;
//! impl RevisionBuilder for AlwaysSucceeds {
//!     fn build(&self, _data: &debler_catalog::BuildData) -> Result<(), BuildFail> {
//!         Ok(())
//!     }
//! }
//!
//! let dir = tempdir().unwrap();
//! let catalog = Catalog::open(dir.path()).unwrap();
//! catalog.register_packager("bundler", serde_json::json!({}), true).unwrap();
//! let package_id = catalog
//!     .register_package("bundler", "rails", "debler-rubygem-rails", PackageConfig::default())
//!     .unwrap();
//! let slot_id = catalog.slot_for_version(package_id, "7.0.4", true).unwrap().unwrap();
//! catalog
//!     .schedule_build(slot_id, "7.0.4", "7.0.4-1", "New upstream release", Distribution::from("unstable"), None)
//!     .unwrap();
//!
//! let mut events = EventLog::new();
//! let receipt = run_build_loop(
//!     &catalog,
//!     &AlwaysSucceeds,
//!     SelectionMode::Pending,
//!     &SchedulerConfig { host: "worker-1".into(), ..Default::default() },
//!     &mut events,
//! ).unwrap();
//! assert_eq!(receipt.successful.len(), 1);
//! ```

use std::collections::HashSet;

use anyhow::Result;
use chrono::Utc;
use debler_build_failure::BuildFail;
use debler_catalog::{BuildData, Catalog, Id};
use debler_events::{EventLog, RevisionEvent, RevisionEventKind};
use debler_state::BuildReceipt;
use debler_types::BuildResult;

/// Which revisions a build loop invocation considers, in what order.
#[derive(Debug, Clone)]
pub enum SelectionMode {
    /// Every revision whose `result` is still `null`.
    Pending,
    /// Every revision whose `result` is `failed` (the `--retry` flag).
    Failed,
    /// A fixed list of revision ids, processed in the given order.
    Explicit(Vec<Id>),
}

/// Tunables for one `run_build_loop` invocation, matching the `build`
/// command's flags (§6).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Builder identity recorded on claim; see `debler_environment::builder_identity`.
    pub host: String,
    /// Skip claim and finalize: the build runs, but the catalog is never
    /// touched. The revision's `result` and `builder` stay `null`.
    pub incognito: bool,
    /// Stop the loop after the first failure instead of continuing.
    pub fail_fast: bool,
    /// Mark selected revisions `canceled` without running a build.
    pub cancel: bool,
    /// Stop after this many revisions have been processed (successful,
    /// failed or canceled).
    pub limit: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            host: "unknown".to_string(),
            incognito: false,
            fail_fast: false,
            cancel: false,
            limit: None,
        }
    }
}

/// The per-packager build implementation the loop drives. Implemented by
/// `debler-builder`; the scheduler knows only this contract.
pub trait RevisionBuilder {
    fn build(&self, data: &BuildData) -> Result<(), BuildFail>;
}

/// Every revision matching `mode`, without claiming or building — used by
/// `info` and `build --list-only`.
pub fn list_revisions(catalog: &Catalog, mode: &SelectionMode) -> Vec<Id> {
    match mode {
        SelectionMode::Pending => catalog.pending_revision_ids(),
        SelectionMode::Failed => catalog.failed_revision_ids(),
        SelectionMode::Explicit(ids) => ids.clone(),
    }
}

/// Mark every revision in `ids` `canceled` without running a build
/// (`build --cancel`). A revision already in a terminal state is skipped
/// rather than erroring, since "cancel" on a finished build is a no-op.
pub fn cancel_revisions(catalog: &Catalog, ids: &[Id]) -> Result<Vec<Id>> {
    let mut canceled = Vec::new();
    for &id in ids {
        match catalog.cancel_build(id) {
            Ok(()) => canceled.push(id),
            Err(_) => continue,
        }
    }
    Ok(canceled)
}

fn revision_label(catalog: &Catalog, revision_id: Id) -> Result<String> {
    let data = catalog.build_data(revision_id)?;
    Ok(format!("{}@{}", data.package_os_name, data.revision_version))
}

fn next_candidate(
    catalog: &Catalog,
    mode: &SelectionMode,
    explicit_cursor: &mut usize,
) -> Option<Id> {
    match mode {
        SelectionMode::Pending => catalog.pending_revision_ids().into_iter().next(),
        SelectionMode::Failed => catalog.failed_revision_ids().into_iter().next(),
        SelectionMode::Explicit(ids) => {
            let next = ids.get(*explicit_cursor).copied();
            *explicit_cursor += 1;
            next
        }
    }
}

/// Run the dequeue/claim/finalize loop until no more revisions match
/// `mode`, `config.limit` is reached, or (with `fail_fast`) a build fails.
///
/// Every finalized revision is recorded in `events` as it transitions, in
/// addition to the [`BuildReceipt`] summary returned at the end.
pub fn run_build_loop(
    catalog: &Catalog,
    builder: &dyn RevisionBuilder,
    mode: SelectionMode,
    config: &SchedulerConfig,
    events: &mut EventLog,
) -> Result<BuildReceipt> {
    let started_at = Utc::now();
    let mut successful = Vec::new();
    let mut failed = Vec::new();
    let mut canceled = Vec::new();
    let mut explicit_cursor = 0usize;
    let mut processed: HashSet<Id> = HashSet::new();

    loop {
        if let Some(limit) = config.limit {
            if successful.len() + failed.len() + canceled.len() >= limit {
                break;
            }
        }

        let Some(revision_id) = next_candidate(catalog, &mode, &mut explicit_cursor) else {
            break;
        };

        // Safety net: a revision that can't be removed from its own
        // selection set (incognito mode never touches the catalog) must
        // not be reprocessed forever.
        if !processed.insert(revision_id) {
            break;
        }

        let label = match revision_label(catalog, revision_id) {
            Ok(label) => label,
            Err(_) => continue,
        };

        if config.cancel {
            catalog.cancel_build(revision_id)?;
            events.record(RevisionEvent {
                timestamp: Utc::now(),
                revision: label.clone(),
                kind: RevisionEventKind::Canceled {
                    reason: "canceled before build".to_string(),
                },
            });
            canceled.push(label);
            continue;
        }

        if !config.incognito {
            match catalog.claim_build(revision_id, &config.host) {
                Ok(true) => {
                    events.record(RevisionEvent {
                        timestamp: Utc::now(),
                        revision: label.clone(),
                        kind: RevisionEventKind::Claimed {
                            host: config.host.clone(),
                        },
                    });
                }
                Ok(false) => continue, // lost the claim race; move on
                Err(err) => return Err(err),
            }
        }

        let data = catalog.build_data(revision_id)?;
        match builder.build(&data) {
            Ok(()) => {
                if !config.incognito {
                    catalog.update_build(revision_id, BuildResult::Finished)?;
                }
                let elapsed = (Utc::now() - started_at).num_milliseconds().max(0) as u64;
                events.record(RevisionEvent {
                    timestamp: Utc::now(),
                    revision: label.clone(),
                    kind: RevisionEventKind::Finished { duration_ms: elapsed },
                });
                successful.push(label);
            }
            Err(fail) => {
                if !config.incognito {
                    catalog.update_build(revision_id, BuildResult::Failed)?;
                }
                events.record(RevisionEvent {
                    timestamp: Utc::now(),
                    revision: label.clone(),
                    kind: RevisionEventKind::Failed {
                        class: fail.class(),
                        message: fail.to_string(),
                    },
                });
                failed.push(label);
                if config.fail_fast {
                    break;
                }
            }
        }
    }

    Ok(BuildReceipt {
        started_at,
        completed_at: Utc::now(),
        successful,
        failed,
        canceled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use debler_types::{Distribution, PackageConfig};
    use tempfile::tempdir;

    struct AlwaysSucceeds;
    impl RevisionBuilder for AlwaysSucceeds {
        fn build(&self, _data: &BuildData) -> Result<(), BuildFail> {
            Ok(())
        }
    }

    struct AlwaysFails;
    impl RevisionBuilder for AlwaysFails {
        fn build(&self, _data: &BuildData) -> Result<(), BuildFail> {
            Err(BuildFail::ToolChain {
                tool: "dpkg-buildpackage".into(),
                detail: "exit 2".into(),
            })
        }
    }

    fn catalog_with_pending(count: usize) -> (Catalog, tempfile::TempDir, Vec<Id>) {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path()).unwrap();
        catalog
            .register_packager("bundler", serde_json::json!({}), true)
            .unwrap();
        let mut ids = Vec::new();
        for i in 0..count {
            let name = format!("gem{i}");
            let os_name = format!("debler-rubygem-{name}");
            let package_id = catalog
                .register_package("bundler", &name, &os_name, PackageConfig::default())
                .unwrap();
            let slot_id = catalog
                .slot_for_version(package_id, "1.0.0", true)
                .unwrap()
                .unwrap();
            let revision_id = catalog
                .schedule_build(
                    slot_id,
                    "1.0.0",
                    "1.0.0-1",
                    "New upstream release",
                    Distribution::from("unstable"),
                    None,
                )
                .unwrap();
            ids.push(revision_id);
        }
        (catalog, dir, ids)
    }

    #[test]
    fn pending_loop_builds_everything_and_reports_success() {
        let (catalog, _dir, ids) = catalog_with_pending(3);
        let mut events = EventLog::new();
        let receipt = run_build_loop(
            &catalog,
            &AlwaysSucceeds,
            SelectionMode::Pending,
            &SchedulerConfig {
                host: "worker-1".into(),
                ..Default::default()
            },
            &mut events,
        )
        .unwrap();

        assert_eq!(receipt.successful.len(), 3);
        assert!(receipt.failed.is_empty());
        assert!(catalog.pending_revision_ids().is_empty());
        for id in ids {
            let data = catalog.build_data(id).unwrap();
            assert_eq!(data.revision_version, "1.0.0-1");
        }
    }

    #[test]
    fn fail_fast_stops_after_first_failure() {
        let (catalog, _dir, _ids) = catalog_with_pending(3);
        let mut events = EventLog::new();
        let receipt = run_build_loop(
            &catalog,
            &AlwaysFails,
            SelectionMode::Pending,
            &SchedulerConfig {
                host: "worker-1".into(),
                fail_fast: true,
                ..Default::default()
            },
            &mut events,
        )
        .unwrap();

        assert_eq!(receipt.failed.len(), 1);
        assert_eq!(receipt.total(), 1);
        assert_eq!(catalog.pending_revision_ids().len(), 2);
    }

    #[test]
    fn incognito_build_does_not_mutate_catalog() {
        let (catalog, _dir, ids) = catalog_with_pending(1);
        let mut events = EventLog::new();
        let receipt = run_build_loop(
            &catalog,
            &AlwaysSucceeds,
            SelectionMode::Explicit(ids.clone()),
            &SchedulerConfig {
                host: "worker-1".into(),
                incognito: true,
                ..Default::default()
            },
            &mut events,
        )
        .unwrap();

        assert_eq!(receipt.successful.len(), 1);
        let data = catalog.build_data(ids[0]).unwrap();
        assert!(!data.populated); // incognito never mutates the catalog
        assert_eq!(catalog.pending_revision_ids(), ids);
    }

    #[test]
    fn cancel_mode_marks_canceled_without_building() {
        let (catalog, _dir, ids) = catalog_with_pending(2);
        let mut events = EventLog::new();
        let receipt = run_build_loop(
            &catalog,
            &AlwaysFails,
            SelectionMode::Explicit(ids.clone()),
            &SchedulerConfig {
                host: "worker-1".into(),
                cancel: true,
                ..Default::default()
            },
            &mut events,
        )
        .unwrap();

        assert_eq!(receipt.canceled.len(), 2);
        assert!(receipt.successful.is_empty());
        assert!(receipt.failed.is_empty());
    }

    #[test]
    fn explicit_mode_preserves_order_and_limit_stops_early() {
        let (catalog, _dir, ids) = catalog_with_pending(3);
        let mut events = EventLog::new();
        let receipt = run_build_loop(
            &catalog,
            &AlwaysSucceeds,
            SelectionMode::Explicit(ids.clone()),
            &SchedulerConfig {
                host: "worker-1".into(),
                limit: Some(2),
                ..Default::default()
            },
            &mut events,
        )
        .unwrap();

        assert_eq!(receipt.total(), 2);
    }

    #[test]
    fn list_revisions_does_not_claim() {
        let (catalog, _dir, ids) = catalog_with_pending(2);
        let listed = list_revisions(&catalog, &SelectionMode::Pending);
        assert_eq!(listed, ids);
        assert_eq!(catalog.pending_revision_ids(), ids);
    }
}
