//! The persistent packager/package/slot/version/revision catalog.
//!
//! This is the public API (§4.4) sitting atop [`debler_store`]'s
//! schema-versioned file persistence: it loads the full entity tree as one
//! document, enforces the catalog's invariants (slot-key uniqueness,
//! revision-version monotonicity, the terminal-state law) in memory, and
//! atomically re-persists on every mutation. Operations are guarded by an
//! in-process mutex, giving the short auto-committed "transactions" the
//! original design describes as a load → mutate → atomic-save cycle;
//! cross-process races over the same catalog file are resolved at the
//! revision level by [`Catalog::claim_build`]'s compare-and-swap, not by
//! this mutex (see §5).
//!
//! # Example
//!
//! ```
//! use debler_catalog::Catalog;
//! use debler_types::{Distribution, PackageConfig};
//! use tempfile::tempdir;
//!
//! let dir = tempdir().unwrap();
//! let catalog = Catalog::open(dir.path()).unwrap();
//!
//! catalog.register_packager("bundler", serde_json::json!({}), true).unwrap();
//! let package_id = catalog
//!     .register_package("bundler", "rails", "debler-rubygem-rails", PackageConfig::default())
//!     .unwrap();
//!
//! let slot_id = catalog
//!     .slot_for_version(package_id, "7.0.4", true)
//!     .unwrap()
//!     .unwrap();
//! let revision_id = catalog
//!     .schedule_build(slot_id, "7.0.4", "7.0.4-1", "New upstream release", Distribution::from("unstable"), None)
//!     .unwrap();
//!
//! assert!(catalog.claim_build(revision_id, "worker-1").unwrap());
//! ```

mod error;
mod model;
mod revision;

pub use error::CatalogError;
pub use model::{
    BuildData, ChangelogEntry, GitSource, Id, NewPackageSpec, PackageInfo, Packager, RevisionInfo,
    SlotInfo, SlotMetadata, VersionConfig, VersionInfo,
};
pub use revision::{bump_revision, revision_version_key, slot_key, version_matches_key};

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use debler_store::{FileStore, SchemaVersion, StateMetadata, MINIMUM_SUPPORTED_VERSION};
use debler_types::{BuildResult, ClaimMarker, Distribution, PackageConfig};
use serde::{Deserialize, Serialize};

use model::{CatalogSnapshot, PackageRow, PackagerRow, RevisionRow, SlotRow, VersionRow};

const CATALOG_FILE: &str = "catalog.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogDocument {
    metadata: StateMetadata,
    snapshot: CatalogSnapshot,
}

/// The persistent catalog handle. Cheap to clone-by-reference (hold one
/// behind an `Arc` if shared across threads); internally single-writer via
/// a mutex around the in-memory snapshot.
pub struct Catalog {
    store: FileStore,
    inner: Mutex<CatalogSnapshot>,
}

impl Catalog {
    /// Open (or initialize) the catalog document under `state_dir`.
    pub fn open(state_dir: &Path) -> Result<Self> {
        let store = FileStore::new(state_dir.to_path_buf());
        store.ensure_dir()?;

        let snapshot = match store
            .load_json::<CatalogDocument>(CATALOG_FILE)
            .context("failed to read catalog document")?
        {
            Some(doc) => {
                if !doc.metadata.schema_version.is_supported(MINIMUM_SUPPORTED_VERSION) {
                    anyhow::bail!(
                        "catalog schema version {} is older than the minimum supported v{}",
                        doc.metadata.schema_version,
                        MINIMUM_SUPPORTED_VERSION
                    );
                }
                doc.snapshot
            }
            None => CatalogSnapshot::default(),
        };

        Ok(Catalog {
            store,
            inner: Mutex::new(snapshot),
        })
    }

    fn persist(&self, snapshot: &CatalogSnapshot) -> Result<()> {
        let doc = CatalogDocument {
            metadata: StateMetadata {
                schema_version: SchemaVersion::default(),
                ..StateMetadata::new()
            },
            snapshot: snapshot.clone(),
        };
        self.store
            .save_json(CATALOG_FILE, &doc)
            .context("failed to persist catalog document")
    }

    // ---- packagers ----------------------------------------------------

    pub fn register_packager(
        &self,
        name: &str,
        config: serde_json::Value,
        enabled: bool,
    ) -> Result<()> {
        let mut snapshot = self.inner.lock().unwrap();
        if snapshot.packagers.contains_key(name) {
            return Err(CatalogError::DuplicatePackager(name.to_string()).into());
        }
        snapshot.packagers.insert(
            name.to_string(),
            PackagerRow {
                name: name.to_string(),
                config,
                enabled,
            },
        );
        self.persist(&snapshot)
    }

    pub fn get_packager(&self, name: &str) -> Option<Packager> {
        let snapshot = self.inner.lock().unwrap();
        snapshot.packagers.get(name).map(Packager::from)
    }

    pub fn get_enabled_packagers(&self) -> Vec<Packager> {
        let snapshot = self.inner.lock().unwrap();
        snapshot
            .packagers
            .values()
            .filter(|row| row.enabled)
            .map(Packager::from)
            .collect()
    }

    // ---- packages -------------------------------------------------------

    pub fn register_package(
        &self,
        packager: &str,
        name: &str,
        os_name: &str,
        config: PackageConfig,
    ) -> Result<Id> {
        let mut snapshot = self.inner.lock().unwrap();
        if !snapshot.packagers.contains_key(packager) {
            return Err(CatalogError::UnknownPackager(packager.to_string()).into());
        }
        if find_package(&snapshot, packager, name).is_some() {
            return Err(CatalogError::DuplicatePackage {
                packager: packager.to_string(),
                name: name.to_string(),
            }
            .into());
        }

        let id = snapshot.alloc_id();
        snapshot.packages.insert(
            id,
            PackageRow {
                id,
                packager: packager.to_string(),
                name: name.to_string(),
                os_name: os_name.to_string(),
                config,
                slot_ids: Vec::new(),
            },
        );
        self.persist(&snapshot)?;
        Ok(id)
    }

    /// Look up a package's full subtree, optionally auto-registering it
    /// when `autocreate` is given and no package exists yet. When
    /// `autocreate` is `None` and the package is unknown, returns `Ok(None)`
    /// rather than erroring — callers like the webhook intake treat a miss
    /// here as "not interested", not as a failure (§7).
    pub fn package_info(
        &self,
        packager: &str,
        name: &str,
        autocreate: Option<NewPackageSpec>,
    ) -> Result<Option<PackageInfo>> {
        let mut snapshot = self.inner.lock().unwrap();

        let package_id = match find_package(&snapshot, packager, name) {
            Some(id) => id,
            None => match autocreate {
                Some(spec) => {
                    if !snapshot.packagers.contains_key(packager) {
                        return Err(CatalogError::UnknownPackager(packager.to_string()).into());
                    }
                    let id = snapshot.alloc_id();
                    snapshot.packages.insert(
                        id,
                        PackageRow {
                            id,
                            packager: packager.to_string(),
                            name: name.to_string(),
                            os_name: spec.os_name,
                            config: spec.config,
                            slot_ids: Vec::new(),
                        },
                    );
                    self.persist(&snapshot)?;
                    id
                }
                None => return Ok(None),
            },
        };

        Ok(Some(hydrate_package(&snapshot, package_id)))
    }

    pub fn get_package_by_id(&self, package_id: Id) -> Option<PackageInfo> {
        let snapshot = self.inner.lock().unwrap();
        snapshot
            .packages
            .contains_key(&package_id)
            .then(|| hydrate_package(&snapshot, package_id))
    }

    /// Look up a package by its packager+name pair without autocreating.
    pub fn find_package_id(&self, packager: &str, name: &str) -> Option<Id> {
        let snapshot = self.inner.lock().unwrap();
        find_package(&snapshot, packager, name)
    }

    /// Overwrite a package's stored configuration (the `gem`/`pkg config`
    /// command's `extra_dirs`/`so_subdir` mutation), leaving everything
    /// else about the package untouched.
    pub fn update_package_config(&self, package_id: Id, config: PackageConfig) -> Result<()> {
        let mut snapshot = self.inner.lock().unwrap();
        snapshot
            .packages
            .get_mut(&package_id)
            .ok_or(CatalogError::UnknownPackage(package_id))?
            .config = config;
        self.persist(&snapshot)
    }

    /// The most recent revision scheduled for `slot_id` (by revision id,
    /// which is allocation order), if any — what `gem`/`pkg config`
    /// reschedules after a configuration change.
    pub fn latest_revision_for_slot(&self, slot_id: Id) -> Option<Id> {
        let snapshot = self.inner.lock().unwrap();
        let slot = snapshot.slots.get(&slot_id)?;
        slot.version_ids
            .iter()
            .filter_map(|v| snapshot.versions.get(v))
            .flat_map(|v| v.revision_ids.iter().copied())
            .max()
    }

    // ---- slots ----------------------------------------------------------

    /// Find the slot whose key is the `level`-prefix of `version`,
    /// creating it if allowed and absent. Returns `Ok(None)` (not an
    /// error) when no matching slot exists and `create_if_missing` is
    /// false — the webhook path uses this to mean "a release for a slot
    /// we do not track" (§4.7).
    pub fn slot_for_version(
        &self,
        package_id: Id,
        version: &str,
        create_if_missing: bool,
    ) -> Result<Option<Id>> {
        let mut snapshot = self.inner.lock().unwrap();
        let level = snapshot
            .packages
            .get(&package_id)
            .ok_or(CatalogError::UnknownPackage(package_id))?
            .config
            .level;
        let key = slot_key(version, level);

        if let Some(existing) = find_slot(&snapshot, package_id, &key) {
            return Ok(Some(existing));
        }
        if !create_if_missing {
            return Ok(None);
        }

        let id = snapshot.alloc_id();
        snapshot.slots.insert(
            id,
            SlotRow {
                id,
                package_id,
                key,
                config: serde_json::Value::Null,
                metadata: model::SlotMetadata::default(),
                version_ids: Vec::new(),
            },
        );
        snapshot
            .packages
            .get_mut(&package_id)
            .expect("checked above")
            .slot_ids
            .push(id);
        self.persist(&snapshot)?;
        Ok(Some(id))
    }

    pub fn set_slot_metadata(&self, slot_id: Id, metadata: model::SlotMetadata) -> Result<()> {
        let mut snapshot = self.inner.lock().unwrap();
        snapshot
            .slots
            .get_mut(&slot_id)
            .ok_or(CatalogError::UnknownSlot(slot_id))?
            .metadata = metadata;
        self.persist(&snapshot)
    }

    // ---- versions & revisions --------------------------------------------

    /// Insert the Version if new, then insert a Revision, enforcing
    /// revision-version monotonicity within (version, distribution).
    pub fn schedule_build(
        &self,
        slot_id: Id,
        version: &str,
        revision_version: &str,
        changelog: &str,
        distribution: Distribution,
        version_config: Option<VersionConfig>,
    ) -> Result<Id> {
        let mut snapshot = self.inner.lock().unwrap();
        if !snapshot.slots.contains_key(&slot_id) {
            return Err(CatalogError::UnknownSlot(slot_id).into());
        }

        let version_id = match find_version(&snapshot, slot_id, version) {
            Some(id) => id,
            None => {
                let id = snapshot.alloc_id();
                snapshot.versions.insert(
                    id,
                    VersionRow {
                        id,
                        slot_id,
                        version: version.to_string(),
                        config: version_config.unwrap_or_default(),
                        populated: false,
                        created_at: chrono::Utc::now(),
                        revision_ids: Vec::new(),
                    },
                );
                snapshot
                    .slots
                    .get_mut(&slot_id)
                    .expect("checked above")
                    .version_ids
                    .push(id);
                id
            }
        };

        check_monotonic(&snapshot, version_id, &distribution, revision_version)?;

        let revision_id = snapshot.alloc_id();
        snapshot.revisions.insert(
            revision_id,
            RevisionRow {
                id: revision_id,
                version_id,
                distribution,
                revision_version: revision_version.to_string(),
                scheduled_at: chrono::Utc::now(),
                changelog: changelog.to_string(),
                builder: None,
                built_at: None,
                claimed: None,
                result: None,
            },
        );
        snapshot
            .versions
            .get_mut(&version_id)
            .expect("just inserted or found")
            .revision_ids
            .push(revision_id);

        self.persist(&snapshot)?;
        Ok(revision_id)
    }

    /// Insert a new Revision for the same Version×Distribution as
    /// `revision_id`, with an incremented revision-version.
    pub fn schedule_rebuild(&self, revision_id: Id, changelog: &str) -> Result<Id> {
        let mut snapshot = self.inner.lock().unwrap();
        let previous = snapshot
            .revisions
            .get(&revision_id)
            .ok_or(CatalogError::UnknownRevision(revision_id))?
            .clone();

        let new_revision_version = bump_revision(&previous.revision_version);
        check_monotonic(
            &snapshot,
            previous.version_id,
            &previous.distribution,
            &new_revision_version,
        )?;

        let new_id = snapshot.alloc_id();
        snapshot.revisions.insert(
            new_id,
            RevisionRow {
                id: new_id,
                version_id: previous.version_id,
                distribution: previous.distribution.clone(),
                revision_version: new_revision_version,
                scheduled_at: chrono::Utc::now(),
                changelog: changelog.to_string(),
                builder: None,
                built_at: None,
                claimed: None,
                result: None,
            },
        );
        snapshot
            .versions
            .get_mut(&previous.version_id)
            .expect("version of an existing revision always exists")
            .revision_ids
            .push(new_id);

        self.persist(&snapshot)?;
        Ok(new_id)
    }

    /// All revisions in the same Version×Distribution as `revision_id`
    /// whose revision-version is ≤ it, ascending, for changelog stitching.
    pub fn changelog_entries(&self, revision_id: Id) -> Result<Vec<ChangelogEntry>> {
        let snapshot = self.inner.lock().unwrap();
        let target = snapshot
            .revisions
            .get(&revision_id)
            .ok_or(CatalogError::UnknownRevision(revision_id))?;
        let version = snapshot
            .versions
            .get(&target.version_id)
            .ok_or(CatalogError::UnknownVersion(target.version_id))?;
        let target_key = revision_version_key(&target.revision_version);

        let mut entries: Vec<ChangelogEntry> = version
            .revision_ids
            .iter()
            .filter_map(|id| snapshot.revisions.get(id))
            .filter(|r| r.distribution == target.distribution)
            .filter(|r| revision_version_key(&r.revision_version) <= target_key)
            .map(|r| ChangelogEntry {
                revision_version: r.revision_version.clone(),
                changelog: r.changelog.clone(),
                distribution: r.distribution.clone(),
                scheduled_at: r.scheduled_at,
            })
            .collect();

        entries.sort_by(|a, b| {
            revision_version_key(&a.revision_version).cmp(&revision_version_key(&b.revision_version))
        });
        Ok(entries)
    }

    /// The joined record a builder consumes to drive one build.
    pub fn build_data(&self, revision_id: Id) -> Result<BuildData> {
        let snapshot = self.inner.lock().unwrap();
        let revision = snapshot
            .revisions
            .get(&revision_id)
            .ok_or(CatalogError::UnknownRevision(revision_id))?;
        let version = snapshot
            .versions
            .get(&revision.version_id)
            .ok_or(CatalogError::UnknownVersion(revision.version_id))?;
        let slot = snapshot
            .slots
            .get(&version.slot_id)
            .ok_or(CatalogError::UnknownSlot(version.slot_id))?;
        let package = snapshot
            .packages
            .get(&slot.package_id)
            .ok_or(CatalogError::UnknownPackage(slot.package_id))?;

        Ok(BuildData {
            revision_id,
            packager: package.packager.clone(),
            package_name: package.name.clone(),
            package_os_name: package.os_name.clone(),
            package_config: package.config.clone(),
            slot_os_name: slot_os_name(package, slot),
            version: version.version.clone(),
            version_config: version.config.clone(),
            revision_version: revision.revision_version.clone(),
            distribution: revision.distribution.clone(),
            changelog: revision.changelog.clone(),
            populated: version.populated,
        })
    }

    /// Whether `version` is already tracked under `slot_id`, without
    /// creating anything — lets a caller like `debler-app`'s
    /// dependency-scheduling pass skip a gem it has already scheduled a
    /// build for.
    pub fn version_exists(&self, slot_id: Id, version: &str) -> bool {
        let snapshot = self.inner.lock().unwrap();
        find_version(&snapshot, slot_id, version).is_some()
    }

    /// Whether `slot_id` already tracks any version at all — lets a
    /// caller distinguish "brand new slot" from "known slot, new
    /// version" when picking a changelog message.
    pub fn slot_has_versions(&self, slot_id: Id) -> bool {
        let snapshot = self.inner.lock().unwrap();
        snapshot
            .slots
            .get(&slot_id)
            .map(|s| !s.version_ids.is_empty())
            .unwrap_or(false)
    }

    /// Every version tracked under `slot_id`, each with its revisions
    /// loaded — the subtree the `info` command walks.
    pub fn slot_versions(&self, slot_id: Id) -> Vec<VersionInfo> {
        let snapshot = self.inner.lock().unwrap();
        let Some(slot) = snapshot.slots.get(&slot_id) else {
            return Vec::new();
        };
        let mut versions: Vec<VersionInfo> = slot
            .version_ids
            .iter()
            .filter_map(|id| snapshot.versions.get(id))
            .map(|v| {
                let mut revisions: Vec<RevisionInfo> = v
                    .revision_ids
                    .iter()
                    .filter_map(|id| snapshot.revisions.get(id))
                    .map(|r| RevisionInfo {
                        id: r.id,
                        revision_version: r.revision_version.clone(),
                        distribution: r.distribution.clone(),
                        changelog: r.changelog.clone(),
                        scheduled_at: r.scheduled_at,
                        builder: r.builder.clone(),
                        built_at: r.built_at,
                        result: r.result.clone(),
                    })
                    .collect();
                revisions.sort_by(|a, b| {
                    revision_version_key(&a.revision_version).cmp(&revision_version_key(&b.revision_version))
                });
                VersionInfo {
                    id: v.id,
                    version: v.version.clone(),
                    config: v.config.clone(),
                    populated: v.populated,
                    revisions,
                }
            })
            .collect();
        versions.sort_by_key(|v| v.id);
        versions
    }

    /// Version ids whose stored `gem_format` predates `current`, or which
    /// never recorded one — the targets of the `rebuild` command's
    /// format-upgrade sweep.
    pub fn outdated_version_ids(&self, current: (u32, u32)) -> Vec<Id> {
        let snapshot = self.inner.lock().unwrap();
        let mut ids: Vec<Id> = snapshot
            .versions
            .values()
            .filter(|v| v.config.gem_format.map(|stored| stored < current).unwrap_or(true))
            .map(|v| v.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Record the `gem_format` a version was last built with.
    pub fn set_version_gem_format(&self, version_id: Id, format: (u32, u32)) -> Result<()> {
        let mut snapshot = self.inner.lock().unwrap();
        snapshot
            .versions
            .get_mut(&version_id)
            .ok_or(CatalogError::UnknownVersion(version_id))?
            .config
            .gem_format = Some(format);
        self.persist(&snapshot)
    }

    /// The most recently scheduled revision of `version_id`, if any.
    pub fn latest_revision_for_version(&self, version_id: Id) -> Option<Id> {
        let snapshot = self.inner.lock().unwrap();
        snapshot.versions.get(&version_id)?.revision_ids.iter().copied().max()
    }

    pub fn mark_version_populated(&self, version_id: Id) -> Result<()> {
        let mut snapshot = self.inner.lock().unwrap();
        snapshot
            .versions
            .get_mut(&version_id)
            .ok_or(CatalogError::UnknownVersion(version_id))?
            .populated = true;
        self.persist(&snapshot)
    }

    // ---- claim / finalize -------------------------------------------------

    /// Compare-and-swap claim: succeeds (returns `true`) only if the
    /// revision is pending and unclaimed. A losing caller should move on
    /// to the next pending revision rather than retry this one.
    pub fn claim_build(&self, revision_id: Id, host: &str) -> Result<bool> {
        let mut snapshot = self.inner.lock().unwrap();
        let revision = snapshot
            .revisions
            .get_mut(&revision_id)
            .ok_or(CatalogError::UnknownRevision(revision_id))?;

        if revision.result.is_some() || revision.claimed.is_some() {
            return Ok(false);
        }

        let now = ClaimMarker::now(host);
        revision.built_at = Some(now.claimed_at);
        revision.builder = Some(host.to_string());
        revision.claimed = Some(now);
        self.persist(&snapshot)?;
        Ok(true)
    }

    /// Set a revision's terminal result. Errors if the revision already
    /// has one (the terminal-state law: `null -> finished|failed|canceled`
    /// only, never back).
    pub fn update_build(&self, revision_id: Id, result: BuildResult) -> Result<()> {
        let mut snapshot = self.inner.lock().unwrap();
        let revision = snapshot
            .revisions
            .get_mut(&revision_id)
            .ok_or(CatalogError::UnknownRevision(revision_id))?;

        if revision.result.is_some() {
            return Err(CatalogError::TerminalStateViolation(revision_id).into());
        }
        revision.result = Some(result);
        self.persist(&snapshot)
    }

    /// Mark a pending revision `canceled` without claiming or building it.
    pub fn cancel_build(&self, revision_id: Id) -> Result<()> {
        self.update_build(revision_id, BuildResult::Canceled)
    }

    // ---- selection queries (used by debler-scheduler) ---------------------

    pub fn pending_revision_ids(&self) -> Vec<Id> {
        let snapshot = self.inner.lock().unwrap();
        let mut ids: Vec<Id> = snapshot
            .revisions
            .values()
            .filter(|r| r.result.is_none() && r.claimed.is_none())
            .map(|r| r.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn failed_revision_ids(&self) -> Vec<Id> {
        let snapshot = self.inner.lock().unwrap();
        let mut ids: Vec<Id> = snapshot
            .revisions
            .values()
            .filter(|r| r.result == Some(BuildResult::Failed))
            .map(|r| r.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn all_revision_ids(&self) -> Vec<Id> {
        let snapshot = self.inner.lock().unwrap();
        snapshot.revisions.keys().copied().collect()
    }
}

fn slot_os_name(package: &PackageRow, slot: &SlotRow) -> String {
    if slot.key.is_empty() {
        package.os_name.clone()
    } else {
        format!("{}-{}", package.os_name, slot.key.join("."))
    }
}

fn find_package(snapshot: &CatalogSnapshot, packager: &str, name: &str) -> Option<Id> {
    snapshot
        .packages
        .values()
        .find(|p| p.packager == packager && p.name == name)
        .map(|p| p.id)
}

fn find_slot(snapshot: &CatalogSnapshot, package_id: Id, key: &[String]) -> Option<Id> {
    snapshot
        .slots
        .values()
        .find(|s| s.package_id == package_id && s.key == key)
        .map(|s| s.id)
}

fn find_version(snapshot: &CatalogSnapshot, slot_id: Id, version: &str) -> Option<Id> {
    snapshot
        .versions
        .values()
        .find(|v| v.slot_id == slot_id && v.version == version)
        .map(|v| v.id)
}

fn check_monotonic(
    snapshot: &CatalogSnapshot,
    version_id: Id,
    distribution: &Distribution,
    new_revision_version: &str,
) -> Result<()> {
    let new_key = revision_version_key(new_revision_version);
    if let Some(version) = snapshot.versions.get(&version_id) {
        for revision_id in &version.revision_ids {
            if let Some(existing) = snapshot.revisions.get(revision_id) {
                if &existing.distribution != distribution {
                    continue;
                }
                let existing_key = revision_version_key(&existing.revision_version);
                if new_key <= existing_key {
                    return Err(CatalogError::RevisionNotMonotonic {
                        version_id,
                        distribution: distribution.to_string(),
                        previous: existing.revision_version.clone(),
                        new: new_revision_version.to_string(),
                    }
                    .into());
                }
            }
        }
    }
    Ok(())
}

fn hydrate_package(snapshot: &CatalogSnapshot, package_id: Id) -> PackageInfo {
    let package = &snapshot.packages[&package_id];
    let mut slots: Vec<SlotInfo> = package
        .slot_ids
        .iter()
        .filter_map(|id| snapshot.slots.get(id))
        .map(|s| SlotInfo {
            id: s.id,
            key: s.key.clone(),
            os_name: slot_os_name(package, s),
            config: s.config.clone(),
            metadata: s.metadata.clone(),
        })
        .collect();
    slots.sort_by(|a, b| a.key.cmp(&b.key));

    PackageInfo {
        id: package.id,
        packager: package.packager.clone(),
        name: package.name.clone(),
        os_name: package.os_name.clone(),
        config: package.config.clone(),
        slots,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use debler_types::PackageConfig;
    use tempfile::tempdir;

    fn open() -> (Catalog, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path()).unwrap();
        (catalog, dir)
    }

    fn seeded() -> (Catalog, tempfile::TempDir, Id) {
        let (catalog, dir) = open();
        catalog
            .register_packager("bundler", serde_json::json!({}), true)
            .unwrap();
        let package_id = catalog
            .register_package("bundler", "rails", "debler-rubygem-rails", PackageConfig::default())
            .unwrap();
        (catalog, dir, package_id)
    }

    #[test]
    fn registering_duplicate_packager_errors() {
        let (catalog, _dir) = open();
        catalog
            .register_packager("bundler", serde_json::json!({}), true)
            .unwrap();
        assert!(catalog
            .register_packager("bundler", serde_json::json!({}), true)
            .is_err());
    }

    #[test]
    fn package_info_autocreate_false_returns_none_when_missing() {
        let (catalog, _dir, _) = seeded();
        let info = catalog.package_info("bundler", "nokogiri", None).unwrap();
        assert!(info.is_none());
    }

    #[test]
    fn package_info_autocreate_registers_package() {
        let (catalog, _dir, _) = seeded();
        let spec = NewPackageSpec {
            os_name: "debler-rubygem-nokogiri".to_string(),
            config: PackageConfig::default(),
        };
        let info = catalog
            .package_info("bundler", "nokogiri", Some(spec))
            .unwrap()
            .unwrap();
        assert_eq!(info.os_name, "debler-rubygem-nokogiri");
        assert!(info.slots.is_empty());
    }

    #[test]
    fn slot_key_law_holds_for_leveled_package() {
        let (catalog, _dir) = open();
        catalog
            .register_packager("bundler", serde_json::json!({}), true)
            .unwrap();
        let mut config = PackageConfig::default();
        config.level = 2;
        let package_id = catalog
            .register_package("bundler", "rails", "debler-rubygem-rails", config)
            .unwrap();

        let slot_id = catalog
            .slot_for_version(package_id, "7.0.4", true)
            .unwrap()
            .unwrap();
        let info = catalog.get_package_by_id(package_id).unwrap();
        let slot = info.slots.iter().find(|s| s.id == slot_id).unwrap();
        assert_eq!(slot.key, vec!["7", "0"]);
        assert!(version_matches_key("7.0.4", &slot.key));
        assert!(!version_matches_key("7.1.0", &slot.key));
    }

    #[test]
    fn slot_for_version_without_create_returns_none_when_absent() {
        let (catalog, _dir, package_id) = seeded();
        let slot = catalog
            .slot_for_version(package_id, "7.0.4", false)
            .unwrap();
        assert!(slot.is_none());
    }

    #[test]
    fn schedule_build_then_rebuild_enforces_monotonicity() {
        let (catalog, _dir, package_id) = seeded();
        let slot_id = catalog
            .slot_for_version(package_id, "7.0.4", true)
            .unwrap()
            .unwrap();
        let revision_id = catalog
            .schedule_build(
                slot_id,
                "7.0.4",
                "7.0.4-1",
                "New upstream release",
                Distribution::from("unstable"),
                None,
            )
            .unwrap();

        let rebuilt_id = catalog
            .schedule_rebuild(revision_id, "Rebuild for toolchain update")
            .unwrap();
        let data = catalog.build_data(rebuilt_id).unwrap();
        assert_eq!(data.revision_version, "7.0.4-2");

        // Directly inserting a non-increasing revision-version is rejected.
        let result = catalog.schedule_build(
            slot_id,
            "7.0.4",
            "7.0.4-1",
            "duplicate",
            Distribution::from("unstable"),
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn terminal_state_law_blocks_second_transition() {
        let (catalog, _dir, package_id) = seeded();
        let slot_id = catalog
            .slot_for_version(package_id, "7.0.4", true)
            .unwrap()
            .unwrap();
        let revision_id = catalog
            .schedule_build(
                slot_id,
                "7.0.4",
                "7.0.4-1",
                "New upstream release",
                Distribution::from("unstable"),
                None,
            )
            .unwrap();

        catalog.update_build(revision_id, BuildResult::Finished).unwrap();
        let second = catalog.update_build(revision_id, BuildResult::Failed);
        assert!(second.is_err());
    }

    #[test]
    fn claim_build_cas_prevents_double_claim() {
        let (catalog, _dir, package_id) = seeded();
        let slot_id = catalog
            .slot_for_version(package_id, "7.0.4", true)
            .unwrap()
            .unwrap();
        let revision_id = catalog
            .schedule_build(
                slot_id,
                "7.0.4",
                "7.0.4-1",
                "New upstream release",
                Distribution::from("unstable"),
                None,
            )
            .unwrap();

        assert!(catalog.claim_build(revision_id, "worker-a").unwrap());
        assert!(!catalog.claim_build(revision_id, "worker-b").unwrap());
    }

    #[test]
    fn incognito_build_never_claims() {
        let (catalog, _dir, package_id) = seeded();
        let slot_id = catalog
            .slot_for_version(package_id, "7.0.4", true)
            .unwrap()
            .unwrap();
        let revision_id = catalog
            .schedule_build(
                slot_id,
                "7.0.4",
                "7.0.4-1",
                "New upstream release",
                Distribution::from("unstable"),
                None,
            )
            .unwrap();

        let data = catalog.build_data(revision_id).unwrap();
        assert_eq!(data.revision_version, "7.0.4-1");
        assert_eq!(catalog.pending_revision_ids(), vec![revision_id]);
    }

    #[test]
    fn changelog_stitching_orders_ascending_up_to_target() {
        let (catalog, _dir, package_id) = seeded();
        let slot_id = catalog
            .slot_for_version(package_id, "7.0.4", true)
            .unwrap()
            .unwrap();
        let r1 = catalog
            .schedule_build(
                slot_id,
                "7.0.4",
                "7.0.4-1",
                "New upstream release",
                Distribution::from("unstable"),
                None,
            )
            .unwrap();
        catalog.update_build(r1, BuildResult::Finished).unwrap();

        let r2 = catalog.schedule_rebuild(r1, "Fix build dependency").unwrap();
        catalog.update_build(r2, BuildResult::Failed).unwrap();

        let r3 = catalog.schedule_rebuild(r2, "Retry after infra fix").unwrap();

        let entries = catalog.changelog_entries(r3).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].revision_version, "7.0.4-1");
        assert_eq!(entries[1].revision_version, "7.0.4-2");
        assert_eq!(entries[2].revision_version, "7.0.4-3");
    }

    #[test]
    fn catalog_reopens_from_persisted_document() {
        let dir = tempdir().unwrap();
        {
            let catalog = Catalog::open(dir.path()).unwrap();
            catalog
                .register_packager("yarn", serde_json::json!({}), true)
                .unwrap();
        }
        let reopened = Catalog::open(dir.path()).unwrap();
        assert!(reopened.get_packager("yarn").is_some());
    }

    #[test]
    fn update_package_config_then_rebuild_latest_revision() {
        let (catalog, _dir, package_id) = seeded();
        let slot_id = catalog
            .slot_for_version(package_id, "7.0.4", true)
            .unwrap()
            .unwrap();
        let revision_id = catalog
            .schedule_build(
                slot_id,
                "7.0.4",
                "7.0.4-1",
                "New upstream release",
                Distribution::from("unstable"),
                None,
            )
            .unwrap();

        let mut config = catalog.get_package_by_id(package_id).unwrap().config;
        config.extra_dirs.push("locale".to_string());
        catalog.update_package_config(package_id, config).unwrap();
        assert_eq!(
            catalog.get_package_by_id(package_id).unwrap().config.extra_dirs,
            vec!["locale".to_string()]
        );

        assert_eq!(catalog.latest_revision_for_slot(slot_id), Some(revision_id));
        let rebuilt = catalog
            .schedule_rebuild(revision_id, "rebuild to include \"locale\" dir into package")
            .unwrap();
        assert_eq!(catalog.latest_revision_for_slot(slot_id), Some(rebuilt));
    }

    #[test]
    fn slot_versions_orders_revisions_ascending() {
        let (catalog, _dir, package_id) = seeded();
        let slot_id = catalog
            .slot_for_version(package_id, "7.0.4", true)
            .unwrap()
            .unwrap();
        let r1 = catalog
            .schedule_build(
                slot_id,
                "7.0.4",
                "7.0.4-1",
                "New upstream release",
                Distribution::from("unstable"),
                None,
            )
            .unwrap();
        catalog.update_build(r1, BuildResult::Finished).unwrap();
        catalog.schedule_rebuild(r1, "Fix build dependency").unwrap();

        let versions = catalog.slot_versions(slot_id);
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version, "7.0.4");
        assert_eq!(versions[0].revisions.len(), 2);
        assert_eq!(versions[0].revisions[0].revision_version, "7.0.4-1");
        assert_eq!(versions[0].revisions[1].revision_version, "7.0.4-2");
    }
}
