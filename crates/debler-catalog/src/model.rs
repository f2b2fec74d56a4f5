//! The relational shape of the catalog: rows as they are persisted
//! ([`PackagerRow`] .. [`RevisionRow`]), and the hydrated views operations
//! return to callers ([`PackageInfo`], [`SlotInfo`], [`ChangelogEntry`],
//! [`BuildData`]).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use debler_types::{BuildResult, ClaimMarker, Distribution, PackageConfig};
use serde::{Deserialize, Serialize};

pub type Id = u64;

/// A plugin kind (`bundler`, `yarn`, …), identified by its stable name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagerRow {
    pub name: String,
    pub config: serde_json::Value,
    pub enabled: bool,
}

/// VCS source pin for a version fetched from a git checkout rather than
/// the ecosystem's registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionConfig {
    pub git: Option<GitSource>,
    /// The `gem_format` tuple this version was last built with, so the
    /// `rebuild` command can find versions that predate a configured
    /// format bump. `None` for versions never built under format
    /// tracking.
    #[serde(default)]
    pub gem_format: Option<(u32, u32)>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitSource {
    pub repository: String,
    pub revision: String,
}

/// Metadata derived from a slot's last successful build, used to
/// generate dependents' load paths and wrapper scripts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotMetadata {
    pub require_paths: Vec<String>,
    pub binaries: Vec<String>,
    pub require_entry: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageRow {
    pub id: Id,
    pub packager: String,
    pub name: String,
    pub os_name: String,
    pub config: PackageConfig,
    pub slot_ids: Vec<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotRow {
    pub id: Id,
    pub package_id: Id,
    pub key: Vec<String>,
    pub config: serde_json::Value,
    pub metadata: SlotMetadata,
    pub version_ids: Vec<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRow {
    pub id: Id,
    pub slot_id: Id,
    pub version: String,
    pub config: VersionConfig,
    pub populated: bool,
    pub created_at: DateTime<Utc>,
    pub revision_ids: Vec<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionRow {
    pub id: Id,
    pub version_id: Id,
    pub distribution: Distribution,
    pub revision_version: String,
    pub scheduled_at: DateTime<Utc>,
    pub changelog: String,
    pub builder: Option<String>,
    pub built_at: Option<DateTime<Utc>>,
    pub claimed: Option<ClaimMarker>,
    pub result: Option<BuildResult>,
}

/// The full entity tree, persisted as one schema-versioned document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub packagers: BTreeMap<String, PackagerRow>,
    pub packages: BTreeMap<Id, PackageRow>,
    pub slots: BTreeMap<Id, SlotRow>,
    pub versions: BTreeMap<Id, VersionRow>,
    pub revisions: BTreeMap<Id, RevisionRow>,
    pub next_id: Id,
}

impl CatalogSnapshot {
    pub fn alloc_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }
}

/// A packager as returned by [`crate::Catalog::get_packager`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Packager {
    pub name: String,
    pub config: serde_json::Value,
    pub enabled: bool,
}

impl From<&PackagerRow> for Packager {
    fn from(row: &PackagerRow) -> Self {
        Packager {
            name: row.name.clone(),
            config: row.config.clone(),
            enabled: row.enabled,
        }
    }
}

/// A slot hydrated for display, with its OS-package name already derived
/// (the package's OS name with the slot key appended).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotInfo {
    pub id: Id,
    pub key: Vec<String>,
    pub os_name: String,
    pub config: serde_json::Value,
    pub metadata: SlotMetadata,
}

/// A package with all slots loaded, ordered by slot key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageInfo {
    pub id: Id,
    pub packager: String,
    pub name: String,
    pub os_name: String,
    pub config: PackageConfig,
    pub slots: Vec<SlotInfo>,
}

/// A new package's parameters, used when [`crate::Catalog::package_info`]
/// is called with autocreate enabled.
#[derive(Debug, Clone)]
pub struct NewPackageSpec {
    pub os_name: String,
    pub config: PackageConfig,
}

/// One stanza of a changelog, as returned by
/// [`crate::Catalog::changelog_entries`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangelogEntry {
    pub revision_version: String,
    pub changelog: String,
    pub distribution: Distribution,
    pub scheduled_at: DateTime<Utc>,
}

/// A revision hydrated for display by the `info` command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevisionInfo {
    pub id: Id,
    pub revision_version: String,
    pub distribution: Distribution,
    pub changelog: String,
    pub scheduled_at: DateTime<Utc>,
    pub builder: Option<String>,
    pub built_at: Option<DateTime<Utc>>,
    pub result: Option<BuildResult>,
}

/// A version with all its revisions loaded, ascending by revision-version,
/// as returned by [`crate::Catalog::slot_versions`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionInfo {
    pub id: Id,
    pub version: String,
    pub config: VersionConfig,
    pub populated: bool,
    pub revisions: Vec<RevisionInfo>,
}

/// The joined revision record a builder consumes to drive a build.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildData {
    pub revision_id: Id,
    pub packager: String,
    pub package_name: String,
    pub package_os_name: String,
    pub package_config: PackageConfig,
    pub slot_os_name: String,
    pub version: String,
    pub version_config: VersionConfig,
    pub revision_version: String,
    pub distribution: Distribution,
    pub changelog: String,
    pub populated: bool,
}
