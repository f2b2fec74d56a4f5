//! Core catalog and config types shared across the workspace: the
//! [`Distribution`] value, per-package configuration keys, build results,
//! and the claim marker used for multi-worker coordination.
//!
//! These are plain data types with no persistence or parsing logic of
//! their own; [`debler_catalog`](../debler_catalog) owns the entity tree
//! that is built out of them.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A target OS release name, e.g. `bookworm` or `noble`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Distribution(pub String);

impl Distribution {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Distribution {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Distribution {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Three-valued flag: `native` package configuration can be known true,
/// known false, or left for the builder to detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tristate {
    True,
    False,
    #[default]
    Unknown,
}

/// Recognized per-package configuration keys (§3 of the package config
/// table). Unrecognized keys are preserved in `extra` so round-tripping
/// through the catalog never silently drops operator-set values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    /// Width of the slot key: how many leading version components define
    /// the slot. Packages default to `0` (one slot for the whole package)
    /// unless explicitly configured.
    pub level: u32,
    /// Whether native extensions are expected to be built.
    pub native: Tristate,
    /// Extra upstream subdirectories to include in the packaged layout.
    #[serde(default)]
    pub extra_dirs: Vec<String>,
    /// Destination subdirectory for produced shared objects.
    pub so_subdir: Option<String>,
    /// Extra build-time OS dependencies.
    #[serde(default)]
    pub builddeps: Vec<String>,
    /// Extra runtime OS dependencies.
    #[serde(default)]
    pub rundeps: Vec<String>,
    /// Extensions to skip building.
    #[serde(default)]
    pub skip_exts: Vec<String>,
    /// Arguments forwarded to native-extension configure scripts.
    #[serde(default)]
    pub ext_args: Vec<String>,
    /// This package is itself a build-time dependency of other gems
    /// (contributes `-I` load-path flags instead of a runtime dep).
    #[serde(default)]
    pub buildgem: bool,
    /// Suppress the runtime dependency entirely.
    #[serde(default)]
    pub ignore: bool,
    /// Any configuration keys not recognized above, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// The terminal outcome of a build [`Revision`]. `None` (absent) means
/// the revision is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildResult {
    Finished,
    Failed,
    Canceled,
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildResult::Finished => "finished",
            BuildResult::Failed => "failed",
            BuildResult::Canceled => "canceled",
        };
        write!(f, "{s}")
    }
}

/// The compare-and-swap marker a worker writes onto a revision before
/// building it. A second worker that observes this already set moves on
/// to the next pending revision rather than double-building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimMarker {
    pub host: String,
    pub claimed_at: DateTime<Utc>,
}

impl ClaimMarker {
    pub fn now(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            claimed_at: Utc::now(),
        }
    }
}

/// Classification of an error surfaced while processing a build, matching
/// the cause-based taxonomy: infrastructure failures in the packaging
/// tool-chain are distinguished from programming errors so the scheduler
/// loop can report them differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Packaging tool-chain failure (dpkg-buildpackage, chroot builder, signer).
    Infrastructure,
    /// Upstream fetch or extraction failure.
    UpstreamFetch,
    /// A programming error: missing metadata field, unknown operator, etc.
    Programming,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distribution_display_roundtrip() {
        let d = Distribution::from("bookworm");
        assert_eq!(d.to_string(), "bookworm");
        assert_eq!(d.as_str(), "bookworm");
    }

    #[test]
    fn package_config_default_is_permissive() {
        let cfg = PackageConfig::default();
        assert_eq!(cfg.level, 0);
        assert_eq!(cfg.native, Tristate::Unknown);
        assert!(!cfg.ignore);
    }

    #[test]
    fn package_config_preserves_unknown_keys() {
        let json = serde_json::json!({
            "level": 2,
            "native": "true",
            "some_future_key": "value",
        });
        let cfg: PackageConfig = serde_json::from_value(json).unwrap();
        assert_eq!(cfg.level, 2);
        assert_eq!(cfg.native, Tristate::True);
        assert_eq!(
            cfg.extra.get("some_future_key").and_then(|v| v.as_str()),
            Some("value")
        );
    }

    #[test]
    fn build_result_display() {
        assert_eq!(BuildResult::Finished.to_string(), "finished");
        assert_eq!(BuildResult::Failed.to_string(), "failed");
        assert_eq!(BuildResult::Canceled.to_string(), "canceled");
    }

    #[test]
    fn claim_marker_serde_roundtrip() {
        let marker = ClaimMarker::now("builder-1");
        let json = serde_json::to_string(&marker).unwrap();
        let parsed: ClaimMarker = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.host, "builder-1");
    }
}
