//! An application's packaging manifest: name, directories, files,
//! executables, and the ecosystem-specific bits (today just `bundler`)
//! an [`crate::AppIntegrator`] needs to read its locked dependencies.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One installed file or directory, relative to the app's install root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallEntry {
    pub src: String,
    pub dest: String,
}

/// An executable the app ships, installed as a wrapper script that sets
/// up the load path before dispatching to the real entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppExecutable {
    pub name: String,
    pub entry: String,
}

/// A first-party application description, as loaded from its YAML
/// manifest (the `pkgapp` command's input).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSpec {
    pub name: String,
    pub version: String,
    pub basedir: PathBuf,
    pub homepage: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Path to the `Gemfile.lock` relative to `basedir`, when this app
    /// has a `bundler` dependency set.
    pub gemfile_lock: Option<String>,
    #[serde(default)]
    pub dirs: Vec<InstallEntry>,
    #[serde(default)]
    pub files: Vec<InstallEntry>,
    #[serde(default)]
    pub executables: Vec<AppExecutable>,
    /// Emit a "bundler launcher" wrapper that seeds the load path and
    /// dispatches to a file argument or a registered gem binary.
    #[serde(default)]
    pub bundler_launcher: bool,
}

impl AppSpec {
    /// Load an app manifest from its YAML document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("parsing app manifest")
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading app manifest {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// The absolute path to this app's `Gemfile.lock`, if it declares one.
    pub fn gemfile_lock_path(&self) -> Option<PathBuf> {
        self.gemfile_lock.as_ref().map(|rel| self.basedir.join(rel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = "\
name: acme-dashboard
version: 1.4.0
basedir: /srv/apps/acme-dashboard
homepage: https://example.org
description: Internal metrics dashboard
gemfile_lock: Gemfile.lock
bundler_launcher: true
dirs:
  - src: app
    dest: /usr/share/acme-dashboard/app
executables:
  - name: acme-dashboard
    entry: bin/acme-dashboard
";

    #[test]
    fn parses_full_manifest() {
        let spec = AppSpec::from_yaml(MANIFEST).expect("parse");
        assert_eq!(spec.name, "acme-dashboard");
        assert_eq!(spec.executables.len(), 1);
        assert!(spec.bundler_launcher);
    }

    #[test]
    fn gemfile_lock_path_joins_basedir() {
        let spec = AppSpec::from_yaml(MANIFEST).expect("parse");
        assert_eq!(
            spec.gemfile_lock_path(),
            Some(PathBuf::from("/srv/apps/acme-dashboard/Gemfile.lock"))
        );
    }

    #[test]
    fn missing_gemfile_lock_is_none() {
        let spec = AppSpec::from_yaml("name: x\nversion: \"1\"\nbasedir: /x\n").expect("parse");
        assert_eq!(spec.gemfile_lock_path(), None);
    }
}
