//! Configuration file handling for debler.
//!
//! The operator maintains a single YAML file under `$DEBLER_HOME`
//! (default `~/.debler/config.yaml`) recording where the catalog and
//! ecosystem caches live, the signing identity, and per-ecosystem
//! upload targets. This crate loads that raw record and converts it
//! into the fully-typed values the rest of debler actually wants
//! (parsed durations, a [`Distribution`], a derived retry policy) so
//! no other component re-parses a string.
//!
//! # Example
//!
//! ```
//! use debler_config::RawConfig;
//!
//! let yaml = r#"
//! database: /var/lib/debler/catalog.json
//! appdir: /var/cache/debler/apps
//! gemdir: /var/cache/debler/gems
//! npmdir: /var/cache/debler/npm
//! keyid: "0xDEADBEEF"
//! maintainer: "Debler Autobuilder <debler@example.org>"
//! distribution: unstable
//! "#;
//! let raw: RawConfig = serde_yaml::from_str(yaml).expect("parse");
//! let config = raw.into_config().expect("convert");
//! assert_eq!(config.maintainer, "Debler Autobuilder <debler@example.org>");
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use debler_types::Distribution;
use serde::{Deserialize, Serialize};

/// File, relative to `$DEBLER_HOME`, holding the operator's config.
pub const CONFIG_FILE: &str = "config.yaml";

pub fn config_path(debler_home: &Path) -> PathBuf {
    debler_home.join(CONFIG_FILE)
}

/// Upload targets for a single ecosystem's built packages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageUploads {
    #[serde(default)]
    pub gem: Option<String>,
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub npm: Option<String>,
}

/// The raw YAML shape of the config file, matching its on-disk keys
/// one-to-one before any derived/parsed values are computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawConfig {
    pub database: String,
    pub appdir: String,
    pub gemdir: String,
    pub npmdir: String,
    pub keyid: String,
    pub maintainer: String,
    #[serde(default = "default_rubies")]
    pub rubies: Vec<String>,
    #[serde(default = "default_gem_format")]
    pub gem_format: (u32, u32),
    #[serde(default = "default_distribution")]
    pub distribution: String,
    #[serde(default)]
    pub package_uploads: PackageUploads,
    #[serde(default = "default_rubygems")]
    pub rubygems: String,
}

fn default_rubies() -> Vec<String> {
    vec!["ruby3.1".to_string()]
}

fn default_gem_format() -> (u32, u32) {
    (4, 0)
}

fn default_distribution() -> String {
    "unstable".to_string()
}

fn default_rubygems() -> String {
    "https://rubygems.org".to_string()
}

impl RawConfig {
    /// Convert the raw record into a fully-typed [`Config`], parsing
    /// the distribution name and validating the gem format tuple.
    pub fn into_config(self) -> Result<Config> {
        if self.rubies.is_empty() {
            anyhow::bail!("config: `rubies` must list at least one interpreter variant");
        }

        Ok(Config {
            database: PathBuf::from(self.database),
            appdir: PathBuf::from(self.appdir),
            gemdir: PathBuf::from(self.gemdir),
            npmdir: PathBuf::from(self.npmdir),
            keyid: self.keyid,
            maintainer: self.maintainer,
            rubies: self.rubies,
            gem_format: self.gem_format,
            distribution: Distribution::from(self.distribution),
            package_uploads: self.package_uploads,
            rubygems: self.rubygems,
        })
    }
}

/// Fully-typed debler configuration, threaded explicitly through every
/// component constructor rather than read from a process-wide
/// singleton.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: PathBuf,
    pub appdir: PathBuf,
    pub gemdir: PathBuf,
    pub npmdir: PathBuf,
    pub keyid: String,
    pub maintainer: String,
    pub rubies: Vec<String>,
    pub gem_format: (u32, u32),
    pub distribution: Distribution,
    pub package_uploads: PackageUploads,
    pub rubygems: String,
}

impl Config {
    /// Whether a stored revision built with `stored_format` needs a
    /// rebuild to pick up a newer `gem_format`.
    pub fn needs_format_rebuild(&self, stored_format: (u32, u32)) -> bool {
        stored_format < self.gem_format
    }
}

/// Load configuration from `$DEBLER_HOME/config.yaml`.
pub fn load_config(debler_home: &Path) -> Result<Config> {
    let path = config_path(debler_home);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let raw: RawConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    raw.into_config()
}

/// Load configuration from an arbitrary file path (used by tests and
/// by `--config` overrides).
pub fn load_config_from_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let raw: RawConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    raw.into_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_yaml() -> &'static str {
        r#"
database: /var/lib/debler/catalog.json
appdir: /var/cache/debler/apps
gemdir: /var/cache/debler/gems
npmdir: /var/cache/debler/npm
keyid: "0xDEADBEEF"
maintainer: "Debler Autobuilder <debler@example.org>"
rubies: ["ruby3.1", "ruby3.2"]
gem_format: [4, 0]
distribution: unstable
package_uploads:
  gem: gem-repo
  app: app-repo
  npm: npm-repo
rubygems: https://rubygems.org
"#
    }

    #[test]
    fn parses_full_config() {
        let raw: RawConfig = serde_yaml::from_str(sample_yaml()).expect("parse");
        let config = raw.into_config().expect("convert");

        assert_eq!(config.database, PathBuf::from("/var/lib/debler/catalog.json"));
        assert_eq!(config.rubies, vec!["ruby3.1".to_string(), "ruby3.2".to_string()]);
        assert_eq!(config.gem_format, (4, 0));
        assert_eq!(config.distribution.to_string(), "unstable");
        assert_eq!(config.package_uploads.gem.as_deref(), Some("gem-repo"));
    }

    #[test]
    fn applies_defaults_for_missing_optional_keys() {
        let yaml = r#"
database: /var/lib/debler/catalog.json
appdir: /var/cache/debler/apps
gemdir: /var/cache/debler/gems
npmdir: /var/cache/debler/npm
keyid: "0xDEADBEEF"
maintainer: "Debler Autobuilder <debler@example.org>"
"#;
        let raw: RawConfig = serde_yaml::from_str(yaml).expect("parse");
        let config = raw.into_config().expect("convert");

        assert_eq!(config.rubies, vec!["ruby3.1".to_string()]);
        assert_eq!(config.gem_format, (4, 0));
        assert_eq!(config.distribution.to_string(), "unstable");
        assert_eq!(config.rubygems, "https://rubygems.org");
    }

    #[test]
    fn rejects_empty_rubies_list() {
        let yaml = r#"
database: /var/lib/debler/catalog.json
appdir: /var/cache/debler/apps
gemdir: /var/cache/debler/gems
npmdir: /var/cache/debler/npm
keyid: "0xDEADBEEF"
maintainer: "Debler Autobuilder <debler@example.org>"
rubies: []
"#;
        let raw: RawConfig = serde_yaml::from_str(yaml).expect("parse");
        assert!(raw.into_config().is_err());
    }

    #[test]
    fn needs_format_rebuild_compares_tuples() {
        let raw: RawConfig = serde_yaml::from_str(sample_yaml()).expect("parse");
        let config = raw.into_config().expect("convert");

        assert!(config.needs_format_rebuild((3, 9)));
        assert!(!config.needs_format_rebuild((4, 0)));
        assert!(!config.needs_format_rebuild((5, 0)));
    }

    #[test]
    fn load_config_from_file_roundtrip() {
        let td = tempdir().expect("tempdir");
        let path = td.path().join("config.yaml");
        std::fs::write(&path, sample_yaml()).expect("write");

        let config = load_config_from_file(&path).expect("load");
        assert_eq!(config.maintainer, "Debler Autobuilder <debler@example.org>");
    }

    #[test]
    fn config_path_helper() {
        let home = PathBuf::from("/home/op/.debler");
        assert_eq!(config_path(&home), PathBuf::from("/home/op/.debler/config.yaml"));
    }
}
