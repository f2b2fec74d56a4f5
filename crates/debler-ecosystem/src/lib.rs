//! Upstream package-manifest parsing for debler.
//!
//! Ruby gems and npm/yarn packages each bring their own dependency
//! manifest format; this crate turns those into data debler's scheduler
//! can act on (which packages to build, and at what version-slot
//! granularity). It does not itself talk to a registry — see
//! [`debler_registry`] for that — and it does not resolve a
//! dependency graph, only reads what upstream has already locked.
//!
//! # Example
//!
//! ```
//! use debler_ecosystem::npm::PackageJson;
//!
//! let json = r#"{"name": "lodash", "version": "4.17.21", "dependencies": {}}"#;
//! let pkg = PackageJson::parse(json).expect("parse");
//! assert_eq!(pkg.name, "lodash");
//! ```

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Ruby gem manifests: `Gemfile.lock`.
pub mod gem {
    use super::*;

    /// One locked gem entry, as it appears under a `GEM` block's `specs:`
    /// section of a `Gemfile.lock`.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct LockedGem {
        pub name: String,
        pub version: String,
        /// Other gems this one depends on, by name (version constraints
        /// on locked dependencies are informational only: the lockfile
        /// already pins an exact version for each).
        pub dependencies: Vec<String>,
    }

    /// A fully parsed `Gemfile.lock`.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct GemfileLock {
        pub remote: Option<String>,
        pub gems: BTreeMap<String, LockedGem>,
        /// Top-level dependencies declared directly in the `Gemfile`,
        /// from the lockfile's `DEPENDENCIES` section.
        pub direct_dependencies: Vec<String>,
        /// The constraint string declared in the `Gemfile` for each direct
        /// dependency that has one, e.g. `rails (~> 7.0)` -> `"~> 7.0"`.
        /// Absent when the `Gemfile` required the gem with no version
        /// constraint at all.
        pub direct_dependency_constraints: BTreeMap<String, String>,
        pub platforms: Vec<String>,
    }

    impl GemfileLock {
        /// Parse a `Gemfile.lock`'s contents.
        ///
        /// Mirrors the line-indentation state machine a `Gemfile.lock`
        /// is built from: top-level section headers (`GEM`, `PLATFORMS`,
        /// `DEPENDENCIES`, ...) start at column 0, their content is
        /// indented beneath them.
        pub fn parse(content: &str) -> Result<Self> {
            let mut lock = Self::default();
            let mut section: Option<String> = None;
            let mut section_lines: Vec<&str> = Vec::new();

            for line in content.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                if !line.starts_with(' ') {
                    if let Some(name) = section.take() {
                        lock.apply_section(&name, &section_lines)?;
                    }
                    section = Some(line.trim().to_string());
                    section_lines.clear();
                } else {
                    section_lines.push(line);
                }
            }
            if let Some(name) = section.take() {
                lock.apply_section(&name, &section_lines)?;
            }

            // `bundler` itself is not a package debler needs to build.
            lock.gems.remove("bundler");

            Ok(lock)
        }

        fn apply_section(&mut self, name: &str, lines: &[&str]) -> Result<()> {
            match name {
                "GEM" => self.parse_gem_section(lines),
                "PLATFORMS" => {
                    self.platforms = lines.iter().map(|l| l.trim().to_string()).collect();
                    Ok(())
                }
                "DEPENDENCIES" => {
                    for line in lines {
                        let line = line.trim().trim_end_matches('!');
                        let Some(name) = line.split(|c: char| c == ' ' || c == '(').next() else {
                            continue;
                        };
                        let name = name.trim();
                        if name.is_empty() {
                            continue;
                        }
                        self.direct_dependencies.push(name.to_string());
                        if let (Some(open), Some(close)) = (line.find('('), line.rfind(')')) {
                            if close > open {
                                self.direct_dependency_constraints
                                    .insert(name.to_string(), line[open + 1..close].trim().to_string());
                            }
                        }
                    }
                    Ok(())
                }
                // GIT, PATH, RUBY VERSION sections carry no build-relevant
                // data for a rubygems-sourced repackage.
                _ => Ok(()),
            }
        }

        fn parse_gem_section(&mut self, lines: &[&str]) -> Result<()> {
            let mut lines = lines.iter();
            let remote_line = lines.next().context("GEM section missing remote: line")?;
            let remote = remote_line
                .trim()
                .strip_prefix("remote: ")
                .context("malformed remote: line")?;
            self.remote = Some(remote.to_string());

            let specs_line = lines.next().context("GEM section missing specs: line")?;
            if specs_line.trim() != "specs:" {
                anyhow::bail!("expected 'specs:' after remote, got {specs_line:?}");
            }

            let mut current: Option<String> = None;
            for line in lines {
                // Spec lines are indented 4 spaces; nested dependency
                // lines beneath a spec are indented 6.
                let indent = line.len() - line.trim_start().len();
                let trimmed = line.trim();

                if indent <= 4 {
                    let (name, version) = parse_name_version(trimmed)
                        .with_context(|| format!("malformed gem spec line: {trimmed:?}"))?;
                    if version.ends_with("-java") {
                        current = None;
                        continue;
                    }
                    self.gems.entry(name.clone()).or_insert_with(|| LockedGem {
                        name: name.clone(),
                        version: version.clone(),
                        dependencies: Vec::new(),
                    });
                    if let Some(entry) = self.gems.get_mut(&name) {
                        entry.version = version;
                    }
                    current = Some(name);
                } else if let Some(name) = &current {
                    let dep_name = trimmed.split(' ').next().unwrap_or(trimmed).to_string();
                    if let Some(entry) = self.gems.get_mut(name) {
                        entry.dependencies.push(dep_name);
                    }
                }
            }

            Ok(())
        }
    }

    /// Turn a gem name into its Debian package name: `rack_test` ->
    /// `debler-rubygem-rack--test`. Underscores are doubled-dashed rather
    /// than dropped so distinct gem names can never collide after mapping.
    pub fn gem2deb(name: &str) -> String {
        format!("debler-rubygem-{}", name.replace('_', "--"))
    }

    /// Split a line like `rails (7.1.0)` into `("rails", "7.1.0")`.
    fn parse_name_version(line: &str) -> Option<(String, String)> {
        let open = line.find('(')?;
        let close = line.rfind(')')?;
        if close <= open {
            return None;
        }
        let name = line[..open].trim().to_string();
        let version = line[open + 1..close].trim().to_string();
        Some((name, version))
    }

}

/// npm package manifests: `package.json` and `yarn.lock`.
pub mod npm {
    use super::*;

    /// A parsed `package.json`.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PackageJson {
        pub name: String,
        pub version: String,
        #[serde(default)]
        pub description: Option<String>,
        #[serde(default)]
        pub private: bool,
        #[serde(default)]
        pub license: Option<String>,
        #[serde(default)]
        pub dependencies: BTreeMap<String, String>,
        #[serde(rename = "devDependencies", default)]
        pub dev_dependencies: BTreeMap<String, String>,
        #[serde(default)]
        pub scripts: BTreeMap<String, String>,
    }

    impl PackageJson {
        pub fn parse(content: &str) -> Result<Self> {
            serde_json::from_str(content).context("failed to parse package.json")
        }

        /// Runtime dependencies, plus dev dependencies when `with_dev`
        /// is set (only ever true for first-party app builds; library
        /// gem/npm repackages only need the runtime set).
        pub fn dependencies(&self, with_dev: bool) -> BTreeMap<String, String> {
            let mut deps = self.dependencies.clone();
            if with_dev {
                deps.extend(self.dev_dependencies.clone());
            }
            deps
        }
    }

    /// The operator prefix on an npm dependency range, restricted to
    /// the subset debler actually needs to reason about: the vast
    /// majority of published constraints are one of these three.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum NpmOp {
        /// `^1.2.3`: compatible within the same major (or, for a
        /// leading-zero major, the same minor).
        Caret,
        /// `~1.2.3`: compatible within the same minor.
        Tilde,
        /// `1.2.3`: exact.
        Exact,
    }

    /// A parsed npm version constraint, e.g. `^4.17.1`.
    #[derive(Debug, Clone, PartialEq)]
    pub struct NpmConstraint {
        pub op: NpmOp,
        pub version: Vec<u64>,
    }

    impl NpmConstraint {
        pub fn parse(raw: &str) -> Result<Self> {
            let raw = raw.trim();
            let (op, rest) = match raw.chars().next() {
                Some('^') => (NpmOp::Caret, &raw[1..]),
                Some('~') => (NpmOp::Tilde, &raw[1..]),
                _ => (NpmOp::Exact, raw),
            };

            let version = rest
                .split('.')
                .map(|part| part.parse::<u64>().with_context(|| format!("invalid npm version segment in {raw:?}")))
                .collect::<Result<Vec<_>>>()?;

            if version.is_empty() {
                anyhow::bail!("empty npm version in constraint {raw:?}");
            }

            Ok(Self { op, version })
        }

        /// The version-slot this constraint pins a dependency to: a
        /// caret constraint only commits to the major component, a
        /// tilde constraint to major.minor, an exact constraint to the
        /// full version. Each distinct slot gets its own debler package
        /// (`debler-node-<pkg>-<slot>`), so two apps depending on
        /// incompatible ranges of the same npm package don't collide.
        pub fn slot(&self) -> Vec<u64> {
            match self.op {
                NpmOp::Caret => self.version[..1].to_vec(),
                NpmOp::Tilde => self.version[..self.version.len().min(2)].to_vec(),
                NpmOp::Exact => self.version.clone(),
            }
        }
    }

    /// Percent-encode a package name as an on-disk/Debian-package-name
    /// safe segment, turning a scoped package's `/` into `--` the way
    /// [`npm2deb`] does for the whole name.
    pub fn npm2deb(name: &str) -> String {
        format!("debler-node-{}", name.replace('/', "--").replace('_', "--"))
    }

    /// One resolved entry from a `yarn.lock` file: the set of
    /// constraint strings that all resolved to this entry, plus the
    /// version yarn actually picked.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct YarnLockEntry {
        pub name: String,
        pub constraints: Vec<String>,
        pub version: String,
        pub resolved: Option<String>,
        pub dependencies: BTreeMap<String, String>,
    }

    /// A fully parsed `yarn.lock` (v1 format).
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct YarnLock {
        pub packages: Vec<YarnLockEntry>,
    }

    impl YarnLock {
        pub fn parse(content: &str) -> Result<Self> {
            let marker = "# yarn lockfile v1";
            let start = content
                .find(marker)
                .context("missing '# yarn lockfile v1' header")?;
            let body = &content[start + marker.len()..];

            let mut packages = Vec::new();
            for block in body.split("\n\n") {
                let block = block.trim();
                if block.is_empty() {
                    continue;
                }
                if let Some(entry) = parse_block(block)? {
                    packages.push(entry);
                }
            }

            Ok(Self { packages })
        }
    }

    fn parse_block(block: &str) -> Result<Option<YarnLockEntry>> {
        let mut lines = block.lines();
        let header = lines.next().context("empty yarn.lock block")?;
        let header = header
            .strip_suffix(':')
            .with_context(|| format!("malformed yarn.lock header: {header:?}"))?;

        let mut name: Option<String> = None;
        let mut constraints = Vec::new();
        for part in header.split(", ") {
            let part = part.trim().trim_matches('"');
            let at = part
                .rfind('@')
                .filter(|&i| i > 0) // keep a leading `@scope/name` intact
                .with_context(|| format!("malformed yarn.lock descriptor: {part:?}"))?;
            let (pkg_name, constraint) = (&part[..at], &part[at + 1..]);
            match &name {
                None => name = Some(pkg_name.to_string()),
                Some(existing) => {
                    if existing != pkg_name {
                        anyhow::bail!("mismatched package names in yarn.lock block: {existing} vs {pkg_name}");
                    }
                }
            }
            constraints.push(constraint.to_string());
        }

        let name = name.context("yarn.lock block had no descriptors")?;

        let mut version = None;
        let mut resolved = None;
        let mut dependencies = BTreeMap::new();
        let mut in_dependencies = false;

        for line in lines {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let indent = line.len() - line.trim_start().len();

            if indent <= 2 {
                in_dependencies = trimmed == "dependencies:" || trimmed == "optionalDependencies:";
                if let Some(v) = trimmed.strip_prefix("version ") {
                    version = Some(v.trim_matches('"').to_string());
                }
                if let Some(r) = trimmed.strip_prefix("resolved ") {
                    resolved = Some(r.trim_matches('"').to_string());
                }
            } else if in_dependencies
                && let Some((dep_name, dep_range)) = trimmed.split_once(' ')
            {
                dependencies.insert(dep_name.trim_matches('"').to_string(), dep_range.trim_matches('"').to_string());
            }
        }

        let version = version.with_context(|| format!("yarn.lock entry for {name} missing version"))?;

        Ok(Some(YarnLockEntry {
            name,
            constraints,
            version,
            resolved,
            dependencies,
        }))
    }

}
