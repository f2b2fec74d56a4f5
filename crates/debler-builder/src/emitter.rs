//! The generator emitter protocol: per-packager generators don't
//! write files directly, they yield [`EmitRecord`]s that [`DebianTree`]
//! collects and turns into the on-disk `debian/` layout deterministically.

use std::collections::BTreeMap;

/// One contribution to the generated packaging tree, yielded by a
/// per-packager generator and folded into a [`DebianTree`] by
/// [`DebianTree::materialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitRecord {
    /// Merge key-value pairs into the source control stanza. `Description`
    /// is normalized (`\n\n` -> `\n.\n`, each line prefixed with a space)
    /// by [`DebianTree`] when the stanza is formatted, not by the caller.
    SourceControl { fields: Vec<(String, String)> },
    /// Append to the source stanza's `Build-Depends`.
    BuildDependency { dep: String },
    /// Open a new binary-package stanza.
    Package {
        name: String,
        arch: String,
        section: String,
        description: String,
    },
    /// Append to a package's `Depends`.
    Dependency { package: String, dep: String },
    /// Append to a package's `Provides`.
    Provide { package: String, provide: String },
    /// Record a symlink in the package's `.links` manifest.
    Symlink {
        package: String,
        dest: String,
        src: String,
    },
    /// Record a file install. If `obj` contains spaces, a `cp` override
    /// rule is emitted instead of a `.install` line (`dh_install` cannot
    /// handle space-containing source paths).
    Install {
        package: String,
        obj: String,
        dest: String,
    },
    /// Like [`EmitRecord::Install`], installing into a directory rather
    /// than a named destination file.
    InstallInto {
        package: String,
        obj: String,
        dir: String,
    },
    /// Write `debian/<name>` with `content` and `mode`, then install it
    /// into the package (a generated maintainer script or config file).
    InstallContent {
        package: String,
        name: String,
        dest: String,
        content: String,
        mode: u32,
    },
    /// Write an auxiliary `debian/<name>` that is not installed directly
    /// (a shared library shim referenced by a maintainer script).
    DebianContent {
        name: String,
        content: String,
        mode: u32,
    },
    /// Ensure an `override_dh_auto_<target>` block exists in the rules
    /// file, even with no body (suppresses the default rule).
    RuleOverride { target: String },
    /// Append a shell command to the `override_dh_auto_<target>` block.
    RuleAction { target: String, cmd: String },
    /// Conjunctive signal: if any generator emits `false`, the hermetic
    /// (chroot) build path is used instead of the fast native path.
    FastBuild { possible: bool },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageStanza {
    pub name: String,
    pub arch: String,
    pub section: String,
    pub description: String,
    pub depends: Vec<String>,
    pub provides: Vec<String>,
    pub links: Vec<(String, String)>,
    pub installs: Vec<(String, String)>,
    pub install_into: Vec<(String, String)>,
    pub content_files: Vec<(String, String, String, u32)>,
}

/// The collected, order-preserving materialization of a generator's
/// emitted records: everything the base builder needs to write the
/// `debian/` tree.
#[derive(Debug, Clone, Default)]
pub struct DebianTree {
    pub source_fields: Vec<(String, String)>,
    pub build_deps: Vec<String>,
    pub packages: Vec<PackageStanza>,
    pub rule_actions: BTreeMap<String, Vec<String>>,
    pub debian_content: Vec<(String, String, u32)>,
    pub fast_build_possible: bool,
}

impl DebianTree {
    /// Fold a generator's records into a tree, in the order given:
    /// source stanza first (by construction — `SourceControl`/
    /// `BuildDependency` never depend on package order), then binary
    /// stanzas in the order their `Package` record first appeared.
    pub fn materialize(records: Vec<EmitRecord>) -> DebianTree {
        let mut tree = DebianTree {
            fast_build_possible: true,
            ..DebianTree::default()
        };
        let mut index: BTreeMap<String, usize> = BTreeMap::new();

        for record in records {
            match record {
                EmitRecord::SourceControl { fields } => {
                    for (key, value) in fields {
                        if let Some(existing) = tree.source_fields.iter_mut().find(|(k, _)| *k == key) {
                            existing.1 = value;
                        } else {
                            tree.source_fields.push((key, value));
                        }
                    }
                }
                EmitRecord::BuildDependency { dep } => tree.build_deps.push(dep),
                EmitRecord::Package {
                    name,
                    arch,
                    section,
                    description,
                } => {
                    index.entry(name.clone()).or_insert_with(|| {
                        tree.packages.push(PackageStanza {
                            name: name.clone(),
                            arch,
                            section,
                            description,
                            ..PackageStanza::default()
                        });
                        tree.packages.len() - 1
                    });
                }
                EmitRecord::Dependency { package, dep } => {
                    tree.package_mut(&mut index, &package).depends.push(dep);
                }
                EmitRecord::Provide { package, provide } => {
                    tree.package_mut(&mut index, &package).provides.push(provide);
                }
                EmitRecord::Symlink { package, dest, src } => {
                    tree.package_mut(&mut index, &package).links.push((dest, src));
                }
                EmitRecord::Install { package, obj, dest } => {
                    if obj.contains(' ') {
                        tree.rule_actions.entry("install".to_string()).or_default().push(format!(
                            "cp '{obj}' debian/{package}/{dest}"
                        ));
                    } else {
                        tree.package_mut(&mut index, &package).installs.push((obj, dest));
                    }
                }
                EmitRecord::InstallInto { package, obj, dir } => {
                    if obj.contains(' ') {
                        tree.rule_actions.entry("install".to_string()).or_default().push(format!(
                            "cp '{obj}' debian/{package}/{dir}/"
                        ));
                    } else {
                        tree.package_mut(&mut index, &package).install_into.push((obj, dir));
                    }
                }
                EmitRecord::InstallContent {
                    package,
                    name,
                    dest,
                    content,
                    mode,
                } => {
                    tree.package_mut(&mut index, &package)
                        .content_files
                        .push((name, dest, content, mode));
                }
                EmitRecord::DebianContent { name, content, mode } => {
                    tree.debian_content.push((name, content, mode));
                }
                EmitRecord::RuleOverride { target } => {
                    tree.rule_actions.entry(target).or_default();
                }
                EmitRecord::RuleAction { target, cmd } => {
                    tree.rule_actions.entry(target).or_default().push(cmd);
                }
                EmitRecord::FastBuild { possible } => {
                    tree.fast_build_possible &= possible;
                }
            }
        }

        tree
    }

    fn package_mut(&mut self, index: &mut BTreeMap<String, usize>, name: &str) -> &mut PackageStanza {
        let idx = *index.entry(name.to_string()).or_insert_with(|| {
            self.packages.push(PackageStanza {
                name: name.to_string(),
                ..PackageStanza::default()
            });
            self.packages.len() - 1
        });
        &mut self.packages[idx]
    }

    /// Render the `debian/control` file: source stanza, then binary
    /// stanzas in insertion order.
    pub fn format_control(&self, source_name: &str, maintainer: &str) -> String {
        let mut out = String::new();
        out.push_str(&format!("Source: {source_name}\n"));
        out.push_str(&format!("Maintainer: {maintainer}\n"));
        for (key, value) in &self.source_fields {
            if key == "Description" {
                out.push_str(&format!("Description: {}\n", normalize_description(value)));
            } else {
                out.push_str(&format!("{key}: {value}\n"));
            }
        }
        if !self.build_deps.is_empty() {
            out.push_str(&format!("Build-Depends: {}\n", self.build_deps.join(", ")));
        }

        for pkg in &self.packages {
            out.push('\n');
            out.push_str(&format!("Package: {}\n", pkg.name));
            out.push_str(&format!("Architecture: {}\n", pkg.arch));
            out.push_str(&format!("Section: {}\n", pkg.section));
            if !pkg.depends.is_empty() {
                out.push_str(&format!("Depends: {}\n", pkg.depends.join(", ")));
            }
            if !pkg.provides.is_empty() {
                out.push_str(&format!("Provides: {}\n", pkg.provides.join(", ")));
            }
            out.push_str(&format!("Description: {}\n", normalize_description(&pkg.description)));
        }

        out
    }

    /// Render `debian/<package>.install`, if the package has any installs.
    pub fn format_install_manifest(&self, pkg: &PackageStanza) -> Option<String> {
        if pkg.installs.is_empty() && pkg.install_into.is_empty() {
            return None;
        }
        let mut out = String::new();
        for (obj, dest) in &pkg.installs {
            out.push_str(&format!("{obj} {dest}\n"));
        }
        for (obj, dir) in &pkg.install_into {
            out.push_str(&format!("{obj} {dir}\n"));
        }
        Some(out)
    }

    /// Render `debian/<package>.links`, if the package has any symlinks.
    pub fn format_links_manifest(&self, pkg: &PackageStanza) -> Option<String> {
        if pkg.links.is_empty() {
            return None;
        }
        let mut out = String::new();
        for (dest, src) in &pkg.links {
            out.push_str(&format!("{dest} {src}\n"));
        }
        Some(out)
    }

    /// Render `debian/rules`, assembling collected `override_dh_auto_*`
    /// blocks from `RuleOverride`/`RuleAction` records.
    pub fn format_rules(&self) -> String {
        let mut out = String::from("#!/usr/bin/make -f\n\n%:\n\tdh $@\n");
        for (target, actions) in &self.rule_actions {
            out.push_str(&format!("\noverride_dh_auto_{target}:\n"));
            for action in actions {
                out.push_str(&format!("\t{action}\n"));
            }
        }
        out
    }
}

fn normalize_description(description: &str) -> String {
    description
        .replace("\n\n", "\n.\n")
        .lines()
        .collect::<Vec<_>>()
        .join("\n ")
}
