//! Per-packager app integrators: read an app's locked dependency set,
//! make sure every needed slot+version has a scheduled build, and yield
//! the same [`EmitRecord`]s a gem or npm generator would — the base
//! builder has no knowledge of how any particular ecosystem is wired.

use anyhow::{Context, Result};
use debler_builder::emitter::EmitRecord;
use debler_catalog::{Catalog, Id, NewPackageSpec, PackageInfo, slot_key};
use debler_constraints::compile::{Slot, compile_to_os_deps};
use debler_constraints::gem::parse_constraints;
use debler_ecosystem::gem::{GemfileLock, gem2deb};
use debler_types::{Distribution, PackageConfig};
use debler_version::GemVersion;

use crate::spec::AppSpec;

/// A per-packager translation from an app's dependency manifest to
/// scheduled builds and packaging records. The app builder composes
/// these without knowing which ecosystems are in play.
pub trait AppIntegrator {
    /// Walk the locked dependencies and ensure every needed slot+version
    /// has a scheduled build, returning the ids of any newly scheduled
    /// revisions.
    fn schedule_dep_builds(&self, catalog: &Catalog, app: &AppSpec) -> Result<Vec<Id>>;

    /// Produce the packaging records this integrator contributes for
    /// `app` — dependencies, symlinks, load-path files, wrapper scripts.
    fn emit(&self, catalog: &Catalog, app: &AppSpec) -> Result<Vec<EmitRecord>>;
}

/// Integrates a `bundler`-managed Ruby app: every gem in its
/// `Gemfile.lock` becomes a `Dependency` on the matching rubygem slot,
/// with gemspecs symlinked into the app's on-disk gem directory and,
/// when requested, a "bundler launcher" wrapper script.
pub struct BundlerAppIntegrator {
    pub rubies: Vec<String>,
    pub distribution: Distribution,
}

impl BundlerAppIntegrator {
    fn load_lock(&self, app: &AppSpec) -> Result<GemfileLock> {
        let path = app
            .gemfile_lock_path()
            .context("app has no gemfile_lock configured")?;
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        GemfileLock::parse(&content)
    }

    /// `Slot<GemVersion>` bounds for every slot of `package`, derived
    /// from each slot's key — the half-open interval a version with
    /// that key prefix can occupy. Only meaningful when `level > 0`;
    /// a `level == 0` package has exactly one, all-encompassing slot.
    fn slot_bounds(package: &PackageInfo) -> Result<Vec<Slot<GemVersion>>> {
        package
            .slots
            .iter()
            .map(|slot| {
                let min = GemVersion::parse(&slot.key.join("."))
                    .with_context(|| format!("slot key {:?} is not a version prefix", slot.key))?;
                let mut bumped = slot.key.clone();
                let last = bumped.last_mut().expect("level > 0 slots have a non-empty key");
                let next: u64 = last.parse::<u64>().unwrap_or(0) + 1;
                *last = next.to_string();
                let max = GemVersion::parse(&bumped.join("."))?;
                Ok(Slot {
                    os_name: slot.os_name.clone(),
                    min_version: min,
                    max_version: max,
                })
            })
            .collect()
    }

    /// The `Depends:` clause for one locked gem: a single clause, with
    /// `|`-joined alternatives when the `Gemfile` declared a constraint
    /// and the package is split across more than one slot (any slot
    /// whose version range overlaps the constraint is an acceptable
    /// alternative), otherwise an unqualified dependency on the
    /// resolved slot.
    fn dependency_clause(
        &self,
        package: &PackageInfo,
        gem_name: &str,
        resolved_slot_os_name: &str,
        constraint: Option<&str>,
    ) -> Result<String> {
        if package.config.level > 0 && package.slots.len() > 1 {
            if let Some(constraint) = constraint {
                let parsed = parse_constraints(constraint)
                    .with_context(|| format!("parsing constraint {constraint:?} for {gem_name}"))?;
                let slots = Self::slot_bounds(package)?;
                let terms = compile_to_os_deps(&parsed, &slots)
                    .with_context(|| format!("compiling constraint for {gem_name}"))?;
                let joined = terms.iter().map(ToString::to_string).collect::<Vec<_>>().join(" | ");
                return Ok(joined);
            }
        }
        Ok(resolved_slot_os_name.to_string())
    }
}

impl AppIntegrator for BundlerAppIntegrator {
    fn schedule_dep_builds(&self, catalog: &Catalog, app: &AppSpec) -> Result<Vec<Id>> {
        let lock = self.load_lock(app)?;
        let mut scheduled = Vec::new();

        for (name, gem) in &lock.gems {
            let package = catalog
                .package_info(
                    "bundler",
                    name,
                    Some(NewPackageSpec {
                        os_name: gem2deb(name),
                        config: PackageConfig::default(),
                    }),
                )?
                .expect("autocreate always yields Some");

            let slot_id = catalog
                .slot_for_version(package.id, &gem.version, true)?
                .expect("create_if_missing always yields Some");

            if catalog.version_exists(slot_id, &gem.version) {
                continue;
            }

            let changelog = if catalog.slot_has_versions(slot_id) {
                "Update to version used in application"
            } else {
                "Import newly into debler"
            };
            let revision_version = format!("{}-1", gem.version);
            let revision_id = catalog.schedule_build(
                slot_id,
                &gem.version,
                &revision_version,
                changelog,
                self.distribution.clone(),
                None,
            )?;
            scheduled.push(revision_id);
        }

        Ok(scheduled)
    }

    fn emit(&self, catalog: &Catalog, app: &AppSpec) -> Result<Vec<EmitRecord>> {
        let lock = self.load_lock(app)?;
        let deb_name = app.name.clone();
        let mut records = vec![EmitRecord::Package {
            name: deb_name.clone(),
            arch: "all".to_string(),
            section: "ruby".to_string(),
            description: if app.description.is_empty() {
                format!("Application: {}", app.name)
            } else {
                app.description.clone()
            },
        }];
        if let Some(homepage) = &app.homepage {
            records.push(EmitRecord::SourceControl {
                fields: vec![("Homepage".to_string(), homepage.clone())],
            });
        }

        let mut load_paths: Vec<String> = Vec::new();

        for (name, gem) in &lock.gems {
            let Some(package) = catalog.package_info("bundler", name, None)? else {
                continue;
            };
            if package.config.buildgem {
                continue;
            }
            let key = slot_key(&gem.version, package.config.level);
            let Some(slot) = package.slots.iter().find(|s| s.key == key) else {
                continue;
            };

            records.push(EmitRecord::Symlink {
                package: deb_name.clone(),
                dest: format!(
                    "/usr/share/{}/.debler/gems/specifications/{}-{}.gemspec",
                    app.name, name, gem.version
                ),
                src: format!("/usr/share/rubygems-debler/{}/{}.gemspec", slot.os_name, name),
            });

            for path in &slot.metadata.require_paths {
                load_paths.push(format!("/usr/share/rubygems-debler/{}/{}", slot.os_name, path));
            }

            let constraint = lock.direct_dependency_constraints.get(name).map(String::as_str);
            let dep = self.dependency_clause(&package, name, &slot.os_name, constraint)?;
            records.push(EmitRecord::Dependency {
                package: deb_name.clone(),
                dep,
            });
        }

        if !self.rubies.is_empty() {
            let alt = self
                .rubies
                .iter()
                .map(|ruby| format!("{deb_name}-ruby{ruby}"))
                .collect::<Vec<_>>()
                .join(" | ");
            records.push(EmitRecord::Dependency {
                package: deb_name.clone(),
                dep: alt,
            });
        }

        if !load_paths.is_empty() {
            let content = load_paths.join("\n") + "\n";
            records.push(EmitRecord::InstallContent {
                package: deb_name.clone(),
                name: format!("{deb_name}.loadpath"),
                dest: format!("/usr/share/{}/.debler/loadpath", app.name),
                content,
                mode: 0o644,
            });
        }

        for exe in &app.executables {
            records.push(EmitRecord::InstallContent {
                package: deb_name.clone(),
                name: exe.name.clone(),
                dest: format!("/usr/bin/{}", exe.name),
                content: wrapper_script(app, &exe.entry),
                mode: 0o755,
            });
        }

        if app.bundler_launcher {
            records.push(EmitRecord::InstallContent {
                package: deb_name.clone(),
                name: format!("{}-launcher", app.name),
                dest: format!("/usr/bin/{}-launcher", app.name),
                content: launcher_script(app),
                mode: 0o755,
            });
        }

        for entry in &app.dirs {
            records.push(EmitRecord::InstallInto {
                package: deb_name.clone(),
                obj: entry.src.clone(),
                dir: entry.dest.clone(),
            });
        }
        for entry in &app.files {
            records.push(EmitRecord::Install {
                package: deb_name.clone(),
                obj: entry.src.clone(),
                dest: entry.dest.clone(),
            });
        }

        records.push(EmitRecord::FastBuild { possible: true });

        Ok(records)
    }
}

fn wrapper_script(app: &AppSpec, entry: &str) -> String {
    format!(
        "#!/bin/sh\nexport RUBYLIB=\"$(cat /usr/share/{}/.debler/loadpath | tr '\\n' ':')$RUBYLIB\"\nexec ruby /usr/share/{}/{} \"$@\"\n",
        app.name, app.name, entry
    )
}

fn launcher_script(app: &AppSpec) -> String {
    format!(
        "#!/bin/sh\nexport RUBYLIB=\"$(cat /usr/share/{}/.debler/loadpath | tr '\\n' ':')$RUBYLIB\"\nif [ -f \"$1\" ]; then\n  exec ruby \"$@\"\nelse\n  exec ruby \"/usr/share/{}/bin/$1\" \"${{@:2}}\"\nfi\n",
        app.name, app.name
    )
}
