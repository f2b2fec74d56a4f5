//! Per-packager generators: translate a [`BuildData`] and its fetched
//! upstream metadata into [`EmitRecord`]s for [`crate::emitter::DebianTree`]
//! to materialize.

use debler_catalog::BuildData;
use debler_ecosystem::gem::gem2deb;
use debler_ecosystem::npm::npm2deb;
use debler_types::Tristate;

use crate::emitter::EmitRecord;

/// Upstream metadata a generator needs beyond what's already in
/// [`BuildData`] — fetched by the pipeline's `parseMetadata` step.
#[derive(Debug, Clone, Default)]
pub struct UpstreamMetadata {
    pub description: String,
    pub homepage: Option<String>,
    /// Runtime dependency names (already resolved to exact locked
    /// versions upstream; debler depends on the OS package, not a range).
    pub runtime_deps: Vec<String>,
    /// Whether the upstream package ships a native-extension build step
    /// (a C extension for gems, a `binding.gyp`/prebuild script for npm).
    pub has_native_extension: bool,
}

/// Per-packager translation from upstream metadata to packaging records.
/// A compile-time alternative to a dynamically imported packager module.
pub trait Generator {
    fn emit(&self, data: &BuildData, metadata: &UpstreamMetadata) -> Vec<EmitRecord>;
}

/// Generator for rubygems packaged through the `bundler` packager.
pub struct GemGenerator {
    pub rubies: Vec<String>,
}

impl Generator for GemGenerator {
    fn emit(&self, data: &BuildData, metadata: &UpstreamMetadata) -> Vec<EmitRecord> {
        // `slot_os_name` is already the OS-package name (the package's
        // os_name, itself a pure function of the upstream name, with the
        // slot key appended) — not a raw upstream name to translate.
        let deb_name = data.slot_os_name.clone();
        let mut records = vec![
            EmitRecord::SourceControl {
                fields: vec![
                    ("Priority".to_string(), "optional".to_string()),
                    ("Standards-Version".to_string(), "3.9.6".to_string()),
                ],
            },
            EmitRecord::BuildDependency {
                dep: "debhelper (>= 9)".to_string(),
            },
        ];
        if let Some(homepage) = &metadata.homepage {
            records.push(EmitRecord::SourceControl {
                fields: vec![("Homepage".to_string(), homepage.clone())],
            });
        }

        let native = match data.package_config.native {
            Tristate::True => true,
            Tristate::False => false,
            Tristate::Unknown => metadata.has_native_extension,
        };
        if native {
            for ruby in &self.rubies {
                records.push(EmitRecord::BuildDependency {
                    dep: format!("ruby{ruby}"),
                });
                records.push(EmitRecord::BuildDependency {
                    dep: format!("ruby{ruby}-dev"),
                });
            }
        }
        for dep in &data.package_config.builddeps {
            records.push(EmitRecord::BuildDependency { dep: dep.clone() });
        }

        let description = if metadata.description.is_empty() {
            format!("Packaged gem: {}", data.package_name)
        } else {
            metadata.description.clone()
        };
        records.push(EmitRecord::Package {
            name: deb_name.clone(),
            arch: if native { "any".to_string() } else { "all".to_string() },
            section: "ruby".to_string(),
            description,
        });

        records.push(EmitRecord::FastBuild { possible: !native });

        for dep in &metadata.runtime_deps {
            records.push(EmitRecord::Dependency {
                package: deb_name.clone(),
                dep: gem2deb(dep),
            });
        }
        for dep in &data.package_config.rundeps {
            records.push(EmitRecord::Dependency {
                package: deb_name.clone(),
                dep: dep.clone(),
            });
        }

        records
    }
}

/// Generator for npm/yarn packages packaged through the `yarn` packager.
pub struct NpmGenerator;

impl Generator for NpmGenerator {
    fn emit(&self, data: &BuildData, metadata: &UpstreamMetadata) -> Vec<EmitRecord> {
        let deb_name = data.slot_os_name.clone();
        let mut records = vec![
            EmitRecord::SourceControl {
                fields: vec![
                    ("Priority".to_string(), "optional".to_string()),
                    ("Standards-Version".to_string(), "3.9.6".to_string()),
                ],
            },
            EmitRecord::BuildDependency {
                dep: "debhelper (>= 9)".to_string(),
            },
            EmitRecord::BuildDependency {
                dep: "nodejs".to_string(),
            },
        ];
        if let Some(homepage) = &metadata.homepage {
            records.push(EmitRecord::SourceControl {
                fields: vec![("Homepage".to_string(), homepage.clone())],
            });
        }

        let native = metadata.has_native_extension;
        let description = if metadata.description.is_empty() {
            format!("Packaged npm module: {}", data.package_name)
        } else {
            metadata.description.clone()
        };
        records.push(EmitRecord::Package {
            name: deb_name.clone(),
            arch: if native { "any".to_string() } else { "all".to_string() },
            section: "javascript".to_string(),
            description,
        });
        records.push(EmitRecord::FastBuild { possible: !native });

        for dep in &metadata.runtime_deps {
            records.push(EmitRecord::Dependency {
                package: deb_name.clone(),
                dep: npm2deb(dep),
            });
        }
        for dep in &data.package_config.rundeps {
            records.push(EmitRecord::Dependency {
                package: deb_name.clone(),
                dep: dep.clone(),
            });
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use debler_catalog::VersionConfig;
    use debler_types::{Distribution, PackageConfig};

    fn build_data(config: PackageConfig) -> BuildData {
        BuildData {
            revision_id: 1,
            packager: "bundler".to_string(),
            package_name: "rails".to_string(),
            package_os_name: "debler-rubygem-rails".to_string(),
            package_config: config,
            slot_os_name: "debler-rubygem-rails".to_string(),
            version: "7.1.0".to_string(),
            version_config: VersionConfig::default(),
            revision_version: "7.1.0-1".to_string(),
            distribution: Distribution::new("trusty"),
            changelog: String::new(),
            populated: false,
        }
    }

    #[test]
    fn gem_generator_marks_arch_any_when_native_flag_set() {
        let gen = GemGenerator {
            rubies: vec!["3.1".to_string()],
        };
        let data = build_data(PackageConfig {
            native: Tristate::True,
            ..PackageConfig::default()
        });
        let records = gen.emit(&data, &UpstreamMetadata::default());
        let package = records
            .iter()
            .find_map(|r| match r {
                EmitRecord::Package { arch, .. } => Some(arch.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(package, "any");
        assert!(records.iter().any(|r| matches!(r, EmitRecord::BuildDependency { dep } if dep == "ruby3.1-dev")));
    }

    #[test]
    fn gem_generator_defers_to_detected_native_when_config_unknown() {
        let gen = GemGenerator { rubies: vec![] };
        let data = build_data(PackageConfig::default());
        let metadata = UpstreamMetadata {
            has_native_extension: true,
            ..UpstreamMetadata::default()
        };
        let records = gen.emit(&data, &metadata);
        assert!(records.iter().any(|r| matches!(r, EmitRecord::FastBuild { possible: false })));
    }

    #[test]
    fn gem_generator_translates_runtime_deps_through_gem2deb() {
        let gen = GemGenerator { rubies: vec![] };
        let data = build_data(PackageConfig::default());
        let metadata = UpstreamMetadata {
            runtime_deps: vec!["rack_test".to_string()],
            ..UpstreamMetadata::default()
        };
        let records = gen.emit(&data, &metadata);
        assert!(records.iter().any(|r| matches!(r, EmitRecord::Dependency { dep, .. } if dep == "debler-rubygem-rack--test")));
    }

    #[test]
    fn npm_generator_sections_under_javascript() {
        let data = build_data(PackageConfig::default());
        let records = NpmGenerator.emit(&data, &UpstreamMetadata::default());
        assert!(records
            .iter()
            .any(|r| matches!(r, EmitRecord::Package { section, .. } if section == "javascript")));
    }
}
