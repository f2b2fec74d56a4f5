//! Packaging-tree materialization and build-tool invocation.
//!
//! This crate turns a [`debler_catalog::BuildData`] into a built `.deb`:
//! it fetches upstream source, asks a per-packager [`Generator`] for the
//! packaging records, writes the `debian/` tree those records describe,
//! and drives `dpkg-source`/`sbuild`. [`DebBuilder`] implements
//! `debler_scheduler::RevisionBuilder` so the scheduler can drive it
//! without depending on any of this.
//!
//! # Example
//!
//! ```
//! use debler_builder::emitter::{DebianTree, EmitRecord};
//!
//! let tree = DebianTree::materialize(vec![EmitRecord::Package {
//!     name: "debler-rubygem-rails".into(),
//!     arch: "all".into(),
//!     section: "ruby".into(),
//!     description: "Rails web framework".into(),
//! }]);
//! assert_eq!(tree.packages.len(), 1);
//! ```

pub mod changelog;
pub mod emitter;
pub mod generator;
pub mod pipeline;

use debler_build_failure::BuildFail;
use debler_catalog::{BuildData, Catalog};
use debler_scheduler::RevisionBuilder;

pub use generator::{GemGenerator, Generator, NpmGenerator, UpstreamMetadata};
pub use pipeline::BuildContext;

/// The concrete `RevisionBuilder` that drives the full pipeline for one
/// revision: fetch, extract, generate, source-package, build.
pub struct DebBuilder<'a> {
    pub ctx: BuildContext,
    pub catalog: &'a Catalog,
    pub gem_generator: GemGenerator,
    pub npm_generator: NpmGenerator,
}

impl<'a> DebBuilder<'a> {
    fn generator_for(&self, packager: &str) -> Result<&dyn Generator, BuildFail> {
        match packager {
            "bundler" => Ok(&self.gem_generator),
            "yarn" => Ok(&self.npm_generator),
            other => Err(BuildFail::Internal {
                detail: format!("no generator registered for packager {other}"),
            }),
        }
    }

    fn deb_name(&self, data: &BuildData) -> Result<String, BuildFail> {
        // `slot_os_name` is already the OS-package name: the package's
        // os_name (a pure function of the upstream name) with the slot
        // key appended.
        match data.packager.as_str() {
            "bundler" | "yarn" => Ok(data.slot_os_name.clone()),
            other => Err(BuildFail::Internal {
                detail: format!("no OS-name mapping registered for packager {other}"),
            }),
        }
    }
}

impl<'a> RevisionBuilder for DebBuilder<'a> {
    fn build(&self, data: &BuildData) -> Result<(), BuildFail> {
        let deb_name = self.deb_name(data)?;
        let generator = self.generator_for(&data.packager)?;

        let mut tree = pipeline::create_dirs(&self.ctx, &deb_name, &data.version)?;
        let (source_bytes, metadata) = pipeline::fetch_source(data, &tree)?;
        pipeline::build_orig_tar(&tree, &source_bytes)?;
        pipeline::extract_orig_tar(&tree)?;

        let changelog_entries = self.catalog.changelog_entries(data.revision_id).map_err(|e| BuildFail::Internal {
            detail: e.to_string(),
        })?;

        pipeline::gen_debian_package(
            &self.ctx,
            &tree,
            &deb_name,
            &changelog_entries,
            generator,
            data,
            &metadata,
        )?;

        pipeline::create_source_package(&mut tree, &deb_name, &data.revision_version)?;
        pipeline::run_build(&self.ctx, &tree)
    }
}
