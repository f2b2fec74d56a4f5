//! First-party application packaging.
//!
//! An application isn't an upstream package debler tracks on its own —
//! it's a user-maintained directory tree whose *dependencies* (a
//! `Gemfile.lock`, in the `bundler` case) debler does track. This crate
//! reads an app's manifest, makes sure every locked dependency has a
//! scheduled build via [`AppIntegrator::schedule_dep_builds`], and
//! composes the per-packager integrators' [`debler_builder::emitter::EmitRecord`]s
//! into one multi-binary packaging tree the same way [`debler_builder`]
//! does for a single gem or npm package.
//!
//! # Example
//!
//! ```
//! use debler_app::AppSpec;
//!
//! let spec = AppSpec::from_yaml("name: demo\nversion: \"1.0\"\nbasedir: /srv/demo\n")
//!     .expect("parse");
//! assert_eq!(spec.name, "demo");
//! ```

pub mod integrator;
pub mod spec;

pub use integrator::{AppIntegrator, BundlerAppIntegrator};
pub use spec::{AppExecutable, AppSpec, InstallEntry};
