//! # debler
//!
//! Repackages RubyGems and npm/yarn packages — and first-party
//! applications built on top of them — as native Debian source and
//! binary packages.
//!
//! This crate is the facade that composes the workspace's domain
//! microcrates into the behaviors the command surface (§6) exposes:
//! [`engine::Engine`] drives the catalog, scheduler, builder, app
//! integrators, and webhook intake as one unit so `debler-cli` only has
//! to parse arguments and call a method.
//!
//! ## Pipeline
//!
//! 1. [`debler_catalog::Catalog`] is the single source of truth: every
//!    command reads or mutates it.
//! 2. [`debler_scheduler::run_build_loop`] drives [`debler_builder::DebBuilder`]
//!    (a `RevisionBuilder`) over pending/failed/explicit revisions.
//! 3. [`debler_app::AppIntegrator`] composes first-party app packaging on
//!    top of the same catalog and builder primitives, without either
//!    crate depending on the other.
//! 4. [`debler_webhook::validate_request`] plus [`engine::CatalogReleaseScheduler`]
//!    drive the `serve` command's HTTP intake.
//!
//! ## Modules
//!
//! - [`engine`] — orchestration: the behavior behind every command in §6.
//! - Re-exports of every domain microcrate under its own short name, so
//!   callers rarely need to depend on them directly.

pub mod engine;

/// Version ordering and constraint parsing for gem-style version strings.
pub use debler_version as version;
/// Constraint compilation to OS `Depends:` alternatives.
pub use debler_constraints as constraints;
/// Shared domain types: `PackageConfig`, `Distribution`, `BuildResult`, …
pub use debler_types as types;
/// Lockfile/manifest parsers for the supported ecosystems.
pub use debler_ecosystem as ecosystem;
/// The persistent packager/package/slot/version/revision catalog.
pub use debler_catalog as catalog;
/// The dequeue/claim/finalize build loop.
pub use debler_scheduler as scheduler;
/// Packaging-tree materialization and build-tool invocation.
pub use debler_builder as builder;
/// First-party application packaging.
pub use debler_app as app;
/// Inbound upstream-release webhook intake.
pub use debler_webhook as webhook;
/// Configuration file loading.
pub use debler_config as config;
/// Typed build-failure classification.
pub use debler_build_failure as build_failure;
/// Upstream registry API clients.
pub use debler_registry as registry;
/// Git-sourced upstream checkout.
pub use debler_git as git;
/// Webhook API-key resolution and request authentication.
pub use debler_auth as auth;
/// Append-only JSONL audit log for the revision lifecycle.
pub use debler_events as events;
/// Environment fingerprinting and builder identity.
pub use debler_environment as environment;
/// Typed, atomically-persisted snapshots and build receipts.
pub use debler_state as state;
/// Secret redaction for subprocess output and argument vectors.
pub use debler_output_sanitizer as output_sanitizer;
