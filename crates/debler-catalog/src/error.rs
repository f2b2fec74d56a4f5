//! Typed lookup and invariant-violation failures.
//!
//! Most catalog queries that can legitimately come up empty (an unknown
//! package, a version with no matching slot) return `Option`/`Ok(None)`
//! rather than an error — callers like the webhook intake are expected to
//! treat "not found" as "not interested", not as a failure. [`CatalogError`]
//! is reserved for violations of the invariants the store itself enforces:
//! duplicate keys, non-monotonic revisions, and terminal-state changes.

use crate::Id;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("packager already registered: {0}")]
    DuplicatePackager(String),

    #[error("unknown packager: {0}")]
    UnknownPackager(String),

    #[error("package already registered: packager={packager} name={name}")]
    DuplicatePackage { packager: String, name: String },

    #[error("unknown package id: {0}")]
    UnknownPackage(Id),

    #[error("duplicate slot key {key:?} in package {package_id}")]
    DuplicateSlot { package_id: Id, key: Vec<String> },

    #[error("unknown slot id: {0}")]
    UnknownSlot(Id),

    #[error("unknown version id: {0}")]
    UnknownVersion(Id),

    #[error("unknown revision id: {0}")]
    UnknownRevision(Id),

    #[error(
        "revision-version {new} does not exceed {previous} for version {version_id} in {distribution}"
    )]
    RevisionNotMonotonic {
        version_id: Id,
        distribution: String,
        previous: String,
        new: String,
    },

    #[error("revision {0} has already reached a terminal result and cannot be changed")]
    TerminalStateViolation(Id),
}
