//! Version parsing, ordering and storage encoding for the ecosystems debler
//! tracks: RubyGems-style dotted versions and npm/semver-style versions.
//!
//! Both families expose the same small surface: parse from string, compare,
//! serialize back to string, serialize to a storage-friendly integer vector,
//! and `limit(k)` to derive a slot key from a version's leading components.

pub mod gem;
pub mod semver;

pub use gem::GemVersion;
pub use semver::SemverVersion;

/// Error parsing a version string.
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("empty version string")]
    Empty,
    #[error("invalid version segment: {0:?}")]
    InvalidSegment(String),
}
