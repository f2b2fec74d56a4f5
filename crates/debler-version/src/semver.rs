//! npm/semver-style version handling.
//!
//! Unlike full semver, the parser here tolerates the partial and wildcard
//! forms that appear in dependency constraints (`1.2`, `1.x`, `*`) because
//! the constraint grammar (caret, tilde, hyphen ranges, partials) expands
//! them into concrete bounds built from this same type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::VersionError;

/// One numeric component of a semver version, or a wildcard standing in for
/// "any value here and onward".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Component {
    Value(u64),
    Wildcard,
}

impl Component {
    fn value(self) -> Option<u64> {
        match self {
            Component::Value(v) => Some(v),
            Component::Wildcard => None,
        }
    }
}

fn parse_component(raw: &str) -> Result<Component, VersionError> {
    if raw == "x" || raw == "X" || raw == "*" {
        return Ok(Component::Wildcard);
    }
    raw.parse::<u64>()
        .map(Component::Value)
        .map_err(|_| VersionError::InvalidSegment(raw.to_string()))
}

/// A parsed npm/semver-style version: `major.minor.patch[-prerelease]`.
///
/// `minor` and `patch` default to `0` when absent (`"1"` parses the same as
/// `"1.0.0"`), and any component may be a wildcard, in which case
/// [`GemVersion::is_partial`](SemverVersion::is_partial) is `true` and every
/// component from the first wildcard onward is also a wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemverVersion {
    pub major: Component,
    pub minor: Component,
    pub patch: Component,
    pub pre: Vec<String>,
}

impl SemverVersion {
    /// Construct a fully-specified version with no pre-release tail.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major: Component::Value(major),
            minor: Component::Value(minor),
            patch: Component::Value(patch),
            pre: Vec::new(),
        }
    }

    /// Parse a version string, tolerating partial forms and trailing
    /// wildcards.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let input = input.trim();
        if input.is_empty() || input == "*" || input.eq_ignore_ascii_case("x") {
            return Ok(Self {
                major: Component::Wildcard,
                minor: Component::Wildcard,
                patch: Component::Wildcard,
                pre: Vec::new(),
            });
        }

        let (core, pre) = match input.split_once('-') {
            Some((c, p)) => (c, p.split('.').map(str::to_string).collect()),
            None => (input, Vec::new()),
        };

        let mut parts = core.split('.');
        let major = parse_component(parts.next().ok_or(VersionError::Empty)?)?;
        let minor = match parts.next() {
            Some(p) => parse_component(p)?,
            None => Component::Value(0),
        };
        let patch = match parts.next() {
            Some(p) => parse_component(p)?,
            None => Component::Value(0),
        };
        if parts.next().is_some() {
            return Err(VersionError::InvalidSegment(input.to_string()));
        }

        // A wildcard in a leading position makes every subsequent component
        // a wildcard too, matching how npm ranges treat `1.x.2` as `1.x`.
        let minor = if matches!(major, Component::Wildcard) {
            Component::Wildcard
        } else {
            minor
        };
        let patch = if matches!(major, Component::Wildcard) || matches!(minor, Component::Wildcard)
        {
            Component::Wildcard
        } else {
            patch
        };

        Ok(Self { major, minor, patch, pre })
    }

    pub fn is_partial(&self) -> bool {
        matches!(self.major, Component::Wildcard)
            || matches!(self.minor, Component::Wildcard)
            || matches!(self.patch, Component::Wildcard)
    }

    pub fn major_value(&self) -> u64 {
        self.major.value().unwrap_or(0)
    }

    pub fn minor_value(&self) -> u64 {
        self.minor.value().unwrap_or(0)
    }

    pub fn patch_value(&self) -> u64 {
        self.patch.value().unwrap_or(0)
    }

    /// Return a version with `patch` reset to `0` and `minor` bumped by one.
    pub fn bump_minor(&self) -> SemverVersion {
        SemverVersion::new(self.major_value(), self.minor_value() + 1, 0)
    }

    /// Return a version with `minor`/`patch` reset to `0` and `major` bumped
    /// by one.
    pub fn bump_major(&self) -> SemverVersion {
        SemverVersion::new(self.major_value() + 1, 0, 0)
    }

    /// Return a version with `patch` bumped by one.
    pub fn bump_patch(&self) -> SemverVersion {
        SemverVersion::new(self.major_value(), self.minor_value(), self.patch_value() + 1)
    }

    fn tuple(&self) -> (u64, u64, u64) {
        (self.major_value(), self.minor_value(), self.patch_value())
    }
}

impl FromStr for SemverVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SemverVersion::parse(s)
    }
}

impl fmt::Display for SemverVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn comp(c: Component) -> String {
            match c {
                Component::Value(v) => v.to_string(),
                Component::Wildcard => "x".to_string(),
            }
        }
        write!(f, "{}.{}.{}", comp(self.major), comp(self.minor), comp(self.patch))?;
        if !self.pre.is_empty() {
            write!(f, "-{}", self.pre.join("."))?;
        }
        Ok(())
    }
}

impl PartialOrd for SemverVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemverVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match self.tuple().cmp(&other.tuple()) {
            Ordering::Equal => {}
            other => return other,
        }
        // No pre-release sorts above having one (1.0.0 > 1.0.0-beta).
        match (self.pre.is_empty(), other.pre.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.pre.cmp(&other.pre),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_version() {
        let v = SemverVersion::parse("1.2.3").unwrap();
        assert_eq!(v.tuple(), (1, 2, 3));
        assert!(!v.is_partial());
    }

    #[test]
    fn parses_partial_version() {
        let v = SemverVersion::parse("1.2").unwrap();
        assert!(v.is_partial());
        assert_eq!(v.major_value(), 1);
        assert_eq!(v.minor_value(), 2);
    }

    #[test]
    fn wildcard_propagates() {
        let v = SemverVersion::parse("1.x").unwrap();
        assert!(matches!(v.patch, Component::Wildcard));
    }

    #[test]
    fn prerelease_sorts_below_release() {
        let pre = SemverVersion::parse("1.0.0-beta").unwrap();
        let rel = SemverVersion::parse("1.0.0").unwrap();
        assert!(pre < rel);
    }

    #[test]
    fn bump_minor_resets_patch() {
        let v = SemverVersion::new(1, 2, 3);
        assert_eq!(v.bump_minor().to_string(), "1.3.0");
    }

    #[test]
    fn display_roundtrip() {
        assert_eq!(SemverVersion::parse("2.3.4").unwrap().to_string(), "2.3.4");
    }
}
