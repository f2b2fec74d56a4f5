//! RubyGems-style version handling.
//!
//! A gem version is a dot-separated sequence of segments, each of which is
//! either a non-negative integer (`4`), an alphabetic pre-release tag
//! (`beta2`), or — for dependencies sourced directly from a git checkout
//! rather than the gem registry — a 40-character hex SHA-1.
//!
//! Segments are encoded for storage as a flat `Vec<i64>` so the ordering can
//! be computed and persisted without re-parsing the original string:
//!
//! - a decimal segment is stored as itself;
//! - an alphabetic segment is introduced by the sentinel `-1`, followed by
//!   the segment's character codepoints, then a terminating `0`;
//! - a git-revision segment is introduced by the sentinel `-2`, followed by
//!   the five 32-bit signed halves obtained by reinterpreting each
//!   8-hex-character chunk of the 40-character SHA-1 as an unsigned 32-bit
//!   integer and then as a signed one (`i32::from_ne_bytes(u32.to_ne_bytes())`
//!   in spirit; concretely `u32 as i32`), then a terminating `0`.
//!
//! This encoding is preserved bit-for-bit from the system this crate was
//! modeled on, so existing persisted catalogs remain comparable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::VersionError;

/// One segment of a gem version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    Number(i64),
    Alpha(String),
    /// A 40-character lowercase hex SHA-1, used for git-sourced dependencies.
    Git(String),
}

impl Segment {
    fn parse(raw: &str) -> Result<Self, VersionError> {
        if raw.is_empty() {
            return Err(VersionError::InvalidSegment(raw.to_string()));
        }
        if raw.len() == 40 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Ok(Segment::Git(raw.to_ascii_lowercase()));
        }
        if raw.bytes().all(|b| b.is_ascii_digit()) {
            return raw
                .parse::<i64>()
                .map(Segment::Number)
                .map_err(|_| VersionError::InvalidSegment(raw.to_string()));
        }
        if raw.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Ok(Segment::Alpha(raw.to_string()));
        }
        Err(VersionError::InvalidSegment(raw.to_string()))
    }

    fn storage_ints(&self) -> Vec<i64> {
        match self {
            Segment::Number(n) => vec![*n],
            Segment::Alpha(s) => {
                let mut out = vec![-1];
                out.extend(s.chars().map(|c| c as i64));
                out.push(0);
                out
            }
            Segment::Git(sha) => {
                let mut out = vec![-2];
                for chunk in sha.as_bytes().chunks(8) {
                    let chunk_str = std::str::from_utf8(chunk).unwrap_or("0");
                    let unsigned = u32::from_str_radix(chunk_str, 16).unwrap_or(0);
                    out.push(unsigned as i32 as i64);
                }
                out.push(0);
                out
            }
        }
    }

    fn is_zero(&self) -> bool {
        matches!(self, Segment::Number(0))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Number(n) => write!(f, "{n}"),
            Segment::Alpha(s) => write!(f, "{s}"),
            Segment::Git(sha) => write!(f, "{sha}"),
        }
    }
}

/// A parsed RubyGems-style version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GemVersion {
    segments: Vec<Segment>,
}

impl GemVersion {
    /// Parse a version from its dotted string form.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        if input.trim().is_empty() {
            return Err(VersionError::Empty);
        }
        let segments = input
            .split('.')
            .map(Segment::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }

    /// The segments with insignificant trailing `.0` components stripped.
    /// At least one segment is always retained.
    fn trimmed(&self) -> &[Segment] {
        let mut end = self.segments.len();
        while end > 1 && self.segments[end - 1].is_zero() {
            end -= 1;
        }
        &self.segments[..end]
    }

    /// Serialize to the reversible storage encoding (§ module docs).
    pub fn to_storage_vec(&self) -> Vec<i64> {
        self.trimmed().iter().flat_map(Segment::storage_ints).collect()
    }

    /// Return a new version made of the first `k` segments — the slot key
    /// for a package configured with `level = k`.
    pub fn limit(&self, k: usize) -> GemVersion {
        let take = k.min(self.segments.len());
        GemVersion {
            segments: self.segments[..take].to_vec(),
        }
    }

    /// Number of segments in the original (untrimmed) version.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// True if this version carries a trailing alphabetic (pre-release)
    /// segment.
    pub fn is_prerelease(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Alpha(_)))
    }

    /// True if this version is sourced from a git revision rather than a
    /// registry release.
    pub fn is_git_revision(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Git(_)))
    }

    /// The exclusive upper bound implied by a `~>` (pessimistic) constraint
    /// on this version: drop the last segment, then bump the new last
    /// numeric segment by one. `~> 1.2.3` yields `1.3`; `~> 1.2` yields `2`.
    pub fn tilde_upper_bound(&self) -> GemVersion {
        let mut segs = if self.segments.len() <= 1 {
            self.segments.clone()
        } else {
            self.segments[..self.segments.len() - 1].to_vec()
        };
        let last = segs.len() - 1;
        if let Segment::Number(n) = segs[last] {
            segs[last] = Segment::Number(n + 1);
        }
        GemVersion { segments: segs }
    }
}

impl FromStr for GemVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GemVersion::parse(s)
    }
}

impl fmt::Display for GemVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .segments
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(".");
        write!(f, "{text}")
    }
}

impl PartialEq for GemVersion {
    fn eq(&self, other: &Self) -> bool {
        self.trimmed() == other.trimmed()
    }
}
impl Eq for GemVersion {}

impl PartialOrd for GemVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GemVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let a = self.to_storage_vec();
        let b = other.to_storage_vec();
        a.cmp(&b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_zero_insignificant() {
        assert_eq!(GemVersion::parse("1.4.0").unwrap(), GemVersion::parse("1.4").unwrap());
    }

    #[test]
    fn prerelease_sorts_below_release() {
        let pre = GemVersion::parse("1.4.0.beta2").unwrap();
        let rel = GemVersion::parse("1.4.0").unwrap();
        assert!(pre < rel);
    }

    #[test]
    fn numeric_ordering() {
        let a = GemVersion::parse("1.9.0").unwrap();
        let b = GemVersion::parse("1.10.0").unwrap();
        assert!(a < b);
    }

    #[test]
    fn display_roundtrip() {
        let v = GemVersion::parse("2.3.0.rc1").unwrap();
        assert_eq!(v.to_string(), "2.3.0.rc1");
    }

    #[test]
    fn limit_produces_slot_key() {
        let v = GemVersion::parse("1.2.3").unwrap();
        assert_eq!(v.limit(2).to_string(), "1.2");
    }

    #[test]
    fn git_revision_roundtrip() {
        let sha = "da39a3ee5e6b4b0d3255bfef95601890afd80709";
        let v = GemVersion::parse(sha).unwrap();
        assert!(v.is_git_revision());
        assert_eq!(v.to_string(), sha);
    }

    #[test]
    fn git_revision_storage_encoding_shape() {
        let sha = "da39a3ee5e6b4b0d3255bfef95601890afd80709";
        let v = GemVersion::parse(sha).unwrap();
        let encoded = v.to_storage_vec();
        assert_eq!(encoded[0], -2);
        assert_eq!(encoded.len(), 1 + 5 + 1);
        assert_eq!(*encoded.last().unwrap(), 0);
    }

    #[test]
    fn alpha_segment_storage_encoding() {
        let v = GemVersion::parse("1.0.a").unwrap();
        let encoded = v.to_storage_vec();
        // [1, 0? trimmed, -1, 'a' as i64, 0] -- trailing .0 before alpha is significant
        // because alpha isn't trailing-zero, so only trailing Number(0) segments trim.
        assert_eq!(encoded.last(), Some(&0));
        assert!(encoded.contains(&-1));
    }

    #[test]
    fn ordering_is_total() {
        let versions = ["1.0.0", "1.0.0.a", "1.0.1", "2.0.0", "1.0"];
        let mut parsed: Vec<GemVersion> =
            versions.iter().map(|s| GemVersion::parse(s).unwrap()).collect();
        parsed.sort();
        assert_eq!(parsed[0].to_string(), "1.0.0.a");
    }
}
