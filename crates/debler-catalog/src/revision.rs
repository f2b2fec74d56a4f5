//! Slot-key derivation and revision-version arithmetic.
//!
//! The catalog is generic over ecosystem: it stores upstream versions and
//! revision-versions as plain strings rather than coupling itself to a
//! specific member of `debler_version`. Slot keys are the leading
//! dot-separated components of the upstream version; revision-versions
//! are an upstream version plus a `-N` debian-revision suffix.

/// The leading `level` dot-separated components of `version`, used as a
/// slot key. `level == 0` yields the empty key (one slot for the whole
/// package).
pub fn slot_key(version: &str, level: u32) -> Vec<String> {
    version
        .split('.')
        .take(level as usize)
        .map(str::to_string)
        .collect()
}

/// Whether `version`'s leading components match `key` exactly — the slot
/// key law (§8): every version in a slot shares its key as a prefix.
pub fn version_matches_key(version: &str, key: &[String]) -> bool {
    slot_key(version, key.len() as u32) == key
}

/// The numeric debian-revision suffix of a revision-version string, if
/// any (`"1.2.3-4"` -> `Some(("1.2.3", 4))`).
fn split_revision_suffix(revision_version: &str) -> (&str, Option<u64>) {
    match revision_version.rsplit_once('-') {
        Some((prefix, suffix)) => match suffix.parse::<u64>() {
            Ok(n) => (prefix, Some(n)),
            Err(_) => (revision_version, None),
        },
        None => (revision_version, None),
    }
}

/// A sortable key for revision-version strings: same upstream prefix,
/// ordered by debian-revision number. Two revision-versions with
/// different upstream prefixes compare by prefix first.
pub fn revision_version_key(revision_version: &str) -> (String, u64) {
    let (prefix, suffix) = split_revision_suffix(revision_version);
    (prefix.to_string(), suffix.unwrap_or(0))
}

/// Bump a revision-version's debian-revision suffix by one, for
/// `scheduleRebuild`. `"1.2.3-1"` -> `"1.2.3-2"`; a version with no
/// suffix gets `-1` appended.
pub fn bump_revision(revision_version: &str) -> String {
    let (prefix, suffix) = split_revision_suffix(revision_version);
    match suffix {
        Some(n) => format!("{prefix}-{}", n + 1),
        None => format!("{revision_version}-1"),
    }
}
