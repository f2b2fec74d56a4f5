//! Rendering [`ChangelogEntry`] stitches into a `debian/changelog` file.

use chrono::{DateTime, Utc};
use debler_catalog::ChangelogEntry;

/// Format a debian changelog file body from entries returned by
/// `Catalog::changelog_entries`, newest stanza first (the convention every
/// debian changelog tool, including `dch`, expects). `entries` is accepted
/// in the catalog's ascending order and reversed here so callers never have
/// to remember which direction to sort.
pub fn render(source_name: &str, maintainer: &str, entries: &[ChangelogEntry]) -> String {
    let mut out = String::new();
    for entry in entries.iter().rev() {
        out.push_str(&format!(
            "{source_name} ({}) {}; urgency=medium\n\n",
            entry.revision_version, entry.distribution
        ));
        for line in entry.changelog.lines() {
            out.push_str(&format!("  * {line}\n"));
        }
        if entry.changelog.lines().next().is_none() {
            out.push_str("  * Automatic build.\n");
        }
        out.push('\n');
        out.push_str(&format!(" -- {maintainer}  {}\n\n", format_changelog_date(entry.scheduled_at)));
    }
    out
}

/// RFC 2822 date format, as `debian/changelog` stanzas require
/// (`Mon, 02 Jan 2006 15:04:05 +0000`).
fn format_changelog_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S %z").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use debler_types::Distribution;

    fn entry(revision_version: &str, changelog: &str, at: DateTime<Utc>) -> ChangelogEntry {
        ChangelogEntry {
            revision_version: revision_version.to_string(),
            changelog: changelog.to_string(),
            distribution: Distribution::new("trusty"),
            scheduled_at: at,
        }
    }

    #[test]
    fn newest_stanza_comes_first() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let entries = vec![
            entry("1.0.0-1", "Initial release.", early),
            entry("1.0.0-2", "Fix checksum.", late),
        ];
        let rendered = render("debler-rubygem-rails", "Debler <debler@example.org>", &entries);
        let first = rendered.find("1.0.0-2").unwrap();
        let second = rendered.find("1.0.0-1").unwrap();
        assert!(first < second);
    }

    #[test]
    fn empty_changelog_gets_placeholder_entry() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let rendered = render("debler-rubygem-rails", "Debler <debler@example.org>", &[entry("1.0.0-1", "", at)]);
        assert!(rendered.contains("Automatic build."));
    }

    #[test]
    fn multiline_changelog_becomes_multiple_bullets() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let rendered = render(
            "debler-rubygem-rails",
            "Debler <debler@example.org>",
            &[entry("1.0.0-1", "Bump rack dependency.\nFix native extension build.", at)],
        );
        assert_eq!(rendered.matches("  * ").count(), 2);
    }
}
