//! Parser for the npm/yarn semver-range grammar: caret (`^`), tilde (`~`),
//! bare comparators, partial versions, hyphen ranges, and `||` disjunction.

use debler_version::SemverVersion;
use thiserror::Error;

use crate::{Constraint, build_and, build_or};

#[derive(Debug, Error)]
pub enum NpmConstraintError {
    #[error("empty range clause")]
    EmptyClause,
    #[error("invalid version in range: {0}")]
    InvalidVersion(#[from] debler_version::VersionError),
}

/// Parse an npm-style range such as `"^2.3.0 || 3.x || 4 || 5"`.
pub fn parse_constraints(input: &str) -> Result<Constraint<SemverVersion>, NpmConstraintError> {
    let input = input.trim();
    if input.is_empty() || input == "*" {
        return Ok(Constraint::All);
    }

    let branches = input
        .split("||")
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(parse_branch)
        .collect::<Result<Vec<_>, _>>()?;

    if branches.is_empty() {
        return Err(NpmConstraintError::EmptyClause);
    }
    Ok(build_or(branches))
}

fn parse_branch(branch: &str) -> Result<Constraint<SemverVersion>, NpmConstraintError> {
    if let Some((lo, hi)) = branch.split_once(" - ") {
        return parse_hyphen(lo.trim(), hi.trim());
    }

    let leaves = branch
        .split_whitespace()
        .map(parse_token)
        .collect::<Result<Vec<_>, _>>()?;
    if leaves.is_empty() {
        return Err(NpmConstraintError::EmptyClause);
    }
    Ok(build_and(leaves))
}

fn parse_hyphen(lo: &str, hi: &str) -> Result<Constraint<SemverVersion>, NpmConstraintError> {
    let lower_version = SemverVersion::parse(lo)?;
    let hi_components = dotted_component_count(hi);
    let upper = if hi_components < 3 {
        Constraint::LessThan(partial_upper_bound(&SemverVersion::parse(hi)?, hi_components))
    } else {
        Constraint::LessEqual(SemverVersion::parse(hi)?)
    };
    Ok(build_and(vec![Constraint::GreaterEqual(lower_version), upper]))
}

fn parse_token(tok: &str) -> Result<Constraint<SemverVersion>, NpmConstraintError> {
    if tok == "*" || tok.eq_ignore_ascii_case("x") {
        return Ok(Constraint::All);
    }
    if let Some(rest) = tok.strip_prefix('^') {
        return parse_caret(rest);
    }
    if let Some(rest) = tok.strip_prefix('~') {
        return parse_tilde(rest);
    }
    for op in ["<=", ">=", "<", ">", "="] {
        if let Some(rest) = tok.strip_prefix(op) {
            let v = SemverVersion::parse(rest)?;
            return Ok(match op {
                "<=" => Constraint::LessEqual(v),
                ">=" => Constraint::GreaterEqual(v),
                "<" => Constraint::LessThan(v),
                ">" => Constraint::GreaterThan(v),
                _ => Constraint::Exact(v),
            });
        }
    }
    parse_partial_or_exact(tok)
}

/// Count the leading *concrete* (non-wildcard) dotted components, e.g.
/// `"1.2.3"` -> 3, `"1.2"` -> 2, `"3.x"` -> 1, `"*"` -> 0.
fn dotted_component_count(raw: &str) -> usize {
    let core = raw.split('-').next().unwrap_or(raw);
    let mut count = 0;
    for part in core.split('.') {
        if part.is_empty() || part.eq_ignore_ascii_case("x") || part == "*" {
            break;
        }
        count += 1;
    }
    count
}

fn partial_upper_bound(v: &SemverVersion, components: usize) -> SemverVersion {
    if components <= 1 {
        SemverVersion::new(v.major_value() + 1, 0, 0)
    } else {
        SemverVersion::new(v.major_value(), v.minor_value() + 1, 0)
    }
}

fn parse_partial_or_exact(raw: &str) -> Result<Constraint<SemverVersion>, NpmConstraintError> {
    let v = SemverVersion::parse(raw)?;
    let components = dotted_component_count(raw);
    if v.is_partial() || components < 3 {
        let upper = partial_upper_bound(&v, components);
        Ok(build_and(vec![Constraint::GreaterEqual(v), Constraint::LessThan(upper)]))
    } else {
        Ok(Constraint::Exact(v))
    }
}

fn parse_caret(raw: &str) -> Result<Constraint<SemverVersion>, NpmConstraintError> {
    let v = SemverVersion::parse(raw)?;
    let upper = if v.major_value() != 0 {
        v.bump_major()
    } else if v.minor_value() != 0 {
        SemverVersion::new(0, v.minor_value() + 1, 0)
    } else if v.is_partial() {
        // ^0.0 or ^0.0.x: the whole 0.0.x line is a pre-1.0 prerelease lane.
        SemverVersion::new(0, 1, 0)
    } else {
        SemverVersion::new(0, 0, v.patch_value() + 1)
    };
    Ok(build_and(vec![Constraint::GreaterEqual(v), Constraint::LessThan(upper)]))
}

fn parse_tilde(raw: &str) -> Result<Constraint<SemverVersion>, NpmConstraintError> {
    let v = SemverVersion::parse(raw)?;
    let components = dotted_component_count(raw);
    let upper = if components <= 1 {
        SemverVersion::new(v.major_value() + 1, 0, 0)
    } else {
        SemverVersion::new(v.major_value(), v.minor_value() + 1, 0)
    };
    Ok(build_and(vec![Constraint::GreaterEqual(v), Constraint::LessThan(upper)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ge(v: &str) -> Constraint<SemverVersion> {
        Constraint::GreaterEqual(SemverVersion::parse(v).unwrap())
    }
    fn lt(v: &str) -> Constraint<SemverVersion> {
        Constraint::LessThan(SemverVersion::parse(v).unwrap())
    }

    #[test]
    fn caret_with_leading_zeros() {
        assert_eq!(
            parse_constraints("^0.2.3").unwrap(),
            Constraint::And(vec![ge("0.2.3"), lt("0.3.0")])
        );
        assert_eq!(
            parse_constraints("^0.0.3").unwrap(),
            Constraint::And(vec![ge("0.0.3"), lt("0.0.4")])
        );
    }

    #[test]
    fn caret_normal() {
        assert_eq!(
            parse_constraints("^1.2.3").unwrap(),
            Constraint::And(vec![ge("1.2.3"), lt("2.0.0")])
        );
    }

    #[test]
    fn tilde() {
        assert_eq!(
            parse_constraints("~1.2.3").unwrap(),
            Constraint::And(vec![ge("1.2.3"), lt("1.3.0")])
        );
    }

    #[test]
    fn hyphen_range_with_partial_upper() {
        assert_eq!(
            parse_constraints("1.2.3 - 2.3").unwrap(),
            Constraint::And(vec![ge("1.2.3"), lt("2.4.0")])
        );
    }

    #[test]
    fn or_merge_collapses_touching_ranges() {
        let merged = parse_constraints("^2.3.0 || 3.x || 4 || 5").unwrap();
        assert_eq!(merged, Constraint::And(vec![ge("2.3.0"), lt("6.0.0")]));
    }

    #[test]
    fn wildcard_is_all() {
        assert_eq!(parse_constraints("*").unwrap(), Constraint::All);
        assert_eq!(parse_constraints("").unwrap(), Constraint::All);
    }
}
