//! Parser for the RubyGems dependency-constraint grammar: a comma-separated
//! list of `operator version` pairs (`~> 1.2.3, >= 1.0`).

use debler_version::GemVersion;
use thiserror::Error;

use crate::{Constraint, build_and};

#[derive(Debug, Error)]
pub enum GemConstraintError {
    #[error("empty constraint clause")]
    EmptyClause,
    #[error("unknown operator: {0:?}")]
    UnknownOperator(String),
    #[error("invalid version in constraint: {0}")]
    InvalidVersion(#[from] debler_version::VersionError),
}

/// Parse a gem-style constraint list such as `"~> 1.2.3, != 1.2.4"`.
pub fn parse_constraints(input: &str) -> Result<Constraint<GemVersion>, GemConstraintError> {
    if input.trim().is_empty() || input.trim() == ">= 0" {
        return Ok(Constraint::All);
    }

    let mut leaves = Vec::new();
    for clause in input.split(',') {
        let clause = clause.trim();
        if clause.is_empty() {
            continue;
        }
        leaves.extend(parse_clause(clause)?);
    }
    if leaves.is_empty() {
        return Err(GemConstraintError::EmptyClause);
    }
    Ok(build_and(leaves))
}

fn parse_clause(clause: &str) -> Result<Vec<Constraint<GemVersion>>, GemConstraintError> {
    let (op, rest) = split_operator(clause)?;
    let version_str = rest.trim();
    let version = GemVersion::parse(version_str)?;

    Ok(match op {
        "~>" => {
            let upper = version.tilde_upper_bound();
            vec![Constraint::GreaterEqual(version), Constraint::LessThan(upper)]
        }
        "=" => vec![Constraint::Exact(version)],
        "!=" => vec![Constraint::NotEqualApprox(version)],
        ">" => vec![Constraint::GreaterThan(version)],
        ">=" => vec![Constraint::GreaterEqual(version)],
        "<" => vec![Constraint::LessThan(version)],
        "<=" => vec![Constraint::LessEqual(version)],
        other => return Err(GemConstraintError::UnknownOperator(other.to_string())),
    })
}

fn split_operator(clause: &str) -> Result<(&str, &str), GemConstraintError> {
    for op in ["~>", ">=", "<=", "!=", ">", "<", "="] {
        if let Some(rest) = clause.strip_prefix(op) {
            return Ok((op, rest));
        }
    }
    Err(GemConstraintError::UnknownOperator(clause.to_string()))
}
