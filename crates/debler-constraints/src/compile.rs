//! Compiles a constraint tree plus a package's known slots into OS-package
//! dependency clauses.

use std::fmt;

use thiserror::Error;

use crate::Constraint;

/// One tracked version lane of a package: the half-open interval
/// `[min_version, max_version)` of versions it can hold, and the OS-package
/// name that satisfies any version in that interval.
#[derive(Debug, Clone)]
pub struct Slot<V> {
    pub os_name: String,
    pub min_version: V,
    pub max_version: V,
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("constraint is not representable as a single OS dependency: {0}")]
    NotRepresentable(String),
}

/// One alternative in a compiled OS `Depends:` clause: a slot's package name
/// plus an optional version qualifier (`(>= 1.2.3)`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsDependencyTerm {
    pub package: String,
    pub relation: Option<(OsRelation, String)>,
}

impl fmt::Display for OsDependencyTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Some((rel, version)) => write!(f, "{} ({} {})", self.package, rel, version),
            None => write!(f, "{}", self.package),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsRelation {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
}

impl fmt::Display for OsRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OsRelation::Gt => ">>",
            OsRelation::Ge => ">=",
            OsRelation::Lt => "<<",
            OsRelation::Le => "<=",
            OsRelation::Eq => "=",
        };
        write!(f, "{s}")
    }
}

enum Eval {
    AlwaysFalse,
    AlwaysTrue,
    Boundary(OsRelation),
}

fn evaluate_leaf<V: Ord + Clone + fmt::Display>(leaf: &Constraint<V>, slot: &Slot<V>) -> Eval {
    use std::cmp::Ordering::*;
    match leaf {
        Constraint::GreaterThan(v) | Constraint::NotEqualApprox(v) => {
            if slot.max_version.cmp(v) != Greater {
                Eval::AlwaysFalse
            } else if slot.min_version.cmp(v) == Greater {
                Eval::AlwaysTrue
            } else {
                Eval::Boundary(OsRelation::Gt)
            }
        }
        Constraint::GreaterEqual(v) => {
            if slot.max_version.cmp(v) == Less {
                Eval::AlwaysFalse
            } else if slot.min_version.cmp(v) != Less {
                Eval::AlwaysTrue
            } else {
                Eval::Boundary(OsRelation::Ge)
            }
        }
        Constraint::LessThan(v) => {
            if slot.min_version.cmp(v) != Less {
                Eval::AlwaysFalse
            } else if slot.max_version.cmp(v) != Greater {
                Eval::AlwaysTrue
            } else {
                Eval::Boundary(OsRelation::Lt)
            }
        }
        Constraint::LessEqual(v) => {
            if slot.min_version.cmp(v) == Greater {
                Eval::AlwaysFalse
            } else if slot.max_version.cmp(v) != Greater {
                Eval::AlwaysTrue
            } else {
                Eval::Boundary(OsRelation::Le)
            }
        }
        Constraint::Exact(_) | Constraint::And(_) | Constraint::Or(_) => {
            unreachable!("leaf-only evaluator called on a compound node")
        }
    }
}

fn leaf_version<V: Clone>(leaf: &Constraint<V>) -> V {
    match leaf {
        Constraint::GreaterThan(v)
        | Constraint::GreaterEqual(v)
        | Constraint::LessThan(v)
        | Constraint::LessEqual(v)
        | Constraint::NotEqualApprox(v) => v.clone(),
        _ => unreachable!(),
    }
}

/// Per-slot outcome of compiling a range (a conjunction of bound leaves)
/// against one slot.
enum SlotOutcome {
    Eliminated,
    Unqualified,
    Qualified(Vec<(OsRelation, String)>),
}

fn compile_range<V: Ord + Clone + fmt::Display>(
    leaves: &[Constraint<V>],
    slot: &Slot<V>,
) -> SlotOutcome {
    let mut quals = Vec::new();
    for leaf in leaves {
        match evaluate_leaf(leaf, slot) {
            Eval::AlwaysFalse => return SlotOutcome::Eliminated,
            Eval::AlwaysTrue => {}
            Eval::Boundary(rel) => quals.push((rel, leaf_version(leaf).to_string())),
        }
    }
    if quals.is_empty() {
        SlotOutcome::Unqualified
    } else {
        SlotOutcome::Qualified(quals)
    }
}

/// Compile a constraint into the list of alternatives for a single
/// `Depends:` clause against `package_name`'s known `slots` (ordered
/// ascending by version, as stored in the catalog).
pub fn compile_to_os_deps<V: Ord + Clone + fmt::Display>(
    constraint: &Constraint<V>,
    slots: &[Slot<V>],
) -> Result<Vec<OsDependencyTerm>, CompileError> {
    match constraint {
        Constraint::All => Ok(slots
            .iter()
            .map(|s| OsDependencyTerm {
                package: s.os_name.clone(),
                relation: None,
            })
            .collect()),
        Constraint::Exact(v) => {
            let hit = slots
                .iter()
                .find(|s| s.min_version.cmp(v) != std::cmp::Ordering::Greater && v.cmp(&s.max_version) == std::cmp::Ordering::Less);
            match hit {
                Some(s) => Ok(vec![OsDependencyTerm {
                    package: s.os_name.clone(),
                    relation: Some((OsRelation::Eq, v.to_string())),
                }]),
                None => Ok(Vec::new()),
            }
        }
        leaf @ (Constraint::GreaterThan(_)
        | Constraint::GreaterEqual(_)
        | Constraint::LessThan(_)
        | Constraint::LessEqual(_)
        | Constraint::NotEqualApprox(_)) => compile_range_constraint(std::slice::from_ref(leaf), slots),
        Constraint::And(leaves) => compile_range_constraint(leaves, slots),
        Constraint::Or(branches) => compile_or(branches, slots),
    }
}

fn compile_range_constraint<V: Ord + Clone + fmt::Display>(
    leaves: &[Constraint<V>],
    slots: &[Slot<V>],
) -> Result<Vec<OsDependencyTerm>, CompileError> {
    let mut terms = Vec::new();
    for slot in slots {
        match compile_range(leaves, slot) {
            SlotOutcome::Eliminated => {}
            SlotOutcome::Unqualified => terms.push(OsDependencyTerm {
                package: slot.os_name.clone(),
                relation: None,
            }),
            SlotOutcome::Qualified(mut quals) => {
                // A slot surviving with more than one boundary qualifier
                // (both a lower and an upper edge) needs two separate
                // alternatives joined by AND at the dependency-line level,
                // which dpkg expresses as two comma-separated Depends
                // entries rather than one `|` alternative. We fold this
                // into a single term per qualifier and let the caller join
                // same-slot terms with a conjunction if there's more than
                // one; for the common single-bound case this is just one
                // term.
                if quals.len() == 1 {
                    let (rel, version) = quals.remove(0);
                    terms.push(OsDependencyTerm {
                        package: slot.os_name.clone(),
                        relation: Some((rel, version)),
                    });
                } else {
                    for (rel, version) in quals {
                        terms.push(OsDependencyTerm {
                            package: slot.os_name.clone(),
                            relation: Some((rel, version)),
                        });
                    }
                }
            }
        }
    }
    Ok(terms)
}

fn compile_or<V: Ord + Clone + fmt::Display>(
    branches: &[Constraint<V>],
    slots: &[Slot<V>],
) -> Result<Vec<OsDependencyTerm>, CompileError> {
    let mut by_slot: std::collections::HashMap<String, Vec<OsDependencyTerm>> =
        std::collections::HashMap::new();

    for branch in branches {
        for term in compile_to_os_deps(branch, slots)? {
            by_slot.entry(term.package.clone()).or_default().push(term);
        }
    }

    let mut out = Vec::new();
    for (package, mut terms) in by_slot {
        if terms.iter().any(|t| t.relation.is_none()) {
            out.push(OsDependencyTerm { package, relation: None });
        } else if terms.len() == 1 {
            out.push(terms.remove(0));
        } else {
            return Err(CompileError::NotRepresentable(format!(
                "package {package} is reachable by more than one disjoint branch with different version qualifiers"
            )));
        }
    }
    out.sort_by(|a, b| a.package.cmp(&b.package));
    Ok(out)
}
