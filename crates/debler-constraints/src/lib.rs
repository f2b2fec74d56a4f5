//! A symbolic algebra over version constraints, shared by every ecosystem
//! debler packages.
//!
//! The tree itself ([`Constraint`]) is generic over the version type so the
//! RubyGems and npm/yarn parsers (see [`gem`] and [`npm`]) can share one
//! simplifier ([`build_and`], [`build_or`]) and one slot compiler
//! ([`compile::compile_to_os_deps`]).

pub mod compile;
pub mod gem;
pub mod npm;

use std::fmt;

/// A constraint tree. Leaves compare a version with a single operator; `And`
/// and `Or` combine sub-constraints. `All` is the distinguished
/// "unconstrained" value.
#[derive(Debug, Clone)]
pub enum Constraint<V> {
    All,
    GreaterThan(V),
    GreaterEqual(V),
    LessThan(V),
    LessEqual(V),
    Exact(V),
    /// `!=` as used by the gem grammar. Approximated as `GreaterThan` rather
    /// than a true exclusion — see the "resolved open questions" note in
    /// SPEC_FULL.md. Kept distinct from `GreaterThan` in the tree so display
    /// and compilation can make the approximation visible instead of
    /// silently aliasing it.
    NotEqualApprox(V),
    And(Vec<Constraint<V>>),
    Or(Vec<Constraint<V>>),
}

impl<V: PartialEq> PartialEq for Constraint<V> {
    fn eq(&self, other: &Self) -> bool {
        use Constraint::*;
        match (self, other) {
            (All, All) => true,
            (GreaterThan(a), GreaterThan(b)) => a == b,
            (GreaterEqual(a), GreaterEqual(b)) => a == b,
            (LessThan(a), LessThan(b)) => a == b,
            (LessEqual(a), LessEqual(b)) => a == b,
            (Exact(a), Exact(b)) => a == b,
            (NotEqualApprox(a), NotEqualApprox(b)) => a == b,
            (And(a), And(b)) => multiset_eq(a, b),
            (Or(a), Or(b)) => multiset_eq(a, b),
            _ => false,
        }
    }
}

fn multiset_eq<V: PartialEq>(a: &[Constraint<V>], b: &[Constraint<V>]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    'outer: for x in a {
        for (i, y) in b.iter().enumerate() {
            if !used[i] && x == y {
                used[i] = true;
                continue 'outer;
            }
        }
        return false;
    }
    true
}

impl<V: fmt::Display> fmt::Display for Constraint<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::All => write!(f, "*"),
            Constraint::GreaterThan(v) => write!(f, "> {v}"),
            Constraint::GreaterEqual(v) => write!(f, ">= {v}"),
            Constraint::LessThan(v) => write!(f, "< {v}"),
            Constraint::LessEqual(v) => write!(f, "<= {v}"),
            Constraint::Exact(v) => write!(f, "= {v}"),
            Constraint::NotEqualApprox(v) => write!(f, "!= {v}"),
            Constraint::And(items) => {
                let parts: Vec<String> = items.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", parts.join(", "))
            }
            Constraint::Or(items) => {
                let parts: Vec<String> = items.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", parts.join(" || "))
            }
        }
    }
}

impl<V: Ord> Constraint<V> {
    /// Whether `version` satisfies this constraint tree.
    pub fn matches(&self, version: &V) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Constraint::All => true,
            Constraint::GreaterThan(v) | Constraint::NotEqualApprox(v) => version.cmp(v) == Greater,
            Constraint::GreaterEqual(v) => version.cmp(v) != Less,
            Constraint::LessThan(v) => version.cmp(v) == Less,
            Constraint::LessEqual(v) => version.cmp(v) != Greater,
            Constraint::Exact(v) => version == v,
            Constraint::And(items) => items.iter().all(|c| c.matches(version)),
            Constraint::Or(items) => items.iter().any(|c| c.matches(version)),
        }
    }

    fn direction(&self) -> Direction {
        match self {
            Constraint::GreaterThan(_) | Constraint::GreaterEqual(_) | Constraint::NotEqualApprox(_) => {
                Direction::Lower
            }
            Constraint::LessThan(_) | Constraint::LessEqual(_) => Direction::Upper,
            Constraint::Exact(_) => Direction::Exact,
            _ => Direction::Other,
        }
    }

    fn bound_version(&self) -> Option<&V> {
        match self {
            Constraint::GreaterThan(v)
            | Constraint::GreaterEqual(v)
            | Constraint::LessThan(v)
            | Constraint::LessEqual(v)
            | Constraint::Exact(v)
            | Constraint::NotEqualApprox(v) => Some(v),
            _ => None,
        }
    }

    fn is_strict(&self) -> bool {
        matches!(
            self,
            Constraint::GreaterThan(_) | Constraint::LessThan(_) | Constraint::NotEqualApprox(_)
        )
    }
}

#[derive(PartialEq, Eq)]
enum Direction {
    Lower,
    Upper,
    Exact,
    Other,
}

/// Simplify a conjunction of leaves: at most one `Exact` is kept (it
/// dominates); among the lower bounds the strictest (highest version,
/// preferring strict `>` on ties) survives; among the upper bounds the
/// strictest (lowest version, preferring strict `<` on ties) survives.
/// `And([c])` returns `c` unchanged.
pub fn build_and<V: Ord + Clone>(leaves: Vec<Constraint<V>>) -> Constraint<V> {
    let mut flat = Vec::new();
    for leaf in leaves {
        match leaf {
            Constraint::And(items) => flat.extend(items),
            Constraint::All => {}
            other => flat.push(other),
        }
    }

    if let Some(exact) = flat.iter().find(|c| c.direction() == Direction::Exact) {
        return exact.clone();
    }

    let mut lower: Option<Constraint<V>> = None;
    let mut upper: Option<Constraint<V>> = None;

    for leaf in flat {
        match leaf.direction() {
            Direction::Lower => {
                lower = Some(match lower {
                    None => leaf,
                    Some(cur) => pick_strictest_lower(cur, leaf),
                });
            }
            Direction::Upper => {
                upper = Some(match upper {
                    None => leaf,
                    Some(cur) => pick_strictest_upper(cur, leaf),
                });
            }
            _ => {}
        }
    }

    match (lower, upper) {
        (Some(l), Some(u)) => Constraint::And(vec![l, u]),
        (Some(l), None) => l,
        (None, Some(u)) => u,
        (None, None) => Constraint::All,
    }
}

fn pick_strictest_lower<V: Ord + Clone>(a: Constraint<V>, b: Constraint<V>) -> Constraint<V> {
    let (av, bv) = (a.bound_version().unwrap(), b.bound_version().unwrap());
    match av.cmp(bv) {
        std::cmp::Ordering::Greater => a,
        std::cmp::Ordering::Less => b,
        std::cmp::Ordering::Equal => {
            if a.is_strict() {
                a
            } else {
                b
            }
        }
    }
}

fn pick_strictest_upper<V: Ord + Clone>(a: Constraint<V>, b: Constraint<V>) -> Constraint<V> {
    let (av, bv) = (a.bound_version().unwrap(), b.bound_version().unwrap());
    match av.cmp(bv) {
        std::cmp::Ordering::Less => a,
        std::cmp::Ordering::Greater => b,
        std::cmp::Ordering::Equal => {
            if a.is_strict() {
                a
            } else {
                b
            }
        }
    }
}

/// Simplify a disjunction, merging adjacent `And` ranges whose bounds touch
/// (the upper bound of one equals the lower bound of the next) into a single
/// hull. `Or([c])` returns `c` unchanged.
pub fn build_or<V: Ord + Clone>(branches: Vec<Constraint<V>>) -> Constraint<V> {
    let mut ranges: Vec<Constraint<V>> = Vec::new();
    for b in branches {
        match b {
            Constraint::Or(items) => ranges.extend(items),
            other => ranges.push(other),
        }
    }

    if ranges.is_empty() {
        return Constraint::All;
    }

    let mut changed = true;
    while changed {
        changed = false;
        'outer: for i in 0..ranges.len() {
            for j in 0..ranges.len() {
                if i == j {
                    continue;
                }
                if let Some(merged) = try_merge_touching(&ranges[i], &ranges[j]) {
                    let (lo, hi) = if i < j { (i, j) } else { (j, i) };
                    ranges.remove(hi);
                    ranges.remove(lo);
                    ranges.push(merged);
                    changed = true;
                    break 'outer;
                }
            }
        }
    }

    if ranges.len() == 1 {
        ranges.into_iter().next().unwrap()
    } else {
        Constraint::Or(ranges)
    }
}

/// Extract `(lower, upper)` leaves from a range-shaped constraint (a bare
/// leaf counts as a one-sided range).
fn range_bounds<V: Clone>(c: &Constraint<V>) -> (Option<Constraint<V>>, Option<Constraint<V>>) {
    match c {
        Constraint::And(items) => {
            let lower = items.iter().find(|x| x.direction() == Direction::Lower).cloned();
            let upper = items.iter().find(|x| x.direction() == Direction::Upper).cloned();
            (lower, upper)
        }
        _ if c.direction() == Direction::Lower => (Some(c.clone()), None),
        _ if c.direction() == Direction::Upper => (None, Some(c.clone())),
        _ => (None, None),
    }
}

fn try_merge_touching<V: Ord + Clone>(a: &Constraint<V>, b: &Constraint<V>) -> Option<Constraint<V>> {
    let (a_lo, a_hi) = range_bounds(a);
    let (b_lo, b_hi) = range_bounds(b);
    let (a_hi, b_lo) = (a_hi?, b_lo?);
    if a_hi.bound_version()? == b_lo.bound_version()? {
        return Some(build_and(
            [a_lo, Some(b_hi.unwrap_or(a_hi))].into_iter().flatten().collect(),
        ));
    }
    None
}
