//! Version strings and the bounds a set of constraint clauses implies.
//!
//! This is not a resolver. It only answers one question: can a set of
//! clauses on a single package be proven unsatisfiable without asking the
//! external resolver? Anything with non-numeric version parts is left to
//! the resolver.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One dot-separated component of a version.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Num(u64),
    Text(String),
}

/// A package version as written in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    /// Wraps a version string.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the version as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn parts(&self) -> Vec<Part> {
        let mut parts = Vec::new();
        for segment in self.0.split(['.', '-', '_', '+']) {
            let mut rest = segment;
            while !rest.is_empty() {
                let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
                if digits > 0 {
                    let (num, tail) = rest.split_at(digits);
                    parts.push(num.parse().map_or_else(|_| Part::Text(num.into()), Part::Num));
                    rest = tail;
                } else {
                    let text = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
                    let (word, tail) = rest.split_at(text);
                    parts.push(Part::Text(word.to_ascii_lowercase()));
                    rest = tail;
                }
            }
        }
        parts
    }

    /// Returns the numeric components, or `None` if any component is textual.
    pub(crate) fn numeric(&self) -> Option<Vec<u64>> {
        self.parts()
            .into_iter()
            .map(|p| match p {
                Part::Num(n) => Some(n),
                Part::Text(_) => None,
            })
            .collect()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compares two purely numeric versions, padding the shorter with zeros.
pub(crate) fn cmp_numeric(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

/// Returns the smallest version strictly above every version with `prefix`.
///
/// `1.2` becomes `1.3`; `~=`-style callers drop the last part first.
pub(crate) fn bump_last(prefix: &[u64]) -> Option<Vec<u64>> {
    let mut next = prefix.to_vec();
    let last = next.last_mut()?;
    *last = last.checked_add(1)?;
    Some(next)
}

/// A lower or upper bound on a numeric version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Bound {
    pub(crate) version: Vec<u64>,
    pub(crate) inclusive: bool,
}

/// The interval implied by a set of clauses, plus point exclusions.
#[derive(Debug, Clone, Default)]
pub(crate) struct Interval {
    lower: Option<Bound>,
    upper: Option<Bound>,
    excluded: Vec<Vec<u64>>,
}

impl Interval {
    /// Tightens the lower bound.
    pub(crate) fn raise_lower(&mut self, bound: Bound) {
        let tighter = match &self.lower {
            None => true,
            Some(current) => match cmp_numeric(&bound.version, &current.version) {
                Ordering::Greater => true,
                Ordering::Equal => current.inclusive && !bound.inclusive,
                Ordering::Less => false,
            },
        };
        if tighter {
            self.lower = Some(bound);
        }
    }

    /// Tightens the upper bound.
    pub(crate) fn lower_upper(&mut self, bound: Bound) {
        let tighter = match &self.upper {
            None => true,
            Some(current) => match cmp_numeric(&bound.version, &current.version) {
                Ordering::Less => true,
                Ordering::Equal => current.inclusive && !bound.inclusive,
                Ordering::Greater => false,
            },
        };
        if tighter {
            self.upper = Some(bound);
        }
    }

    /// Excludes a single version.
    pub(crate) fn exclude(&mut self, version: Vec<u64>) {
        self.excluded.push(version);
    }

    /// Returns `true` when no version can satisfy the interval.
    pub(crate) fn is_empty(&self) -> bool {
        let (Some(lower), Some(upper)) = (&self.lower, &self.upper) else {
            return false;
        };
        match cmp_numeric(&lower.version, &upper.version) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => {
                !(lower.inclusive && upper.inclusive)
                    || self
                        .excluded
                        .iter()
                        .any(|v| cmp_numeric(v, &lower.version) == Ordering::Equal)
            }
        }
    }
}
