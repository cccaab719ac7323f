//! Merging duplicate requirements and detecting provable conflicts.
//!
//! Requirements naming the same package at the same level are merged into
//! one conjunction before they reach the resolver. When the merged clauses
//! are provably unsatisfiable the conflict is reported here instead of
//! round-tripping through the resolver.

use std::collections::HashMap;

use thiserror::Error;

use crate::model::{Clause, Level, Op, Requirement};
use crate::version::{Bound, Interval, bump_last};

/// Two or more constraints on one package that cannot hold together.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("conflicting {level} requirements for \"{package}\": {}", .specs.join(" and "))]
pub struct Conflict {
    /// Package name as first declared.
    pub package: String,
    /// Level the conflicting declarations share.
    pub level: Level,
    /// The original requirement specs involved.
    pub specs: Vec<String>,
}

/// Merges duplicates and checks each package's merged constraint.
///
/// Declaration order is preserved by first occurrence. Packages at
/// different levels are never merged with each other.
///
/// # Errors
///
/// Returns the first [`Conflict`] found.
pub fn consolidate(requirements: &[Requirement]) -> Result<Vec<Requirement>, Conflict> {
    let mut merged: Vec<Requirement> = Vec::new();
    let mut sources: Vec<Vec<String>> = Vec::new();
    let mut index: HashMap<(Level, String), usize> = HashMap::new();

    for req in requirements {
        let key = (req.level, req.key());
        if let Some(&i) = index.get(&key) {
            sources[i].push(req.to_spec());
            merge_into(&mut merged[i], req).map_err(|()| Conflict {
                package: merged[i].name.clone(),
                level: req.level,
                specs: sources[i].clone(),
            })?;
        } else {
            let _ = index.insert(key, merged.len());
            merged.push(req.clone());
            sources.push(vec![req.to_spec()]);
        }
    }

    for (req, specs) in merged.iter().zip(&sources) {
        if is_unsatisfiable(&req.constraint.clauses) {
            return Err(Conflict {
                package: req.name.clone(),
                level: req.level,
                specs: specs.clone(),
            });
        }
    }

    tracing::debug!(
        declared = requirements.len(),
        merged = merged.len(),
        "requirements consolidated"
    );
    Ok(merged)
}

fn merge_into(target: &mut Requirement, other: &Requirement) -> Result<(), ()> {
    match (&target.channel, &other.channel) {
        (Some(a), Some(b)) if a != b => return Err(()),
        (None, Some(b)) => target.channel = Some(b.clone()),
        _ => {}
    }
    match (&target.build, &other.build) {
        (Some(a), Some(b)) if a != b => return Err(()),
        (None, Some(b)) => target.build = Some(b.clone()),
        _ => {}
    }
    for extra in &other.extras {
        if !target.extras.contains(extra) {
            target.extras.push(extra.clone());
        }
    }
    for clause in &other.constraint.clauses {
        if !target.constraint.clauses.contains(clause) {
            target.constraint.clauses.push(clause.clone());
        }
    }
    Ok(())
}

/// Returns `true` only when the clauses provably admit no version.
///
/// Clauses whose versions have textual parts (pre-releases, local tags)
/// are ignored; the resolver has the final word on those.
fn is_unsatisfiable(clauses: &[Clause]) -> bool {
    let mut interval = Interval::default();
    for clause in clauses {
        let Some(v) = clause.version.numeric() else {
            continue;
        };
        match clause.op {
            Op::Eq => {
                interval.raise_lower(Bound {
                    version: v.clone(),
                    inclusive: true,
                });
                interval.lower_upper(Bound {
                    version: v,
                    inclusive: true,
                });
            }
            Op::NotEq => interval.exclude(v),
            Op::Ge | Op::Gt => interval.raise_lower(Bound {
                version: v,
                inclusive: clause.op == Op::Ge,
            }),
            Op::Le | Op::Lt => interval.lower_upper(Bound {
                version: v,
                inclusive: clause.op == Op::Le,
            }),
            Op::Prefix => {
                if let Some(next) = bump_last(&v) {
                    interval.raise_lower(Bound {
                        version: v,
                        inclusive: true,
                    });
                    interval.lower_upper(Bound {
                        version: next,
                        inclusive: false,
                    });
                }
            }
            Op::Compatible => {
                let upper = v.split_last().and_then(|(_, head)| bump_last(head));
                if let Some(next) = upper {
                    interval.raise_lower(Bound {
                        version: v,
                        inclusive: true,
                    });
                    interval.lower_upper(Bound {
                        version: next,
                        inclusive: false,
                    });
                }
            }
        }
    }
    interval.is_empty()
}
