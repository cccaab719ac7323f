//! Parsed, immutable manifest model.

use std::collections::BTreeMap;
use std::fmt;

use envsmith_common::types::{EnvName, Sha256Hash};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::version::Version;

/// Precedence level a requirement was declared at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Top-level `dependencies` entry, installed by the primary resolver.
    Primary,
    /// Entry of a nested `pip:` list, installed after the primary set.
    Pip,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Pip => write!(f, "pip"),
        }
    }
}

/// Comparison operator of a single constraint clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Op {
    /// `==v`, or a bare `v`.
    Eq,
    /// `!=v`.
    NotEq,
    /// `>=v`.
    Ge,
    /// `>v`.
    Gt,
    /// `<=v`.
    Le,
    /// `<v`.
    Lt,
    /// `~=v`: compatible release.
    Compatible,
    /// `=v`, `v.*` or `==v.*`: any version starting with `v`.
    Prefix,
}

/// One `op version` clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Clause {
    /// Comparison operator.
    pub op: Op,
    /// Version operand, without any trailing `.*`.
    pub version: Version,
}

impl Clause {
    /// Renders the clause in the syntax of the given level.
    #[must_use]
    pub fn render(&self, level: Level) -> String {
        let v = &self.version;
        match (self.op, level) {
            (Op::Eq, _) => format!("=={v}"),
            (Op::NotEq, _) => format!("!={v}"),
            (Op::Ge, _) => format!(">={v}"),
            (Op::Gt, _) => format!(">{v}"),
            (Op::Le, _) => format!("<={v}"),
            (Op::Lt, _) => format!("<{v}"),
            (Op::Compatible, _) => format!("~={v}"),
            (Op::Prefix, Level::Primary) => format!("={v}"),
            (Op::Prefix, Level::Pip) => format!("=={v}.*"),
        }
    }
}

/// Conjunction of clauses. Empty means "any version".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Constraint {
    /// Clauses that must all hold.
    pub clauses: Vec<Clause>,
}

impl Constraint {
    /// Returns `true` when the constraint accepts every version.
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Renders the clauses comma-joined in the syntax of the given level.
    #[must_use]
    pub fn render(&self, level: Level) -> String {
        self.clauses
            .iter()
            .map(|c| c.render(level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A single `(name, constraint)` requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Requirement {
    /// Package name as written.
    pub name: String,
    /// Channel pin (`channel::name`); primary level only.
    pub channel: Option<String>,
    /// Optional extras (`name[a,b]`); pip level only.
    pub extras: Vec<String>,
    /// Version constraint.
    pub constraint: Constraint,
    /// Build string pin (`name=1.0=build`); primary level only.
    pub build: Option<String>,
    /// Precedence level this requirement was declared at.
    pub level: Level,
}

impl Requirement {
    /// Returns the comparison key for the package name.
    ///
    /// Case and `_`/`-` differences do not make two packages distinct.
    #[must_use]
    pub fn key(&self) -> String {
        self.name.to_ascii_lowercase().replace('_', "-")
    }

    /// Renders the requirement as a spec the resolver for its level accepts.
    #[must_use]
    pub fn to_spec(&self) -> String {
        let mut spec = String::new();
        if let Some(channel) = &self.channel {
            spec.push_str(channel);
            spec.push_str("::");
        }
        spec.push_str(&self.name);
        if !self.extras.is_empty() {
            spec.push('[');
            spec.push_str(&self.extras.join(","));
            spec.push(']');
        }
        spec.push_str(&self.constraint.render(self.level));
        if let Some(build) = &self.build {
            if self.constraint.is_any() {
                spec.push_str("=*");
            }
            spec.push('=');
            spec.push_str(build);
        }
        spec
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_spec())
    }
}

/// A parsed environment manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    /// Name of the environment to materialize.
    pub name: EnvName,
    /// Ordered channel/source list.
    pub channels: Vec<String>,
    /// Requirements in declaration order, across all levels.
    pub requirements: Vec<Requirement>,
    /// Extra variables exported on activation.
    pub variables: BTreeMap<String, String>,
}

impl Manifest {
    /// Returns the requirements declared at `level`, in order.
    pub fn requirements_at(&self, level: Level) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter().filter(move |r| r.level == level)
    }

    /// Computes the SHA-256 digest of the normalized manifest.
    ///
    /// Formatting differences in the source file (whitespace, quoting,
    /// comments) do not change the digest.
    #[must_use]
    pub fn digest(&self) -> Sha256Hash {
        #[derive(Serialize)]
        struct Normalized<'a> {
            name: &'a str,
            channels: &'a [String],
            requirements: Vec<(Level, String)>,
            variables: &'a BTreeMap<String, String>,
        }

        let normalized = Normalized {
            name: self.name.as_str(),
            channels: &self.channels,
            requirements: self
                .requirements
                .iter()
                .map(|r| (r.level, r.to_spec()))
                .collect(),
            variables: &self.variables,
        };
        let mut hasher = Sha256::new();
        // Serializing plain strings, tuples and a BTreeMap cannot fail.
        if let Ok(bytes) = serde_json::to_vec(&normalized) {
            hasher.update(&bytes);
        }
        Sha256Hash::from_digest_bytes(&hasher.finalize())
    }
}
