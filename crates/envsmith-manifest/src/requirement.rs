//! Requirement string grammar, built on `nom`.
//!
//! Accepts the common subset of conda match specs and pip requirement
//! specifiers:
//!
//! ```text
//! numpy                      any version
//! foo>=1.0,<2                conjunction of clauses
//! python=3.11                prefix match (conda fuzzy)
//! python=3.11=h2755cc3_0     prefix match with build pin
//! openssl 3.0.*              space-separated conda form
//! conda-forge::libarrow      channel pin
//! requests[socks]~=2.31      pip extras
//! ```
//!
//! Alternatives (`|`) and environment markers (`;`) are rejected.

use envsmith_common::error::{EnvsmithError, Result};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{opt, value},
    multi::separated_list1,
    sequence::{delimited, preceded},
};

use crate::model::{Clause, Constraint, Level, Op, Requirement};
use crate::version::Version;

const fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

const fn is_version_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '!' | '*' | '-')
}

const fn is_build_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '*')
}

fn package_name(input: &str) -> IResult<&str, &str> {
    take_while1(is_name_char).parse(input)
}

fn extras(input: &str) -> IResult<&str, Vec<String>> {
    delimited(
        char('['),
        separated_list1(
            delimited(multispace0, char(','), multispace0),
            take_while1(is_name_char).map(String::from),
        ),
        char(']'),
    )
    .parse(input)
}

fn operator(input: &str) -> IResult<&str, Op> {
    alt((
        value(Op::Eq, tag("==")),
        value(Op::NotEq, tag("!=")),
        value(Op::Ge, tag(">=")),
        value(Op::Le, tag("<=")),
        value(Op::Compatible, tag("~=")),
        value(Op::Gt, tag(">")),
        value(Op::Lt, tag("<")),
        value(Op::Prefix, tag("=")),
    ))
    .parse(input)
}

fn version_token(input: &str) -> IResult<&str, &str> {
    take_while1(is_version_char).parse(input)
}

fn clause(input: &str) -> IResult<&str, (Option<Op>, &str)> {
    (opt(operator), preceded(multispace0, version_token)).parse(input)
}

fn clause_list(input: &str) -> IResult<&str, Vec<(Option<Op>, &str)>> {
    separated_list1(delimited(multispace0, char(','), multispace0), clause).parse(input)
}

/// The constraint tail: operator clauses, or the conda space form.
fn constraint_tail(input: &str) -> IResult<&str, (Vec<(Option<Op>, &str)>, Option<&str>)> {
    let build_after_eq = preceded(char('='), take_while1(is_build_char));
    let build_after_space = preceded(multispace1, take_while1(is_build_char));
    (
        preceded(multispace0, clause_list),
        opt(alt((build_after_eq, build_after_space))),
    )
        .parse(input)
}

/// Turns an `(operator, version)` pair into a clause, normalizing wildcards.
fn make_clause(op: Option<Op>, raw: &str, spec: &str) -> Result<Clause> {
    let (base, wildcard) = raw
        .strip_suffix(".*")
        .or_else(|| raw.strip_suffix('*'))
        .map_or((raw, false), |b| (b, true));
    if base.is_empty() || base.contains('*') {
        return Err(EnvsmithError::manifest(format!(
            "invalid version \"{raw}\" in requirement \"{spec}\""
        )));
    }
    let op = match (op, wildcard) {
        (None | Some(Op::Eq | Op::Prefix), true) | (Some(Op::Prefix), false) => Op::Prefix,
        (None, false) => Op::Eq,
        (Some(op), false) => op,
        (Some(_), true) => {
            return Err(EnvsmithError::manifest(format!(
                "wildcard only allowed with '=' or '==' in requirement \"{spec}\""
            )));
        }
    };
    if op == Op::Compatible && !base.contains('.') {
        return Err(EnvsmithError::manifest(format!(
            "'~=' needs at least two version components in requirement \"{spec}\""
        )));
    }
    Ok(Clause {
        op,
        version: Version::new(base),
    })
}

/// Parses one requirement string declared at `level`.
///
/// # Errors
///
/// Returns `EnvsmithError::ManifestInvalid` if the string does not match
/// the grammar, or uses a feature not valid at `level`.
pub fn parse_requirement(spec: &str, level: Level) -> Result<Requirement> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(EnvsmithError::manifest("empty requirement"));
    }
    if let Some(bad) = trimmed.chars().find(|c| matches!(c, '|' | ';' | '@')) {
        return Err(EnvsmithError::manifest(format!(
            "unsupported character {bad:?} in requirement \"{trimmed}\""
        )));
    }

    let (channel, rest) = match trimmed.split_once("::") {
        Some((ch, rest)) if level == Level::Primary && !ch.is_empty() => (Some(ch.to_string()), rest),
        Some(_) => {
            return Err(EnvsmithError::manifest(format!(
                "channel pin not allowed in {level} requirement \"{trimmed}\""
            )));
        }
        None => (None, trimmed),
    };

    let malformed = |detail: &str| {
        EnvsmithError::manifest(format!("malformed requirement \"{trimmed}\": {detail}"))
    };

    let (rest, name) = package_name(rest).map_err(|_| malformed("expected a package name"))?;
    let (rest, extras) = opt(extras)
        .parse(rest)
        .map_err(|_| malformed("invalid extras list"))?;
    let extras = extras.unwrap_or_default();
    if !extras.is_empty() && level != Level::Pip {
        return Err(malformed("extras are only allowed in pip requirements"));
    }

    let (clauses, build) = if rest.trim().is_empty() {
        (Vec::new(), None)
    } else {
        let (tail, (raw_clauses, build)) =
            constraint_tail(rest).map_err(|_| malformed("invalid version constraint"))?;
        if !tail.trim().is_empty() {
            return Err(malformed(&format!("unexpected trailing input \"{}\"", tail.trim())));
        }
        let clauses = raw_clauses
            .into_iter()
            .map(|(op, raw)| make_clause(op, raw, trimmed))
            .collect::<Result<Vec<_>>>()?;
        (clauses, build.map(String::from))
    };
    if build.is_some() && level != Level::Primary {
        return Err(malformed("build pins are only allowed in primary requirements"));
    }

    Ok(Requirement {
        name: name.to_string(),
        channel,
        extras,
        constraint: Constraint { clauses },
        build,
        level,
    })
}
