//! YAML document shape of a manifest file.
//!
//! ```yaml
//! name: app
//! channels:
//!   - conda-forge
//! dependencies:
//!   - python=3.11
//!   - foo>=1.0
//!   - pip:
//!       - requests[socks]~=2.31
//! variables:
//!   APP_MODE: production
//! ```

use std::collections::BTreeMap;

use envsmith_common::error::{EnvsmithError, Result};
use envsmith_common::types::EnvName;
use serde::Deserialize;

use crate::model::{Level, Manifest};
use crate::requirement::parse_requirement;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    name: Option<String>,
    #[serde(default)]
    channels: Vec<String>,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
    #[serde(default)]
    variables: BTreeMap<String, serde_yaml::Value>,
    /// Accepted for compatibility; the store decides where environments live.
    #[serde(default)]
    #[allow(dead_code)]
    prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDependency {
    Spec(String),
    Nested(RawNested),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNested {
    pip: Vec<String>,
}

/// Maps YAML text onto the manifest model.
pub(crate) fn from_yaml(input: &str) -> Result<Manifest> {
    let raw: RawManifest = serde_yaml::from_str(input)
        .map_err(|e| EnvsmithError::manifest(format!("syntax error: {e}")))?;

    let name = raw
        .name
        .ok_or_else(|| EnvsmithError::manifest("manifest does not name an environment"))?;
    let name = EnvName::new(name).map_err(|e| EnvsmithError::manifest(e.to_string()))?;

    let mut requirements = Vec::new();
    let mut pip_lists = 0_usize;
    for dep in raw.dependencies {
        match dep {
            RawDependency::Spec(spec) => {
                requirements.push(parse_requirement(&spec, Level::Primary)?);
            }
            RawDependency::Nested(nested) => {
                pip_lists += 1;
                if pip_lists > 1 {
                    return Err(EnvsmithError::manifest("more than one pip list declared"));
                }
                for spec in nested.pip {
                    requirements.push(parse_requirement(&spec, Level::Pip)?);
                }
            }
        }
    }

    let variables = raw
        .variables
        .into_iter()
        .map(|(key, value)| scalar_to_string(&value).map(|v| (key.clone(), v)).ok_or_else(|| {
            EnvsmithError::manifest(format!("variable \"{key}\" must be a scalar value"))
        }))
        .collect::<Result<BTreeMap<_, _>>>()?;

    Ok(Manifest {
        name,
        channels: raw.channels,
        requirements,
        variables,
    })
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
