//! Static checks on a parsed manifest.
//!
//! Runs after the document has been mapped onto the model and before any
//! resolver is involved.

use std::collections::HashSet;

use envsmith_common::error::{EnvsmithError, Result};

use crate::model::Manifest;

/// Validates a parsed manifest for structural correctness.
///
/// # Checks performed
///
/// 1. The requirement list is non-empty.
/// 2. Channels are non-empty and not repeated.
/// 3. Variable names are usable as environment variable names.
///
/// # Errors
///
/// Returns `EnvsmithError::ManifestInvalid` if any check fails.
pub fn validate(manifest: &Manifest) -> Result<()> {
    tracing::debug!(name = %manifest.name, "validating manifest");
    check_requirements_present(manifest)?;
    check_channels(manifest)?;
    check_variables(manifest)?;
    Ok(())
}

fn check_requirements_present(manifest: &Manifest) -> Result<()> {
    if manifest.requirements.is_empty() {
        return Err(EnvsmithError::manifest(format!(
            "environment \"{}\" declares no requirements",
            manifest.name
        )));
    }
    Ok(())
}

fn check_channels(manifest: &Manifest) -> Result<()> {
    let mut seen = HashSet::new();
    for channel in &manifest.channels {
        if channel.trim().is_empty() {
            return Err(EnvsmithError::manifest("empty channel name"));
        }
        if !seen.insert(channel.as_str()) {
            return Err(EnvsmithError::manifest(format!(
                "duplicate channel: \"{channel}\""
            )));
        }
    }
    Ok(())
}

fn check_variables(manifest: &Manifest) -> Result<()> {
    for (key, value) in &manifest.variables {
        let valid_key = key
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_key {
            return Err(EnvsmithError::manifest(format!(
                "invalid variable name: \"{key}\""
            )));
        }
        if value.contains('\0') {
            return Err(EnvsmithError::manifest(format!(
                "variable \"{key}\" contains a NUL byte"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use envsmith_common::types::EnvName;

    use super::*;
    use crate::model::Level;
    use crate::requirement::parse_requirement;

    fn manifest(requirements: &[&str]) -> Manifest {
        Manifest {
            name: EnvName::new("app").expect("name"),
            channels: vec!["conda-forge".into()],
            requirements: requirements
                .iter()
                .map(|r| parse_requirement(r, Level::Primary).expect("parse"))
                .collect(),
            variables: BTreeMap::new(),
        }
    }

    #[test]
    fn validate_valid_manifest_succeeds() {
        assert!(validate(&manifest(&["foo>=1.0"])).is_ok());
    }

    #[test]
    fn validate_empty_requirements_fails() {
        let err = validate(&manifest(&[])).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("declares no requirements"), "got: {msg}");
    }

    #[test]
    fn validate_duplicate_channel_fails() {
        let mut m = manifest(&["foo"]);
        m.channels.push("conda-forge".into());
        let err = validate(&m).unwrap_err();
        assert!(err.to_string().contains("duplicate channel"));
    }

    #[test]
    fn validate_blank_channel_fails() {
        let mut m = manifest(&["foo"]);
        m.channels.push("  ".into());
        assert!(validate(&m).is_err());
    }

    #[test]
    fn validate_bad_variable_name_fails() {
        let mut m = manifest(&["foo"]);
        let _ = m.variables.insert("1BAD".into(), "x".into());
        assert!(validate(&m).is_err());
    }

    #[test]
    fn validate_good_variable_succeeds() {
        let mut m = manifest(&["foo"]);
        let _ = m.variables.insert("APP_MODE".into(), "production".into());
        assert!(validate(&m).is_ok());
    }
}
