//! Domain primitive types used across the envsmith workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_ENV_NAME_LEN, SHA256_HEX_LENGTH};
use crate::error::{EnvsmithError, Result};

/// Validated name of an environment.
///
/// Names double as directory names in the store, so they are restricted to
/// ASCII alphanumerics plus `.`, `_` and `-`, and may not start with `.`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EnvName(String);

impl EnvName {
    /// Creates a name after validating it.
    ///
    /// # Errors
    ///
    /// Returns `EnvsmithError::Config` if the name is empty, too long,
    /// starts with `.`, or contains characters outside `[A-Za-z0-9._-]`.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(invalid_name(&name, "must not be empty"));
        }
        if name.len() > MAX_ENV_NAME_LEN {
            return Err(invalid_name(&name, "is too long"));
        }
        if name.starts_with('.') {
            return Err(invalid_name(&name, "must not start with '.'"));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(invalid_name(&name, &format!("contains invalid character {c:?}")));
        }
        Ok(Self(name))
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn invalid_name(name: &str, reason: &str) -> EnvsmithError {
    EnvsmithError::Config {
        message: format!("environment name \"{name}\" {reason}"),
    }
}

impl fmt::Display for EnvName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EnvName {
    type Err = EnvsmithError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for EnvName {
    type Error = EnvsmithError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<EnvName> for String {
    fn from(value: EnvName) -> Self {
        value.0
    }
}

/// SHA-256 digest of a normalized manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sha256Hash(String);

impl Sha256Hash {
    /// Creates a hash from a hex-encoded string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid 64-character hex string.
    pub fn from_hex(hex: impl Into<String>) -> Result<Self> {
        let hex = hex.into();
        if hex.len() != SHA256_HEX_LENGTH || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(EnvsmithError::Config {
                message: format!("invalid SHA-256 hex string: {hex}"),
            });
        }
        Ok(Self(hex.to_ascii_lowercase()))
    }

    /// Creates a hash from raw digest bytes.
    #[must_use]
    pub fn from_digest_bytes(bytes: &[u8]) -> Self {
        use std::fmt::Write as _;
        let mut hex = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            let _ = write!(hex, "{b:02x}");
        }
        Self(hex)
    }

    /// Returns the hex-encoded hash string.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_name_accepts_typical_names() {
        for name in ["app", "py3.11-env", "my_env", "A1"] {
            assert!(EnvName::new(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn env_name_rejects_path_like_names() {
        for name in ["", ".hidden", "a/b", "..", "with space", "ümlaut"] {
            assert!(EnvName::new(name).is_err(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn env_name_rejects_overlong_names() {
        let name = "a".repeat(MAX_ENV_NAME_LEN + 1);
        assert!(EnvName::new(name).is_err());
    }

    #[test]
    fn env_name_deserializes_with_validation() {
        let ok: EnvName = serde_json::from_str("\"app\"").expect("valid");
        assert_eq!(ok.as_str(), "app");
        assert!(serde_json::from_str::<EnvName>("\"../etc\"").is_err());
    }

    #[test]
    fn sha256_from_hex_normalizes_case() {
        let hex = "AB".repeat(32);
        let hash = Sha256Hash::from_hex(hex).expect("valid");
        assert_eq!(hash.as_hex(), "ab".repeat(32));
        assert!(hash.to_string().starts_with("sha256:"));
    }

    #[test]
    fn sha256_from_digest_bytes_is_lower_hex() {
        let hash = Sha256Hash::from_digest_bytes(&[0xAB; 32]);
        assert_eq!(hash.as_hex(), "ab".repeat(32));
    }

    #[test]
    fn sha256_from_hex_rejects_short_input() {
        assert!(Sha256Hash::from_hex("abc").is_err());
    }
}
