//! Tenant name type.
//!
//! This module defines [`TenantName`], the canonical form of an organization or
//! sub-unit name. Every name that reaches a DDL statement has passed through
//! [`TenantName::parse`].

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, ValidationError};

/// Maximum length of a tenant name in bytes (PostgreSQL `NAMEDATALEN - 1`).
pub const MAX_NAME_LENGTH: usize = 63;

static NAME_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]+$"));

/// A validated, case-folded tenant name.
///
/// Names are trimmed, lowercased and then checked against `[a-z0-9_]{1,63}`.
/// Partition names are global within the tenant schema, so the same grammar
/// applies to organizations and sub-units alike.
///
/// # Examples
///
/// ```
/// use tenantry_persistence::tenant::TenantName;
///
/// let name = TenantName::parse("  Acme_West ").unwrap();
/// assert_eq!(name.as_str(), "acme_west");
///
/// assert!(TenantName::parse("").is_err());
/// assert!(TenantName::parse("acme-west").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantName(String);

impl TenantName {
    /// Normalizes and validates a raw name.
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let normalized = raw.trim().to_lowercase();

        if normalized.is_empty() {
            return Err(ValidationError::InvalidIdentifier {
                value: raw.to_string(),
                reason: "name must not be empty".to_string(),
            }
            .into());
        }

        if normalized.len() > MAX_NAME_LENGTH {
            return Err(ValidationError::InvalidIdentifier {
                value: raw.to_string(),
                reason: format!("name exceeds {} bytes", MAX_NAME_LENGTH),
            }
            .into());
        }

        let pattern = NAME_PATTERN
            .as_ref()
            .map_err(|e| ValidationError::InvalidIdentifier {
                value: raw.to_string(),
                reason: e.to_string(),
            })?;

        if !pattern.is_match(&normalized) {
            return Err(ValidationError::InvalidIdentifier {
                value: raw.to_string(),
                reason: "only lowercase letters, digits and underscores are allowed".to_string(),
            }
            .into());
        }

        Ok(Self(normalized))
    }

    /// Returns the canonical name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the name and returns the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TenantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TenantName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for TenantName {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TenantName {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TenantName> for String {
    fn from(name: TenantName) -> Self {
        name.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_folds_case_and_trims() {
        assert_eq!(TenantName::parse("Acme").unwrap().as_str(), "acme");
        assert_eq!(TenantName::parse(" BRANCH_1\t").unwrap().as_str(), "branch_1");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(TenantName::parse("").is_err());
        assert!(TenantName::parse("   ").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_characters() {
        for raw in ["acme-corp", "acme corp", "acme;drop", "a\"b", "a'b", "acme.west"] {
            let err = TenantName::parse(raw).unwrap_err();
            assert!(
                matches!(
                    err,
                    StorageError::Validation(ValidationError::InvalidIdentifier { .. })
                ),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_length_limit() {
        let max = "a".repeat(MAX_NAME_LENGTH);
        assert!(TenantName::parse(&max).is_ok());

        let too_long = "a".repeat(MAX_NAME_LENGTH + 1);
        assert!(TenantName::parse(&too_long).is_err());
    }

    #[test]
    fn test_serde_round_trip_validates() {
        let name: TenantName = serde_json::from_str("\"Acme\"").unwrap();
        assert_eq!(name.as_str(), "acme");
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"acme\"");

        let bad: Result<TenantName, _> = serde_json::from_str("\"bad name\"");
        assert!(bad.is_err());
    }
}
