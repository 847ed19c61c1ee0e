//! Structured requests accepted by the directory.
//!
//! Every field defaults to empty when absent, so a missing field is reported
//! as an invalid request rather than a deserialization failure.

use serde::{Deserialize, Serialize};

/// Addresses one organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizationRequest {
    /// Organization name.
    pub organization: String,
}

/// Addresses one sub-unit of an organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubunitRequest {
    /// Owning organization.
    pub organization: String,
    /// Sub-unit name.
    pub subunit: String,
}

/// Renames an organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameOrganizationRequest {
    /// Current name.
    pub old_organization: String,
    /// New name.
    pub new_organization: String,
}

/// Renames a sub-unit within its organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameSubunitRequest {
    /// Owning organization.
    pub organization: String,
    /// Current name.
    pub old_subunit: String,
    /// New name.
    pub new_subunit: String,
}

/// Moves a sub-unit's members under a new organization and sub-unit.
///
/// `label` is only read when the sub-unit becomes a standalone organization;
/// it is the identity value stored on the moved members.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReparentRequest {
    /// Source organization.
    pub organization: String,
    /// Source sub-unit.
    pub subunit: String,
    /// Destination organization, created by the move.
    pub new_organization: String,
    /// Destination sub-unit, created by the move.
    pub new_subunit: String,
    /// Sub-unit identity for the moved members.
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default_to_empty() {
        let request: ReparentRequest =
            serde_json::from_str(r#"{"organization": "acme", "subunit": "north"}"#).unwrap();
        assert_eq!(request.organization, "acme");
        assert!(request.new_organization.is_empty());
        assert!(request.label.is_empty());
    }
}
