//! Success payloads returned by the directory.

use serde::Serialize;

/// Wraps a success payload as `{"data": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataEnvelope<T> {
    /// The payload.
    pub data: T,
}

impl<T> DataEnvelope<T> {
    /// Wraps a payload.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Canonical names of the tenant an operation created or touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantResponse {
    /// Organization display name.
    pub organization: String,
    /// Sub-unit display name, for sub-unit operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subunit: Option<String>,
}

impl TenantResponse {
    /// An organization-level response.
    pub fn organization(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            subunit: None,
        }
    }

    /// A sub-unit-level response.
    pub fn subunit(organization: impl Into<String>, subunit: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            subunit: Some(subunit.into()),
        }
    }
}

/// An organization with its sub-units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubunitListing {
    /// Organization display name.
    pub organization: String,
    /// Sub-unit display names.
    pub subunits: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_serialization() {
        let json = serde_json::to_value(DataEnvelope::new(TenantResponse::organization("acme")))
            .unwrap();
        assert_eq!(json, serde_json::json!({"data": {"organization": "acme"}}));
    }

    #[test]
    fn test_subunit_response_serialization() {
        let json = serde_json::to_value(TenantResponse::subunit("acme", "north")).unwrap();
        assert_eq!(json["subunit"], "north");
    }
}
