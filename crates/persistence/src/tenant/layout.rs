//! Physical layout of the partitioned member table.

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult, ValidationError};

use super::TenantName;

/// Member columns other than the two identity columns, in table order.
pub const MEMBER_DATA_COLUMNS: [&str; 9] = [
    "id",
    "first_name",
    "last_name",
    "username",
    "password",
    "create_at",
    "update_at",
    "delete_at",
    "role",
];

/// Column that, together with the identity columns, identifies a member for upserts.
pub const CONFLICT_COLUMN: &str = "username";

/// Columns left untouched when an upsert overwrites an existing member.
const UPSERT_PRESERVED_COLUMNS: [&str; 2] = ["id", CONFLICT_COLUMN];

/// Names of the tenant schema, the root table and its identity columns.
///
/// # Example
///
/// ```
/// use tenantry_persistence::tenant::PartitionLayout;
///
/// let layout = PartitionLayout::default();
/// assert_eq!(layout.root_qualified(), "company.onesystem");
/// assert_eq!(layout.display_name("company.acme"), "acme");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionLayout {
    /// Schema holding the root table and every tenant partition.
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Root table, list-partitioned by the organization column.
    #[serde(default = "default_root_table")]
    pub root_table: String,

    /// Organization identity column.
    #[serde(default = "default_organization_column")]
    pub organization_column: String,

    /// Sub-unit identity column.
    #[serde(default = "default_subunit_column")]
    pub subunit_column: String,
}

fn default_schema() -> String {
    "company".to_string()
}

fn default_root_table() -> String {
    "onesystem".to_string()
}

fn default_organization_column() -> String {
    "company".to_string()
}

fn default_subunit_column() -> String {
    "branch".to_string()
}

impl Default for PartitionLayout {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            root_table: default_root_table(),
            organization_column: default_organization_column(),
            subunit_column: default_subunit_column(),
        }
    }
}

impl PartitionLayout {
    /// Checks every identifier against the tenant name grammar.
    pub fn validate(&self) -> StorageResult<()> {
        let fields = [
            ("schema", &self.schema),
            ("root_table", &self.root_table),
            ("organization_column", &self.organization_column),
            ("subunit_column", &self.subunit_column),
        ];

        for (field, value) in fields {
            let parsed = TenantName::parse(value)?;
            if parsed.as_str() != value.as_str() {
                return Err(ValidationError::InvalidIdentifier {
                    value: value.clone(),
                    reason: format!("{} must already be in canonical form", field),
                }
                .into());
            }
        }

        if self.organization_column == self.subunit_column {
            return Err(StorageError::invalid_request(
                "organization and sub-unit columns must differ",
            ));
        }

        let reserved = [self.organization_column.as_str(), self.subunit_column.as_str()];
        if MEMBER_DATA_COLUMNS
            .iter()
            .any(|column| reserved.contains(column))
        {
            return Err(StorageError::invalid_request(
                "identity columns must not shadow member data columns",
            ));
        }

        Ok(())
    }

    /// Returns the catalog-qualified name of a relation in the tenant schema.
    pub fn qualify(&self, relname: &str) -> String {
        format!("{}.{}", self.schema, relname)
    }

    /// Returns the catalog-qualified name of the root table.
    pub fn root_qualified(&self) -> String {
        self.qualify(&self.root_table)
    }

    /// Strips the schema prefix from a catalog-qualified name exactly once.
    ///
    /// A name without the prefix yields an empty display name.
    pub fn display_name(&self, qualified: &str) -> String {
        qualified
            .strip_prefix(&format!("{}.", self.schema))
            .map(str::to_string)
            .unwrap_or_default()
    }

    /// Returns every member column in table order.
    pub fn member_columns(&self) -> Vec<&str> {
        let mut columns = Vec::with_capacity(MEMBER_DATA_COLUMNS.len() + 2);
        columns.push(self.organization_column.as_str());
        columns.push(self.subunit_column.as_str());
        columns.extend(MEMBER_DATA_COLUMNS);
        columns
    }

    /// Returns the columns an upsert overwrites on conflict.
    pub fn upsert_columns(&self) -> Vec<&'static str> {
        MEMBER_DATA_COLUMNS
            .into_iter()
            .filter(|column| !UPSERT_PRESERVED_COLUMNS.contains(column))
            .collect()
    }

    /// Returns the conflict key used for member upserts.
    pub fn conflict_key(&self) -> [&str; 3] {
        [
            self.organization_column.as_str(),
            self.subunit_column.as_str(),
            CONFLICT_COLUMN,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let layout = PartitionLayout::default();
        assert_eq!(layout.schema, "company");
        assert_eq!(layout.root_table, "onesystem");
        assert_eq!(layout.organization_column, "company");
        assert_eq!(layout.subunit_column, "branch");
        assert!(layout.validate().is_ok());
    }

    #[test]
    fn test_display_name_strips_prefix_once() {
        let layout = PartitionLayout::default();
        assert_eq!(layout.display_name("company.acme"), "acme");
        assert_eq!(layout.display_name("company.company.acme"), "company.acme");
        assert_eq!(layout.display_name("public.acme"), "");
        assert_eq!(layout.display_name("acme"), "");
    }

    #[test]
    fn test_validate_rejects_non_canonical() {
        let layout = PartitionLayout {
            schema: "Company".to_string(),
            ..Default::default()
        };
        assert!(layout.validate().is_err());

        let layout = PartitionLayout {
            root_table: "one-system".to_string(),
            ..Default::default()
        };
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_clashing_columns() {
        let layout = PartitionLayout {
            subunit_column: "company".to_string(),
            ..Default::default()
        };
        assert!(layout.validate().is_err());

        let layout = PartitionLayout {
            organization_column: "username".to_string(),
            ..Default::default()
        };
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_member_and_upsert_columns() {
        let layout = PartitionLayout::default();
        let columns = layout.member_columns();
        assert_eq!(columns.len(), 11);
        assert_eq!(&columns[..3], &["company", "branch", "id"]);

        let upsert = layout.upsert_columns();
        assert!(!upsert.contains(&"id"));
        assert!(!upsert.contains(&"username"));
        assert!(upsert.contains(&"password"));
        assert_eq!(layout.conflict_key(), ["company", "branch", "username"]);
    }

    #[test]
    fn test_layout_deserialize_defaults() {
        let layout: PartitionLayout = serde_json::from_str(r#"{"schema": "tenants"}"#).unwrap();
        assert_eq!(layout.schema, "tenants");
        assert_eq!(layout.root_table, "onesystem");
        assert_eq!(layout.root_qualified(), "tenants.onesystem");
    }
}
