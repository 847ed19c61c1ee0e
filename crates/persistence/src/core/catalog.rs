//! Partition catalog access.
//!
//! The storage engine's own catalog is the only source of truth for which
//! organizations and sub-units exist. Nothing here caches or mutates it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::StorageResult;
use crate::tenant::{PartitionLayout, TenantName};

/// A parent/child link from the partition inheritance metadata.
///
/// Both names are catalog-qualified (`<schema>.<relname>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionEdge {
    /// The child partition.
    pub child: String,
    /// Its direct parent.
    pub parent: String,
}

/// Read-only view of the partition catalog.
///
/// Every method fails with a `CatalogUnavailable` error when the catalog
/// query cannot run.
#[async_trait]
pub trait PartitionCatalog: Send + Sync {
    /// Returns whether a relation with this name exists in the tenant schema.
    async fn exists(&self, name: &TenantName) -> StorageResult<bool>;

    /// Returns the direct children of a partition.
    ///
    /// Empty when the partition has no children or does not exist.
    async fn list_children(&self, parent: &TenantName) -> StorageResult<Vec<PartitionEdge>>;

    /// Returns every organization partition, catalog-qualified.
    async fn list_roots(&self) -> StorageResult<Vec<String>>;
}

/// Which sub-units exist under which organizations, at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopologySnapshot {
    /// Organization display name to its sub-unit display names.
    pub organizations: BTreeMap<String, Vec<String>>,
}

impl TopologySnapshot {
    /// Reads the current topology from a catalog.
    ///
    /// Each organization is read with a separate query, so the snapshot is not
    /// atomic with respect to concurrent structural changes.
    pub async fn load<C>(catalog: &C, layout: &PartitionLayout) -> StorageResult<Self>
    where
        C: PartitionCatalog + ?Sized,
    {
        let mut organizations = BTreeMap::new();

        for qualified in catalog.list_roots().await? {
            let display = layout.display_name(&qualified);
            // An organization dropped since list_roots simply has no children.
            let mut subunits = match TenantName::parse(&display) {
                Ok(name) => catalog
                    .list_children(&name)
                    .await?
                    .into_iter()
                    .map(|edge| layout.display_name(&edge.child))
                    .collect::<Vec<_>>(),
                Err(_) => Vec::new(),
            };
            subunits.sort();
            organizations.insert(display, subunits);
        }

        Ok(Self { organizations })
    }

    /// Number of organizations.
    pub fn organization_count(&self) -> usize {
        self.organizations.len()
    }

    /// Number of sub-units across all organizations.
    pub fn subunit_count(&self) -> usize {
        self.organizations.values().map(Vec::len).sum()
    }

    /// Returns the sub-units of an organization, if it is present.
    pub fn subunits_of(&self, organization: &str) -> Option<&[String]> {
        self.organizations.get(organization).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCatalog {
        edges: Vec<PartitionEdge>,
    }

    #[async_trait]
    impl PartitionCatalog for FixedCatalog {
        async fn exists(&self, name: &TenantName) -> StorageResult<bool> {
            let qualified = format!("company.{}", name);
            Ok(self
                .edges
                .iter()
                .any(|e| e.child == qualified || e.parent == qualified))
        }

        async fn list_children(&self, parent: &TenantName) -> StorageResult<Vec<PartitionEdge>> {
            let qualified = format!("company.{}", parent);
            Ok(self
                .edges
                .iter()
                .filter(|e| e.parent == qualified)
                .cloned()
                .collect())
        }

        async fn list_roots(&self) -> StorageResult<Vec<String>> {
            Ok(self
                .edges
                .iter()
                .filter(|e| e.parent == "company.onesystem")
                .map(|e| e.child.clone())
                .collect())
        }
    }

    fn edge(parent: &str, child: &str) -> PartitionEdge {
        PartitionEdge {
            child: format!("company.{child}"),
            parent: format!("company.{parent}"),
        }
    }

    #[tokio::test]
    async fn test_snapshot_groups_and_sorts_subunits() {
        let catalog = FixedCatalog {
            edges: vec![
                edge("onesystem", "globex"),
                edge("onesystem", "acme"),
                edge("acme", "south"),
                edge("acme", "north"),
            ],
        };

        let snapshot = TopologySnapshot::load(&catalog, &PartitionLayout::default())
            .await
            .unwrap();

        assert_eq!(snapshot.organization_count(), 2);
        assert_eq!(snapshot.subunit_count(), 2);
        assert_eq!(
            snapshot.subunits_of("acme"),
            Some(&["north".to_string(), "south".to_string()][..])
        );
        assert_eq!(snapshot.subunits_of("globex"), Some(&[][..]));
        assert_eq!(snapshot.subunits_of("initech"), None);
    }
}
