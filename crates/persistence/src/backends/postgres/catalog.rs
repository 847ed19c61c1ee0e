//! Catalog queries for the PostgreSQL backend.

use async_trait::async_trait;

use crate::core::{PartitionCatalog, PartitionEdge};
use crate::error::{CatalogError, StorageError, StorageResult};
use crate::tenant::TenantName;

use super::PostgresBackend;

/// Tables and views in the tenant schema with the given name.
pub(crate) const EXISTS_SQL: &str = "SELECT EXISTS (
    SELECT 1 FROM information_schema.tables
    WHERE table_schema::text = $1 AND table_name::text = $2
)";

/// Direct children of a relation, from the inheritance metadata.
///
/// Columns: qualified child, qualified parent, child relname.
pub(crate) const CHILDREN_SQL: &str = "SELECT
    cn.nspname::text || '.' || c.relname::text,
    pn.nspname::text || '.' || p.relname::text,
    c.relname::text
FROM pg_inherits i
JOIN pg_class c ON c.oid = i.inhrelid
JOIN pg_namespace cn ON cn.oid = c.relnamespace
JOIN pg_class p ON p.oid = i.inhparent
JOIN pg_namespace pn ON pn.oid = p.relnamespace
WHERE pn.nspname::text = $1 AND p.relname::text = $2
ORDER BY c.relname";

/// One table in the tenant schema with its parent, if attached.
///
/// Columns: relname, parent relname, whether it is partitioned.
pub(crate) const LOOKUP_SQL: &str = "SELECT
    c.relname::text,
    p.relname::text,
    c.relkind = 'p'
FROM pg_class c
JOIN pg_namespace n ON n.oid = c.relnamespace
LEFT JOIN pg_inherits i ON i.inhrelid = c.oid
LEFT JOIN pg_class p ON p.oid = i.inhparent
WHERE n.nspname::text = $1 AND c.relname::text = $2 AND c.relkind IN ('r', 'p')";

fn catalog_error(err: impl std::error::Error + Send + Sync + 'static) -> StorageError {
    StorageError::Catalog(CatalogError::Unavailable {
        message: err.to_string(),
        source: Some(Box::new(err)),
    })
}

impl PostgresBackend {
    async fn children_of(&self, parent: &str) -> StorageResult<Vec<PartitionEdge>> {
        let client = self
            .get_client()
            .await
            .map_err(StorageError::into_catalog_unavailable)?;
        let rows = client
            .query(CHILDREN_SQL, &[&self.config().layout.schema, &parent])
            .await
            .map_err(catalog_error)?;

        Ok(rows
            .iter()
            .map(|row| PartitionEdge {
                child: row.get(0),
                parent: row.get(1),
            })
            .collect())
    }
}

#[async_trait]
impl PartitionCatalog for PostgresBackend {
    async fn exists(&self, name: &TenantName) -> StorageResult<bool> {
        let client = self
            .get_client()
            .await
            .map_err(StorageError::into_catalog_unavailable)?;
        let row = client
            .query_one(EXISTS_SQL, &[&self.config().layout.schema, &name.as_str()])
            .await
            .map_err(catalog_error)?;
        Ok(row.get(0))
    }

    async fn list_children(&self, parent: &TenantName) -> StorageResult<Vec<PartitionEdge>> {
        self.children_of(parent.as_str()).await
    }

    async fn list_roots(&self) -> StorageResult<Vec<String>> {
        let root = self.config().layout.root_table.clone();
        Ok(self
            .children_of(&root)
            .await?
            .into_iter()
            .map(|edge| edge.child)
            .collect())
    }
}
