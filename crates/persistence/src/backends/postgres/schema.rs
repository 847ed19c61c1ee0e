//! PostgreSQL schema bootstrap.

use crate::error::{BackendError, StorageError, StorageResult};
use crate::tenant::PartitionLayout;

use super::sql::{qualified, quote_ident};

/// Creates the tenant schema and the root table if they are missing.
///
/// Tenant partitions are never created here; they belong to the lifecycle
/// engine.
pub async fn initialize_schema(
    client: &deadpool_postgres::Client,
    layout: &PartitionLayout,
) -> StorageResult<()> {
    client
        .batch_execute(&create_schema_sql(layout))
        .await
        .map_err(|e| pg_error(format!("Failed to create schema {}: {}", layout.schema, e)))?;

    client
        .batch_execute(&create_root_table_sql(layout))
        .await
        .map_err(|e| {
            pg_error(format!(
                "Failed to create root table {}: {}",
                layout.root_qualified(),
                e
            ))
        })?;

    tracing::info!(
        schema = %layout.schema,
        root_table = %layout.root_table,
        "tenant schema initialized"
    );
    Ok(())
}

pub(crate) fn create_schema_sql(layout: &PartitionLayout) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(&layout.schema))
}

pub(crate) fn create_root_table_sql(layout: &PartitionLayout) -> String {
    let organization = quote_ident(&layout.organization_column);
    let subunit = quote_ident(&layout.subunit_column);
    format!(
        "CREATE TABLE IF NOT EXISTS {root} (
            {organization} TEXT NOT NULL,
            {subunit} TEXT NOT NULL,
            id UUID NOT NULL DEFAULT gen_random_uuid(),
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            username TEXT NOT NULL,
            password TEXT NOT NULL DEFAULT '',
            create_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            update_at TIMESTAMPTZ,
            delete_at TIMESTAMPTZ,
            role TEXT NOT NULL DEFAULT 'member',
            PRIMARY KEY ({organization}, {subunit}, id),
            UNIQUE ({organization}, {subunit}, username)
        ) PARTITION BY LIST ({organization})",
        root = qualified(layout, &layout.root_table),
    )
}

fn pg_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::BootstrapError { message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_table_sql() {
        let sql = create_root_table_sql(&PartitionLayout::default());
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"company\".\"onesystem\""));
        assert!(sql.contains("PRIMARY KEY (\"company\", \"branch\", id)"));
        assert!(sql.contains("UNIQUE (\"company\", \"branch\", username)"));
        assert!(sql.ends_with("PARTITION BY LIST (\"company\")"));
    }

    #[test]
    fn test_schema_sql() {
        assert_eq!(
            create_schema_sql(&PartitionLayout::default()),
            "CREATE SCHEMA IF NOT EXISTS \"company\""
        );
    }
}
