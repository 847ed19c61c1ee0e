//! Structural transactions for the PostgreSQL backend.

use async_trait::async_trait;
use deadpool_postgres::Client;
use tokio_postgres::types::ToSql;

use crate::core::{PartitionInfo, StructuralStep, StructuralTransaction};
use crate::error::{BackendError, StorageError, StorageResult, TransactionError};
use crate::tenant::{PartitionLayout, TenantName};

use super::catalog::{CHILDREN_SQL, LOOKUP_SQL};
use super::sql;

fn query_error(err: tokio_postgres::Error) -> StorageError {
    let message = match err.as_db_error() {
        Some(db) => db.message().to_string(),
        None => err.to_string(),
    };
    StorageError::Backend(BackendError::QueryError { message })
}

/// A PostgreSQL structural transaction.
///
/// Wraps a pooled client that has an active transaction. DDL is transactional
/// in PostgreSQL, so every step of a structural operation commits or rolls
/// back together.
pub struct PostgresTransaction {
    /// Option so we can take it during commit/rollback.
    client: Option<Client>,
    active: bool,
    layout: PartitionLayout,
}

impl std::fmt::Debug for PostgresTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresTransaction")
            .field("active", &self.active)
            .field("schema", &self.layout.schema)
            .finish()
    }
}

impl PostgresTransaction {
    pub(crate) async fn new(client: Client, layout: PartitionLayout) -> StorageResult<Self> {
        client.execute("BEGIN", &[]).await.map_err(query_error)?;

        Ok(Self {
            client: Some(client),
            active: true,
            layout,
        })
    }

    fn client(&self) -> StorageResult<&Client> {
        if !self.active {
            return Err(StorageError::Transaction(
                TransactionError::InvalidTransaction,
            ));
        }
        self.client
            .as_ref()
            .ok_or_else(|| StorageError::Transaction(TransactionError::InvalidTransaction))
    }

    async fn finish(&mut self, statement: &str) -> StorageResult<()> {
        let result = match self.client() {
            Ok(client) => client.execute(statement, &[]).await.map_err(query_error),
            Err(e) => return Err(e),
        };
        self.active = false;
        if let Some(client) = self.client.take()
            && result.is_err()
        {
            // The connection state is unknown; keep it out of the pool.
            drop(Client::take(client));
        }
        result.map(|_| ())
    }
}

#[async_trait]
impl StructuralTransaction for PostgresTransaction {
    async fn lookup(&mut self, name: &TenantName) -> StorageResult<Option<PartitionInfo>> {
        let client = self.client()?;
        let row = client
            .query_opt(LOOKUP_SQL, &[&self.layout.schema, &name.as_str()])
            .await
            .map_err(query_error)?;

        Ok(row.map(|row| PartitionInfo {
            name: row.get(0),
            parent: row.get(1),
            partitioned: row.get(2),
        }))
    }

    async fn children(&mut self, parent: &TenantName) -> StorageResult<Vec<String>> {
        let client = self.client()?;
        let rows = client
            .query(CHILDREN_SQL, &[&self.layout.schema, &parent.as_str()])
            .await
            .map_err(query_error)?;

        Ok(rows.iter().map(|row| row.get::<_, String>(2)).collect())
    }

    async fn apply(&mut self, step: &StructuralStep) -> StorageResult<u64> {
        let statement = sql::render(step, &self.layout)?;
        let client = self.client()?;
        let params: Vec<&(dyn ToSql + Sync)> = statement
            .params
            .iter()
            .map(|value| value as &(dyn ToSql + Sync))
            .collect();

        tracing::trace!(sql = %statement.sql, "executing structural statement");
        client
            .execute(statement.sql.as_str(), &params)
            .await
            .map_err(query_error)
    }

    async fn commit(mut self: Box<Self>) -> StorageResult<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(mut self: Box<Self>) -> StorageResult<()> {
        self.finish("ROLLBACK").await
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        // Drop cannot await a ROLLBACK. Detaching the connection from the pool
        // closes it, and the server aborts the open transaction.
        if self.active {
            tracing::warn!("PostgreSQL structural transaction dropped without commit or rollback");
            if let Some(client) = self.client.take() {
                drop(Client::take(client));
            }
        }
    }
}
