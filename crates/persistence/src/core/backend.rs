//! Backend abstraction for partition engines.
//!
//! This module defines [`PartitionBackend`], implemented once per storage
//! engine, and [`StructuralTransaction`], the scoped unit of work every
//! structural operation runs in.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::{BackendError, StorageResult};
use crate::tenant::{PartitionLayout, TenantName};

use super::catalog::PartitionCatalog;
use super::step::StructuralStep;

/// Identifies the type of partition backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// In-process engine.
    Memory,
    /// PostgreSQL declarative partitioning.
    Postgres,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::Postgres => write!(f, "postgres"),
        }
    }
}

/// Catalog entry for one relation, as seen inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    /// Unqualified relation name.
    pub name: String,
    /// Unqualified name of the parent this relation is attached to.
    pub parent: Option<String>,
    /// Whether the relation is itself partitioned.
    pub partitioned: bool,
}

impl PartitionInfo {
    /// Returns true when this relation is attached directly to `parent`.
    pub fn is_child_of(&self, parent: &str) -> bool {
        self.parent.as_deref() == Some(parent)
    }
}

/// A partition engine the lifecycle engine can drive.
///
/// Implementations also provide the read-only [`PartitionCatalog`] used outside
/// of transactions.
#[async_trait]
pub trait PartitionBackend: PartitionCatalog + Debug {
    /// The transaction type returned by [`begin`](Self::begin).
    type Transaction: StructuralTransaction;

    /// Returns the kind of backend.
    fn kind(&self) -> BackendKind;

    /// Returns a human-readable name for this backend.
    fn name(&self) -> &'static str;

    /// Returns the table layout this backend manages.
    fn layout(&self) -> &PartitionLayout;

    /// Begins a structural transaction on a dedicated connection.
    async fn begin(&self) -> StorageResult<Self::Transaction>;

    /// Checks if the backend is healthy and accepting connections.
    async fn health_check(&self) -> Result<(), BackendError>;

    /// Creates the tenant schema and root table if they are missing.
    async fn initialize(&self) -> Result<(), BackendError>;
}

/// An open structural transaction.
///
/// Reads see the transaction's own uncommitted changes. Dropping an active
/// transaction without calling [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) discards its changes.
#[async_trait]
pub trait StructuralTransaction: Send {
    /// Looks up a relation in the tenant schema.
    async fn lookup(&mut self, name: &TenantName) -> StorageResult<Option<PartitionInfo>>;

    /// Returns the unqualified names of a relation's direct children.
    async fn children(&mut self, parent: &TenantName) -> StorageResult<Vec<String>>;

    /// Applies one step and returns the number of member rows it touched.
    async fn apply(&mut self, step: &StructuralStep) -> StorageResult<u64>;

    /// Commits the transaction.
    async fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Rolls back the transaction.
    async fn rollback(self: Box<Self>) -> StorageResult<()>;

    /// Returns whether this transaction is still active.
    fn is_active(&self) -> bool;
}
