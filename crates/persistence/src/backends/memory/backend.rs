//! In-memory backend implementation.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::OwnedMutexGuard;

use crate::core::{
    BackendKind, MemberRecord, PartitionBackend, PartitionCatalog, PartitionEdge, PartitionInfo,
    StepKind, StructuralStep, StructuralTransaction,
};
use crate::error::{BackendError, StorageError, StorageResult, TransactionError};
use crate::tenant::{PartitionLayout, TenantName};

use super::state::CatalogState;

/// In-process partition engine.
///
/// Structural transactions work on a private copy of the catalog and publish
/// it on commit. Writers are serialized by an engine-level lock, the way
/// PostgreSQL serializes DDL on the same relations; readers never block.
#[derive(Clone)]
pub struct MemoryBackend {
    layout: PartitionLayout,
    state: Arc<RwLock<CatalogState>>,
    writer: Arc<tokio::sync::Mutex<()>>,
    failure: Arc<Mutex<Option<StepKind>>>,
}

impl Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("layout", &self.layout)
            .field("injected_failure", &*self.failure.lock())
            .finish_non_exhaustive()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Creates an empty engine with the default layout.
    pub fn new() -> Self {
        Self::with_layout(PartitionLayout::default())
    }

    /// Creates an empty engine with a custom layout.
    pub fn with_layout(layout: PartitionLayout) -> Self {
        let state = CatalogState::new(&layout.root_table);
        Self {
            layout,
            state: Arc::new(RwLock::new(state)),
            writer: Arc::new(tokio::sync::Mutex::new(())),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Makes every later step of the given kind fail until cleared.
    pub fn fail_at(&self, kind: StepKind) {
        *self.failure.lock() = Some(kind);
    }

    /// Removes an injected failure.
    pub fn clear_failure(&self) {
        *self.failure.lock() = None;
    }

    /// Inserts a member through the root table.
    ///
    /// Waits for any open structural transaction to finish first.
    pub async fn insert_member(&self, member: MemberRecord) -> StorageResult<()> {
        let _writer = self.writer.lock().await;
        let mut state = self.state.write();
        let root = state.root().to_string();
        state.insert(&root, member)
    }

    /// Returns every member stored in a partition and its sub-partitions.
    pub fn members(&self, partition: &str) -> Vec<MemberRecord> {
        self.state.read().rows_under(partition)
    }

    /// Counts the members stored in a partition and its sub-partitions.
    pub fn member_count(&self, partition: &str) -> usize {
        self.members(partition).len()
    }

    /// Returns every member of the root table.
    pub fn all_members(&self) -> Vec<MemberRecord> {
        let state = self.state.read();
        state.rows_under(state.root())
    }

    fn edges(&self, parent: &str) -> Vec<PartitionEdge> {
        let parent_qualified = self.layout.qualify(parent);
        self.state
            .read()
            .children(parent)
            .into_iter()
            .map(|child| PartitionEdge {
                child: self.layout.qualify(&child),
                parent: parent_qualified.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl PartitionCatalog for MemoryBackend {
    async fn exists(&self, name: &TenantName) -> StorageResult<bool> {
        Ok(self.state.read().contains(name.as_str()))
    }

    async fn list_children(&self, parent: &TenantName) -> StorageResult<Vec<PartitionEdge>> {
        Ok(self.edges(parent.as_str()))
    }

    async fn list_roots(&self) -> StorageResult<Vec<String>> {
        let root = self.state.read().root().to_string();
        Ok(self.edges(&root).into_iter().map(|edge| edge.child).collect())
    }
}

#[async_trait]
impl PartitionBackend for MemoryBackend {
    type Transaction = MemoryTransaction;

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    fn layout(&self) -> &PartitionLayout {
        &self.layout
    }

    async fn begin(&self) -> StorageResult<MemoryTransaction> {
        let guard = Arc::clone(&self.writer).lock_owned().await;
        let working = self.state.read().clone();
        Ok(MemoryTransaction {
            guard: Some(guard),
            working,
            shared: Arc::clone(&self.state),
            failure: Arc::clone(&self.failure),
            active: true,
        })
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn initialize(&self) -> Result<(), BackendError> {
        let mut state = self.state.write();
        if !state.contains(&self.layout.root_table) {
            *state = CatalogState::new(&self.layout.root_table);
        }
        Ok(())
    }
}

/// A structural transaction on the in-memory engine.
pub struct MemoryTransaction {
    guard: Option<OwnedMutexGuard<()>>,
    working: CatalogState,
    shared: Arc<RwLock<CatalogState>>,
    failure: Arc<Mutex<Option<StepKind>>>,
    active: bool,
}

impl Debug for MemoryTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransaction")
            .field("active", &self.active)
            .finish()
    }
}

impl MemoryTransaction {
    fn ensure_active(&self) -> StorageResult<()> {
        if self.active {
            Ok(())
        } else {
            Err(StorageError::Transaction(
                TransactionError::InvalidTransaction,
            ))
        }
    }
}

#[async_trait]
impl StructuralTransaction for MemoryTransaction {
    async fn lookup(&mut self, name: &TenantName) -> StorageResult<Option<PartitionInfo>> {
        self.ensure_active()?;
        Ok(self.working.info(name.as_str()))
    }

    async fn children(&mut self, parent: &TenantName) -> StorageResult<Vec<String>> {
        self.ensure_active()?;
        Ok(self.working.children(parent.as_str()))
    }

    async fn apply(&mut self, step: &StructuralStep) -> StorageResult<u64> {
        self.ensure_active()?;
        if *self.failure.lock() == Some(step.kind()) {
            return Err(StorageError::Backend(BackendError::QueryError {
                message: format!("injected failure at {}", step.kind()),
            }));
        }
        self.working.apply(step)
    }

    async fn commit(mut self: Box<Self>) -> StorageResult<()> {
        self.ensure_active()?;
        let working = std::mem::replace(&mut self.working, CatalogState::new(""));
        *self.shared.write() = working;
        self.active = false;
        self.guard.take();
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> StorageResult<()> {
        self.ensure_active()?;
        self.active = false;
        self.guard.take();
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> TenantName {
        TenantName::parse(s).unwrap()
    }

    #[test]
    fn test_uncommitted_changes_are_private() {
        tokio_test::block_on(async {
            let backend = MemoryBackend::new();
            let mut tx = backend.begin().await.unwrap();
            tx.apply(&StructuralStep::CreateOrganization {
                name: name("acme"),
                bound: name("acme"),
            })
            .await
            .unwrap();

            assert!(tx.lookup(&name("acme")).await.unwrap().is_some());
            assert!(!backend.exists(&name("acme")).await.unwrap());

            Box::new(tx).commit().await.unwrap();
            assert!(backend.exists(&name("acme")).await.unwrap());
        });
    }

    #[test]
    fn test_insert_waits_for_open_transaction() {
        tokio_test::block_on(async {
            let backend = MemoryBackend::new();
            let mut tx = backend.begin().await.unwrap();
            tx.apply(&StructuralStep::CreateOrganization {
                name: name("acme"),
                bound: name("acme"),
            })
            .await
            .unwrap();
            tx.apply(&StructuralStep::CreateSubunit {
                parent: name("acme"),
                name: name("north"),
                bound: name("north"),
            })
            .await
            .unwrap();
            Box::new(tx).commit().await.unwrap();

            let mut tx = backend.begin().await.unwrap();
            tx.apply(&StructuralStep::CreateOrganization {
                name: name("globex"),
                bound: name("globex"),
            })
            .await
            .unwrap();

            let (inserted, committed) = tokio::join!(
                backend.insert_member(MemberRecord::new("acme", "north", "alice")),
                Box::new(tx).commit(),
            );
            inserted.unwrap();
            committed.unwrap();

            assert_eq!(backend.member_count("north"), 1);
            assert!(backend.exists(&name("globex")).await.unwrap());
        });
    }

    #[test]
    fn test_rollback_discards_changes() {
        tokio_test::block_on(async {
            let backend = MemoryBackend::new();
            let mut tx = backend.begin().await.unwrap();
            tx.apply(&StructuralStep::CreateOrganization {
                name: name("acme"),
                bound: name("acme"),
            })
            .await
            .unwrap();
            assert!(tx.is_active());

            Box::new(tx).rollback().await.unwrap();
            assert!(!backend.exists(&name("acme")).await.unwrap());
            assert!(backend.list_roots().await.unwrap().is_empty());
        });
    }

    #[test]
    fn test_injected_failure() {
        tokio_test::block_on(async {
            let backend = MemoryBackend::new();
            backend.fail_at(StepKind::CreateOrganization);

            let mut tx = backend.begin().await.unwrap();
            let err = tx
                .apply(&StructuralStep::CreateOrganization {
                    name: name("acme"),
                    bound: name("acme"),
                })
                .await
                .unwrap_err();
            assert!(err.to_string().contains("injected failure"));
            Box::new(tx).rollback().await.unwrap();

            backend.clear_failure();
            let mut tx = backend.begin().await.unwrap();
            tx.apply(&StructuralStep::CreateOrganization {
                name: name("acme"),
                bound: name("acme"),
            })
            .await
            .unwrap();
            Box::new(tx).commit().await.unwrap();
        });
    }

    #[test]
    fn test_catalog_names_are_qualified() {
        tokio_test::block_on(async {
            let backend = MemoryBackend::new();
            let mut tx = backend.begin().await.unwrap();
            tx.apply(&StructuralStep::CreateOrganization {
                name: name("acme"),
                bound: name("acme"),
            })
            .await
            .unwrap();
            tx.apply(&StructuralStep::CreateSubunit {
                parent: name("acme"),
                name: name("north"),
                bound: name("north"),
            })
            .await
            .unwrap();
            Box::new(tx).commit().await.unwrap();

            assert_eq!(
                backend.list_roots().await.unwrap(),
                vec!["company.acme".to_string()]
            );
            let edges = backend.list_children(&name("acme")).await.unwrap();
            assert_eq!(
                edges,
                vec![PartitionEdge {
                    child: "company.north".to_string(),
                    parent: "company.acme".to_string(),
                }]
            );
            assert!(
                backend
                    .list_children(&name("north"))
                    .await
                    .unwrap()
                    .is_empty()
            );
        });
    }
}
