//! Tenant lifecycle engine.
//!
//! [`LifecycleEngine`] creates, deletes, renames and re-parents organization
//! and sub-unit partitions. Every operation runs in one
//! [`StructuralTransaction`]:
//!
//! 1. begin on a dedicated connection
//! 2. check preconditions against the transaction's view of the catalog
//! 3. apply the operation's steps in order, each tagged with a label
//! 4. commit, or roll back on the first failure
//!
//! A failed operation leaves the topology exactly as it was. Step failures are
//! reported as [`TransactionError::StepFailed`] with the 1-based step index and
//! label; precondition failures keep their own error kind.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use tenantry_persistence::backends::memory::MemoryBackend;
//! use tenantry_persistence::core::PartitionCatalog;
//! use tenantry_persistence::lifecycle::LifecycleEngine;
//! use tenantry_persistence::tenant::TenantName;
//!
//! # tokio_test::block_on(async {
//! let backend = Arc::new(MemoryBackend::new());
//! let engine = LifecycleEngine::new(backend.clone());
//!
//! let acme = TenantName::parse("Acme").unwrap();
//! engine.create_organization(&acme).await.unwrap();
//! assert!(backend.exists(&acme).await.unwrap());
//! # });
//! ```

mod plan;
mod state;

use std::sync::Arc;

use tracing::warn;

use crate::core::{PartitionBackend, PartitionInfo, PlannedStep, StructuralTransaction};
use crate::error::{PartitionKind, StorageError, StorageResult, TenantError, TransactionError};
use crate::tenant::TenantName;

pub use state::{OperationPhase, StepReport, StructuralOperation, StructuralReceipt};

use plan::Reparent;
use state::OperationTrace;

/// Drives structural operations against a [`PartitionBackend`].
#[derive(Debug)]
pub struct LifecycleEngine<B: PartitionBackend> {
    backend: Arc<B>,
}

impl<B: PartitionBackend> Clone for LifecycleEngine<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: PartitionBackend> LifecycleEngine<B> {
    /// Creates an engine over a shared backend.
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Returns the backend.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Creates an organization partition, itself partitioned by sub-unit.
    pub async fn create_organization(&self, name: &TenantName) -> StorageResult<StructuralReceipt> {
        let (mut tx, trace) = self
            .start(StructuralOperation::CreateOrganization, name.as_str())
            .await?;

        let plan = match require_absent(&mut tx, name).await {
            Ok(()) => Ok(plan::create_organization(name)),
            Err(e) => Err(e),
        };

        self.finish(tx, trace, plan).await
    }

    /// Creates a sub-unit partition under an existing organization.
    pub async fn create_subunit(
        &self,
        organization: &TenantName,
        subunit: &TenantName,
    ) -> StorageResult<StructuralReceipt> {
        let target = format!("{}/{}", organization, subunit);
        let (mut tx, trace) = self
            .start(StructuralOperation::CreateSubunit, target)
            .await?;

        let plan: StorageResult<Vec<PlannedStep>> = async {
            if self
                .lookup_organization(&mut tx, organization)
                .await?
                .is_none()
            {
                return Err(TenantError::ParentNotFound {
                    organization: organization.to_string(),
                }
                .into());
            }
            require_absent(&mut tx, subunit).await?;
            Ok(plan::create_subunit(organization, subunit))
        }
        .await;

        self.finish(tx, trace, plan).await
    }

    /// Drops an organization with all of its sub-units and member records.
    ///
    /// There is no emptiness check.
    pub async fn delete_organization(&self, name: &TenantName) -> StorageResult<StructuralReceipt> {
        let (mut tx, trace) = self
            .start(StructuralOperation::DeleteOrganization, name.as_str())
            .await?;

        let plan = match self.require_organization(&mut tx, name).await {
            Ok(_) => {
                warn!(
                    partition = %name,
                    "dropping organization partition with all sub-units and member records"
                );
                Ok(plan::delete_organization(name))
            }
            Err(e) => Err(e),
        };

        self.finish(tx, trace, plan).await
    }

    /// Drops a sub-unit with all of its member records.
    ///
    /// There is no emptiness check.
    pub async fn delete_subunit(
        &self,
        organization: &TenantName,
        subunit: &TenantName,
    ) -> StorageResult<StructuralReceipt> {
        let target = format!("{}/{}", organization, subunit);
        let (mut tx, trace) = self
            .start(StructuralOperation::DeleteSubunit, target)
            .await?;

        let plan: StorageResult<Vec<PlannedStep>> = async {
            self.require_organization(&mut tx, organization).await?;
            self.require_subunit(&mut tx, organization, subunit).await?;
            warn!(
                partition = %subunit,
                organization = %organization,
                "dropping sub-unit partition with all member records"
            );
            Ok(plan::delete_subunit(subunit))
        }
        .await;

        self.finish(tx, trace, plan).await
    }

    /// Renames an organization and rewrites the organization column of its rows.
    pub async fn rename_organization(
        &self,
        old: &TenantName,
        new: &TenantName,
    ) -> StorageResult<StructuralReceipt> {
        let target = format!("{} -> {}", old, new);
        let (mut tx, trace) = self
            .start(StructuralOperation::RenameOrganization, target)
            .await?;

        let plan: StorageResult<Vec<PlannedStep>> = async {
            self.require_organization(&mut tx, old).await?;
            require_absent(&mut tx, new).await?;
            Ok(plan::rename_organization(old, new))
        }
        .await;

        self.finish(tx, trace, plan).await
    }

    /// Renames a sub-unit and rewrites the sub-unit column of its rows.
    pub async fn rename_subunit(
        &self,
        organization: &TenantName,
        old: &TenantName,
        new: &TenantName,
    ) -> StorageResult<StructuralReceipt> {
        let target = format!("{}/{} -> {}", organization, old, new);
        let (mut tx, trace) = self
            .start(StructuralOperation::RenameSubunit, target)
            .await?;

        let plan: StorageResult<Vec<PlannedStep>> = async {
            self.require_organization(&mut tx, organization).await?;
            self.require_subunit(&mut tx, organization, old).await?;
            require_absent(&mut tx, new).await?;
            Ok(plan::rename_subunit(organization, old, new))
        }
        .await;

        self.finish(tx, trace, plan).await
    }

    /// Turns a sub-unit into a new organization.
    ///
    /// The members of `old_subunit` move to `new_organization`/`new_subunit`
    /// with identity (`new_organization`, `label`). The old sub-unit and its
    /// organization are dropped, so the old organization must not hold any
    /// other sub-unit.
    pub async fn reparent_subunit_as_organization(
        &self,
        old_organization: &TenantName,
        old_subunit: &TenantName,
        new_organization: &TenantName,
        new_subunit: &TenantName,
        label: &TenantName,
    ) -> StorageResult<StructuralReceipt> {
        let names = Reparent {
            old_organization,
            old_subunit,
            new_organization,
            new_subunit,
        };
        let (mut tx, trace) = self
            .start(
                StructuralOperation::ReparentSubunitAsOrganization,
                reparent_target(&names),
            )
            .await?;

        let plan: StorageResult<Vec<PlannedStep>> = async {
            self.check_reparent(&mut tx, &names).await?;

            let siblings: Vec<String> = tx
                .children(old_organization)
                .await
                .map_err(StorageError::into_catalog_unavailable)?
                .into_iter()
                .filter(|child| child != old_subunit.as_str())
                .collect();
            if !siblings.is_empty() {
                return Err(StorageError::invalid_request(format!(
                    "organization {} still holds other sub-units: {}",
                    old_organization,
                    siblings.join(", ")
                )));
            }

            Ok(plan::reparent_subunit_as_organization(&names, label))
        }
        .await;

        self.finish(tx, trace, plan).await
    }

    /// Moves a sub-unit's members under a new organization and sub-unit.
    ///
    /// Rows are copied with upsert semantics and the old organization is kept.
    pub async fn reparent_organization_under_subunit(
        &self,
        old_organization: &TenantName,
        old_subunit: &TenantName,
        new_organization: &TenantName,
        new_subunit: &TenantName,
    ) -> StorageResult<StructuralReceipt> {
        let names = Reparent {
            old_organization,
            old_subunit,
            new_organization,
            new_subunit,
        };
        let (mut tx, trace) = self
            .start(
                StructuralOperation::ReparentOrganizationUnderSubunit,
                reparent_target(&names),
            )
            .await?;

        let plan: StorageResult<Vec<PlannedStep>> = async {
            self.check_reparent(&mut tx, &names).await?;
            Ok(plan::reparent_organization_under_subunit(&names))
        }
        .await;

        self.finish(tx, trace, plan).await
    }

    async fn start(
        &self,
        operation: StructuralOperation,
        target: impl Into<String>,
    ) -> StorageResult<(B::Transaction, OperationTrace)> {
        let mut trace = OperationTrace::new(operation, target);
        let tx = match self.backend.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                trace.aborted(&e);
                return Err(TransactionError::BeginFailed {
                    operation,
                    message: e.to_string(),
                }
                .into());
            }
        };
        trace.validating();
        Ok((tx, trace))
    }

    /// Applies the plan and commits, or rolls back on the first error.
    async fn finish(
        &self,
        mut tx: B::Transaction,
        mut trace: OperationTrace,
        plan: StorageResult<Vec<PlannedStep>>,
    ) -> StorageResult<StructuralReceipt> {
        let applied = match plan {
            Ok(steps) => apply_steps(&mut tx, &mut trace, &steps).await,
            Err(e) => Err(e),
        };

        if let Err(err) = applied {
            trace.aborted(&err);
            if let Err(rollback_err) = Box::new(tx).rollback().await {
                warn!(
                    operation = %trace.operation(),
                    error = %rollback_err,
                    "rollback failed; the connection discards the transaction"
                );
            }
            return Err(err);
        }

        if let Err(commit_err) = Box::new(tx).commit().await {
            let err = StorageError::from(TransactionError::CommitFailed {
                operation: trace.operation(),
                message: commit_err.to_string(),
            });
            trace.aborted(&err);
            return Err(err);
        }

        Ok(trace.committed())
    }

    async fn lookup_organization(
        &self,
        tx: &mut B::Transaction,
        name: &TenantName,
    ) -> StorageResult<Option<PartitionInfo>> {
        let root = &self.backend.layout().root_table;
        Ok(lookup(tx, name)
            .await?
            .filter(|info| info.is_child_of(root)))
    }

    async fn require_organization(
        &self,
        tx: &mut B::Transaction,
        name: &TenantName,
    ) -> StorageResult<PartitionInfo> {
        self.lookup_organization(tx, name)
            .await?
            .ok_or_else(|| StorageError::not_found(PartitionKind::Organization, name.as_str()))
    }

    async fn require_subunit(
        &self,
        tx: &mut B::Transaction,
        organization: &TenantName,
        subunit: &TenantName,
    ) -> StorageResult<PartitionInfo> {
        lookup(tx, subunit)
            .await?
            .filter(|info| info.is_child_of(organization.as_str()))
            .ok_or_else(|| {
                StorageError::not_found(
                    PartitionKind::Subunit,
                    format!("{}/{}", organization, subunit),
                )
            })
    }

    async fn check_reparent(
        &self,
        tx: &mut B::Transaction,
        names: &Reparent<'_>,
    ) -> StorageResult<()> {
        if names.new_organization == names.new_subunit {
            return Err(StorageError::invalid_request(format!(
                "new organization and new sub-unit must differ: {}",
                names.new_organization
            )));
        }
        self.require_organization(tx, names.old_organization).await?;
        self.require_subunit(tx, names.old_organization, names.old_subunit)
            .await?;
        require_absent(tx, names.new_organization).await?;
        require_absent(tx, names.new_subunit).await?;
        Ok(())
    }
}

async fn lookup<T: StructuralTransaction>(
    tx: &mut T,
    name: &TenantName,
) -> StorageResult<Option<PartitionInfo>> {
    tx.lookup(name)
        .await
        .map_err(StorageError::into_catalog_unavailable)
}

async fn require_absent<T: StructuralTransaction>(
    tx: &mut T,
    name: &TenantName,
) -> StorageResult<()> {
    match lookup(tx, name).await? {
        Some(_) => Err(StorageError::already_exists(name.as_str())),
        None => Ok(()),
    }
}

async fn apply_steps<T: StructuralTransaction>(
    tx: &mut T,
    trace: &mut OperationTrace,
    steps: &[PlannedStep],
) -> StorageResult<()> {
    for (index, planned) in steps.iter().enumerate() {
        let step = index + 1;
        trace.step_started(step, planned);
        let rows = tx.apply(&planned.step).await.map_err(|e| {
            StorageError::from(TransactionError::StepFailed {
                operation: trace.operation(),
                step,
                label: planned.label.to_string(),
                message: e.to_string(),
            })
        })?;
        trace.step_applied(step, planned, rows);
    }
    Ok(())
}

fn reparent_target(names: &Reparent<'_>) -> String {
    format!(
        "{}/{} -> {}/{}",
        names.old_organization, names.old_subunit, names.new_organization, names.new_subunit
    )
}
