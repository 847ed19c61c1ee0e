//! Operation phases, tracing and receipts.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::{PlannedStep, StepKind};
use crate::error::StorageError;

/// The structural operations the lifecycle engine performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralOperation {
    /// Create an organization partition.
    CreateOrganization,
    /// Create a sub-unit partition.
    CreateSubunit,
    /// Drop an organization partition.
    DeleteOrganization,
    /// Drop a sub-unit partition.
    DeleteSubunit,
    /// Rename an organization.
    RenameOrganization,
    /// Rename a sub-unit.
    RenameSubunit,
    /// Move a sub-unit out into a new organization, retiring its old organization.
    ReparentSubunitAsOrganization,
    /// Move a sub-unit into a new organization, keeping its old organization.
    ReparentOrganizationUnderSubunit,
}

impl StructuralOperation {
    /// Returns the operation name used in logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            StructuralOperation::CreateOrganization => "create_organization",
            StructuralOperation::CreateSubunit => "create_subunit",
            StructuralOperation::DeleteOrganization => "delete_organization",
            StructuralOperation::DeleteSubunit => "delete_subunit",
            StructuralOperation::RenameOrganization => "rename_organization",
            StructuralOperation::RenameSubunit => "rename_subunit",
            StructuralOperation::ReparentSubunitAsOrganization => {
                "reparent_subunit_as_organization"
            }
            StructuralOperation::ReparentOrganizationUnderSubunit => {
                "reparent_organization_under_subunit"
            }
        }
    }
}

impl fmt::Display for StructuralOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a structural operation is in its lifecycle.
///
/// `Requested -> Validating -> InProgress(1..=N) -> Committed | Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum OperationPhase {
    /// Accepted, no transaction yet.
    Requested,
    /// Preconditions are being checked inside the transaction.
    Validating,
    /// Applying the given 1-based step.
    InProgress {
        /// Current step.
        step: usize,
    },
    /// Every step applied and the transaction committed.
    Committed,
    /// Rolled back; nothing was applied.
    Aborted,
}

impl OperationPhase {
    /// Returns true for `Committed` and `Aborted`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationPhase::Committed | OperationPhase::Aborted)
    }
}

/// One applied step, as reported in a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// 1-based position in the operation.
    pub step: usize,
    /// Step label.
    pub label: String,
    /// Step kind.
    pub kind: StepKind,
    /// Member rows the step touched.
    pub rows_affected: u64,
}

/// Result of a committed structural operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuralReceipt {
    /// The operation that ran.
    pub operation: StructuralOperation,
    /// Always `Committed`.
    pub phase: OperationPhase,
    /// Every applied step, in order.
    pub steps: Vec<StepReport>,
}

impl StructuralReceipt {
    /// Rows inserted by copy steps.
    pub fn rows_copied(&self) -> u64 {
        self.rows_of(StepKind::CopyMembers)
    }

    /// Rows touched by identity rewrites.
    pub fn rows_rewritten(&self) -> u64 {
        self.rows_of(StepKind::RewriteIdentity)
    }

    fn rows_of(&self, kind: StepKind) -> u64 {
        self.steps
            .iter()
            .filter(|report| report.kind == kind)
            .map(|report| report.rows_affected)
            .sum()
    }
}

/// Tracks and logs the phase transitions of one operation.
#[derive(Debug)]
pub(crate) struct OperationTrace {
    operation: StructuralOperation,
    target: String,
    phase: OperationPhase,
    steps: Vec<StepReport>,
}

impl OperationTrace {
    pub(crate) fn new(operation: StructuralOperation, target: impl Into<String>) -> Self {
        let target = target.into();
        debug!(operation = %operation, partition = %target, "structural operation requested");
        Self {
            operation,
            target,
            phase: OperationPhase::Requested,
            steps: Vec::new(),
        }
    }

    pub(crate) fn operation(&self) -> StructuralOperation {
        self.operation
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> OperationPhase {
        self.phase
    }

    pub(crate) fn validating(&mut self) {
        self.phase = OperationPhase::Validating;
        debug!(operation = %self.operation, partition = %self.target, "checking preconditions");
    }

    pub(crate) fn step_started(&mut self, step: usize, planned: &PlannedStep) {
        self.phase = OperationPhase::InProgress { step };
        debug!(
            operation = %self.operation,
            partition = %self.target,
            step,
            label = planned.label,
            "applying step"
        );
    }

    pub(crate) fn step_applied(&mut self, step: usize, planned: &PlannedStep, rows_affected: u64) {
        debug!(
            operation = %self.operation,
            step,
            label = planned.label,
            rows_affected,
            "step applied"
        );
        self.steps.push(StepReport {
            step,
            label: planned.label.to_string(),
            kind: planned.step.kind(),
            rows_affected,
        });
    }

    pub(crate) fn aborted(&mut self, err: &StorageError) {
        let failed_in = self.phase;
        self.phase = OperationPhase::Aborted;
        warn!(
            operation = %self.operation,
            partition = %self.target,
            phase = ?failed_in,
            error = %err,
            "structural operation aborted"
        );
    }

    pub(crate) fn committed(mut self) -> StructuralReceipt {
        self.phase = OperationPhase::Committed;
        info!(
            operation = %self.operation,
            partition = %self.target,
            steps = self.steps.len(),
            "structural operation committed"
        );
        StructuralReceipt {
            operation: self.operation,
            phase: self.phase,
            steps: self.steps,
        }
    }
}
