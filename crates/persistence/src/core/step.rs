//! Structural steps.
//!
//! A structural operation is an ordered list of [`StructuralStep`]s executed
//! inside one transaction. Steps are backend-neutral: the PostgreSQL backend
//! renders each one to a single statement, the in-memory backend applies it to
//! its working copy.

use std::fmt;

use serde::Serialize;

use crate::tenant::TenantName;

/// A partitioned parent a step attaches to or detaches from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionRef {
    /// The root table.
    Root,
    /// A named tenant partition.
    Named(TenantName),
}

impl fmt::Display for PartitionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionRef::Root => write!(f, "<root>"),
            PartitionRef::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Values of the two identity columns.
///
/// Used both as a row filter (unset columns match anything) and as an
/// assignment (unset columns are left unchanged).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityValues {
    /// Organization column value.
    pub organization: Option<TenantName>,
    /// Sub-unit column value.
    pub subunit: Option<TenantName>,
}

impl IdentityValues {
    /// Only the organization column.
    pub fn organization(organization: TenantName) -> Self {
        Self {
            organization: Some(organization),
            subunit: None,
        }
    }

    /// Only the sub-unit column.
    pub fn subunit(subunit: TenantName) -> Self {
        Self {
            organization: None,
            subunit: Some(subunit),
        }
    }

    /// Both identity columns.
    pub fn both(organization: TenantName, subunit: TenantName) -> Self {
        Self {
            organization: Some(organization),
            subunit: Some(subunit),
        }
    }

    /// Returns true when neither column is set.
    pub fn is_empty(&self) -> bool {
        self.organization.is_none() && self.subunit.is_none()
    }

    /// Returns true when a row with the given identity passes this filter.
    pub fn matches(&self, organization: &str, subunit: &str) -> bool {
        self.organization
            .as_ref()
            .is_none_or(|value| value.as_str() == organization)
            && self
                .subunit
                .as_ref()
                .is_none_or(|value| value.as_str() == subunit)
    }
}

/// What a bulk copy does when the target already holds a member with the same
/// conflict key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Fail the step.
    Reject,
    /// Overwrite the existing row's non-key columns.
    Upsert,
}

/// One mutating statement of a structural operation.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralStep {
    /// Create an organization partition of the root table.
    CreateOrganization {
        name: TenantName,
        bound: TenantName,
    },
    /// Create a sub-unit partition of an organization.
    CreateSubunit {
        parent: TenantName,
        name: TenantName,
        bound: TenantName,
    },
    /// Rename a partition object.
    Rename { from: TenantName, to: TenantName },
    /// Detach a partition from its parent.
    Detach {
        parent: PartitionRef,
        child: TenantName,
    },
    /// Attach a standalone table as a partition.
    Attach {
        parent: PartitionRef,
        child: TenantName,
        bound: TenantName,
    },
    /// Rewrite identity columns of matching rows under a table.
    RewriteIdentity {
        target: PartitionRef,
        set: IdentityValues,
        matching: IdentityValues,
    },
    /// Copy every member row of one table into another with a new identity.
    CopyMembers {
        source: TenantName,
        target: TenantName,
        organization: TenantName,
        subunit: TenantName,
        conflict: ConflictPolicy,
    },
    /// Drop a table together with any partitions beneath it.
    Drop { name: TenantName },
}

/// Discriminant of a [`StructuralStep`].
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    CreateOrganization,
    CreateSubunit,
    Rename,
    Detach,
    Attach,
    RewriteIdentity,
    CopyMembers,
    Drop,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepKind::CreateOrganization => "create_organization",
            StepKind::CreateSubunit => "create_subunit",
            StepKind::Rename => "rename",
            StepKind::Detach => "detach",
            StepKind::Attach => "attach",
            StepKind::RewriteIdentity => "rewrite_identity",
            StepKind::CopyMembers => "copy_members",
            StepKind::Drop => "drop",
        };
        write!(f, "{}", name)
    }
}

impl StructuralStep {
    /// Returns the step's kind.
    pub fn kind(&self) -> StepKind {
        match self {
            StructuralStep::CreateOrganization { .. } => StepKind::CreateOrganization,
            StructuralStep::CreateSubunit { .. } => StepKind::CreateSubunit,
            StructuralStep::Rename { .. } => StepKind::Rename,
            StructuralStep::Detach { .. } => StepKind::Detach,
            StructuralStep::Attach { .. } => StepKind::Attach,
            StructuralStep::RewriteIdentity { .. } => StepKind::RewriteIdentity,
            StructuralStep::CopyMembers { .. } => StepKind::CopyMembers,
            StructuralStep::Drop { .. } => StepKind::Drop,
        }
    }
}

/// A step tagged with the label reported in receipts and errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    /// Stable step label, e.g. `detach_subunit`.
    pub label: &'static str,
    /// The statement to apply.
    pub step: StructuralStep,
}

impl PlannedStep {
    /// Tags a step with a label.
    pub fn new(label: &'static str, step: StructuralStep) -> Self {
        Self { label, step }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> TenantName {
        TenantName::parse(s).unwrap()
    }

    #[test]
    fn test_identity_filter_matches() {
        let any = IdentityValues::default();
        assert!(any.is_empty());
        assert!(any.matches("acme", "north"));

        let org = IdentityValues::organization(name("acme"));
        assert!(org.matches("acme", "north"));
        assert!(!org.matches("globex", "north"));

        let both = IdentityValues::both(name("acme"), name("north"));
        assert!(both.matches("acme", "north"));
        assert!(!both.matches("acme", "south"));
    }

    #[test]
    fn test_step_kind() {
        let step = StructuralStep::Drop { name: name("acme") };
        assert_eq!(step.kind(), StepKind::Drop);
        assert_eq!(StepKind::CopyMembers.to_string(), "copy_members");
    }

    #[test]
    fn test_partition_ref_display() {
        assert_eq!(PartitionRef::Root.to_string(), "<root>");
        assert_eq!(PartitionRef::Named(name("acme")).to_string(), "acme");
    }
}
