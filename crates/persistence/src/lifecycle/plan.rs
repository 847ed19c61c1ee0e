//! Step plans for each structural operation.
//!
//! Plans are pure: they only order steps. Preconditions are checked by the
//! engine before a plan is applied.

use crate::core::{ConflictPolicy, IdentityValues, PartitionRef, PlannedStep, StructuralStep};
use crate::tenant::TenantName;

pub(crate) fn create_organization(name: &TenantName) -> Vec<PlannedStep> {
    vec![PlannedStep::new(
        "create_organization",
        StructuralStep::CreateOrganization {
            name: name.clone(),
            bound: name.clone(),
        },
    )]
}

pub(crate) fn create_subunit(organization: &TenantName, subunit: &TenantName) -> Vec<PlannedStep> {
    vec![PlannedStep::new(
        "create_subunit",
        StructuralStep::CreateSubunit {
            parent: organization.clone(),
            name: subunit.clone(),
            bound: subunit.clone(),
        },
    )]
}

pub(crate) fn delete_organization(name: &TenantName) -> Vec<PlannedStep> {
    vec![PlannedStep::new(
        "drop_organization",
        StructuralStep::Drop { name: name.clone() },
    )]
}

pub(crate) fn delete_subunit(subunit: &TenantName) -> Vec<PlannedStep> {
    vec![PlannedStep::new(
        "drop_subunit",
        StructuralStep::Drop {
            name: subunit.clone(),
        },
    )]
}

/// rename, detach from the root, rewrite the organization column, re-attach.
pub(crate) fn rename_organization(old: &TenantName, new: &TenantName) -> Vec<PlannedStep> {
    vec![
        PlannedStep::new(
            "rename_organization",
            StructuralStep::Rename {
                from: old.clone(),
                to: new.clone(),
            },
        ),
        PlannedStep::new(
            "detach_organization",
            StructuralStep::Detach {
                parent: PartitionRef::Root,
                child: new.clone(),
            },
        ),
        PlannedStep::new(
            "rewrite_organization_identity",
            StructuralStep::RewriteIdentity {
                target: PartitionRef::Named(new.clone()),
                set: IdentityValues::organization(new.clone()),
                matching: IdentityValues::organization(old.clone()),
            },
        ),
        PlannedStep::new(
            "attach_organization",
            StructuralStep::Attach {
                parent: PartitionRef::Root,
                child: new.clone(),
                bound: new.clone(),
            },
        ),
    ]
}

/// rename, detach from the organization, rewrite the sub-unit column, re-attach.
pub(crate) fn rename_subunit(
    organization: &TenantName,
    old: &TenantName,
    new: &TenantName,
) -> Vec<PlannedStep> {
    let parent = PartitionRef::Named(organization.clone());
    vec![
        PlannedStep::new(
            "rename_subunit",
            StructuralStep::Rename {
                from: old.clone(),
                to: new.clone(),
            },
        ),
        PlannedStep::new(
            "detach_subunit",
            StructuralStep::Detach {
                parent: parent.clone(),
                child: new.clone(),
            },
        ),
        PlannedStep::new(
            "rewrite_subunit_identity",
            StructuralStep::RewriteIdentity {
                target: PartitionRef::Named(new.clone()),
                set: IdentityValues::subunit(new.clone()),
                matching: IdentityValues::organization(organization.clone()),
            },
        ),
        PlannedStep::new(
            "attach_subunit",
            StructuralStep::Attach {
                parent,
                child: new.clone(),
                bound: new.clone(),
            },
        ),
    ]
}

/// Names involved in a re-parent.
#[derive(Debug, Clone)]
pub(crate) struct Reparent<'a> {
    pub old_organization: &'a TenantName,
    pub old_subunit: &'a TenantName,
    pub new_organization: &'a TenantName,
    pub new_subunit: &'a TenantName,
}

impl Reparent<'_> {
    fn detach_old_subunit(&self) -> PlannedStep {
        PlannedStep::new(
            "detach_subunit",
            StructuralStep::Detach {
                parent: PartitionRef::Named(self.old_organization.clone()),
                child: self.old_subunit.clone(),
            },
        )
    }

    fn create_new_organization(&self) -> PlannedStep {
        PlannedStep::new(
            "create_organization",
            StructuralStep::CreateOrganization {
                name: self.new_organization.clone(),
                bound: self.new_organization.clone(),
            },
        )
    }

    fn create_new_subunit(&self, bound: &TenantName) -> PlannedStep {
        PlannedStep::new(
            "create_subunit",
            StructuralStep::CreateSubunit {
                parent: self.new_organization.clone(),
                name: self.new_subunit.clone(),
                bound: bound.clone(),
            },
        )
    }

    fn old_identity(&self) -> IdentityValues {
        IdentityValues::both(self.old_organization.clone(), self.old_subunit.clone())
    }

    fn drop_old_subunit(&self) -> PlannedStep {
        PlannedStep::new(
            "drop_subunit",
            StructuralStep::Drop {
                name: self.old_subunit.clone(),
            },
        )
    }
}

/// Moves a sub-unit's members into a fresh organization whose only sub-unit
/// carries `label` as its identity, then retires the old sub-unit and its
/// organization.
pub(crate) fn reparent_subunit_as_organization(
    names: &Reparent<'_>,
    label: &TenantName,
) -> Vec<PlannedStep> {
    vec![
        names.detach_old_subunit(),
        names.create_new_organization(),
        names.create_new_subunit(label),
        PlannedStep::new(
            "copy_members",
            StructuralStep::CopyMembers {
                source: names.old_subunit.clone(),
                target: names.new_subunit.clone(),
                organization: names.new_organization.clone(),
                subunit: label.clone(),
                conflict: ConflictPolicy::Reject,
            },
        ),
        PlannedStep::new(
            "resync_root_identity",
            StructuralStep::RewriteIdentity {
                target: PartitionRef::Root,
                set: IdentityValues::both(names.new_organization.clone(), label.clone()),
                matching: names.old_identity(),
            },
        ),
        names.drop_old_subunit(),
        PlannedStep::new(
            "drop_organization",
            StructuralStep::Drop {
                name: names.old_organization.clone(),
            },
        ),
    ]
}

/// Moves a sub-unit's members into a fresh organization and sub-unit with
/// last-writer-wins upserts. The old organization is kept.
pub(crate) fn reparent_organization_under_subunit(names: &Reparent<'_>) -> Vec<PlannedStep> {
    vec![
        names.detach_old_subunit(),
        names.create_new_organization(),
        names.create_new_subunit(names.new_subunit),
        PlannedStep::new(
            "upsert_members",
            StructuralStep::CopyMembers {
                source: names.old_subunit.clone(),
                target: names.new_subunit.clone(),
                organization: names.new_organization.clone(),
                subunit: names.new_subunit.clone(),
                conflict: ConflictPolicy::Upsert,
            },
        ),
        PlannedStep::new(
            "repoint_root_identity",
            StructuralStep::RewriteIdentity {
                target: PartitionRef::Root,
                set: IdentityValues::organization(names.new_organization.clone()),
                matching: names.old_identity(),
            },
        ),
        names.drop_old_subunit(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StepKind;

    fn name(s: &str) -> TenantName {
        TenantName::parse(s).unwrap()
    }

    fn kinds(plan: &[PlannedStep]) -> Vec<StepKind> {
        plan.iter().map(|planned| planned.step.kind()).collect()
    }

    #[test]
    fn test_rename_organization_order() {
        let plan = rename_organization(&name("acme"), &name("acme2"));
        assert_eq!(
            kinds(&plan),
            vec![
                StepKind::Rename,
                StepKind::Detach,
                StepKind::RewriteIdentity,
                StepKind::Attach
            ]
        );
        assert_eq!(
            plan[1].step,
            StructuralStep::Detach {
                parent: PartitionRef::Root,
                child: name("acme2"),
            }
        );
        assert_eq!(
            plan[3].step,
            StructuralStep::Attach {
                parent: PartitionRef::Root,
                child: name("acme2"),
                bound: name("acme2"),
            }
        );
    }

    #[test]
    fn test_rename_subunit_rewrites_within_renamed_partition() {
        let plan = rename_subunit(&name("acme"), &name("north"), &name("south"));
        match &plan[2].step {
            StructuralStep::RewriteIdentity {
                target,
                set,
                matching,
            } => {
                assert_eq!(target, &PartitionRef::Named(name("south")));
                assert_eq!(set, &IdentityValues::subunit(name("south")));
                assert_eq!(matching, &IdentityValues::organization(name("acme")));
            }
            other => panic!("unexpected step {other:?}"),
        }
        assert_eq!(plan[3].label, "attach_subunit");
    }

    #[test]
    fn test_reparent_as_organization_plan() {
        let (old_org, old_sub, new_org, new_sub, label) = (
            name("acme"),
            name("north"),
            name("globex"),
            name("globex_main"),
            name("main"),
        );
        let names = Reparent {
            old_organization: &old_org,
            old_subunit: &old_sub,
            new_organization: &new_org,
            new_subunit: &new_sub,
        };
        let plan = reparent_subunit_as_organization(&names, &label);

        assert_eq!(
            kinds(&plan),
            vec![
                StepKind::Detach,
                StepKind::CreateOrganization,
                StepKind::CreateSubunit,
                StepKind::CopyMembers,
                StepKind::RewriteIdentity,
                StepKind::Drop,
                StepKind::Drop
            ]
        );
        assert_eq!(
            plan[2].step,
            StructuralStep::CreateSubunit {
                parent: name("globex"),
                name: name("globex_main"),
                bound: name("main"),
            }
        );
        assert_eq!(plan[5].step, StructuralStep::Drop { name: name("north") });
        assert_eq!(plan[6].step, StructuralStep::Drop { name: name("acme") });
    }

    #[test]
    fn test_reparent_under_subunit_plan_keeps_old_organization() {
        let (old_org, old_sub, new_org, new_sub) =
            (name("acme"), name("north"), name("globex"), name("hq"));
        let names = Reparent {
            old_organization: &old_org,
            old_subunit: &old_sub,
            new_organization: &new_org,
            new_subunit: &new_sub,
        };
        let plan = reparent_organization_under_subunit(&names);

        assert_eq!(plan.len(), 6);
        assert!(matches!(
            plan[3].step,
            StructuralStep::CopyMembers {
                conflict: ConflictPolicy::Upsert,
                ..
            }
        ));
        assert!(
            !plan
                .iter()
                .any(|planned| planned.step == StructuralStep::Drop { name: name("acme") })
        );
    }
}
