//! In-memory partition catalog and row storage.
//!
//! Models the parts of PostgreSQL list partitioning the lifecycle engine
//! relies on: partition bounds and overlap checks, partition constraints
//! inherited from every attached ancestor, tuple routing, per-partition unique
//! keys, cascading drops and statement atomicity.

use std::collections::BTreeMap;

use crate::core::{
    ConflictPolicy, IdentityValues, MemberRecord, PartitionInfo, PartitionRef, StructuralStep,
};
use crate::error::{BackendError, StorageError, StorageResult};
use crate::tenant::TenantName;

fn engine_error(message: impl Into<String>) -> StorageError {
    StorageError::Backend(BackendError::QueryError {
        message: message.into(),
    })
}

/// Column a partitioned table is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PartitionKey {
    Organization,
    Subunit,
}

impl PartitionKey {
    fn value<'a>(&self, row: &'a MemberRecord) -> &'a str {
        match self {
            PartitionKey::Organization => &row.organization,
            PartitionKey::Subunit => &row.subunit,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MemoryTable {
    parent: Option<String>,
    bound: Option<String>,
    key: Option<PartitionKey>,
    rows: Vec<MemberRecord>,
}

impl MemoryTable {
    fn new(key: Option<PartitionKey>) -> Self {
        Self {
            parent: None,
            bound: None,
            key,
            rows: Vec::new(),
        }
    }
}

/// Every relation in the tenant schema, keyed by unqualified name.
#[derive(Debug, Clone)]
pub(crate) struct CatalogState {
    root: String,
    tables: BTreeMap<String, MemoryTable>,
}

impl CatalogState {
    pub(crate) fn new(root: &str) -> Self {
        let mut tables = BTreeMap::new();
        tables.insert(
            root.to_string(),
            MemoryTable::new(Some(PartitionKey::Organization)),
        );
        Self {
            root: root.to_string(),
            tables,
        }
    }

    pub(crate) fn root(&self) -> &str {
        &self.root
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub(crate) fn info(&self, name: &str) -> Option<PartitionInfo> {
        self.tables.get(name).map(|table| PartitionInfo {
            name: name.to_string(),
            parent: table.parent.clone(),
            partitioned: table.key.is_some(),
        })
    }

    pub(crate) fn children(&self, parent: &str) -> Vec<String> {
        self.tables
            .iter()
            .filter(|(_, table)| table.parent.as_deref() == Some(parent))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Rows stored in a table and every partition beneath it.
    pub(crate) fn rows_under(&self, name: &str) -> Vec<MemberRecord> {
        self.leaves_under(name)
            .iter()
            .filter_map(|leaf| self.tables.get(leaf))
            .flat_map(|table| table.rows.iter().cloned())
            .collect()
    }

    /// Inserts a row through tuple routing starting at `target`.
    pub(crate) fn insert(&mut self, target: &str, row: MemberRecord) -> StorageResult<()> {
        let leaf = self.route(target, &row)?;
        self.check_unique(&leaf, &row)?;
        self.table_mut(&leaf)?.rows.push(row);
        Ok(())
    }

    /// Applies one step as a single statement: on error nothing changes.
    pub(crate) fn apply(&mut self, step: &StructuralStep) -> StorageResult<u64> {
        let mut next = self.clone();
        let rows = next.apply_in_place(step)?;
        *self = next;
        Ok(rows)
    }

    fn apply_in_place(&mut self, step: &StructuralStep) -> StorageResult<u64> {
        match step {
            StructuralStep::CreateOrganization { name, bound } => {
                let root = self.root.clone();
                self.create_partition(&root, name, bound, Some(PartitionKey::Subunit))?;
                Ok(0)
            }
            StructuralStep::CreateSubunit {
                parent,
                name,
                bound,
            } => {
                self.create_partition(parent.as_str(), name, bound, None)?;
                Ok(0)
            }
            StructuralStep::Rename { from, to } => {
                self.rename(from.as_str(), to.as_str())?;
                Ok(0)
            }
            StructuralStep::Detach { parent, child } => {
                let parent = self.resolve(parent);
                self.detach(&parent, child.as_str())?;
                Ok(0)
            }
            StructuralStep::Attach {
                parent,
                child,
                bound,
            } => {
                let parent = self.resolve(parent);
                self.attach(&parent, child.as_str(), bound.as_str())?;
                Ok(0)
            }
            StructuralStep::RewriteIdentity {
                target,
                set,
                matching,
            } => {
                let target = self.resolve(target);
                self.rewrite_identity(&target, set, matching)
            }
            StructuralStep::CopyMembers {
                source,
                target,
                organization,
                subunit,
                conflict,
            } => self.copy_members(
                source.as_str(),
                target.as_str(),
                organization.as_str(),
                subunit.as_str(),
                *conflict,
            ),
            StructuralStep::Drop { name } => {
                self.drop_table(name.as_str())?;
                Ok(0)
            }
        }
    }

    fn resolve(&self, parent: &PartitionRef) -> String {
        match parent {
            PartitionRef::Root => self.root.clone(),
            PartitionRef::Named(name) => name.as_str().to_string(),
        }
    }

    fn table(&self, name: &str) -> StorageResult<&MemoryTable> {
        self.tables
            .get(name)
            .ok_or_else(|| engine_error(format!("relation \"{}\" does not exist", name)))
    }

    fn table_mut(&mut self, name: &str) -> StorageResult<&mut MemoryTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| engine_error(format!("relation \"{}\" does not exist", name)))
    }

    fn partition_key(&self, name: &str) -> StorageResult<PartitionKey> {
        self.table(name)?
            .key
            .ok_or_else(|| engine_error(format!("table \"{}\" is not partitioned", name)))
    }

    fn check_overlap(&self, parent: &str, name: &str, bound: &str) -> StorageResult<()> {
        let clash = self.tables.iter().find(|(_, table)| {
            table.parent.as_deref() == Some(parent) && table.bound.as_deref() == Some(bound)
        });
        match clash {
            Some((other, _)) => Err(engine_error(format!(
                "partition \"{}\" would overlap partition \"{}\"",
                name, other
            ))),
            None => Ok(()),
        }
    }

    fn create_partition(
        &mut self,
        parent: &str,
        name: &TenantName,
        bound: &TenantName,
        key: Option<PartitionKey>,
    ) -> StorageResult<()> {
        self.partition_key(parent)?;
        if self.contains(name.as_str()) {
            return Err(engine_error(format!(
                "relation \"{}\" already exists",
                name
            )));
        }
        self.check_overlap(parent, name.as_str(), bound.as_str())?;

        let mut table = MemoryTable::new(key);
        table.parent = Some(parent.to_string());
        table.bound = Some(bound.as_str().to_string());
        self.tables.insert(name.as_str().to_string(), table);
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> StorageResult<()> {
        if self.contains(to) {
            return Err(engine_error(format!("relation \"{}\" already exists", to)));
        }
        let table = self
            .tables
            .remove(from)
            .ok_or_else(|| engine_error(format!("relation \"{}\" does not exist", from)))?;
        self.tables.insert(to.to_string(), table);

        for table in self.tables.values_mut() {
            if table.parent.as_deref() == Some(from) {
                table.parent = Some(to.to_string());
            }
        }
        if self.root == from {
            self.root = to.to_string();
        }
        Ok(())
    }

    fn detach(&mut self, parent: &str, child: &str) -> StorageResult<()> {
        self.table(parent)?;
        let table = self.table_mut(child)?;
        if table.parent.as_deref() != Some(parent) {
            return Err(engine_error(format!(
                "relation \"{}\" is not a partition of relation \"{}\"",
                child, parent
            )));
        }
        table.parent = None;
        table.bound = None;
        Ok(())
    }

    fn attach(&mut self, parent: &str, child: &str, bound: &str) -> StorageResult<()> {
        let key = self.partition_key(parent)?;
        let table = self.table(child)?;
        if table.parent.is_some() || child == self.root {
            return Err(engine_error(format!(
                "\"{}\" is already a partition",
                child
            )));
        }
        self.check_overlap(parent, child, bound)?;

        let mut chain = self.constraint_chain(parent);
        chain.push((key, bound.to_string()));
        let violates = self
            .rows_under(child)
            .iter()
            .any(|row| !satisfies(&chain, row));
        if violates {
            return Err(engine_error(format!(
                "partition constraint of relation \"{}\" is violated by some row",
                child
            )));
        }

        let table = self.table_mut(child)?;
        table.parent = Some(parent.to_string());
        table.bound = Some(bound.to_string());
        Ok(())
    }

    fn rewrite_identity(
        &mut self,
        target: &str,
        set: &IdentityValues,
        matching: &IdentityValues,
    ) -> StorageResult<u64> {
        self.table(target)?;

        let mut moved = Vec::new();
        for leaf in self.leaves_under(target) {
            let table = self.table_mut(&leaf)?;
            let (hit, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut table.rows)
                .into_iter()
                .partition(|row| matching.matches(&row.organization, &row.subunit));
            table.rows = kept;
            moved.extend(hit.into_iter().map(|row| (leaf.clone(), row)));
        }

        let count = moved.len() as u64;
        for (leaf, mut row) in moved {
            if let Some(organization) = &set.organization {
                row.organization = organization.as_str().to_string();
            }
            if let Some(subunit) = &set.subunit {
                row.subunit = subunit.as_str().to_string();
            }

            let destination = if satisfies(&self.constraint_chain(&leaf), &row) {
                leaf
            } else if leaf != target {
                self.route(target, &row)?
            } else {
                return Err(engine_error(format!(
                    "new row for relation \"{}\" violates partition constraint",
                    leaf
                )));
            };
            self.check_unique(&destination, &row)?;
            self.table_mut(&destination)?.rows.push(row);
        }
        Ok(count)
    }

    fn copy_members(
        &mut self,
        source: &str,
        target: &str,
        organization: &str,
        subunit: &str,
        conflict: ConflictPolicy,
    ) -> StorageResult<u64> {
        self.table(source)?;
        self.table(target)?;

        let incoming: Vec<MemberRecord> = self
            .rows_under(source)
            .iter()
            .map(|row| row.with_identity(organization, subunit))
            .collect();
        let count = incoming.len() as u64;

        for row in incoming {
            let leaf = self.route(target, &row)?;
            match conflict {
                ConflictPolicy::Reject => {
                    self.check_unique(&leaf, &row)?;
                    self.table_mut(&leaf)?.rows.push(row);
                }
                ConflictPolicy::Upsert => {
                    let existing = self
                        .table(&leaf)?
                        .rows
                        .iter()
                        .position(|existing| same_member(existing, &row));
                    match existing {
                        Some(index) => self.table_mut(&leaf)?.rows[index].overwrite_from(&row),
                        None => {
                            self.check_unique(&leaf, &row)?;
                            self.table_mut(&leaf)?.rows.push(row);
                        }
                    }
                }
            }
        }
        Ok(count)
    }

    fn drop_table(&mut self, name: &str) -> StorageResult<()> {
        self.table(name)?;
        let mut doomed = vec![name.to_string()];
        let mut index = 0;
        while index < doomed.len() {
            let children = self.children(&doomed[index]);
            doomed.extend(children);
            index += 1;
        }
        for table in doomed {
            self.tables.remove(&table);
        }
        Ok(())
    }

    /// Every `(key, bound)` pair a row under `name` must satisfy, nearest first.
    fn constraint_chain(&self, name: &str) -> Vec<(PartitionKey, String)> {
        let mut chain = Vec::new();
        let mut current = name.to_string();
        while let Some(table) = self.tables.get(&current) {
            let (Some(parent), Some(bound)) = (&table.parent, &table.bound) else {
                break;
            };
            let Some(key) = self.tables.get(parent).and_then(|p| p.key) else {
                break;
            };
            chain.push((key, bound.clone()));
            current = parent.clone();
        }
        chain
    }

    fn route(&self, target: &str, row: &MemberRecord) -> StorageResult<String> {
        if !satisfies(&self.constraint_chain(target), row) {
            return Err(engine_error(format!(
                "new row for relation \"{}\" violates partition constraint",
                target
            )));
        }

        let mut current = target.to_string();
        loop {
            let Some(key) = self.table(&current)?.key else {
                return Ok(current);
            };
            let value = key.value(row);
            let next = self.tables.iter().find(|(_, table)| {
                table.parent.as_deref() == Some(current.as_str())
                    && table.bound.as_deref() == Some(value)
            });
            match next {
                Some((name, _)) => current = name.clone(),
                None => {
                    return Err(engine_error(format!(
                        "no partition of relation \"{}\" found for row",
                        current
                    )));
                }
            }
        }
    }

    fn leaves_under(&self, name: &str) -> Vec<String> {
        match self.tables.get(name) {
            Some(table) if table.key.is_some() => self
                .children(name)
                .iter()
                .flat_map(|child| self.leaves_under(child))
                .collect(),
            Some(_) => vec![name.to_string()],
            None => Vec::new(),
        }
    }

    fn check_unique(&self, leaf: &str, row: &MemberRecord) -> StorageResult<()> {
        let table = self.table(leaf)?;
        let same_identity = |existing: &&MemberRecord| {
            existing.organization == row.organization && existing.subunit == row.subunit
        };

        if table
            .rows
            .iter()
            .filter(same_identity)
            .any(|existing| existing.id == row.id)
        {
            return Err(engine_error(format!(
                "duplicate key value violates unique constraint \"{}_pkey\"",
                leaf
            )));
        }
        if table.rows.iter().any(|existing| same_member(existing, row)) {
            return Err(engine_error(format!(
                "duplicate key value violates unique constraint on \"{}\" (username)={}",
                leaf, row.username
            )));
        }
        Ok(())
    }
}

fn satisfies(chain: &[(PartitionKey, String)], row: &MemberRecord) -> bool {
    chain.iter().all(|(key, bound)| key.value(row) == bound)
}

/// Same upsert conflict key: identity columns plus username.
fn same_member(a: &MemberRecord, b: &MemberRecord) -> bool {
    a.organization == b.organization && a.subunit == b.subunit && a.username == b.username
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> TenantName {
        TenantName::parse(s).unwrap()
    }

    fn seeded() -> CatalogState {
        let mut state = CatalogState::new("onesystem");
        state
            .apply(&StructuralStep::CreateOrganization {
                name: name("acme"),
                bound: name("acme"),
            })
            .unwrap();
        state
            .apply(&StructuralStep::CreateSubunit {
                parent: name("acme"),
                name: name("north"),
                bound: name("north"),
            })
            .unwrap();
        state
            .insert("onesystem", MemberRecord::new("acme", "north", "jdoe"))
            .unwrap();
        state
            .insert("onesystem", MemberRecord::new("acme", "north", "asmith"))
            .unwrap();
        state
    }

    #[test]
    fn test_routing_reaches_leaf() {
        let state = seeded();
        assert_eq!(state.rows_under("north").len(), 2);
        assert_eq!(state.rows_under("acme").len(), 2);
        assert_eq!(state.rows_under("onesystem").len(), 2);
    }

    #[test]
    fn test_insert_without_partition_fails() {
        let mut state = seeded();
        let err = state
            .insert("onesystem", MemberRecord::new("globex", "hq", "x"))
            .unwrap_err();
        assert!(err.to_string().contains("no partition"));
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let mut state = seeded();
        let err = state
            .insert("onesystem", MemberRecord::new("acme", "north", "jdoe"))
            .unwrap_err();
        assert!(err.to_string().contains("duplicate key"));
    }

    #[test]
    fn test_overlapping_bound_rejected() {
        let mut state = seeded();
        let err = state
            .apply(&StructuralStep::CreateSubunit {
                parent: name("acme"),
                name: name("north2"),
                bound: name("north"),
            })
            .unwrap_err();
        assert!(err.to_string().contains("would overlap"));
        assert!(!state.contains("north2"));
    }

    #[test]
    fn test_attach_checks_constraint() {
        let mut state = seeded();
        state
            .apply(&StructuralStep::Detach {
                parent: PartitionRef::Named(name("acme")),
                child: name("north"),
            })
            .unwrap();
        assert_eq!(state.info("north").unwrap().parent, None);

        let err = state
            .apply(&StructuralStep::Attach {
                parent: PartitionRef::Named(name("acme")),
                child: name("north"),
                bound: name("south"),
            })
            .unwrap_err();
        assert!(err.to_string().contains("violated by some row"));

        state
            .apply(&StructuralStep::Attach {
                parent: PartitionRef::Named(name("acme")),
                child: name("north"),
                bound: name("north"),
            })
            .unwrap();
        assert!(state.info("north").unwrap().is_child_of("acme"));
    }

    #[test]
    fn test_rewrite_on_attached_leaf_violates_constraint() {
        let mut state = seeded();
        let before = state.rows_under("north");
        let err = state
            .apply(&StructuralStep::RewriteIdentity {
                target: PartitionRef::Named(name("north")),
                set: IdentityValues::subunit(name("south")),
                matching: IdentityValues::default(),
            })
            .unwrap_err();
        assert!(err.to_string().contains("violates partition constraint"));
        assert_eq!(state.rows_under("north"), before);
    }

    #[test]
    fn test_drop_cascades_to_partitions() {
        let mut state = seeded();
        state
            .apply(&StructuralStep::Drop { name: name("acme") })
            .unwrap();
        assert!(!state.contains("acme"));
        assert!(!state.contains("north"));
        assert!(state.rows_under("onesystem").is_empty());
    }

    #[test]
    fn test_rename_repoints_children() {
        let mut state = seeded();
        state
            .apply(&StructuralStep::Rename {
                from: name("acme"),
                to: name("acme2"),
            })
            .unwrap();
        assert!(state.info("north").unwrap().is_child_of("acme2"));
        assert_eq!(state.children("acme2"), vec!["north".to_string()]);
    }

    #[test]
    fn test_upsert_overwrites_existing() {
        let mut state = seeded();
        state
            .apply(&StructuralStep::CreateSubunit {
                parent: name("acme"),
                name: name("south"),
                bound: name("south"),
            })
            .unwrap();
        state
            .insert(
                "onesystem",
                MemberRecord::new("acme", "south", "jdoe").with_role("stale"),
            )
            .unwrap();

        let copied = state
            .apply(&StructuralStep::CopyMembers {
                source: name("north"),
                target: name("south"),
                organization: name("acme"),
                subunit: name("south"),
                conflict: ConflictPolicy::Upsert,
            })
            .unwrap();
        assert_eq!(copied, 2);

        let south = state.rows_under("south");
        assert_eq!(south.len(), 2);
        let jdoe = south.iter().find(|row| row.username == "jdoe").unwrap();
        assert_eq!(jdoe.role, "member");
    }
}
