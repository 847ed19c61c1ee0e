//! Core traits and types shared by every backend.
//!
//! - [`PartitionCatalog`] - read-only catalog access
//! - [`PartitionBackend`] / [`StructuralTransaction`] - transactional engines
//! - [`StructuralStep`] - backend-neutral mutating steps
//! - [`MemberRecord`] - tenant-scoped member rows

mod backend;
mod catalog;
mod member;
mod step;

pub use backend::{BackendKind, PartitionBackend, PartitionInfo, StructuralTransaction};
pub use catalog::{PartitionCatalog, PartitionEdge, TopologySnapshot};
pub use member::MemberRecord;
pub use step::{
    ConflictPolicy, IdentityValues, PartitionRef, PlannedStep, StepKind, StructuralStep,
};
