//! Tenant naming and table layout.
//!
//! - [`TenantName`] - canonical organization or sub-unit name
//! - [`PartitionLayout`] - schema, root table and identity column names
//!
//! Organizations and sub-units share one namespace: both are relations in the
//! tenant schema, so a sub-unit cannot reuse the name of any other partition.

mod layout;
mod name;

pub use layout::{CONFLICT_COLUMN, MEMBER_DATA_COLUMNS, PartitionLayout};
pub use name::{MAX_NAME_LENGTH, TenantName};
