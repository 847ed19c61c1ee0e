//! Tenantry Persistence Layer
//!
//! This crate manages the lifecycle of tenant partitions. Each tenant is a
//! physical list partition of a single root table, arranged in two levels: an
//! **organization** partition of the root table, itself partitioned by
//! **sub-unit**. Member rows live in the sub-unit partitions.
//!
//! Structural changes (create, delete, rename, re-parent) are multi-step
//! schema mutations interleaved with data movement. Every one of them runs in
//! a single transaction, so a failure never leaves the catalog half-changed.
//!
//! # Backend Features
//!
//! - `memory` (default) - in-process engine for embedded use and tests
//! - `postgres` (default) - PostgreSQL declarative partitioning
//! - `postgres-integration` - Docker-backed PostgreSQL tests
//!
//! # Architecture
//!
//! - [`tenant`] - tenant name grammar and table layout
//! - [`core`] - catalog and backend traits, structural steps
//! - [`lifecycle`] - the transactional lifecycle engine
//! - [`backends`] - backend implementations
//! - [`error`] - error types for all operations
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use tenantry_persistence::backends::memory::MemoryBackend;
//! use tenantry_persistence::core::{MemberRecord, PartitionCatalog};
//! use tenantry_persistence::lifecycle::LifecycleEngine;
//! use tenantry_persistence::tenant::TenantName;
//!
//! # tokio_test::block_on(async {
//! let backend = Arc::new(MemoryBackend::new());
//! let engine = LifecycleEngine::new(backend.clone());
//!
//! let acme = TenantName::parse("acme").unwrap();
//! let north = TenantName::parse("north").unwrap();
//! engine.create_organization(&acme).await.unwrap();
//! engine.create_subunit(&acme, &north).await.unwrap();
//! backend
//!     .insert_member(MemberRecord::new("acme", "north", "jdoe"))
//!     .await
//!     .unwrap();
//!
//! // Renaming moves every member to the new identity.
//! let globex = TenantName::parse("globex").unwrap();
//! engine.rename_organization(&acme, &globex).await.unwrap();
//!
//! assert!(!backend.exists(&acme).await.unwrap());
//! assert_eq!(backend.members("globex")[0].organization, "globex");
//! # });
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod core;
pub mod error;
pub mod lifecycle;
pub mod tenant;

// Re-export commonly used types at crate root
pub use error::{ErrorKind, StorageError, StorageResult};
pub use tenant::{PartitionLayout, TenantName};

// Re-export core traits
pub use core::{
    BackendKind, PartitionBackend, PartitionCatalog, StructuralTransaction, TopologySnapshot,
};

pub use lifecycle::{LifecycleEngine, StructuralOperation, StructuralReceipt};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
