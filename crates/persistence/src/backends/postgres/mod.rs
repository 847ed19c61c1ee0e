//! PostgreSQL backend implementation.
//!
//! Tenants are declarative list partitions of one root table:
//!
//! ```text
//! company.onesystem            PARTITION BY LIST (company)
//! ├── company.acme             FOR VALUES IN ('acme')  PARTITION BY LIST (branch)
//! │   ├── company.north        FOR VALUES IN ('north')
//! │   └── company.south        FOR VALUES IN ('south')
//! └── company.globex           FOR VALUES IN ('globex') PARTITION BY LIST (branch)
//! ```
//!
//! # Features
//!
//! - Connection pooling with deadpool-postgres
//! - Catalog reads from `information_schema`, `pg_class` and `pg_inherits`
//! - Transactional DDL: each structural operation is one `BEGIN ... COMMIT`
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tenantry_persistence::backends::postgres::{PostgresBackend, PostgresConfig};
//! use tenantry_persistence::core::PartitionBackend;
//! use tenantry_persistence::lifecycle::LifecycleEngine;
//! use tenantry_persistence::tenant::TenantName;
//!
//! # async fn main_example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(PostgresBackend::new(PostgresConfig::default()).await?);
//! backend.initialize().await?;
//!
//! let engine = LifecycleEngine::new(backend);
//! engine.create_organization(&TenantName::parse("acme")?).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS company.onesystem (
//!     company TEXT NOT NULL,
//!     branch TEXT NOT NULL,
//!     id UUID NOT NULL DEFAULT gen_random_uuid(),
//!     first_name TEXT NOT NULL DEFAULT '',
//!     last_name TEXT NOT NULL DEFAULT '',
//!     username TEXT NOT NULL,
//!     password TEXT NOT NULL DEFAULT '',
//!     create_at TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     update_at TIMESTAMPTZ,
//!     delete_at TIMESTAMPTZ,
//!     role TEXT NOT NULL DEFAULT 'member',
//!     PRIMARY KEY (company, branch, id),
//!     UNIQUE (company, branch, username)
//! ) PARTITION BY LIST (company);
//! ```

mod backend;
mod catalog;
pub(crate) mod schema;
pub mod sql;
mod transaction;

pub use backend::{PostgresBackend, PostgresConfig, PostgresSslMode};
pub use transaction::PostgresTransaction;
