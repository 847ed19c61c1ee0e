//! # tenantry-directory - Tenant Directory Service
//!
//! Caller-facing operations over the tenant lifecycle engine. Each operation
//! takes a structured request and returns either a structured success payload
//! or a [`DirectoryError`] carrying a stable code and an HTTP status.
//!
//! ## Operations
//!
//! | Operation | Request | Success |
//! |-----------|---------|---------|
//! | list organizations | none | display names |
//! | list sub-units | [`OrganizationRequest`](requests::OrganizationRequest) | [`SubunitListing`](responses::SubunitListing)s |
//! | create / delete organization | [`OrganizationRequest`](requests::OrganizationRequest) | [`TenantResponse`](responses::TenantResponse) |
//! | create / delete sub-unit | [`SubunitRequest`](requests::SubunitRequest) | [`TenantResponse`](responses::TenantResponse) |
//! | rename organization | [`RenameOrganizationRequest`](requests::RenameOrganizationRequest) | new name |
//! | rename sub-unit | [`RenameSubunitRequest`](requests::RenameSubunitRequest) | new name |
//! | re-parent | [`ReparentRequest`](requests::ReparentRequest) | new names |
//!
//! ## Backend Support
//!
//! - `postgres` - PostgreSQL declarative partitioning (default)
//! - `memory` - in-process engine (default)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod requests;
pub mod responses;
pub mod service;

// Re-export commonly used types
pub use config::{DirectoryConfig, StorageBackendMode};
pub use error::{DirectoryError, DirectoryResult};
pub use responses::DataEnvelope;
pub use service::TenantDirectory;

/// Initializes the logging subsystem.
///
/// `RUST_LOG` overrides the given level.
///
/// # Arguments
///
/// * `level` - The log level (error, warn, info, debug, trace)
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "tenantry={level},tenantry_directory={level},tenantry_persistence={level}"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
