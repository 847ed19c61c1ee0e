//! Tenantry admin CLI
//!
//! Runs one directory operation per invocation and prints the outcome as
//! JSON on stdout: `{"data": ...}` on success, or an error body with a
//! non-zero exit status. Logs go to stderr.
//!
//! The `memory` backend keeps state only for the life of the process; it is
//! meant for trying out commands.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tenantry_directory::requests::{
    OrganizationRequest, RenameOrganizationRequest, RenameSubunitRequest, ReparentRequest,
    SubunitRequest,
};
use tenantry_directory::{
    DataEnvelope, DirectoryConfig, DirectoryResult, StorageBackendMode, TenantDirectory,
    init_logging,
};
use tenantry_persistence::core::PartitionBackend;
use tracing::info;

/// Top-level CLI parser for the `tenantry` binary.
#[derive(Debug, Parser)]
#[command(
    name = "tenantry",
    version,
    about = "Partition-per-tenant lifecycle manager"
)]
struct Cli {
    #[command(flatten)]
    config: DirectoryConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Create the tenant schema and root table if missing.
    Init,
    /// Show every organization with its sub-units.
    Topology,
    /// List organizations.
    Organizations,
    /// List the sub-units of an organization.
    Subunits { organization: String },
    /// Create an organization.
    CreateOrganization { organization: String },
    /// Create a sub-unit under an organization.
    CreateSubunit {
        organization: String,
        subunit: String,
    },
    /// Drop an organization with all sub-units and members.
    DeleteOrganization { organization: String },
    /// Drop a sub-unit with all members.
    DeleteSubunit {
        organization: String,
        subunit: String,
    },
    /// Rename an organization.
    RenameOrganization {
        old_organization: String,
        new_organization: String,
    },
    /// Rename a sub-unit.
    RenameSubunit {
        organization: String,
        old_subunit: String,
        new_subunit: String,
    },
    /// Turn a sub-unit into a standalone organization.
    ReparentSubunitToOrganization {
        organization: String,
        subunit: String,
        new_organization: String,
        new_subunit: String,
        /// Sub-unit identity stored on the moved members.
        label: String,
    },
    /// Move a sub-unit's members under a new organization and sub-unit.
    ReparentOrganizationToSubunit {
        organization: String,
        subunit: String,
        new_organization: String,
        new_subunit: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli.config.log_level);

    if let Err(errors) = cli.config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        return Ok(ExitCode::from(2));
    }

    info!(
        backend = %cli.config.backend,
        schema = %cli.config.schema,
        root_table = %cli.config.root_table,
        "Starting tenantry"
    );

    let outcome = match cli.config.backend {
        StorageBackendMode::Memory => run_memory(&cli.config, cli.command).await,
        StorageBackendMode::Postgres => run_postgres(&cli.config, cli.command).await,
    };

    match outcome {
        Ok(data) => {
            println!("{}", serde_json::to_string_pretty(&DataEnvelope::new(data))?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            tracing::error!(code = %err.code(), error = %err, "operation failed");
            println!("{}", serde_json::to_string_pretty(&err.to_json())?);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Runs a command against an in-process backend.
#[cfg(feature = "memory")]
async fn run_memory(config: &DirectoryConfig, command: Command) -> DirectoryResult<Value> {
    use tenantry_persistence::backends::memory::MemoryBackend;

    let backend = MemoryBackend::with_layout(config.layout());
    run(TenantDirectory::new(Arc::new(backend)), command).await
}

/// Fallback when the memory feature is not enabled.
#[cfg(not(feature = "memory"))]
async fn run_memory(_config: &DirectoryConfig, _command: Command) -> DirectoryResult<Value> {
    Err(tenantry_directory::DirectoryError::invalid_request(
        "The memory backend requires the 'memory' feature. \
         Build with: cargo build -p tenantry --features memory",
    ))
}

/// Runs a command against PostgreSQL.
#[cfg(feature = "postgres")]
async fn run_postgres(config: &DirectoryConfig, command: Command) -> DirectoryResult<Value> {
    use tenantry_persistence::backends::postgres::PostgresBackend;

    let pg_config = config.to_postgres_config();
    info!(
        host = %pg_config.host,
        port = pg_config.port,
        dbname = %pg_config.dbname,
        "Connecting to PostgreSQL"
    );
    let backend = PostgresBackend::new(pg_config).await?;
    run(TenantDirectory::new(Arc::new(backend)), command).await
}

/// Fallback when the postgres feature is not enabled.
#[cfg(not(feature = "postgres"))]
async fn run_postgres(_config: &DirectoryConfig, _command: Command) -> DirectoryResult<Value> {
    Err(tenantry_directory::DirectoryError::invalid_request(
        "The postgres backend requires the 'postgres' feature. \
         Build with: cargo build -p tenantry --features postgres",
    ))
}

async fn run<B: PartitionBackend>(
    directory: TenantDirectory<B>,
    command: Command,
) -> DirectoryResult<Value> {
    let value = match command {
        Command::Init => {
            directory.initialize().await?;
            let layout = directory.backend().layout();
            json!({
                "schema": layout.schema,
                "root_table": layout.root_qualified(),
            })
        }
        Command::Topology => json!(directory.topology().await?),
        Command::Organizations => json!(directory.list_organizations().await?),
        Command::Subunits { organization } => {
            json!(
                directory
                    .list_subunits(&OrganizationRequest { organization })
                    .await?
            )
        }
        Command::CreateOrganization { organization } => json!(
            directory
                .create_organization(&OrganizationRequest { organization })
                .await?
        ),
        Command::CreateSubunit {
            organization,
            subunit,
        } => json!(
            directory
                .create_subunit(&SubunitRequest {
                    organization,
                    subunit
                })
                .await?
        ),
        Command::DeleteOrganization { organization } => json!(
            directory
                .delete_organization(&OrganizationRequest { organization })
                .await?
        ),
        Command::DeleteSubunit {
            organization,
            subunit,
        } => json!(
            directory
                .delete_subunit(&SubunitRequest {
                    organization,
                    subunit
                })
                .await?
        ),
        Command::RenameOrganization {
            old_organization,
            new_organization,
        } => json!(
            directory
                .rename_organization(&RenameOrganizationRequest {
                    old_organization,
                    new_organization,
                })
                .await?
        ),
        Command::RenameSubunit {
            organization,
            old_subunit,
            new_subunit,
        } => json!(
            directory
                .rename_subunit(&RenameSubunitRequest {
                    organization,
                    old_subunit,
                    new_subunit,
                })
                .await?
        ),
        Command::ReparentSubunitToOrganization {
            organization,
            subunit,
            new_organization,
            new_subunit,
            label,
        } => json!(
            directory
                .reparent_subunit_to_organization(&ReparentRequest {
                    organization,
                    subunit,
                    new_organization,
                    new_subunit,
                    label,
                })
                .await?
        ),
        Command::ReparentOrganizationToSubunit {
            organization,
            subunit,
            new_organization,
            new_subunit,
        } => json!(
            directory
                .reparent_organization_to_subunit(&ReparentRequest {
                    organization,
                    subunit,
                    new_organization,
                    new_subunit,
                    label: String::new(),
                })
                .await?
        ),
    };
    Ok(value)
}
