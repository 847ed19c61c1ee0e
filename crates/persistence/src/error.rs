//! Error types for the persistence layer.
//!
//! Errors are grouped by category: tenant topology errors, request validation
//! errors, catalog read errors, structural transaction errors and backend
//! (driver/pool) errors. [`StorageError::kind`] projects every error onto the
//! small caller-facing taxonomy in [`ErrorKind`].

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

use crate::lifecycle::StructuralOperation;

/// The primary error type for all partition operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Tenant topology errors (missing or duplicate partitions).
    #[error(transparent)]
    Tenant(#[from] TenantError),

    /// Request validation errors.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Catalog read errors.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Structural transaction errors.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Backend-specific errors.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Which level of the tenant hierarchy a partition belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionKind {
    /// Top-level tenant partition.
    Organization,
    /// Partition nested under an organization.
    Subunit,
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionKind::Organization => write!(f, "organization"),
            PartitionKind::Subunit => write!(f, "sub-unit"),
        }
    }
}

/// Errors describing the tenant topology.
#[derive(Error, Debug)]
pub enum TenantError {
    /// The referenced organization or sub-unit is absent.
    #[error("{kind} not found: {name}")]
    NotFound { kind: PartitionKind, name: String },

    /// A structural create collides with an existing partition name.
    #[error("partition already exists: {name}")]
    AlreadyExists { name: String },

    /// A sub-unit was requested under an organization that does not exist.
    #[error("parent organization not found: {organization}")]
    ParentNotFound { organization: String },
}

/// Errors raised before any storage work is attempted.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A required request field was empty.
    #[error("missing required field: {field}")]
    MissingRequiredField { field: String },

    /// A tenant or layout name does not match the identifier grammar.
    #[error("invalid identifier '{value}': {reason}")]
    InvalidIdentifier { value: String, reason: String },

    /// The request is well-formed but cannot be carried out as asked.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

/// Errors reading the partition catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The catalog query could not be executed.
    #[error("catalog unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Errors from a structural transaction.
///
/// Every variant is raised only after the transaction has been rolled back
/// (or was never started), so none of them imply partial application.
#[derive(Error, Debug)]
pub enum TransactionError {
    /// The transaction could not be started.
    #[error("{operation}: failed to begin transaction: {message}")]
    BeginFailed {
        operation: StructuralOperation,
        message: String,
    },

    /// A step of the structural sequence failed.
    #[error("{operation}: step {step} ({label}) failed: {message}")]
    StepFailed {
        operation: StructuralOperation,
        step: usize,
        label: String,
        message: String,
    },

    /// COMMIT itself failed.
    #[error("{operation}: commit failed: {message}")]
    CommitFailed {
        operation: StructuralOperation,
        message: String,
    },

    /// The transaction handle was already committed or rolled back.
    #[error("transaction no longer valid")]
    InvalidTransaction,
}

/// Errors originating from the storage backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend is currently unavailable.
    #[error("backend unavailable: {backend_name}")]
    Unavailable {
        backend_name: String,
        message: String,
    },

    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// Schema bootstrap failed.
    #[error("schema bootstrap failed: {message}")]
    BootstrapError { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Statement execution error.
    #[error("query execution failed: {message}")]
    QueryError { message: String },
}

/// Caller-facing error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Referenced organization or sub-unit is absent.
    NotFound,
    /// Structural create collides with an existing name.
    AlreadyExists,
    /// Sub-unit requested under a missing organization.
    ParentNotFound,
    /// Missing or malformed request field.
    InvalidRequest,
    /// The catalog or the backend could not be reached.
    CatalogUnavailable,
    /// A structural sequence failed and was rolled back.
    TransactionFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not-found",
            ErrorKind::AlreadyExists => "already-exists",
            ErrorKind::ParentNotFound => "parent-not-found",
            ErrorKind::InvalidRequest => "invalid-request",
            ErrorKind::CatalogUnavailable => "catalog-unavailable",
            ErrorKind::TransactionFailed => "transaction-failed",
        };
        write!(f, "{}", name)
    }
}

impl StorageError {
    /// Returns the caller-facing class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Tenant(TenantError::NotFound { .. }) => ErrorKind::NotFound,
            StorageError::Tenant(TenantError::AlreadyExists { .. }) => ErrorKind::AlreadyExists,
            StorageError::Tenant(TenantError::ParentNotFound { .. }) => ErrorKind::ParentNotFound,
            StorageError::Validation(_) => ErrorKind::InvalidRequest,
            StorageError::Catalog(_) => ErrorKind::CatalogUnavailable,
            StorageError::Transaction(_) => ErrorKind::TransactionFailed,
            StorageError::Backend(_) => ErrorKind::CatalogUnavailable,
        }
    }

    /// Shorthand for a `NotFound` error.
    pub fn not_found(kind: PartitionKind, name: impl Into<String>) -> Self {
        StorageError::Tenant(TenantError::NotFound {
            kind,
            name: name.into(),
        })
    }

    /// Shorthand for an `AlreadyExists` error.
    pub fn already_exists(name: impl Into<String>) -> Self {
        StorageError::Tenant(TenantError::AlreadyExists { name: name.into() })
    }

    /// Shorthand for an `InvalidRequest` error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        StorageError::Validation(ValidationError::InvalidRequest {
            message: message.into(),
        })
    }

    /// Wraps any storage error raised while reading the catalog.
    pub(crate) fn into_catalog_unavailable(self) -> Self {
        match self {
            StorageError::Catalog(_) => self,
            other => StorageError::Catalog(CatalogError::Unavailable {
                message: other.to_string(),
                source: Some(Box::new(other)),
            }),
        }
    }
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for StorageError {
    fn from(err: tokio_postgres::Error) -> Self {
        StorageError::Backend(BackendError::Internal {
            backend_name: "postgres".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}
