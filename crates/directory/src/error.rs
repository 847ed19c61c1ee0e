//! Error types for the tenant directory.
//!
//! Storage errors from the persistence layer are mapped onto caller-facing
//! errors with an HTTP status and a stable machine code:
//!
//! | Error Kind | HTTP Status | Code |
//! |------------|-------------|------|
//! | NotFound | 404 | not-found |
//! | AlreadyExists | 409 | already-exists |
//! | ParentNotFound | 422 | parent-not-found |
//! | InvalidRequest | 400 | invalid-request |
//! | CatalogUnavailable | 503 | catalog-unavailable |
//! | TransactionFailed | 500 | transaction-failed |

use http::StatusCode;
use serde_json::{Value, json};
use tenantry_persistence::error::{ErrorKind, StorageError, TransactionError};

/// The error type for directory operations.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// Referenced organization or sub-unit is absent.
    #[error("Not found: {message}")]
    NotFound {
        /// Error message.
        message: String,
    },

    /// Create or rename collides with an existing name.
    #[error("Already exists: {message}")]
    AlreadyExists {
        /// Error message.
        message: String,
    },

    /// Sub-unit requested under a missing organization.
    #[error("Parent not found: {message}")]
    ParentNotFound {
        /// Error message.
        message: String,
    },

    /// Missing or malformed request field.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Error message.
        message: String,
    },

    /// The catalog could not be read.
    #[error("Catalog unavailable: {message}")]
    CatalogUnavailable {
        /// Error message.
        message: String,
    },

    /// A structural operation failed and was rolled back.
    #[error("Transaction failed: {message}")]
    TransactionFailed {
        /// Error message.
        message: String,
        /// 1-based index of the failed step, when a step failed.
        step: Option<usize>,
        /// Label of the failed step.
        label: Option<String>,
    },
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

impl DirectoryError {
    /// Returns the error class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DirectoryError::NotFound { .. } => ErrorKind::NotFound,
            DirectoryError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            DirectoryError::ParentNotFound { .. } => ErrorKind::ParentNotFound,
            DirectoryError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            DirectoryError::CatalogUnavailable { .. } => ErrorKind::CatalogUnavailable,
            DirectoryError::TransactionFailed { .. } => ErrorKind::TransactionFailed,
        }
    }

    /// Returns the HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::AlreadyExists => StatusCode::CONFLICT,
            ErrorKind::ParentNotFound => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorKind::CatalogUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::TransactionFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the stable machine code, e.g. `"not-found"`.
    pub fn code(&self) -> String {
        self.kind().to_string()
    }

    /// Returns the human-readable message without the class prefix.
    pub fn message(&self) -> &str {
        match self {
            DirectoryError::NotFound { message }
            | DirectoryError::AlreadyExists { message }
            | DirectoryError::ParentNotFound { message }
            | DirectoryError::InvalidRequest { message }
            | DirectoryError::CatalogUnavailable { message }
            | DirectoryError::TransactionFailed { message, .. } => message,
        }
    }

    /// Shorthand for an `InvalidRequest` error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        DirectoryError::InvalidRequest {
            message: message.into(),
        }
    }

    /// Renders the JSON error body.
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "error": self.message(),
            "code": self.code(),
            "status": self.status_code().as_u16(),
        });
        if let DirectoryError::TransactionFailed {
            step: Some(step),
            label: Some(label),
            ..
        } = self
        {
            body["step"] = json!(step);
            body["label"] = json!(label);
        }
        body
    }
}

impl From<StorageError> for DirectoryError {
    fn from(err: StorageError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::NotFound => DirectoryError::NotFound { message },
            ErrorKind::AlreadyExists => DirectoryError::AlreadyExists { message },
            ErrorKind::ParentNotFound => DirectoryError::ParentNotFound { message },
            ErrorKind::InvalidRequest => DirectoryError::InvalidRequest { message },
            ErrorKind::CatalogUnavailable => DirectoryError::CatalogUnavailable { message },
            ErrorKind::TransactionFailed => {
                let (step, label) = match err {
                    StorageError::Transaction(TransactionError::StepFailed {
                        step, label, ..
                    }) => (Some(step), Some(label)),
                    _ => (None, None),
                };
                DirectoryError::TransactionFailed {
                    message,
                    step,
                    label,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantry_persistence::error::PartitionKind;
    use tenantry_persistence::lifecycle::StructuralOperation;

    #[test]
    fn test_not_found_mapping() {
        let err: DirectoryError =
            StorageError::not_found(PartitionKind::Organization, "acme").into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "not-found");
        assert!(err.message().contains("acme"));
    }

    #[test]
    fn test_already_exists_mapping() {
        let err: DirectoryError = StorageError::already_exists("acme").into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_step_failure_keeps_step_and_label() {
        let err: DirectoryError = StorageError::from(TransactionError::StepFailed {
            operation: StructuralOperation::RenameOrganization,
            step: 4,
            label: "attach_organization".to_string(),
            message: "boom".to_string(),
        })
        .into();

        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = err.to_json();
        assert_eq!(body["code"], "transaction-failed");
        assert_eq!(body["step"], 4);
        assert_eq!(body["label"], "attach_organization");
    }

    #[test]
    fn test_json_body_shape() {
        let body = DirectoryError::invalid_request("organization is required").to_json();
        assert_eq!(body["error"], "organization is required");
        assert_eq!(body["code"], "invalid-request");
        assert_eq!(body["status"], 400);
        assert!(body.get("step").is_none());
    }
}
