//! Data-access error types
//!
//! Structured errors for Dao and storage operations: which operation failed,
//! why, and which record was involved.
//!
//! # Example
//!
//! ```rust,ignore
//! use resource_crud::dao::{DaoError, DaoErrorKind, DaoOperation};
//!
//! let error = DaoError::not_found(DaoOperation::Update, "User", 42);
//! assert!(error.is_not_found());
//! assert_eq!(error.entity_id.as_deref(), Some("42"));
//! ```

use std::fmt;

use crate::entity::AssignError;
use crate::validator::FieldError;

/// Result type for data-access operations
pub type DaoResult<T> = std::result::Result<T, DaoError>;

/// Operation being performed when the error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DaoOperation {
    /// Point lookup by id
    Get,
    /// Unfiltered listing
    All,
    /// Windowed listing
    Paginate,
    /// Counting records
    Count,
    /// Inserting a new record
    Save,
    /// Overwriting an existing record
    Update,
    /// Flipping the soft-delete flag
    SoftDelete,
    /// Physically removing a record
    HardDelete,
    /// Opening, flushing or finishing a storage session
    Session,
}

impl fmt::Display for DaoOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "get"),
            Self::All => write!(f, "all"),
            Self::Paginate => write!(f, "paginate"),
            Self::Count => write!(f, "count"),
            Self::Save => write!(f, "save"),
            Self::Update => write!(f, "update"),
            Self::SoftDelete => write!(f, "soft_delete"),
            Self::HardDelete => write!(f, "hard_delete"),
            Self::Session => write!(f, "session"),
        }
    }
}

/// Category of data-access error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DaoErrorKind {
    /// Record was not found (or is soft-deleted)
    NotFound,
    /// Hard delete requested but not permitted
    OperationNotAllowed,
    /// Payload could not be assigned to the record
    ValidationFailed,
    /// Failed to reach storage
    ConnectionFailed,
    /// Operation timed out
    Timeout,
    /// Underlying storage error
    DatabaseError,
    /// Row could not be encoded or decoded
    SerializationError,
    /// Other unclassified error
    Other,
}

impl fmt::Display for DaoErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::OperationNotAllowed => write!(f, "operation_not_allowed"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::DatabaseError => write!(f, "database_error"),
            Self::SerializationError => write!(f, "serialization_error"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured data-access error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaoError {
    /// The operation being performed when the error occurred
    pub operation: DaoOperation,
    /// The category of error
    pub kind: DaoErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The type of record involved (e.g. "User")
    pub entity_type: Option<String>,
    /// The id of the record involved
    pub entity_id: Option<String>,
    /// Field-level detail for `ValidationFailed`
    pub field_errors: Vec<FieldError>,
}

impl DaoError {
    /// Create a new data-access error
    pub fn new(operation: DaoOperation, kind: DaoErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
            field_errors: Vec::new(),
        }
    }

    /// Create a "not found" error with record context
    pub fn not_found(
        operation: DaoOperation,
        entity_type: impl Into<String>,
        entity_id: impl fmt::Display,
    ) -> Self {
        Self::new(operation, DaoErrorKind::NotFound, "Entity not found")
            .with_entity(entity_type, entity_id.to_string())
    }

    /// Create an "operation not allowed" error for a refused hard delete
    pub fn operation_not_allowed(entity_type: impl Into<String>, entity_id: impl fmt::Display) -> Self {
        Self::new(
            DaoOperation::HardDelete,
            DaoErrorKind::OperationNotAllowed,
            "Hard delete is not allowed",
        )
        .with_entity(entity_type, entity_id.to_string())
    }

    /// Create a validation error from a failed field assignment
    pub fn assignment(operation: DaoOperation, entity_type: impl Into<String>, err: &AssignError) -> Self {
        let mut error = Self::new(operation, DaoErrorKind::ValidationFailed, err.to_string());
        error.entity_type = Some(entity_type.into());
        error.field_errors = err.field_errors();
        error
    }

    /// Create a connection failed error
    pub fn connection_failed(operation: DaoOperation, message: impl Into<String>) -> Self {
        Self::new(operation, DaoErrorKind::ConnectionFailed, message)
    }

    /// Create a timeout error
    pub fn timeout(operation: DaoOperation, message: impl Into<String>) -> Self {
        Self::new(operation, DaoErrorKind::Timeout, message)
    }

    /// Create a database error
    pub fn database_error(operation: DaoOperation, message: impl Into<String>) -> Self {
        Self::new(operation, DaoErrorKind::DatabaseError, message)
    }

    /// Create a serialization error
    pub fn serialization_error(operation: DaoOperation, message: impl Into<String>) -> Self {
        Self::new(operation, DaoErrorKind::SerializationError, message)
    }

    /// Add record context to an existing error
    #[must_use]
    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Change the operation recorded on an existing error
    #[must_use]
    pub fn with_operation(mut self, operation: DaoOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Whether the record was absent
    pub fn is_not_found(&self) -> bool {
        self.kind == DaoErrorKind::NotFound
    }

}

impl fmt::Display for DaoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Dao {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;

        if let (Some(entity_type), Some(entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        } else if let Some(entity_type) = &self.entity_type {
            write!(f, " [{}]", entity_type)?;
        }

        Ok(())
    }
}

impl std::error::Error for DaoError {}

#[cfg(feature = "database")]
impl From<sqlx::Error> for DaoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => {
                Self::new(DaoOperation::Get, DaoErrorKind::NotFound, "Row not found")
            }
            sqlx::Error::PoolTimedOut => {
                Self::timeout(DaoOperation::Session, "Connection pool timed out")
            }
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                Self::connection_failed(DaoOperation::Session, err.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Self::serialization_error(DaoOperation::Get, err.to_string())
            }
            _ => Self::database_error(DaoOperation::Session, err.to_string()),
        }
    }
}
