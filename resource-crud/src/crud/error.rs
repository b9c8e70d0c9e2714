//! API error types for controller operations
//!
//! Domain failures are translated here into transport failures with an HTTP
//! status and a JSON body, via `IntoResponse`.
//!
//! # Example
//!
//! ```rust,ignore
//! use resource_crud::crud::{ApiError, ApiErrorKind, ApiOperation};
//!
//! let error = ApiError::not_found(ApiOperation::Read, "User", "User not found");
//! assert_eq!(error.kind.status_code().as_u16(), 404);
//! ```

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::dao::{DaoError, DaoErrorKind, DaoOperation};
use crate::validator::{FieldError, ValidationFailure};

/// Controller operation during which the error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    /// Reading one record
    Read,
    /// Listing a page of records
    Index,
    /// Creating a record
    Create,
    /// Updating a record
    Update,
    /// Deleting a record
    Delete,
}

impl fmt::Display for ApiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Index => write!(f, "index"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

impl From<DaoOperation> for ApiOperation {
    fn from(op: DaoOperation) -> Self {
        match op {
            DaoOperation::Get | DaoOperation::Session => Self::Read,
            DaoOperation::All | DaoOperation::Paginate | DaoOperation::Count => Self::Index,
            DaoOperation::Save => Self::Create,
            DaoOperation::Update => Self::Update,
            DaoOperation::SoftDelete | DaoOperation::HardDelete => Self::Delete,
        }
    }
}

/// Category of API error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// Target record is absent
    NotFound,
    /// Hard delete refused
    OperationNotAllowed,
    /// Write payload rejected
    ValidationFailed,
    /// Malformed request (path, query or body framing)
    BadRequest,
    /// Internal server error
    InternalError,
    /// Storage temporarily unavailable
    ServiceUnavailable,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::OperationNotAllowed => write!(f, "operation_not_allowed"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::BadRequest => write!(f, "bad_request"),
            Self::InternalError => write!(f, "internal_error"),
            Self::ServiceUnavailable => write!(f, "service_unavailable"),
        }
    }
}

impl ApiErrorKind {
    /// HTTP status code for this error kind
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::OperationNotAllowed => StatusCode::FORBIDDEN,
            Self::ValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Error code string for this error kind
    #[must_use]
    pub fn error_code(&self) -> String {
        self.to_string().to_uppercase()
    }
}

/// Structured API error with operation context
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    /// The operation being performed when the error occurred
    pub operation: ApiOperation,
    /// The category of error
    pub kind: ApiErrorKind,
    /// User-facing message
    pub message: String,
    /// The type of record involved
    pub entity_type: Option<String>,
    /// The id of the record involved
    pub entity_id: Option<String>,
    /// Field-level detail and the original body, for `ValidationFailed`
    pub validation: Option<ValidationFailure>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(operation: ApiOperation, kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
            validation: None,
        }
    }

    /// Create a "not found" error carrying a resolved message
    pub fn not_found(
        operation: ApiOperation,
        entity_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(operation, ApiErrorKind::NotFound, message);
        error.entity_type = Some(entity_type.into());
        error
    }

    /// Create a validation error from a rejected payload
    pub fn validation_failed(operation: ApiOperation, failure: ValidationFailure) -> Self {
        let mut error = Self::new(operation, ApiErrorKind::ValidationFailed, failure.to_string());
        error.validation = Some(failure);
        error
    }

    /// Create a bad request error
    pub fn bad_request(operation: ApiOperation, message: impl Into<String>) -> Self {
        Self::new(operation, ApiErrorKind::BadRequest, message)
    }

    /// Create an internal error
    pub fn internal(operation: ApiOperation, message: impl Into<String>) -> Self {
        Self::new(operation, ApiErrorKind::InternalError, message)
    }

    /// Add record context
    #[must_use]
    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: ApiOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Replace the user-facing message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach the original request body to a validation error
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        if let Some(failure) = self.validation.as_mut() {
            failure.body = body;
        }
        self
    }

    /// Whether retrying the request might succeed
    pub fn is_retriable(&self) -> bool {
        matches!(self.kind, ApiErrorKind::ServiceUnavailable)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "API {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(entity_type), Some(entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Response body for API errors
#[derive(Debug, Serialize)]
struct ApiErrorResponse {
    error: String,
    code: String,
    status: u16,
    operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.kind.status_code();
        let code = self.kind.error_code();

        if status.is_server_error() {
            tracing::error!(
                operation = %self.operation,
                kind = %self.kind,
                entity_type = ?self.entity_type,
                entity_id = ?self.entity_id,
                retriable = self.is_retriable(),
                "API error: {}", self.message
            );
        } else {
            tracing::warn!(
                operation = %self.operation,
                kind = %self.kind,
                entity_type = ?self.entity_type,
                entity_id = ?self.entity_id,
                "API error: {}", self.message
            );
        }

        let (errors, body) = match self.validation {
            Some(failure) => (Some(failure.errors), Some(failure.body)),
            None => (None, None),
        };

        let response = ApiErrorResponse {
            error: self.message,
            code,
            status: status.as_u16(),
            operation: self.operation.to_string(),
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            errors,
            body,
        };

        (status, Json(response)).into_response()
    }
}

impl From<DaoError> for ApiError {
    fn from(err: DaoError) -> Self {
        let operation = ApiOperation::from(err.operation);

        let kind = match err.kind {
            DaoErrorKind::NotFound => ApiErrorKind::NotFound,
            DaoErrorKind::OperationNotAllowed => ApiErrorKind::OperationNotAllowed,
            DaoErrorKind::ValidationFailed => ApiErrorKind::ValidationFailed,
            DaoErrorKind::ConnectionFailed | DaoErrorKind::Timeout => {
                ApiErrorKind::ServiceUnavailable
            }
            DaoErrorKind::DatabaseError
            | DaoErrorKind::SerializationError
            | DaoErrorKind::Other => ApiErrorKind::InternalError,
        };

        // internal detail stays in the log; into_response reports the failure
        if kind.status_code().is_server_error() {
            tracing::debug!(error = %err, "Storage failure detail");
        }

        let message = match kind {
            ApiErrorKind::ServiceUnavailable => "Service temporarily unavailable".to_string(),
            ApiErrorKind::InternalError => "An internal error occurred".to_string(),
            _ => err.message,
        };

        let validation = (kind == ApiErrorKind::ValidationFailed)
            .then(|| ValidationFailure::new(err.field_errors, Value::Null));

        Self {
            operation,
            kind,
            message,
            entity_type: err.entity_type,
            entity_id: err.entity_id,
            validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::json;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_api_error_kind_status_codes() {
        assert_eq!(ApiErrorKind::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiErrorKind::OperationNotAllowed.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiErrorKind::ValidationFailed.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ApiErrorKind::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiErrorKind::InternalError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiErrorKind::ServiceUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_api_error_kind_error_codes() {
        assert_eq!(ApiErrorKind::NotFound.error_code(), "NOT_FOUND");
        assert_eq!(ApiErrorKind::OperationNotAllowed.error_code(), "OPERATION_NOT_ALLOWED");
        assert_eq!(ApiErrorKind::ValidationFailed.error_code(), "VALIDATION_FAILED");
    }

    #[test]
    fn test_from_dao_error_maps_kinds() {
        let err = ApiError::from(DaoError::not_found(DaoOperation::Update, "User", 3));
        assert_eq!(err.kind, ApiErrorKind::NotFound);
        assert_eq!(err.operation, ApiOperation::Update);
        assert_eq!(err.entity_id.as_deref(), Some("3"));

        let err = ApiError::from(DaoError::operation_not_allowed("User", 3));
        assert_eq!(err.kind, ApiErrorKind::OperationNotAllowed);
        assert_eq!(err.operation, ApiOperation::Delete);

        let err = ApiError::from(DaoError::timeout(DaoOperation::Count, "slow"));
        assert_eq!(err.kind, ApiErrorKind::ServiceUnavailable);
        assert!(err.is_retriable());
    }

    #[test]
    fn test_from_dao_error_hides_internal_detail() {
        let err = ApiError::from(DaoError::database_error(
            DaoOperation::Save,
            "relation \"widgets\" does not exist",
        ));
        assert_eq!(err.kind, ApiErrorKind::InternalError);
        assert_eq!(err.message, "An internal error occurred");
    }

    #[tokio::test]
    async fn test_not_found_response_body() {
        let err = ApiError::not_found(ApiOperation::Read, "Widget", "Widget not found")
            .with_entity("Widget", "9");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(
            body,
            json!({
                "error": "Widget not found",
                "code": "NOT_FOUND",
                "status": 404,
                "operation": "read",
                "entity_type": "Widget",
                "entity_id": "9"
            })
        );
    }

    #[tokio::test]
    async fn test_validation_response_carries_errors_and_body() {
        let failure = ValidationFailure::new(
            vec![FieldError::new("name", "length", "too short")],
            json!({"name": ""}),
        );
        let response = ApiError::validation_failed(ApiOperation::Create, failure).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["code"], "VALIDATION_FAILED");
        assert_eq!(body["errors"][0]["field"], "name");
        assert_eq!(body["body"], json!({"name": ""}));
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::not_found(ApiOperation::Read, "User", "User not found")
            .with_entity("User", "5");
        assert_eq!(
            err.to_string(),
            "API not_found error during read: User not found [User: 5]"
        );
    }
}
