//! Unified error handling for the application.
//!
//! Covers:
//! 1. Control flow errors (Result-based)
//! 2. HTTP responses with structured context
//! 3. Domain-specific error types (avoiding one catch-all)
//! 4. Structured error logging with request context

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

// ============================================================================
// DOMAIN-SPECIFIC ERROR TYPES
// ============================================================================

/// Validation errors for input data
#[derive(Debug, Clone)]
pub enum ValidationError {
    EmptyField(String),
    TooShort(String, usize),
    TooLong(String, usize),
    InvalidFormat(String),
    SuspiciousContent(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(msg) => write!(f, "{}", msg),
            ValidationError::SuspiciousContent(field) => {
                write!(f, "{} contains suspicious content", field)
            }
        }
    }
}

impl StdError for ValidationError {}

/// Database operation errors
#[derive(Debug)]
pub enum DatabaseError {
    UniqueConstraintViolation(String),
    NotFound(String),
    QueryExecution(String),
    ConnectionPool(String),
    UnexpectedError(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::UniqueConstraintViolation(msg) => {
                write!(f, "Duplicate entry: {}", msg)
            }
            DatabaseError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DatabaseError::QueryExecution(msg) => write!(f, "Query error: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
            DatabaseError::UnexpectedError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Authentication and session errors.
///
/// Every variant maps to HTTP 401 at the boundary; the response never reveals
/// which specific check rejected the request beyond a generic message.
#[derive(Debug)]
pub enum AuthError {
    /// No token was supplied at all.
    AuthenticationRequired,
    /// Wrong password at login.
    InvalidCredentials,
    /// Signature or expiry verification failed.
    InvalidToken,
    /// Structurally valid refresh token that no longer matches the stored
    /// value: the token was rotated away or cleared at logout.
    TokenReuseDetected,
    /// The identity claim points at a user that no longer exists.
    UserNotFound,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::AuthenticationRequired => write!(f, "Unauthorized request"),
            AuthError::InvalidCredentials => write!(f, "Invalid password"),
            AuthError::InvalidToken => write!(f, "Invalid or expired token"),
            AuthError::TokenReuseDetected => write!(f, "Refresh token is expired or used"),
            AuthError::UserNotFound => write!(f, "Invalid token: user not found"),
        }
    }
}

impl StdError for AuthError {}

// ============================================================================
// UNIFIED APPLICATION ERROR TYPE
// ============================================================================

/// Central error type that all application errors map to
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Database(DatabaseError),
    Auth(AuthError),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let error_msg = err.to_string();

        if error_msg.contains("duplicate key") || error_msg.contains("unique constraint") {
            AppError::Database(DatabaseError::UniqueConstraintViolation(
                "Username or email already registered".to_string(),
            ))
        } else if error_msg.contains("no rows") {
            AppError::Database(DatabaseError::NotFound("Record not found".to_string()))
        } else if error_msg.contains("pool") || error_msg.contains("connect") {
            AppError::Database(DatabaseError::ConnectionPool(error_msg))
        } else {
            AppError::Database(DatabaseError::UnexpectedError(error_msg))
        }
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

// ============================================================================
// HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for tracking (request ID or trace ID)
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Timestamp when error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = match self {
            // Validation errors -> 400 Bad Request
            AppError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR".to_string(),
                e.to_string(),
            ),

            // Database errors -> appropriate HTTP status
            AppError::Database(e) => match e {
                DatabaseError::UniqueConstraintViolation(_) => (
                    StatusCode::CONFLICT,
                    "DUPLICATE_ENTRY".to_string(),
                    e.to_string(),
                ),
                DatabaseError::NotFound(_) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND".to_string(),
                    e.to_string(),
                ),
                DatabaseError::ConnectionPool(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE".to_string(),
                    "Database service temporarily unavailable".to_string(),
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR".to_string(),
                    "Database error occurred".to_string(),
                ),
            },

            // Authentication errors -> 401 Unauthorized, all of them
            AppError::Auth(e) => {
                let code = match e {
                    AuthError::AuthenticationRequired => "UNAUTHORIZED",
                    AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
                    AuthError::InvalidToken | AuthError::UserNotFound => "TOKEN_INVALID",
                    AuthError::TokenReuseDetected => "TOKEN_EXPIRED_OR_USED",
                };
                (StatusCode::UNAUTHORIZED, code.to_string(), e.to_string())
            }

            // Internal errors -> 500 Internal Server Error
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR".to_string(),
                "Internal server error".to_string(),
            ),
        };

        let error_response =
            ErrorResponse::new(request_id.to_string(), message, code, status.as_u16());

        (status, error_response)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(
                    request_id = request_id,
                    error = %e,
                    "Validation error"
                );
            }
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => {
                tracing::warn!(
                    request_id = request_id,
                    error = %self,
                    "Duplicate entry attempt"
                );
            }
            AppError::Database(e) => {
                tracing::error!(
                    request_id = request_id,
                    error = %e,
                    "Database error"
                );
            }
            AppError::Auth(e) => {
                tracing::warn!(
                    request_id = request_id,
                    error = %e,
                    "Authentication error"
                );
            }
            AppError::Internal(msg) => {
                tracing::error!(
                    request_id = request_id,
                    error = %msg,
                    "Internal error"
                );
            }
        }
    }
}

/// Implement ResponseError for Actix-web integration
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, error_response) = <Self as ErrorHandler>::error_response(self, &request_id);

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(e) => match e {
                DatabaseError::UniqueConstraintViolation(_) => StatusCode::CONFLICT,
                DatabaseError::NotFound(_) => StatusCode::NOT_FOUND,
                DatabaseError::ConnectionPool(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// ============================================================================
// ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Error context for enhanced logging and debugging
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<String>,
    pub operation: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation: operation.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn log_error(&self, error: &AppError) {
        let context = serde_json::json!({
            "request_id": self.request_id,
            "operation": self.operation,
            "user_id": self.user_id,
            "timestamp": self.timestamp.to_rfc3339(),
        });

        match error {
            AppError::Validation(_) | AppError::Auth(_) => {
                tracing::warn!(
                    error = %error,
                    context = ?context,
                    "Request rejected"
                );
            }
            AppError::Database(_) | AppError::Internal(_) => {
                tracing::error!(
                    error = %error,
                    context = ?context,
                    "Request failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::EmptyField("email".to_string());
        assert_eq!(err.to_string(), "email is empty");
    }

    #[test]
    fn test_app_error_conversion() {
        let val_err = ValidationError::InvalidFormat("test".to_string());
        let app_err: AppError = val_err.into();
        match app_err {
            AppError::Validation(_) => (),
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn test_all_auth_errors_map_to_401() {
        let variants = vec![
            AuthError::AuthenticationRequired,
            AuthError::InvalidCredentials,
            AuthError::InvalidToken,
            AuthError::TokenReuseDetected,
            AuthError::UserNotFound,
        ];

        for variant in variants {
            let err = AppError::Auth(variant);
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_reuse_detection_message() {
        let err = AuthError::TokenReuseDetected;
        assert_eq!(err.to_string(), "Refresh token is expired or used");
    }

    #[test]
    fn test_error_response_creation() {
        let request_id = "test-123".to_string();
        let response = ErrorResponse::new(
            request_id.clone(),
            "Test error".to_string(),
            "TEST_ERROR".to_string(),
            400,
        );

        assert_eq!(response.error_id, request_id);
        assert_eq!(response.code, "TEST_ERROR");
        assert_eq!(response.status, 400);
    }

    #[test]
    fn test_error_context_creation() {
        let ctx = ErrorContext::new("token_refresh");
        assert_eq!(ctx.operation, "token_refresh");
        assert!(ctx.user_id.is_none());

        let ctx_with_user = ctx.with_user_id("user-123".to_string());
        assert_eq!(ctx_with_user.user_id, Some("user-123".to_string()));
    }
}
