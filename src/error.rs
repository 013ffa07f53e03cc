//! Error types for search compilation.
//!
//! Every error this crate produces is detected synchronously while compiling
//! a search request into a query plan. Compilation is deterministic, so none
//! of these errors are retryable: retrying reproduces the identical failure.
//! There is no partial success either: a complete plan is produced, or
//! compilation fails before anything reaches the execution layer.
//!
//! Error codes follow a pattern: S{category}{number}
//! - 1xxx: filter compilation errors (operator, operand, field path)
//! - 2xxx: pagination errors (cursor decoding)
//!
//! ```rust
//! use prax_search::{ErrorCode, QueryError};
//!
//! let err = QueryError::unsupported_operator("~=");
//! assert_eq!(err.code, ErrorCode::UnsupportedOperator);
//! assert_eq!(err.code.code(), "S1001");
//! assert!(err.is_client_error());
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for search compilation.
pub type QueryResult<T> = Result<T, QueryError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Operator not in the supported set (S1001).
    UnsupportedOperator = 1001,
    /// Operand shape does not match the operator's arity (S1002).
    OperandArityMismatch = 1002,
    /// Field path has more than one relation segment or an empty segment (S1003).
    InvalidRelationPath = 1003,
    /// Cursor token failed to decode (S2001).
    MalformedCursor = 2001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "S1001").
    pub fn code(&self) -> String {
        format!("S{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::UnsupportedOperator => "Unsupported filter operator",
            Self::OperandArityMismatch => "Operand does not match operator arity",
            Self::InvalidRelationPath => "Invalid relation path",
            Self::MalformedCursor => "Malformed cursor token",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors that can occur while compiling a search request.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// The field or token that triggered the error, when known.
    pub field: Option<String>,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            source: None,
        }
    }

    /// Set the offending field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Create an unsupported-operator error.
    pub fn unsupported_operator(token: impl Into<String>) -> Self {
        let token = token.into();
        Self::new(
            ErrorCode::UnsupportedOperator,
            format!("Operator `{}` is not supported", token),
        )
        .with_field(token)
    }

    /// Create an operand-arity error.
    pub fn operand_arity(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(
            ErrorCode::OperandArityMismatch,
            format!("Invalid operand for `{}`: {}", field, message.into()),
        )
        .with_field(field)
    }

    /// Create an invalid-relation-path error.
    pub fn invalid_relation_path(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(
            ErrorCode::InvalidRelationPath,
            format!("Field `{}` is not a valid column or relation.column path", field),
        )
        .with_field(field)
    }

    /// Create a malformed-cursor error.
    pub fn malformed_cursor(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::MalformedCursor,
            format!("Cursor token failed to decode: {}", message.into()),
        )
    }

    /// Check if this is a cursor decoding error.
    pub fn is_malformed_cursor(&self) -> bool {
        self.code == ErrorCode::MalformedCursor
    }

    /// Check if this error was caused by client input.
    ///
    /// All compilation errors are; the distinction exists so callers mapping
    /// errors to transport status codes can do it in one place.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::UnsupportedOperator
                | ErrorCode::OperandArityMismatch
                | ErrorCode::InvalidRelationPath
                | ErrorCode::MalformedCursor
        )
    }
}
