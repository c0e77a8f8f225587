//! SQL graph error types.

use entgraph_core::{FieldType, Value, ValueError};
use entgraph_dialect::{ConstraintKind, DriverError};
use thiserror::Error;

/// Result type for graph operations.
pub type SqlGraphResult<T> = Result<T, SqlGraphError>;

/// A targeted row does not exist or does not match the scoping predicates.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("record not found in table {table}")]
pub struct NotFoundError {
    pub table: String,
    pub id: Option<Value>,
}

/// The store rejected a write because of an integrity constraint.
#[derive(Debug, Error)]
#[error("constraint failed: {message}")]
pub struct ConstraintError {
    pub message: String,
    pub kind: Option<ConstraintKind>,
    /// The store's original error, when the violation was reported by it.
    #[source]
    pub cause: Option<DriverError>,
}

impl ConstraintError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
            cause: None,
        }
    }
}

/// Errors that can occur while executing a spec.
#[derive(Debug, Error)]
pub enum SqlGraphError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Constraint(#[from] ConstraintError),

    #[error("type mismatch for column {column}: expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: FieldType,
        actual: &'static str,
    },

    #[error("scan column {column}: {source}")]
    Scan {
        column: String,
        #[source]
        source: ValueError,
    },

    #[error("statement returned no rows")]
    NoRows,

    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    #[error(transparent)]
    Driver(DriverError),
}

impl SqlGraphError {
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidSpec(message.into())
    }

    pub fn not_found(table: impl Into<String>, id: Option<Value>) -> Self {
        Self::NotFound(NotFoundError {
            table: table.into(),
            id,
        })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SqlGraphError::NotFound(_))
    }

    pub fn is_constraint(&self) -> bool {
        matches!(self, SqlGraphError::Constraint(_))
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, SqlGraphError::Driver(e) if e.is_canceled())
    }
}

impl From<DriverError> for SqlGraphError {
    fn from(err: DriverError) -> Self {
        match err.constraint_kind() {
            Some(kind) => SqlGraphError::Constraint(ConstraintError {
                message: err.to_string(),
                kind: Some(kind),
                cause: Some(err),
            }),
            None => SqlGraphError::Driver(err),
        }
    }
}
