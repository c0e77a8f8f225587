//! Mutation error types.

use crate::Op;
use entgraph_core::FieldType;
use entgraph_sqlgraph::SqlGraphError;
use std::sync::Arc;
use thiserror::Error;

/// Result type for mutation operations.
pub type MutationResult<T> = Result<T, MutationError>;

/// Errors raised while building or inspecting a mutation.
///
/// Cloneable so the memoized old-value load can hand the same failure to
/// every caller.
#[derive(Debug, Clone, Error)]
pub enum MutationError {
    #[error("unknown field {field} on type {type_name}")]
    UnknownField { type_name: String, field: String },

    #[error("unknown edge {edge} on type {type_name}")]
    UnknownEdge { type_name: String, edge: String },

    #[error("invalid type for field {field}: expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        actual: &'static str,
    },

    #[error("field {field} is not numeric")]
    NotNumeric { field: String },

    #[error("accumulated delta of field {field} overflows")]
    Overflow { field: String },

    #[error("field {field} on type {type_name} is not nullable")]
    NotNullable { type_name: String, field: String },

    #[error("old value of {field} is unavailable: {reason}")]
    OldValueUnavailable { field: String, reason: &'static str },

    #[error("operation {op} is not allowed: {reason}")]
    OpNotAllowed { op: Op, reason: &'static str },

    #[error("mutation is not bound to a driver")]
    NoDriver,

    #[error(transparent)]
    Store(Arc<SqlGraphError>),
}

impl MutationError {
    pub fn unknown_field(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            type_name: type_name.into(),
            field: field.into(),
        }
    }

    pub fn unknown_edge(type_name: impl Into<String>, edge: impl Into<String>) -> Self {
        Self::UnknownEdge {
            type_name: type_name.into(),
            edge: edge.into(),
        }
    }

    pub fn type_mismatch(field: impl Into<String>, expected: FieldType, actual: &'static str) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected,
            actual,
        }
    }

    pub fn not_numeric(field: impl Into<String>) -> Self {
        Self::NotNumeric {
            field: field.into(),
        }
    }

    pub fn overflow(field: impl Into<String>) -> Self {
        Self::Overflow {
            field: field.into(),
        }
    }

    pub fn not_nullable(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::NotNullable {
            type_name: type_name.into(),
            field: field.into(),
        }
    }

    pub fn old_value_unavailable(field: impl Into<String>, reason: &'static str) -> Self {
        Self::OldValueUnavailable {
            field: field.into(),
            reason,
        }
    }

    pub fn op_not_allowed(op: Op, reason: &'static str) -> Self {
        Self::OpNotAllowed { op, reason }
    }

    /// The store error behind this failure, if any.
    pub fn store_error(&self) -> Option<&SqlGraphError> {
        match self {
            MutationError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SqlGraphError> for MutationError {
    fn from(e: SqlGraphError) -> Self {
        Self::Store(Arc::new(e))
    }
}
