//! Compiler error types.

use entgraph_mutation::{MutationError, Op};
use entgraph_sqlgraph::SqlGraphError;
use thiserror::Error;

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Input rejected before any statement is sent: a missing required field
/// or edge, or a value refused by a validator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    /// Field or edge name the error refers to.
    pub name: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn missing_field(type_name: &str, field: &str) -> Self {
        Self::new(field, format!("missing required field \"{type_name}.{field}\""))
    }

    pub fn missing_edge(type_name: &str, edge: &str) -> Self {
        Self::new(edge, format!("missing required edge \"{type_name}.{edge}\""))
    }

    pub fn validator(type_name: &str, field: &str, reason: &str) -> Self {
        Self::new(
            field,
            format!("validator failed for field \"{type_name}.{field}\": {reason}"),
        )
    }
}

/// Errors that can occur during compilation.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("cannot compile {actual} mutation as {expected}")]
    OpMismatch { expected: Op, actual: Op },

    #[error(transparent)]
    Mutation(#[from] MutationError),

    /// A value does not fit its column.
    #[error(transparent)]
    Spec(#[from] SqlGraphError),
}

impl CompileError {
    pub fn op_mismatch(expected: Op, actual: Op) -> Self {
        Self::OpMismatch { expected, actual }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CompileError::Validation(_))
    }
}
