//! Client error types.

use entgraph_compiler::{CompileError, ValidationError};
use entgraph_core::ContextError;
use entgraph_dialect::DriverError;
use entgraph_mutation::MutationError;
use entgraph_sqlgraph::{ConstraintError, NotFoundError, SqlGraphError};
use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by builders, queries and transactions.
#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before any statement was sent.
    #[error("entgraph: validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The store rejected a write.
    #[error("entgraph: {0}")]
    Constraint(#[from] ConstraintError),

    #[error("entgraph: {0}")]
    NotFound(#[from] NotFoundError),

    #[error("entgraph: {label} not singular")]
    NotSingular { label: String },

    /// An edge was read without being eager-loaded.
    #[error("entgraph: {edge} edge was not loaded")]
    NotLoaded { edge: String },

    #[error("entgraph: unknown entity type {name}")]
    UnknownType { name: String },

    #[error("entgraph: {0}")]
    Mutation(MutationError),

    /// The caller's context was canceled or its deadline passed.
    #[error("entgraph: {0}")]
    Canceled(#[from] ContextError),

    #[error("entgraph: driver: {0}")]
    Driver(DriverError),

    /// A spec the store layer could not execute or scan.
    #[error("entgraph: {0}")]
    Graph(SqlGraphError),

    #[error("entgraph: not a transactional entity")]
    NotTransactional,

    #[error("entgraph: cannot start a transaction within a transaction")]
    TxStarted,

    /// The operation failed and so did the rollback that followed.
    #[error("{source}: rolling back transaction: {rollback}")]
    Rollback {
        source: Box<Error>,
        rollback: Box<Error>,
    },

    /// A hook returned an outcome of the wrong kind.
    #[error("entgraph: unexpected mutation outcome: expected {expected}, got {actual}")]
    UnexpectedOutcome {
        expected: &'static str,
        actual: String,
    },
}

impl Error {
    pub fn validation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(ValidationError::new(name, message))
    }

    pub fn not_singular(label: impl Into<String>) -> Self {
        Self::NotSingular {
            label: label.into(),
        }
    }

    pub fn not_loaded(edge: impl Into<String>) -> Self {
        Self::NotLoaded { edge: edge.into() }
    }

    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::UnknownType { name: name.into() }
    }

    pub fn not_found(table: impl Into<String>, id: Option<entgraph_core::Value>) -> Self {
        Self::NotFound(NotFoundError {
            table: table.into(),
            id,
        })
    }

    pub fn unexpected_outcome(expected: &'static str, actual: impl Into<String>) -> Self {
        Self::UnexpectedOutcome {
            expected,
            actual: actual.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_not_singular(&self) -> bool {
        matches!(self, Error::NotSingular { .. })
    }

    pub fn is_not_loaded(&self) -> bool {
        matches!(self, Error::NotLoaded { .. })
    }

    pub fn is_constraint(&self) -> bool {
        matches!(self, Error::Constraint(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::Canceled(_))
    }
}

impl From<SqlGraphError> for Error {
    fn from(err: SqlGraphError) -> Self {
        match err {
            SqlGraphError::NotFound(e) => Error::NotFound(e),
            SqlGraphError::Constraint(e) => Error::Constraint(e),
            SqlGraphError::Driver(e) => e.into(),
            other => Error::Graph(other),
        }
    }
}

impl From<DriverError> for Error {
    fn from(err: DriverError) -> Self {
        match err.context_error() {
            Some(ctx) => Error::Canceled(ctx),
            None => Error::Driver(err),
        }
    }
}

impl From<MutationError> for Error {
    fn from(err: MutationError) -> Self {
        let store = err.store_error();
        if let Some(SqlGraphError::Driver(driver)) = store {
            if let Some(ctx) = driver.context_error() {
                return Error::Canceled(ctx);
            }
        }
        if let Some(SqlGraphError::NotFound(e)) = store {
            return Error::NotFound(e.clone());
        }
        Error::Mutation(err)
    }
}

impl From<CompileError> for Error {
    fn from(err: CompileError) -> Self {
        match err {
            CompileError::Validation(e) => Error::Validation(e),
            CompileError::Mutation(e) => e.into(),
            CompileError::Spec(e) => e.into(),
            other @ CompileError::OpMismatch { .. } => Error::unexpected_outcome(
                "a mutation matching its builder",
                other.to_string(),
            ),
        }
    }
}

/// Unwrap a result or abort the current operation.
///
/// The panicking counterpart of every fallible terminal call:
/// `client.create("User")?.set("name", "a8m").save(&ctx).must()`.
pub trait Must<T> {
    fn must(self) -> T;
}

impl<T> Must<T> for Result<T> {
    #[track_caller]
    fn must(self) -> T {
        match self {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}
