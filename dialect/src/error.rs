//! Driver error types.

use entgraph_core::ContextError;
use thiserror::Error;

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors reported by a store driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The caller's context was canceled or timed out before the call.
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Error reported by a store without a dedicated variant.
    #[error("{0}")]
    Store(String),

    #[error("transaction has already been committed or rolled back")]
    TxDone,

    #[error("connection is held by an open transaction")]
    ConnBusy,

    #[error("cannot start a transaction within a transaction")]
    NestedTx,

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

/// The kind of integrity constraint a store rejected a write for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    Check,
    NotNull,
}

impl DriverError {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Classify a store error as a constraint violation. MySQL, Postgres and
    /// SQLite spell their violations differently; the message is checked
    /// against each.
    pub fn constraint_kind(&self) -> Option<ConstraintKind> {
        let message = match self {
            DriverError::Sqlite(rusqlite::Error::SqliteFailure(err, msg)) => {
                if err.code != rusqlite::ErrorCode::ConstraintViolation {
                    return None;
                }
                msg.clone().unwrap_or_else(|| err.to_string())
            }
            DriverError::Store(message) => message.clone(),
            _ => return None,
        };
        classify(&message)
    }

    pub fn is_constraint(&self) -> bool {
        self.constraint_kind().is_some()
    }

    /// Whether the error comes from the caller's context.
    pub fn is_canceled(&self) -> bool {
        matches!(self, DriverError::Context(_))
    }

    pub fn context_error(&self) -> Option<ContextError> {
        match self {
            DriverError::Context(e) => Some(*e),
            _ => None,
        }
    }
}

fn classify(message: &str) -> Option<ConstraintKind> {
    const PATTERNS: &[(&str, ConstraintKind)] = &[
        ("UNIQUE constraint failed", ConstraintKind::Unique),
        ("violates unique constraint", ConstraintKind::Unique),
        ("Error 1062", ConstraintKind::Unique),
        ("FOREIGN KEY constraint failed", ConstraintKind::ForeignKey),
        ("violates foreign key constraint", ConstraintKind::ForeignKey),
        ("Error 1451", ConstraintKind::ForeignKey),
        ("Error 1452", ConstraintKind::ForeignKey),
        ("CHECK constraint failed", ConstraintKind::Check),
        ("violates check constraint", ConstraintKind::Check),
        ("Error 3819", ConstraintKind::Check),
        ("NOT NULL constraint failed", ConstraintKind::NotNull),
        ("violates not-null constraint", ConstraintKind::NotNull),
        ("Error 1048", ConstraintKind::NotNull),
    ];
    PATTERNS
        .iter()
        .find(|(pattern, _)| message.contains(pattern))
        .map(|(_, kind)| *kind)
}
