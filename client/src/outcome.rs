//! Values returned through the hook chain.

use crate::{Error, Result};
use entgraph_core::Record;

/// What a mutator produced for one mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The row written by a create, id included.
    Created(Record),
    /// The row read back after an update of one node.
    Updated(Record),
    /// Number of rows touched by a bulk update or a delete.
    Affected(usize),
}

impl Outcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Created(_) => "created",
            Outcome::Updated(_) => "updated",
            Outcome::Affected(_) => "affected",
        }
    }

    pub(crate) fn into_created(self) -> Result<Record> {
        match self {
            Outcome::Created(record) => Ok(record),
            other => Err(Error::unexpected_outcome("created", other.kind())),
        }
    }

    pub(crate) fn into_updated(self) -> Result<Record> {
        match self {
            Outcome::Updated(record) => Ok(record),
            other => Err(Error::unexpected_outcome("updated", other.kind())),
        }
    }

    pub(crate) fn into_affected(self) -> Result<usize> {
        match self {
            Outcome::Affected(n) => Ok(n),
            other => Err(Error::unexpected_outcome("affected", other.kind())),
        }
    }
}
