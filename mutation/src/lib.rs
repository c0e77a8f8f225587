//! entgraph Mutation
//!
//! The entity-agnostic mutation: a name-indexed diff of one pending create,
//! update or delete that hooks can inspect without knowing the entity type.
//!
//! Responsibilities:
//! - Track new values, numeric deltas and cleared fields (last writer wins)
//! - Track added/removed/cleared edge ids
//! - Resolve target ids for Update/Delete with one query
//! - Load old values of an UpdateOne target once, on demand
//!
//! # Module Structure
//!
//! - `mutation` - The `Mutation` type
//! - `op` - Operation kinds
//! - `mapping` - Schema metadata mapped onto store specs
//! - `error` - Error types for mutation failures

mod error;
pub mod mapping;
mod mutation;
mod op;

pub use error::{MutationError, MutationResult};
pub use mutation::{Mutation, OldLoader};
pub use op::Op;
