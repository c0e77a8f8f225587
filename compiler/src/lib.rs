//! entgraph Compiler
//!
//! Turn a validated `Mutation` into a store-ready spec.
//!
//! Responsibilities:
//! - Apply create and update defaults
//! - Validate required fields and edges, field validators and immutability
//!   before any statement is issued
//! - Write owned foreign keys as columns of the node's row
//! - Schedule every other edge write after the node write
//!
//! Compilation is a pure function of the mutation: sibling mutations of a
//! bulk create compile independently.

mod compiler;
mod error;
mod validate;

pub use compiler::{
    apply_defaults, compile_batch, compile_create, compile_delete, compile_update,
    compile_update_one,
};
pub use error::{CompileError, CompileResult, ValidationError};
