//! entgraph Core Types
//!
//! This crate provides the foundational types shared by every entgraph layer:
//! - Values (the `Value` enum carried by fields, ids and query rows)
//! - Semantic field types (`FieldType`) and the store "scan" conversion
//! - Records (ordered column/value rows)
//! - The cancellation `Context` threaded through every store call

mod context;
mod value;

pub use context::*;
pub use value::*;
