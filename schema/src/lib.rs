//! entgraph Schema
//!
//! The schema is the static metadata every other layer consumes: per-entity
//! ordered fields, edges (relation kind, owning side, FK or join-table
//! naming), indexes with dialect-specific options, and field validators.
//! It is assembled once through `SchemaBuilder` and is immutable afterwards.

mod annotation;
mod builder;
mod schema;
mod types;
mod validate;

pub use annotation::*;
pub use builder::*;
pub use schema::*;
pub use types::*;
