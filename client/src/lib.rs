//! entgraph Client
//!
//! The façade over the graph layers. A `Client` holds a driver, a schema
//! and the registered hooks, and hands out builders:
//!
//! - `Create` / `CreateBulk` (and their `Upsert*` forms after `on_conflict`)
//! - `Update` / `UpdateOne`
//! - `Delete` / `DeleteOne`
//! - `Query`, with eager loading of edges
//!
//! Every mutation runs through the hook chain (see `hook`) before reaching
//! the store. `Client::tx` opens a transaction whose client, and every
//! entity it returns, route statements through that transaction.
//!
//! # Module Structure
//!
//! - `client` - `Client`, `ClientBuilder` and `Options`
//! - `hook` - `Mutator`, `Hook` and the hook combinators
//! - `tx` - Transactions
//! - `entity` - Entities returned by builders and queries
//! - `error` - The public error taxonomy and `Must`

mod client;
mod create;
mod delete;
mod entity;
mod error;
pub mod hook;
mod outcome;
mod query;
mod tx;
mod update;

pub use client::{Client, ClientBuilder, Options};
pub use create::{Create, CreateBulk, UpsertBulk, UpsertOne};
pub use delete::{Delete, DeleteOne};
pub use entity::Entity;
pub use error::{Error, Must, Result};
pub use hook::{Hook, MutateFn, Mutator};
pub use outcome::Outcome;
pub use query::Query;
pub use tx::Tx;
pub use update::{Update, UpdateOne};

pub use entgraph_core::{Context, Value};
pub use entgraph_mutation::{Mutation, Op};
pub use entgraph_sqlgraph::{ConflictOption, Predicate, UpdateSet};
