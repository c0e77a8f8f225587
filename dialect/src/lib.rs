//! entgraph Dialect
//!
//! The boundary between the graph layers and a relational store:
//! - `Driver`/`TxDriver`: exec/query primitives and transaction handles
//! - `Dialect` and `sql::Builder`: identifier quoting and placeholders
//! - `SqliteDriver`: the reference driver, backed by rusqlite
//! - `DebugDriver`: logs every statement through `tracing`
//! - `mock::MockDriver`: scripted results for tests

mod debug;
mod dialect;
mod driver;
mod error;
pub mod mock;
pub mod sql;
mod sqlite;

pub use debug::*;
pub use dialect::*;
pub use driver::*;
pub use error::*;
pub use sqlite::*;
