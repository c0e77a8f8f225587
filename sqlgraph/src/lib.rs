//! entgraph SQL Graph
//!
//! Turns store-ready node and edge specs into dialect-aware SQL:
//! - `spec`: field, edge, node, create/update/delete/query specs
//! - `predicate`: filter trees rendered into WHERE fragments
//! - `conflict`: ordered upsert options folded into one ON CONFLICT clause
//! - executors: `create_node`, `batch_create`, `update_node`, `update_nodes`,
//!   `delete_nodes`, `query_nodes`, `count_nodes`, `load_edges`
//!
//! Driver errors are classified here, once, into the `SqlGraphError`
//! taxonomy.

mod conflict;
mod create;
mod delete;
mod edges;
mod error;
mod predicate;
mod query;
mod spec;
mod tx;
mod update;

pub use conflict::*;
pub use create::*;
pub use delete::*;
pub use error::*;
pub use predicate::*;
pub use query::*;
pub use spec::*;
pub use tx::with_tx;
pub use update::*;
