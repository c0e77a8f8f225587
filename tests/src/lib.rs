//! entgraph end-to-end test support.
//!
//! Every test opens its own in-memory SQLite database loaded with the
//! fixture schema: users with pets and bidirectional friendships.

pub mod fixture;

pub mod prelude {
    pub use crate::fixture::{init_tracing, mock_client, new_user, schema, Fixture, DDL};
    pub use entgraph_client::hook::{self, hook_fn};
    pub use entgraph_client::{
        Client, ConflictOption, Context, Entity, Error, Must, Mutation, Mutator, Op, Outcome,
        Predicate, Result, UpdateSet, Value,
    };
    pub use entgraph_dialect::mock::MockDriver;
}
