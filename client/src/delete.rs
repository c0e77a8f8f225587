//! Delete builders.

use crate::hook::mutate_fn;
use crate::{Client, Error, Outcome, Result};
use entgraph_compiler::compile_delete;
use entgraph_core::Context;
use entgraph_mutation::Mutation;
use entgraph_sqlgraph::{delete_nodes, Predicate};
use std::sync::Arc;
use tracing::instrument;

/// Builder for the deletion of every entity matching its predicates.
pub struct Delete {
    client: Client,
    mutation: Mutation,
}

impl Delete {
    pub(crate) fn new(client: Client, mutation: Mutation) -> Self {
        Self { client, mutation }
    }

    pub fn mutation(&self) -> &Mutation {
        &self.mutation
    }

    pub fn where_(mut self, predicate: Predicate) -> Self {
        self.mutation.where_(predicate);
        self
    }

    /// Delete and return the number of deleted entities.
    #[instrument(level = "debug", skip_all, fields(entity = %self.mutation.type_name()))]
    pub fn exec(mut self, ctx: &Context) -> Result<usize> {
        let driver = Arc::clone(&self.client.driver);
        let terminal = mutate_fn(move |ctx, m| {
            let spec = compile_delete(m)?;
            let n = delete_nodes(ctx, driver.as_ref(), spec)?;
            m.set_done();
            Ok(Outcome::Affected(n))
        });
        self.client
            .chain(self.mutation.type_name(), terminal)
            .mutate(ctx, &mut self.mutation)?
            .into_affected()
    }
}

/// Builder for the deletion of one entity.
pub struct DeleteOne {
    delete: Delete,
}

impl DeleteOne {
    pub(crate) fn new(client: Client, mutation: Mutation) -> Self {
        Self {
            delete: Delete::new(client, mutation),
        }
    }

    pub fn mutation(&self) -> &Mutation {
        &self.delete.mutation
    }

    pub fn where_(self, predicate: Predicate) -> Self {
        Self {
            delete: self.delete.where_(predicate),
        }
    }

    /// Delete the entity. Fails with `NotFound` when nothing was deleted.
    pub fn exec(self, ctx: &Context) -> Result<()> {
        let entity = Arc::clone(self.delete.mutation.entity());
        let id = self.delete.mutation.id().cloned();
        match self.delete.exec(ctx)? {
            0 => Err(Error::not_found(entity.table.clone(), id)),
            _ => Ok(()),
        }
    }
}
