//! Update builders.

use crate::hook::mutate_fn;
use crate::{Client, Entity, Error, Outcome, Result};
use entgraph_compiler::{apply_defaults, compile_update, compile_update_one};
use entgraph_core::{Context, Value};
use entgraph_mutation::Mutation;
use entgraph_sqlgraph::{update_node, update_nodes, Predicate};
use std::sync::Arc;
use tracing::instrument;

macro_rules! field_writers {
    () => {
        pub fn mutation(&self) -> &Mutation {
            &self.mutation
        }

        pub fn mutation_mut(&mut self) -> &mut Mutation {
            &mut self.mutation
        }

        fn record_err(&mut self, result: std::result::Result<(), impl Into<Error>>) {
            if let Err(err) = result {
                self.err.get_or_insert(err.into());
            }
        }

        pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
            let result = self.mutation.set_field(field, value);
            self.record_err(result);
            self
        }

        pub fn set_opt<V: Into<Value>>(self, field: &str, value: Option<V>) -> Self {
            match value {
                Some(v) => self.set(field, v),
                None => self,
            }
        }

        /// Add `delta` to the stored value of a numeric field.
        pub fn add(mut self, field: &str, delta: impl Into<Value>) -> Self {
            let result = self.mutation.add_field(field, delta);
            self.record_err(result);
            self
        }

        pub fn clear(mut self, field: &str) -> Self {
            let result = self.mutation.clear_field(field);
            self.record_err(result);
            self
        }

        pub fn set_edge_id(mut self, edge: &str, id: impl Into<Value>) -> Self {
            let result = self.mutation.set_edge_id(edge, id);
            self.record_err(result);
            self
        }

        pub fn add_edge_ids<I, V>(mut self, edge: &str, ids: I) -> Self
        where
            I: IntoIterator<Item = V>,
            V: Into<Value>,
        {
            let result = self.mutation.add_edge_ids(edge, ids);
            self.record_err(result);
            self
        }

        pub fn remove_edge_ids<I, V>(mut self, edge: &str, ids: I) -> Self
        where
            I: IntoIterator<Item = V>,
            V: Into<Value>,
        {
            let result = self.mutation.remove_edge_ids(edge, ids);
            self.record_err(result);
            self
        }

        pub fn clear_edge(mut self, edge: &str) -> Self {
            let result = self.mutation.clear_edge(edge);
            self.record_err(result);
            self
        }

        pub fn where_(mut self, predicate: Predicate) -> Self {
            self.mutation.where_(predicate);
            self
        }
    };
}

/// Builder for the update of every entity matching its predicates.
pub struct Update {
    client: Client,
    mutation: Mutation,
    err: Option<Error>,
}

impl Update {
    pub(crate) fn new(client: Client, mutation: Mutation) -> Self {
        Self {
            client,
            mutation,
            err: None,
        }
    }

    field_writers!();

    /// Apply the update and return the number of matched entities.
    #[instrument(level = "debug", skip_all, fields(entity = %self.mutation.type_name()))]
    pub fn save(mut self, ctx: &Context) -> Result<usize> {
        if let Some(err) = self.err {
            return Err(err);
        }
        apply_defaults(&mut self.mutation)?;
        let driver = Arc::clone(&self.client.driver);
        let terminal = mutate_fn(move |ctx, m| {
            let spec = compile_update(m)?;
            let n = update_nodes(ctx, driver.as_ref(), spec)?;
            m.set_done();
            Ok(Outcome::Affected(n))
        });
        self.client
            .chain(self.mutation.type_name(), terminal)
            .mutate(ctx, &mut self.mutation)?
            .into_affected()
    }

    pub fn exec(self, ctx: &Context) -> Result<()> {
        self.save(ctx).map(|_| ())
    }
}

/// Builder for the update of one entity.
pub struct UpdateOne {
    client: Client,
    mutation: Mutation,
    select: Vec<String>,
    err: Option<Error>,
}

impl UpdateOne {
    pub(crate) fn new(client: Client, mutation: Mutation) -> Self {
        Self {
            client,
            mutation,
            select: Vec::new(),
            err: None,
        }
    }

    field_writers!();

    /// Read back only these fields (and the id).
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.select.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    /// Apply the update and return the entity as stored afterwards.
    ///
    /// Without an id the target is resolved from the predicates, which must
    /// match exactly one entity. No match is `NotFound`, never a no-op.
    #[instrument(level = "debug", skip_all, fields(entity = %self.mutation.type_name()))]
    pub fn save(mut self, ctx: &Context) -> Result<Entity> {
        if let Some(err) = self.err {
            return Err(err);
        }
        apply_defaults(&mut self.mutation)?;
        let client = self.client;
        let def = Arc::clone(self.mutation.entity());
        let driver = Arc::clone(&client.driver);
        let select = self.select;
        let terminal = mutate_fn(move |ctx, m| {
            if m.id().is_none() {
                let id = resolve_one(ctx, m)?;
                m.set_id(id);
            }
            let select: Vec<&str> = select.iter().map(String::as_str).collect();
            let spec = compile_update_one(m, &select)?;
            let record = update_node(ctx, driver.as_ref(), spec)?;
            m.set_done();
            Ok(Outcome::Updated(record))
        });
        let record = client
            .chain(&def.name, terminal)
            .mutate(ctx, &mut self.mutation)?
            .into_updated()?;
        Ok(Entity::new(client, def, record))
    }

    pub fn exec(self, ctx: &Context) -> Result<()> {
        self.save(ctx).map(|_| ())
    }
}

// The single id matched by the predicates of an id-less UpdateOne.
fn resolve_one(ctx: &Context, m: &Mutation) -> Result<Value> {
    let mut ids = m.ids(ctx)?;
    match ids.len() {
        0 => Err(Error::not_found(m.entity().table.clone(), None)),
        1 => Ok(ids.remove(0)),
        _ => Err(Error::not_singular(m.type_name())),
    }
}
