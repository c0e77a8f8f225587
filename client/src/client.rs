//! The client: a driver, a schema and the hooks wrapping every mutation.

use crate::hook::{Hook, Mutator, Registry};
use crate::{
    Create, CreateBulk, Delete, DeleteOne, Entity, Error, Query, Result, Tx, Update, UpdateOne,
};
use entgraph_core::{Context, Value};
use entgraph_dialect::{DebugDriver, Driver};
use entgraph_mutation::{Mutation, Op};
use entgraph_schema::{EntityDef, Schema};
use entgraph_sqlgraph::Predicate;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// Client options.
#[derive(Clone, Default)]
pub struct Options {
    /// Log every statement through `tracing`.
    pub debug: bool,
    /// Global hooks, outermost first.
    pub hooks: Vec<Hook>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn hook(mut self, hook: Hook) -> Self {
        self.hooks.push(hook);
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("debug", &self.debug)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// Builder for a `Client`.
pub struct ClientBuilder {
    driver: Arc<dyn Driver>,
    schema: Arc<Schema>,
    options: Options,
}

impl ClientBuilder {
    pub fn new(driver: Arc<dyn Driver>, schema: Arc<Schema>) -> Self {
        Self {
            driver,
            schema,
            options: Options::default(),
        }
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.options.debug = debug;
        self
    }

    pub fn hook(mut self, hook: Hook) -> Self {
        self.options.hooks.push(hook);
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Client {
        let driver = if self.options.debug {
            Arc::new(DebugDriver::new(self.driver)) as Arc<dyn Driver>
        } else {
            self.driver
        };
        let hooks = Registry::default();
        for hook in self.options.hooks {
            hooks.register(None, hook);
        }
        Client {
            driver,
            schema: self.schema,
            hooks,
        }
    }
}

/// Entry point for queries and mutations.
///
/// Cloning is cheap; clones share the driver and the hook registry. A client
/// returned by `Tx::client` routes every statement through the transaction.
#[derive(Clone)]
pub struct Client {
    pub(crate) driver: Arc<dyn Driver>,
    pub(crate) schema: Arc<Schema>,
    pub(crate) hooks: Registry,
}

impl Client {
    pub fn new(driver: Arc<dyn Driver>, schema: Arc<Schema>) -> Self {
        ClientBuilder::new(driver, schema).build()
    }

    pub fn builder(driver: Arc<dyn Driver>, schema: Arc<Schema>) -> ClientBuilder {
        ClientBuilder::new(driver, schema)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// A client sharing this one's hooks whose statements are logged.
    pub fn debug(&self) -> Client {
        Client {
            driver: Arc::new(DebugDriver::new(Arc::clone(&self.driver))),
            ..self.clone()
        }
    }

    /// Register a hook for every entity type.
    pub fn use_hook(&self, hook: Hook) {
        self.hooks.register(None, hook);
    }

    /// Register a hook for one entity type.
    pub fn use_hook_for(&self, type_name: impl Into<String>, hook: Hook) {
        self.hooks.register(Some(type_name.into()), hook);
    }

    pub(crate) fn entity(&self, type_name: &str) -> Result<&Arc<EntityDef>> {
        self.schema
            .entity(type_name)
            .ok_or_else(|| Error::unknown_type(type_name))
    }

    pub(crate) fn mutation(&self, op: Op, type_name: &str) -> Result<Mutation> {
        Mutation::new(op, Arc::clone(&self.schema), type_name)
            .map(|m| m.with_driver(Arc::clone(&self.driver)))
            .ok_or_else(|| Error::unknown_type(type_name))
    }

    pub(crate) fn chain(&self, type_name: &str, terminal: Arc<dyn Mutator>) -> Arc<dyn Mutator> {
        self.hooks.chain(type_name, terminal)
    }

    /// Client bound to another driver, sharing schema and hooks.
    pub(crate) fn with_driver(&self, driver: Arc<dyn Driver>) -> Client {
        Client {
            driver,
            ..self.clone()
        }
    }

    pub fn create(&self, type_name: &str) -> Result<Create> {
        Ok(Create::new(self.clone(), self.mutation(Op::CREATE, type_name)?))
    }

    pub fn create_bulk(&self, builders: impl IntoIterator<Item = Create>) -> CreateBulk {
        CreateBulk::new(self.clone(), builders.into_iter().collect())
    }

    pub fn update(&self, type_name: &str) -> Result<Update> {
        Ok(Update::new(self.clone(), self.mutation(Op::UPDATE, type_name)?))
    }

    pub fn update_one_id(&self, type_name: &str, id: impl Into<Value>) -> Result<UpdateOne> {
        let mut m = self.mutation(Op::UPDATE_ONE, type_name)?;
        m.set_id(id);
        Ok(UpdateOne::new(self.clone(), m))
    }

    pub fn update_one(&self, entity: &Entity) -> Result<UpdateOne> {
        self.update_one_id(entity.type_name(), entity.id())
    }

    /// UpdateOne whose target is the single entity matching `predicate`.
    pub fn update_one_where(&self, type_name: &str, predicate: Predicate) -> Result<UpdateOne> {
        let mut m = self.mutation(Op::UPDATE_ONE, type_name)?;
        m.where_(predicate);
        Ok(UpdateOne::new(self.clone(), m))
    }

    pub fn delete(&self, type_name: &str) -> Result<Delete> {
        Ok(Delete::new(self.clone(), self.mutation(Op::DELETE, type_name)?))
    }

    pub fn delete_one_id(&self, type_name: &str, id: impl Into<Value>) -> Result<DeleteOne> {
        let mut m = self.mutation(Op::DELETE_ONE, type_name)?;
        m.set_id(id);
        Ok(DeleteOne::new(self.clone(), m))
    }

    pub fn delete_one(&self, entity: &Entity) -> Result<DeleteOne> {
        self.delete_one_id(entity.type_name(), entity.id())
    }

    pub fn query(&self, type_name: &str) -> Result<Query> {
        let entity = Arc::clone(self.entity(type_name)?);
        Ok(Query::new(self.clone(), entity))
    }

    /// The entity with the given id.
    #[instrument(level = "debug", skip(self, ctx, id), fields(id = %id))]
    pub fn get(&self, ctx: &Context, type_name: &str, id: Value) -> Result<Entity> {
        let query = self.query(type_name)?;
        let id_column = query.entity().id.column.clone();
        query.where_(Predicate::eq(id_column, id)).only(ctx)
    }

    /// Begin a transaction. Fails with `TxStarted` on a transactional client.
    #[instrument(level = "debug", skip_all)]
    pub fn tx(&self, ctx: &Context) -> Result<Tx> {
        if self.driver.in_tx() {
            return Err(Error::TxStarted);
        }
        let driver = self.driver.begin(ctx)?;
        Ok(Tx::new(self, driver))
    }

    /// Run `f` in a transaction: commit when it succeeds, roll back when it
    /// fails.
    pub fn with_tx<T, F>(&self, ctx: &Context, f: F) -> Result<T>
    where
        F: FnOnce(&Tx) -> Result<T>,
    {
        let tx = self.tx(ctx)?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => match tx.rollback() {
                Ok(()) => Err(err),
                Err(rollback) => Err(Error::Rollback {
                    source: Box::new(err),
                    rollback: Box::new(rollback),
                }),
            },
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("driver", &self.driver)
            .field("hooks", &self.hooks)
            .finish()
    }
}
