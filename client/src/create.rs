//! Create builders, single and bulk, with their upsert variants.

use crate::hook::{mutate_fn, Mutator};
use crate::{Client, Entity, Error, Outcome, Result};
use entgraph_compiler::{apply_defaults, compile_create};
use entgraph_core::{Context, Record, Value};
use entgraph_mutation::mapping::node_spec;
use entgraph_mutation::Mutation;
use entgraph_schema::EntityDef;
use entgraph_sqlgraph::{
    batch_create, create_node, query_nodes, BatchCreateSpec, ConflictOption, CreateSpec, QuerySpec,
    UpdateSet,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{instrument, trace};

/// Builder for the creation of one entity.
pub struct Create {
    client: Client,
    mutation: Mutation,
    conflict: Vec<ConflictOption>,
    err: Option<Error>,
}

impl Create {
    pub(crate) fn new(client: Client, mutation: Mutation) -> Self {
        Self {
            client,
            mutation,
            conflict: Vec::new(),
            err: None,
        }
    }

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

    /// Set `field` when `value` is present.
    pub fn set_opt<V: Into<Value>>(self, field: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(field, v),
            None => self,
        }
    }

    pub fn set_id(mut self, id: impl Into<Value>) -> Self {
        self.mutation.set_id(id);
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

    /// Turn the create into an upsert resolved by `options`, in order.
    pub fn on_conflict(mut self, options: impl IntoIterator<Item = ConflictOption>) -> UpsertOne {
        self.conflict.extend(options);
        UpsertOne { create: self }
    }

    /// Upsert on a conflict over `fields`.
    pub fn on_conflict_columns(self, fields: &[&str]) -> UpsertOne {
        let columns = columns_of(self.mutation.entity(), fields);
        self.on_conflict([ConflictOption::Columns(columns)])
    }

    /// Insert the entity and return it, id included.
    pub fn save(self, ctx: &Context) -> Result<Entity> {
        self.insert(ctx, true)
    }

    pub fn exec(self, ctx: &Context) -> Result<()> {
        self.insert(ctx, false).map(|_| ())
    }

    // With `read_back`, an upsert returns the row as stored after conflict
    // resolution instead of the proposed values.
    #[instrument(level = "debug", skip_all, fields(entity = %self.mutation.type_name()))]
    fn insert(mut self, ctx: &Context, read_back: bool) -> Result<Entity> {
        if let Some(err) = self.err {
            return Err(err);
        }
        apply_defaults(&mut self.mutation)?;
        let client = self.client;
        let def = Arc::clone(self.mutation.entity());
        let driver = Arc::clone(&client.driver);
        let conflict = self.conflict;
        let terminal = mutate_fn(move |ctx, m| {
            let mut spec = compile_create(m)?;
            spec.on_conflict = conflict.clone();
            let mut record = created_record(m, &spec);
            let id = create_node(ctx, driver.as_ref(), spec)?;
            if read_back && !conflict.is_empty() {
                record = stored_record(ctx, driver.as_ref(), m, &id)?;
            } else {
                record.insert(m.entity().id.column.clone(), id.clone());
            }
            m.set_id(id);
            m.set_done();
            Ok(Outcome::Created(record))
        });
        let record = client
            .chain(&def.name, terminal)
            .mutate(ctx, &mut self.mutation)?
            .into_created()?;
        Ok(Entity::new(client, def, record))
    }
}

/// Create builder with registered conflict options.
pub struct UpsertOne {
    create: Create,
}

impl UpsertOne {
    fn push(mut self, option: ConflictOption) -> Self {
        self.create.conflict.push(option);
        self
    }

    /// Take the proposed value of every inserted column, except the id,
    /// immutable fields and owned edge columns, which keep their stored values.
    pub fn update_new_values(self) -> Self {
        let keep = kept_on_update(&self.create.mutation);
        self.push(ConflictOption::ResolveWithNewValues)
            .push(ConflictOption::resolve_with(move |s: &mut UpdateSet| {
                for column in &keep {
                    s.set_ignore(column.clone());
                }
            }))
    }

    /// Keep the stored row and return its id.
    pub fn ignore(self) -> Self {
        self.push(ConflictOption::ResolveWithIgnore)
    }

    pub fn do_nothing(self) -> Self {
        self.push(ConflictOption::DoNothing)
    }

    /// Resolve with a custom function over the update set.
    pub fn update(self, f: impl Fn(&mut UpdateSet) + Send + Sync + 'static) -> Self {
        self.push(ConflictOption::resolve_with(f))
    }

    /// On conflict, overwrite `field` with `value`.
    pub fn set(self, field: &str, value: impl Into<Value>) -> Self {
        let column = column_of(self.create.mutation.entity(), field);
        let value = value.into();
        self.update(move |s| {
            s.set(column.clone(), value.clone());
        })
    }

    /// On conflict, add `delta` to the stored value of `field`.
    pub fn add(self, field: &str, delta: impl Into<Value>) -> Self {
        let column = column_of(self.create.mutation.entity(), field);
        let delta = delta.into();
        self.update(move |s| {
            s.add(column.clone(), delta.clone());
        })
    }

    /// On conflict, set `field` to NULL.
    pub fn clear(self, field: &str) -> Self {
        let column = column_of(self.create.mutation.entity(), field);
        self.update(move |s| {
            s.set_null(column.clone());
        })
    }

    /// On conflict, take the proposed value of `field`.
    pub fn update_field(self, field: &str) -> Self {
        let column = column_of(self.create.mutation.entity(), field);
        self.update(move |s| {
            s.set_excluded(column.clone());
        })
    }

    pub fn exec(self, ctx: &Context) -> Result<()> {
        self.create.exec(ctx)
    }

    /// Id of the inserted or conflicting row.
    pub fn id(self, ctx: &Context) -> Result<Value> {
        self.create.insert(ctx, false).map(|e| e.id())
    }

    pub fn save(self, ctx: &Context) -> Result<Entity> {
        self.create.save(ctx)
    }
}

/// Builder for the creation of many entities with one statement.
pub struct CreateBulk {
    client: Client,
    builders: Vec<Create>,
    conflict: Vec<ConflictOption>,
}

struct BulkState {
    pending: Vec<Option<Mutation>>,
    specs: Vec<Option<CreateSpec>>,
    ids: Vec<Value>,
    records: Vec<Option<Record>>,
}

impl CreateBulk {
    pub(crate) fn new(client: Client, builders: Vec<Create>) -> Self {
        Self {
            client,
            builders,
            conflict: Vec::new(),
        }
    }

    pub fn on_conflict(mut self, options: impl IntoIterator<Item = ConflictOption>) -> UpsertBulk {
        self.conflict.extend(options);
        UpsertBulk { bulk: self }
    }

    pub fn on_conflict_columns(self, fields: &[&str]) -> UpsertBulk {
        let columns = match self.builders.first() {
            Some(b) => columns_of(b.mutation.entity(), fields),
            None => fields.iter().map(|f| f.to_string()).collect(),
        };
        self.on_conflict([ConflictOption::Columns(columns)])
    }

    /// Insert every entity with a single statement and return them in
    /// input order.
    ///
    /// Each mutation passes through its own hook chain. The chains are
    /// linked right to left: the terminal step of one chain compiles its
    /// mutation and calls into the next chain, and only the last one issues
    /// the batch insert.
    pub fn save(self, ctx: &Context) -> Result<Vec<Entity>> {
        self.insert(ctx, true)
    }

    pub fn exec(self, ctx: &Context) -> Result<()> {
        self.insert(ctx, false).map(|_| ())
    }

    #[instrument(level = "debug", skip_all, fields(n = self.builders.len()))]
    fn insert(self, ctx: &Context, read_back: bool) -> Result<Vec<Entity>> {
        let CreateBulk {
            client,
            builders,
            conflict,
        } = self;
        let n = builders.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut mutations = Vec::with_capacity(n);
        let mut defs = Vec::with_capacity(n);
        for b in builders {
            if let Some(err) = b.err {
                return Err(err);
            }
            let mut m = b.mutation;
            apply_defaults(&mut m)?;
            defs.push(Arc::clone(m.entity()));
            mutations.push(Some(m));
        }
        let state = Arc::new(Mutex::new(BulkState {
            pending: mutations,
            specs: vec![None; n],
            ids: Vec::new(),
            records: vec![None; n],
        }));

        let mut next: Option<Arc<dyn Mutator>> = None;
        for i in (0..n).rev() {
            let terminal = bulk_step(
                i,
                Arc::clone(&state),
                next.take(),
                Arc::clone(&client.driver),
                conflict.clone(),
                read_back,
            );
            next = Some(client.chain(&defs[i].name, terminal));
        }
        let first = next.ok_or_else(|| Error::unexpected_outcome("created", "empty bulk"))?;
        let mut m = take_pending(&state, 0)?;
        first.mutate(ctx, &mut m)?;

        let records = std::mem::take(&mut state.lock().records);
        records
            .into_iter()
            .zip(defs)
            .map(|(record, def)| {
                let record = record.ok_or_else(|| Error::unexpected_outcome("created", "skipped"))?;
                Ok(Entity::new(client.clone(), def, record))
            })
            .collect()
    }
}

fn take_pending(state: &Mutex<BulkState>, i: usize) -> Result<Mutation> {
    state
        .lock()
        .pending
        .get_mut(i)
        .and_then(Option::take)
        .ok_or_else(|| Error::unexpected_outcome("created", format!("mutation #{i} already taken")))
}

// Terminal step of the `i`th chain of a bulk create.
fn bulk_step(
    i: usize,
    state: Arc<Mutex<BulkState>>,
    next: Option<Arc<dyn Mutator>>,
    driver: Arc<dyn entgraph_dialect::Driver>,
    conflict: Vec<ConflictOption>,
    read_back: bool,
) -> Arc<dyn Mutator> {
    mutate_fn(move |ctx, m| {
        let spec = compile_create(m)?;
        let mut record = created_record(m, &spec);
        state.lock().specs[i] = Some(spec);

        match &next {
            Some(next) => {
                let mut following = take_pending(&state, i + 1)?;
                next.mutate(ctx, &mut following)?;
            }
            None => {
                let nodes = state
                    .lock()
                    .specs
                    .iter_mut()
                    .map(Option::take)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| Error::unexpected_outcome("created", "incomplete batch"))?;
                trace!(n = nodes.len(), "executing batch create");
                let ids = batch_create(
                    ctx,
                    driver.as_ref(),
                    BatchCreateSpec {
                        nodes,
                        on_conflict: conflict.clone(),
                    },
                )?;
                state.lock().ids = ids;
            }
        }

        let id = state
            .lock()
            .ids
            .get(i)
            .cloned()
            .ok_or_else(|| Error::unexpected_outcome("created", "batch not executed"))?;
        if read_back && !conflict.is_empty() {
            record = stored_record(ctx, driver.as_ref(), m, &id)?;
        } else {
            record.insert(m.entity().id.column.clone(), id.clone());
        }
        m.set_id(id);
        m.set_done();
        state.lock().records[i] = Some(record.clone());
        Ok(Outcome::Created(record))
    })
}

/// Bulk create builder with registered conflict options.
pub struct UpsertBulk {
    bulk: CreateBulk,
}

impl UpsertBulk {
    fn push(mut self, option: ConflictOption) -> Self {
        self.bulk.conflict.push(option);
        self
    }

    /// Take the proposed values, except the ids, immutable fields and owned
    /// edge columns.
    pub fn update_new_values(self) -> Self {
        let keep = self
            .bulk
            .builders
            .first()
            .map(|b| kept_on_update(&b.mutation))
            .unwrap_or_default();
        self.push(ConflictOption::ResolveWithNewValues)
            .push(ConflictOption::resolve_with(move |s: &mut UpdateSet| {
                for column in &keep {
                    s.set_ignore(column.clone());
                }
            }))
    }

    pub fn ignore(self) -> Self {
        self.push(ConflictOption::ResolveWithIgnore)
    }

    pub fn do_nothing(self) -> Self {
        self.push(ConflictOption::DoNothing)
    }

    pub fn update(self, f: impl Fn(&mut UpdateSet) + Send + Sync + 'static) -> Self {
        self.push(ConflictOption::resolve_with(f))
    }

    pub fn exec(self, ctx: &Context) -> Result<()> {
        self.bulk.exec(ctx)
    }

    pub fn save(self, ctx: &Context) -> Result<Vec<Entity>> {
        self.bulk.save(ctx)
    }
}

// Columns an upsert must not overwrite: a supplied id, the set immutable
// fields and the FK columns of the set edges this row owns.
fn kept_on_update(m: &Mutation) -> Vec<String> {
    let entity = m.entity();
    let mut keep = Vec::new();
    if m.id().is_some() {
        keep.push(entity.id.column.clone());
    }
    keep.extend(
        entity
            .fields
            .iter()
            .filter(|f| f.immutable && m.field(&f.name).is_some())
            .map(|f| f.column.clone()),
    );
    for edge in entity.edges.iter().filter(|e| e.owns_fk()) {
        let set = !m.added_ids(&edge.name).is_empty()
            || edge.field.as_deref().is_some_and(|f| m.field(f).is_some());
        match edge.columns.first() {
            Some(column) if set && !keep.contains(column) => keep.push(column.clone()),
            _ => {}
        }
    }
    keep
}

fn column_of(entity: &EntityDef, field: &str) -> String {
    entity
        .field(field)
        .map_or_else(|| field.to_string(), |f| f.column.clone())
}

fn columns_of(entity: &EntityDef, fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| column_of(entity, f)).collect()
}

fn stored_record(
    ctx: &Context,
    driver: &dyn entgraph_dialect::Driver,
    m: &Mutation,
    id: &Value,
) -> Result<Record> {
    let mut select = QuerySpec::new(node_spec(m.schema(), m.entity()));
    select.node.id.value = Some(id.clone());
    let record = query_nodes(ctx, driver, &select)?.into_iter().next();
    record.ok_or_else(|| Error::not_found(m.entity().table.clone(), Some(id.clone())))
}

// The row a create writes, every column of the node included (NULL when
// not written). The id is filled in once the store returns it.
fn created_record(m: &Mutation, spec: &CreateSpec) -> Record {
    let node = node_spec(m.schema(), m.entity());
    let mut record = Record::new();
    for column in &node.columns {
        let value = spec
            .fields
            .iter()
            .find(|f| f.column == column.column)
            .map(|f| f.value_or_null())
            .or_else(|| {
                spec.edges
                    .iter()
                    .filter(|e| e.owns_fk())
                    .find(|e| e.columns.first() == Some(&column.column))
                    .and_then(|e| e.target.nodes.first().cloned())
            })
            .unwrap_or(Value::Null);
        record.insert(column.column.clone(), value);
    }
    if let Some(id) = spec.id.as_ref().and_then(|id| id.value.clone()) {
        record.insert(node.id.column.clone(), id);
    }
    record
}
