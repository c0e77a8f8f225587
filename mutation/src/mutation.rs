//! The generic mutation.

use crate::mapping::node_spec;
use crate::{MutationError, MutationResult, Op};
use entgraph_core::{Context, Record, Value};
use entgraph_dialect::Driver;
use entgraph_schema::{EntityDef, FieldDef, Schema};
use entgraph_sqlgraph::{query_ids, query_nodes, Predicate, QuerySpec, SqlGraphError};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::trace;

/// Loads the stored row of an entity by id, for old-value lookups.
pub type OldLoader = Arc<dyn Fn(&Context, &Value) -> MutationResult<Record> + Send + Sync>;

#[derive(Debug, Clone, Default)]
struct EdgeState {
    added: Vec<Value>,
    removed: Vec<Value>,
    cleared: bool,
}

/// Pending create/update/delete of one entity type, described by name.
///
/// Every accessor and writer takes field and edge names as declared in the
/// schema. A field has at most one pending change: a new value, a numeric
/// delta or a clear, and the last write wins.
#[derive(Clone)]
pub struct Mutation {
    op: Op,
    schema: Arc<Schema>,
    entity: Arc<EntityDef>,
    driver: Option<Arc<dyn Driver>>,
    id: Option<Value>,
    values: HashMap<String, Value>,
    added: HashMap<String, Value>,
    cleared: HashSet<String>,
    edges: HashMap<String, EdgeState>,
    predicates: Vec<Predicate>,
    done: bool,
    loader: Option<OldLoader>,
    old: OnceLock<MutationResult<Record>>,
}

impl fmt::Debug for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("op", &self.op)
            .field("type", &self.entity.name)
            .field("id", &self.id)
            .field("values", &self.values)
            .field("added", &self.added)
            .field("cleared", &self.cleared)
            .field("edges", &self.edges)
            .field("predicates", &self.predicates.len())
            .field("done", &self.done)
            .finish()
    }
}

impl Mutation {
    /// Create a mutation of entity `type_name`. Returns `None` when the
    /// schema does not declare it.
    pub fn new(op: Op, schema: Arc<Schema>, type_name: &str) -> Option<Self> {
        let entity = Arc::clone(schema.entity(type_name)?);
        Some(Self {
            op,
            schema,
            entity,
            driver: None,
            id: None,
            values: HashMap::new(),
            added: HashMap::new(),
            cleared: HashSet::new(),
            edges: HashMap::new(),
            predicates: Vec::new(),
            done: false,
            loader: None,
            old: OnceLock::new(),
        })
    }

    /// Bind the driver used for id resolution and old-value loads.
    pub fn with_driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn op(&self) -> Op {
        self.op
    }

    pub fn set_op(&mut self, op: Op) {
        self.op = op;
    }

    /// Entity type name.
    pub fn type_name(&self) -> &str {
        &self.entity.name
    }

    pub fn entity(&self) -> &Arc<EntityDef> {
        &self.entity
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn driver(&self) -> Option<&Arc<dyn Driver>> {
        self.driver.as_ref()
    }

    pub fn id(&self) -> Option<&Value> {
        self.id.as_ref()
    }

    /// Target a single entity. Resets any memoized old values.
    pub fn set_id(&mut self, id: impl Into<Value>) {
        self.id = Some(id.into());
        self.old = OnceLock::new();
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Mark the mutation as executed; old values are unavailable afterwards.
    pub fn set_done(&mut self) {
        self.done = true;
    }

    /// Replace the loader used by `old_field`.
    pub fn set_old_loader(&mut self, loader: OldLoader) {
        self.loader = Some(loader);
        self.old = OnceLock::new();
    }

    // Fields

    /// Names of fields with a new value, in schema order.
    pub fn fields(&self) -> Vec<&str> {
        self.in_schema_order(|f| self.values.contains_key(&f.name))
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Names of fields with a numeric delta, in schema order.
    pub fn added_fields(&self) -> Vec<&str> {
        self.in_schema_order(|f| self.added.contains_key(&f.name))
    }

    pub fn added_field(&self, name: &str) -> Option<&Value> {
        self.added.get(name)
    }

    /// Names of cleared fields, in schema order.
    pub fn cleared_fields(&self) -> Vec<&str> {
        self.in_schema_order(|f| self.cleared.contains(&f.name))
    }

    pub fn field_cleared(&self, name: &str) -> bool {
        self.cleared.contains(name)
    }

    fn in_schema_order(&self, keep: impl Fn(&FieldDef) -> bool) -> Vec<&str> {
        self.entity
            .fields
            .iter()
            .filter(|f| keep(f))
            .map(|f| f.name.as_str())
            .collect()
    }

    fn field_def(&self, name: &str) -> MutationResult<FieldDef> {
        self.entity
            .field(name)
            .cloned()
            .ok_or_else(|| MutationError::unknown_field(&self.entity.name, name))
    }

    /// Set a new value, dropping any pending delta or clear. Setting NULL
    /// clears the field when it is clearable.
    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) -> MutationResult<()> {
        let field = self.field_def(name)?;
        let value = value.into();
        if value.is_null() {
            if field.is_clearable() {
                return self.clear_field(name);
            }
            return Err(MutationError::type_mismatch(name, field.field_type, value.type_name()));
        }
        if !field.field_type.accepts(&value) {
            return Err(MutationError::type_mismatch(name, field.field_type, value.type_name()));
        }
        let value = field.field_type.coerce(value);
        self.added.remove(name);
        self.cleared.remove(name);
        self.mirror_edge(name, Some(&value));
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Accumulate a numeric delta, dropping any pending new value or clear.
    pub fn add_field(&mut self, name: &str, delta: impl Into<Value>) -> MutationResult<()> {
        let field = self.field_def(name)?;
        if !field.field_type.is_numeric() {
            return Err(MutationError::not_numeric(name));
        }
        let delta = delta.into();
        if delta.is_null() || !field.field_type.accepts(&delta) {
            return Err(MutationError::type_mismatch(name, field.field_type, delta.type_name()));
        }
        let delta = field.field_type.coerce(delta);
        let total = match self.added.get(name) {
            Some(existing) => existing
                .checked_add(&delta)
                .ok_or_else(|| MutationError::overflow(name))?,
            None => delta,
        };
        self.values.remove(name);
        self.cleared.remove(name);
        self.added.insert(name.to_string(), total);
        Ok(())
    }

    /// Mark a field for NULL-out, dropping any pending value or delta.
    pub fn clear_field(&mut self, name: &str) -> MutationResult<()> {
        let field = self.field_def(name)?;
        if !field.is_clearable() {
            return Err(MutationError::not_nullable(&self.entity.name, name));
        }
        self.values.remove(name);
        self.added.remove(name);
        self.mirror_edge(name, None);
        self.cleared.insert(name.to_string());
        Ok(())
    }

    /// Forget every pending change of a field.
    pub fn reset_field(&mut self, name: &str) -> MutationResult<()> {
        self.field_def(name)?;
        self.values.remove(name);
        self.added.remove(name);
        self.cleared.remove(name);
        if let Some(edge) = self.entity.edge_by_field(name) {
            self.edges.remove(&edge.name);
        }
        Ok(())
    }

    // Edge-fields and their unique edges always agree.
    fn mirror_edge(&mut self, field: &str, value: Option<&Value>) {
        let Some(edge) = self.entity.edge_by_field(field) else {
            return;
        };
        let state = self.edges.entry(edge.name.clone()).or_default();
        match value {
            Some(v) => {
                state.added = vec![v.clone()];
                state.removed.clear();
            }
            None => {
                state.added.clear();
                state.cleared = true;
            }
        }
    }

    // Edges

    fn edge_checked(&self, name: &str) -> MutationResult<(bool, Option<String>)> {
        self.entity
            .edge(name)
            .map(|e| (e.is_unique(), e.field.clone()))
            .ok_or_else(|| MutationError::unknown_edge(&self.entity.name, name))
    }

    /// Connect target ids. A unique edge keeps only the last id.
    pub fn add_edge_ids<I, V>(&mut self, name: &str, ids: I) -> MutationResult<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let (unique, field) = self.edge_checked(name)?;
        let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();
        let Some(last) = ids.last().cloned() else {
            return Ok(());
        };
        let state = self.edges.entry(name.to_string()).or_default();
        state.removed.retain(|v| !ids.contains(v));
        if unique {
            state.added = vec![last.clone()];
        } else {
            for id in ids {
                if !state.added.contains(&id) {
                    state.added.push(id);
                }
            }
        }
        if let Some(field) = field {
            self.added.remove(&field);
            self.cleared.remove(&field);
            self.values.insert(field, last);
        }
        Ok(())
    }

    /// Point a unique edge at `id`.
    pub fn set_edge_id(&mut self, name: &str, id: impl Into<Value>) -> MutationResult<()> {
        self.add_edge_ids(name, [id.into()])
    }

    /// Disconnect target ids, dropping them from the pending additions.
    pub fn remove_edge_ids<I, V>(&mut self, name: &str, ids: I) -> MutationResult<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.edge_checked(name)?;
        let state = self.edges.entry(name.to_string()).or_default();
        for id in ids.into_iter().map(Into::into) {
            state.added.retain(|v| *v != id);
            if !state.removed.contains(&id) {
                state.removed.push(id);
            }
        }
        Ok(())
    }

    /// Remove every connection of the edge. Ids added afterwards are still
    /// connected.
    pub fn clear_edge(&mut self, name: &str) -> MutationResult<()> {
        let (_, field) = self.edge_checked(name)?;
        let state = self.edges.entry(name.to_string()).or_default();
        state.cleared = true;
        state.added.clear();
        if let Some(field) = field {
            self.values.remove(&field);
            self.added.remove(&field);
            self.cleared.insert(field);
        }
        Ok(())
    }

    /// Forget every pending change of an edge.
    pub fn reset_edge(&mut self, name: &str) -> MutationResult<()> {
        let (_, field) = self.edge_checked(name)?;
        self.edges.remove(name);
        if let Some(field) = field {
            self.values.remove(&field);
            self.cleared.remove(&field);
        }
        Ok(())
    }

    fn edges_where(&self, keep: impl Fn(&EdgeState) -> bool) -> Vec<&str> {
        self.entity
            .edges
            .iter()
            .filter(|e| self.edges.get(&e.name).is_some_and(&keep))
            .map(|e| e.name.as_str())
            .collect()
    }

    /// Names of edges with added ids, in schema order.
    pub fn added_edges(&self) -> Vec<&str> {
        self.edges_where(|s| !s.added.is_empty())
    }

    pub fn added_ids(&self, name: &str) -> &[Value] {
        self.edges
            .get(name)
            .map(|s| s.added.as_slice())
            .unwrap_or_default()
    }

    pub fn removed_edges(&self) -> Vec<&str> {
        self.edges_where(|s| !s.removed.is_empty())
    }

    pub fn removed_ids(&self, name: &str) -> &[Value] {
        self.edges
            .get(name)
            .map(|s| s.removed.as_slice())
            .unwrap_or_default()
    }

    pub fn cleared_edges(&self) -> Vec<&str> {
        self.edges_where(|s| s.cleared)
    }

    pub fn edge_cleared(&self, name: &str) -> bool {
        self.edges.get(name).is_some_and(|s| s.cleared)
    }

    // Scoping

    /// Restrict an Update or Delete to matching rows.
    pub fn where_(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// The predicates combined into one, if any.
    pub fn predicate(&self) -> Option<Predicate> {
        match self.predicates.as_slice() {
            [] => None,
            [p] => Some(p.clone()),
            ps => Some(Predicate::and(ps.to_vec())),
        }
    }

    /// Resolve the ids the mutation applies to.
    ///
    /// A direct id without predicates is returned as is. Otherwise one query
    /// selects the ids matching the id (when set) and all predicates.
    pub fn ids(&self, ctx: &Context) -> MutationResult<Vec<Value>> {
        if self.op.is(Op::CREATE) {
            return Err(MutationError::op_not_allowed(self.op, "ids of a create are not known"));
        }
        if let (Some(id), true) = (&self.id, self.predicates.is_empty()) {
            return Ok(vec![id.clone()]);
        }
        let driver = self.driver.as_ref().ok_or(MutationError::NoDriver)?;
        let mut spec = QuerySpec::new(node_spec(&self.schema, &self.entity));
        spec.node.id.value = self.id.clone();
        spec.predicate = self.predicate();
        let ids = query_ids(ctx, driver.as_ref(), &spec)?;
        trace!(type_name = %self.entity.name, count = ids.len(), "ids resolved");
        Ok(ids)
    }

    // Old values

    /// The stored value of a field before this UpdateOne.
    ///
    /// The row is loaded once, on first use, and shared by later calls.
    pub fn old_field(&self, ctx: &Context, name: &str) -> MutationResult<Value> {
        let field = self.field_def(name)?;
        if self.done {
            return Err(MutationError::old_value_unavailable(name, "mutation already executed"));
        }
        if self.op != Op::UPDATE_ONE {
            return Err(MutationError::old_value_unavailable(name, "only UpdateOne has old values"));
        }
        let Some(id) = &self.id else {
            return Err(MutationError::old_value_unavailable(name, "id is not set"));
        };
        let loader = match (&self.loader, &self.driver) {
            (Some(loader), _) => Arc::clone(loader),
            (None, Some(driver)) => self.default_loader(Arc::clone(driver)),
            (None, None) => {
                return Err(MutationError::old_value_unavailable(name, "no loader"));
            }
        };
        let record = self.old.get_or_init(|| loader(ctx, id)).clone()?;
        Ok(record.get(&field.column).cloned().unwrap_or(Value::Null))
    }

    fn default_loader(&self, driver: Arc<dyn Driver>) -> OldLoader {
        let node = node_spec(&self.schema, &self.entity);
        Arc::new(move |ctx: &Context, id: &Value| -> MutationResult<Record> {
            let mut spec = QuerySpec::new(node.clone());
            spec.node.id.value = Some(id.clone());
            query_nodes(ctx, driver.as_ref(), &spec)?
                .into_iter()
                .next()
                .ok_or_else(|| SqlGraphError::not_found(node.table.clone(), Some(id.clone())).into())
        })
    }
}
