//! Query builder and eager loading.

use crate::{Client, Entity, Error, Result};
use entgraph_core::{Context, Value};
use entgraph_mutation::mapping::{id_spec, node_spec, step};
use entgraph_schema::EntityDef;
use entgraph_sqlgraph::{
    count_nodes, load_edges, query_ids, query_nodes, EdgeLoadSpec, NodeSpec, Order,
    Predicate, QuerySpec,
};
use std::sync::Arc;
use tracing::{instrument, trace};

/// Builder for reads of one entity type.
///
/// Unknown field or edge names are reported by the terminal call.
#[derive(Debug, Clone)]
pub struct Query {
    client: Client,
    entity: Arc<EntityDef>,
    predicates: Vec<Predicate>,
    order: Vec<Order>,
    limit: Option<usize>,
    offset: Option<usize>,
    unique: bool,
    select: Vec<String>,
    with: Vec<(String, Option<Predicate>)>,
    err: Option<String>,
}

impl Query {
    pub(crate) fn new(client: Client, entity: Arc<EntityDef>) -> Self {
        Self {
            client,
            entity,
            predicates: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            unique: false,
            select: Vec::new(),
            with: Vec::new(),
            err: None,
        }
    }

    pub fn entity(&self) -> &Arc<EntityDef> {
        &self.entity
    }

    pub fn where_(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_asc(mut self, field: &str) -> Self {
        if let Some(column) = self.column(field) {
            self.order.push(Order::asc(column));
        }
        self
    }

    pub fn order_desc(mut self, field: &str) -> Self {
        if let Some(column) = self.column(field) {
            self.order.push(Order::desc(column));
        }
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// SELECT DISTINCT.
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Read only these fields (and the id).
    pub fn select(mut self, fields: &[&str]) -> Self {
        for field in fields {
            if let Some(column) = self.column(field) {
                self.select.push(column);
            }
        }
        self
    }

    /// Eager-load the neighbors through `edge`.
    pub fn with_edge(self, edge: &str) -> Self {
        self.with_edge_where(edge, None)
    }

    /// Eager-load the neighbors through `edge` matching `predicate`.
    pub fn with_edge_where(mut self, edge: &str, predicate: Option<Predicate>) -> Self {
        if self.entity.edge(edge).is_none() {
            self.err
                .get_or_insert_with(|| format!("invalid edge \"{}\" for query", edge));
        } else {
            self.with.push((edge.to_string(), predicate));
        }
        self
    }

    fn column(&mut self, field: &str) -> Option<String> {
        if field == self.entity.id.name {
            return Some(self.entity.id.column.clone());
        }
        match self.entity.field(field) {
            Some(f) => Some(f.column.clone()),
            None => {
                self.err
                    .get_or_insert_with(|| format!("invalid field \"{}\" for query", field));
                None
            }
        }
    }

    fn spec(&self) -> Result<QuerySpec> {
        if let Some(message) = &self.err {
            return Err(Error::validation(self.entity.name.as_str(), message.as_str()));
        }
        let node = if self.select.is_empty() {
            node_spec(self.client.schema(), &self.entity)
        } else {
            self.selected_node()
        };
        let mut spec = QuerySpec::new(node);
        spec.predicate = match self.predicates.len() {
            0 => None,
            1 => Some(self.predicates[0].clone()),
            _ => Some(Predicate::and(self.predicates.clone())),
        };
        spec.order = self.order.clone();
        spec.limit = self.limit;
        spec.offset = self.offset;
        spec.unique = self.unique;
        Ok(spec)
    }

    // Selected columns plus the FK columns eager loading reads.
    fn selected_node(&self) -> NodeSpec {
        let full = node_spec(self.client.schema(), &self.entity);
        let mut node = NodeSpec::new(self.entity.table.clone(), id_spec(&self.entity));
        let fk_columns: Vec<&String> = self
            .with
            .iter()
            .filter_map(|(name, _)| self.entity.edge(name))
            .filter(|e| e.owns_fk())
            .filter_map(|e| e.columns.first())
            .collect();
        for column in full.columns {
            if self.select.contains(&column.column) || fk_columns.contains(&&column.column) {
                node = node.column(column);
            }
        }
        node
    }

    #[instrument(level = "debug", skip_all, fields(entity = %self.entity.name))]
    pub fn all(self, ctx: &Context) -> Result<Vec<Entity>> {
        let spec = self.spec()?;
        let records = query_nodes(ctx, self.client.driver().as_ref(), &spec)?;
        let mut entities: Vec<Entity> = records
            .into_iter()
            .map(|r| Entity::new(self.client.clone(), Arc::clone(&self.entity), r))
            .collect();
        for (edge, predicate) in &self.with {
            self.load(ctx, edge, predicate.as_ref(), &mut entities)?;
        }
        Ok(entities)
    }

    /// The first entity; `NotFound` when there is none.
    pub fn first(mut self, ctx: &Context) -> Result<Entity> {
        self.limit = Some(1);
        let table = self.entity.table.clone();
        self.all(ctx)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(table, None))
    }

    /// The only entity; `NotFound` when there is none and `NotSingular`
    /// when there are more.
    pub fn only(mut self, ctx: &Context) -> Result<Entity> {
        self.limit = Some(2);
        let table = self.entity.table.clone();
        let name = self.entity.name.clone();
        let mut all = self.all(ctx)?;
        match all.len() {
            0 => Err(Error::not_found(table, None)),
            1 => Ok(all.remove(0)),
            _ => Err(Error::not_singular(name)),
        }
    }

    pub fn ids(self, ctx: &Context) -> Result<Vec<Value>> {
        let spec = self.spec()?;
        Ok(query_ids(ctx, self.client.driver().as_ref(), &spec)?)
    }

    pub fn first_id(mut self, ctx: &Context) -> Result<Value> {
        self.limit = Some(1);
        let table = self.entity.table.clone();
        self.ids(ctx)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(table, None))
    }

    pub fn only_id(mut self, ctx: &Context) -> Result<Value> {
        self.limit = Some(2);
        let table = self.entity.table.clone();
        let name = self.entity.name.clone();
        let mut ids = self.ids(ctx)?;
        match ids.len() {
            0 => Err(Error::not_found(table, None)),
            1 => Ok(ids.remove(0)),
            _ => Err(Error::not_singular(name)),
        }
    }

    #[instrument(level = "debug", skip_all, fields(entity = %self.entity.name))]
    pub fn count(self, ctx: &Context) -> Result<usize> {
        let spec = self.spec()?;
        Ok(count_nodes(ctx, self.client.driver().as_ref(), &spec)?)
    }

    pub fn exist(mut self, ctx: &Context) -> Result<bool> {
        self.limit = Some(1);
        Ok(!self.ids(ctx)?.is_empty())
    }

    // Attach the neighbors through `edge` to every entity.
    fn load(
        &self,
        ctx: &Context,
        edge: &str,
        predicate: Option<&Predicate>,
        entities: &mut [Entity],
    ) -> Result<()> {
        let schema = self.client.schema();
        let Some(edge_def) = self.entity.edge(edge) else {
            return Err(Error::not_loaded(edge));
        };
        let Some(step) = step(schema, &self.entity, edge_def) else {
            return Err(Error::unknown_type(&edge_def.target));
        };
        let target = Arc::clone(self.client.entity(&edge_def.target)?);
        let owns_fk = edge_def.owns_fk();
        let fk_column = edge_def.columns.first().cloned().unwrap_or_default();

        // Keyed by the FK value when this side holds it, by id otherwise.
        let key_of = |e: &Entity| -> Option<Value> {
            let key = if owns_fk {
                e.record().get(&fk_column).cloned()
            } else {
                Some(e.id())
            };
            key.filter(|k| !k.is_null())
        };
        let mut keys: Vec<Value> = Vec::new();
        for key in entities.iter().filter_map(|e| key_of(e)) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        let spec = EdgeLoadSpec {
            step,
            keys,
            node: node_spec(schema, &target),
            predicate: predicate.cloned(),
        };
        let loaded = load_edges(ctx, self.client.driver().as_ref(), &spec)?;
        trace!(edge, count = loaded.len(), "edge loaded");

        for entity in entities.iter_mut() {
            let key = key_of(&*entity);
            let neighbors: Vec<Entity> = loaded
                .iter()
                .filter(|(k, _)| key.as_ref() == Some(k))
                .map(|(_, r)| Entity::new(self.client.clone(), Arc::clone(&target), r.clone()))
                .collect();
            entity.set_edges(edge, neighbors);
        }
        Ok(())
    }
}
