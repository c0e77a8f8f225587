//! Entities returned by builders and queries.

use crate::{Client, DeleteOne, Error, Query, Result, UpdateOne};
use entgraph_core::{Record, Value};
use entgraph_mutation::mapping;
use entgraph_schema::EntityDef;
use entgraph_sqlgraph::{Predicate, Rel, Step};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One row of an entity type, with the edges loaded alongside it.
///
/// An entity keeps the client that produced it. When that client belongs
/// to a transaction, every query made from the entity runs in the
/// transaction until `unwrap` rebinds it to the parent client.
#[derive(Clone)]
pub struct Entity {
    client: Client,
    def: Arc<EntityDef>,
    record: Record,
    edges: BTreeMap<String, Vec<Entity>>,
}

impl Entity {
    pub(crate) fn new(client: Client, def: Arc<EntityDef>, record: Record) -> Self {
        Self {
            client,
            def,
            record,
            edges: BTreeMap::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.def.name
    }

    pub fn def(&self) -> &Arc<EntityDef> {
        &self.def
    }

    pub fn id(&self) -> Value {
        self.record
            .get(&self.def.id.column)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Value of a field, by field name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        let column = self.def.field(field).map_or(field, |f| f.column.as_str());
        self.record.get(column)
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Eager-loaded neighbors through `edge`.
    pub fn edges(&self, edge: &str) -> Result<&[Entity]> {
        self.edges
            .get(edge)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::not_loaded(edge))
    }

    pub(crate) fn set_edges(&mut self, edge: &str, neighbors: Vec<Entity>) {
        self.edges.insert(edge.to_string(), neighbors);
    }

    /// Query the neighbors of this entity through `edge`.
    pub fn query_edge(&self, edge: &str) -> Result<Query> {
        let schema = self.client.schema();
        let edge_def = self
            .def
            .edge(edge)
            .ok_or_else(|| entgraph_mutation::MutationError::unknown_edge(&self.def.name, edge))?;
        let step = mapping::step(schema, &self.def, edge_def)
            .ok_or_else(|| Error::unknown_type(&edge_def.target))?;
        let target = self.client.query(&edge_def.target)?;
        let back = reverse(step, &self.def.table);
        let own = Predicate::eq(self.def.id.column.clone(), self.id());
        Ok(target.where_(Predicate::has_edge_with(back, own)))
    }

    /// Update builder for this entity, bound to the entity's client.
    ///
    /// # Panics
    ///
    /// When the entity was produced by a transaction that has since ended.
    /// Call `unwrap` first to continue outside the transaction.
    pub fn update(&self) -> UpdateOne {
        self.check_tx();
        let mut m = match self.client.mutation(entgraph_mutation::Op::UPDATE_ONE, &self.def.name) {
            Ok(m) => m,
            Err(err) => panic!("{err}"),
        };
        m.set_id(self.id());
        UpdateOne::new(self.client.clone(), m)
    }

    /// Delete builder for this entity, bound to the entity's client.
    ///
    /// # Panics
    ///
    /// Like `update`, when the entity's transaction has ended.
    pub fn delete(&self) -> DeleteOne {
        self.check_tx();
        let mut m = match self.client.mutation(entgraph_mutation::Op::DELETE_ONE, &self.def.name) {
            Ok(m) => m,
            Err(err) => panic!("{err}"),
        };
        m.set_id(self.id());
        DeleteOne::new(self.client.clone(), m)
    }

    fn check_tx(&self) {
        let driver = self.client.driver();
        if driver.in_tx() && driver.is_closed() {
            panic!(
                "entgraph: {} is bound to a closed transaction; call unwrap() before update",
                self.def.name
            );
        }
    }

    /// Rebind the entity (and its loaded edges) to the client outside the
    /// transaction that produced it.
    pub fn unwrap(mut self) -> Result<Entity> {
        let parent = self.client.driver().parent().ok_or(Error::NotTransactional)?;
        self.rebind(&parent);
        Ok(self)
    }

    fn rebind(&mut self, driver: &Arc<dyn entgraph_dialect::Driver>) {
        self.client = self.client.with_driver(Arc::clone(driver));
        for neighbors in self.edges.values_mut() {
            for n in neighbors {
                n.rebind(driver);
            }
        }
    }
}

// The same hop walked from the other end.
fn reverse(step: Step, from_table: &str) -> Step {
    let rel = match step.rel {
        Rel::M2O => Rel::O2M,
        Rel::O2M => Rel::M2O,
        other => other,
    };
    let inverse = match step.rel {
        Rel::O2O if step.bidi => step.inverse,
        Rel::O2O | Rel::M2M => !step.inverse,
        _ => step.inverse,
    };
    Step {
        rel,
        inverse,
        bidi: step.bidi,
        from_id: step.to_id,
        edge_table: step.edge_table,
        edge_columns: step.edge_columns,
        to_table: from_table.to_string(),
        to_id: step.from_id,
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(&self.def.name)
            .field("record", &self.record)
            .field("edges", &self.edges)
            .finish()
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.def.name == other.def.name && self.record == other.record && self.edges == other.edges
    }
}
