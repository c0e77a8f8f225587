//! Store-ready descriptions of nodes, edges and the operations on them.
//!
//! Specs are built fresh for every operation and consumed once by an
//! executor. Nothing in a spec is shared with the builder that produced it.

use crate::{ConflictOption, Predicate, SqlGraphError, SqlGraphResult};
use entgraph_core::{FieldType, Value};

/// Relation kind of an edge, seen from the node being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rel {
    O2O,
    O2M,
    M2O,
    M2M,
}

/// Whether an edge's FK column lives on the node's own table.
pub fn owns_fk(rel: Rel, inverse: bool, bidi: bool) -> bool {
    match rel {
        Rel::M2O => true,
        Rel::O2O => inverse || bidi,
        Rel::O2M | Rel::M2M => false,
    }
}

/// A column with its semantic type and, for writes, the value to store.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub column: String,
    pub field_type: FieldType,
    pub value: Option<Value>,
}

impl FieldSpec {
    /// A column placeholder, used for reads and scoping.
    pub fn new(column: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            column: column.into(),
            field_type,
            value: None,
        }
    }

    /// A column write. Fails when the value does not fit the type.
    pub fn with_value(
        column: impl Into<String>,
        field_type: FieldType,
        value: Value,
    ) -> SqlGraphResult<Self> {
        let column = column.into();
        if !field_type.accepts(&value) {
            return Err(SqlGraphError::TypeMismatch {
                column,
                expected: field_type,
                actual: value.type_name(),
            });
        }
        Ok(Self {
            column,
            value: Some(field_type.coerce(value)),
            field_type,
        })
    }

    /// The value to write, NULL when unset.
    pub fn value_or_null(&self) -> Value {
        self.value.clone().unwrap_or(Value::Null)
    }
}

/// The other end of an edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeTarget {
    /// Id column and type of the target table.
    pub id_spec: FieldSpec,
    /// Target node ids. Only the first is meaningful for unique edges.
    pub nodes: Vec<Value>,
}

/// A relation between the node being written and target nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSpec {
    pub rel: Rel,
    /// This side is the back-reference of the relation.
    pub inverse: bool,
    /// Table holding the FK column, or the join table of an M2M edge.
    pub table: String,
    /// FK column, or `[owner, target]` columns of the join table.
    pub columns: Vec<String>,
    pub bidi: bool,
    pub target: EdgeTarget,
}

impl EdgeSpec {
    pub fn owns_fk(&self) -> bool {
        owns_fk(self.rel, self.inverse, self.bidi)
    }

    /// The FK column, or the join-table column pointing at the written node.
    pub(crate) fn from_column(&self) -> SqlGraphResult<&str> {
        let index = usize::from(self.rel == Rel::M2M && self.inverse);
        self.column(index)
    }

    /// The join-table column pointing at the target node.
    pub(crate) fn to_column(&self) -> SqlGraphResult<&str> {
        let index = usize::from(!self.inverse);
        self.column(index)
    }

    fn column(&self, index: usize) -> SqlGraphResult<&str> {
        self.columns.get(index).map(String::as_str).ok_or_else(|| {
            SqlGraphError::invalid_spec(format!(
                "edge on table {} is missing column #{}",
                self.table, index
            ))
        })
    }
}

/// The table a node lives in, its id column and its selectable columns.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub table: String,
    /// Columns scanned back into results, id first.
    pub columns: Vec<FieldSpec>,
    /// Id column; its value scopes single-node operations.
    pub id: FieldSpec,
}

impl NodeSpec {
    pub fn new(table: impl Into<String>, id: FieldSpec) -> Self {
        Self {
            table: table.into(),
            columns: vec![FieldSpec::new(id.column.clone(), id.field_type)],
            id,
        }
    }

    /// Add a scanned column.
    pub fn column(mut self, column: FieldSpec) -> Self {
        if !self.columns.iter().any(|c| c.column == column.column) {
            self.columns.push(column);
        }
        self
    }
}

/// Insert of one node and its edges.
#[derive(Debug, Clone, Default)]
pub struct CreateSpec {
    pub table: String,
    /// Id column; a value means the id is supplied by the caller.
    pub id: Option<FieldSpec>,
    pub fields: Vec<FieldSpec>,
    pub edges: Vec<EdgeSpec>,
    /// Ordered upsert options.
    pub on_conflict: Vec<ConflictOption>,
}

impl CreateSpec {
    pub fn new(table: impl Into<String>, id: FieldSpec) -> Self {
        Self {
            table: table.into(),
            id: Some(id),
            ..Self::default()
        }
    }

    /// Set a field, replacing an earlier write of the same column.
    pub fn set_field(&mut self, field: FieldSpec) {
        match self.fields.iter_mut().find(|f| f.column == field.column) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    pub(crate) fn id_column(&self) -> &str {
        self.id.as_ref().map_or("id", |id| id.column.as_str())
    }

    pub(crate) fn supplied_id(&self) -> Option<&Value> {
        self.id.as_ref().and_then(|id| id.value.as_ref())
    }
}

/// Multi-row insert of nodes sharing a table.
#[derive(Debug, Clone, Default)]
pub struct BatchCreateSpec {
    pub nodes: Vec<CreateSpec>,
    pub on_conflict: Vec<ConflictOption>,
}

/// Field changes of an update, applied clear, then set, then add.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMut {
    pub set: Vec<FieldSpec>,
    /// Numeric deltas, written as `col = COALESCE(col, 0) + delta`.
    pub add: Vec<FieldSpec>,
    pub clear: Vec<FieldSpec>,
}

impl FieldMut {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.add.is_empty() && self.clear.is_empty()
    }
}

/// Edge changes of an update. A cleared edge without target nodes removes
/// every connection; with nodes it removes only those.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeMut {
    pub add: Vec<EdgeSpec>,
    pub clear: Vec<EdgeSpec>,
}

impl EdgeMut {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.clear.is_empty()
    }

    // Whether any change needs statements beyond the node's own row.
    pub(crate) fn touches_other_tables(&self) -> bool {
        self.add
            .iter()
            .chain(self.clear.iter())
            .any(|e| !e.owns_fk() || e.bidi)
    }
}

/// Update of the nodes selected by an id and/or predicate.
#[derive(Debug, Clone)]
pub struct UpdateSpec {
    pub node: NodeSpec,
    pub predicate: Option<Predicate>,
    pub fields: FieldMut,
    pub edges: EdgeMut,
}

impl UpdateSpec {
    pub fn new(node: NodeSpec) -> Self {
        Self {
            node,
            predicate: None,
            fields: FieldMut::default(),
            edges: EdgeMut::default(),
        }
    }

    /// Scoping predicate: the node id (when set) and the user predicate.
    pub(crate) fn scope(&self) -> Option<Predicate> {
        scope(&self.node, self.predicate.clone())
    }
}

/// Deletion of the nodes selected by an id and/or predicate.
#[derive(Debug, Clone)]
pub struct DeleteSpec {
    pub node: NodeSpec,
    pub predicate: Option<Predicate>,
}

impl DeleteSpec {
    pub fn new(node: NodeSpec) -> Self {
        Self {
            node,
            predicate: None,
        }
    }
}

/// Sort key of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub desc: bool,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            desc: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            desc: true,
        }
    }
}

/// Selection of nodes.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub node: NodeSpec,
    pub predicate: Option<Predicate>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// SELECT DISTINCT.
    pub unique: bool,
}

impl QuerySpec {
    pub fn new(node: NodeSpec) -> Self {
        Self {
            node,
            predicate: None,
            order: Vec::new(),
            limit: None,
            offset: None,
            unique: false,
        }
    }

    pub(crate) fn scope(&self) -> Option<Predicate> {
        scope(&self.node, self.predicate.clone())
    }
}

/// Id equality (when the node id has a value) combined with `predicate`.
pub(crate) fn scope(node: &NodeSpec, predicate: Option<Predicate>) -> Option<Predicate> {
    let id = node
        .id
        .value
        .clone()
        .map(|v| Predicate::eq(node.id.column.clone(), v));
    match (id, predicate) {
        (Some(id), Some(p)) => Some(Predicate::and(vec![id, p])),
        (id, p) => id.or(p),
    }
}
