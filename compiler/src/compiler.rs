//! Mutation to spec compilation.

use crate::validate::{check_create, check_update};
use crate::{CompileError, CompileResult, ValidationError};
use entgraph_core::{FieldType, Value};
use entgraph_mutation::mapping::{id_spec, node_spec, rel};
use entgraph_mutation::{Mutation, Op};
use entgraph_schema::{EdgeDef, EntityDef, FieldDef, Schema};
use entgraph_sqlgraph::{
    BatchCreateSpec, CreateSpec, DeleteSpec, EdgeSpec, EdgeTarget, FieldSpec, NodeSpec,
    UpdateSpec,
};
use std::sync::Arc;
use tracing::trace;

/// Write create defaults (or update defaults) of untouched fields into the
/// mutation, so hooks observe them.
pub fn apply_defaults(m: &mut Mutation) -> CompileResult<()> {
    let entity = Arc::clone(m.entity());
    let create = m.op().is(Op::CREATE);
    if !create && !m.op().is_update() {
        return Ok(());
    }
    for field in &entity.fields {
        let default = if create {
            &field.default
        } else {
            &field.update_default
        };
        if let Some(default) = default {
            if !touched(m, &field.name) {
                m.set_field(&field.name, default.get())?;
            }
        }
    }
    Ok(())
}

fn touched(m: &Mutation, name: &str) -> bool {
    m.field(name).is_some() || m.added_field(name).is_some() || m.field_cleared(name)
}

/// Compile a create. The spec writes every set field plus the defaults of
/// untouched fields; owned FKs become columns and every other edge is
/// written after the node.
pub fn compile_create(m: &Mutation) -> CompileResult<CreateSpec> {
    if !m.op().is(Op::CREATE) {
        return Err(CompileError::op_mismatch(Op::CREATE, m.op()));
    }
    let entity = m.entity();
    let values = create_values(m);
    check_create(m, &values)?;

    let mut spec = CreateSpec::new(entity.table.clone(), id_spec(entity));
    if let Some(id) = m.id() {
        spec.id = Some(FieldSpec::with_value(
            entity.id.column.clone(),
            entity.id.field_type,
            id.clone(),
        )?);
    }
    for (field, value) in values {
        spec.set_field(FieldSpec::with_value(field.column.clone(), field.field_type, value)?);
    }
    for name in m.added_edges() {
        let edge = edge_def(entity, name)?;
        spec.edges
            .push(edge_spec(m.schema(), edge, m.added_ids(name).to_vec()));
    }
    trace!(table = %spec.table, fields = spec.fields.len(), edges = spec.edges.len(), "create compiled");
    Ok(spec)
}

/// Compile the creates of a bulk, preserving their order.
pub fn compile_batch(ms: &[Mutation]) -> CompileResult<BatchCreateSpec> {
    let nodes = ms.iter().map(compile_create).collect::<CompileResult<Vec<_>>>()?;
    Ok(BatchCreateSpec {
        nodes,
        on_conflict: Vec::new(),
    })
}

// Set values, pending deltas (a create has nothing to add to) and defaults.
fn create_values(m: &Mutation) -> Vec<(&FieldDef, Value)> {
    m.entity()
        .fields
        .iter()
        .filter_map(|field| {
            let value = m
                .field(&field.name)
                .or_else(|| m.added_field(&field.name))
                .cloned()
                .or_else(|| {
                    if m.field_cleared(&field.name) {
                        return None;
                    }
                    field.default.as_ref().map(|d| d.get())
                })?;
            (!value.is_null()).then_some((field, value))
        })
        .collect()
}

/// Compile an update of every node matching the mutation's predicates.
pub fn compile_update(m: &Mutation) -> CompileResult<UpdateSpec> {
    if m.op() != Op::UPDATE {
        return Err(CompileError::op_mismatch(Op::UPDATE, m.op()));
    }
    update_spec(m, node_spec(m.schema(), m.entity()))
}

/// Compile an update of one node. `select` limits the columns read back;
/// empty selects every column.
pub fn compile_update_one(m: &Mutation, select: &[&str]) -> CompileResult<UpdateSpec> {
    if m.op() != Op::UPDATE_ONE {
        return Err(CompileError::op_mismatch(Op::UPDATE_ONE, m.op()));
    }
    let entity = m.entity();
    let Some(id) = m.id() else {
        return Err(missing_id(entity, "update"));
    };
    let mut node = if select.is_empty() {
        node_spec(m.schema(), entity)
    } else {
        let mut node = NodeSpec::new(entity.table.clone(), id_spec(entity));
        for name in select {
            let field = entity.field(name).ok_or_else(|| {
                ValidationError::new(*name, format!("invalid field \"{name}\" for query"))
            })?;
            node = node.column(FieldSpec::new(field.column.clone(), field.field_type));
        }
        node
    };
    node.id.value = Some(id.clone());
    update_spec(m, node)
}

fn update_spec(m: &Mutation, node: NodeSpec) -> CompileResult<UpdateSpec> {
    let entity = m.entity();
    let values = update_values(m);
    check_update(m, &values)?;

    let mut spec = UpdateSpec::new(node);
    spec.predicate = m.predicate();
    for name in m.cleared_fields() {
        let field = field_def(entity, name)?;
        spec.fields
            .clear
            .push(FieldSpec::new(field.column.clone(), field.field_type));
    }
    for (field, value) in values {
        spec.fields
            .set
            .push(FieldSpec::with_value(field.column.clone(), field.field_type, value)?);
    }
    for name in m.added_fields() {
        let field = field_def(entity, name)?;
        let delta = m.added_field(name).cloned().unwrap_or(Value::Int(0));
        spec.fields
            .add
            .push(FieldSpec::with_value(field.column.clone(), field.field_type, delta)?);
    }

    let schema = m.schema();
    for name in m.cleared_edges() {
        spec.edges
            .clear
            .push(edge_spec(schema, edge_def(entity, name)?, Vec::new()));
    }
    for name in m.removed_edges() {
        if m.edge_cleared(name) {
            continue;
        }
        let nodes = m.removed_ids(name).to_vec();
        spec.edges
            .clear
            .push(edge_spec(schema, edge_def(entity, name)?, nodes));
    }
    for name in m.added_edges() {
        let nodes = m.added_ids(name).to_vec();
        spec.edges
            .add
            .push(edge_spec(schema, edge_def(entity, name)?, nodes));
    }
    trace!(table = %spec.node.table, "update compiled");
    Ok(spec)
}

// Set values plus the update defaults of untouched fields.
fn update_values(m: &Mutation) -> Vec<(&FieldDef, Value)> {
    m.entity()
        .fields
        .iter()
        .filter_map(|field| {
            let value = match m.field(&field.name) {
                Some(v) => v.clone(),
                None if !touched(m, &field.name) => field.update_default.as_ref()?.get(),
                None => return None,
            };
            Some((field, value))
        })
        .collect()
}

/// Compile a delete scoped by the mutation's id and predicates.
pub fn compile_delete(m: &Mutation) -> CompileResult<DeleteSpec> {
    if !m.op().is_delete() {
        return Err(CompileError::op_mismatch(Op::DELETE | Op::DELETE_ONE, m.op()));
    }
    let entity = m.entity();
    let mut node = NodeSpec::new(entity.table.clone(), id_spec(entity));
    match m.id() {
        Some(id) => node.id.value = Some(id.clone()),
        None if m.op() == Op::DELETE_ONE => return Err(missing_id(entity, "delete")),
        None => {}
    }
    let mut spec = DeleteSpec::new(node);
    spec.predicate = m.predicate();
    Ok(spec)
}

fn missing_id(entity: &EntityDef, action: &str) -> CompileError {
    ValidationError::new(
        entity.id.name.as_str(),
        format!("missing \"{}.{}\" for {}", entity.name, entity.id.name, action),
    )
    .into()
}

fn field_def<'a>(entity: &'a EntityDef, name: &str) -> CompileResult<&'a FieldDef> {
    entity
        .field(name)
        .ok_or_else(|| entgraph_mutation::MutationError::unknown_field(&entity.name, name).into())
}

fn edge_def<'a>(entity: &'a EntityDef, name: &str) -> CompileResult<&'a EdgeDef> {
    entity
        .edge(name)
        .ok_or_else(|| entgraph_mutation::MutationError::unknown_edge(&entity.name, name).into())
}

fn edge_spec(schema: &Schema, edge: &EdgeDef, nodes: Vec<Value>) -> EdgeSpec {
    let id_spec = schema
        .target(edge)
        .map_or_else(|| FieldSpec::new("id", FieldType::Int), |t| id_spec(t));
    EdgeSpec {
        rel: rel(edge.relation),
        inverse: edge.inverse,
        table: edge.table.clone(),
        columns: edge.columns.clone(),
        bidi: edge.bidi,
        target: EdgeTarget { id_spec, nodes },
    }
}
