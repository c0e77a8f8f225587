//! Schema metadata mapped onto store specs.

use entgraph_core::FieldType;
use entgraph_schema::{EdgeDef, EntityDef, Relation, Schema};
use entgraph_sqlgraph::{FieldSpec, NodeSpec, Rel, Step};

pub fn rel(relation: Relation) -> Rel {
    match relation {
        Relation::O2O => Rel::O2O,
        Relation::O2M => Rel::O2M,
        Relation::M2O => Rel::M2O,
        Relation::M2M => Rel::M2M,
    }
}

/// The id column of an entity, without a value.
pub fn id_spec(entity: &EntityDef) -> FieldSpec {
    FieldSpec::new(entity.id.column.clone(), entity.id.field_type)
}

/// Id type of the entity an edge points to.
pub fn target_id_type(schema: &Schema, edge: &EdgeDef) -> FieldType {
    schema
        .target(edge)
        .map_or(FieldType::Int, |t| t.id.field_type)
}

/// Every column of an entity: id, fields, then FK columns without a field.
pub fn node_spec(schema: &Schema, entity: &EntityDef) -> NodeSpec {
    let mut node = NodeSpec::new(entity.table.clone(), id_spec(entity));
    for field in &entity.fields {
        node = node.column(FieldSpec::new(field.column.clone(), field.field_type));
    }
    for edge in entity.foreign_keys() {
        if let Some(column) = edge.columns.first() {
            node = node.column(FieldSpec::new(column.clone(), target_id_type(schema, edge)));
        }
    }
    node
}

/// The hop from `entity` through `edge` to its target.
pub fn step(schema: &Schema, entity: &EntityDef, edge: &EdgeDef) -> Option<Step> {
    let target = schema.target(edge)?;
    Some(Step {
        rel: rel(edge.relation),
        inverse: edge.inverse,
        bidi: edge.bidi,
        from_id: entity.id.column.clone(),
        edge_table: edge.table.clone(),
        edge_columns: edge.columns.clone(),
        to_table: target.table.clone(),
        to_id: target.id.column.clone(),
    })
}
