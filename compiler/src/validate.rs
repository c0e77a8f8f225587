//! Checks run before a mutation reaches the store.

use crate::{CompileResult, ValidationError};
use entgraph_core::Value;
use entgraph_mutation::Mutation;
use entgraph_schema::FieldDef;

/// Required fields and edges present, every value accepted by its field.
pub(crate) fn check_create(m: &Mutation, values: &[(&FieldDef, Value)]) -> CompileResult<()> {
    let entity = m.entity();
    for field in &entity.fields {
        let provided = values.iter().any(|(f, _)| f.name == field.name);
        if field.is_required() && !provided {
            return Err(ValidationError::missing_field(&entity.name, &field.name).into());
        }
    }
    for edge in entity.edges.iter().filter(|e| e.required) {
        if m.added_ids(&edge.name).is_empty() {
            return Err(ValidationError::missing_edge(&entity.name, &edge.name).into());
        }
    }
    check_values(m, values)
}

/// No immutable field touched, no required unique edge left empty, every
/// new value accepted by its field.
pub(crate) fn check_update(m: &Mutation, values: &[(&FieldDef, Value)]) -> CompileResult<()> {
    let entity = m.entity();
    let touched = m
        .fields()
        .into_iter()
        .chain(m.added_fields())
        .chain(m.cleared_fields());
    for name in touched {
        if entity.field(name).is_some_and(|f| f.immutable) {
            return Err(ValidationError::new(
                name,
                format!("field \"{}.{}\" is immutable", entity.name, name),
            )
            .into());
        }
    }
    for edge in entity.edges.iter().filter(|e| e.required && e.is_unique()) {
        if m.edge_cleared(&edge.name) && m.added_ids(&edge.name).is_empty() {
            return Err(ValidationError::new(
                edge.name.as_str(),
                format!("clearing a required unique edge \"{}.{}\"", entity.name, edge.name),
            )
            .into());
        }
    }
    check_values(m, values)
}

fn check_values(m: &Mutation, values: &[(&FieldDef, Value)]) -> CompileResult<()> {
    for (field, value) in values {
        if let Err(reason) = field.check_value(value) {
            return Err(ValidationError::validator(m.type_name(), &field.name, &reason).into());
        }
    }
    Ok(())
}
