//! SchemaBuilder for constructing an immutable Schema.

use crate::{Annotation, EdgeDef, EntityDef, FieldDef, IndexDef, Relation, Schema};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors that can occur during schema construction.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Duplicate entity name: {0}")]
    DuplicateEntity(String),

    #[error("Duplicate field {field} on entity {entity}")]
    DuplicateField { entity: String, field: String },

    #[error("Duplicate edge {edge} on entity {entity}")]
    DuplicateEdge { entity: String, edge: String },

    #[error("Edge {entity}.{edge} points to unknown entity {target}")]
    UnknownEdgeTarget {
        entity: String,
        edge: String,
        target: String,
    },

    #[error("Invalid edge {entity}.{edge}: {reason}")]
    InvalidEdge {
        entity: String,
        edge: String,
        reason: String,
    },

    #[error("Index on entity {entity} references unknown {kind} {name}")]
    UnknownIndexColumn {
        entity: String,
        kind: &'static str,
        name: String,
    },

    #[error("Invalid match pattern on {entity}.{field}: {reason}")]
    InvalidPattern {
        entity: String,
        field: String,
        reason: String,
    },
}

impl SchemaError {
    fn invalid_edge(entity: &str, edge: &str, reason: impl Into<String>) -> Self {
        Self::InvalidEdge {
            entity: entity.to_string(),
            edge: edge.to_string(),
            reason: reason.into(),
        }
    }
}

/// Builder for constructing an immutable Schema.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    /// Entities being built, in declaration order.
    entities: Vec<EntityDef>,
    /// Entity name to position mapping.
    names: HashMap<String, usize>,
}

impl SchemaBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity definition.
    pub fn add_entity(&mut self, name: impl Into<String>) -> EntityBuilder<'_> {
        let name = name.into();
        EntityBuilder {
            builder: self,
            table: None,
            id: FieldDef::int("id"),
            name,
            fields: Vec::new(),
            edges: Vec::new(),
            indexes: Vec::new(),
            annotation: None,
        }
    }

    /// Resolve edge tables and columns against their targets and build the
    /// immutable Schema.
    pub fn build(mut self) -> Result<Schema, SchemaError> {
        let tables: HashMap<String, String> = self
            .entities
            .iter()
            .map(|e| (e.name.clone(), e.table.clone()))
            .collect();

        for entity in &mut self.entities {
            let own_table = entity.table.clone();
            for edge in &mut entity.edges {
                let Some(target_table) = tables.get(&edge.target) else {
                    return Err(SchemaError::UnknownEdgeTarget {
                        entity: entity.name.clone(),
                        edge: edge.name.clone(),
                        target: edge.target.clone(),
                    });
                };
                resolve_edge(&entity.name, &own_table, target_table, &entity.fields, edge)?;
            }
            for index in &entity.indexes {
                if let Some(name) = index.fields.iter().find(|f| entity.field(f).is_none()) {
                    return Err(SchemaError::UnknownIndexColumn {
                        entity: entity.name.clone(),
                        kind: "field",
                        name: name.clone(),
                    });
                }
                if let Some(name) = index.edges.iter().find(|e| entity.edge(e).is_none()) {
                    return Err(SchemaError::UnknownIndexColumn {
                        entity: entity.name.clone(),
                        kind: "edge",
                        name: name.clone(),
                    });
                }
            }
        }

        Ok(Schema::new(self.entities))
    }
}

fn resolve_edge(
    entity: &str,
    own_table: &str,
    target_table: &str,
    fields: &[FieldDef],
    edge: &mut EdgeDef,
) -> Result<(), SchemaError> {
    if let Some(field_name) = &edge.field {
        let Some(field) = fields.iter().find(|f| &f.name == field_name) else {
            return Err(SchemaError::invalid_edge(
                entity,
                &edge.name,
                format!("edge field {} is not declared", field_name),
            ));
        };
        if !edge.owns_fk() {
            return Err(SchemaError::invalid_edge(
                entity,
                &edge.name,
                "only edges holding the foreign key can be bound to a field",
            ));
        }
        if edge.columns.is_empty() {
            edge.columns = vec![field.column.clone()];
        }
    }

    if edge.table.is_empty() {
        edge.table = match edge.relation {
            Relation::M2M => {
                return Err(SchemaError::invalid_edge(
                    entity,
                    &edge.name,
                    "many-to-many edges need a join table",
                ))
            }
            _ if edge.owns_fk() => own_table.to_string(),
            _ => target_table.to_string(),
        };
    }

    let expected = if edge.relation == Relation::M2M { 2 } else { 1 };
    if edge.columns.len() != expected {
        return Err(SchemaError::invalid_edge(
            entity,
            &edge.name,
            format!("expected {} column(s), got {}", expected, edge.columns.len()),
        ));
    }
    if edge.bidi && !matches!(edge.relation, Relation::O2O | Relation::M2M) {
        return Err(SchemaError::invalid_edge(
            entity,
            &edge.name,
            "only O2O and M2M edges can be bidirectional",
        ));
    }
    Ok(())
}

// Tables of an entity living in another schema are addressed as
// `schema.table`; join tables follow their owner.
fn qualify(schema: Option<&str>, table: String) -> String {
    match schema {
        Some(schema) if !table.is_empty() && !table.contains('.') => format!("{schema}.{table}"),
        _ => table,
    }
}

/// Builder for an entity definition.
pub struct EntityBuilder<'a> {
    builder: &'a mut SchemaBuilder,
    name: String,
    table: Option<String>,
    id: FieldDef,
    fields: Vec<FieldDef>,
    edges: Vec<EdgeDef>,
    indexes: Vec<IndexDef>,
    annotation: Option<Annotation>,
}

impl<'a> EntityBuilder<'a> {
    /// Set the table name. An annotation table takes precedence.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Replace the default integer `id` field.
    pub fn id(mut self, id: FieldDef) -> Self {
        self.id = id;
        self
    }

    /// Add a field.
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add an edge.
    pub fn edge(mut self, edge: EdgeDef) -> Self {
        self.edges.push(edge);
        self
    }

    /// Add an index.
    pub fn index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotation = Some(match self.annotation.take() {
            Some(existing) => existing.merge(annotation),
            None => annotation,
        });
        self
    }

    /// Finish building this entity.
    pub fn done(self) -> Result<(), SchemaError> {
        if self.builder.names.contains_key(&self.name) {
            return Err(SchemaError::DuplicateEntity(self.name));
        }

        let mut seen = HashSet::from([self.id.name.clone()]);
        let mut fields = self.fields;
        for field in &mut fields {
            if !seen.insert(field.name.clone()) {
                return Err(SchemaError::DuplicateField {
                    entity: self.name,
                    field: field.name.clone(),
                });
            }
            field
                .compile_pattern()
                .map_err(|e| SchemaError::InvalidPattern {
                    entity: self.name.clone(),
                    field: field.name.clone(),
                    reason: e.to_string(),
                })?;
        }

        let mut edge_names = HashSet::new();
        let default_on_delete = self.annotation.as_ref().and_then(|a| a.on_delete);
        let mut edges = self.edges;
        for edge in &mut edges {
            if !edge_names.insert(edge.name.clone()) {
                return Err(SchemaError::DuplicateEdge {
                    entity: self.name,
                    edge: edge.name.clone(),
                });
            }
            if edge.on_delete.is_none() {
                edge.on_delete = default_on_delete;
            }
        }

        let table = self
            .annotation
            .as_ref()
            .and_then(|a| a.table.clone())
            .or(self.table)
            .unwrap_or_else(|| format!("{}s", self.name.to_lowercase()));
        let schema = self.annotation.as_ref().and_then(|a| a.schema.as_deref());
        let table = qualify(schema, table);
        for edge in edges.iter_mut().filter(|e| e.relation == Relation::M2M) {
            edge.table = qualify(schema, std::mem::take(&mut edge.table));
        }

        let entity = EntityDef {
            name: self.name.clone(),
            table,
            id: self.id,
            fields,
            edges,
            indexes: self.indexes,
            annotation: self.annotation,
        };

        let position = self.builder.entities.len();
        self.builder.names.insert(self.name, position);
        self.builder.entities.push(entity);
        Ok(())
    }
}
