//! The immutable Schema.

use crate::{EdgeDef, EntityDef};
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable schema metadata, indexed by entity name.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: Vec<Arc<EntityDef>>,
    by_name: HashMap<String, usize>,
}

impl Schema {
    pub(crate) fn new(entities: Vec<EntityDef>) -> Self {
        let by_name = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.clone(), i))
            .collect();
        Self {
            entities: entities.into_iter().map(Arc::new).collect(),
            by_name,
        }
    }

    /// Get an entity definition by name.
    pub fn entity(&self, name: &str) -> Option<&Arc<EntityDef>> {
        self.by_name.get(name).map(|&i| &self.entities[i])
    }

    /// The entity an edge points to.
    pub fn target(&self, edge: &EdgeDef) -> Option<&Arc<EntityDef>> {
        self.entity(&edge.target)
    }

    /// Entities in declaration order.
    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityDef>> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
