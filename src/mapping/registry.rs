use std::collections::HashMap;
use std::sync::Arc;

use crate::core::error::{Result, SoftDeleteError};

use super::entity::EntityMapping;

/// Copy-on-write catalog of entity mappings.
///
/// Cloning is cheap (shared snapshot); `with_entity` returns a new registry
/// instead of mutating in place, so an engine keeps a stable view while the
/// host assembles the next schema revision.
#[derive(Debug, Clone, Default)]
pub struct MappingRegistry {
    entities: Arc<HashMap<String, Arc<EntityMapping>>>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a mapping, rejecting duplicate names.
    pub fn with_entity(&self, mapping: EntityMapping) -> Result<Self> {
        if self.entities.contains_key(mapping.name()) {
            return Err(SoftDeleteError::Mapping(format!(
                "entity '{}' is already registered",
                mapping.name()
            )));
        }
        let mut entities = (*self.entities).clone();
        entities.insert(mapping.name().to_string(), Arc::new(mapping));
        Ok(Self {
            entities: Arc::new(entities),
        })
    }

    pub fn without_entity(&self, name: &str) -> Result<Self> {
        if !self.entities.contains_key(name) {
            return Err(SoftDeleteError::Mapping(format!(
                "entity '{name}' is not registered"
            )));
        }
        let mut entities = (*self.entities).clone();
        entities.remove(name);
        Ok(Self {
            entities: Arc::new(entities),
        })
    }

    pub fn entity(&self, name: &str) -> Option<Arc<EntityMapping>> {
        self.entities.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Registered names in deterministic order; whole-schema passes iterate
    /// this.
    pub fn entity_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entities.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
