//! The mapping registry: type name → mapping and mapping id → mapping.

use std::collections::HashMap;
use std::rc::Rc;

use docmodel_core::{Error, Result};

use crate::entity::Entity;
use crate::mapping::EntityMapping;

/// All mappings known to a configuration.
#[derive(Default)]
pub struct MappingRegistry {
    by_name: HashMap<String, Rc<EntityMapping>>,
    by_id: HashMap<u32, Rc<EntityMapping>>,
}

impl MappingRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mapping.
    ///
    /// Name and id must both be unused; a collision is a programmer error.
    pub fn register(&mut self, mapping: EntityMapping) -> Result<Rc<EntityMapping>> {
        if self.by_name.contains_key(mapping.name()) || self.by_id.contains_key(&mapping.id()) {
            return Err(Error::DuplicateMapping {
                name: mapping.name().to_string(),
            });
        }
        let mapping = Rc::new(mapping);
        self.by_name
            .insert(mapping.name().to_string(), Rc::clone(&mapping));
        self.by_id.insert(mapping.id(), Rc::clone(&mapping));
        tracing::debug!(
            id = mapping.id(),
            name = mapping.name(),
            kind = ?mapping.kind(),
            "mapping registered"
        );
        Ok(mapping)
    }

    /// Look up a mapping by type name.
    #[must_use]
    pub fn mapping_for_name(&self, name: &str) -> Option<Rc<EntityMapping>> {
        self.by_name.get(name).cloned()
    }

    /// Look up a mapping by its stable id.
    #[must_use]
    pub fn mapping_for_id(&self, id: u32) -> Option<Rc<EntityMapping>> {
        self.by_id.get(&id).cloned()
    }

    /// The registered mapping for a live object, or `None` when its type is
    /// unknown to this registry.
    #[must_use]
    pub fn mapping_for_object(&self, entity: &Entity) -> Option<Rc<EntityMapping>> {
        self.mapping_for_name(entity.mapping().name())
    }

    /// Number of registered mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
