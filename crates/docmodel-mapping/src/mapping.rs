//! Per-type metadata: what a type's properties are, how they cascade, and how
//! its documents are identified.
//!
//! Mappings are built once at startup (by hand or by a schema layer) and
//! shared behind `Rc`; the session indexes its persister cache by the
//! mapping's stable integer id.

use std::rc::Rc;

use docmodel_core::PropertyFlags;

use crate::identity::{IdentityGenerator, ObjectIdGenerator};

/// Whether a mapped type has its own identity and collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    /// A root document type: has identity, lives in its own collection.
    Entity,
    /// A value type contained inside an entity; no independent identity.
    Embedded,
}

/// What a property's value points at.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PropertyTarget {
    /// A plain value; persisted verbatim.
    #[default]
    None,
    /// An embedded object of the named mapped type; persisted inline.
    Embedded(String),
    /// A reference to an entity of the named mapped type; persisted as its
    /// identifier.
    Entity(String),
}

/// Metadata for a single property edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMapping {
    /// The property name.
    pub name: String,
    /// Cascade and behavior flags.
    pub flags: PropertyFlags,
    /// What the property points at.
    pub target: PropertyTarget,
}

impl PropertyMapping {
    /// Create a plain-value property with no flags.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: PropertyFlags::NONE,
            target: PropertyTarget::None,
        }
    }

    /// Set the property's flags.
    #[must_use]
    pub fn flags(mut self, flags: PropertyFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Mark the property as a reference to an entity of `type_name`.
    #[must_use]
    pub fn references(mut self, type_name: impl Into<String>) -> Self {
        self.target = PropertyTarget::Entity(type_name.into());
        self
    }

    /// Mark the property as embedding an object of `type_name`.
    #[must_use]
    pub fn embeds(mut self, type_name: impl Into<String>) -> Self {
        self.target = PropertyTarget::Embedded(type_name.into());
        self
    }
}

/// Metadata for one mapped type.
pub struct EntityMapping {
    id: u32,
    name: String,
    collection: String,
    kind: MappingKind,
    identity: Option<Rc<dyn IdentityGenerator>>,
    inheritance_root: u32,
    properties: Vec<PropertyMapping>,
}

impl EntityMapping {
    /// Create an entity mapping.
    ///
    /// The collection defaults to the lowercased type name and the identity
    /// generator to [`ObjectIdGenerator`]; both can be overridden.
    pub fn entity(id: u32, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            collection: name.to_lowercase(),
            name,
            kind: MappingKind::Entity,
            identity: Some(Rc::new(ObjectIdGenerator::new())),
            inheritance_root: id,
            properties: Vec::new(),
        }
    }

    /// Create an embedded-value mapping.
    pub fn embedded(id: u32, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            collection: String::new(),
            name,
            kind: MappingKind::Embedded,
            identity: None,
            inheritance_root: id,
            properties: Vec::new(),
        }
    }

    /// Override the collection name.
    #[must_use]
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Override the identity generator.
    #[must_use]
    pub fn identity_generator(mut self, generator: impl IdentityGenerator + 'static) -> Self {
        self.identity = Some(Rc::new(generator));
        self
    }

    /// Set the inheritance-root mapping id.
    #[must_use]
    pub fn inheritance_root(mut self, root: u32) -> Self {
        self.inheritance_root = root;
        self
    }

    /// Append a property.
    #[must_use]
    pub fn property(mut self, property: PropertyMapping) -> Self {
        self.properties.push(property);
        self
    }

    /// The stable small integer key of this mapping.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The mapped type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The backing collection (empty for embedded mappings).
    #[must_use]
    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    /// Entity or embedded.
    #[must_use]
    pub fn kind(&self) -> MappingKind {
        self.kind
    }

    /// True for root document types.
    #[must_use]
    pub fn is_entity(&self) -> bool {
        self.kind == MappingKind::Entity
    }

    /// The identity generator (`None` for embedded mappings).
    #[must_use]
    pub fn identity(&self) -> Option<Rc<dyn IdentityGenerator>> {
        self.identity.clone()
    }

    /// The mapping id of this type's inheritance root.
    #[must_use]
    pub fn root_id(&self) -> u32 {
        self.inheritance_root
    }

    /// All property mappings, in declaration order.
    #[must_use]
    pub fn properties(&self) -> &[PropertyMapping] {
        &self.properties
    }

    /// Look up a property by name.
    #[must_use]
    pub fn property_named(&self, name: &str) -> Option<&PropertyMapping> {
        self.properties.iter().find(|p| p.name == name)
    }
}

impl std::fmt::Debug for EntityMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityMapping")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("collection", &self.collection)
            .field("kind", &self.kind)
            .field("properties", &self.properties.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SequentialIdGenerator;

    #[test]
    fn test_entity_mapping_defaults() {
        let mapping = EntityMapping::entity(1, "Person");
        assert_eq!(mapping.id(), 1);
        assert_eq!(mapping.name(), "Person");
        assert_eq!(mapping.collection_name(), "person");
        assert!(mapping.is_entity());
        assert!(mapping.identity().is_some());
        assert_eq!(mapping.root_id(), 1);
    }

    #[test]
    fn test_embedded_mapping_has_no_identity() {
        let mapping = EntityMapping::embedded(2, "Address");
        assert_eq!(mapping.kind(), MappingKind::Embedded);
        assert!(mapping.identity().is_none());
        assert_eq!(mapping.collection_name(), "");
    }

    #[test]
    fn test_builder_overrides() {
        let mapping = EntityMapping::entity(3, "Person")
            .collection("people")
            .identity_generator(SequentialIdGenerator::new())
            .inheritance_root(1)
            .property(PropertyMapping::new("name"))
            .property(
                PropertyMapping::new("employer")
                    .flags(PropertyFlags::CASCADE_SAVE)
                    .references("Company"),
            );

        assert_eq!(mapping.collection_name(), "people");
        assert_eq!(mapping.root_id(), 1);
        assert_eq!(mapping.properties().len(), 2);

        let employer = mapping.property_named("employer").unwrap();
        assert!(employer.flags.contains(PropertyFlags::CASCADE_SAVE));
        assert_eq!(employer.target, PropertyTarget::Entity("Company".to_string()));
        assert!(mapping.property_named("missing").is_none());
    }
}
