//! Converting entities to and from their persisted documents.
//!
//! Persisters use these helpers to build insert documents and snapshots
//! (`write_entity`), hydrate store results (`read_entity`), and rehydrate a
//! live object in place on refresh (`apply_document`).
//!
//! Writing collapses entity edges to their identifiers and inlines embedded
//! objects; reading turns identifier-valued reference properties back into
//! unresolved [`Reference`]s, so nothing is loaded eagerly.

use std::collections::HashSet;
use std::rc::Rc;

use docmodel_core::{Document, Error, ID_FIELD, PropertyFlags, Result};

use crate::entity::{Entity, FieldValue};
use crate::mapping::{EntityMapping, PropertyTarget};
use crate::reference::Reference;
use crate::registry::MappingRegistry;

/// Serialize an entity (or embedded object) to its persisted document.
///
/// Entity-valued fields are written as the target's identifier (null when the
/// target has none yet); embedded objects are written inline. Properties
/// flagged `IGNORED` are skipped. A cycle through embedded objects cannot be
/// persisted and is an error.
pub fn write_entity(entity: &Entity) -> Result<Document> {
    let mut writing = HashSet::new();
    write_object(entity, &mut writing)
}

fn write_object(entity: &Entity, writing: &mut HashSet<usize>) -> Result<Document> {
    if !writing.insert(entity.addr()) {
        return Err(Error::persister(format!(
            "cycle through embedded {} cannot be persisted",
            entity.type_name()
        )));
    }

    let mapping = entity.mapping();
    let mut doc = serde_json::Map::new();
    if let Some(id) = entity.id() {
        doc.insert(ID_FIELD.to_string(), id);
    }
    for name in entity.field_names() {
        if name == ID_FIELD {
            continue;
        }
        if mapping
            .property_named(&name)
            .is_some_and(|p| p.flags.contains(PropertyFlags::IGNORED))
        {
            continue;
        }
        if let Some(value) = entity.get(&name) {
            doc.insert(name, write_field(&value, writing)?);
        }
    }

    writing.remove(&entity.addr());
    Ok(Document::Object(doc))
}

fn write_field(value: &FieldValue, writing: &mut HashSet<usize>) -> Result<Document> {
    match value {
        FieldValue::Value(doc) => Ok(doc.clone()),
        FieldValue::Entity(entity) => {
            if entity.mapping().is_entity() {
                Ok(entity.id().unwrap_or(Document::Null))
            } else {
                write_object(entity, writing)
            }
        }
        FieldValue::Reference(reference) => Ok(reference.id()),
        FieldValue::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(write_field(item, writing)?);
            }
            Ok(Document::Array(out))
        }
    }
}

/// Hydrate a document into a fresh entity of the given mapping.
///
/// Reference properties become unresolved [`Reference`]s; embedded properties
/// recurse; fields without a property mapping pass through as plain values
/// (the store is schemaless).
pub fn read_entity(
    registry: &MappingRegistry,
    mapping: &Rc<EntityMapping>,
    doc: &Document,
) -> Result<Entity> {
    let Some(fields) = doc.as_object() else {
        return Err(Error::persister(format!(
            "expected a {} document object",
            mapping.name()
        )));
    };

    let entity = Entity::new(mapping);
    for (name, value) in fields {
        if name == ID_FIELD {
            entity.set_id(value.clone());
            continue;
        }
        let property = mapping.property_named(name);
        if property.is_some_and(|p| p.flags.contains(PropertyFlags::IGNORED)) {
            continue;
        }
        let field = match property.map(|p| &p.target) {
            Some(PropertyTarget::Entity(type_name)) => {
                read_reference_field(registry, type_name, value)?
            }
            Some(PropertyTarget::Embedded(type_name)) => {
                read_embedded_field(registry, type_name, value)?
            }
            _ => FieldValue::Value(value.clone()),
        };
        entity.set(name.clone(), field);
    }
    Ok(entity)
}

fn read_reference_field(
    registry: &MappingRegistry,
    type_name: &str,
    value: &Document,
) -> Result<FieldValue> {
    let mapping = registry
        .mapping_for_name(type_name)
        .ok_or_else(|| Error::unmapped(type_name))?;
    Ok(match value {
        Document::Null => FieldValue::Value(Document::Null),
        Document::Array(items) => FieldValue::Array(
            items
                .iter()
                .map(|id| FieldValue::Reference(Reference::unresolved(&mapping, id.clone())))
                .collect(),
        ),
        id => FieldValue::Reference(Reference::unresolved(&mapping, id.clone())),
    })
}

fn read_embedded_field(
    registry: &MappingRegistry,
    type_name: &str,
    value: &Document,
) -> Result<FieldValue> {
    let mapping = registry
        .mapping_for_name(type_name)
        .ok_or_else(|| Error::unmapped(type_name))?;
    Ok(match value {
        Document::Null => FieldValue::Value(Document::Null),
        Document::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(FieldValue::Entity(read_entity(registry, &mapping, item)?));
            }
            FieldValue::Array(out)
        }
        doc => FieldValue::Entity(read_entity(registry, &mapping, doc)?),
    })
}

/// Rehydrate a live entity in place from a freshly loaded document.
pub fn apply_document(
    registry: &MappingRegistry,
    entity: &Entity,
    doc: &Document,
) -> Result<()> {
    let hydrated = read_entity(registry, &entity.mapping(), doc)?;
    entity.replace_fields_from(&hydrated);
    Ok(())
}
