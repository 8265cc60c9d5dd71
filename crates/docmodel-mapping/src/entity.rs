//! The dynamic entity object model.
//!
//! An [`Entity`] is a mapping plus a field map, held behind `Rc<RefCell<…>>`
//! so object graphs (including cycles) can be shared freely within one
//! session. Handles compare by pointer identity; that identity is what the
//! graph walker's visited set uses.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use docmodel_core::{Document, ID_FIELD};

use crate::mapping::EntityMapping;
use crate::reference::Reference;

/// A field's runtime value.
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// A plain JSON-shaped value.
    Value(Document),
    /// A live entity or embedded object.
    Entity(Entity),
    /// A lazy handle to an entity that may not be loaded yet.
    Reference(Reference),
    /// An ordered collection, walked element-wise.
    Array(Vec<FieldValue>),
}

struct EntityInner {
    mapping: Rc<EntityMapping>,
    fields: BTreeMap<String, FieldValue>,
}

/// A shared handle to a dynamic entity instance.
#[derive(Clone)]
pub struct Entity {
    inner: Rc<RefCell<EntityInner>>,
}

impl Entity {
    /// Create an empty instance of a mapped type.
    #[must_use]
    pub fn new(mapping: &Rc<EntityMapping>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(EntityInner {
                mapping: Rc::clone(mapping),
                fields: BTreeMap::new(),
            })),
        }
    }

    /// The mapping this instance belongs to.
    #[must_use]
    pub fn mapping(&self) -> Rc<EntityMapping> {
        Rc::clone(&self.inner.borrow().mapping)
    }

    /// The mapped type name.
    #[must_use]
    pub fn type_name(&self) -> String {
        self.inner.borrow().mapping.name().to_string()
    }

    /// Read a field (cloned handle/value).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<FieldValue> {
        self.inner.borrow().fields.get(name).cloned()
    }

    /// Write a field.
    pub fn set(&self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.inner
            .borrow_mut()
            .fields
            .insert(name.into(), value.into());
    }

    /// Remove a field, if present.
    pub fn unset(&self, name: &str) {
        self.inner.borrow_mut().fields.remove(name);
    }

    /// Names of all currently set fields.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.inner.borrow().fields.keys().cloned().collect()
    }

    /// The identity value, when stamped and non-null.
    #[must_use]
    pub fn id(&self) -> Option<Document> {
        match self.inner.borrow().fields.get(ID_FIELD) {
            Some(FieldValue::Value(id)) if !id.is_null() => Some(id.clone()),
            _ => None,
        }
    }

    /// Stamp the identity attribute.
    pub fn set_id(&self, id: Document) {
        self.set(ID_FIELD, FieldValue::Value(id));
    }

    /// Clear the identity attribute.
    pub fn clear_id(&self) {
        self.unset(ID_FIELD);
    }

    /// Pointer identity: whether two handles are the same live object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Entity) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// A stable address usable as a visited-set key.
    #[must_use]
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    /// Replace this instance's fields with another instance's (used for
    /// in-place rehydration). A self-replace is a no-op.
    pub(crate) fn replace_fields_from(&self, other: &Entity) {
        if self.ptr_eq(other) {
            return;
        }
        let fields = other.inner.borrow().fields.clone();
        self.inner.borrow_mut().fields = fields;
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Graphs may be cyclic, so render the surface only.
        f.debug_struct("Entity")
            .field("type", &self.type_name())
            .field("id", &self.id())
            .finish()
    }
}

impl From<Document> for FieldValue {
    fn from(value: Document) -> Self {
        FieldValue::Value(value)
    }
}

impl From<Entity> for FieldValue {
    fn from(value: Entity) -> Self {
        FieldValue::Entity(value)
    }
}

impl From<Reference> for FieldValue {
    fn from(value: Reference) -> Self {
        FieldValue::Reference(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Value(Document::from(value))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Value(Document::from(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Value(Document::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Value(Document::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Value(Document::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person_mapping() -> Rc<EntityMapping> {
        Rc::new(EntityMapping::entity(1, "Person"))
    }

    #[test]
    fn test_get_set_round_trip() {
        let person = Entity::new(&person_mapping());
        person.set("first", "Bob");
        person.set("age", 41_i64);

        match person.get("first") {
            Some(FieldValue::Value(v)) => assert_eq!(v, json!("Bob")),
            other => panic!("unexpected field value: {other:?}"),
        }
        assert!(person.get("missing").is_none());
        assert_eq!(person.field_names(), vec!["age", "first"]);
    }

    #[test]
    fn test_identity_attribute() {
        let person = Entity::new(&person_mapping());
        assert!(person.id().is_none());

        person.set_id(json!("abc"));
        assert_eq!(person.id(), Some(json!("abc")));

        person.clear_id();
        assert!(person.id().is_none());
    }

    #[test]
    fn test_null_identity_reads_as_absent() {
        let person = Entity::new(&person_mapping());
        person.set_id(Document::Null);
        assert!(person.id().is_none());
    }

    #[test]
    fn test_pointer_identity() {
        let mapping = person_mapping();
        let a = Entity::new(&mapping);
        let b = a.clone();
        let c = Entity::new(&mapping);

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(a.addr(), b.addr());
    }

    #[test]
    fn test_cyclic_graph_is_representable() {
        let mapping = person_mapping();
        let a = Entity::new(&mapping);
        let b = Entity::new(&mapping);
        a.set("friend", b.clone());
        b.set("friend", a.clone());

        match a.get("friend") {
            Some(FieldValue::Entity(e)) => assert!(e.ptr_eq(&b)),
            other => panic!("unexpected field value: {other:?}"),
        }
        // Debug must not recurse into the cycle.
        let _ = format!("{a:?}");
    }

    #[test]
    fn test_replace_fields_from() {
        let mapping = person_mapping();
        let stale = Entity::new(&mapping);
        stale.set("first", "Bob");
        stale.set("stale", true);

        let fresh = Entity::new(&mapping);
        fresh.set("first", "Robert");

        stale.replace_fields_from(&fresh);
        assert!(stale.get("stale").is_none());
        match stale.get("first") {
            Some(FieldValue::Value(v)) => assert_eq!(v, json!("Robert")),
            other => panic!("unexpected field value: {other:?}"),
        }
    }
}
