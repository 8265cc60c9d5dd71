//! Lazy entity references.
//!
//! A [`Reference`] is the sum of the two things a "pointer to an entity" can
//! be: a live object, or an `(mapping, id)` pair that has not been loaded.
//! Resolution flips the state in place, so every holder of the handle sees
//! the resolved object.

use std::cell::RefCell;
use std::rc::Rc;

use docmodel_core::{Document, identity_key};

use crate::entity::Entity;
use crate::mapping::EntityMapping;

struct ReferenceInner {
    mapping: Rc<EntityMapping>,
    id: Document,
    resolved: Option<Entity>,
}

/// A shared handle to a possibly-unloaded entity.
#[derive(Clone)]
pub struct Reference {
    inner: Rc<RefCell<ReferenceInner>>,
}

impl Reference {
    /// Create an unresolved reference from a mapping and identifier.
    #[must_use]
    pub fn unresolved(mapping: &Rc<EntityMapping>, id: Document) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ReferenceInner {
                mapping: Rc::clone(mapping),
                id,
                resolved: None,
            })),
        }
    }

    /// Create an already-resolved reference to a live entity.
    #[must_use]
    pub fn resolved(entity: &Entity) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ReferenceInner {
                mapping: entity.mapping(),
                id: entity.id().unwrap_or(Document::Null),
                resolved: Some(entity.clone()),
            })),
        }
    }

    /// The referenced mapping.
    #[must_use]
    pub fn mapping(&self) -> Rc<EntityMapping> {
        Rc::clone(&self.inner.borrow().mapping)
    }

    /// The referenced identifier.
    #[must_use]
    pub fn id(&self) -> Document {
        self.inner.borrow().id.clone()
    }

    /// The identity-table key of the referenced identifier.
    #[must_use]
    pub fn key(&self) -> String {
        identity_key(&self.inner.borrow().id)
    }

    /// Whether the target has been loaded.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.inner.borrow().resolved.is_some()
    }

    /// The resolved target, when loaded.
    #[must_use]
    pub fn entity(&self) -> Option<Entity> {
        self.inner.borrow().resolved.clone()
    }

    /// Mark the reference resolved. Every clone of this handle observes the
    /// target from now on.
    pub fn resolve_with(&self, entity: &Entity) {
        let mut inner = self.inner.borrow_mut();
        if let Some(id) = entity.id() {
            inner.id = id;
        }
        inner.resolved = Some(entity.clone());
    }

    /// Pointer identity of the handle itself.
    #[must_use]
    pub fn ptr_eq(&self, other: &Reference) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// A stable address usable as a dedup key while walking.
    #[must_use]
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }
}

impl std::fmt::Debug for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Reference")
            .field("type", &inner.mapping.name())
            .field("id", &inner.id)
            .field("resolved", &inner.resolved.is_some())
            .finish()
    }
}
