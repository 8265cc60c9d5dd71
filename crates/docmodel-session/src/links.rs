//! Object links and the session's identity table.
//!
//! Every entity associated with a session has exactly one [`ObjectLink`]
//! holding its lifecycle state, the write scheduled for the next flush, the
//! live object, the last-known persisted snapshot, and the persister bound to
//! its mapping. Links live in the [`ObjectLinks`] table keyed by stringified
//! identity.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use docmodel_core::{Document, Error, Result, identity_key};
use docmodel_mapping::Entity;

use crate::persister::Persister;

/// Lifecycle state of a linked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Tracked by the session.
    Managed,
    /// No longer tracked; set on a link as it leaves the table.
    Detached,
    /// Scheduled for deletion; hidden from reads until flushed.
    Removed,
}

/// The write the session intends to perform for a link on the next flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledOperation {
    /// Nothing scheduled.
    None,
    /// Insert the entity's document.
    Insert,
    /// Replace the entity's document.
    Update,
    /// Delete the entity's document.
    Delete,
    /// Diff against the snapshot and emit an update if anything changed.
    DirtyCheck,
}

/// Per-entity session state.
pub struct ObjectLink {
    /// The live entity.
    pub object: Entity,
    /// Lifecycle state.
    pub state: LinkState,
    /// Operation scheduled for the next flush.
    pub scheduled: ScheduledOperation,
    /// Snapshot of the last-known persisted document; absent for
    /// never-persisted inserts until their flush completes.
    pub original: Option<Document>,
    /// The persister bound to this entity's mapping.
    pub persister: Rc<dyn Persister>,
}

impl std::fmt::Debug for ObjectLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectLink")
            .field("object", &self.object)
            .field("state", &self.state)
            .field("scheduled", &self.scheduled)
            .field("original", &self.original)
            .finish_non_exhaustive()
    }
}

/// Shared handle to a link.
pub type LinkHandle = Rc<RefCell<ObjectLink>>;

/// The identity table: stringified identity → link.
///
/// Backed by a `BTreeMap`, so enumeration order is deterministic and stable;
/// the flush planner iterates a snapshot of it.
#[derive(Default)]
pub struct ObjectLinks {
    table: BTreeMap<String, LinkHandle>,
}

impl ObjectLinks {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Link an entity.
    ///
    /// The entity must carry an identity; linking a second entity under an
    /// identity already present is a programmer error.
    pub fn link(
        &mut self,
        entity: &Entity,
        persister: Rc<dyn Persister>,
        scheduled: ScheduledOperation,
        original: Option<Document>,
    ) -> Result<LinkHandle> {
        let Some(id) = entity.id() else {
            return Err(Error::InvalidIdentifier {
                value: "null".to_string(),
            });
        };
        let key = identity_key(&id);
        if self.table.contains_key(&key) {
            return Err(Error::DuplicateLink { key });
        }
        let link = Rc::new(RefCell::new(ObjectLink {
            object: entity.clone(),
            state: LinkState::Managed,
            scheduled,
            original,
            persister,
        }));
        self.table.insert(key, Rc::clone(&link));
        Ok(link)
    }

    /// Look up a link by identity key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<LinkHandle> {
        self.table.get(key).cloned()
    }

    /// Look up the link for a live object.
    ///
    /// Returns the link only when the table entry holds this exact object; a
    /// different in-memory copy under the same identity is a detached copy,
    /// not a managed entity.
    #[must_use]
    pub fn get_for_entity(&self, entity: &Entity) -> Option<LinkHandle> {
        let id = entity.id()?;
        let link = self.table.get(&identity_key(&id))?;
        if link.borrow().object.ptr_eq(entity) {
            Some(Rc::clone(link))
        } else {
            None
        }
    }

    /// Remove a link from the table.
    ///
    /// The entity's identity attribute is cleared when the link was a pending
    /// insert or was removed: a never-persisted or deleted entity must not
    /// retain a stale identity, or a later `save` would collide with it.
    pub fn unlink(&mut self, key: &str) -> Option<LinkHandle> {
        let link = self.table.remove(key)?;
        {
            let mut inner = link.borrow_mut();
            let clear_id = inner.scheduled == ScheduledOperation::Insert
                || inner.state == LinkState::Removed;
            inner.state = LinkState::Detached;
            if clear_id {
                inner.object.clear_id();
            }
        }
        Some(link)
    }

    /// Drop every link.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// A stable enumeration of all links, in key order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LinkHandle> {
        self.table.values().cloned().collect()
    }

    /// Number of links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when no entity is linked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persister::test_support::StubPersister;
    use docmodel_mapping::EntityMapping;
    use serde_json::json;

    fn person() -> Entity {
        Entity::new(&Rc::new(EntityMapping::entity(1, "Person")))
    }

    fn stub() -> Rc<dyn Persister> {
        Rc::new(StubPersister::default())
    }

    #[test]
    fn test_link_requires_identity() {
        let mut links = ObjectLinks::new();
        let entity = person();
        assert!(links
            .link(&entity, stub(), ScheduledOperation::Insert, None)
            .is_err());
    }

    #[test]
    fn test_link_and_lookup() {
        let mut links = ObjectLinks::new();
        let entity = person();
        entity.set_id(json!("a"));
        let link = links
            .link(&entity, stub(), ScheduledOperation::Insert, None)
            .unwrap();

        assert_eq!(link.borrow().state, LinkState::Managed);
        assert!(links.get("a").is_some());
        assert!(links.get_for_entity(&entity).is_some());
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn test_duplicate_link_is_rejected() {
        let mut links = ObjectLinks::new();
        let first = person();
        first.set_id(json!("a"));
        links
            .link(&first, stub(), ScheduledOperation::None, None)
            .unwrap();

        let copy = person();
        copy.set_id(json!("a"));
        let err = links
            .link(&copy, stub(), ScheduledOperation::None, None)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateLink { key } if key == "a"));
    }

    #[test]
    fn test_lookup_rejects_detached_copy() {
        let mut links = ObjectLinks::new();
        let managed = person();
        managed.set_id(json!("a"));
        links
            .link(&managed, stub(), ScheduledOperation::None, None)
            .unwrap();

        let copy = person();
        copy.set_id(json!("a"));
        assert!(links.get_for_entity(&copy).is_none());
    }

    #[test]
    fn test_unlink_pending_insert_clears_identity() {
        let mut links = ObjectLinks::new();
        let entity = person();
        entity.set_id(json!("a"));
        links
            .link(&entity, stub(), ScheduledOperation::Insert, None)
            .unwrap();

        let link = links.unlink("a").unwrap();
        assert_eq!(link.borrow().state, LinkState::Detached);
        assert!(entity.id().is_none());
        assert!(links.is_empty());
    }

    #[test]
    fn test_unlink_removed_clears_identity() {
        let mut links = ObjectLinks::new();
        let entity = person();
        entity.set_id(json!("a"));
        let link = links
            .link(&entity, stub(), ScheduledOperation::None, Some(json!({"_id": "a"})))
            .unwrap();
        {
            let mut inner = link.borrow_mut();
            inner.state = LinkState::Removed;
            inner.scheduled = ScheduledOperation::Delete;
        }

        links.unlink("a");
        assert!(entity.id().is_none());
    }

    #[test]
    fn test_unlink_managed_keeps_identity() {
        let mut links = ObjectLinks::new();
        let entity = person();
        entity.set_id(json!("a"));
        links
            .link(&entity, stub(), ScheduledOperation::None, Some(json!({"_id": "a"})))
            .unwrap();

        links.unlink("a");
        assert_eq!(entity.id(), Some(json!("a")));
    }

    #[test]
    fn test_snapshot_is_key_ordered() {
        let mut links = ObjectLinks::new();
        for key in ["c", "a", "b"] {
            let entity = person();
            entity.set_id(json!(key));
            links
                .link(&entity, stub(), ScheduledOperation::Insert, None)
                .unwrap();
        }

        let order: Vec<_> = links
            .snapshot()
            .iter()
            .map(|l| l.borrow().object.id().unwrap())
            .collect();
        assert_eq!(order, vec![json!("a"), json!("b"), json!("c")]);
    }

    #[test]
    fn test_clear_empties_table() {
        let mut links = ObjectLinks::new();
        let entity = person();
        entity.set_id(json!("a"));
        links
            .link(&entity, stub(), ScheduledOperation::None, None)
            .unwrap();

        links.clear();
        assert!(links.is_empty());
        // Bulk discard is not an unlink: identities survive.
        assert_eq!(entity.id(), Some(json!("a")));
    }
}
