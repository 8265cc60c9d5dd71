//! The persistence seams the session drives.
//!
//! A [`Persister`] translates entities of one mapping to and from documents
//! and appends operations to a [`Batch`](crate::flush::Batch); the store
//! driver provides them through a [`PersisterProvider`] and the session
//! caches one per mapping. I/O-capable methods take a `Cx` and return boxed
//! futures so persisters stay object-safe; batch building is synchronous.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use docmodel_core::{ChangeTracking, Cx, Document, Error, Outcome, Result};
use docmodel_mapping::{Entity, EntityMapping, IdentityGenerator};

use crate::flush::Batch;

/// Boxed single-threaded future used by the object-safe persistence traits.
pub type PersistFuture<'a, T> = Pin<Box<dyn Future<Output = Outcome<T, Error>> + 'a>>;

/// A store hit: the hydrated entity and the document it came from.
pub struct Loaded {
    /// The hydrated entity.
    pub entity: Entity,
    /// The source document, kept as the link's snapshot.
    pub document: Document,
}

/// Mapping-specific adapter between entities and the store.
pub trait Persister {
    /// How this persister detects modifications.
    fn change_tracking(&self) -> ChangeTracking;

    /// The identity generator for this persister's mapping.
    fn identity(&self) -> Rc<dyn IdentityGenerator>;

    /// Load one entity by identifier.
    fn find_one_by_id<'a>(&'a self, cx: &'a Cx, id: &'a Document)
    -> PersistFuture<'a, Option<Loaded>>;

    /// Reload the entity's current document, rehydrate the live object in
    /// place, and return the document as the new snapshot.
    fn refresh<'a>(&'a self, cx: &'a Cx, entity: &'a Entity) -> PersistFuture<'a, Document>;

    /// Diff the entity against its snapshot, appending at most one update to
    /// the batch. Returns the entity's current document as the new snapshot.
    fn dirty_check(&self, batch: &mut Batch, entity: &Entity, original: &Document)
    -> Result<Document>;

    /// Append an insert for the entity and return the freshly built document.
    fn insert(&self, batch: &mut Batch, entity: &Entity) -> Result<Document>;

    /// Append a delete for the entity.
    fn remove(&self, batch: &mut Batch, entity: &Entity) -> Result<()>;
}

/// Resolves the persister for a mapping; `None` means the mapping has no
/// persistence backing and the session reports it as unmapped.
pub trait PersisterProvider {
    /// The persister for `mapping`, if any.
    fn persister_for(&self, mapping: &Rc<EntityMapping>) -> Option<Rc<dyn Persister>>;
}
